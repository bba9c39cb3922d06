//! JUnit XML ingestion.
//!
//! The document is read into a small element tree first; suites are then
//! collected from every `testsuite` element, wherever it sits (a
//! `testsuites` wrapper, a bare root suite, or deeper).

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{AppError, AppResult};
use crate::models::junit::{Suite, Test, TestError, TestStatus};

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: BTreeMap<String, String>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, key: &str) -> String {
        self.attrs.get(key).cloned().unwrap_or_default()
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn parse_failed(err: impl std::fmt::Display) -> AppError {
    AppError::ParseFailed(format!("Invalid JUnit XML: {}", err))
}

fn start_element(start: &BytesStart<'_>) -> AppResult<Element> {
    let mut element = Element {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        ..Default::default()
    };

    for attr in start.attributes() {
        let attr = attr.map_err(parse_failed)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(parse_failed)?.into_owned();
        element.attrs.insert(key, value);
    }

    Ok(element)
}

/// Parse a document into its top-level elements.
fn parse_tree(xml: &str) -> AppResult<Vec<Element>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut roots = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event().map_err(parse_failed)? {
            Event::Start(start) => stack.push(start_element(&start)?),
            Event::Empty(start) => {
                let element = start_element(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => roots.push(element),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| parse_failed("unexpected closing tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => roots.push(element),
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&text.unescape().map_err(parse_failed)?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(parse_failed("unexpected end of document"));
    }

    Ok(roots)
}

/// `time` attribute in seconds to whole milliseconds.
fn duration_ms(time: &str) -> u64 {
    time.trim()
        .replace(',', "")
        .parse::<f64>()
        .map(|secs| (secs * 1000.0).round().max(0.0) as u64)
        .unwrap_or(0)
}

fn ingest_test(element: &Element) -> Test {
    let mut test = Test {
        name: element.attr("name"),
        classname: element.attr("classname"),
        duration_ms: duration_ms(&element.attr("time")),
        status: TestStatus::Passed,
        properties: element.attrs.clone(),
        ..Default::default()
    };

    for child in &element.children {
        match child.name.as_str() {
            "skipped" => {
                test.status = TestStatus::Skipped;
                test.message = child.attr("message");
            }
            "failure" | "error" => {
                test.status = if child.name == "failure" {
                    TestStatus::Failed
                } else {
                    TestStatus::Error
                };
                test.message = child.attr("message");
                test.error = Some(TestError {
                    message: child.attr("message"),
                    kind: child.attr("type"),
                    body: child.text.clone(),
                });
            }
            "system-out" => test.system_out = child.text.clone(),
            "system-err" => test.system_err = child.text.clone(),
            _ => {}
        }
    }

    test
}

fn ingest_suite(element: &Element) -> Suite {
    let mut suite = Suite {
        name: element.attr("name"),
        package: element.attr("package"),
        ..Default::default()
    };

    for child in &element.children {
        match child.name.as_str() {
            "properties" => {
                for property in child.children_named("property") {
                    suite
                        .properties
                        .insert(property.attr("name"), property.attr("value"));
                }
            }
            "testcase" => suite.tests.push(ingest_test(child)),
            "testsuite" => suite.suites.push(ingest_suite(child)),
            "system-out" => suite.system_out = child.text.clone(),
            "system-err" => suite.system_err = child.text.clone(),
            _ => {}
        }
    }

    suite.aggregate();
    suite
}

fn collect_suites(element: &Element, suites: &mut Vec<Suite>) {
    if element.name == "testsuite" {
        suites.push(ingest_suite(element));
        return;
    }
    for child in &element.children {
        collect_suites(child, suites);
    }
}

/// Parse JUnit XML into suites with aggregated totals.
pub fn parse(xml: &str) -> AppResult<Vec<Suite>> {
    let roots = parse_tree(xml)?;
    let mut suites = Vec::new();
    for root in &roots {
        collect_suites(root, &mut suites);
    }
    Ok(suites)
}

/// Keep only tests matching `status`; suites left without tests are dropped.
///
/// Suite totals keep describing the unfiltered suite.
pub fn filter_by_status(suites: Vec<Suite>, status: &str) -> Vec<Suite> {
    suites
        .into_iter()
        .filter_map(|mut suite| {
            suite.tests.retain(|test| test.status.matches_filter(status));
            suite.suites = filter_by_status(std::mem::take(&mut suite.suites), status);
            if suite.tests.is_empty() && suite.suites.is_empty() {
                None
            } else {
                Some(suite)
            }
        })
        .collect()
}
