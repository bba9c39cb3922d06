//! Source-code annotations produced from checkstyle lint reports.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationLevel {
    Failure,
    Warning,
    Notice,
}

impl AnnotationLevel {
    /// Map a checkstyle severity. Unrecognized severities are failures.
    pub fn from_severity(severity: &str) -> Self {
        match severity {
            "warning" => AnnotationLevel::Warning,
            "notice" => AnnotationLevel::Notice,
            _ => AnnotationLevel::Failure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub path: String,
    pub start_line: i64,
    pub end_line: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_column: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column: Option<i64>,
    pub annotation_level: AnnotationLevel,
    pub message: String,
}

// Checkstyle document: <checkstyle><file name><error line column severity message source/></file></checkstyle>

#[derive(Debug, Deserialize)]
pub struct CheckstyleReport {
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(rename = "file", default)]
    pub files: Vec<CheckstyleFile>,
}

#[derive(Debug, Deserialize)]
pub struct CheckstyleFile {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "error", default)]
    pub errors: Vec<CheckstyleError>,
}

#[derive(Debug, Deserialize)]
pub struct CheckstyleError {
    #[serde(rename = "@line", default)]
    pub line: i64,
    #[serde(rename = "@column", default)]
    pub column: Option<i64>,
    #[serde(rename = "@severity", default)]
    pub severity: String,
    #[serde(rename = "@message", default)]
    pub message: String,
    #[serde(rename = "@source", default)]
    pub source: String,
}

impl CheckstyleReport {
    /// Flatten every reported error into an annotation.
    pub fn into_annotations(self) -> Vec<Annotation> {
        self.files
            .into_iter()
            .flat_map(|file| {
                let path = file.name;
                file.errors.into_iter().map(move |error| Annotation {
                    path: path.clone(),
                    start_line: error.line,
                    end_line: error.line,
                    start_column: error.column,
                    end_column: error.column,
                    annotation_level: AnnotationLevel::from_severity(&error.severity),
                    message: error.message,
                })
            })
            .collect()
    }
}
