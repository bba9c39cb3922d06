//! Test report handlers.

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{NewTestReport, StatusQuery, TestReportPatch};

use super::AppState;
use super::test_matrix::BuildPath;

#[derive(Debug, Deserialize)]
pub struct ReportPath {
    pub app_slug: String,
    pub build_slug: String,
    pub report_id: Uuid,
}

/// Uploaded reports of a build with parsed suites.
pub async fn list_reports(
    state: web::Data<AppState>,
    path: web::Path<BuildPath>,
    query: web::Query<StatusQuery>,
) -> AppResult<HttpResponse> {
    let BuildPath {
        app_slug,
        build_slug,
    } = path.into_inner();

    let reports = state
        .reports
        .list_uploaded(&app_slug, &build_slug)
        .await?;
    let filled = state.filler.fill_many(&reports, query.filter()).await?;

    Ok(HttpResponse::Ok().json(filled))
}

pub async fn get_report(
    state: web::Data<AppState>,
    path: web::Path<ReportPath>,
    query: web::Query<StatusQuery>,
) -> AppResult<HttpResponse> {
    let ReportPath {
        app_slug,
        build_slug,
        report_id,
    } = path.into_inner();

    let report = state.reports.find(&app_slug, &build_slug, report_id).await?;
    let filled = state.filler.fill_one(&report, query.filter()).await?;

    Ok(HttpResponse::Ok().json(filled))
}

/// Register a report and hand out signed upload URLs.
pub async fn register_report(
    state: web::Data<AppState>,
    path: web::Path<BuildPath>,
    body: web::Json<NewTestReport>,
) -> AppResult<HttpResponse> {
    let BuildPath {
        app_slug,
        build_slug,
    } = path.into_inner();

    let upload = state
        .reports
        .register(&app_slug, &build_slug, &body)
        .await?;

    Ok(HttpResponse::Created().json(upload))
}

/// Rename a report or mark it uploaded.
pub async fn update_report(
    state: web::Data<AppState>,
    path: web::Path<ReportPath>,
    body: web::Json<TestReportPatch>,
) -> AppResult<HttpResponse> {
    let ReportPath {
        app_slug,
        build_slug,
        report_id,
    } = path.into_inner();

    let report = state
        .reports
        .update(&app_slug, &build_slug, report_id, &body)
        .await?;

    Ok(HttpResponse::Ok().json(report))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/apps/{app_slug}/builds/{build_slug}/test_reports")
            .route(web::get().to(list_reports))
            .route(web::post().to(register_report)),
    )
    .service(
        web::resource("/apps/{app_slug}/builds/{build_slug}/test_reports/{report_id}")
            .route(web::get().to(get_report))
            .route(web::patch().to(update_report)),
    );
}
