//! Dashboard handlers.

use actix_web::{HttpResponse, web};

use crate::error::AppResult;
use crate::models::StatusQuery;

use super::AppState;
use super::test_matrix::BuildPath;

/// Enriched device steps, filtered by `?status=`.
pub async fn list_steps(
    state: web::Data<AppState>,
    path: web::Path<BuildPath>,
    query: web::Query<StatusQuery>,
) -> AppResult<HttpResponse> {
    let BuildPath {
        app_slug,
        build_slug,
    } = path.into_inner();

    let steps = state
        .dashboard
        .steps(&app_slug, &build_slug, query.filter())
        .await?;

    Ok(HttpResponse::Ok().json(steps))
}

pub async fn get_summary(
    state: web::Data<AppState>,
    path: web::Path<BuildPath>,
) -> AppResult<HttpResponse> {
    let BuildPath {
        app_slug,
        build_slug,
    } = path.into_inner();

    let summary = state.dashboard.summary(&app_slug, &build_slug).await?;

    Ok(HttpResponse::Ok().json(summary))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/apps/{app_slug}/builds/{build_slug}/steps").route(web::get().to(list_steps)),
    )
    .service(
        web::resource("/apps/{app_slug}/builds/{build_slug}/summary")
            .route(web::get().to(get_summary)),
    );
}
