//! Test matrix handlers: start, poll and cancel the device run of a build.

use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::TestMatrixRequest;
use crate::services::{MatrixContext, cancel_test_matrix, poll_test_execution, start_test_matrix};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct BuildPath {
    pub app_slug: String,
    pub build_slug: String,
}

/// Start a test matrix. Responds with the updated build record.
pub async fn start_matrix(
    state: web::Data<AppState>,
    path: web::Path<BuildPath>,
    body: web::Json<TestMatrixRequest>,
) -> AppResult<HttpResponse> {
    let BuildPath {
        app_slug,
        build_slug,
    } = path.into_inner();

    let ctx = MatrixContext {
        testing: state.testing.as_ref(),
        builds: state.builds.as_ref(),
        analytics: state.analytics.as_ref(),
        catalog: &state.catalog,
        bucket: &state.bucket,
    };
    let build = start_test_matrix(&ctx, &app_slug, &build_slug, body.into_inner()).await?;

    Ok(HttpResponse::Created().json(build))
}

/// Poll the matrix; returns `{state}` until steps are known, then `{steps}`.
pub async fn poll_matrix(
    state: web::Data<AppState>,
    path: web::Path<BuildPath>,
) -> AppResult<HttpResponse> {
    let BuildPath {
        app_slug,
        build_slug,
    } = path.into_inner();

    let result = poll_test_execution(
        state.testing.as_ref(),
        state.builds.as_ref(),
        state.analytics.as_ref(),
        &app_slug,
        &build_slug,
    )
    .await?;

    Ok(HttpResponse::Ok().json(result))
}

pub async fn cancel_matrix(
    state: web::Data<AppState>,
    path: web::Path<BuildPath>,
) -> AppResult<HttpResponse> {
    let BuildPath {
        app_slug,
        build_slug,
    } = path.into_inner();

    cancel_test_matrix(
        state.testing.as_ref(),
        state.builds.as_ref(),
        &app_slug,
        &build_slug,
    )
    .await?;

    Ok(HttpResponse::NoContent().finish())
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/apps/{app_slug}/builds/{build_slug}/test")
            .route(web::post().to(start_matrix))
            .route(web::get().to(poll_matrix))
            .route(web::delete().to(cancel_matrix)),
    );
}
