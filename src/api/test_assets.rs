//! Test asset handlers: upload URLs for binaries, download URLs for results.

use actix_web::{HttpResponse, web};

use crate::error::AppResult;
use crate::models::TestAssetsRequest;
use crate::services::test_assets;

use super::AppState;
use super::test_matrix::BuildPath;

/// Issue upload URLs for a build that has no record yet. The body is optional.
pub async fn request_upload_urls(
    state: web::Data<AppState>,
    path: web::Path<BuildPath>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let BuildPath {
        app_slug,
        build_slug,
    } = path.into_inner();

    let request: TestAssetsRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TestAssetsRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let urls = test_assets::upload_urls(
        state.builds.as_ref(),
        state.resolver.as_ref(),
        state.analytics.as_ref(),
        &state.bucket,
        &app_slug,
        &build_slug,
        &request,
    )
    .await?;

    Ok(HttpResponse::Ok().json(urls))
}

/// Map of result file names to signed download URLs.
pub async fn list_download_urls(
    state: web::Data<AppState>,
    path: web::Path<BuildPath>,
) -> AppResult<HttpResponse> {
    let files =
        test_assets::download_urls(state.resolver.as_ref(), &state.bucket, &path.build_slug)
            .await?;

    Ok(HttpResponse::Ok().json(files))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/apps/{app_slug}/builds/{build_slug}/test/assets")
            .route(web::post().to(request_upload_urls))
            .route(web::get().to(list_download_urls)),
    );
}
