//! Signed URLs for uploading test binaries and downloading run results.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::info;

use crate::db::BuildStore;
use crate::error::{AppError, AppResult};
use crate::models::{Build, TestAssetUploadUrls, TestAssetsRequest};

use super::analytics::{self, AnalyticsSink, UPLOAD_REQUESTED_EVENT};
use super::matrix::{app_path, results_path};
use super::storage::{ArtifactResolver, normalize_object_path};

pub const MAX_OBB_FILES: usize = 10;

fn validate_obb_name(name: &str) -> AppResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(AppError::InvalidInput(format!(
            "Invalid obb file name: '{}'",
            name
        )));
    }
    Ok(())
}

/// Hand out upload URLs for the binaries of a new build and open its session.
///
/// Only a build without a record may upload; the record is created here.
pub async fn upload_urls(
    builds: &dyn BuildStore,
    resolver: &dyn ArtifactResolver,
    sink: &dyn AnalyticsSink,
    bucket: &str,
    app_slug: &str,
    build_slug: &str,
    request: &TestAssetsRequest,
) -> AppResult<TestAssetUploadUrls> {
    if builds.find_build(app_slug, build_slug).await?.is_some() {
        return Err(AppError::Conflict("Build already exists".to_string()));
    }

    if request.obb_files.len() > MAX_OBB_FILES {
        return Err(AppError::InvalidInput(format!(
            "More than {} obb files requested",
            MAX_OBB_FILES
        )));
    }
    for name in &request.obb_files {
        validate_obb_name(name)?;
    }

    let app_url = resolver
        .upload_url(&app_path(bucket, build_slug, "app.apk"))
        .await?;
    let test_app_url = resolver
        .upload_url(&app_path(bucket, build_slug, "app-test.apk"))
        .await?;

    let mut obb_urls = BTreeMap::new();
    for name in &request.obb_files {
        let url = resolver.upload_url(&app_path(bucket, build_slug, name)).await?;
        obb_urls.insert(name.clone(), url);
    }

    builds
        .save_build(&Build {
            build_session_enabled: true,
            last_request: Some(Utc::now()),
            ..Build::new(app_slug, build_slug)
        })
        .await?;

    info!(
        app_slug = %app_slug,
        build_slug = %build_slug,
        obb_files = obb_urls.len(),
        "Issued test asset upload URLs"
    );
    analytics::send_run_event(sink, UPLOAD_REQUESTED_EVENT, app_slug, build_slug, "", &[]);

    Ok(TestAssetUploadUrls {
        app_url,
        test_app_url,
        obb_urls,
    })
}

/// Download URL of every result file of a build.
///
/// Keys are the paths below the results folder with `/` replaced by `_`.
pub async fn download_urls(
    resolver: &dyn ArtifactResolver,
    bucket: &str,
    build_slug: &str,
) -> AppResult<BTreeMap<String, String>> {
    let root = normalize_object_path(&results_path(bucket, build_slug), bucket);

    let mut files = BTreeMap::new();
    for key in resolver.list(&root).await? {
        let name = key.strip_prefix(&root).unwrap_or(&key).replace('/', "_");
        if name.is_empty() {
            continue;
        }
        let url = resolver.resolve(&key).await?;
        files.insert(name, url);
    }

    Ok(files)
}
