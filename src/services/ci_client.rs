//! Client posting step results to the CI system.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::config::CiSettings;
use crate::error::{AppError, AppResult};
use crate::models::step_result::{LintStepResult, TestStepResult};

/// Header carrying the per-app CI token.
pub const AUTH_HEADER: &str = "Bitrise-Addon-Auth-Token";

#[async_trait]
pub trait CiClient: Send + Sync {
    async fn create_test_step_result(
        &self,
        token: &SecretString,
        app_slug: &str,
        build_slug: &str,
        result: &TestStepResult,
    ) -> AppResult<()>;

    async fn create_lint_step_result(
        &self,
        token: &SecretString,
        app_slug: &str,
        build_slug: &str,
        result: &LintStepResult,
    ) -> AppResult<()>;
}

/// REST client for the CI API.
#[derive(Clone)]
pub struct RestCiClient {
    client: Client,
    base_url: String,
}

impl RestCiClient {
    pub fn new(settings: &CiSettings) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + Sync>(
        &self,
        token: &SecretString,
        action: &str,
        body: &T,
    ) -> AppResult<()> {
        let url = format!("{}/{}", self.base_url, action);
        debug!(url = %url, "Posting step result");

        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::QueuePublishFailed(format!("POST {} failed: {}", action, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::QueuePublishFailed(format!(
                "POST {} returned {} - {}",
                action, status, body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl CiClient for RestCiClient {
    async fn create_test_step_result(
        &self,
        token: &SecretString,
        app_slug: &str,
        build_slug: &str,
        result: &TestStepResult,
    ) -> AppResult<()> {
        let action = format!(
            "apps/{}/builds/{}/test_step_results",
            urlencoding::encode(app_slug),
            urlencoding::encode(build_slug)
        );
        self.post(token, &action, result).await
    }

    async fn create_lint_step_result(
        &self,
        token: &SecretString,
        app_slug: &str,
        build_slug: &str,
        result: &LintStepResult,
    ) -> AppResult<()> {
        let action = format!(
            "apps/{}/builds/{}/lint_step_results",
            urlencoding::encode(app_slug),
            urlencoding::encode(build_slug)
        );
        self.post(token, &action, result).await
    }
}
