//! Client for the remote device-testing and tool-results REST APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::TestingSettings;
use crate::error::{AppError, AppResult};
use crate::models::matrix::{StartedMatrix, TestMatrixRequest, TestMatrixStatus};
use crate::models::step::{ExecutionStep, ListStepsResponse};

use super::catalog::TestEnvironmentCatalog;

/// Field selection for matrix status polls.
pub const MATRIX_FIELDS: &str =
    "invalidMatrixDetails,state,testExecutions(toolResultsStep(historyId,executionId))";

/// Field selection for step listings.
pub const STEP_FIELDS: &str = "steps(state,name,outcome,dimensionValue,testExecutionStep)";

/// Operations consumed from the remote testing service.
#[async_trait]
pub trait TestingService: Send + Sync {
    async fn get_matrix(&self, matrix_id: &str) -> AppResult<TestMatrixStatus>;

    async fn list_steps(&self, history_id: &str, execution_id: &str)
    -> AppResult<Vec<ExecutionStep>>;

    /// Find or create the results history of an app.
    async fn ensure_history(&self, app_slug: &str) -> AppResult<String>;

    /// Submit a prepared matrix. `request_id` makes the submission idempotent.
    async fn create_matrix(
        &self,
        matrix: &TestMatrixRequest,
        request_id: &str,
    ) -> AppResult<StartedMatrix>;

    async fn cancel_matrix(&self, matrix_id: &str) -> AppResult<()>;

    /// Environment catalog of one platform (`ANDROID` or `IOS`).
    async fn environment_catalog(&self, platform: &str) -> AppResult<TestEnvironmentCatalog>;

    fn project_id(&self) -> &str;
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct History {
    #[serde(default)]
    history_id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize, Default)]
struct ListHistoriesResponse {
    #[serde(default)]
    histories: Vec<History>,
}

/// REST implementation authenticated with a bearer token.
#[derive(Clone)]
pub struct RestTestingService {
    client: Client,
    api_url: String,
    toolresults_url: String,
    project_id: String,
    access_token: SecretString,
}

impl RestTestingService {
    pub fn new(settings: &TestingSettings) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            toolresults_url: settings.toolresults_url.trim_end_matches('/').to_string(),
            project_id: settings.project_id.clone(),
            access_token: settings.access_token.clone(),
        })
    }

    fn project_path(&self) -> String {
        urlencoding::encode(&self.project_id).into_owned()
    }

    async fn read<T: DeserializeOwned>(
        response: reqwest::Response,
        action: &str,
    ) -> AppResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::TransientUpstream(format!(
                "Failed to {}: {} - {}",
                action, status, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::TransientUpstream(format!("Failed to {}: {}", action, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, action: &str) -> AppResult<T> {
        debug!(url = %url, "GET testing service");
        let response = self
            .client
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| AppError::TransientUpstream(format!("Failed to {}: {}", action, e)))?;
        Self::read(response, action).await
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        action: &str,
    ) -> AppResult<T> {
        debug!(url = %url, "POST testing service");
        let response = self
            .client
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::TransientUpstream(format!("Failed to {}: {}", action, e)))?;
        Self::read(response, action).await
    }
}

#[async_trait]
impl TestingService for RestTestingService {
    async fn get_matrix(&self, matrix_id: &str) -> AppResult<TestMatrixStatus> {
        let url = format!(
            "{}/projects/{}/testMatrices/{}?fields={}",
            self.api_url,
            self.project_path(),
            urlencoding::encode(matrix_id),
            urlencoding::encode(MATRIX_FIELDS)
        );
        self.get_json(&url, "get test matrix").await
    }

    async fn list_steps(
        &self,
        history_id: &str,
        execution_id: &str,
    ) -> AppResult<Vec<ExecutionStep>> {
        let base = format!(
            "{}/projects/{}/histories/{}/executions/{}/steps?fields={}",
            self.toolresults_url,
            self.project_path(),
            urlencoding::encode(history_id),
            urlencoding::encode(execution_id),
            urlencoding::encode(&format!("{},nextPageToken", STEP_FIELDS))
        );

        let mut steps = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = match &page_token {
                Some(token) => format!("{}&pageToken={}", base, urlencoding::encode(token)),
                None => base.clone(),
            };
            let page: ListStepsResponse = self.get_json(&url, "list steps").await?;
            steps.extend(page.steps);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(steps)
    }

    async fn ensure_history(&self, app_slug: &str) -> AppResult<String> {
        let url = format!(
            "{}/projects/{}/histories?filterByName={}",
            self.toolresults_url,
            self.project_path(),
            urlencoding::encode(app_slug)
        );
        let existing: ListHistoriesResponse = self.get_json(&url, "list histories").await?;
        if let Some(history) = existing
            .histories
            .into_iter()
            .find(|h| h.name == app_slug && !h.history_id.is_empty())
        {
            return Ok(history.history_id);
        }

        let url = format!(
            "{}/projects/{}/histories",
            self.toolresults_url,
            self.project_path()
        );
        let created: History = self
            .post_json(
                &url,
                &serde_json::json!({"displayName": app_slug, "name": app_slug}),
                "create history",
            )
            .await?;
        info!(app_slug = %app_slug, history_id = %created.history_id, "Created results history");
        Ok(created.history_id)
    }

    async fn create_matrix(
        &self,
        matrix: &TestMatrixRequest,
        request_id: &str,
    ) -> AppResult<StartedMatrix> {
        let url = format!(
            "{}/projects/{}/testMatrices?requestId={}&fields={}",
            self.api_url,
            self.project_path(),
            urlencoding::encode(request_id),
            urlencoding::encode("testMatrixId,timestamp")
        );
        self.post_json(&url, matrix, "create test matrix").await
    }

    async fn cancel_matrix(&self, matrix_id: &str) -> AppResult<()> {
        let url = format!(
            "{}/projects/{}/testMatrices/{}:cancel",
            self.api_url,
            self.project_path(),
            urlencoding::encode(matrix_id)
        );
        let _: serde_json::Value = self
            .post_json(&url, &serde_json::json!({}), "cancel test matrix")
            .await?;
        Ok(())
    }

    async fn environment_catalog(&self, platform: &str) -> AppResult<TestEnvironmentCatalog> {
        let url = format!(
            "{}/testEnvironmentCatalog/{}?projectId={}",
            self.api_url,
            urlencoding::encode(platform),
            self.project_path()
        );
        self.get_json(&url, "get device catalog").await
    }

    fn project_id(&self) -> &str {
        &self.project_id
    }
}
