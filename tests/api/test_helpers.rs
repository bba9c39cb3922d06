//! Shared fakes and app construction for API tests.

use std::collections::{HashMap, VecDeque};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use actix_web::dev::{Service, ServiceResponse};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, test, web};
use async_trait::async_trait;
use device_test_results::api::{self, AppDeps, AppState};
use device_test_results::db::MemoryStore;
use device_test_results::error::{AppError, AppResult};
use device_test_results::middleware::RequestLogger;
use device_test_results::models::{
    ExecutionStep, StartedMatrix, TestMatrixRequest, TestMatrixStatus,
};
use device_test_results::services::analytics::AnalyticsEvent;
use device_test_results::services::catalog::TestEnvironmentCatalog;
use device_test_results::services::storage::normalize_object_path;
use device_test_results::services::{
    AnalyticsSink, ArtifactResolver, DeviceCatalog, MemoryJobStore, PublishQueue, TestingService,
};

pub const BUCKET: &str = "test-bucket";

/// Testing service answering from scripted queues.
#[derive(Default)]
pub struct ScriptedTesting {
    pub matrices: Mutex<VecDeque<TestMatrixStatus>>,
    pub steps: Mutex<VecDeque<Vec<ExecutionStep>>>,
    pub created: Mutex<Vec<TestMatrixRequest>>,
    pub cancelled: Mutex<Vec<String>>,
}

impl ScriptedTesting {
    pub fn push_matrix(&self, json: serde_json::Value) {
        self.matrices
            .lock()
            .unwrap()
            .push_back(serde_json::from_value(json).unwrap());
    }

    pub fn push_steps(&self, json: serde_json::Value) {
        self.steps
            .lock()
            .unwrap()
            .push_back(serde_json::from_value(json).unwrap());
    }
}

#[async_trait]
impl TestingService for ScriptedTesting {
    async fn get_matrix(&self, _matrix_id: &str) -> AppResult<TestMatrixStatus> {
        self.matrices
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::TransientUpstream("no matrix scripted".to_string()))
    }

    async fn list_steps(&self, _history_id: &str, _execution_id: &str) -> AppResult<Vec<ExecutionStep>> {
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::TransientUpstream("no steps scripted".to_string()))
    }

    async fn ensure_history(&self, app_slug: &str) -> AppResult<String> {
        Ok(format!("history-{}", app_slug))
    }

    async fn create_matrix(&self, matrix: &TestMatrixRequest, _request_id: &str) -> AppResult<StartedMatrix> {
        self.created.lock().unwrap().push(matrix.clone());
        Ok(StartedMatrix {
            test_matrix_id: "matrix-42".to_string(),
            timestamp: "2024-03-01T10:00:00Z".to_string(),
        })
    }

    async fn cancel_matrix(&self, matrix_id: &str) -> AppResult<()> {
        self.cancelled.lock().unwrap().push(matrix_id.to_string());
        Ok(())
    }

    async fn environment_catalog(&self, _platform: &str) -> AppResult<TestEnvironmentCatalog> {
        Ok(TestEnvironmentCatalog::default())
    }

    fn project_id(&self) -> &str {
        "test-project"
    }
}

/// Resolves object paths to URLs on the local file server.
pub struct FileServerResolver {
    pub base: String,
    /// Keys reported by `list`.
    pub objects: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactResolver for FileServerResolver {
    async fn resolve(&self, path: &str) -> AppResult<String> {
        Ok(format!("{}/{}", self.base, normalize_object_path(path, BUCKET)))
    }

    async fn upload_url(&self, path: &str) -> AppResult<String> {
        Ok(format!("{}/{}?upload", self.base, normalize_object_path(path, BUCKET)))
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let prefix = normalize_object_path(prefix, BUCKET);
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingAnalytics {
    pub events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingAnalytics {
    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn track(&self, event: AnalyticsEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Local HTTP server standing in for the object store.
pub struct FileServer {
    pub base: String,
    files: Arc<Mutex<HashMap<String, String>>>,
}

impl FileServer {
    /// Serve `body` under the object key.
    pub fn put(&self, key: &str, body: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), body.to_string());
    }
}

/// Serve bodies by path; anything else is 404.
pub async fn start_file_server() -> FileServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let files: Arc<Mutex<HashMap<String, String>>> = Arc::default();
    let data = web::Data::from(files.clone());

    let server = HttpServer::new(move || {
        App::new().app_data(data.clone()).default_service(web::to(
            |req: HttpRequest, files: web::Data<Mutex<HashMap<String, String>>>| async move {
                let key = req.path().trim_start_matches('/').to_string();
                match files.lock().unwrap().get(&key) {
                    Some(body) => HttpResponse::Ok().body(body.clone()),
                    None => HttpResponse::NotFound().finish(),
                }
            },
        ))
    })
    .workers(1)
    .listen(listener)
    .unwrap()
    .disable_signals()
    .run();

    tokio::spawn(server);
    FileServer { base, files }
}

/// Everything a test needs to drive and inspect the service.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub jobs: Arc<MemoryJobStore>,
    pub testing: Arc<ScriptedTesting>,
    pub analytics: Arc<RecordingAnalytics>,
    pub resolver: Arc<FileServerResolver>,
    pub state: AppState,
}

impl Harness {
    pub fn new(files_base: &str) -> Self {
        let store = Arc::new(MemoryStore::new());
        let jobs = Arc::new(MemoryJobStore::new());
        let testing = Arc::new(ScriptedTesting::default());
        let analytics = Arc::new(RecordingAnalytics::default());
        let resolver = Arc::new(FileServerResolver {
            base: files_base.to_string(),
            objects: Mutex::default(),
        });

        let state = AppState::new(AppDeps {
            testing: testing.clone(),
            builds: store.clone(),
            reports: store.clone(),
            resolver: resolver.clone(),
            analytics: analytics.clone(),
            catalog: Arc::new(DeviceCatalog::empty()),
            queue: PublishQueue::new(jobs.clone()),
            http: reqwest::Client::new(),
            bucket: BUCKET.to_string(),
            publish_delay_secs: 0,
            db: None,
        });

        Harness {
            store,
            jobs,
            testing,
            analytics,
            resolver,
            state,
        }
    }

    pub async fn app(
        &self,
    ) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
        test::init_service(
            App::new()
                .wrap(RequestLogger)
                .app_data(web::Data::new(self.state.clone()))
                .app_data(web::JsonConfig::default().error_handler(api::json_error_handler))
                .service(web::scope("/api/v1").configure(api::configure_routes)),
        )
        .await
    }
}
