//! Health check endpoints.

use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use sea_orm::ConnectionTrait;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    database: &'static str,
    device_catalog: &'static str,
}

/// Returns 200 while the process is up.
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Returns 200 once the database answers. An empty device catalog is
/// reported but does not fail readiness.
#[get("/ready")]
pub async fn ready(state: web::Data<AppState>) -> HttpResponse {
    let device_catalog = if state.catalog.is_empty() {
        "empty"
    } else {
        "loaded"
    };

    let database = match &state.db {
        Some(pool) => {
            let stmt = sea_orm::Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT 1".to_owned(),
            );
            match pool.connection().query_one_raw(stmt).await {
                Ok(_) => "connected",
                Err(_) => {
                    return HttpResponse::ServiceUnavailable().json(serde_json::json!({
                        "error": "NOT_READY",
                        "message": "Database connection failed"
                    }));
                }
            }
        }
        None => "in-memory",
    };

    HttpResponse::Ok().json(ReadyResponse {
        status: "ready",
        database,
        device_catalog,
    })
}

pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(ready);
}
