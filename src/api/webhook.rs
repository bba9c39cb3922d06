//! CI build webhook handler.

use actix_web::{HttpRequest, HttpResponse, web};

use crate::error::AppResult;
use crate::models::BuildEvent;
use crate::services::webhook::CI_EVENT_HEADER;

use super::AppState;

pub async fn handle_build_event(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<BuildEvent>,
) -> AppResult<HttpResponse> {
    let event_type = req
        .headers()
        .get(CI_EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let ack = state.webhooks.handle(event_type, &body).await?;

    Ok(HttpResponse::Ok().json(ack))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/webhook").route(web::post().to(handle_build_event)));
}
