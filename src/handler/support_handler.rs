// src/handler/support_handler.rs
use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{error::HttpError, models::supportmodel::*, AppState};

pub fn support_handler() -> Router {
    Router::new()
        .route("/snapshot", get(get_snapshot))
        .route("/tickets", get(get_tickets).post(create_ticket))
        .route("/live-chat", post(start_live_chat))
        .route("/tickets/:ticket_id/status", put(update_ticket_status))
        .route("/tickets/:ticket_id/assign", put(assign_ticket))
        .route("/tickets/:ticket_id/read", put(mark_messages_as_read))
        .route("/tickets/:ticket_id/messages", get(get_ticket_messages).post(add_message))
        .route("/selected", put(select_ticket))
        .route("/settings", get(get_settings))
        .route("/settings/online", put(toggle_online))
        .route("/settings/enabled", put(toggle_enabled))
        .route("/reconcile", post(reconcile_orphans))
        .route("/notices", get(get_notices))
}

fn require_support(app_state: &AppState) -> Result<(), HttpError> {
    if !app_state.support_service.viewer().is_support() {
        return Err(HttpError::unauthorized("Only support agents can perform this action"));
    }
    Ok(())
}

fn outcome<T: serde::Serialize>(data: Option<T>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "success",
        "applied": data.is_some(),
        "data": data
    }))
}

pub async fn get_snapshot(Extension(app_state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = app_state.support_service.snapshot().await;

    Json(json!({
        "status": "success",
        "data": snapshot
    }))
}

pub async fn get_tickets(Extension(app_state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let tickets = app_state.support_service.fetch_tickets().await;

    Json(json!({
        "status": "success",
        "data": tickets
    }))
}

pub async fn create_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<CreateTicketDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let ticket = app_state
        .support_service
        .create_ticket(&body.subject, &body.message, body.category, body.is_live_chat, body.priority)
        .await?;

    Ok(outcome(ticket))
}

pub async fn start_live_chat(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<StartLiveChatDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let settings = app_state.support_service.settings().get();
    if settings.affordance(app_state.support_service.viewer().role) != Affordance::LiveChat {
        return Err(HttpError::bad_request("Live chat is not available right now"));
    }

    let ticket = app_state
        .support_service
        .start_live_chat(&body.message, body.category)
        .await?;

    Ok(outcome(ticket))
}

pub async fn update_ticket_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    Json(body): Json<UpdateTicketStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    require_support(&app_state)?;

    let ticket = app_state
        .support_service
        .update_ticket_status(ticket_id, body.status)
        .await?;

    Ok(outcome(ticket))
}

pub async fn assign_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    Json(body): Json<AssignTicketDto>,
) -> Result<impl IntoResponse, HttpError> {
    require_support(&app_state)?;

    let ticket = app_state
        .support_service
        .assign_ticket(ticket_id, body.assigned_to)
        .await?;

    Ok(outcome(ticket))
}

pub async fn mark_messages_as_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let viewer_is_support = app_state.support_service.viewer().is_support();
    let marked = app_state
        .support_service
        .mark_messages_as_read(ticket_id, viewer_is_support)
        .await?;

    Ok(outcome(marked.map(|marked| json!({ "marked": marked }))))
}

pub async fn get_ticket_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
) -> impl IntoResponse {
    let messages = app_state.support_service.fetch_messages(ticket_id).await;

    Json(json!({
        "status": "success",
        "data": messages
    }))
}

pub async fn add_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    Json(body): Json<CreateMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let is_from_support = app_state.support_service.viewer().is_support();
    let message = app_state
        .support_service
        .send_message(ticket_id, &body.content, is_from_support)
        .await?;

    Ok(outcome(message))
}

pub async fn select_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<SelectTicketDto>,
) -> impl IntoResponse {
    let selected = app_state.support_service.set_selected_ticket(body.ticket_id).await;
    let messages = app_state.support_service.messages().await;

    Json(json!({
        "status": "success",
        "data": {
            "selected_ticket": selected,
            "messages": messages
        }
    }))
}

pub async fn get_settings(Extension(app_state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let settings = app_state.support_service.settings().get();
    let affordance = settings.affordance(app_state.support_service.viewer().role);

    Json(json!({
        "status": "success",
        "data": {
            "settings": settings,
            "affordance": affordance
        }
    }))
}

pub async fn toggle_online(Extension(app_state): Extension<Arc<AppState>>) -> Result<impl IntoResponse, HttpError> {
    require_support(&app_state)?;
    let settings = app_state.support_service.toggle_support_online().await;

    Ok(Json(json!({
        "status": "success",
        "data": settings
    })))
}

pub async fn toggle_enabled(Extension(app_state): Extension<Arc<AppState>>) -> Result<impl IntoResponse, HttpError> {
    require_support(&app_state)?;
    let settings = app_state.support_service.toggle_support_enabled().await;

    Ok(Json(json!({
        "status": "success",
        "data": settings
    })))
}

pub async fn reconcile_orphans(Extension(app_state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let attached = app_state.support_service.reconcile_orphans().await;
    let pending = app_state.support_service.pending_orphans().await;

    Json(json!({
        "status": "success",
        "data": { "attached": attached, "pending": pending }
    }))
}

pub async fn get_notices(Extension(app_state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let notices = app_state.notification_service.recent();

    Json(json!({
        "status": "success",
        "data": notices
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::{
        config::Config,
        db::{memorydb::MemoryDB, supportdb::SupportExt},
        routes::create_router,
    };

    fn app(viewer: Viewer) -> (Router, MemoryDB) {
        let db = MemoryDB::new();
        let state = AppState::new(Arc::new(db.clone()), Config::for_viewer(viewer), viewer);
        (create_router(Arc::new(state)), db)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_ticket_then_list_it() {
        let (app, _) = app(Viewer::customer(Uuid::new_v4(), Uuid::new_v4()));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/support/tickets",
                json!({ "subject": "Login issue", "message": "Can't log in", "category": "support" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["applied"], true);
        assert_eq!(body["data"]["status"], "open");

        let response = app
            .oneshot(Request::builder().uri("/api/support/tickets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = read_json(response).await;
        assert_eq!(body["data"].as_array().map(|t| t.len()), Some(1));
        assert_eq!(body["data"][0]["last_message"]["content"], "Can't log in");
    }

    #[tokio::test]
    async fn blank_subject_is_bad_request() {
        let (app, _) = app(Viewer::customer(Uuid::new_v4(), Uuid::new_v4()));

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/support/tickets",
                json!({ "subject": "   ", "message": "Can't log in", "category": "bug" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn customers_cannot_change_status() {
        let (app, _) = app(Viewer::customer(Uuid::new_v4(), Uuid::new_v4()));

        let uri = format!("/api/support/tickets/{}/status", Uuid::new_v4());
        let response = app
            .oneshot(json_request("PUT", &uri, json!({ "status": "closed" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_ticket_status_update_is_not_found() {
        let (app, _) = app(Viewer::support(Uuid::new_v4()));

        let uri = format!("/api/support/tickets/{}/status", Uuid::new_v4());
        let response = app
            .oneshot(json_request("PUT", &uri, json!({ "status": "resolved" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn offline_write_reports_not_applied() {
        let (app, db) = app(Viewer::customer(Uuid::new_v4(), Uuid::new_v4()));
        db.set_offline(true);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/support/tickets",
                json!({ "subject": "Login issue", "message": "Can't log in", "category": "support" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["applied"], false);
    }

    #[tokio::test]
    async fn live_chat_requires_online_support() {
        let (app, _) = app(Viewer::customer(Uuid::new_v4(), Uuid::new_v4()));

        let response = app
            .oneshot(json_request("POST", "/api/support/live-chat", json!({ "message": "Hi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn agent_toggles_online() {
        let (app, db) = app(Viewer::support(Uuid::new_v4()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/support/settings/online")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = read_json(response).await;
        assert_eq!(body["data"]["support_online"], true);
        assert!(db.get_settings().await.unwrap().support_online);
    }

    #[tokio::test]
    async fn failed_toggle_shows_up_in_notices() {
        let (app, db) = app(Viewer::support(Uuid::new_v4()));
        let toggle = || {
            Request::builder()
                .method("PUT")
                .uri("/api/support/settings/online")
                .body(Body::empty())
                .unwrap()
        };

        app.clone().oneshot(toggle()).await.unwrap();
        db.set_offline(true);
        let response = app.clone().oneshot(toggle()).await.unwrap();
        let body = read_json(response).await;
        assert_eq!(body["data"]["support_online"], true);

        let response = app
            .oneshot(Request::builder().uri("/api/support/notices").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = read_json(response).await;
        let notices = body["data"].as_array().cloned().unwrap_or_default();
        assert!(notices.iter().any(|n| n["type"] == "settings_reverted"));
    }

    #[tokio::test]
    async fn message_for_unknown_ticket_is_not_found() {
        let (app, _) = app(Viewer::customer(Uuid::new_v4(), Uuid::new_v4()));

        let uri = format!("/api/support/tickets/{}/messages", Uuid::new_v4());
        let response = app
            .oneshot(json_request("POST", &uri, json!({ "content": "Hello?" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn absorbed_mark_read_reports_not_applied() {
        let (app, db) = app(Viewer::customer(Uuid::new_v4(), Uuid::new_v4()));
        db.set_offline(true);

        let uri = format!("/api/support/tickets/{}/read", Uuid::new_v4());
        let response = app
            .oneshot(Request::builder().method("PUT").uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["applied"], false);
        assert!(body["data"].is_null());
    }
}
