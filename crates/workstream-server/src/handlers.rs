use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use workstream_api::{ApiJson, ApiPath, ApiResult};
use workstream_core::{
    NotificationView, ProjectId, SendNotificationRequest, Task, TaskId, TaskInput,
};

use crate::auth::AuthenticatedUser;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Workstream Server",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "status": "ready",
        "streams": state.service.hub().session_count(),
    });
    (StatusCode::OK, Json(body))
}

// ---- Notifications ----

/// `GET /api/v1/notifications/connect/{token}`
///
/// Opens the caller's event stream. Any stream the identity already had is
/// replaced.
pub async fn connect(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let identity = state.auth.authenticate(&token).await?;
    let frames = state.service.connect(identity).map(|frame| {
        Ok::<_, Infallible>(SseEvent::default().event(frame.name.as_str()).data(frame.data))
    });
    Ok(Sse::new(frames).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> ApiResult<Json<Vec<NotificationView>>> {
    let views = state.service.list_for(&identity).await?;
    Ok(Json(views))
}

pub async fn send_notification(
    State(state): State<AppState>,
    AuthenticatedUser(_): AuthenticatedUser,
    ApiPath((project_id, task_id)): ApiPath<(ProjectId, TaskId)>,
    ApiJson(request): ApiJson<SendNotificationRequest>,
) -> ApiResult<Json<NotificationView>> {
    let view = state
        .service
        .send_to_project_manager(project_id, task_id, request)
        .await?;
    Ok(Json(view))
}

// ---- Tasks ----

pub async fn create_task(
    State(state): State<AppState>,
    AuthenticatedUser(_): AuthenticatedUser,
    ApiPath(project_id): ApiPath<ProjectId>,
    ApiJson(input): ApiJson<TaskInput>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.service.create_task(project_id, input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    AuthenticatedUser(_): AuthenticatedUser,
    ApiPath((project_id, task_id)): ApiPath<(ProjectId, TaskId)>,
    ApiJson(input): ApiJson<TaskInput>,
) -> ApiResult<Json<Task>> {
    let task = state.service.update_task(project_id, task_id, input).await?;
    Ok(Json(task))
}
