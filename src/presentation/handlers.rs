// HTTP request handlers
use crate::application::monitor::{MonitorError, MonitorStatus, SeriesSnapshot};
use crate::application::recorder::{RecordingError, RecordingStatus};
use crate::domain::sensor::{SensorKey, UnknownSensor};
use crate::domain::window::WindowSnapshot;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

pub fn status_for(err: &MonitorError) -> StatusCode {
    match err {
        MonitorError::Window(_) => StatusCode::BAD_REQUEST,
        MonitorError::Recording(RecordingError::AlreadyActive) => StatusCode::CONFLICT,
        MonitorError::Recording(RecordingError::NoSeriesSelected) => StatusCode::UNPROCESSABLE_ENTITY,
        MonitorError::Recording(RecordingError::Open(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        MonitorError::Recording(RecordingError::Write(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        MonitorError::InvalidRecordingPath(_) => StatusCode::BAD_REQUEST,
        MonitorError::SelectionLocked => StatusCode::CONFLICT,
        MonitorError::NotPlotted(_) => StatusCode::BAD_REQUEST,
        MonitorError::InvalidActionDuration(_) => StatusCode::BAD_REQUEST,
        MonitorError::ActionBusy(_) => StatusCode::CONFLICT,
        MonitorError::DeviceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        MonitorError::Transport(_) => StatusCode::BAD_GATEWAY,
        MonitorError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        Self::new(status_for(&err), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(status = %self.status, error = %self.message, "request failed");
        }
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Deserialize)]
pub struct TimeFrameRequest {
    pub seconds: i64,
}

#[derive(Deserialize)]
pub struct ScrollRequest {
    pub position: u32,
}

#[derive(Deserialize)]
pub struct SeriesToggleRequest {
    pub active: bool,
}

#[derive(Deserialize)]
pub struct StartRecordingRequest {
    /// Relative to `storage.recordings_dir`.
    pub path: PathBuf,
}

#[derive(Deserialize)]
pub struct ActionRequest {
    pub seconds: u8,
}

#[derive(Serialize)]
pub struct PauseResponse {
    pub paused: bool,
}

#[derive(Serialize)]
pub struct SeriesToggleResponse {
    pub key: SensorKey,
    pub active: bool,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> ApiResult<MonitorStatus> {
    Ok(Json(state.monitor.status().await?))
}

/// Visible points of every active series
pub async fn get_series(State(state): State<Arc<AppState>>) -> ApiResult<SeriesSnapshot> {
    Ok(Json(state.monitor.snapshot().await?))
}

/// Server-sent events, one `tick` event per published reading set
pub async fn stream_updates(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.monitor.subscribe();
    let mut shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        loop {
            let received = tokio::select! {
                received = rx.recv() => received,
                _ = shutdown.changed() => break,
            };
            match received {
                Ok(payload) => yield Ok(Event::default().event("tick").data(payload)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "live view subscriber lagging");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn toggle_pause(State(state): State<Arc<AppState>>) -> ApiResult<PauseResponse> {
    let paused = state.monitor.toggle_pause().await?;
    Ok(Json(PauseResponse { paused }))
}

pub async fn set_time_frame(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TimeFrameRequest>,
) -> ApiResult<WindowSnapshot> {
    Ok(Json(state.monitor.set_time_frame(request.seconds).await?))
}

pub async fn scroll(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScrollRequest>,
) -> ApiResult<WindowSnapshot> {
    Ok(Json(state.monitor.scroll_to(request.position).await?))
}

pub async fn track(State(state): State<Arc<AppState>>) -> ApiResult<WindowSnapshot> {
    Ok(Json(state.monitor.track().await?))
}

pub async fn set_series_active(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SeriesToggleRequest>,
) -> ApiResult<SeriesToggleResponse> {
    let key: SensorKey = key
        .parse()
        .map_err(|err: UnknownSensor| ApiError::new(StatusCode::NOT_FOUND, err.to_string()))?;
    state.monitor.set_series_active(key, request.active).await?;
    Ok(Json(SeriesToggleResponse {
        key,
        active: request.active,
    }))
}

pub async fn start_recording(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRecordingRequest>,
) -> ApiResult<RecordingStatus> {
    Ok(Json(state.monitor.start_recording(request.path).await?))
}

pub async fn stop_recording(State(state): State<Arc<AppState>>) -> ApiResult<RecordingStatus> {
    Ok(Json(state.monitor.stop_recording().await?))
}

pub async fn recording_status(State(state): State<Arc<AppState>>) -> ApiResult<RecordingStatus> {
    Ok(Json(state.monitor.recording_status().await?))
}

pub async fn device_action(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActionRequest>,
) -> Result<StatusCode, ApiError> {
    state.monitor.request_action(request.seconds).await?;
    Ok(StatusCode::ACCEPTED)
}
