use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tb_core::{Activity, ChannelError};
use tracing::{error, warn};

use crate::client::InboundOutcome;
use crate::registry::ClientRegistry;

#[derive(Clone)]
pub struct AppState {
    pub clients: ClientRegistry,
}

impl AppState {
    pub fn new(clients: ClientRegistry) -> Self {
        Self { clients }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/teams/{bot_id}/messages", post(receive_activity))
        .route("/healthz", get(healthz))
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid activity: {0}")]
    BadRequest(#[source] serde_json::Error),
    #[error("no teams channel mounted for bot '{0}'")]
    UnknownBot(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RouteError::UnknownBot(_) => StatusCode::NOT_FOUND,
            RouteError::Channel(ChannelError::Delivery(_)) => StatusCode::BAD_GATEWAY,
            RouteError::Channel(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, "teams activity handling failed");
        } else {
            warn!(error = %self, "teams activity rejected");
        }
        let message = match &self {
            RouteError::Channel(_) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct Accepted {
    outcome: &'static str,
}

async fn receive_activity(
    State(state): State<AppState>,
    Path(bot_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Accepted>), RouteError> {
    let client = state
        .clients
        .get(&bot_id)
        .ok_or_else(|| RouteError::UnknownBot(bot_id.clone()))?;
    let activity: Activity = serde_json::from_slice(&body).map_err(RouteError::BadRequest)?;

    let outcome = match client.on_inbound_activity(activity).await? {
        InboundOutcome::Published => "published",
        InboundOutcome::Welcomed => "welcomed",
        InboundOutcome::Dropped(_) => "ignored",
    };
    Ok((StatusCode::OK, Json(Accepted { outcome })))
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "bots": state.clients.bot_ids() }))
}
