use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use colloquy::{errors::AgentError, models::message::Message};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<Message>,
}

/// Every response, success or failure, is wrapped the same way
#[derive(Debug, Serialize)]
struct Envelope {
    status: u16,
    payload: Value,
    correlation_id: String,
}

fn respond(status: StatusCode, payload: Value, correlation_id: String) -> Response {
    let envelope = Envelope {
        status: status.as_u16(),
        payload,
        correlation_id,
    };
    (status, Json(envelope)).into_response()
}

fn status_for(error: &AgentError) -> StatusCode {
    if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let correlation_id = headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            tracing::debug!(
                correlation_id = %correlation_id,
                "Rejected chat request: {}",
                rejection
            );
            return respond(
                StatusCode::BAD_REQUEST,
                json!(rejection.body_text()),
                correlation_id,
            );
        }
    };

    match state.agent.reply(request.messages).await {
        Ok(messages) => respond(StatusCode::OK, json!(messages), correlation_id),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!(correlation_id = %correlation_id, "Chat turn failed: {}", e);
            }
            respond(status, json!(e.to_string()), correlation_id)
        }
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handler))
        .with_state(state)
}
