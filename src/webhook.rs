// ABOUTME: HTTP webhook server exposing the guild actions and invite cache reads.
// ABOUTME: Each POST handler verifies the payload signature, validates fields, then bridges to the session.

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::{
    bridge::{BridgeError, CommandBridge},
    config::Config,
    gateway::CommandError,
    metrics,
    signature::{strip_bom, SignatureVerifier},
    store::AppendLog,
};
use metrics_exporter_prometheus::PrometheusHandle;

/// Auto-archive window for threads opened on webhook messages.
const THREAD_AUTO_ARCHIVE_MINUTES: u16 = 1440;
/// Discord caps thread names at 100 characters.
const THREAD_NAME_MAX_CHARS: usize = 100;
/// Invites expire after a day and admit a single use.
const INVITE_MAX_AGE_SECS: u32 = 86400;
const INVITE_MAX_USES: u8 = 1;
/// Audit-log reason attached to webhook-triggered kicks.
const KICK_REASON: &str = "action triggered via webhook";

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: CommandBridge,
    pub verifier: SignatureVerifier,
    pub invites: AppendLog<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct InviteCreatedResponse {
    status: &'static str,
    invite_url: String,
}

#[derive(Debug, Serialize)]
struct LastInviteResponse {
    status: &'static str,
    last_invite: String,
}

#[derive(Debug, Serialize)]
struct InviteListResponse {
    status: &'static str,
    invites: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn unauthorized() -> Response {
    metrics::record_webhook_request("unauthorized");
    error_response(StatusCode::UNAUTHORIZED, "unauthorized")
}

fn not_ready() -> Response {
    metrics::record_webhook_request("not_ready");
    error_response(StatusCode::SERVICE_UNAVAILABLE, "bot not ready")
}

fn bad_request(message: impl Into<String>) -> Response {
    metrics::record_webhook_request("bad_request");
    error_response(StatusCode::BAD_REQUEST, message)
}

/// Start the webhook HTTP server. Serves until the process exits.
pub async fn start_webhook_server(
    config: Arc<Config>,
    bridge: CommandBridge,
    invites: AppendLog<String>,
) -> Result<()> {
    let metrics_handle =
        metrics::init_metrics().context("Failed to initialize Prometheus metrics")?;

    let state = Arc::new(AppState {
        bridge,
        verifier: SignatureVerifier::new(config.webhook.secret.as_str()),
        invites,
    });

    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::new(metrics_handle));

    let app = router(state)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.webhook.host, config.webhook.port);
    tracing::info!(addr = %addr, "Starting webhook server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Webhook routes over the given state. Split out so tests can drive the
/// router without binding a socket.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook/send_message", post(send_message_handler))
        .route("/webhook/kick_member", post(kick_member_handler))
        .route("/webhook/create_invite", post(create_invite_handler))
        .route("/webhook/get_last_invite", get(get_last_invite_handler))
        .route("/webhook/get_all_invites", get(get_all_invites_handler))
        .with_state(state)
}

/// Check the payload signature; logs and counts the rejection.
fn authorize(state: &AppState, op: &'static str, headers: &HeaderMap, body: &[u8]) -> bool {
    let signature = headers
        .get("X-Signature")
        .and_then(|value| value.to_str().ok());
    if state.verifier.verify(body, signature) {
        true
    } else {
        tracing::warn!(op, "webhook signature verification failed");
        metrics::record_error("webhook_auth");
        false
    }
}

fn parse_json(body: &[u8]) -> Result<Value, String> {
    serde_json::from_slice(strip_bom(body)).map_err(|e| format!("Bad JSON: {}", e))
}

/// Accepts a JSON integer or a numeric string, the way loosely typed
/// senders deliver ids.
fn coerce_u64(value: Option<&Value>) -> Option<u64> {
    match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Thread name fallback when the sender omits one: the message itself,
/// clipped to the platform limit.
fn default_thread_name(message: &str) -> String {
    message.chars().take(THREAD_NAME_MAX_CHARS).collect()
}

#[derive(Debug)]
struct SendMessageRequest {
    message: String,
    channel_id: u64,
    thread_message: Option<String>,
    thread_name: Option<String>,
}

impl SendMessageRequest {
    fn parse(data: &Value) -> Result<Self, String> {
        let message = match string_field(data, "message") {
            Some(m) if !m.is_empty() => m,
            _ => return Err("message is required".to_string()),
        };
        let channel_id = coerce_u64(data.get("channel_id"))
            .ok_or_else(|| "invalid channel_id".to_string())?;
        Ok(Self {
            message,
            channel_id,
            thread_message: string_field(data, "thread_message"),
            thread_name: string_field(data, "thread_name"),
        })
    }
}

/// Handle POST /webhook/send_message
async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    tracing::debug!(len = body.len(), "send_message webhook received");

    if !authorize(&state, "send_message", &headers, &body) {
        return unauthorized();
    }

    let data = match parse_json(&body) {
        Ok(data) => data,
        Err(detail) => {
            tracing::warn!(error = %detail, "send_message payload is not valid JSON");
            return bad_request(detail);
        }
    };
    let request = match SendMessageRequest::parse(&data) {
        Ok(request) => request,
        Err(detail) => {
            tracing::warn!(error = %detail, "send_message payload failed validation");
            return bad_request(detail);
        }
    };

    if !state.bridge.is_ready() {
        tracing::warn!("send_message rejected, session not ready");
        return not_ready();
    }

    let channel_id = request.channel_id;
    let outcome = state
        .bridge
        .submit("send_message", move |gateway| async move {
            let message_id = gateway
                .send_message(request.channel_id, &request.message)
                .await?;
            let thread_name = request
                .thread_name
                .unwrap_or_else(|| default_thread_name(&request.message));
            let thread_id = gateway
                .create_thread(
                    request.channel_id,
                    message_id,
                    &thread_name,
                    THREAD_AUTO_ARCHIVE_MINUTES,
                )
                .await?;
            if let Some(text) = request.thread_message {
                gateway.send_in_thread(thread_id, &text).await?;
            }
            Ok::<(), CommandError>(())
        })
        .await;

    match outcome {
        Ok(()) => {
            tracing::info!(channel_id, "message and thread sent");
            metrics::record_webhook_request("success");
            metrics::record_command("send_message", "success");
            (
                StatusCode::OK,
                Json(StatusResponse {
                    status: "success",
                    message: "message sent successfully".to_string(),
                }),
            )
                .into_response()
        }
        Err(BridgeError::NotReady) => not_ready(),
        Err(err) => {
            tracing::error!(channel_id, error = %err, "error sending message");
            metrics::record_webhook_request("error");
            metrics::record_command("send_message", "error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to send message")
        }
    }
}

/// Handle POST /webhook/kick_member
async fn kick_member_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    tracing::debug!(len = body.len(), "kick_member webhook received");

    if !authorize(&state, "kick_member", &headers, &body) {
        return unauthorized();
    }

    let data = match parse_json(&body) {
        Ok(data) => data,
        Err(detail) => {
            tracing::warn!(error = %detail, "kick_member payload is not valid JSON");
            return bad_request(detail);
        }
    };
    let Some(discord_id) = coerce_u64(data.get("discord_id")) else {
        tracing::warn!("kick_member payload has no usable discord_id");
        return bad_request("invalid discord_id");
    };

    if !state.bridge.is_ready() {
        tracing::warn!("kick_member rejected, session not ready");
        return not_ready();
    }

    let outcome = state
        .bridge
        .submit("kick_member", move |gateway| async move {
            gateway.kick_member(discord_id, KICK_REASON).await
        })
        .await;

    match outcome {
        Ok(()) => {
            tracing::info!(discord_id, "kicked member");
            metrics::record_webhook_request("success");
            metrics::record_command("kick_member", "success");
            (
                StatusCode::OK,
                Json(StatusResponse {
                    status: "success",
                    message: format!("Member {} kicked successfully", discord_id),
                }),
            )
                .into_response()
        }
        Err(BridgeError::NotReady) => not_ready(),
        Err(err) => {
            tracing::error!(discord_id, error = %err, "error kicking member");
            metrics::record_webhook_request("error");
            metrics::record_command("kick_member", "error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to kick member")
        }
    }
}

/// Handle POST /webhook/create_invite
async fn create_invite_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorize(&state, "create_invite", &headers, &body) {
        return unauthorized();
    }

    if !state.bridge.is_ready() {
        tracing::warn!("create_invite rejected, session not ready");
        return not_ready();
    }

    let invites = state.invites.clone();
    let outcome = state
        .bridge
        .submit("create_invite", move |gateway| async move {
            let url = gateway
                .create_invite(INVITE_MAX_AGE_SECS, INVITE_MAX_USES)
                .await?;
            invites.append(url.clone());
            tracing::info!(invite_url = %url, "created invite");
            Ok::<String, CommandError>(url)
        })
        .await;

    match outcome {
        Ok(invite_url) => {
            metrics::record_webhook_request("success");
            metrics::record_command("create_invite", "success");
            metrics::record_invite_created();
            (
                StatusCode::OK,
                Json(InviteCreatedResponse {
                    status: "success",
                    invite_url,
                }),
            )
                .into_response()
        }
        Err(BridgeError::NotReady) => not_ready(),
        Err(err) => {
            tracing::error!(error = %err, "error creating invite");
            metrics::record_webhook_request("error");
            metrics::record_command("create_invite", "error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "could not create invite")
        }
    }
}

/// Handle GET /webhook/get_last_invite
async fn get_last_invite_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.invites.last() {
        Some(last_invite) => {
            metrics::record_webhook_request("success");
            (
                StatusCode::OK,
                Json(LastInviteResponse {
                    status: "success",
                    last_invite,
                }),
            )
                .into_response()
        }
        None => {
            metrics::record_webhook_request("not_found");
            error_response(StatusCode::NOT_FOUND, "no invites found")
        }
    }
}

/// Handle GET /webhook/get_all_invites
async fn get_all_invites_handler(State(state): State<Arc<AppState>>) -> Response {
    let invites = state.invites.snapshot();
    if invites.is_empty() {
        metrics::record_webhook_request("not_found");
        return error_response(StatusCode::NOT_FOUND, "no invites found");
    }
    metrics::record_webhook_request("success");
    (
        StatusCode::OK,
        Json(InviteListResponse {
            status: "success",
            invites,
        }),
    )
        .into_response()
}

/// Handle GET /metrics - returns Prometheus text format
async fn metrics_handler(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
