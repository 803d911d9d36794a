//! HTTP gateway for the messaging service
//!
//! Each endpoint is a thin axum handler delegating to an inner function that
//! returns `(StatusCode, serde_json::Value)`. Bodies use the
//! `{success, message?, data?, error?}` envelope.
//!
//! Endpoints under `/api/messaging`:
//! - GET  /status, /pairing-code, /logs, /today-appointments, /pending-appointments
//! - POST /connect, /disconnect, /clear-session, /send-message, /clear-logs
//! - POST /send-bulk-confirmations, /cancel-confirmations
//! - POST /send-report-daily, /send-report-weekly, /send-report-monthly

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use messenger_core::{BookingOrchestrator, ConnectionManager, EventLog, MessageDispatcher, MessengerError};
use messenger_types::{ApiEnvelope, ConnectOutcome, ReportWindow};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

type Reply = (StatusCode, serde_json::Value);

/// Shared state for all handlers
pub struct GatewayState {
    pub connection: ConnectionManager,
    pub dispatcher: Arc<MessageDispatcher>,
    pub orchestrator: Arc<BookingOrchestrator<MessageDispatcher>>,
    pub events: Arc<EventLog>,
}

/// Build the router with all endpoints
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let messaging = Router::new()
        .route("/status", get(status_handler))
        .route("/connect", post(connect_handler))
        .route("/disconnect", post(disconnect_handler))
        .route("/clear-session", post(clear_session_handler))
        .route("/pairing-code", get(pairing_code_handler))
        .route("/send-message", post(send_message_handler))
        .route("/send-bulk-confirmations", post(confirmations_handler))
        .route("/cancel-confirmations", post(cancellations_handler))
        .route("/send-report-daily", post(daily_report_handler))
        .route("/send-report-weekly", post(weekly_report_handler))
        .route("/send-report-monthly", post(monthly_report_handler))
        .route("/logs", get(logs_handler))
        .route("/clear-logs", post(clear_logs_handler))
        .route("/today-appointments", get(today_handler))
        .route("/pending-appointments", get(pending_handler));

    Router::new()
        .route("/api/status", get(service_status_handler))
        .nest("/api/messaging", messaging)
        .with_state(state)
}

/// Serve the gateway until ctrl-c
pub async fn start_gateway(state: Arc<GatewayState>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Messaging gateway listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Gateway shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct SendMessageRequest {
    pub to: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

// ============================================================================
// Envelope helpers
// ============================================================================

fn reply<T: Serialize>(status: StatusCode, envelope: ApiEnvelope<T>) -> Reply {
    match serde_json::to_value(&envelope) {
        Ok(body) => (status, body),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "success": false, "error": e.to_string() }),
        ),
    }
}

fn success<T: Serialize>(data: T, message: Option<String>) -> Reply {
    let envelope = ApiEnvelope::data(data);
    let envelope = match message {
        Some(message) => envelope.with_message(message),
        None => envelope,
    };
    reply(StatusCode::OK, envelope)
}

fn error_status(error: &MessengerError) -> StatusCode {
    if error.is_precondition() {
        StatusCode::BAD_REQUEST
    } else if matches!(error, MessengerError::NotFound(_)) {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn failure(error: &MessengerError) -> Reply {
    reply::<()>(error_status(error), ApiEnvelope::failure(error.to_string()))
}

/// Envelope carrying only a success flag and a message
fn notice(success: bool, message: impl Into<String>) -> Reply {
    let envelope: ApiEnvelope<()> = ApiEnvelope {
        success,
        message: Some(message.into()),
        data: None,
        error: None,
    };
    reply(StatusCode::OK, envelope)
}

fn outcome(result: ConnectOutcome) -> Reply {
    notice(result.success, result.message)
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub fn service_status_inner() -> Reply {
    (
        StatusCode::OK,
        serde_json::json!({
            "success": true,
            "message": "Messaging service running",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": { "messaging": "/api/messaging" },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
    )
}

pub async fn status_inner(state: &GatewayState) -> Reply {
    let snapshot = state.connection.status().await;
    let user = state.connection.connected_identity().await;

    let mut data = match serde_json::to_value(&snapshot) {
        Ok(value) => value,
        Err(e) => return failure(&MessengerError::Json(e)),
    };
    if let Some(object) = data.as_object_mut() {
        object.insert("user".to_string(), serde_json::json!(user));
    }
    success(data, None)
}

pub async fn send_message_inner(state: &GatewayState, req: SendMessageRequest) -> Reply {
    let (to, message) = match (req.to, req.message) {
        (Some(to), Some(message)) if !to.trim().is_empty() && !message.is_empty() => (to, message),
        _ => {
            return reply::<()>(
                StatusCode::BAD_REQUEST,
                ApiEnvelope::failure("Required fields: to, message"),
            )
        }
    };

    match state.dispatcher.send(&to, &message).await {
        Ok(receipt) => success(receipt, Some("Message sent".to_string())),
        Err(e) => failure(&e),
    }
}

pub async fn confirmations_inner(state: &GatewayState) -> Reply {
    match state.orchestrator.run_confirmation_flow().await {
        Ok(result) => {
            let message = format!("Confirmations sent: {}/{}", result.sent_count, result.total);
            success(result, Some(message))
        }
        Err(e) => failure(&e),
    }
}

pub async fn cancellations_inner(state: &GatewayState, req: CancelRequest) -> Reply {
    let reason = req.reason.unwrap_or_default();
    match state.orchestrator.run_cancellation_flow(&reason).await {
        Ok(result) => {
            let message = format!("Bookings cancelled: {}/{}", result.cancelled_count, result.total);
            success(result, Some(message))
        }
        Err(e) => failure(&e),
    }
}

pub async fn report_inner(state: &GatewayState, window: ReportWindow) -> Reply {
    match state.orchestrator.run_report(window).await {
        Ok(summary) => success(summary, Some(format!("{} report sent", window))),
        Err(e) => failure(&e),
    }
}

pub fn today_inner(state: &GatewayState) -> Reply {
    match state.orchestrator.todays_bookings() {
        Ok(bookings) => success(bookings, None),
        Err(e) => failure(&e),
    }
}

pub fn pending_inner(state: &GatewayState) -> Reply {
    match state.orchestrator.pending_today() {
        Ok(bookings) => {
            let data = serde_json::json!({
                "count": bookings.len(),
                "today": state.orchestrator.today().format("%Y-%m-%d").to_string(),
                "appointments": bookings,
            });
            success(data, None)
        }
        Err(e) => failure(&e),
    }
}

pub fn clear_logs_inner(state: &GatewayState) -> Reply {
    match state.events.clear() {
        Ok(()) => notice(true, "Logs cleared"),
        Err(e) => failure(&e),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn service_status_handler() -> impl IntoResponse {
    let (status, body) = service_status_inner();
    (status, Json(body))
}

pub async fn status_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = status_inner(&state).await;
    (status, Json(body))
}

pub async fn connect_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = outcome(state.connection.connect().await);
    (status, Json(body))
}

pub async fn disconnect_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = outcome(state.connection.disconnect().await);
    (status, Json(body))
}

pub async fn clear_session_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    state.connection.clear_session().await;
    let (status, body) = notice(true, "Session cleared");
    (status, Json(body))
}

pub async fn pairing_code_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let artifact = state.connection.pairing_artifact();
    let message = if artifact.is_some() {
        "Pairing code available"
    } else {
        "No pairing code available"
    };
    let data = serde_json::json!({
        "hasPairingArtifact": artifact.is_some(),
        "pairingArtifact": artifact,
    });
    let (status, body) = success(data, Some(message.to_string()));
    (status, Json(body))
}

pub async fn send_message_handler(
    State(state): State<Arc<GatewayState>>,
    req: Option<Json<SendMessageRequest>>,
) -> impl IntoResponse {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let (status, body) = send_message_inner(&state, req).await;
    (status, Json(body))
}

pub async fn confirmations_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = confirmations_inner(&state).await;
    (status, Json(body))
}

pub async fn cancellations_handler(
    State(state): State<Arc<GatewayState>>,
    req: Option<Json<CancelRequest>>,
) -> impl IntoResponse {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let (status, body) = cancellations_inner(&state, req).await;
    (status, Json(body))
}

pub async fn daily_report_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = report_inner(&state, ReportWindow::Daily).await;
    (status, Json(body))
}

pub async fn weekly_report_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = report_inner(&state, ReportWindow::Weekly).await;
    (status, Json(body))
}

pub async fn monthly_report_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = report_inner(&state, ReportWindow::Monthly).await;
    (status, Json(body))
}

pub async fn logs_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = success(state.events.entries(), None);
    (status, Json(body))
}

pub async fn clear_logs_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = clear_logs_inner(&state);
    (status, Json(body))
}

pub async fn today_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = today_inner(&state);
    (status, Json(body))
}

pub async fn pending_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let (status, body) = pending_inner(&state);
    (status, Json(body))
}
