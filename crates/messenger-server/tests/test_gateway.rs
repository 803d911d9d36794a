//! Gateway tests through full axum dispatch with `oneshot`

use axum::body::Body;
use axum::http::{Request, StatusCode};
use messenger_core::config::MessengerConfig;
use messenger_core::{
    BookingOrchestrator, ConnectionManager, EventLog, FileCredentialStore, FixedClock,
    JsonRecordStore, LoopbackTransport, MessageDispatcher, MessageTemplates, SessionState, Transport,
    UnlinkedTransport,
};
use messenger_server::gateway::{build_router, GatewayState};
use messenger_types::ConnectedIdentity;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestGateway {
    temp_dir: TempDir,
    transport: LoopbackTransport,
    state: Arc<GatewayState>,
}

fn gateway(transport: LoopbackTransport) -> TestGateway {
    gateway_over(Arc::new(transport.clone()), transport)
}

/// Gateway whose session runs on `platform`; `transport` is kept for inspection
fn gateway_over(platform: Arc<dyn Transport>, transport: LoopbackTransport) -> TestGateway {
    let temp_dir = TempDir::new().unwrap();
    let config = MessengerConfig::default();
    let events = Arc::new(EventLog::in_memory(100));
    let connection = ConnectionManager::new(
        platform,
        Arc::new(FileCredentialStore::new(temp_dir.path().join("auth")).unwrap()),
        events.clone(),
        &config.transport,
    );
    let dispatcher = Arc::new(MessageDispatcher::new(connection.clone(), &config.transport));
    let orchestrator = Arc::new(BookingOrchestrator::new(
        dispatcher.clone(),
        Arc::new(JsonRecordStore::new(temp_dir.path())),
        Arc::new(FixedClock { day: chrono::NaiveDate::from_ymd_opt(2026, 10, 14).unwrap() }),
        MessageTemplates::default(),
        events.clone(),
        &config,
    ));

    TestGateway {
        temp_dir,
        transport,
        state: Arc::new(GatewayState { connection, dispatcher, orchestrator, events }),
    }
}

fn identity() -> ConnectedIdentity {
    ConnectedIdentity { id: "5511998761833@s.whatsapp.net".to_string(), name: Some("Loja".to_string()) }
}

async fn call(gw: &TestGateway, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = build_router(gw.state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn connect(gw: &TestGateway) {
    let (status, body) = call(gw, "POST", "/api/messaging/connect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    for _ in 0..100 {
        if gw.state.connection.state().await == SessionState::Connected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("gateway session never connected");
}

#[tokio::test]
async fn test_service_status() {
    let gw = gateway(LoopbackTransport::new());

    let (status, body) = call(&gw, "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_status_reports_identity_once_connected() {
    let gw = gateway(LoopbackTransport::auto_open(identity()));

    let (_, before) = call(&gw, "GET", "/api/messaging/status", None).await;
    assert_eq!(before["data"]["connected"], false);
    assert!(before["data"]["user"].is_null());

    connect(&gw).await;

    let (_, after) = call(&gw, "GET", "/api/messaging/status", None).await;
    assert_eq!(after["data"]["connected"], true);
    assert_eq!(after["data"]["hasPairingArtifact"], false);
    assert_eq!(after["data"]["user"]["name"], "Loja");

    let (_, again) = call(&gw, "POST", "/api/messaging/connect", None).await;
    assert_eq!(again["success"], true);
    assert_eq!(gw.transport.open_calls(), 1);
}

#[tokio::test]
async fn test_send_message_validates_fields() {
    let gw = gateway(LoopbackTransport::auto_open(identity()));

    let (status, body) = call(&gw, "POST", "/api/messaging/send-message", Some(json!({"to": "5511987654321"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = call(&gw, "POST", "/api/messaging/send-message", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_message_requires_connection() {
    let gw = gateway(LoopbackTransport::new());

    let (status, body) = call(
        &gw,
        "POST",
        "/api/messaging/send-message",
        Some(json!({"to": "5511987654321", "message": "oi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not connected"));
}

#[tokio::test]
async fn test_send_message_delivers() {
    let gw = gateway(LoopbackTransport::auto_open(identity()));
    connect(&gw).await;

    let (status, body) = call(
        &gw,
        "POST",
        "/api/messaging/send-message",
        Some(json!({"to": "+55 11 98765-4321", "message": "oi"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recipient"], "5511987654321");
    assert_eq!(gw.transport.sent().len(), 1);

    let (_, logs) = call(&gw, "GET", "/api/messaging/logs", None).await;
    let entries = logs["data"].as_array().unwrap();
    assert!(entries.iter().any(|e| e["level"] == "success"));

    let (_, cleared) = call(&gw, "POST", "/api/messaging/clear-logs", None).await;
    assert_eq!(cleared["success"], true);
    let (_, logs) = call(&gw, "GET", "/api/messaging/logs", None).await;
    assert!(logs["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_requires_reason() {
    let gw = gateway(LoopbackTransport::auto_open(identity()));
    connect(&gw).await;

    let (status, body) = call(&gw, "POST", "/api/messaging/cancel-confirmations", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_missing_bookings_is_not_found() {
    let gw = gateway(LoopbackTransport::new());

    let (status, _) = call(&gw, "GET", "/api/messaging/today-appointments", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_confirmations_and_pending_list() {
    let gw = gateway(LoopbackTransport::auto_open(identity()));
    std::fs::write(
        gw.temp_dir.path().join("bookings.json"),
        json!([
            {"id": 1, "client_id": 1, "service_id": 1, "date": "2026-10-14", "time_slot": "09:00", "status": "scheduled"},
            {"id": 2, "client_id": 1, "service_id": 1, "date": "2026-10-14", "time_slot": "15:00", "status": "cancelled"}
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        gw.temp_dir.path().join("clients.json"),
        json!([{"id": 1, "name": "Ana", "phone": "5511987654321"}]).to_string(),
    )
    .unwrap();

    let (_, pending) = call(&gw, "GET", "/api/messaging/pending-appointments", None).await;
    assert_eq!(pending["data"]["count"], 1);
    assert_eq!(pending["data"]["today"], "2026-10-14");

    let (status, _) = call(&gw, "POST", "/api/messaging/send-bulk-confirmations", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Bulk flow needs a connection");

    connect(&gw).await;
    let (status, body) = call(&gw, "POST", "/api/messaging/send-bulk-confirmations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sentCount"], 1);
    assert_eq!(body["data"]["results"][0]["status"], "sent");

    let (_, today) = call(&gw, "GET", "/api/messaging/today-appointments", None).await;
    assert_eq!(today["data"].as_array().unwrap().len(), 2);
    let (_, pending) = call(&gw, "GET", "/api/messaging/pending-appointments", None).await;
    assert_eq!(pending["data"]["count"], 0);
}

#[tokio::test]
async fn test_disconnect_clears_pairing_code() {
    let gw = gateway(LoopbackTransport::new());
    call(&gw, "POST", "/api/messaging/connect", None).await;
    gw.transport.emit(messenger_core::TransportEvent::ConnectionUpdate(
        messenger_core::transport::ConnectionUpdate::PairingChallenge("abcd1234".to_string()),
    ));
    for _ in 0..100 {
        if gw.state.connection.pairing_artifact().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (_, code) = call(&gw, "GET", "/api/messaging/pairing-code", None).await;
    assert_eq!(code["data"]["pairingArtifact"], "ABCD-1234");

    let (status, _) = call(&gw, "POST", "/api/messaging/disconnect", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, after) = call(&gw, "GET", "/api/messaging/status", None).await;
    assert_eq!(after["data"]["connected"], false);
    assert!(after["data"]["pairingArtifact"].is_null());
}

#[tokio::test]
async fn test_without_platform_transport_nothing_is_marked_sent() {
    let gw = gateway_over(Arc::new(UnlinkedTransport), LoopbackTransport::new());
    std::fs::write(
        gw.temp_dir.path().join("bookings.json"),
        json!([{"id": 1, "client_id": 1, "service_id": 1, "date": "2026-10-14", "time_slot": "09:00", "status": "pending"}])
            .to_string(),
    )
    .unwrap();

    let (status, body) = call(&gw, "POST", "/api/messaging/connect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(gw.state.connection.state().await, SessionState::Idle);

    let (status, _) = call(&gw, "POST", "/api/messaging/send-bulk-confirmations", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, pending) = call(&gw, "GET", "/api/messaging/pending-appointments", None).await;
    assert_eq!(pending["data"]["count"], 1);
}
