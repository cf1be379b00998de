//! Integration tests for the snapd HTTP client against a mock daemon.
//!
//! These tests verify that the client:
//! 1. Builds the REST paths and query parameters snapd expects
//! 2. Unwraps the response envelope
//! 3. Maps daemon error envelopes and transport failures to `ClientError`
//! 4. Drives a notice subscription over the long-poll endpoint

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use snapmon_client::{
    ClientError, HttpSnapdClient, NoticeStreamEvent, NoticesMonitor, NoticesQuery, SnapdClient,
    SnapsFilter,
};
use snapmon_core::{DaemonConfig, NoticeType, Status};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param, query_param_is_missing},
};

fn sync_response(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "type": "sync",
        "status-code": 200,
        "status": "OK",
        "result": result,
    }))
}

fn client_for(server: &MockServer) -> HttpSnapdClient {
    let config = DaemonConfig {
        base_url: Some(server.uri()),
        request_timeout_secs: 5,
        ..DaemonConfig::default()
    };
    HttpSnapdClient::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_fetch_change() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/changes/42"))
        .respond_with(sync_response(json!({
            "id": "42",
            "kind": "auto-refresh",
            "summary": "Auto-refresh snap \"firefox\"",
            "status": "Doing",
            "ready": false,
            "spawn-time": "2024-03-01T10:00:00Z",
            "tasks": [
                {"id": "1", "kind": "download-snap", "summary": "Download snap \"firefox\"",
                 "status": "Done", "progress": {"label": "", "done": 1, "total": 1},
                 "data": {"affected-snaps": ["firefox"]}},
                {"id": "2", "kind": "link-snap", "summary": "Make snap \"firefox\" available",
                 "status": "Doing", "data": {"affected-snaps": ["firefox"]}}
            ],
            "data": {"snap-names": ["firefox"], "refresh-forced": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let change = client_for(&server).change("42").await.unwrap();
    assert_eq!(change.id, "42");
    assert!(change.is_auto_refresh());
    assert_eq!(change.status, Status::Doing);
    assert_eq!(change.tasks.len(), 2);
    assert_eq!(change.tasks[1].affected_snaps(), ["firefox".to_string()]);
}

#[tokio::test]
async fn test_fetch_snap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/snaps/firefox"))
        .respond_with(sync_response(json!({
            "name": "firefox",
            "title": "Firefox",
            "version": "123.0",
            "apps": [{"snap": "firefox", "name": "firefox",
                      "desktop-file": "/var/lib/snapd/desktop/applications/firefox_firefox.desktop"}]
        })))
        .mount(&server)
        .await;

    let snap = client_for(&server).snap("firefox").await.unwrap();
    assert_eq!(snap.title.as_deref(), Some("Firefox"));
    assert_eq!(snap.apps.len(), 1);
}

#[tokio::test]
async fn test_list_refresh_inhibited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/snaps"))
        .and(query_param("select", "refresh-inhibited"))
        .respond_with(sync_response(json!([
            {"name": "firefox", "refresh-inhibit": {"proceed-time": "2024-03-02T10:00:00Z"}},
            {"name": "thunderbird"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let snaps = client_for(&server)
        .snaps(SnapsFilter::RefreshInhibited)
        .await
        .unwrap();
    assert_eq!(snaps.len(), 2);
    assert!(snaps[0].refresh_inhibit.is_some());
    assert!(snaps[1].refresh_inhibit.is_none());
}

#[tokio::test]
async fn test_daemon_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/snaps/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "type": "error",
            "status-code": 404,
            "status": "Not Found",
            "result": {"message": "snap \"ghost\" is not installed", "kind": "snap-not-found"}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).snap("ghost").await.unwrap_err();
    assert_eq!(err.daemon_kind(), Some("snap-not-found"));
    assert!(matches!(err, ClientError::Api { status: 404, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_without_envelope_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/changes/1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream restarting"))
        .mount(&server)
        .await;

    let err = client_for(&server).change("1").await.unwrap_err();
    assert!(err.is_retryable(), "503 should be retryable, got {err:?}");
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/changes/1"))
        .respond_with(sync_response(json!({})).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = DaemonConfig {
        base_url: Some(server.uri()),
        request_timeout_secs: 1,
        ..DaemonConfig::default()
    };
    let client = HttpSnapdClient::from_config(&config).unwrap();

    let err = client.change("1").await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(1)), "got {err:?}");
}

#[tokio::test]
async fn test_notices_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/notices"))
        .and(query_param("types", "change-update,refresh-inhibit,snap-run-inhibit"))
        .and(query_param("after", "2024-03-01T10:00:00.000000000Z"))
        .and(query_param("timeout", "2000ms"))
        .respond_with(sync_response(json!([
            {"id": "7", "type": "refresh-inhibit", "key": "-",
             "last-occurred": "2024-03-01T10:00:01Z"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let after = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let notices = client_for(&server)
        .notices(&NoticesQuery::long_poll(Some(after), Duration::from_secs(2)))
        .await
        .unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].notice_type, NoticeType::RefreshInhibit);
}

#[tokio::test]
async fn test_notices_monitor_over_http() {
    let server = MockServer::start().await;

    // Initial fetch: no `after`, no `timeout`
    Mock::given(method("GET"))
        .and(path("/v2/notices"))
        .and(query_param_is_missing("after"))
        .and(query_param_is_missing("timeout"))
        .respond_with(sync_response(json!([
            {"id": "1", "type": "change-update", "key": "5",
             "last-occurred": "2024-03-01T10:00:00Z", "last-data": {"kind": "auto-refresh"}}
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Follow-up long poll fails, ending the stream
    Mock::given(method("GET"))
        .and(path("/v2/notices"))
        .and(query_param("after", "2024-03-01T10:00:00.000000000Z"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "type": "error",
            "status-code": 500,
            "result": {"message": "internal error"}
        })))
        .mount(&server)
        .await;

    let client = Arc::new(client_for(&server));
    let (mut monitor, mut rx) = NoticesMonitor::start(client, Duration::from_secs(1));

    match rx.recv().await {
        Some(NoticeStreamEvent::Notice { notice, first_run }) => {
            assert_eq!(notice.key, "5");
            assert_eq!(notice.kind(), Some("auto-refresh"));
            assert!(first_run);
        }
        other => panic!("expected notice, got {other:?}"),
    }
    match rx.recv().await {
        Some(NoticeStreamEvent::Error(ClientError::Api { status, .. })) => assert_eq!(status, 500),
        other => panic!("expected error, got {other:?}"),
    }
    monitor.stop();
}

#[cfg(unix)]
#[tokio::test]
async fn test_missing_socket_is_network_error() {
    let dir = std::env::temp_dir().join("snapmon-no-such-dir");
    let config = DaemonConfig {
        socket_path: Some(dir.join("snapd.socket")),
        base_url: None,
        request_timeout_secs: 2,
        ..DaemonConfig::default()
    };
    let client = HttpSnapdClient::from_config(&config).unwrap();

    let err = client.change("1").await.unwrap_err();
    assert!(err.is_network_error(), "got {err:?}");
}
