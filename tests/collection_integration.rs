//! Integration tests for vManage Stats
//!
//! Fake vManage and InfluxDB servers on loopback ports, driven through the
//! real reqwest-based client and sink.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use vmanage_stats::{
    ClientError, Controller, ControllerConfig, InfluxSink, MeasurementDefinition, QueryType,
    RestClient, Scheduler, StorageError, TimeSeriesSink, VManageClient, config::SinkConfig,
};

// =============================================================================
// Test Helpers
// =============================================================================

const SESSION_COOKIE: &str = "JSESSIONID=fake-session";
const XSRF_TOKEN: &str = "fake-xsrf-token";

/// Bind a router on a random loopback port and return its address.
async fn serve(router: Router) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}

fn has_session(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.contains(SESSION_COOKIE))
}

// =============================================================================
// Fake vManage
// =============================================================================

#[derive(Default)]
struct FakeVManage {
    /// `X-XSRF-TOKEN` / `VSessionId` headers seen on data requests.
    seen_headers: Mutex<Vec<(Option<String>, Option<String>)>>,
    /// Query strings of bulk requests.
    bulk_queries: Mutex<Vec<HashMap<String, String>>>,
    /// Bodies of aggregation requests.
    aggregate_bodies: Mutex<Vec<Value>>,
}

impl FakeVManage {
    fn record_headers(&self, headers: &HeaderMap) {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.seen_headers
            .lock()
            .unwrap()
            .push((read("X-XSRF-TOKEN"), read("VSessionId")));
    }
}

async fn login(Form(form): Form<HashMap<String, String>>) -> Response {
    let ok = form.get("j_username").map(String::as_str) == Some("admin")
        && form.get("j_password").map(String::as_str) == Some("secret");
    if ok {
        (
            [(header::SET_COOKIE, format!("{SESSION_COOKIE}; Path=/"))],
            "",
        )
            .into_response()
    } else {
        "<html><body>login</body></html>".into_response()
    }
}

async fn token(headers: HeaderMap) -> Response {
    if has_session(&headers) {
        XSRF_TOKEN.into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn tenants() -> axum::Json<Value> {
    axum::Json(json!({"data": [
        {"name": "other", "tenantId": "t-0"},
        {"name": "acme", "tenantId": "t-1"}
    ]}))
}

async fn switch_tenant(Path(id): Path<String>) -> Response {
    if id == "t-1" {
        axum::Json(json!({"VSessionId": "vsession-acme"})).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn devices(State(state): State<Arc<FakeVManage>>, headers: HeaderMap) -> Response {
    state.record_headers(&headers);
    if !has_session(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    axum::Json(json!({
        "header": {"fields": [
            {"property": "uptime", "dataType": "numberStr"},
            {"property": "cpu_load", "dataType": "double"}
        ]},
        "data": [
            {
                "host-name": "edge1",
                "system-ip": "1.1.1.1",
                "uptime": "120 (ok)",
                "cpu_load": "0.5"
            },
            {
                "host-name": "edge2",
                "system-ip": "1.1.1.2",
                "uptime": "--",
                "cpu_load": "--"
            }
        ]
    }))
    .into_response()
}

async fn aggregation(State(state): State<Arc<FakeVManage>>, body: axum::Json<Value>) -> Response {
    state.aggregate_bodies.lock().unwrap().push(body.0);
    axum::Json(json!({
        "header": {"fields": [{"property": "rx_kbps", "dataType": "double"}]},
        "data": [
            {"interface": "ge0/0", "rx_kbps": 12.5, "entry_time": 1_700_000_000_000_i64},
            {"rx_kbps": 3, "entry_time": 1_700_000_010_000_i64}
        ]
    }))
    .into_response()
}

async fn bulk(
    State(state): State<Arc<FakeVManage>>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::Json<Value> {
    state.bulk_queries.lock().unwrap().push(params);
    axum::Json(json!({"data": [
        {"vdevice_name": "1.1.1.1", "tx_pkts": 10, "entry_time": 1_700_000_000_000_i64}
    ]}))
}

async fn realtime(Query(params): Query<HashMap<String, String>>) -> axum::Json<Value> {
    match params.get("deviceId").map(String::as_str) {
        Some("1.1.1.1") => axum::Json(json!({
            "header": {"fields": [{"property": "lastupdated", "dataType": "date"}]},
            "data": [{
                "vdevice-name": "1.1.1.1",
                "ompPeers": "3 (up)",
                "lastupdated": 1_700_000_020_000_i64
            }]
        })),
        _ => axum::Json(json!({"header": {}})),
    }
}

async fn broken() -> &'static str {
    "this is not json"
}

async fn busy() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response()
}

async fn start_fake_vmanage() -> (String, Arc<FakeVManage>) {
    let state = Arc::new(FakeVManage::default());
    let router = Router::new()
        .route("/j_security_check", post(login))
        .route("/dataservice/client/token", get(token))
        .route("/dataservice/tenant", get(tenants))
        .route("/dataservice/tenant/{id}/switch", post(switch_tenant))
        .route("/dataservice/device", get(devices))
        .route(
            "/dataservice/statistics/interface/aggregation",
            post(aggregation),
        )
        .route(
            "/dataservice/data/device/statistics/interfacestatistics",
            get(bulk),
        )
        .route("/dataservice/device/omp/summary", get(realtime))
        .route("/dataservice/broken", get(broken))
        .route("/dataservice/busy", get(busy))
        .with_state(Arc::clone(&state));

    let addr = serve(router).await;
    (format!("http://{addr}"), state)
}

fn controller(base_url: &str, password: &str) -> VManageClient {
    VManageClient::with_base_url(
        ControllerConfig::new("127.0.0.1", "admin", password).with_description("lab"),
        base_url,
    )
}

// =============================================================================
// Fake InfluxDB
// =============================================================================

#[derive(Default)]
struct FakeInflux {
    queries: Mutex<Vec<String>>,
    writes: Mutex<Vec<(HashMap<String, String>, String)>>,
    reject_writes: bool,
}

async fn ping() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn influx_query(
    State(state): State<Arc<FakeInflux>>,
    Form(form): Form<HashMap<String, String>>,
) -> axum::Json<Value> {
    if let Some(q) = form.get("q") {
        state.queries.lock().unwrap().push(q.clone());
    }
    axum::Json(json!({"results": [{"statement_id": 0}]}))
}

async fn influx_write(
    State(state): State<Arc<FakeInflux>>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    if state.reject_writes {
        return (StatusCode::BAD_REQUEST, "partial write: field type conflict").into_response();
    }
    state.writes.lock().unwrap().push((params, body));
    StatusCode::NO_CONTENT.into_response()
}

async fn start_fake_influx(reject_writes: bool) -> (u16, Arc<FakeInflux>) {
    let state = Arc::new(FakeInflux {
        reject_writes,
        ..FakeInflux::default()
    });
    let router = Router::new()
        .route("/ping", get(ping))
        .route("/query", post(influx_query))
        .route("/write", post(influx_write))
        .with_state(Arc::clone(&state));

    let addr = serve(router).await;
    (addr.port(), state)
}

// =============================================================================
// Controller Client Tests
// =============================================================================

#[tokio::test]
async fn test_login_sends_session_and_xsrf_token() {
    let (base_url, state) = start_fake_vmanage().await;
    let mut client = controller(&base_url, "secret");

    client.connect().await.expect("Failed to connect");
    assert!(client.is_connected());

    let body = client.get("device").await.expect("Failed to get devices");
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let seen = state.seen_headers.lock().unwrap().clone();
    assert_eq!(seen, vec![(Some(XSRF_TOKEN.to_string()), None)]);
}

#[tokio::test]
async fn test_rejected_login() {
    let (base_url, _state) = start_fake_vmanage().await;
    let mut client = controller(&base_url, "wrong");

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::Login { .. }), "got {err:?}");
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_tenant_switch_adds_vsession_header() {
    let (base_url, state) = start_fake_vmanage().await;
    let mut client = VManageClient::with_base_url(
        ControllerConfig::new("127.0.0.1", "admin", "secret").with_tenant("acme"),
        base_url,
    );

    client.connect().await.expect("Failed to connect");
    client.get("device").await.expect("Failed to get devices");

    let seen = state.seen_headers.lock().unwrap().clone();
    assert_eq!(
        seen.last().unwrap(),
        &(
            Some(XSRF_TOKEN.to_string()),
            Some("vsession-acme".to_string())
        )
    );
}

#[tokio::test]
async fn test_unknown_tenant() {
    let (base_url, _state) = start_fake_vmanage().await;
    let mut client = VManageClient::with_base_url(
        ControllerConfig::new("127.0.0.1", "admin", "secret").with_tenant("nobody"),
        base_url,
    );

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::TenantNotFound(ref name) if name == "nobody"));
}

#[tokio::test]
async fn test_request_errors() {
    let (base_url, _state) = start_fake_vmanage().await;
    let mut client = controller(&base_url, "secret");
    client.connect().await.expect("Failed to connect");

    let err = client.get("busy").await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(matches!(err, ClientError::Request { ref body, .. } if body == "busy"));

    let err = client.get("broken").await.unwrap_err();
    assert!(matches!(err, ClientError::ResponseFormat { .. }), "got {err:?}");

    let err = client.get("missing").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

// =============================================================================
// Sink Tests
// =============================================================================

#[tokio::test]
async fn test_sink_connect_creates_database() {
    let (port, state) = start_fake_influx(false).await;
    let mut config = SinkConfig::new("127.0.0.1", port, "vmanage");
    config.drop_on_start = true;
    let mut sink = InfluxSink::new(config);

    sink.connect().await.expect("Failed to connect sink");
    sink.connect().await.expect("Failed to reconnect sink");

    let queries = state.queries.lock().unwrap().clone();
    assert_eq!(
        queries,
        vec![
            "DROP DATABASE \"vmanage\"",
            "CREATE DATABASE \"vmanage\"",
            "CREATE DATABASE \"vmanage\"",
        ]
    );
}

#[tokio::test]
async fn test_sink_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut sink = InfluxSink::new(SinkConfig::new("127.0.0.1", port, "vmanage"));
    let err = sink.connect().await.unwrap_err();
    assert!(matches!(err, StorageError::Connection(_)), "got {err:?}");
}

#[tokio::test]
async fn test_sink_write_rejected() {
    let (port, _state) = start_fake_influx(true).await;
    let mut sink = InfluxSink::new(SinkConfig::new("127.0.0.1", port, "vmanage"));
    sink.connect().await.expect("Failed to connect sink");

    let point = vmanage_stats::Point::new(
        "device",
        Default::default(),
        Utc::now(),
        [("uptime".to_string(), vmanage_stats::FieldValue::Float(1.0))]
            .into_iter()
            .collect(),
    )
    .unwrap();

    let err = sink.write(&[point]).await.unwrap_err();
    assert!(
        matches!(err, StorageError::Write { status: 400, ref body } if body.contains("conflict"))
    );
}

// =============================================================================
// End-to-End Collection
// =============================================================================

fn measurements() -> Vec<MeasurementDefinition> {
    vec![
        MeasurementDefinition::new("devices", "device", 60, QueryType::Simple, "device")
            .with_tags(["host-name", "system-ip"])
            .with_fields(["uptime", "cpu_load"]),
        MeasurementDefinition::new(
            "interfaces",
            "interface_agg",
            60,
            QueryType::Aggregate,
            "statistics/interface/aggregation",
        )
        .with_tags(["interface"])
        .with_fields(["rx_kbps"]),
        MeasurementDefinition::new(
            "ifstats",
            "interface_stats",
            60,
            QueryType::Bulk,
            "data/device/statistics/interfacestatistics",
        )
        .with_tags(["vdevice_name"])
        .with_fields(["tx_pkts"]),
        MeasurementDefinition::new("omp", "omp", 60, QueryType::RealTime, "device/omp/summary")
            .with_tags(["vdevice-name"])
            .with_fields(["ompPeers"])
            .with_device_ids(["1.1.1.0", "1.1.1.1"]),
        MeasurementDefinition::new("broken", "broken", 60, QueryType::Simple, "broken")
            .with_fields(["x"]),
        MeasurementDefinition::new("hourly", "hourly", 3600, QueryType::Simple, "device")
            .with_fields(["uptime"]),
    ]
}

#[tokio::test]
async fn test_due_group_collected_and_written_once() {
    let (base_url, vmanage) = start_fake_vmanage().await;
    let (port, influx) = start_fake_influx(false).await;

    let controller = controller(&base_url, "secret");
    let origin = controller.config().origin();
    let sink = InfluxSink::new(SinkConfig::new("127.0.0.1", port, "vmanage"));
    let mut scheduler = Scheduler::new(controller, sink, origin);

    // 2024-01-01T00:05:00Z
    let tick = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
    let report = scheduler.run(&measurements(), tick).await;

    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.interval, 60);
    assert_eq!(group.collected, vec!["devices", "interfaces", "ifstats", "omp"]);
    assert_eq!(group.failed, vec!["broken"]);
    assert!(group.error.is_none());
    // edge1, two aggregation rows, one bulk row, one real-time row
    assert_eq!(group.points_written, 5);

    let writes = influx.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    let (params, body) = &writes[0];
    assert_eq!(params.get("db").map(String::as_str), Some("vmanage"));
    assert_eq!(params.get("precision").map(String::as_str), Some("ms"));

    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines.iter().any(|l| l.starts_with("device,")
        && l.contains("host_name=edge1")
        && l.contains("system_ip=1.1.1.1")
        && l.contains("uptime=120")
        && l.contains("cpu_load=0.5")));
    assert!(lines.iter().any(|l| l.starts_with("interface_agg,")
        && l.contains("interface=--")
        && l.ends_with(" 1700000010000")));
    assert!(lines.iter().any(|l| l.starts_with("interface_stats,")
        && l.contains("tx_pkts=10i")
        && l.ends_with(" 1700000000000")));
    assert!(lines.iter().any(|l| l.starts_with("omp,")
        && l.contains("vdevice_name=1.1.1.1")
        && l.contains("ompPeers=3i")));
    assert!(lines.iter().all(|l| l.contains("host=127.0.0.1") && l.contains("region=lab")));

    let bulk = vmanage.bulk_queries.lock().unwrap().clone();
    assert_eq!(bulk.len(), 1);
    assert_eq!(bulk[0]["startDate"], "2024-01-01T00:04:00");
    assert_eq!(bulk[0]["endDate"], "2024-01-01T00:05:00");
    assert_eq!(bulk[0]["timeZone"], "UTC");

    let aggregate = vmanage.aggregate_bodies.lock().unwrap().clone();
    assert_eq!(
        aggregate[0]["query"]["rules"][0]["value"],
        json!(["2024-01-01T00:04:00 UTC", "2024-01-01T00:05:00 UTC"])
    );
}

#[tokio::test]
async fn test_controller_outage_skips_group() {
    let (port, influx) = start_fake_influx(false).await;
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let controller = controller(&dead, "secret");
    let origin = controller.config().origin();
    let sink = InfluxSink::new(SinkConfig::new("127.0.0.1", port, "vmanage"));
    let mut scheduler = Scheduler::new(controller, sink, origin);

    let tick = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
    let report = scheduler.run(&measurements(), tick).await;

    assert!(report.groups[0].error.is_some());
    assert!(influx.writes.lock().unwrap().is_empty());
    assert!(influx.queries.lock().unwrap().is_empty());
}
