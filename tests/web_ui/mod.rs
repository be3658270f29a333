use flow_harness::utils::net::acquire_available_port;
use flow_harness::ClusterHarness;
use flow_harness::HarnessBuilder;
use serial_test::serial;
use tokio::net::TcpStream;

use crate::commons::http_get;

/// Web UI disabled: the port accessor reports the disabled sentinel both
/// before and after start.
#[tokio::test]
#[serial]
async fn disabled_web_ui_reports_no_port() {
    let mut harness = ClusterHarness::builder().build().unwrap();
    assert_eq!(harness.web_ui_port(), None);

    harness.start().await.unwrap();
    assert_eq!(harness.web_ui_port(), None);

    harness.stop().await.unwrap();
}

/// Web UI enabled with an explicit port: the accessor returns exactly that
/// port and the dashboard answers on it.
#[tokio::test]
#[serial]
async fn explicit_port_is_reported_and_served() {
    crate::enable_logger();

    let port = acquire_available_port().unwrap();
    let mut harness = HarnessBuilder::new().with_web_ui(port).build().unwrap();
    assert_eq!(harness.web_ui_port(), Some(port));

    harness.start().await.unwrap();
    assert_eq!(harness.web_ui_port(), Some(port));

    let response = http_get(port, "/overview").await.unwrap();
    assert!(response.contains("200 OK"), "unexpected response: {response}");
    assert!(response.contains("taskmanagers"));

    harness.stop().await.unwrap();
}

/// Web UI enabled with the auto-assign sentinel: after start the resolved
/// port is a concrete ephemeral value and accepts connections while the
/// cluster runs.
#[tokio::test]
#[serial]
async fn auto_port_resolves_after_start_and_accepts_connections() {
    let mut harness = HarnessBuilder::new().with_web_ui_auto().build().unwrap();
    assert_eq!(harness.web_ui_port(), None);

    harness.start().await.unwrap();

    let port = harness.web_ui_port().expect("auto port must be resolved after start");
    assert!(port >= 1024, "ephemeral port expected, got {port}");
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_ok());

    harness.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn dashboard_serves_overview_and_metrics() {
    let mut harness = HarnessBuilder::new()
        .task_managers(2)
        .task_slots(3)
        .with_web_ui_auto()
        .build()
        .unwrap();
    harness.start().await.unwrap();
    let port = harness.web_ui_port().unwrap();

    let overview = http_get(port, "/overview").await.unwrap();
    assert!(overview.contains("\"taskmanagers\":2"));
    assert!(overview.contains("\"slots-total\":6"));

    let metrics = http_get(port, "/metrics").await.unwrap();
    assert!(metrics.contains("harness_clusters_started"));

    harness.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn dashboard_stops_serving_after_teardown() {
    let mut harness = HarnessBuilder::new().with_web_ui_auto().build().unwrap();
    harness.start().await.unwrap();
    let port = harness.web_ui_port().unwrap();

    harness.stop().await.unwrap();

    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
}
