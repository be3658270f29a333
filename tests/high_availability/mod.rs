use flow_harness::utils::net::acquire_available_port;
use flow_harness::ClusterHarness;
use flow_harness::Error;
use flow_harness::ExecutionEnvironment;
use flow_harness::HarnessBuilder;
use flow_harness::HarnessState;
use flow_harness::StartupError;
use serial_test::serial;

use crate::commons::probe_coordination;
use crate::commons::SEQUENCE;

/// HA mode: the coordination service is fully initialized (address known and
/// reachable) before the cluster is constructed; the harness exposes the
/// quorum address the cluster was built with.
#[tokio::test]
#[serial]
async fn ha_mode_initializes_quorum_before_the_cluster() {
    crate::enable_logger();

    let mut harness = HarnessBuilder::new().with_high_availability().build().unwrap();
    harness.start().await.unwrap();

    let quorum = harness
        .coordination_quorum()
        .expect("HA harness must expose its quorum address")
        .to_string();
    assert_eq!(probe_coordination(&quorum).await.unwrap(), "PONG");

    // jobs run as usual under HA
    let env = ExecutionEnvironment::try_default().unwrap();
    let out: Vec<i64> = env.from_elements(SEQUENCE).unwrap().collect().await.unwrap();
    assert_eq!(out, SEQUENCE.to_vec());

    harness.stop().await.unwrap();

    // the ensemble member is gone after teardown
    assert!(probe_coordination(&quorum).await.is_err());
}

#[tokio::test]
#[serial]
async fn unreachable_external_quorum_fails_startup() {
    let port = acquire_available_port().unwrap();
    let mut harness = HarnessBuilder::new()
        .with_external_quorum(format!("127.0.0.1:{port}"))
        .build()
        .unwrap();

    let result = harness.start().await;
    assert!(matches!(
        result,
        Err(Error::Startup(StartupError::QuorumUnreachable { .. }))
    ));
    assert_eq!(harness.state(), HarnessState::Failed);

    // stop() is safe after a partial start failure
    harness.stop().await.unwrap();
    assert_eq!(harness.state(), HarnessState::Stopped);
}

#[tokio::test]
#[serial]
async fn non_ha_harness_has_no_quorum() {
    let mut harness = ClusterHarness::builder().build().unwrap();
    harness.start().await.unwrap();

    assert!(harness.coordination_quorum().is_none());

    harness.stop().await.unwrap();
}
