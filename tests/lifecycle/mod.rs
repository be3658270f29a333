use flow_harness::ClusterHarness;
use flow_harness::Error;
use flow_harness::ExecutionEnvironment;
use flow_harness::HarnessBuilder;
use flow_harness::HarnessState;
use flow_harness::ShutdownError;
use flow_harness::StartupError;
use serial_test::serial;

use crate::commons::SEQUENCE;

/// Scenario: 1 worker, 4 slots, web UI disabled; start, run a trivial job
/// producing [1, 2, 3, 4], stop with zero leaks.
#[tokio::test]
#[serial]
async fn one_worker_four_slots_runs_trivial_job_and_stops_clean() {
    crate::enable_logger();

    let mut harness = HarnessBuilder::new()
        .task_managers(1)
        .task_slots(4)
        .build()
        .unwrap();
    harness.start().await.unwrap();
    assert_eq!(harness.state(), HarnessState::Running);

    let env = ExecutionEnvironment::try_default().unwrap();
    let out: Vec<i64> = env.from_elements(SEQUENCE).unwrap().collect().await.unwrap();
    assert_eq!(out, SEQUENCE.to_vec());

    harness.stop().await.unwrap();
    assert_eq!(harness.state(), HarnessState::Stopped);
}

#[tokio::test]
#[serial]
async fn stop_is_idempotent_after_a_successful_stop() {
    let mut harness = ClusterHarness::builder().build().unwrap();
    harness.start().await.unwrap();

    harness.stop().await.unwrap();
    // second stop must not raise and must not re-contact stopped resources
    harness.stop().await.unwrap();
    assert_eq!(harness.state(), HarnessState::Stopped);
}

#[tokio::test]
#[serial]
async fn stop_without_start_is_a_no_op() {
    let mut harness = ClusterHarness::builder().build().unwrap();

    harness.stop().await.unwrap();
    assert_eq!(harness.state(), HarnessState::NotStarted);
}

#[tokio::test]
#[serial]
async fn starting_twice_is_rejected() {
    let mut harness = ClusterHarness::builder().build().unwrap();
    harness.start().await.unwrap();

    let result = harness.start().await;
    assert!(matches!(
        result,
        Err(Error::Startup(StartupError::AlreadyRunning))
    ));

    harness.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn leaked_broadcast_variable_fails_stop() {
    crate::enable_logger();

    let mut harness = ClusterHarness::builder().build().unwrap();
    harness.start().await.unwrap();

    let env = ExecutionEnvironment::try_default().unwrap();
    let _: Vec<i64> = env
        .from_elements(SEQUENCE)
        .unwrap()
        .with_broadcast_set("lookup", ["a", "b"])
        .unwrap()
        .retain_broadcast_refs()
        .collect()
        .await
        .unwrap();

    let result = harness.stop().await;
    match result {
        Err(Error::Shutdown(ShutdownError::UnreleasedBroadcastVariables { count })) => {
            assert!(count > 0, "leak count must be non-zero");
        }
        other => panic!("expected an unreleased broadcast variable error, got {other:?}"),
    }
    // the teardown still ran to the end
    assert_eq!(harness.state(), HarnessState::Stopped);
}

#[tokio::test]
#[serial]
async fn leaked_connection_fails_stop() {
    let mut harness = ClusterHarness::builder().build().unwrap();
    harness.start().await.unwrap();

    let env = ExecutionEnvironment::try_default().unwrap();
    let _: Vec<i64> = env
        .from_elements(SEQUENCE)
        .unwrap()
        .retain_connections()
        .collect()
        .await
        .unwrap();

    let result = harness.stop().await;
    assert!(matches!(
        result,
        Err(Error::Shutdown(ShutdownError::ActiveConnections { count: _ }))
    ));
}

#[tokio::test]
#[serial]
async fn execution_environment_is_deregistered_after_stop() {
    let mut harness = ClusterHarness::builder().build().unwrap();
    harness.start().await.unwrap();
    assert!(ExecutionEnvironment::try_default().is_ok());

    harness.stop().await.unwrap();

    assert!(ExecutionEnvironment::try_default().is_err());
}

#[tokio::test]
#[serial]
async fn jobs_observe_the_configured_parallelism_bound() {
    let mut harness = ClusterHarness::builder().task_managers(2).task_slots(2).build().unwrap();
    harness.start().await.unwrap();

    let env = ExecutionEnvironment::try_default().unwrap();
    assert_eq!(env.default_parallelism(), 4);

    let out: Vec<i64> = env
        .from_elements(0i64..100)
        .unwrap()
        .parallelism(3)
        .collect()
        .await
        .unwrap();
    assert_eq!(out, (0i64..100).collect::<Vec<_>>());

    harness.stop().await.unwrap();
}
