use serial_test::serial;
use temp_env::with_vars;

use super::*;

fn cleanup_all_harness_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("HARNESS__") {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_settings_should_initialize_with_hardcoded_values() {
    let settings = HarnessSettings::default();

    assert_eq!(settings.cluster.task_managers, 1);
    assert_eq!(settings.cluster.task_slots, 4);
    assert_eq!(settings.cluster.total_slots(), 4);
    assert!(!settings.web.enabled);
    assert!(settings.web.is_auto());
    assert_eq!(settings.ha.mode, HaMode::None);
    assert_eq!(settings.timeouts.accounting_timeout_ms, 1_000);
}

#[test]
#[serial]
fn load_should_merge_environment_overrides() {
    cleanup_all_harness_env_vars();
    with_vars(
        vec![
            ("HARNESS__CLUSTER__TASK_MANAGERS", Some("2")),
            ("HARNESS__WEB__ENABLED", Some("true")),
        ],
        || {
            let settings = HarnessSettings::load(None).unwrap();

            assert_eq!(settings.cluster.task_managers, 2);
            assert!(settings.web.enabled);
        },
    );
}

#[test]
#[serial]
fn load_should_merge_file_settings() {
    cleanup_all_harness_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("harness.toml");

    std::fs::write(
        &config_path,
        r#"
        [cluster]
        task_managers = 3
        task_slots = 2

        [ha]
        mode = "coordination-service"

        [timeouts]
        accounting_timeout_ms = 250
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let settings = HarnessSettings::load(config_path.to_str()).unwrap();

        assert_eq!(settings.cluster.task_managers, 3);
        assert_eq!(settings.cluster.total_slots(), 6);
        assert_eq!(settings.ha.mode, HaMode::CoordinationService);
        assert_eq!(settings.timeouts.accounting_timeout_ms, 250);
    });
}

#[test]
#[serial]
fn environment_should_take_priority_over_file() {
    cleanup_all_harness_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("harness.toml");
    std::fs::write(&config_path, "[cluster]\ntask_slots = 2\n").unwrap();

    with_vars(vec![("HARNESS__CLUSTER__TASK_SLOTS", Some("8"))], || {
        let settings = HarnessSettings::load(config_path.to_str()).unwrap();

        assert_eq!(settings.cluster.task_slots, 8);
    });
}

#[test]
fn topology_with_zero_task_managers_should_be_rejected() {
    let topology = ClusterTopology {
        task_managers: 0,
        task_slots: 4,
    };

    assert!(matches!(
        topology.validate(),
        Err(crate::Error::InvalidConfig(_))
    ));
}

#[test]
fn topology_with_zero_task_slots_should_be_rejected() {
    let topology = ClusterTopology {
        task_managers: 1,
        task_slots: 0,
    };

    assert!(topology.validate().is_err());
}

#[test]
fn web_ui_on_privileged_port_should_be_rejected() {
    let web = WebUiConfig {
        enabled: true,
        port: 80,
    };

    assert!(web.validate().is_err());
}

#[test]
fn web_ui_auto_sentinel_should_pass_validation() {
    let web = WebUiConfig {
        enabled: true,
        port: WebUiConfig::AUTO_PORT,
    };

    assert!(web.validate().is_ok());
    assert!(web.is_auto());
}

#[test]
fn quorum_without_ha_mode_should_be_rejected() {
    let ha = HighAvailabilityConfig {
        mode: HaMode::None,
        quorum: Some("127.0.0.1:2181".to_string()),
    };

    assert!(ha.validate().is_err());
}

#[test]
fn malformed_quorum_address_should_be_rejected() {
    let ha = HighAvailabilityConfig {
        mode: HaMode::CoordinationService,
        quorum: Some("not-an-address".to_string()),
    };

    assert!(ha.validate().is_err());
}

#[test]
fn zero_timeouts_should_be_rejected() {
    let timeouts = TimeoutConfig {
        accounting_timeout_ms: 0,
        ..Default::default()
    };

    assert!(timeouts.validate().is_err());
}
