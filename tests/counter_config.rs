use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use people_counter::config::{CounterConfig, SinkKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PEOPLE_COUNTER_CONFIG",
        "PEOPLE_COUNTER_INPUT",
        "PEOPLE_COUNTER_MODEL",
        "PEOPLE_COUNTER_PROB_THRESHOLD",
        "PEOPLE_COUNTER_ALERT_CAPACITY",
        "MQTT_BROKER_ADDR",
        "MQTT_CLIENT_ID",
        "MQTT_USERNAME",
        "MQTT_PASSWORD",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = CounterConfig::load(None).expect("load defaults");

    assert_eq!(cfg.source.input, "stub://entrance");
    assert_eq!(cfg.model.backend, "stub");
    assert_eq!(cfg.model.timeout, Duration::from_millis(1_000));
    assert_eq!(cfg.tracking.prob_threshold, 0.55);
    assert_eq!(cfg.tracking.alert_capacity, 5);
    assert!(cfg.mqtt.enabled);
    assert_eq!(cfg.mqtt.broker_addr, "127.0.0.1:3001");
    assert_eq!(cfg.mqtt.client_id, "people_counter");
    assert_eq!(cfg.output.sink, SinkKind::Stdout);
    assert_eq!(cfg.output.snapshot_path, PathBuf::from("output_image.jpg"));
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "source": { "input": "stub://lobby", "width": 320, "height": 240, "target_fps": 5 },
        "model": { "timeout_ms": 250 },
        "tracking": { "prob_threshold": 0.4, "alert_capacity": 3 },
        "mqtt": { "broker_addr": "127.0.0.1:1883", "client_id": "lobby" },
        "output": { "sink": "none", "snapshot_path": "lobby.png" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PEOPLE_COUNTER_CONFIG", file.path());
    std::env::set_var("PEOPLE_COUNTER_PROB_THRESHOLD", "0.7");
    std::env::set_var("MQTT_USERNAME", "counter");
    std::env::set_var("MQTT_PASSWORD", "secret");

    let cfg = CounterConfig::load(None).expect("load config");

    assert_eq!(cfg.source.input, "stub://lobby");
    assert_eq!((cfg.source.width, cfg.source.height), (320, 240));
    assert_eq!(cfg.source.target_fps, 5);
    assert_eq!(cfg.model.timeout, Duration::from_millis(250));
    assert_eq!(cfg.tracking.prob_threshold, 0.7);
    assert_eq!(cfg.tracking.alert_capacity, 3);
    assert_eq!(cfg.mqtt.broker_addr, "127.0.0.1:1883");
    assert_eq!(cfg.mqtt.client_id, "lobby");
    assert_eq!(cfg.mqtt.username.as_deref(), Some("counter"));
    assert_eq!(cfg.mqtt.password.as_deref(), Some("secret"));
    assert_eq!(cfg.output.sink, SinkKind::Null);
    assert_eq!(cfg.output.snapshot_path, PathBuf::from("lobby.png"));

    clear_env();
}

#[test]
fn loads_toml_file_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("counter.toml");
    std::fs::write(
        &path,
        r#"
[source]
input = "stub://gate"

[tracking]
alert_capacity = 8

[mqtt]
enabled = false
"#,
    )
    .expect("write config");

    let cfg = CounterConfig::load(Some(&path)).expect("load config");

    assert_eq!(cfg.source.input, "stub://gate");
    assert_eq!(cfg.tracking.alert_capacity, 8);
    assert_eq!(cfg.tracking.prob_threshold, 0.55);
    assert!(!cfg.mqtt.enabled);
}

#[test]
fn model_env_selects_tract_backend() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PEOPLE_COUNTER_MODEL", "/models/person-detection.onnx");
    let cfg = CounterConfig::load(None).expect("load config");
    assert_eq!(cfg.model.backend, "tract");
    assert_eq!(
        cfg.model.path,
        Some(PathBuf::from("/models/person-detection.onnx"))
    );

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PEOPLE_COUNTER_PROB_THRESHOLD", "high");
    assert!(CounterConfig::load(None).is_err());

    std::env::set_var("PEOPLE_COUNTER_PROB_THRESHOLD", "1.2");
    assert!(CounterConfig::load(None).is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "output": { "sink": "file" } }"#)
        .expect("write config");
    let err = CounterConfig::load(Some(file.path())).unwrap_err();
    assert!(format!("{err}").contains("unknown output sink"));

    assert!(CounterConfig::load(Some(std::path::Path::new("/nonexistent/counter.json"))).is_err());
}
