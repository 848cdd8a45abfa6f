//! Integration tests for the lorabridge-common library.

use std::path::PathBuf;

use lorabridge_common::{Error, LogFormat, LoggingConfig, MqttConfig, parse_config};

#[test]
fn test_parse_full_mqtt_config() {
    let json5 = r#"
    {
        server: "broker.example.net",
        port: 8883,
        client_id: "bridge-01",
        keep_alive_secs: 30,
    }
    "#;

    let config: MqttConfig = parse_config(json5).expect("parse failed");

    assert_eq!(config.server, "broker.example.net");
    assert_eq!(config.port, 8883);
    assert_eq!(config.client_id, "bridge-01");
    assert_eq!(config.keep_alive_secs, 30);
}

#[test]
fn test_parse_empty_documents_use_defaults() {
    let mqtt: MqttConfig = parse_config("{}").expect("parse failed");
    assert_eq!(mqtt.server, "localhost");
    assert_eq!(mqtt.port, 1883);

    let logging: LoggingConfig = parse_config("{}").expect("parse failed");
    assert_eq!(logging.level, "info");
    assert_eq!(logging.format, LogFormat::Text);
    assert_eq!(logging.file, Some(PathBuf::from("/app/healthcheck.log")));
}

#[test]
fn test_parse_invalid_document() {
    let result: Result<MqttConfig, _> = parse_config("{ port: \"not-a-port\" }");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_error_display() {
    let err = Error::Connect("connection refused".to_string());
    assert_eq!(
        err.to_string(),
        "MQTT connection error: connection refused"
    );

    let err = Error::Publish {
        topic: "lora/".to_string(),
        message: "client closed".to_string(),
    };
    assert_eq!(err.to_string(), "Failed to publish to 'lora/': client closed");
}
