//! End-to-end tests against a mock Slack API

use mockito::{Matcher, Server};
use parking_lot::Mutex;
use serde_json::json;
use slack_exception_logger::prelude::*;
use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

const POST_MESSAGE: &str = "/api/chat.postMessage";

fn config_for(api_url: &str, extra: &str) -> AlertConfig {
    config_with_format(api_url, "%level_name% %message%", extra)
}

fn config_with_format(api_url: &str, message_format: &str, extra: &str) -> AlertConfig {
    let yaml = format!(
        "slackApiToken: xoxb-test\n\
         channelEnvVarName: SEL_IT_CHANNEL_UNSET\n\
         defaultChannel: alerts\n\
         messageFormat: \"{}\"\n\
         apiUrl: {}\n{}",
        message_format, api_url, extra
    );
    AlertConfig::load_from_str(&yaml).expect("valid config")
}

fn slack_ok(server: &mut Server, text: &str) -> mockito::Mock {
    server
        .mock("POST", POST_MESSAGE)
        .match_header("authorization", "Bearer xoxb-test")
        .match_body(Matcher::PartialJson(json!({ "channel": "alerts", "text": text })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create()
}

#[test]
fn test_activation_drains_buffer_over_http() {
    let mut server = Server::new();
    let debug = slack_ok(&mut server, "DEBUG cache miss");
    let info = slack_ok(&mut server, "INFO retrying");
    let notice = slack_ok(&mut server, "NOTICE fallback used");
    let warning = slack_ok(&mut server, "WARNING upstream degraded");
    let after = slack_ok(&mut server, "INFO recovered");

    let config = config_for(&server.url(), "activationLevel: WARNING\nbufferSize: 3\n");
    let dispatcher = AlertDispatcher::from_config(&config).expect("dispatcher");

    dispatcher.debug("cache miss");
    dispatcher.info("retrying");
    dispatcher.notice("fallback used");
    assert!(!debug.matched());
    assert!(!dispatcher.is_activated());

    dispatcher.warning("upstream degraded");
    debug.assert();
    info.assert();
    notice.assert();
    warning.assert();

    // Passthrough::All is the default
    dispatcher.info("recovered");
    after.assert();

    assert_eq!(dispatcher.metrics().delivered_count(), 5);
    assert_eq!(dispatcher.metrics().activations(), 1);
}

#[test]
fn test_payload_carries_username_and_icon() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", POST_MESSAGE)
        .match_body(Matcher::PartialJson(json!({
            "username": "Critical",
            "icon_emoji": ":bangbang:",
            "text": "CRITICAL disk full",
        })))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .create();

    let dispatcher = AlertDispatcher::from_config(&config_for(&server.url(), "")).unwrap();
    dispatcher.try_handle(LogRecord::new(Severity::Critical, "disk full")).unwrap();
    mock.assert();
}

#[test]
fn test_attachment_mode() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", POST_MESSAGE)
        .match_body(Matcher::PartialJson(json!({
            "attachments": [{
                "color": "danger",
                "text": "ERROR payment failed",
                "fields": [{ "title": "order", "value": "A-17", "short": false }],
            }],
        })))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .create();

    let config = config_for(
        &server.url(),
        "useAttachment: true\nincludeContextAndExtra: true\n",
    );
    let dispatcher = AlertDispatcher::from_config(&config).unwrap();
    dispatcher
        .try_handle(
            LogRecord::new(Severity::Error, "payment failed")
                .with_context(Fields::new().with_field("order", "A-17")),
        )
        .unwrap();
    mock.assert();
}

#[test]
fn test_ok_false_is_rejected() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", POST_MESSAGE)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":false,"error":"channel_not_found"}"#)
        .create();

    let dispatcher = AlertDispatcher::from_config(&config_for(&server.url(), "")).unwrap();
    let err = dispatcher
        .try_handle(LogRecord::new(Severity::Error, "boom"))
        .unwrap_err();

    match err {
        AlertError::DeliveryRejected { status, reason } => {
            assert_eq!(status, 200);
            assert_eq!(reason, "channel_not_found");
        }
        other => panic!("expected DeliveryRejected, got {:?}", other),
    }
    assert_eq!(dispatcher.metrics().delivery_failures(), 1);
}

#[test]
fn test_server_error_is_rejected() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", POST_MESSAGE)
        .with_status(500)
        .with_body("upstream exploded")
        .create();

    let dispatcher = AlertDispatcher::from_config(&config_for(&server.url(), "")).unwrap();
    let err = dispatcher
        .try_handle(LogRecord::new(Severity::Error, "boom"))
        .unwrap_err();

    assert!(err.is_transient());
    assert!(matches!(err, AlertError::DeliveryRejected { status: 500, .. }));
}

#[test]
fn test_drain_stops_at_first_failure() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", POST_MESSAGE)
        .with_status(403)
        .with_body(r#"{"ok":false,"error":"invalid_auth"}"#)
        .expect(1)
        .create();

    let config = config_for(&server.url(), "activationLevel: ERROR\n");
    let dispatcher = AlertDispatcher::from_config(&config).unwrap();
    dispatcher.info("one");
    dispatcher.info("two");

    let err = dispatcher
        .try_handle(LogRecord::new(Severity::Error, "three"))
        .unwrap_err();
    assert!(matches!(err, AlertError::DeliveryRejected { status: 403, .. }));
    assert_eq!(dispatcher.metrics().delivery_failures(), 1);
    assert_eq!(dispatcher.metrics().dropped_count(), 2);
}

#[test]
fn test_unresponsive_endpoint_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    // Accept connections and never answer
    let held = Arc::new(Mutex::new(Vec::new()));
    let held_clone = Arc::clone(&held);
    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            held_clone.lock().push(stream);
        }
    });

    let config = config_for(&format!("http://{}", addr), "timeoutSeconds: 0.3\n");
    let dispatcher = AlertDispatcher::from_config(&config).unwrap();

    let start = Instant::now();
    let err = dispatcher
        .try_handle(LogRecord::new(Severity::Error, "anyone there?"))
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(
        matches!(err, AlertError::DeliveryTimeout { .. }),
        "expected timeout, got {:?}",
        err
    );
    assert!(elapsed >= Duration::from_millis(250), "returned too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "timeout not bounded: {:?}", elapsed);
}

#[test]
fn test_missing_token_fails_setup() {
    let config = AlertConfig::load_from_str(
        "slackApiTokenEnvVarName: SEL_IT_TOKEN_NEVER_SET\n",
    )
    .unwrap();

    let err = AlertDispatcher::from_config(&config).err().expect("config error");
    assert!(err.is_config_error());
    assert!(err.to_string().contains("SEL_IT_TOKEN_NEVER_SET"));
}

#[test]
fn test_unknown_processor_fails_setup() {
    let config = config_for("http://127.0.0.1:9", "processors: [process_id, telepathy]\n");
    let err = AlertDispatcher::from_config(&config).err().expect("config error");
    assert!(err.is_config_error());
    assert!(err.to_string().contains("telepathy"));
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let err = AlertConfig::load_from_str("slackApiTokn: typo\n").unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_load_yaml_and_json_files() {
    let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(yaml, "slackApiToken: xoxb-file\nactivationLevel: ERROR\nbufferSize: 7").unwrap();
    let config = AlertConfig::load_from_file(yaml.path()).unwrap();
    assert_eq!(config.activation_severity().unwrap(), Severity::Error);
    assert_eq!(config.buffer_size, 7);

    let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        json_file,
        r#"{{"slackApiToken": "xoxb-file", "passthrough": "at_or_above_threshold"}}"#
    )
    .unwrap();
    let config = AlertConfig::load_from_file(json_file.path()).unwrap();
    assert_eq!(config.passthrough, Passthrough::AtOrAboveThreshold);

    let dispatcher = AlertDispatcher::from_config(&config).unwrap();
    assert_eq!(dispatcher.threshold(), Severity::Notice);
    assert_eq!(dispatcher.buffer_capacity(), 100);
}

#[test]
fn test_error_chain_reaches_the_message() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", POST_MESSAGE)
        .match_body(Matcher::Regex("Error\\(disk quota exceeded\\)".to_string()))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .create();

    let config = config_with_format(&server.url(), "%message% %context%", "");
    let dispatcher = AlertDispatcher::from_config(&config).unwrap();

    let io_err = std::io::Error::other("disk quota exceeded");
    dispatcher.log_error(Severity::Error, "upload failed", &io_err);
    mock.assert();
}
