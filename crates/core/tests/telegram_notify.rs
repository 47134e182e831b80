//! End-to-end tests for the Telegram notifier against a fake Bot API.
//!
//! A `wiremock` server stands in for `api.telegram.org`; the notifier is
//! pointed at it through `api_url`. No external network access.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tgnotify_core::config::{ParseMode, RawTelegramConfig};
use tgnotify_core::context::ContextError;
use tgnotify_core::errors::{NotifyError, TemplateError};
use tgnotify_core::models::{Alert, AlertGroup};
use tgnotify_core::notify::message::MAX_MESSAGE_CHARS;
use tgnotify_core::notify::{DefaultRenderer, Reason, Renderer};
use tgnotify_core::secret::Secret;
use tgnotify_core::{DispatchContext, TelegramConfig, TelegramNotifier};

const TOKEN: &str = "123456:SECRET-token";

// ===========================================================================
// Helpers
// ===========================================================================

fn raw_config(api_url: &str) -> RawTelegramConfig {
    RawTelegramConfig {
        api_url: Some(api_url.into()),
        chat_id: Some(1234),
        bot_token: Some(Secret::new(TOKEN)),
        ..Default::default()
    }
}

fn build(raw: RawTelegramConfig, renderer: Arc<dyn Renderer>) -> TelegramNotifier {
    let config = TelegramConfig::parse(raw).expect("valid config");
    TelegramNotifier::new(config, renderer, reqwest::Client::new()).expect("notifier")
}

fn build_default(raw: RawTelegramConfig) -> TelegramNotifier {
    let config = TelegramConfig::parse(raw).expect("valid config");
    TelegramNotifier::with_default_renderer(config, reqwest::Client::new()).expect("notifier")
}

fn notifier(api_url: &str) -> TelegramNotifier {
    build_default(raw_config(api_url))
}

fn firing_group() -> AlertGroup {
    AlertGroup::new(
        "ops",
        vec![Alert::firing("HighLatency")
            .with_label("severity", "page")
            .with_annotation("summary", "p99 above 2s")],
    )
    .with_group_label("alertname", "HighLatency")
}

fn send_path(token: &str) -> String {
    format!("/bot{token}/sendMessage")
}

fn assert_no_token(err: &NotifyError, token: &str) {
    let text = format!("{err} {err:?}");
    assert!(!text.contains(token), "token leaked: {text}");
}

// ===========================================================================
// Delivery and classification
// ===========================================================================

#[tokio::test]
async fn test_successful_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(send_path(TOKEN)))
        .and(body_partial_json(json!({
            "chat_id": 1234,
            "parse_mode": "HTML",
            "disable_web_page_preview": false,
            "disable_notification": false,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let n = notifier(&server.uri());
    n.notify(&DispatchContext::new(), &firing_group())
        .await
        .expect("send should succeed");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = body["text"].as_str().unwrap();
    assert!(text.contains("[FIRING:1] HighLatency"));
    assert!(text.contains("p99 above 2s"));
}

#[tokio::test]
async fn test_rate_limited_is_retriable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 3",
            "parameters": {"retry_after": 3}
        })))
        .mount(&server)
        .await;

    let err = notifier(&server.uri())
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();

    assert!(err.retriable());
    match err {
        NotifyError::Remote {
            status,
            reason,
            ref description,
            ..
        } => {
            assert_eq!(status, 429);
            assert_eq!(reason, Reason::RateLimited);
            assert!(description.contains("retry after 3s"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_retriable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = notifier(&server.uri())
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();
    assert!(err.retriable());
    assert!(err.to_string().contains("server error"));
    assert!(err.to_string().contains("upstream unavailable"));
}

#[tokio::test]
async fn test_client_error_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let err = notifier(&server.uri())
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();
    assert!(!err.retriable());
    assert_eq!(
        err.to_string(),
        "Telegram API returned HTTP 400 (client error): Bad Request: chat not found"
    );
}

#[tokio::test]
async fn test_teapot_falls_into_client_bucket() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(418))
        .mount(&server)
        .await;

    let err = notifier(&server.uri())
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();
    assert!(!err.retriable());
    assert!(matches!(
        err,
        NotifyError::Remote {
            reason: Reason::ClientError,
            ..
        }
    ));
}

// ===========================================================================
// Secret handling
// ===========================================================================

#[tokio::test]
async fn test_remote_echo_of_token_is_redacted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ok": false,
            "error_code": 401,
            "description": format!("Unauthorized: bot{TOKEN} is not valid")
        })))
        .mount(&server)
        .await;

    let err = notifier(&server.uri())
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();
    assert_no_token(&err, TOKEN);
    assert!(err.to_string().contains("<redacted>"));
}

#[tokio::test]
async fn test_transport_error_leaks_no_token() {
    // Nothing listens on port 1.
    let err = notifier("http://127.0.0.1:1")
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Transport { .. }));
    assert!(err.retriable());
    assert_no_token(&err, TOKEN);
}

#[tokio::test]
async fn test_token_file_is_reread_on_each_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(send_path("111:first")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(send_path("222:second")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token");
    std::fs::write(&token_path, "111:first\n").unwrap();

    let raw = RawTelegramConfig {
        api_url: Some(server.uri()),
        chat_id: Some(1234),
        bot_token_file: Some(token_path.clone()),
        ..Default::default()
    };
    let n = build_default(raw);
    let ctx = DispatchContext::new();

    n.notify(&ctx, &firing_group()).await.unwrap();
    std::fs::write(&token_path, "222:second\n").unwrap();
    n.notify(&ctx, &firing_group()).await.unwrap();
}

#[tokio::test]
async fn test_file_token_redacted_in_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string("failed for bot987:file-token"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token");
    std::fs::write(&token_path, "987:file-token").unwrap();

    let raw = RawTelegramConfig {
        api_url: Some(server.uri()),
        chat_id: Some(1234),
        bot_token_file: Some(token_path),
        ..Default::default()
    };
    let err = build_default(raw)
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();
    assert!(err.retriable());
    assert_no_token(&err, "987:file-token");
}

// ===========================================================================
// Permanent local failures
// ===========================================================================

#[tokio::test]
async fn test_missing_token_file_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let raw = RawTelegramConfig {
        api_url: Some(server.uri()),
        chat_id: Some(1234),
        bot_token_file: Some(PathBuf::from("/nonexistent/tgnotify/token")),
        ..Default::default()
    };
    let err = build_default(raw)
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Credential(_)));
    assert!(!err.retriable());
}

#[tokio::test]
async fn test_template_error_is_surfaced_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let failing = |name: &str, _: &AlertGroup| -> Result<String, TemplateError> {
        Err(TemplateError::Render {
            name: name.to_string(),
            detail: "unexpected EOF".into(),
        })
    };
    let err = build(raw_config(&server.uri()), Arc::new(failing))
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();

    assert!(!err.retriable());
    match err {
        NotifyError::Template(inner) => assert_eq!(
            inner,
            TemplateError::Render {
                name: "telegram.default.message".into(),
                detail: "unexpected EOF".into(),
            }
        ),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_template_name() {
    let mut raw = raw_config("http://127.0.0.1:1");
    raw.message = Some("custom.missing".into());
    let err = build_default(raw)
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NotifyError::Template(TemplateError::UnknownTemplate(_))
    ));
}

#[tokio::test]
async fn test_empty_render_is_rejected() {
    let blank = |_: &str, _: &AlertGroup| -> Result<String, TemplateError> { Ok("  \n".into()) };
    let err = build(raw_config("http://127.0.0.1:1"), Arc::new(blank))
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Template(TemplateError::Empty(_))));
    assert!(!err.retriable());
}

// ===========================================================================
// Cancellation
// ===========================================================================

#[tokio::test]
async fn test_cancel_aborts_pending_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let n = notifier(&server.uri());
    let ctx = DispatchContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), n.notify(&ctx, &firing_group()))
        .await
        .expect("notify must return promptly after cancellation");
    let err = result.unwrap_err();
    assert!(err.retriable());
    assert!(matches!(err, NotifyError::Context(ContextError::Canceled)));
    assert_no_token(&err, TOKEN);
}

#[tokio::test]
async fn test_deadline_aborts_pending_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let n = notifier(&server.uri());
    let ctx = DispatchContext::new().with_timeout(Duration::from_millis(100));

    let result = tokio::time::timeout(Duration::from_secs(5), n.notify(&ctx, &firing_group()))
        .await
        .expect("notify must return promptly after the deadline");
    let err = result.unwrap_err();
    assert!(err.retriable());
    assert!(matches!(
        err,
        NotifyError::Context(ContextError::DeadlineExceeded)
    ));
}

#[tokio::test]
async fn test_already_cancelled_context() {
    let ctx = DispatchContext::new();
    ctx.cancel();
    let err = notifier("http://127.0.0.1:1")
        .notify(&ctx, &firing_group())
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Context(ContextError::Canceled)));
}

// ===========================================================================
// Message shaping
// ===========================================================================

#[tokio::test]
async fn test_long_message_is_truncated_to_one_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let huge = |_: &str, _: &AlertGroup| -> Result<String, TemplateError> {
        Ok("a".repeat(MAX_MESSAGE_CHARS * 3))
    };
    build(raw_config(&server.uri()), Arc::new(huge))
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = body["text"].as_str().unwrap();
    assert_eq!(text.chars().count(), MAX_MESSAGE_CHARS);
    assert!(text.ends_with('…'));
}

#[tokio::test]
async fn test_delivery_settings_on_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "chat_id": -1001,
            "message_thread_id": 9,
            "disable_web_page_preview": true,
            "disable_notification": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut raw = raw_config(&server.uri());
    raw.chat_id = Some(-1001);
    raw.message_thread_id = Some(9);
    raw.disable_web_page_preview = Some(true);
    raw.disable_notifications = Some(true);
    raw.parse_mode = Some("Plain".into());
    build_default(raw)
        .notify(&DispatchContext::new(), &firing_group())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("parse_mode").is_none());
    let text = body["text"].as_str().unwrap();
    assert!(text.starts_with("[FIRING:1] HighLatency (page)"));
    assert!(!text.contains("<b>"));
}

#[tokio::test]
async fn test_markdown_v2_receiver_gets_escaped_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"parse_mode": "MarkdownV2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut raw = raw_config(&server.uri());
    raw.parse_mode = Some("MarkdownV2".into());
    let group = AlertGroup::new(
        "ops",
        vec![Alert::firing("Disk.Full").with_label("instance", "db-1")],
    )
    .with_group_label("alertname", "Disk.Full");
    build_default(raw)
        .notify(&DispatchContext::new(), &group)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = body["text"].as_str().unwrap();
    assert!(!text.contains("<b>"));
    assert!(text.starts_with(r"*\[FIRING:1\] Disk\.Full \(db\-1\)*"));
    assert!(text.contains(r" \- instance \= db\-1"));
}

#[test]
fn test_html_renderer_rejected_for_markdown_receiver() {
    let mut raw = raw_config("https://api.telegram.org");
    raw.parse_mode = Some("MarkdownV2".into());
    let config = TelegramConfig::parse(raw).unwrap();
    assert_eq!(config.parse_mode, ParseMode::MarkdownV2);

    let result = TelegramNotifier::new(
        config,
        Arc::new(DefaultRenderer::new(ParseMode::Html)),
        reqwest::Client::new(),
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_resolved_group_skipped_when_send_resolved_off() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut raw = raw_config(&server.uri());
    raw.send_resolved = Some(false);
    let group = AlertGroup::new(
        "ops",
        vec![Alert::firing("HighLatency").resolved_at(chrono::Utc::now())],
    );
    build_default(raw)
        .notify(&DispatchContext::new(), &group)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_notifies_are_independent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(3)
        .mount(&server)
        .await;

    let n = Arc::new(notifier(&server.uri()));
    let ctx = DispatchContext::new();
    let groups: Vec<AlertGroup> = ["A", "B", "C"]
        .iter()
        .map(|name| AlertGroup::new("ops", vec![Alert::firing(name)]))
        .collect();

    let (a, b, c) = tokio::join!(
        n.notify(&ctx, &groups[0]),
        n.notify(&ctx, &groups[1]),
        n.notify(&ctx, &groups[2]),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
}
