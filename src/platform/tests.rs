use super::*;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_identity() -> AppIdentity {
    AppIdentity {
        app_id: "talk_assistant".to_string(),
        app_version: "1.0.0".to_string(),
        app_secret: "12345".to_string(),
    }
}

fn expected_auth_header(user: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{}:12345", user))
}

#[test]
fn test_sign_sets_all_headers() {
    let client = PlatformClient::new("https://cloud.example.com", test_identity());
    let mut headers = HeaderMap::new();
    client.sign(&mut headers, "admin").unwrap();

    assert_eq!(
        headers.get(HDR_AUTHORIZATION).unwrap(),
        expected_auth_header("admin").as_str()
    );
    assert_eq!(headers.get(HDR_APP_ID).unwrap(), "talk_assistant");
    assert_eq!(headers.get(HDR_APP_VERSION).unwrap(), "1.0.0");
    assert_eq!(headers.get("OCS-APIRequest").unwrap(), "true");
}

#[test]
fn test_sign_same_value_every_call() {
    // Static-secret auth: the encoded value never varies per request
    let client = PlatformClient::new("https://cloud.example.com", test_identity());
    let mut first = HeaderMap::new();
    let mut second = HeaderMap::new();
    client.sign(&mut first, "").unwrap();
    client.sign(&mut second, "").unwrap();
    assert_eq!(
        first.get(HDR_AUTHORIZATION).unwrap(),
        second.get(HDR_AUTHORIZATION).unwrap()
    );
}

#[tokio::test]
async fn test_config_value_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CONFIG_VALUES_PATH))
        .and(query_param("format", "json"))
        .and(header(HDR_AUTHORIZATION, expected_auth_header("").as_str()))
        .and(header(HDR_APP_ID, "talk_assistant"))
        .and(body_partial_json(serde_json::json!({"configKeys": ["abc123"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ocs": { "data": [ { "configkey": "abc123", "configvalue": "route-secret" } ] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PlatformClient::new(server.uri(), test_identity());
    let value = client.config_value("abc123").await.unwrap();
    assert_eq!(value, "route-secret");
}

#[tokio::test]
async fn test_config_value_missing_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CONFIG_VALUES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ocs": { "data": [] }
        })))
        .mount(&server)
        .await;

    let client = PlatformClient::new(server.uri(), test_identity());
    assert!(client.config_value("missing").await.is_err());
}

#[tokio::test]
async fn test_schedule_text_task_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TASK_SCHEDULE_PATH))
        .and(query_param("format", "json"))
        .and(body_partial_json(serde_json::json!({
            "input": { "input": "what sounds do cats make?" },
            "type": "core:text2text",
            "appId": "assistant_talk_bot",
            "webhookUri": "/message?reply_to=42&token=tok1",
            "webhookMethod": "AppAPI:assistant_talk_bot:POST",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ocs": { "data": { "task": { "id": 7, "status": "STATUS_SCHEDULED" } } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PlatformClient::new(server.uri(), test_identity());
    let data = client
        .schedule_text_task(
            "what sounds do cats make?",
            "assistant_talk_bot",
            "/message?reply_to=42&token=tok1",
            "AppAPI:assistant_talk_bot:POST",
        )
        .await
        .unwrap();
    assert!(data.get("message").is_none());
    assert_eq!(data["task"]["id"], 7);
}

#[tokio::test]
async fn test_schedule_error_surfaces_message_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TASK_SCHEDULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ocs": { "data": { "message": "No provider for core:text2text" } }
        })))
        .mount(&server)
        .await;

    let client = PlatformClient::new(server.uri(), test_identity());
    let data = client
        .schedule_text_task("hi", "assistant_talk_bot", "/message?reply_to=1&token=t", "AppAPI:assistant_talk_bot:POST")
        .await
        .unwrap();
    assert_eq!(
        data.get("message").and_then(Value::as_str),
        Some("No provider for core:text2text")
    );
}

#[tokio::test]
async fn test_register_bot_returns_id_and_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TALK_BOT_PATH))
        .and(body_partial_json(serde_json::json!({
            "name": "Assistant Talk Bot",
            "route": "assistant_talk_bot",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ocs": { "data": { "id": "6594122c897f", "secret": "fresh-secret" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PlatformClient::new(server.uri(), test_identity());
    let (id, secret) = client
        .register_bot("Assistant Talk Bot", "assistant_talk_bot", "Usage: `@assistant ...`")
        .await
        .unwrap();
    assert_eq!(id, "6594122c897f");
    assert_eq!(secret, "fresh-secret");
}

#[tokio::test]
async fn test_unregister_bot_sends_delete() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(TALK_BOT_PATH))
        .and(body_partial_json(serde_json::json!({"route": "assistant_talk_bot"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ocs": { "data": [] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PlatformClient::new(server.uri(), test_identity());
    client.unregister_bot("assistant_talk_bot").await.unwrap();
}

#[tokio::test]
async fn test_http_error_is_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TASK_SCHEDULE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = PlatformClient::new(server.uri(), test_identity());
    let err = client
        .schedule_text_task("hi", "r", "/message?reply_to=1&token=t", "AppAPI:r:POST")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_missing_ocs_envelope_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CONFIG_VALUES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&server)
        .await;

    let client = PlatformClient::new(server.uri(), test_identity());
    let err = client.config_value("abc").await.unwrap_err();
    assert!(err.to_string().contains("ocs.data"));
}
