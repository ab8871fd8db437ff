//! REST API mapping against a mock server

use serde_json::json;
use std::time::Duration;
use utils::ClientConfig;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wizard_core::{
    CallbackOutcome, CallbackRequest, HttpWizardApi, Params, StartContext, VerificationMedium,
    WizardApi, WizardConfig, WizardError, WizardSelector,
};

fn api_for(server: &MockServer) -> HttpWizardApi {
    let config = WizardConfig::new(format!("{}/api", server.uri()))
        .with_session_token("tok-123")
        .with_client(
            ClientConfig::new()
                .with_retry_delay(Duration::from_millis(1))
                .with_max_retries(1),
        );
    HttpWizardApi::from_config(&config).unwrap()
}

fn step_body(key: &str) -> serde_json::Value {
    json!({
        "key": key,
        "wizard": {"id": "signup", "kind": "registration"},
        "step": {"id": "s1", "kind": "group", "groups": [{"id": "G1", "name": "One"}]},
        "params": {},
        "transitions": [{"id": "next", "label": "Next"}],
        "action": "step",
        "path": []
    })
}

#[tokio::test]
async fn start_posts_context_with_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/wizards/signup/start"))
        .and(header("Session-Token", "tok-123"))
        .and(header("Channel", "main"))
        .and(body_json(json!({"inviteToken": "inv"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(step_body("K1")))
        .expect(1)
        .mount(&server)
        .await;

    let context = StartContext {
        invite_token: Some("inv".into()),
        ..Default::default()
    };
    let state = api_for(&server)
        .start(&WizardSelector::registration("signup"), &context)
        .await
        .unwrap();
    assert_eq!(state.key, "K1");
}

#[tokio::test]
async fn start_unknown_wizard_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/wizards/ghost/start"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .start(&WizardSelector::registration("ghost"), &StartContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WizardError::NotFound(ref id) if id == "ghost"));
}

#[tokio::test]
async fn resume_fetches_execution() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wizard-executions/K1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(step_body("K1")))
        .expect(1)
        .mount(&server)
        .await;

    let state = api_for(&server).resume("K1").await.unwrap();
    assert_eq!(state.transitions[0].id, "next");
}

#[tokio::test]
async fn resume_gone_execution_is_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wizard-executions/OLD"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let err = api_for(&server).resume("OLD").await.unwrap_err();
    assert!(err.requires_restart());
}

#[tokio::test]
async fn resume_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wizard-executions/K1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/wizard-executions/K1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(step_body("K1")))
        .mount(&server)
        .await;

    let state = api_for(&server).resume("K1").await.unwrap();
    assert_eq!(state.key, "K1");
}

#[tokio::test]
async fn transition_sends_params_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/wizard-executions/K1"))
        .and(query_param("transition", "next"))
        .and(body_json(json!({"group": "G1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": "K1",
            "wizard": {"id": "signup", "kind": "registration"},
            "action": "finish",
            "resultType": "plainText",
            "result": "Done"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = Params::new();
    params.insert("group", json!("G1"));
    let state = api_for(&server)
        .transition("K1", Some("next"), &params)
        .await
        .unwrap();
    assert!(state.is_finished());
}

#[tokio::test]
async fn default_transition_has_no_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/wizard-executions/K1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(step_body("K1")))
        .mount(&server)
        .await;

    api_for(&server)
        .transition("K1", None, &Params::new())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn failed_transition_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/wizard-executions/K1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&server)
        .await;

    let err = api_for(&server)
        .transition("K1", Some("next"), &Params::new())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn server_side_validation_maps_to_field_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/wizard-executions/K1"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "propertyErrors": {"user.username": ["Login name is already in use"]}
        })))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .transition("K1", Some("next"), &Params::new())
        .await
        .unwrap_err();
    let errors = err.field_errors().unwrap();
    assert_eq!(errors["user.username"], vec!["Login name is already in use"]);
}

#[tokio::test]
async fn back_posts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/wizard-executions/K1/back"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(step_body("K1")))
        .expect(1)
        .mount(&server)
        .await;

    api_for(&server).back("K1").await.unwrap();
}

#[tokio::test]
async fn redirect_returns_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/wizard-executions/K1/redirect"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"url": "https://pay.example/checkout?id=9"})),
        )
        .mount(&server)
        .await;

    let url = api_for(&server).redirect("K1", &Params::new()).await.unwrap();
    assert_eq!(url, "https://pay.example/checkout?id=9");
}

#[tokio::test]
async fn callback_outcomes_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/wizard-executions/K1/callback"))
        .and(body_json(json!({"method": "GET", "parameters": {"code": "abc"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "providerError",
            "message": "access_denied"
        })))
        .mount(&server)
        .await;

    let request = CallbackRequest::new("GET").with_parameter("code", "abc");
    let outcome = api_for(&server).callback("K1", &request).await.unwrap();
    assert_eq!(
        outcome,
        CallbackOutcome::ProviderError {
            message: Some("access_denied".into())
        }
    );
}

#[tokio::test]
async fn malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wizard-executions/K1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = api_for(&server).resume("K1").await.unwrap_err();
    assert!(matches!(err, WizardError::InvalidResponse(_)));
}

#[tokio::test]
async fn verification_code_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/wizard-executions/K1/verification-code"))
        .and(body_json(json!({"medium": "sms", "destination": "+5511999990000"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    api_for(&server)
        .send_verification_code("K1", VerificationMedium::Sms, "+5511999990000")
        .await
        .unwrap();
}

#[tokio::test]
async fn credentials_are_sent_as_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wizard-executions/K1"))
        .and(header("Authorization", "Basic YW5uOnNlY3JldA=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(step_body("K1")))
        .expect(1)
        .mount(&server)
        .await;

    let config = WizardConfig::new(format!("{}/api", server.uri())).with_credentials("ann", "secret");
    let api = HttpWizardApi::from_config(&config).unwrap();
    api.resume("K1").await.unwrap();
}
