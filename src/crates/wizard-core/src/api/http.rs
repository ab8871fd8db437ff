//! REST implementation of [`WizardApi`]

use super::{CallbackOutcome, CallbackRequest, StartContext, VerificationMedium, WizardApi, WizardSelector};
use crate::config::WizardConfig;
use crate::error::{FieldErrors, Result, WizardError};
use crate::model::{ExecutionState, Params};
use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tooling::logging::sanitize_for_logging;
use tracing::{debug, warn};
use utils::{AuthHelper, HttpClient};

/// Header identifying the front-end channel
pub const CHANNEL_HEADER: &str = "Channel";

/// What a request was about, for mapping error statuses
enum Target<'a> {
    Wizard(&'a str),
    Execution(&'a str),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputErrorBody {
    #[serde(default)]
    property_errors: FieldErrors,
    #[serde(default)]
    general_errors: Vec<String>,
}

#[derive(Deserialize)]
struct RedirectBody {
    url: String,
}

/// [`WizardApi`] over the banking REST API
///
/// Only the execution fetch (`GET`) is retried by the underlying client;
/// every `POST` is sent once so a transition is never applied twice.
pub struct HttpWizardApi {
    base_url: Url,
    client: HttpClient,
}

impl HttpWizardApi {
    pub fn new(base_url: &str, client: HttpClient) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| WizardError::Configuration(format!("invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(WizardError::Configuration(format!(
                "base URL '{}' cannot carry a path",
                base_url
            )));
        }
        Ok(Self { base_url, client })
    }

    /// Build from configuration, installing the authentication and channel headers
    pub fn from_config(config: &WizardConfig) -> Result<Self> {
        let mut client_config = config.client.clone();
        if let Some(token) = &config.session_token {
            let (name, value) = AuthHelper::session_token(token);
            client_config = client_config.with_header(name, value);
        }
        if let Some(credentials) = &config.credentials {
            client_config = client_config.with_header(
                "Authorization",
                AuthHelper::basic_auth(&credentials.username, &credentials.password),
            );
        }
        client_config = client_config.with_header(CHANNEL_HEADER, config.channel.clone());
        let client = HttpClient::new(client_config)?;
        Self::new(&config.base_url, client)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| WizardError::Configuration(format!("base URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }

    async fn read<T: DeserializeOwned>(&self, response: Response, target: Target<'_>) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WizardError::Request(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                WizardError::InvalidResponse(format!("cannot decode response: {}", e))
            });
        }
        Err(error_for(status, &body, target))
    }

    async fn read_state(&self, response: Response, target: Target<'_>) -> Result<ExecutionState> {
        let state: ExecutionState = self.read(response, target).await?;
        debug!(key = %state.key, action = ?state.action, "received execution state");
        Ok(state)
    }
}

fn error_for(status: StatusCode, body: &str, target: Target<'_>) -> WizardError {
    warn!(status = %status, body = %sanitize_for_logging(body.trim()), "wizard API request failed");
    match (status, target) {
        (StatusCode::NOT_FOUND, Target::Wizard(id)) => WizardError::NotFound(id.to_string()),
        (StatusCode::NOT_FOUND | StatusCode::GONE, Target::Execution(key)) => {
            WizardError::ExpiredExecution {
                key: key.to_string(),
            }
        }
        (StatusCode::UNPROCESSABLE_ENTITY, _) => match serde_json::from_str::<InputErrorBody>(body) {
            Ok(errors) if !errors.property_errors.is_empty() => {
                WizardError::Validation(errors.property_errors)
            }
            Ok(errors) if !errors.general_errors.is_empty() => {
                WizardError::Request(errors.general_errors.join("; "))
            }
            _ => WizardError::Request(format!("{}: {}", status, body.trim())),
        },
        _ => WizardError::Request(format!("{}: {}", status, body.trim())),
    }
}

#[async_trait]
impl WizardApi for HttpWizardApi {
    async fn start(&self, selector: &WizardSelector, context: &StartContext) -> Result<ExecutionState> {
        let url = self.endpoint(&["wizards", &selector.id, "start"])?;
        debug!(url = %url, wizard = %selector.id, "starting wizard");
        let response = self.client.post_json(&url, context).await?;
        self.read_state(response, Target::Wizard(&selector.id)).await
    }

    async fn resume(&self, key: &str) -> Result<ExecutionState> {
        let url = self.endpoint(&["wizard-executions", key])?;
        let response = self.client.get(&url).await?;
        self.read_state(response, Target::Execution(key)).await
    }

    async fn back(&self, key: &str) -> Result<ExecutionState> {
        let url = self.endpoint(&["wizard-executions", key, "back"])?;
        let response = self.client.post_json(&url, &json!({})).await?;
        self.read_state(response, Target::Execution(key)).await
    }

    async fn transition(
        &self,
        key: &str,
        transition: Option<&str>,
        params: &Params,
    ) -> Result<ExecutionState> {
        let url = self.endpoint(&["wizard-executions", key])?;
        let query: Vec<(&str, &str)> = transition.map(|t| ("transition", t)).into_iter().collect();
        let response = self.client.post_json_with_query(&url, &query, params).await?;
        self.read_state(response, Target::Execution(key)).await
    }

    async fn redirect(&self, key: &str, params: &Params) -> Result<String> {
        let url = self.endpoint(&["wizard-executions", key, "redirect"])?;
        let response = self.client.post_json(&url, params).await?;
        let body: RedirectBody = self.read(response, Target::Execution(key)).await?;
        Ok(body.url)
    }

    async fn callback(&self, key: &str, request: &CallbackRequest) -> Result<CallbackOutcome> {
        let url = self.endpoint(&["wizard-executions", key, "callback"])?;
        let response = self.client.post_json(&url, request).await?;
        self.read(response, Target::Execution(key)).await
    }

    async fn send_verification_code(
        &self,
        key: &str,
        medium: VerificationMedium,
        destination: &str,
    ) -> Result<()> {
        let url = self.endpoint(&["wizard-executions", key, "verification-code"])?;
        let body = json!({ "medium": medium, "destination": destination });
        let response = self.client.post_json(&url, &body).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(error_for(status, &text, Target::Execution(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utils::ClientConfig;

    fn api(base: &str) -> Result<HttpWizardApi> {
        HttpWizardApi::new(base, HttpClient::new(ClientConfig::new())?)
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let api = api("https://bank.example/api/").unwrap();
        assert_eq!(
            api.endpoint(&["wizard-executions", "a b/c"]).unwrap(),
            "https://bank.example/api/wizard-executions/a%20b%2Fc"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(api("not a url"), Err(WizardError::Configuration(_))));
        assert!(matches!(api("mailto:x@y.z"), Err(WizardError::Configuration(_))));
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            error_for(StatusCode::NOT_FOUND, "", Target::Wizard("w")),
            WizardError::NotFound(_)
        ));
        assert!(matches!(
            error_for(StatusCode::GONE, "", Target::Execution("k")),
            WizardError::ExpiredExecution { .. }
        ));
        let err = error_for(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"propertyErrors": {"user.email": ["E-mail is already in use"]}}"#,
            Target::Execution("k"),
        );
        assert_eq!(err.field_errors().unwrap()["user.email"], vec!["E-mail is already in use"]);
        assert!(error_for(StatusCode::BAD_GATEWAY, "", Target::Execution("k")).is_retryable());
    }
}
