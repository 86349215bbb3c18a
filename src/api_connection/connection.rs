use async_trait::async_trait;
use dotenv::dotenv;
use reqwest::Client;
use std::env;
use thiserror::Error;
use tracing::{debug, warn};

use super::endpoints::{
    ApiErrorBody, GeminiAvailableModel, GenerateContentRequest, GenerateContentResponse,
    Provider, DEFAULT_API_BASE, GEMINI_MODELS,
};
use crate::config::AppConfig;
use crate::json_recovery::parse_json_as;

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    #[error("Model returned no text content")]
    EmptyResponse,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ApiConnectionError {
    /// True when the service reported itself temporarily unavailable (HTTP 503).
    pub fn is_service_unavailable(&self) -> bool {
        match self {
            ApiConnectionError::ApiError { status, error_body } => {
                *status == reqwest::StatusCode::SERVICE_UNAVAILABLE
                    || parse_json_as::<ApiErrorBody>(error_body)
                        .and_then(|body| body.error.status)
                        .is_some_and(|s| s == "UNAVAILABLE")
            }
            _ => false,
        }
    }

    /// The `error.message` of the API's error envelope, when there is one.
    pub fn api_message(&self) -> Option<String> {
        match self {
            ApiConnectionError::ApiError { error_body, .. } => {
                parse_json_as::<ApiErrorBody>(error_body).and_then(|body| body.error.message)
            }
            _ => None,
        }
    }
}

/// Anything able to answer a [`GenerateContentRequest`] with raw model text.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_text(
        &self,
        request: GenerateContentRequest,
    ) -> Result<String, ApiConnectionError>;
}

impl Provider {
    pub fn gemini(api_key_env_var_name: &str, model: &str) -> Self {
        dotenv().ok();
        Self::Gemini {
            api_key_env_var: api_key_env_var_name.to_string(),
            base_url: DEFAULT_API_BASE.to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::Gemini {
            api_key_env_var: config.api_key_env_var.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    pub fn with_base_url(self, url: &str) -> Self {
        match self {
            Provider::Gemini {
                api_key_env_var,
                model,
                ..
            } => Provider::Gemini {
                api_key_env_var,
                base_url: url.trim_end_matches('/').to_string(),
                model,
            },
        }
    }

    pub fn get_available_models(&self) -> Vec<GeminiAvailableModel> {
        match self {
            Provider::Gemini { .. } => GEMINI_MODELS.to_vec(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Gemini { model, .. } => model,
        }
    }

    pub async fn call_generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ApiConnectionError> {
        match self {
            Provider::Gemini {
                api_key_env_var,
                base_url,
                model,
            } => {
                let actual_api_key = env::var(api_key_env_var)
                    .map_err(|_| ApiConnectionError::MissingApiKey(api_key_env_var.clone()))?;

                let client = Client::new();
                let url = format!("{}/v1beta/models/{}:generateContent", base_url, model);
                debug!(%url, "calling generateContent");

                let response = client
                    .post(&url)
                    .header("x-goog-api-key", actual_api_key)
                    .header("Content-Type", "application/json")
                    .json(request)
                    .send()
                    .await?;

                if response.status().is_success() {
                    let body = response.text().await?;
                    let parsed = serde_json::from_str::<GenerateContentResponse>(&body)?;
                    Ok(parsed)
                } else {
                    let status = response.status();
                    let error_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to read error body".to_string());
                    let err = ApiConnectionError::ApiError { status, error_body };
                    warn!(
                        %status,
                        message = err.api_message().as_deref().unwrap_or("-"),
                        "generateContent returned an error status"
                    );
                    Err(err)
                }
            }
        }
    }
}

#[async_trait]
impl ContentGenerator for Provider {
    async fn generate_text(
        &self,
        request: GenerateContentRequest,
    ) -> Result<String, ApiConnectionError> {
        let response = self.call_generate_content(&request).await?;
        let text = response.text().ok_or(ApiConnectionError::EmptyResponse)?;
        debug!(model = self.model(), chars = text.len(), "received model text");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_unavailable_detection() {
        let unavailable = ApiConnectionError::ApiError {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            error_body: String::new(),
        };
        assert!(unavailable.is_service_unavailable());

        let by_body = ApiConnectionError::ApiError {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            error_body: r#"{"error": {"status": "UNAVAILABLE"}}"#.to_string(),
        };
        assert!(by_body.is_service_unavailable());

        let other = ApiConnectionError::ApiError {
            status: reqwest::StatusCode::BAD_REQUEST,
            error_body: "UNAVAILABLE upstream, not json".to_string(),
        };
        assert!(!other.is_service_unavailable());

        assert!(!ApiConnectionError::MissingApiKey("API_KEY".to_string()).is_service_unavailable());
    }

    #[test]
    fn api_message_reads_error_envelope() {
        let err = ApiConnectionError::ApiError {
            status: reqwest::StatusCode::BAD_REQUEST,
            error_body: r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#.to_string(),
        };
        assert_eq!(err.api_message().as_deref(), Some("API key not valid."));
        assert!(!err.is_service_unavailable());

        let plain = ApiConnectionError::ApiError {
            status: reqwest::StatusCode::BAD_GATEWAY,
            error_body: "Bad Gateway".to_string(),
        };
        assert_eq!(plain.api_message(), None);
    }

    #[test]
    fn base_url_override_strips_trailing_slash() {
        let provider = Provider::gemini("API_KEY", "gemini-2.0-flash")
            .with_base_url("http://127.0.0.1:9000/");
        match provider {
            Provider::Gemini { base_url, model, .. } => {
                assert_eq!(base_url, "http://127.0.0.1:9000");
                assert_eq!(model, "gemini-2.0-flash");
            }
        }
    }
}
