use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum OpenRouterApiError {
    MissingApiKey,
    InvalidHeader(String),
    InvalidRequestPayload(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Serde(JsonError),
    MalformedResponse(String),
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    Unknown(String),
}

impl OpenRouterApiError {
    /// True when the failure means credentials are missing or were rejected.
    pub fn is_authentication(&self) -> bool {
        match self {
            Self::MissingApiKey => true,
            Self::Status(status, _) => {
                matches!(*status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
    pub code: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl ErrorPayloadFields {
    fn rate_limit_message(&self, status: StatusCode) -> Option<String> {
        if status != StatusCode::TOO_MANY_REQUESTS {
            return None;
        }

        let detail = self
            .message
            .as_deref()
            .and_then(non_empty_string)
            .map(|message| format!(": {message}"))
            .unwrap_or_default();
        Some(format!("Rate limited by OpenRouter{detail}"))
    }

    fn message_with_provider(&self) -> Option<String> {
        let message = self.message.as_deref().and_then(non_empty_string)?;
        let provider = self
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("provider_name"))
            .and_then(|value| value.as_str())
            .and_then(non_empty_string);

        Some(match provider {
            Some(provider) => format!("{message} (provider: {provider})"),
            None => message.to_owned(),
        })
    }
}

impl fmt::Display for OpenRouterApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key is required"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::InvalidRequestPayload(message) => write!(f, "invalid request payload: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::MalformedResponse(message) => write!(f, "malformed response: {message}"),
            Self::RetryExhausted { status, last_error } => {
                let status = status
                    .map(|status| status.as_u16().to_string())
                    .unwrap_or_else(|| "n/a".to_owned());
                write!(
                    f,
                    "retry exhausted after max attempts (status: {status}, last_error: {last_error:?})"
                )
            }
            Self::Unknown(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for OpenRouterApiError {}

impl From<reqwest::Error> for OpenRouterApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for OpenRouterApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extracts a human-readable message from an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.to_string()
        }
    };

    let Ok(parsed) = serde_json::from_str::<ErrorPayload>(body) else {
        return fallback();
    };

    if let Some(error) = parsed.value {
        if let Some(message) = error.rate_limit_message(status) {
            return message;
        }
        if let Some(message) = error.message_with_provider() {
            return message;
        }
    }

    fallback()
}

/// Reads the numeric `error.code` of an in-band error body, if present.
pub(crate) fn error_code(fields: &ErrorPayloadFields) -> Option<u16> {
    fields
        .code
        .as_ref()
        .and_then(|code| code.as_u64())
        .and_then(|code| u16::try_from(code).ok())
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
