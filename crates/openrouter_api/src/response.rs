use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{error_code, parse_error_message, ErrorPayload, OpenRouterApiError};

/// Non-streaming chat-completions response document.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub finish_reason: Option<String>,
    pub message: ResponseMessage,
}

/// Assistant message as returned on the wire. Tool calls and annotations
/// stay raw so the provider adapter decides how to validate them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(default)]
    pub annotations: Option<Vec<Value>>,
}

impl ResponseMessage {
    /// Flattens string or content-part array forms into plain text.
    pub fn text(&self) -> String {
        match &self.content {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.as_str()),
                    Value::Object(_) => part.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect(),
            _ => String::new(),
        }
    }
}

impl ChatCompletionResponse {
    /// Returns the first choice's message, failing when the model returned none.
    pub fn into_first_message(self) -> Result<ResponseMessage, OpenRouterApiError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| {
                OpenRouterApiError::MalformedResponse("response contained no choices".to_owned())
            })
    }
}

/// Parses a success-status body, surfacing in-band `{"error": ...}` documents
/// as status errors.
pub fn parse_completion_body(body: &str) -> Result<ChatCompletionResponse, OpenRouterApiError> {
    let value: Value = serde_json::from_str(body).map_err(|error| {
        OpenRouterApiError::MalformedResponse(format!("response body is not JSON: {error}"))
    })?;

    if value.get("error").is_some_and(|error| !error.is_null()) {
        let status = serde_json::from_value::<ErrorPayload>(value.clone())
            .ok()
            .and_then(|payload| payload.value)
            .as_ref()
            .and_then(error_code)
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        return Err(OpenRouterApiError::Status(
            status,
            parse_error_message(status, body),
        ));
    }

    serde_json::from_value(value)
        .map_err(|error| OpenRouterApiError::MalformedResponse(error.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_flattens_content_parts() {
        let message = ResponseMessage {
            content: Some(json!([
                { "type": "text", "text": "Hello" },
                { "type": "text", "text": ", world" },
            ])),
            ..ResponseMessage::default()
        };

        assert_eq!(message.text(), "Hello, world");
    }

    #[test]
    fn null_content_flattens_to_empty_text() {
        let message = ResponseMessage {
            content: Some(Value::Null),
            ..ResponseMessage::default()
        };

        assert_eq!(message.text(), "");
    }

    #[test]
    fn in_band_error_uses_embedded_code_as_status() {
        let error = parse_completion_body(r#"{"error":{"code":401,"message":"No auth credentials found"}}"#)
            .expect_err("in-band error must fail");

        assert!(matches!(
            error,
            OpenRouterApiError::Status(status, ref message)
                if status == StatusCode::UNAUTHORIZED && message == "No auth credentials found"
        ));
        assert!(error.is_authentication());
    }

    #[test]
    fn non_json_body_is_malformed() {
        let error = parse_completion_body("<html>").expect_err("html must fail");
        assert!(matches!(error, OpenRouterApiError::MalformedResponse(_)));
    }

    #[test]
    fn empty_choices_is_malformed() {
        let response = parse_completion_body(r#"{"id":"gen-1","choices":[]}"#).expect("parses");
        let error = response.into_first_message().expect_err("no choices");
        assert!(matches!(error, OpenRouterApiError::MalformedResponse(_)));
    }
}
