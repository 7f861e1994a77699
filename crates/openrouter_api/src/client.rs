use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};

use crate::config::OpenRouterConfig;
use crate::error::{parse_error_message, OpenRouterApiError};
use crate::headers::build_headers;
use crate::payload::ChatCompletionRequest;
use crate::response::{parse_completion_body, ChatCompletionResponse};
use crate::retry::{is_retryable_http_error, is_retryable_transport_error, retry_delay, MAX_RETRIES};
use crate::url::normalize_chat_completions_url;

#[derive(Debug)]
pub struct OpenRouterClient {
    http: Client,
    config: OpenRouterConfig,
}

impl OpenRouterClient {
    pub fn new(config: OpenRouterConfig) -> Result<Self, OpenRouterApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(OpenRouterApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OpenRouterConfig {
        &self.config
    }

    pub fn endpoint(&self) -> String {
        normalize_chat_completions_url(&self.config.base_url)
    }

    pub fn build_headers(&self, user_agent: Option<&str>) -> Result<HeaderMap, OpenRouterApiError> {
        let headers = build_headers(&self.config, user_agent)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| OpenRouterApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    OpenRouterApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<reqwest::RequestBuilder, OpenRouterApiError> {
        validate_request_payload_shape(request)?;

        let headers = self.build_headers(self.config.user_agent.as_deref())?;
        let mut payload = request.clone();
        payload.stream = false;
        if payload.model.trim().is_empty() {
            payload.model = self.config.model.clone();
        }

        Ok(self
            .http
            .post(self.endpoint())
            .headers(headers)
            .json(&payload))
    }

    /// Sends the request, retrying transient statuses and transport failures
    /// with exponential backoff. Returns the successful response body.
    pub async fn send_with_retry(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<String, OpenRouterApiError> {
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            match self.build_request(request)?.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await;

                    if status.is_success() {
                        return body.map_err(OpenRouterApiError::from);
                    }

                    last_status = Some(status);
                    let body = body.unwrap_or_else(|_| {
                        status
                            .canonical_reason()
                            .unwrap_or("request failed")
                            .to_string()
                    });
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        tracing::warn!(
                            attempt,
                            status = status.as_u16(),
                            "chat completion failed, retrying"
                        );
                        tokio::time::sleep(retry_delay(attempt)).await;
                        continue;
                    }

                    return Err(OpenRouterApiError::Status(status, message));
                }
                Err(error) => {
                    let retryable = is_retryable_transport_error(&error);
                    last_error = Some(error.to_string());
                    if attempt < MAX_RETRIES && retryable {
                        tracing::warn!(attempt, %error, "chat completion transport error, retrying");
                        tokio::time::sleep(retry_delay(attempt)).await;
                        continue;
                    }
                    if !retryable {
                        return Err(OpenRouterApiError::Request(error));
                    }
                    return Err(OpenRouterApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(OpenRouterApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }

    /// Performs one non-streaming chat completion.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenRouterApiError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            web_search = request.web_search_enabled(),
            "sending chat completion"
        );
        let body = self.send_with_retry(request).await?;
        parse_completion_body(&body)
    }
}

fn validate_request_payload_shape(request: &ChatCompletionRequest) -> Result<(), OpenRouterApiError> {
    if request.messages.is_empty() {
        return Err(OpenRouterApiError::InvalidRequestPayload(
            "'messages' must contain at least one message".to_owned(),
        ));
    }

    if let Some(index) = request.messages.iter().position(|message| !message.is_object()) {
        return Err(OpenRouterApiError::InvalidRequestPayload(format!(
            "message {index} must be a JSON object, got {}",
            value_type_name(&request.messages[index])
        )));
    }

    if !request.tools.is_empty() && request.web_search_enabled() {
        return Err(OpenRouterApiError::InvalidRequestPayload(
            "tools and the web plugin cannot be combined in one request".to_owned(),
        ));
    }

    Ok(())
}

fn value_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
