//! OpenRouter-backed implementation of the shared `agent_provider` contract.
//!
//! This adapter maps one [`ExchangeRequest`] onto a non-streaming
//! chat-completions call and maps the first returned choice back onto a
//! shared [`Message`].

use std::sync::Arc;
use std::time::Duration;

use agent_provider::{
    Annotation, ExchangeMode, ExchangeRequest, Message, ModelProvider, ProviderError,
    ProviderInitError, ProviderProfile, ToolCall,
};
use openrouter_api::payload::function_tool;
use openrouter_api::{
    ChatCompletionRequest, ChatCompletionResponse, OpenRouterApiError, OpenRouterClient,
    OpenRouterConfig, ResponseMessage,
};
use serde_json::Value;

/// Stable provider identifier used by `chat_agent` startup selection.
pub const OPENROUTER_PROVIDER_ID: &str = "openrouter";

const DEFAULT_MODEL_ID: &str = openrouter_api::config::DEFAULT_MODEL;

/// Runtime configuration for the OpenRouter provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRouterProviderConfig {
    pub api_key: String,
    pub model_id: String,
    pub base_url: Option<String>,
    pub app_title: Option<String>,
    pub app_referer: Option<String>,
    pub timeout: Option<Duration>,
}

impl OpenRouterProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: model_id.into(),
            base_url: None,
            app_title: None,
            app_referer: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_app_title(mut self, title: impl Into<String>) -> Self {
        self.app_title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_app_referer(mut self, referer: impl Into<String>) -> Self {
        self.app_referer = Some(referer.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_openrouter_config(self, model_id: &str) -> OpenRouterConfig {
        let mut config = OpenRouterConfig::new(self.api_key).with_model(model_id);

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(title) = self.app_title {
            config = config.with_title(title);
        }
        if let Some(referer) = self.app_referer {
            config = config.with_referer(referer);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

trait CompletionClient: Send + Sync {
    fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenRouterApiError>;
}

#[derive(Debug)]
struct DefaultCompletionClient {
    client: OpenRouterClient,
}

impl CompletionClient for DefaultCompletionClient {
    fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenRouterApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                OpenRouterApiError::Unknown(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(self.client.complete(request))
    }
}

/// `ModelProvider` adapter backed by `openrouter_api` transport primitives.
pub struct OpenRouterProvider {
    model_id: String,
    completion_client: Arc<dyn CompletionClient>,
}

impl OpenRouterProvider {
    /// Creates a provider using real OpenRouter transport.
    ///
    /// A blank API key is rejected here so the failure surfaces at startup.
    pub fn new(config: OpenRouterProviderConfig) -> Result<Self, ProviderInitError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderInitError::new(
                "OpenRouter API key is missing; set OPENROUTER_API_KEY",
            ));
        }

        let model_id = sanitize_model_id(&config.model_id);
        let completion_client = Arc::new(DefaultCompletionClient {
            client: OpenRouterClient::new(config.into_openrouter_config(&model_id))
                .map_err(map_init_error)?,
        });

        Ok(Self {
            model_id,
            completion_client,
        })
    }

    fn build_completion_request(
        &self,
        request: ExchangeRequest,
    ) -> Result<ChatCompletionRequest, ProviderError> {
        let tools = request
            .advertised_tools()
            .iter()
            .map(|tool| {
                function_tool(
                    &tool.name,
                    tool.description.as_deref(),
                    tool.input_schema.clone(),
                )
            })
            .collect::<Vec<_>>();
        let web_search = request.web_search();

        let messages = request
            .messages
            .iter()
            .map(wire_message)
            .collect::<Result<Vec<_>, _>>()?;
        let attachments = request
            .attachments
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| ProviderError::Runtime(format!("attachment encoding failed: {error}")))?;

        let mut payload = ChatCompletionRequest::new(self.model_id.clone(), messages)
            .with_tools(tools)
            .with_attachments(attachments);
        if web_search {
            payload = payload.with_web_search();
        }

        Ok(payload)
    }

    #[cfg(test)]
    fn with_completion_client_for_tests(
        model_id: &str,
        completion_client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            model_id: sanitize_model_id(model_id),
            completion_client,
        }
    }
}

impl ModelProvider for OpenRouterProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: OPENROUTER_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn exchange(&self, request: ExchangeRequest) -> Result<Message, ProviderError> {
        let mode = request.mode;
        let payload = self.build_completion_request(request)?;

        let response = self
            .completion_client
            .complete(&payload)
            .map_err(map_api_error)?;
        let message = response.into_first_message().map_err(map_api_error)?;

        let message = assistant_message(message)?;
        if mode != ExchangeMode::ToolEnabled && message.has_tool_calls() {
            tracing::debug!(
                calls = message.tool_calls.len(),
                "model returned tool calls on an exchange without advertised tools"
            );
        }
        Ok(message)
    }
}

/// Serializes a stored message for the wire. Annotations are response-only.
fn wire_message(message: &Message) -> Result<Value, ProviderError> {
    let mut value = serde_json::to_value(message)
        .map_err(|error| ProviderError::Runtime(format!("message encoding failed: {error}")))?;
    if let Some(object) = value.as_object_mut() {
        object.remove("annotations");
    }
    Ok(value)
}

fn assistant_message(message: ResponseMessage) -> Result<Message, ProviderError> {
    if let Some(role) = message.role.as_deref() {
        if role != "assistant" {
            tracing::warn!(role, "response message role is not assistant");
        }
    }

    let content = message.text();
    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            serde_json::from_value::<ToolCall>(call).map_err(|error| {
                ProviderError::MalformedResponse(format!("invalid tool call: {error}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let annotations = message
        .annotations
        .unwrap_or_default()
        .into_iter()
        .filter_map(url_citation)
        .collect::<Vec<_>>();

    Ok(Message::assistant_with_tool_calls(content, tool_calls).with_annotations(annotations))
}

fn url_citation(annotation: Value) -> Option<Annotation> {
    if annotation.get("type").and_then(Value::as_str) != Some("url_citation") {
        return None;
    }

    match serde_json::from_value::<Annotation>(annotation) {
        Ok(annotation) => Some(annotation),
        Err(error) => {
            tracing::debug!(%error, "dropping unparseable url citation");
            None
        }
    }
}

fn sanitize_model_id(model_id: &str) -> String {
    let trimmed = model_id.trim();
    if trimmed.is_empty() {
        DEFAULT_MODEL_ID.to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_init_error(error: OpenRouterApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize openrouter provider: {error}"))
}

fn map_api_error(error: OpenRouterApiError) -> ProviderError {
    if error.is_authentication() {
        return ProviderError::Authentication(error.to_string());
    }

    match error {
        OpenRouterApiError::Status(status, message) => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
        OpenRouterApiError::Request(error) => ProviderError::Network(error.to_string()),
        error @ OpenRouterApiError::RetryExhausted { .. } => ProviderError::Network(error.to_string()),
        OpenRouterApiError::MalformedResponse(message) => ProviderError::MalformedResponse(message),
        OpenRouterApiError::Serde(error) => ProviderError::MalformedResponse(error.to_string()),
        error => ProviderError::Runtime(error.to_string()),
    }
}
