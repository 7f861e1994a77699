//! Minimal provider-agnostic contract for one model exchange.
//!
//! This crate defines the conversation data model shared by transports, the
//! session store and `chat_agent`, plus the blocking [`ModelProvider`] seam.
//! It excludes transport details and multi-exchange orchestration.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Tool name the model uses to request a shell command.
pub const EXECUTE_SHELL_COMMAND: &str = "execute_shell_command";
/// Tool name the model uses to request web-search augmentation.
pub const PERFORM_WEB_SEARCH: &str = "perform_web_search";

/// Error returned while constructing/configuring a provider before any exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Typed failure of a single exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, retries exhausted).
    Network(String),
    /// Credentials missing or rejected by the remote API.
    Authentication(String),
    /// The response body could not be mapped to an assistant message.
    MalformedResponse(String),
    /// Non-success HTTP status with a parsed error message.
    Api { status: u16, message: String },
    /// Local runtime failure while driving the exchange.
    Runtime(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Authentication(message) => write!(f, "authentication error: {message}"),
            Self::MalformedResponse(message) => write!(f, "malformed response: {message}"),
            Self::Api { status, message } => write!(f, "API error (HTTP {status}): {message}"),
            Self::Runtime(message) => write!(f, "runtime error: {message}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Conversation role of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One conversation turn in chat-completions shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            annotations: Vec::new(),
            tool_call_id: None,
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant message requesting tool calls; `content` may be empty.
    #[must_use]
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Tool result answering the call identified by `tool_call_id`.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    #[must_use]
    pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
        self.annotations = annotations;
        self
    }

    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Returns the citations carried by this message in annotation order.
    pub fn citations(&self) -> impl Iterator<Item = &Citation> {
        self.annotations.iter().map(|annotation| match annotation {
            Annotation::UrlCitation { url_citation } => url_citation,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallType {
    #[default]
    Function,
}

/// Function name plus string-encoded JSON arguments, exactly as the model sent them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub arguments: String,
}

/// One model-issued tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default)]
    pub call_type: ToolCallType,
    pub function: FunctionCall,
}

impl ToolCall {
    #[must_use]
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: ToolCallType::Function,
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Decodes the string-encoded argument payload. Blank payloads decode to `{}`.
    pub fn parse_arguments(&self) -> Result<Value, serde_json::Error> {
        let raw = self.function.arguments.trim();
        if raw.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        serde_json::from_str(raw)
    }
}

/// Source reference attached to web-search augmented answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub end_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    UrlCitation { url_citation: Citation },
}

impl From<Citation> for Annotation {
    fn from(url_citation: Citation) -> Self {
        Self::UrlCitation { url_citation }
    }
}

/// Opaque file payload sent alongside the message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub media_type: String,
    pub data: String,
}

impl Attachment {
    #[must_use]
    pub fn new(media_type: impl Into<String>, base64_data: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            data: base64_data.into(),
        }
    }
}

/// Augmentation mode for one exchange. Tool advertisement and web search are
/// mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExchangeMode {
    #[default]
    Plain,
    ToolEnabled,
    WebSearch,
}

/// Generic host-mediated tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Input for one provider exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRequest {
    pub messages: Vec<Message>,
    pub mode: ExchangeMode,
    pub tools: Vec<ToolDefinition>,
    pub attachments: Vec<Attachment>,
}

impl ExchangeRequest {
    #[must_use]
    pub fn new(messages: Vec<Message>, mode: ExchangeMode) -> Self {
        Self {
            messages,
            mode,
            tools: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Tools that may be advertised for this exchange; empty unless tool-enabled.
    #[must_use]
    pub fn advertised_tools(&self) -> &[ToolDefinition] {
        match self.mode {
            ExchangeMode::ToolEnabled => &self.tools,
            ExchangeMode::Plain | ExchangeMode::WebSearch => &[],
        }
    }

    #[must_use]
    pub fn web_search(&self) -> bool {
        self.mode == ExchangeMode::WebSearch
    }
}

/// Immutable metadata describing a model provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Provider interface for executing one request/response exchange.
pub trait ModelProvider: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Sends the request and returns exactly one assistant-role message.
    ///
    /// Blocks until the remote model answers or the transport fails.
    fn exchange(&self, request: ExchangeRequest) -> Result<Message, ProviderError>;
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct EchoProvider;

    impl ModelProvider for EchoProvider {
        fn profile(&self) -> ProviderProfile {
            ProviderProfile {
                provider_id: "echo".to_string(),
                model_id: "echo-model".to_string(),
            }
        }

        fn exchange(&self, request: ExchangeRequest) -> Result<Message, ProviderError> {
            let last = request
                .messages
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_default();
            Ok(Message::assistant(last))
        }
    }

    #[test]
    fn provider_init_error_preserves_message() {
        let error = ProviderInitError::new("missing token");
        assert_eq!(error.message(), "missing token");
        assert_eq!(error.to_string(), "missing token");
    }

    #[test]
    fn provider_error_display_names_failure_class() {
        assert_eq!(
            ProviderError::Authentication("bad key".to_string()).to_string(),
            "authentication error: bad key"
        );
        assert_eq!(
            ProviderError::Api {
                status: 500,
                message: "boom".to_string(),
            }
            .to_string(),
            "API error (HTTP 500): boom"
        );
    }

    #[test]
    fn echo_provider_returns_single_assistant_message() {
        let reply = EchoProvider
            .exchange(ExchangeRequest::new(
                vec![Message::user("ping")],
                ExchangeMode::Plain,
            ))
            .expect("echo exchange should succeed");

        assert_eq!(reply, Message::assistant("ping"));
        assert_eq!(EchoProvider.profile().model_id, "echo-model");
    }

    #[test]
    fn tool_message_serializes_with_call_id_and_without_empty_collections() {
        let value = serde_json::to_value(Message::tool("call-1", "done")).expect("serialize");
        assert_eq!(
            value,
            json!({ "role": "tool", "content": "done", "tool_call_id": "call-1" })
        );
    }

    #[test]
    fn assistant_tool_calls_use_function_envelope() {
        let message = Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::function(
                "call-1",
                EXECUTE_SHELL_COMMAND,
                r#"{"command":"ls"}"#,
            )],
        );

        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value["tool_calls"][0]["type"], "function");
        assert_eq!(value["tool_calls"][0]["function"]["name"], "execute_shell_command");
        assert_eq!(
            value["tool_calls"][0]["function"]["arguments"],
            r#"{"command":"ls"}"#
        );
    }

    #[test]
    fn null_content_and_tool_calls_deserialize_as_empty() {
        let message: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": null,
        }))
        .expect("deserialize");

        assert_eq!(message, Message::assistant(""));
    }

    #[test]
    fn citations_round_trip_through_url_citation_envelope() {
        let citation = Citation {
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            content: "excerpt".to_string(),
            start_index: 0,
            end_index: 4,
        };
        let message = Message::assistant("text").with_annotations(vec![citation.clone().into()]);

        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value["annotations"][0]["type"], "url_citation");
        assert_eq!(value["annotations"][0]["url_citation"]["url"], "https://example.com");

        let decoded: Message = serde_json::from_value(value).expect("deserialize");
        assert_eq!(decoded.citations().collect::<Vec<_>>(), vec![&citation]);
    }

    #[test]
    fn parse_arguments_decodes_payload_and_treats_blank_as_empty_object() {
        let call = ToolCall::function("call-1", PERFORM_WEB_SEARCH, r#"{"topic":"weather"}"#);
        assert_eq!(call.parse_arguments().expect("valid"), json!({ "topic": "weather" }));

        let blank = ToolCall::function("call-2", PERFORM_WEB_SEARCH, "  ");
        assert_eq!(blank.parse_arguments().expect("blank"), json!({}));

        let broken = ToolCall::function("call-3", PERFORM_WEB_SEARCH, "{not json");
        assert!(broken.parse_arguments().is_err());
    }

    #[test]
    fn advertised_tools_are_empty_outside_tool_enabled_mode() {
        let tools = vec![ToolDefinition {
            name: EXECUTE_SHELL_COMMAND.to_string(),
            description: None,
            input_schema: json!({ "type": "object" }),
        }];

        let enabled = ExchangeRequest::new(Vec::new(), ExchangeMode::ToolEnabled)
            .with_tools(tools.clone());
        let search =
            ExchangeRequest::new(Vec::new(), ExchangeMode::WebSearch).with_tools(tools.clone());
        let plain = ExchangeRequest::new(Vec::new(), ExchangeMode::Plain).with_tools(tools);

        assert_eq!(enabled.advertised_tools().len(), 1);
        assert!(!enabled.web_search());
        assert!(search.advertised_tools().is_empty());
        assert!(search.web_search());
        assert!(plain.advertised_tools().is_empty());
    }
}
