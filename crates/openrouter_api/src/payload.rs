use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Plugin identifier that turns on OpenRouter web-search augmentation.
pub const WEB_PLUGIN_ID: &str = "web";

/// Canonical request payload for the chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Value>,
    /// Always false; responses are read as one JSON document.
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            tools: Vec::new(),
            tool_choice: None,
            plugins: Vec::new(),
            attachments: Vec::new(),
            temperature: None,
        }
    }

    /// Advertises function tools; the model decides whether to call them.
    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tool_choice = if tools.is_empty() {
            None
        } else {
            Some("auto".to_owned())
        };
        self.tools = tools;
        self
    }

    /// Requests live web results folded into the answer as citations.
    pub fn with_web_search(mut self) -> Self {
        self.plugins = vec![json!({ "id": WEB_PLUGIN_ID })];
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Value>) -> Self {
        self.attachments = attachments;
        self
    }

    #[must_use]
    pub fn web_search_enabled(&self) -> bool {
        self.plugins
            .iter()
            .any(|plugin| plugin.get("id").and_then(Value::as_str) == Some(WEB_PLUGIN_ID))
    }
}

/// Builds a function-tool envelope in chat-completions shape.
pub fn function_tool(name: &str, description: Option<&str>, parameters: Value) -> Value {
    let mut function = json!({
        "name": name,
        "parameters": parameters,
    });
    if let Some(description) = description {
        function["description"] = Value::String(description.to_owned());
    }

    json!({
        "type": "function",
        "function": function,
    })
}
