//! OpenAI-compatible chat-completions client.
//!
//! Local servers (Ollama, LM Studio, vLLM) expose this protocol under `/v1` and
//! accept any non-empty bearer token.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;
use triage_core::config::BackendConfig;

use crate::llm::{BackendError, ChatBackend, ChatRequest, ChatResponse, ToolCall};

pub struct OpenAiCompatClient {
    base_url: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self { base_url: base_url.into(), api_key, client: reqwest::Client::new() }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { base_url: config.base_url.clone(), api_key: config.api_key.clone(), client })
    }

    pub(crate) fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, BackendError> {
        let url = self.chat_url();
        let body = to_api_request(&request);

        debug!(
            event_name = "agent.backend.request",
            url = %url,
            model = %request.model,
            tools = request.tools.len(),
            "sending chat completion"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status { status: status.as_u16(), body: response_text });
        }

        let json: Value = serde_json::from_str(&response_text)
            .map_err(|error| BackendError::MalformedResponse(format!("invalid JSON: {error}")))?;
        from_api_response(&json)
    }
}

pub(crate) fn to_api_request(request: &ChatRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages,
    });

    if !request.tools.is_empty() {
        let tools = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": {
                            "type": "object",
                            "properties": {},
                            "additionalProperties": false
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        body["tools"] = Value::Array(tools);
    }

    if let Some(schema) = &request.output_schema {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "schema": schema.schema,
                "strict": true
            }
        });
    }

    body
}

pub(crate) fn from_api_response(body: &Value) -> Result<ChatResponse, BackendError> {
    let message = body["choices"]
        .get(0)
        .map(|choice| &choice["message"])
        .filter(|message| message.is_object())
        .ok_or_else(|| BackendError::MalformedResponse("missing choices[0].message".into()))?;

    let content = message["content"].as_str().map(str::to_string);

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let name = call["function"]["name"].as_str().ok_or_else(|| {
                BackendError::MalformedResponse("tool call without function name".into())
            })?;
            // Some servers send arguments as an object instead of a JSON string.
            let arguments = match &call["function"]["arguments"] {
                Value::String(raw) => raw.clone(),
                Value::Null => "{}".to_string(),
                other => other.to_string(),
            };
            tool_calls.push(ToolCall {
                id: call["id"].as_str().unwrap_or_default().to_string(),
                name: name.to_string(),
                arguments,
            });
        }
    }

    Ok(ChatResponse { content, tool_calls })
}
