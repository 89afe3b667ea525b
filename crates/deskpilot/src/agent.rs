//! The agent sampling loop.
//!
//! Sends the conversation (text + screenshots) to the remote
//! vision-capable model, executes the tool calls it returns, and loops
//! until the model stops requesting tools or the step cap is reached.

use crate::config::AgentConfig;
use crate::screenshot::{TARGET_HEIGHT, TARGET_WIDTH};
use crate::tools::{ComputerTool, EditorTool, ShellTool, Tool, ToolResult};
use crate::AgentError;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const COMPUTER_USE_BETA: &str = "computer-use-2025-01-24";
/// Cap on model/tool round trips within a single operator turn.
const MAX_TOOL_ITERATIONS: u32 = 50;

/// Something that happened during a turn, surfaced to the UI as it occurs.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Text(String),
    Thinking(String),
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        id: String,
        result: ToolResult,
    },
}

pub struct Agent {
    config: AgentConfig,
    api_key: String,
    api_url: String,
    client: reqwest::Client,
    tools: Vec<Box<dyn Tool>>,
    messages: Vec<Value>,
}

impl Agent {
    /// Build an agent from config. Fails only when no API key can be
    /// resolved; a headless host degrades to a virtual display size so
    /// the non-computer tools stay usable.
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        let api_key = config.resolve_api_key()?;
        let api_url = env::var("DESKPILOT_AGENT_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let computer = match ComputerTool::new() {
            Ok(tool) => tool,
            Err(e) => {
                warn!("falling back to virtual display size: {e}");
                ComputerTool::with_display(TARGET_WIDTH, TARGET_HEIGHT)
            }
        };
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(computer),
            Box::new(ShellTool::new()),
            Box::new(EditorTool::new()),
        ];

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            config,
            api_key,
            api_url,
            client,
            tools,
            messages: Vec::new(),
        })
    }

    /// Full message history (for transcript rendering).
    pub fn messages(&self) -> &[Value] {
        &self.messages
    }

    /// Drop the conversation history.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Run one operator turn: send `user_message`, then keep executing
    /// tool calls and re-sampling until the model answers without tools.
    pub async fn run_turn(
        &mut self,
        user_message: &str,
        mut on_event: impl FnMut(&AgentEvent),
    ) -> Result<(), AgentError> {
        self.messages.push(json!({
            "role": "user",
            "content": [{ "type": "text", "text": user_message }],
        }));

        for iteration in 1..=MAX_TOOL_ITERATIONS {
            debug!(iteration, "sampling");
            filter_recent_screenshots(
                &mut self.messages,
                self.config.only_n_most_recent_images,
            );

            let tool_params: Vec<Value> = self.tools.iter().map(|t| t.api_params()).collect();
            let body = build_request(&self.config, &tool_params, &self.messages);
            let response = self.send(&body).await?;

            let assistant_content = response_to_params(&response)?;
            self.messages.push(json!({
                "role": "assistant",
                "content": assistant_content.clone(),
            }));

            let mut tool_results: Vec<Value> = Vec::new();
            for block in &assistant_content {
                match block.get("type").and_then(|v| v.as_str()) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(|v| v.as_str()) {
                            on_event(&AgentEvent::Text(text.to_string()));
                        }
                    }
                    Some("thinking") => {
                        if let Some(text) = block.get("thinking").and_then(|v| v.as_str()) {
                            on_event(&AgentEvent::Thinking(text.to_string()));
                        }
                    }
                    Some("tool_use") => {
                        let id = block
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let name = block
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let input = block.get("input").cloned().unwrap_or(json!({}));
                        on_event(&AgentEvent::ToolUse {
                            id: id.clone(),
                            name: name.clone(),
                            input: input.clone(),
                        });

                        let result = self.run_tool(&name, input).await;
                        on_event(&AgentEvent::ToolResult {
                            id: id.clone(),
                            result: result.clone(),
                        });
                        tool_results.push(result.into_block(&id));
                    }
                    _ => {}
                }
            }

            if tool_results.is_empty() {
                return Ok(());
            }
            self.messages.push(json!({
                "role": "user",
                "content": tool_results,
            }));
        }

        warn!("turn stopped after {MAX_TOOL_ITERATIONS} tool iterations");
        Ok(())
    }

    async fn run_tool(&self, name: &str, input: Value) -> ToolResult {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            return ToolResult::error(format!("Tool {name} not found"));
        };
        info!(tool = name, "executing tool");
        tool.call(input).await
    }

    async fn send(&self, body: &Value) -> Result<Value, AgentError> {
        let resp = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("anthropic-beta", COMPUTER_USE_BETA)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("agent API error: {status} - {body}");
            return Err(AgentError::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }
        let raw = resp.text().await?;
        serde_json::from_str(&raw)
            .map_err(|e| AgentError::ApiResponse(format!("invalid JSON: {e}")))
    }
}

/// Build the Messages API request body.
///
/// Extended thinking forces temperature to 1 per the API contract;
/// otherwise sampling is deterministic (temperature 0).
fn build_request(config: &AgentConfig, tool_params: &[Value], messages: &[Value]) -> Value {
    let mut body = json!({
        "model": config.model,
        "max_tokens": config.max_output_tokens,
        "messages": messages,
        "system": [{ "type": "text", "text": config.system_prompt }],
        "tools": tool_params,
        "temperature": 0,
    });
    if config.thinking_budget > 0 {
        body["thinking"] = json!({
            "type": "enabled",
            "budget_tokens": config.thinking_budget,
        });
        body["temperature"] = json!(1);
    }
    body
}

/// Convert API response content into history-ready content blocks,
/// dropping empty text and unknown block noise but preserving thinking
/// signatures and tool_use blocks verbatim.
fn response_to_params(response: &Value) -> Result<Vec<Value>, AgentError> {
    let content = response
        .get("content")
        .and_then(|v| v.as_array())
        .ok_or_else(|| AgentError::ApiResponse("response has no content array".into()))?;

    let mut params = Vec::new();
    for block in content {
        match block.get("type").and_then(|v| v.as_str()) {
            Some("text") => {
                if block
                    .get("text")
                    .and_then(|v| v.as_str())
                    .is_some_and(|t| !t.is_empty())
                {
                    params.push(json!({
                        "type": "text",
                        "text": block["text"],
                    }));
                }
            }
            // Keep thinking, redacted_thinking, and tool_use blocks
            // exactly as received; the API validates them on replay.
            Some(_) => params.push(block.clone()),
            None => {}
        }
    }
    Ok(params)
}

/// Text part left behind when a tool result loses its screenshot.
const PRUNED_IMAGE_NOTE: &str = "(older screenshot omitted)";

/// Keep only the `keep` most recent image blocks across the history,
/// dropping older screenshots to bound request size.
///
/// Only the image parts themselves are removed: a `tool_result` block
/// stays in place (with a placeholder text part if pruning would leave
/// it empty) so every `tool_use` keeps its paired result.
pub fn filter_recent_screenshots(messages: &mut [Value], keep: usize) {
    if keep == 0 {
        return;
    }
    let total = count_images(messages);
    if total <= keep {
        return;
    }
    let mut to_drop = total - keep;

    // Oldest first: walk messages in order and prune until the budget
    // is met, leaving the most recent screenshots untouched.
    for message in messages.iter_mut() {
        if to_drop == 0 {
            break;
        }
        let Some(content) = message.get_mut("content").and_then(|v| v.as_array_mut()) else {
            continue;
        };
        let mut bi = 0;
        while bi < content.len() && to_drop > 0 {
            match content[bi].get("type").and_then(|v| v.as_str()) {
                Some("image") => {
                    content.remove(bi);
                    to_drop -= 1;
                }
                Some("tool_result") => {
                    if let Some(parts) =
                        content[bi].get_mut("content").and_then(|v| v.as_array_mut())
                    {
                        let mut pi = 0;
                        while pi < parts.len() && to_drop > 0 {
                            if parts[pi].get("type").and_then(|v| v.as_str()) == Some("image") {
                                parts.remove(pi);
                                to_drop -= 1;
                            } else {
                                pi += 1;
                            }
                        }
                        if parts.is_empty() {
                            parts.push(json!({ "type": "text", "text": PRUNED_IMAGE_NOTE }));
                        }
                    }
                    bi += 1;
                }
                _ => bi += 1,
            }
        }
    }
}

/// Count bare image blocks plus images nested in tool results.
fn count_images(messages: &[Value]) -> usize {
    let mut count = 0;
    for message in messages {
        let Some(content) = message.get("content").and_then(|v| v.as_array()) else {
            continue;
        };
        for block in content {
            match block.get("type").and_then(|v| v.as_str()) {
                Some("image") => count += 1,
                Some("tool_result") => {
                    if let Some(parts) = block.get("content").and_then(|v| v.as_array()) {
                        count += parts
                            .iter()
                            .filter(|p| p.get("type").and_then(|v| v.as_str()) == Some("image"))
                            .count();
                    }
                }
                _ => {}
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_message() -> Value {
        json!({
            "role": "user",
            "content": [{
                "type": "image",
                "source": { "type": "base64", "media_type": "image/png", "data": "AA==" },
            }],
        })
    }

    #[test]
    fn request_without_thinking_is_deterministic() {
        let mut config = AgentConfig::default();
        config.thinking_budget = 0;
        let body = build_request(&config, &[], &[]);
        assert_eq!(body["temperature"], 0);
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn request_with_thinking_forces_temperature_one() {
        let config = AgentConfig::default();
        let body = build_request(&config, &[], &[]);
        assert_eq!(body["temperature"], 1);
        assert_eq!(body["thinking"]["type"], "enabled");
        assert_eq!(body["thinking"]["budget_tokens"], 2048);
    }

    #[test]
    fn request_carries_system_and_tools() {
        let config = AgentConfig::default();
        let tools = vec![json!({"type": "bash_20250124", "name": "bash"})];
        let body = build_request(&config, &tools, &[]);
        assert_eq!(body["system"][0]["text"], config.system_prompt);
        assert_eq!(body["tools"][0]["name"], "bash");
        assert_eq!(body["model"], config.model);
    }

    #[test]
    fn response_parsing_drops_empty_text_keeps_tool_use() {
        let response = json!({
            "content": [
                { "type": "text", "text": "" },
                { "type": "text", "text": "hello" },
                { "type": "tool_use", "id": "t1", "name": "bash", "input": {"command": "dir"} },
                { "type": "thinking", "thinking": "hmm", "signature": "sig" },
            ],
        });
        let params = response_to_params(&response).unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0]["text"], "hello");
        assert_eq!(params[1]["type"], "tool_use");
        assert_eq!(params[2]["signature"], "sig");
    }

    #[test]
    fn response_without_content_is_an_error() {
        let err = response_to_params(&json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, AgentError::ApiResponse(_)));
    }

    #[test]
    fn screenshot_filter_keeps_most_recent() {
        let mut messages: Vec<Value> = (0..5).map(|_| image_message()).collect();
        filter_recent_screenshots(&mut messages, 3);
        let remaining: Vec<usize> = messages
            .iter()
            .map(|m| m["content"].as_array().unwrap().len())
            .collect();
        assert_eq!(remaining, vec![0, 0, 1, 1, 1]);
    }

    fn tool_round_trip(id: &str) -> [Value; 2] {
        [
            json!({
                "role": "assistant",
                "content": [{
                    "type": "tool_use",
                    "id": id,
                    "name": "computer",
                    "input": { "action": "screenshot" },
                }],
            }),
            json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": id,
                    "content": [
                        { "type": "text", "text": "Mouse moved to 10, 10" },
                        { "type": "image", "source": { "type": "base64", "media_type": "image/png", "data": "AA==" } },
                    ],
                    "is_error": false,
                }],
            }),
        ]
    }

    #[test]
    fn screenshot_filter_prunes_inside_tool_results() {
        let mut messages: Vec<Value> = [tool_round_trip("t0"), tool_round_trip("t1")]
            .into_iter()
            .flatten()
            .collect();
        messages.push(image_message());
        filter_recent_screenshots(&mut messages, 2);

        // The oldest nested image is gone, but its tool_result stays in
        // place with the text part intact.
        let pruned = &messages[1]["content"][0];
        assert_eq!(pruned["type"], "tool_result");
        assert_eq!(pruned["tool_use_id"], "t0");
        let parts = pruned["content"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["type"], "text");
        // The newer screenshots are untouched.
        assert_eq!(messages[3]["content"][0]["content"][1]["type"], "image");
        assert_eq!(messages[4]["content"][0]["type"], "image");
    }

    #[test]
    fn screenshot_filter_never_orphans_tool_use_blocks() {
        let mut messages: Vec<Value> = (0..4)
            .flat_map(|i| tool_round_trip(&format!("toolu_{i}")))
            .collect();
        // Strip the text parts so pruning would otherwise empty a result.
        for message in &mut messages {
            if let Some(parts) = message["content"][0]
                .get_mut("content")
                .and_then(|v| v.as_array_mut())
            {
                parts.retain(|p| p["type"] == "image");
            }
        }
        filter_recent_screenshots(&mut messages, 3);

        let mut use_ids = Vec::new();
        let mut result_ids = Vec::new();
        for message in &messages {
            let content = message["content"].as_array().unwrap();
            assert!(!content.is_empty(), "pruning left an empty content array");
            for block in content {
                match block["type"].as_str().unwrap() {
                    "tool_use" => use_ids.push(block["id"].clone()),
                    "tool_result" => {
                        assert!(!block["content"].as_array().unwrap().is_empty());
                        result_ids.push(block["tool_use_id"].clone());
                    }
                    _ => {}
                }
            }
        }
        // Every tool_use still has its paired tool_result, in order.
        assert_eq!(use_ids, result_ids);
        assert_eq!(count_images(&messages), 3);
    }

    #[test]
    fn screenshot_filter_is_noop_under_limit() {
        let mut messages = vec![image_message()];
        let before = messages.clone();
        filter_recent_screenshots(&mut messages, 3);
        assert_eq!(messages, before);
    }

    #[test]
    fn zero_keep_disables_filtering() {
        let mut messages: Vec<Value> = (0..5).map(|_| image_message()).collect();
        filter_recent_screenshots(&mut messages, 0);
        assert!(messages
            .iter()
            .all(|m| m["content"].as_array().unwrap().len() == 1));
    }
}
