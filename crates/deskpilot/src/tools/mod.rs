//! Tools the remote model can call: computer control, shell, and a file
//! editor.
//!
//! Tool failures are data: they come back as a `ToolResult` with the
//! `error` field set and are relayed to the model as an error
//! `tool_result` block, never as a process-level failure.

use async_trait::async_trait;
use serde_json::{json, Value};

mod computer;
mod editor;
mod shell;

pub use computer::ComputerTool;
pub use editor::EditorTool;
pub use shell::ShellTool;

/// Result of a single tool invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResult {
    /// Text output for the model.
    pub output: Option<String>,
    /// Error message; marks the result as failed.
    pub error: Option<String>,
    /// Base64 PNG screenshot, if the action produced one.
    pub base64_image: Option<String>,
    /// Out-of-band note folded into the content as `<system>...</system>`.
    pub system: Option<String>,
}

impl ToolResult {
    pub fn output(text: impl Into<String>) -> Self {
        Self {
            output: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn system(note: impl Into<String>) -> Self {
        Self {
            system: Some(note.into()),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, base64_image: impl Into<String>) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Convert into an Anthropic `tool_result` content block.
    pub fn into_block(self, tool_use_id: &str) -> Value {
        if let Some(error) = &self.error {
            let mut text = error.clone();
            if let Some(system) = &self.system {
                text = format!("<system>{system}</system>\n{text}");
            }
            return json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": text,
                "is_error": true,
            });
        }

        let mut content = Vec::new();
        let text = match (&self.output, &self.system) {
            (Some(output), Some(system)) => Some(format!("<system>{system}</system>\n{output}")),
            (Some(output), None) => Some(output.clone()),
            (None, Some(system)) => Some(format!("<system>{system}</system>")),
            (None, None) => None,
        };
        if let Some(text) = text {
            content.push(json!({ "type": "text", "text": text }));
        }
        if let Some(image) = &self.base64_image {
            content.push(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": "image/png",
                    "data": image,
                },
            }));
        }
        json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": false,
        })
    }
}

/// A tool exposed to the remote model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls this tool by.
    fn name(&self) -> &'static str;

    /// Tool parameter object for the API `tools` array.
    fn api_params(&self) -> Value;

    /// Execute with the model-supplied JSON input.
    async fn call(&self, input: Value) -> ToolResult;
}
