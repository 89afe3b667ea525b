use thiserror::Error;

/// Errors surfaced by the agent core.
///
/// Tool-level faults are deliberately *not* represented here: a failing
/// PowerShell command or a bad coordinate is data the model needs to see
/// (carried inside [`crate::tools::ToolResult`]), not a process failure.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("No API key configured. Enter one in the web UI or set ANTHROPIC_API_KEY.")]
    MissingApiKey,

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config at {path}: {source}")]
    ConfigWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config at {path} is not valid JSON: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not determine the user home directory")]
    NoHomeDir,

    #[error("Screenshot capture failed: {0}")]
    Screenshot(String),

    #[error("Agent API request failed: {0}")]
    ApiTransport(#[from] reqwest::Error),

    #[error("Agent API returned {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("Unexpected agent API response: {0}")]
    ApiResponse(String),

    #[error("Input injection is not supported on this platform")]
    PlatformUnsupported,

    #[error("Input injection failed: {0}")]
    Input(String),
}
