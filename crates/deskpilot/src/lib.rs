//! Deskpilot core: an AI computer-control agent for Windows desktops.
//!
//! The agent captures screenshots, sends them with the conversation to a
//! remote vision-capable model, and executes the mouse, keyboard, shell,
//! and file-edit actions the model requests.

pub mod agent;
pub mod config;
pub mod coords;
pub mod errors;
pub mod keys;
pub mod platforms;
pub mod screenshot;
pub mod tools;

pub use agent::{Agent, AgentEvent};
pub use config::{default_config_path, data_dir, AgentConfig};
pub use errors::AgentError;
pub use tools::{Tool, ToolResult};
