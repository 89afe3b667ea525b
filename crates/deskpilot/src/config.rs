//! Persisted agent configuration, including the API credential record.
//!
//! The config lives in a single JSON file under the per-user data
//! directory. It is created with defaults on first load and rewritten
//! with owner-only permissions on every save so the API key is never
//! readable by other accounts.

use crate::AgentError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default system prompt sent with every conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "<SYSTEM_CAPABILITY>
* You are controlling a Windows computer.
* You can use mouse and keyboard actions to interact with the UI.
* You can take screenshots to see what's on screen.
* You can run PowerShell commands to perform system operations.
* When viewing a page it's helpful to zoom out so you can see everything on the page.
* When using your computer function calls, they take a while to run and send back to you.
</SYSTEM_CAPABILITY>

<IMPORTANT>
* When navigating complex interfaces, take screenshots frequently to check your progress.
* If a task requires accessing sensitive information, ask for user confirmation first.
* Break complex tasks into simple steps and verify each step.
</IMPORTANT>";

pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;
pub const DEFAULT_THINKING_BUDGET: u32 = 2048;
/// How many recent screenshots to keep in the conversation history.
pub const DEFAULT_RECENT_IMAGES: usize = 3;

/// Per-user agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// API key for the remote agent API. Empty until the operator enters one.
    pub api_key: String,
    pub model: String,
    pub max_output_tokens: u32,
    /// Extended-thinking token budget. Zero disables thinking.
    pub thinking_budget: u32,
    pub system_prompt: String,
    pub only_n_most_recent_images: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            thinking_budget: DEFAULT_THINKING_BUDGET,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            only_n_most_recent_images: DEFAULT_RECENT_IMAGES,
        }
    }
}

impl AgentConfig {
    /// Load the config from `path`, creating it with defaults if absent.
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }
        let raw = fs::read_to_string(path).map_err(|source| AgentError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| AgentError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Write the config to `path` with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<(), AgentError> {
        let write_err = |source: std::io::Error| AgentError::ConfigWrite {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let raw = serde_json::to_string_pretty(self).expect("config serializes");
        fs::write(path, raw).map_err(write_err)?;
        restrict_to_owner(path).map_err(write_err)?;
        Ok(())
    }

    /// The API key to use, falling back to `ANTHROPIC_API_KEY` when the
    /// config holds none. Returns an error if neither source has a key.
    pub fn resolve_api_key(&self) -> Result<String, AgentError> {
        if !self.api_key.is_empty() {
            return Ok(self.api_key.clone());
        }
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(AgentError::MissingApiKey),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.resolve_api_key().is_ok()
    }
}

/// Restrict a file to owner read/write. On non-unix hosts the file
/// inherits the user-profile ACLs, which already exclude other accounts.
#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Per-user data directory (`~/.deskpilot`).
pub fn data_dir() -> Result<PathBuf, AgentError> {
    dirs::home_dir()
        .map(|home| home.join(".deskpilot"))
        .ok_or(AgentError::NoHomeDir)
}

/// Default location of the credential record.
pub fn default_config_path() -> Result<PathBuf, AgentError> {
    Ok(data_dir()?.join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_creates_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config, AgentConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AgentConfig::default();
        config.api_key = "sk-test".into();
        config.thinking_budget = 0;
        config.save(&path).unwrap();
        let loaded = AgentConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn unknown_fields_are_ignored_and_missing_fields_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_key":"sk-x","legacy_field":true}"#).unwrap();
        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.api_key, "sk-x");
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[cfg(unix)]
    #[test]
    fn saved_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        AgentConfig::default().save(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = AgentConfig::load(&path).unwrap_err();
        assert!(matches!(err, AgentError::ConfigParse { .. }));
    }
}
