//! Install/launch lifecycle: environment provisioning and preflight.
//!
//! The environment marker is a directory under the per-user data dir.
//! Install creates it once and rewrites the runtime assets on every
//! invocation so drift is corrected; run refuses to start without it.

use deskpilot::config::DEFAULT_SYSTEM_PROMPT;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Pinned runtime assets materialized into the environment on every
/// install. Rewritten unconditionally so local edits never drift.
const ASSETS: &[(&str, &str)] = &[
    ("system_prompt.txt", DEFAULT_SYSTEM_PROMPT),
    (
        "settings.seed.json",
        r#"{
  "model": "claude-3-7-sonnet-20250219",
  "max_output_tokens": 4096,
  "thinking_budget": 2048,
  "only_n_most_recent_images": 3
}
"#,
    ),
];

/// Where the lifecycle keeps its state. Rooted at `~/.deskpilot` in
/// production; tests point it at a scratch directory.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn default_user() -> Result<Self, deskpilot::AgentError> {
        Ok(Self {
            root: deskpilot::data_dir()?,
        })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The environment marker directory.
    pub fn env_dir(&self) -> PathBuf {
        self.root.join("env")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.env_dir().join("deskpilot.lock")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

/// Typed lifecycle outcome; exit codes are derived from it rather than
/// scattered through the command handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupOutcome {
    Ok,
    RuntimeMissing { hint: String },
    EnvMissing,
    InstallFailed { reason: String },
}

impl SetupOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            SetupOutcome::Ok => 0,
            _ => 1,
        }
    }
}

#[cfg(target_os = "windows")]
const RUNTIME_CANDIDATES: &[&str] = &["powershell.exe", "pwsh.exe"];
#[cfg(not(target_os = "windows"))]
const RUNTIME_CANDIDATES: &[&str] = &["pwsh", "sh"];

/// Locate the command shell the agent's shell tool will use.
pub fn find_runtime() -> Option<(String, PathBuf)> {
    let path_var = env::var_os("PATH")?;
    for candidate in RUNTIME_CANDIDATES {
        for dir in env::split_paths(&path_var) {
            let full = dir.join(candidate);
            if full.is_file() {
                return Some((candidate.to_string(), full));
            }
        }
    }
    None
}

fn runtime_hint() -> String {
    format!(
        "No command shell found on PATH (looked for {}). Install PowerShell and re-run.",
        RUNTIME_CANDIDATES.join(", ")
    )
}

/// Provision the environment. Idempotent: an existing marker is kept,
/// never recreated; assets are rewritten on every call.
pub fn install(paths: &Paths) -> SetupOutcome {
    if find_runtime().is_none() {
        return SetupOutcome::RuntimeMissing {
            hint: runtime_hint(),
        };
    }
    install_with_runtime(paths)
}

fn install_with_runtime(paths: &Paths) -> SetupOutcome {
    let env_dir = paths.env_dir();
    if env_dir.exists() {
        info!("environment already provisioned at {}", env_dir.display());
    } else if let Err(e) = fs::create_dir_all(&env_dir) {
        return SetupOutcome::InstallFailed {
            reason: format!("could not create {}: {e}", env_dir.display()),
        };
    }

    for (name, contents) in ASSETS {
        let dest = env_dir.join(name);
        if let Err(e) = fs::write(&dest, contents) {
            return SetupOutcome::InstallFailed {
                reason: format!("could not write {}: {e}", dest.display()),
            };
        }
    }
    info!("installed {} runtime assets", ASSETS.len());
    SetupOutcome::Ok
}

/// Launch preflight: the environment must have been provisioned.
pub fn preflight_run(paths: &Paths) -> SetupOutcome {
    if paths.env_dir().is_dir() {
        SetupOutcome::Ok
    } else {
        SetupOutcome::EnvMissing
    }
}

/// Marks the environment active for the lifetime of the UI process.
/// Dropping it removes the lock file, including on Ctrl-C unwind.
pub struct ActivationGuard {
    lock_path: PathBuf,
}

impl ActivationGuard {
    pub fn activate(paths: &Paths) -> std::io::Result<Self> {
        let lock_path = paths.lock_path();
        if let Some(existing) = read_lock(&lock_path) {
            warn!("stale activation lock from pid {existing}, taking over");
        }
        fs::write(&lock_path, std::process::id().to_string())?;
        Ok(Self { lock_path })
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            warn!("could not remove activation lock: {e}");
        }
    }
}

fn read_lock(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_root(dir.path());
        (dir, paths)
    }

    #[test]
    fn install_creates_env_dir_and_assets() {
        let (_dir, paths) = scratch();
        assert_eq!(install_with_runtime(&paths), SetupOutcome::Ok);
        assert!(paths.env_dir().is_dir());
        for (name, contents) in ASSETS {
            let on_disk = fs::read_to_string(paths.env_dir().join(name)).unwrap();
            assert_eq!(&on_disk, contents);
        }
    }

    #[test]
    fn reinstall_keeps_env_dir_but_corrects_asset_drift() {
        let (_dir, paths) = scratch();
        assert_eq!(install_with_runtime(&paths), SetupOutcome::Ok);

        // State inside the env dir must survive a reinstall.
        let sentinel = paths.env_dir().join("operator-data.txt");
        fs::write(&sentinel, "keep me").unwrap();
        // A drifted asset must be rewritten.
        let asset = paths.env_dir().join(ASSETS[0].0);
        fs::write(&asset, "tampered").unwrap();

        assert_eq!(install_with_runtime(&paths), SetupOutcome::Ok);
        assert_eq!(fs::read_to_string(&sentinel).unwrap(), "keep me");
        assert_eq!(fs::read_to_string(&asset).unwrap(), ASSETS[0].1);
    }

    #[test]
    fn install_failure_reports_reason() {
        let (_dir, paths) = scratch();
        // Occupy the env path with a file so directory creation fails.
        fs::write(paths.env_dir(), "not a dir").unwrap();
        match install_with_runtime(&paths) {
            SetupOutcome::InstallFailed { reason } => {
                assert!(reason.contains("env"), "unexpected reason: {reason}");
            }
            other => panic!("expected InstallFailed, got {other:?}"),
        }
    }

    #[test]
    fn run_preflight_requires_env_marker() {
        let (_dir, paths) = scratch();
        assert_eq!(preflight_run(&paths), SetupOutcome::EnvMissing);
        assert_eq!(preflight_run(&paths).exit_code(), 1);

        assert_eq!(install_with_runtime(&paths), SetupOutcome::Ok);
        assert_eq!(preflight_run(&paths), SetupOutcome::Ok);
        assert_eq!(preflight_run(&paths).exit_code(), 0);
    }

    #[test]
    fn activation_guard_writes_and_removes_lock() {
        let (_dir, paths) = scratch();
        assert_eq!(install_with_runtime(&paths), SetupOutcome::Ok);

        let guard = ActivationGuard::activate(&paths).unwrap();
        let pid: u32 = fs::read_to_string(paths.lock_path())
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(pid, std::process::id());

        drop(guard);
        assert!(!paths.lock_path().exists());
    }

    #[test]
    fn stale_lock_is_taken_over() {
        let (_dir, paths) = scratch();
        assert_eq!(install_with_runtime(&paths), SetupOutcome::Ok);
        fs::write(paths.lock_path(), "99999999").unwrap();

        let guard = ActivationGuard::activate(&paths).unwrap();
        let pid: u32 = fs::read_to_string(paths.lock_path())
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(pid, std::process::id());
        drop(guard);
    }
}
