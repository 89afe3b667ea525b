//! Deskpilot CLI
//!
//! Installer and launcher for the deskpilot agent:
//!   deskpilot install   # provision the environment
//!   deskpilot run       # start the local web UI
//!   deskpilot status    # show preflight state without changing it

use clap::Parser;
use colored::*;
use std::fs;
use std::io::{BufRead, IsTerminal, Write};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod setup;

use cli::{Cli, Commands};
use setup::{ActivationGuard, Paths, SetupOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let paths = match Paths::default_user() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("{} {e}", "✗".red());
            return ExitCode::from(1);
        }
    };
    let _log_guard = init_tracing(&paths);

    let code = match cli.command {
        Commands::Install => cmd_install(&paths),
        Commands::Run { port } => cmd_run(&paths, port).await,
        Commands::Status => cmd_status(&paths),
    };

    if code != 0 && !cli.no_pause {
        pause();
    }
    ExitCode::from(code)
}

fn cmd_install(paths: &Paths) -> u8 {
    println!("{}", "Provisioning deskpilot environment...".bold());
    let outcome = setup::install(paths);
    match &outcome {
        SetupOutcome::Ok => {
            println!(
                "  {} Environment ready at {}",
                "✓".green(),
                paths.env_dir().display().to_string().cyan()
            );
            println!("  Next: {}", "deskpilot run".cyan());
        }
        other => print_failure(other),
    }
    outcome.exit_code()
}

async fn cmd_run(paths: &Paths, port: u16) -> u8 {
    match setup::preflight_run(paths) {
        SetupOutcome::Ok => {}
        outcome => {
            print_failure(&outcome);
            return outcome.exit_code();
        }
    }

    // Keeps the lock file alive exactly as long as the UI process runs.
    let _guard = match ActivationGuard::activate(paths) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} Could not activate environment: {e}", "✗".red());
            return 1;
        }
    };

    println!(
        "{} deskpilot UI on {}  (Ctrl-C to stop)",
        "→".cyan(),
        format!("http://127.0.0.1:{port}").cyan()
    );
    if let Err(e) = deskpilot_server::serve(port).await {
        eprintln!("{} {e:#}", "✗".red());
        return 1;
    }
    println!("{} Shut down cleanly", "✓".green());
    0
}

fn cmd_status(paths: &Paths) -> u8 {
    println!("{}", "Deskpilot status".bold());

    match setup::find_runtime() {
        Some((name, path)) => {
            println!("  {} runtime: {} ({})", "✓".green(), name, path.display());
        }
        None => println!("  {} runtime: not found on PATH", "✗".red()),
    }

    if paths.env_dir().is_dir() {
        println!(
            "  {} environment: {}",
            "✓".green(),
            paths.env_dir().display()
        );
    } else {
        println!(
            "  {} environment: not provisioned (run {})",
            "✗".red(),
            "deskpilot install".cyan()
        );
    }

    let config_path = paths.config_path();
    if config_path.is_file() {
        match deskpilot::AgentConfig::load(&config_path) {
            Ok(config) if config.has_api_key() => {
                println!("  {} credential: configured", "✓".green());
            }
            Ok(_) => println!("  {} credential: no API key stored", "✗".yellow()),
            Err(e) => println!("  {} credential: unreadable ({e})", "✗".red()),
        }
    } else {
        println!("  {} credential: not created yet", "✗".yellow());
    }
    0
}

fn print_failure(outcome: &SetupOutcome) {
    match outcome {
        SetupOutcome::Ok => {}
        SetupOutcome::RuntimeMissing { hint } => {
            eprintln!("  {} {hint}", "✗".red());
        }
        SetupOutcome::EnvMissing => {
            eprintln!(
                "  {} No environment found. Run {} first.",
                "✗".red(),
                "deskpilot install".cyan()
            );
        }
        SetupOutcome::InstallFailed { reason } => {
            eprintln!("  {} Install failed: {reason}", "✗".red());
        }
    }
}

/// Keep the console open so double-click users can read the message.
fn pause() {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return;
    }
    print!("Press Enter to exit...");
    let _ = std::io::stdout().flush();
    let _ = stdin.lock().read_line(&mut String::new());
}

/// Console logging plus a file log under the data dir when writable.
fn init_tracing(paths: &Paths) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let console = tracing_subscriber::fmt::layer().with_target(false);

    if fs::create_dir_all(paths.log_dir()).is_ok() {
        let appender = tracing_appender::rolling::never(paths.log_dir(), "agent.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .with(file)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .init();
        None
    }
}
