//! tgnotify command-line tool.
//!
//! Validates receiver configuration files, writes a starter file, and sends a
//! test alert through the real Telegram notifier so operators can check a
//! receiver end to end.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tgnotify_core::config::ReceiversFile;
use tgnotify_core::credential::CredentialSource;
use tgnotify_core::models::{Alert, AlertGroup};
use tgnotify_core::notify::TelegramNotifier;
use tgnotify_core::DispatchContext;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// tgnotify command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "tgnotify",
    version,
    about = "Validate and test Telegram alert receivers"
)]
struct Cli {
    /// Path to the receivers TOML file.
    /// Defaults to `<config dir>/tgnotify/receivers.toml`.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the receivers file.
    Validate,

    /// Write a starter receivers file.
    Init {
        /// Output path for the generated file.
        #[arg(short, long, default_value = "./receivers.toml")]
        output: PathBuf,
    },

    /// Send a synthetic firing alert through every Telegram target of a receiver.
    Test {
        /// Receiver name.
        #[arg(short, long)]
        receiver: String,

        /// Seconds to wait for Telegram before giving up.
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    match cli.command {
        Commands::Validate => cmd_validate(&config_path).await,
        Commands::Init { output } => cmd_init(&output),
        Commands::Test { receiver, timeout } => {
            cmd_test(&config_path, &receiver, Duration::from_secs(timeout)).await
        }
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("tgnotify").join("receivers.toml"))
        .unwrap_or_else(|| PathBuf::from("receivers.toml"))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

const STARTER_CONFIG: &str = r#"# tgnotify receiver configuration

[[receivers]]
name = "oncall"

[[receivers.telegram_configs]]
# api_url = "https://api.telegram.org"
chat_id = -1001234567890
# Exactly one of bot_token / bot_token_file. The file is re-read on every send.
bot_token_file = "/run/secrets/telegram_bot_token"
# bot_token = "123456:ABC-DEF"
parse_mode = "HTML"
disable_web_page_preview = false
disable_notifications = false
send_resolved = true
# message_thread_id = 42
# message = "telegram.default.message"
"#;

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, STARTER_CONFIG).context("failed to write receivers file")?;

    println!("Starter configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set chat_id to the target chat");
    println!("  2. Put the bot token in the referenced file (or use bot_token)");
    println!(
        "  3. Validate with: tgnotify validate --config {}",
        output.display()
    );
    println!(
        "  4. Send a test alert: tgnotify test --config {} --receiver oncall",
        output.display()
    );

    Ok(())
}

async fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let file =
        ReceiversFile::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    if let Err(e) = file.validate() {
        println!("  [FAIL] Validation error: {}", e);
        anyhow::bail!("configuration validation failed");
    }
    println!("  [OK] All receivers are valid");

    println!();
    println!("Receivers:");
    for receiver in &file.receivers {
        println!("  {}", receiver.name);
        for config in receiver.telegram_configs()? {
            let token = match &config.bot_token {
                CredentialSource::Inline(_) => "inline".to_string(),
                CredentialSource::File(path) => match config.bot_token.resolve().await {
                    Ok(_) => format!("file {} (readable)", path.display()),
                    Err(e) => format!("file {} (NOT READABLE: {})", path.display(), e),
                },
            };
            println!("    - chat {}", config.chat_id);
            println!("      API URL    : {}", config.api_base());
            println!("      Bot token  : {}", token);
            println!("      Parse mode : {}", config.parse_mode);
            println!("      Template   : {}", config.message);
        }
    }
    println!();
    println!("Configuration is valid.");

    Ok(())
}

async fn cmd_test(config_path: &Path, receiver_name: &str, timeout: Duration) -> Result<()> {
    let file = ReceiversFile::load_and_validate(config_path)
        .context("failed to load receivers file")?;
    let receiver = file
        .receiver(receiver_name)
        .with_context(|| format!("receiver '{}' not found", receiver_name))?;
    let configs = receiver.telegram_configs()?;
    if configs.is_empty() {
        anyhow::bail!("receiver '{}' has no telegram_configs", receiver_name);
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("tgnotify/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    // Ctrl-C aborts any in-flight request.
    let root = DispatchContext::new();
    let shutdown = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let group = test_group(receiver_name);
    let mut failures = 0;
    for config in configs {
        let chat_id = config.chat_id;
        let notifier = TelegramNotifier::with_default_renderer(config, http.clone())?;

        info!(receiver = receiver_name, chat_id, "sending test alert");
        let ctx = root.with_timeout(timeout);
        match notifier.notify(&ctx, &group).await {
            Ok(()) => println!("  [OK] chat {}", chat_id),
            Err(e) => {
                failures += 1;
                println!(
                    "  [FAIL] chat {}: {} (retriable: {})",
                    chat_id,
                    e,
                    if e.retriable() { "yes" } else { "no" }
                );
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of the receiver's targets failed", failures);
    }
    Ok(())
}

fn test_group(receiver: &str) -> AlertGroup {
    let alert = Alert::firing("TgnotifyTestAlert")
        .with_label("severity", "info")
        .with_annotation(
            "summary",
            "Test notification sent by tgnotify. No action needed.",
        );
    AlertGroup::new(receiver, vec![alert]).with_group_label("alertname", "TgnotifyTestAlert")
}
