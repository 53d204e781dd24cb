//! ThreadFix Publisher CLI
//!
//! Uploads security scan results to a ThreadFix server through tfcli

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use threadfix_publisher::security::cancel_pair;
use threadfix_publisher::{
    BuildStep, ConfigError, ConfigurationForm, ConfigurationStore, FieldCheck, ProcessUploader,
    ScanPublisher, TokenMasker,
};
use tracing_subscriber::EnvFilter;

/// Exit code used when the run is interrupted
const EXIT_CANCELLED: i32 = 130;

/// Upload security scan results to ThreadFix
#[derive(Parser)]
#[command(name = "threadfix-publisher")]
#[command(version = "0.1.0")]
#[command(about = "Upload security scan results to a ThreadFix server", long_about = None)]
struct Cli {
    /// Settings file (defaults to ~/.threadfix-publisher.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate settings and upload a scan file
    Publish {
        /// Numeric ThreadFix application id
        #[arg(long)]
        app_id: String,

        /// Scan file to upload
        #[arg(long)]
        scan_file: String,

        /// Kill the uploader after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Validate and save global settings
    Configure {
        /// Path of the tfcli jar or executable
        #[arg(long)]
        tfcli: String,

        /// ThreadFix server url
        #[arg(long)]
        url: String,

        /// ThreadFix api key
        #[arg(long)]
        token: String,
    },

    /// Check a single settings value without saving it
    Check {
        /// Field to check (tfcli, url, token)
        field: String,

        /// Value to check
        value: String,
    },

    /// Display the settings in effect
    ShowConfig {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => ConfigurationStore::default_path()?,
    };

    match cli.command {
        Commands::Publish {
            app_id,
            scan_file,
            timeout,
        } => publish_command(config_path, app_id, scan_file, timeout).await,
        Commands::Configure { tfcli, url, token } => {
            configure_command(config_path, ConfigurationForm { tfcli, url, token }).await
        }
        Commands::Check { field, value } => Ok(check_command(&field, &value)),
        Commands::ShowConfig { json } => show_config_command(config_path, json).await,
    }
}

async fn open_store(config_path: PathBuf) -> Result<ConfigurationStore> {
    let env: HashMap<String, String> = std::env::vars().collect();
    ConfigurationStore::open(&config_path, env)
        .await
        .with_context(|| format!("failed to load settings from {}", config_path.display()))
}

async fn publish_command(
    config_path: PathBuf,
    app_id: String,
    scan_file: String,
    timeout: Option<u64>,
) -> Result<i32> {
    println!("\n🛡️  threadfix-publisher\n");

    let store = open_store(config_path).await?;

    let (trigger, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let config = store.current();
    let mut uploader = ProcessUploader::new(config.uploader.clone()).with_cancel_signal(signal);
    if let Some(secs) = timeout {
        uploader.set_timeout(Duration::from_secs(secs));
    }

    let publisher = ScanPublisher::new(uploader);
    let step = BuildStep::new(app_id, scan_file);

    match step.perform_with(&publisher, &config).await {
        Ok(_) => {
            println!("\n✅ Scan uploaded successfully!");
            Ok(0)
        }
        Err(abort) if abort.is_cancelled() => {
            eprintln!("\n⚠️  Upload cancelled");
            Ok(EXIT_CANCELLED)
        }
        Err(abort) => {
            eprintln!("\n❌ Publishing failed: {}", abort);
            Ok(1)
        }
    }
}

async fn configure_command(config_path: PathBuf, form: ConfigurationForm) -> Result<i32> {
    println!("\n⚙️  Configure threadfix-publisher\n");

    let store = open_store(config_path).await?;

    match store.update(form).await {
        Ok(()) => {
            println!("✅ Settings saved to {}", store.path().display());
            Ok(0)
        }
        Err(ConfigError::InvalidField { key, message }) => {
            eprintln!("❌ [{}] {}", key, message);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

fn check_command(field: &str, value: &str) -> i32 {
    match ConfigurationStore::check_field(field, value) {
        FieldCheck::Ok => {
            println!("✅ {} is valid", field);
            0
        }
        FieldCheck::Error(message) => {
            println!("❌ {}", message);
            1
        }
    }
}

async fn show_config_command(config_path: PathBuf, json: bool) -> Result<i32> {
    let store = open_store(config_path).await?;
    let config = store.current();
    let masked_token = TokenMasker::mask_token(config.api_token.expose_secret());

    if json {
        let value = serde_json::json!({
            "path": store.path().display().to_string(),
            "tfcli": config.uploader_path,
            "url": config.server_url,
            "token": masked_token,
            "uploader": {
                "javaCommand": config.uploader.java_command,
                "timeoutSecs": config.uploader.timeout_secs,
                "acceptNonZeroExit": config.uploader.accept_nonzero_exit,
            },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(0);
    }

    println!("\n📋 Settings ({})\n", store.path().display());
    for (key, value, shown) in [
        ("tfcli", config.uploader_path.as_str(), config.uploader_path.as_str()),
        ("url", config.server_url.as_str(), config.server_url.as_str()),
        ("token", config.api_token.expose_secret(), masked_token.as_str()),
    ] {
        let status = match ConfigurationStore::check_field(key, value) {
            FieldCheck::Ok => "✅",
            FieldCheck::Error(_) => "❌",
        };
        println!("  {} {}: {}", status, key, shown);
    }
    println!("  java: {}", config.uploader.java_command);
    match config.uploader.timeout_secs {
        Some(secs) => println!("  timeout: {}s", secs),
        None => println!("  timeout: none"),
    }
    println!(
        "  accept non-zero exit: {}",
        config.uploader.accept_nonzero_exit
    );

    Ok(0)
}
