// Oadin client - command-line front end
// Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use oadin_client::config::{load_config, ClientConfig};
use oadin_client::daemon::DaemonInstaller;
use oadin_client::errors::{self, ErrorKind, OadinError};
use oadin_client::{OadinClient, StreamEvent, StreamSummary};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "oadin-client")]
#[command(about = "Client for the local Oadin inference daemon", version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// API version prefix (overrides config), e.g. oadin/v0.2
    #[arg(long = "api-version", global = true)]
    api_version: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show whether the daemon is installed and reachable
    Status,
    /// Download the daemon and add it to PATH
    Download,
    /// Start the daemon service
    Start,
    /// Manage services
    Services {
        #[command(subcommand)]
        action: ServiceAction,
    },
    /// Manage models
    Models {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Manage service providers
    Providers {
        #[command(subcommand)]
        action: ProviderAction,
    },
    /// Chat completion; BODY is JSON or @file
    Chat {
        body: String,
        #[arg(long)]
        stream: bool,
    },
    /// Text generation; BODY is JSON or @file
    Generate {
        body: String,
        #[arg(long)]
        stream: bool,
    },
    /// Embeddings; BODY is JSON or @file
    Embed { body: String },
    /// Text to image; BODY is JSON or @file
    TextToImage { body: String },
    /// Export or import daemon configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ServiceAction {
    List,
    Install { body: String },
    Update { body: String },
}

#[derive(Subcommand, Debug)]
enum ModelAction {
    List,
    Install {
        body: String,
        /// Follow install progress
        #[arg(long)]
        stream: bool,
    },
    Cancel { body: String },
    Delete { body: String },
    Available,
    Recommended,
    Supported,
    /// Smartvision supported models
    Smartvision {
        #[arg(long = "env-type")]
        env_type: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ProviderAction {
    List,
    Add { body: String },
    Update { body: String },
    Delete { body: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write the daemon config to ~/Oadin/.oadin
    Export { body: Option<String> },
    /// Send a JSON config file to the daemon
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    let mut config = load_config().context("Failed to load client configuration")?;
    if let Some(version) = args.api_version {
        config.api_version = version;
    }

    match args.command {
        Command::Status => run_status(&config).await,
        Command::Download => run_download(&config).await,
        Command::Start => run_start(&config),
        command => run_api_command(&config, command).await,
    }
}

/// Initialize tracing
///
/// Logs go to stderr so command output on stdout stays machine-readable.
/// Default: INFO level, overridden by RUST_LOG; OADIN_DEBUG=1 forces debug.
fn init_tracing() {
    let show_debug = std::env::var("OADIN_DEBUG")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false);

    let env_filter = if show_debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Bridge log crate → tracing (for dependencies using log crate)
    tracing_log::LogTracer::init().ok();
}

async fn run_status(config: &ClientConfig) -> Result<()> {
    let installed = DaemonInstaller::from_config(config)
        .map(|installer| installer.is_installed())
        .unwrap_or(false);
    let client = OadinClient::from_config(config)?;
    let available = client.is_available().await.unwrap_or(false);

    println!("Endpoint:  {}", client.base_url());
    println!("Installed: {}", if installed { "yes" } else { "no" });
    println!("Running:   {}", if available { "yes" } else { "no" });
    Ok(())
}

async fn run_download(config: &ClientConfig) -> Result<()> {
    let installer = DaemonInstaller::from_config(config)?;
    println!("Downloading Oadin for {}...", installer.platform().name());

    let path = match installer.download().await {
        Ok(path) => path,
        Err(e) if matches!(e.kind(), ErrorKind::Transport | ErrorKind::Status(_)) => {
            anyhow::bail!(errors::wrap_error_with_suggestion(
                e,
                "Check that the download server is reachable, or set OADIN_DOWNLOAD_URL"
            ))
        }
        Err(e) => return Err(e.into()),
    };
    println!("✓ Oadin installed at {}", path.display());
    Ok(())
}

fn run_start(config: &ClientConfig) -> Result<()> {
    let installer = DaemonInstaller::from_config(config)?;
    installer.launch()?;
    println!("✓ Oadin service started");
    Ok(())
}

async fn run_api_command(config: &ClientConfig, command: Command) -> Result<()> {
    let client = OadinClient::from_config(config)?;

    match execute(&client, command).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_unreachable() => {
            anyhow::bail!("{}\n\n{}", e, errors::daemon_unreachable_error(client.base_url()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn execute(client: &OadinClient, command: Command) -> oadin_client::Result<()> {
    let output = match command {
        Command::Services { action } => match action {
            ServiceAction::List => client.get_services().await?,
            ServiceAction::Install { body } => client.install_service(&parse_body(&body)?).await?,
            ServiceAction::Update { body } => client.update_service(&parse_body(&body)?).await?,
        },
        Command::Models { action } => match action {
            ModelAction::List => client.get_models().await?,
            ModelAction::Install { body, stream: false } => {
                client.install_model(&parse_body(&body)?).await?
            }
            ModelAction::Install { body, stream: true } => {
                let summary = client
                    .install_model_stream(&parse_body(&body)?, print_event)
                    .await?;
                return report_stream(summary);
            }
            ModelAction::Cancel { body } => {
                client.cancel_install_model(&parse_body(&body)?).await?
            }
            ModelAction::Delete { body } => client.delete_model(&parse_body(&body)?).await?,
            ModelAction::Available => client.get_available_models().await?,
            ModelAction::Recommended => client.get_recommended_models().await?,
            ModelAction::Supported => client.get_supported_models().await?,
            ModelAction::Smartvision { env_type } => {
                let mut headers = HashMap::new();
                if let Some(env_type) = env_type {
                    headers.insert("env_type".to_string(), env_type);
                }
                client.get_smartvision_supported_models(&headers).await?
            }
        },
        Command::Providers { action } => match action {
            ProviderAction::List => client.get_service_providers().await?,
            ProviderAction::Add { body } => {
                client.add_service_provider(&parse_body(&body)?).await?
            }
            ProviderAction::Update { body } => {
                client.update_service_provider(&parse_body(&body)?).await?
            }
            ProviderAction::Delete { body } => {
                client.delete_service_provider(&parse_body(&body)?).await?
            }
        },
        Command::Chat { body, stream } => {
            let body = parse_body(&body)?;
            if stream {
                let summary = client.chat_stream(&body, print_event).await?;
                return report_stream(summary);
            }
            client.chat(&body).await?
        }
        Command::Generate { body, stream } => {
            let body = parse_body(&body)?;
            if stream {
                let summary = client.generate_stream(&body, print_event).await?;
                return report_stream(summary);
            }
            client.generate(&body).await?
        }
        Command::Embed { body } => client.embed(&parse_body(&body)?).await?,
        Command::TextToImage { body } => client.text_to_image(&parse_body(&body)?).await?,
        Command::Config { action } => match action {
            ConfigAction::Export { body } => {
                let body = body.map(|b| parse_body(&b)).transpose()?;
                let path = client.export_config(body.as_ref()).await?;
                format!("Exported to {}", path.display())
            }
            ConfigAction::Import { path } => client.import_config(&path).await?,
        },
        Command::Status | Command::Download | Command::Start => {
            unreachable!("handled before connecting")
        }
    };

    println!("{}", output);
    Ok(())
}

/// Parse a JSON argument, reading it from a file when prefixed with '@'
fn parse_body(arg: &str) -> oadin_client::Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| OadinError::io(format!("Failed to read {}", path), e))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).map_err(|e| OadinError::parse("Invalid JSON body", e))
}

fn print_event(event: StreamEvent) {
    match event {
        StreamEvent::Data(document) => println!("{}", document),
        StreamEvent::Error(e) => eprintln!("\x1b[1;33m⚠ {}\x1b[0m", e),
        StreamEvent::End => {}
    }
}

fn report_stream(summary: StreamSummary) -> oadin_client::Result<()> {
    tracing::debug!(?summary, "Stream summary");
    if !summary.completed {
        tracing::warn!("Stream ended before the daemon reported completion");
    }
    Ok(())
}
