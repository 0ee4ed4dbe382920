//! # Registrar Server
//!
//! Registers devices that completed owner onboarding as hosts in the
//! automation platform's inventory.
//!
//! ## Flow
//!
//! - The onboarding server drops one voucher file per device into the voucher
//!   directory; the file name is the device GUID.
//! - The registrar scans that directory at startup and on an interval.
//! - A device calls `GET /device/{guid}`; a known, unregistered GUID becomes a
//!   host named after the GUID with `guid: <GUID>` in its variables.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use registrar_core::{
    InventoryClient,
    inventory::{AwxApiConfig, AwxApiInventory, AwxCliConfig, AwxCliInventory},
};
use registrar_server::{
    AppState, create_app,
    infra::{
        config::{
            Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions,
            ConfigOverrides, ConfigWarnings, InventoryTransport,
        },
        startup::{ProdStartupHooks, StartupHooks},
    },
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "registrar-server")]
#[command(
    about = "Registers onboarded devices as hosts in the automation platform inventory"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "REGISTRAR_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Directory the onboarding server writes owner vouchers to
    #[arg(long, env = "OWNER_VOUCHERS_DIR")]
    voucher_dir: Option<PathBuf>,

    /// How to reach the inventory: `cli` or `api`
    #[arg(long)]
    transport: Option<InventoryTransport>,

    /// Path to the platform CLI binary
    #[arg(long, env = "AWX_PATH")]
    awx_path: Option<PathBuf>,

    /// Base URL of the automation platform
    #[arg(long, env = "AWX_ENDPOINT")]
    awx_endpoint: Option<String>,

    /// Access token for the automation platform
    #[arg(long, env = "AWX_TOKEN", hide_env_values = true)]
    awx_token: Option<String>,

    /// Inventory new hosts are added to
    #[arg(long)]
    inventory_id: Option<u64>,

    /// Skip TLS certificate verification when talking to the platform
    #[arg(long, default_value_t = false)]
    insecure: bool,

    /// Log filter directives used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl ServeArgs {
    fn loader_options(&self) -> ConfigLoaderOptions {
        ConfigLoaderOptions {
            config_path: self.config.clone(),
            env_file: self.env_file.clone(),
            overrides: ConfigOverrides {
                host: self.host.clone(),
                port: self.port,
                voucher_dir: self.voucher_dir.clone(),
                transport: self.transport,
                awx_path: self.awx_path.clone(),
                endpoint: self.awx_endpoint.clone(),
                token: self.awx_token.clone(),
                inventory_id: self.inventory_id,
                insecure: self.insecure,
                log_filter: self.log_level.clone(),
            },
            ..ConfigLoaderOptions::default()
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Load and validate configuration, print the result and exit
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(command) = cli.command {
        match command {
            Command::Config(ConfigCommand::Check) => {
                return run_config_check(&cli.serve);
            }
        }
    }

    run_server(cli.serve).await
}

fn run_config_check(args: &ServeArgs) -> anyhow::Result<()> {
    let ConfigLoad { config, warnings } =
        ConfigLoader::with_options(args.loader_options())
            .load()
            .context("failed to load configuration")?;

    match &config.metadata.config_path {
        Some(path) => println!("config file: {}", path.display()),
        None => println!("config file: none"),
    }
    println!("{:#?}", config.server);
    println!("{:#?}", config.discovery);
    println!("{:#?}", config.inventory);
    println!("{:#?}", config.logging);
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => println!("warning: {} ({hint})", warning.message),
            None => println!("warning: {}", warning.message),
        }
    }
    println!("configuration ok");
    Ok(())
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Arc<Config>> {
    let ConfigLoad { config, warnings } =
        ConfigLoader::with_options(args.loader_options())
            .load()
            .context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    log_warnings(&warnings);

    info!(
        server = ?config.server,
        discovery = ?config.discovery,
        inventory = ?config.inventory,
        "effective configuration"
    );

    Ok(Arc::new(config))
}

fn log_warnings(warnings: &ConfigWarnings) {
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }
}

fn build_inventory(config: &Config) -> anyhow::Result<Arc<dyn InventoryClient>> {
    let settings = &config.inventory;
    match settings.transport {
        InventoryTransport::Cli => {
            let mut cli = AwxCliConfig::new(&settings.awx_path);
            cli.endpoint = settings.endpoint.clone();
            cli.token = settings.token.clone();
            cli.insecure = settings.insecure;
            cli.timeout = settings.timeout;
            info!(program = %settings.awx_path.display(), "using cli inventory transport");
            Ok(Arc::new(AwxCliInventory::new(cli)))
        }
        InventoryTransport::Api => {
            let endpoint = settings
                .endpoint
                .as_deref()
                .context("AWX_ENDPOINT is required for the api transport")?;
            let endpoint = Url::parse(endpoint)
                .with_context(|| format!("invalid AWX_ENDPOINT '{endpoint}'"))?;
            let token = settings
                .token
                .clone()
                .context("AWX_TOKEN is required for the api transport")?;

            let mut api = AwxApiConfig::new(endpoint, token);
            api.insecure = settings.insecure;
            api.timeout = settings.timeout;
            info!(endpoint = %api.endpoint, "using api inventory transport");
            let inventory = AwxApiInventory::new(api)
                .context("failed to build inventory API client")?;
            Ok(Arc::new(inventory))
        }
    }
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    run_server_with_hooks(args, &ProdStartupHooks).await
}

async fn run_server_with_hooks<H>(
    args: ServeArgs,
    hooks: &H,
) -> anyhow::Result<()>
where
    H: StartupHooks,
{
    let config = load_runtime_config(&args)?;
    let inventory = build_inventory(&config)?;
    let state = AppState::new(Arc::clone(&config), inventory);

    hooks.run(&state).await?;

    let router = create_app(state);
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        "Starting device registrar on {}:{}",
        config.server.host, config.server.port
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("device registrar stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
