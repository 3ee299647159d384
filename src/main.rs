//! deck-agent main entry point
//!
//! This binary handles CLI parsing, logging setup, and wiring the OBS
//! backend, command catalog and control server together.

use clap::{Parser, Subcommand};
use std::io::{self, BufReader};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deck_agent::{
    backend::ObsBackend,
    catalog::{Catalog, CatalogProvider, JsonFileProvider},
    config::Config,
    control::{spawn_console_listener, CommandDispatcher, ControlServer, MacroTable, ServerState},
    APP_NAME, VERSION,
};

/// Remote control server for OBS Studio
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config/deck-agent.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to OBS and serve control connections
    Start {
        /// Control port (overrides the configuration file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Exit the process as soon as the server stops
        #[arg(long)]
        headless: bool,
    },

    /// Print the command catalog
    Commands,

    /// Print the configured macros
    Macros,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    info!("Starting {} v{}", APP_NAME, VERSION);

    if let Err(e) = run(cli).await {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize structured logging with tracing
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the CLI command
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Start { port, headless } => {
            info!("Starting agent with config: {}", cli.config);
            let mut config = Config::from_file_or_default(&cli.config)?;
            if let Some(port) = port {
                config.server.port = port;
            }
            config.server.headless |= headless;
            config.validate()?;

            start(config).await
        }
        Commands::Commands => {
            let config = Config::from_file_or_default(&cli.config)?;
            let provider = JsonFileProvider::new(&config.catalog.path);
            for command in provider.load()? {
                let id = command.id().map(|id| id.to_string()).unwrap_or_default();
                println!(
                    "{:<20} {:<16} {:<16} {}",
                    command.label, command.action, command.parameters, id
                );
            }
            Ok(())
        }
        Commands::Macros => {
            let config = Config::from_file_or_default(&cli.config)?;
            let macros = MacroTable::from_config(&config.macros)?;
            for name in macros.names() {
                println!("{}:", name);
                for step in macros.steps(name) {
                    println!("  {}", step);
                }
            }
            Ok(())
        }
        Commands::Version => {
            println!("{} v{}", APP_NAME, VERSION);
            Ok(())
        }
    }
}

/// Bring up the backend session and serve until shutdown
async fn start(config: Config) -> anyhow::Result<()> {
    let macros = MacroTable::from_config(&config.macros)?;
    info!("Loaded {} macro(s)", macros.len());

    let backend = Arc::new(ObsBackend::connect(&config.obs).await?);

    let catalog = Arc::new(Catalog::new(Arc::new(JsonFileProvider::new(
        &config.catalog.path,
    ))));
    let dispatcher = Arc::new(CommandDispatcher::with_defaults(
        backend.clone(),
        catalog,
        macros,
    ));

    let state = Arc::new(ServerState::new());
    let server = ControlServer::bind(config.bind_addr(), dispatcher, state.clone())
        .await?
        .headless(config.server.headless);

    if let Err(e) = spawn_console_listener(BufReader::new(io::stdin()), state.clone()) {
        warn!("Console listener unavailable: {}", e);
    }

    let signal_state = state.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_state.request_shutdown();
    });

    let headless = server.is_headless();
    let result = server.start().await;

    info!("Shutting down agent");
    backend.close().await;
    result?;

    if headless {
        info!("Headless mode, exiting");
        std::process::exit(0);
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
