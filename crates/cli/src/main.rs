mod logging;

use clap::{Parser, Subcommand};
use logging::LogFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wisecrack")]
#[command(about = "Wisecrack: Telegram bot that answers with an Ollama model", long_about = None)]
struct Cli {
    /// Default log filter when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_name = "LEVEL")]
    log_level: String,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value = "human")]
    log_format: LogFormat,

    /// Append log lines to this file instead of writing to stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: WISECRACK_CONFIG_PATH or ~/.wisecrack/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Serve the Telegram webhook (registers it on start, removes it on shutdown).
    Serve {
        /// Config file path (default: WISECRACK_CONFIG_PATH or ~/.wisecrack/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Bind address (default from config or 0.0.0.0)
        #[arg(long, short)]
        bind: Option<String>,

        /// HTTP port (default from config or 8000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Fetch updates with getUpdates instead of a webhook (local development).
    Poll {
        /// Config file path (default: WISECRACK_CONFIG_PATH or ~/.wisecrack/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init(&cli.log_level, cli.log_format, cli.log_file.as_deref()) {
        eprintln!("logging setup failed: {:#}", e);
        std::process::exit(1);
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("wisecrack {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, bind, port }) => {
            if let Err(e) = run_serve(config, bind, port).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Poll { config }) => {
            if let Err(e) = run_poll(config).await {
                log::error!("poll failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(wisecrack::config::default_config_path);
    let dir = wisecrack::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = wisecrack::config::load_config(config_path)?;
    if let Some(b) = bind {
        config.gateway.bind = b;
    }
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        config.gateway.port
    );
    wisecrack::gateway::run_gateway(config, path).await
}

async fn run_poll(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, path) = wisecrack::config::load_config(config_path)?;
    log::info!("starting in long-polling mode");
    wisecrack::polling::run_polling(config, path).await
}
