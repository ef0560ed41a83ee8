mod eval;
mod logging;
mod signals;

use anyhow::{Context, Result};
use calculator::{CalculatorConfig, SessionManager};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Format, Serialized, Yaml};
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;

use std::path::{Path, PathBuf};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Calculator Server - capability-based calculator with promise pipelining
#[derive(Parser)]
#[command(name = "calculator-server")]
#[command(about = "Calculator Server - capability-based calculator with promise pipelining")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long, global = true)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve calculator sessions until Ctrl+C or SIGTERM
    Server(ServerArgs),
    /// Evaluate a prefix expression such as "(+ 1 (* 2 3))" on a running server
    Eval(EvalArgs),
}

#[derive(Args, Default)]
struct ServerArgs {
    /// Listen address override (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// Do not log protocol messages
    #[arg(long)]
    no_debug_transport: bool,
}

#[derive(Args)]
struct EvalArgs {
    /// Address of the calculator server
    #[arg(long, default_value = calculator::DEFAULT_LISTEN_ADDR)]
    connect: String,

    /// Expression to evaluate
    expr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(ref path) = cli.config
        && !Path::new(path).is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.to_string_lossy());
    }

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Server(ServerArgs::default()));

    // Layered config: 1) defaults -> 2) YAML (if provided) -> 3) CLI overrides
    let server_args = match &command {
        Commands::Server(args) => Some(args),
        Commands::Eval(_) => None,
    };
    let config = load_config(cli.config.as_deref(), server_args)?;

    if cli.print_config {
        println!("Effective configuration:\n{}", serde_saphyr::to_string(&config)?);
        return Ok(());
    }

    logging::init(&config.logging, cli.verbose)?;

    // Capabilities are not Send; sessions and clients run as local tasks.
    tokio::task::LocalSet::new()
        .run_until(async move {
            match command {
                Commands::Server(_) => run_server(config).await,
                Commands::Eval(args) => {
                    let value = eval::run(&args.connect, &args.expr).await?;
                    println!("{value}");
                    Ok(())
                }
            }
        })
        .await
}

fn load_config(path: Option<&Path>, overrides: Option<&ServerArgs>) -> Result<CalculatorConfig> {
    let mut figment = Figment::new().merge(Serialized::defaults(CalculatorConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Yaml::file(path));
    }
    if let Some(args) = overrides {
        if let Some(listen) = &args.listen {
            figment = figment.merge(Serialized::default("listen_addr", listen));
        }
        if args.no_debug_transport {
            figment = figment.merge(Serialized::default("debug_transport", false));
        }
    }
    figment.extract().context("invalid configuration")
}

async fn run_server(config: CalculatorConfig) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Calculator Server starting");

    let manager = match SessionManager::bind(&config).await {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!("failed to start calculator listener: {e:#}");
            return Err(e);
        }
    };

    let cancel = CancellationToken::new();
    signals::cancel_on_shutdown(cancel.clone());
    manager.serve(cancel).await?;

    tracing::info!("Calculator Server stopped");
    Ok(())
}
