//! Liftwatch CLI
//!
//! Command-line front end for the elevator/robot monitoring dashboard:
//! - Watch a view, streaming the live log when the log page is mounted
//! - Resolve view routes and the derived live-log endpoint
//! - Generate a default config file

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use liftwatch::app::App;
use liftwatch::config::{generate_default_config, Config, ConfigDiscovery};
use liftwatch::live_log::ConnectionEndpoint;
use liftwatch::telemetry;
use liftwatch::ui::{route_for, LogFormat, ROUTES};

#[derive(Parser)]
#[command(name = "liftwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Elevator and robot monitoring dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Page origin the backend is served from, e.g. https://lift.example.com
    #[arg(long, global = true)]
    pub origin: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mount a view and keep it live
    Watch {
        /// View path: /log, / or /robot
        #[arg(short, long)]
        path: Option<String>,
        /// Show the navigation drawer
        #[arg(long)]
        nav: bool,
        /// Log line format
        #[arg(short, long, value_enum, default_value_t = LogFormat::Pretty)]
        format: LogFormat,
    },

    /// Show which view a path resolves to
    Route {
        /// Path to resolve
        path: String,
    },

    /// Show the derived live-log endpoint
    Endpoint,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let discovery = match &cli.config {
        Some(path) => ConfigDiscovery {
            config: Config::load_with_env(path)?,
            source: Some(path.clone()),
            rejected: Vec::new(),
        },
        None => Config::load_default(),
    };

    // Logging is up before anything about the config load is reported
    telemetry::init_logging(&discovery.config.logging);
    discovery.log();

    let mut config = discovery.config;
    if let Some(origin) = cli.origin {
        config.connection.origin = origin;
    }

    match cli.command {
        Commands::Watch { path, nav, format } => {
            if let Some(path) = path {
                config.ui.initial_path = path;
            }
            if nav {
                config.ui.nav_show = true;
            }

            let app = App::boot(&config, format)?;
            let mut stdout = std::io::stdout();

            tokio::select! {
                result = app.mount(&mut stdout) => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, shutting down");
                }
            }
        }

        Commands::Route { path } => match route_for(&path) {
            Some(view) => println!("{} -> {}", path, view),
            None => {
                eprintln!("No view at {:?}. Known routes:", path);
                for (route, view) in ROUTES {
                    eprintln!("  {:<7} {}", route, view);
                }
                std::process::exit(1);
            }
        },

        Commands::Endpoint => {
            let endpoint = ConnectionEndpoint::from_origin(&config.connection.origin)?;
            println!("{}", endpoint);
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}
