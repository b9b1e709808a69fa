mod config;
mod logging;
mod seed;
mod serve;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::logging::LogFormat;

/// Test execution tracking: steps, scenarios, packages and bugs, with
/// blocked status propagated bottom-up.
#[derive(Parser)]
#[command(name = "testdeck", version, about = "Test execution tracking server")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (overrides the config file)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP JSON API server
    Serve {
        /// Address to bind (overrides config and environment)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config and TESTDECK_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// JSON seed file to load at startup
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Validate a JSON seed file without starting the server
    CheckSeed {
        /// Path to the seed file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    if let Some(format) = cli.log_format {
        config.log.format = format;
    }
    logging::init_logging(config.log.format, &config.log.filter);

    match cli.command {
        Commands::Serve { host, port, seed } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            cmd_serve(config);
        }
        Commands::CheckSeed { file } => {
            cmd_check_seed(&file);
        }
    }
}

fn cmd_serve(config: Config) {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(serve::start_server(config)) {
        tracing::error!(error = %e, "server error");
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn cmd_check_seed(file: &Path) {
    let summary = seed::read_seed(file).and_then(|s| s.validate());
    match summary {
        Ok(summary) => {
            println!("{}: ok ({})", file.display(), summary);
        }
        Err(e) => {
            eprintln!("{}: {}", file.display(), e);
            process::exit(1);
        }
    }
}
