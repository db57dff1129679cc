//! runlog CLI
//!
//! Main entry point for the `runlog` command-line tool.

use anyhow::Context;
use clap::{Parser, Subcommand};
use runlog::Settings;
use runlog_server::{bind, cli, serve, shutdown_signal, QueryService, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "runlog")]
#[command(about = "Serve and inspect runlog experiment runs", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve run data over HTTP (default)
    Serve {
        /// Projects directory, defaults to <RUNLOG_HOME>/projects
        dir: Option<PathBuf>,

        /// Port to listen on [default: 8765]
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind [default: 127.0.0.1]
        #[arg(long)]
        host: Option<String>,

        /// TOML file with host, port and projects_dir
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List runs grouped by project
    List {
        /// Projects directory, defaults to <RUNLOG_HOME>/projects
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::from_env();
    let args = Cli::parse();

    match args.command.unwrap_or(Commands::Serve {
        dir: None,
        port: None,
        host: None,
        config: None,
    }) {
        Commands::Serve {
            dir,
            port,
            host,
            config,
        } => {
            let file_config = match config {
                Some(path) => ServerConfig::from_file(&path)
                    .with_context(|| format!("loading server config {}", path.display()))?,
                None => ServerConfig::default(),
            };
            let config = file_config.with_overrides(host, port, dir);
            let projects_dir = config.resolve_projects_dir(&settings);

            std::fs::create_dir_all(&projects_dir)
                .with_context(|| format!("creating {}", projects_dir.display()))?;

            let listener = bind(&config).await?;
            let addr = listener.local_addr()?;
            println!("runlog server: http://{}", addr);
            println!("  Projects: {}", projects_dir.display());

            serve(listener, Arc::new(QueryService::new(projects_dir)), shutdown_signal()).await?;
            Ok(())
        }
        Commands::List { dir } => {
            let projects_dir = dir.unwrap_or_else(|| settings.projects_dir());
            let runs = QueryService::new(&projects_dir).list_runs().await?;
            print!("{}", cli::render_run_list(&projects_dir, &runs));
            Ok(())
        }
    }
}
