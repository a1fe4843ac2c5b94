//! Mixline CLI - Gapless Preview Timelines
//!
//! Command-line interface for resolving and rendering timeline documents.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;
use tracing_subscriber::EnvFilter;

use mixline::cli::commands::{self, RenderOptions};
use mixline::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    // tracing events (HTTP source) go through their own subscriber
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    info!("Mixline v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Mixline v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Resolve { document, json } => commands::resolve(&document, json)
            .with_context(|| format!("resolving {}", document.display())),
        Commands::Link { document, write } => commands::link(&document, write)
            .with_context(|| format!("linking {}", document.display())),
        Commands::Attach {
            document,
            transition_id,
            resource_id,
        } => commands::attach(&document, &transition_id, &resource_id)
            .with_context(|| format!("attaching {} to {}", resource_id, transition_id)),
        Commands::Render {
            document,
            out,
            from,
            config,
            sources,
            bit_depth,
        } => {
            let options = RenderOptions {
                out,
                from,
                config,
                sources,
                bit_depth,
            };
            commands::render(&document, &options)
                .map(|_| ())
                .with_context(|| format!("rendering {}", document.display()))
        }
    }
}
