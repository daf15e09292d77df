//! Mixdeck CLI - Offline Mixing Driver
//!
//! Command-line front end for planning and rendering transitions.

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::info;

use mixdeck::cli::commands::{self, RenderOptions};
use mixdeck::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("Mixdeck v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Mixdeck v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Plan {
            genre,
            energy,
            length,
            seed,
        } => commands::plan(genre, energy, length, seed),
        Commands::Render {
            deck_a,
            deck_b,
            bpm_a,
            bpm_b,
            length,
            sync,
            config,
            output,
        } => {
            let options = RenderOptions {
                deck_a,
                deck_b,
                bpm_a,
                bpm_b,
                length,
                sync,
                config,
            };
            commands::render(&options, &output)
        }
        Commands::Info { path } => commands::info(&path),
    }
}
