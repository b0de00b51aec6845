//! Command dispatch for the collabkit binary

/// Clap argument definitions
mod args;

/// `diff` and `apply` commands
mod diff;

/// `patch` and `merge` commands
mod patch;

/// `replay` command over a replicated document
mod replay;

/// Shared CLI utilities
mod util;

use clap::Parser;

pub use args::Cli;
use args::Commands;

/// Main entry point for the CLI
pub fn run_cli() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Execute commands and track success
    let success = match cli.command {
        Commands::Diff { old, new, compact } => diff::handle_diff(&old, &new, compact),

        Commands::Patch {
            target,
            new,
            in_place,
        } => patch::handle_patch(&target, &new, in_place),

        Commands::Apply {
            target,
            delta,
            in_place,
        } => diff::handle_apply(&target, &delta, in_place),

        Commands::Merge {
            target,
            update,
            in_place,
        } => patch::handle_merge(&target, &update, in_place),

        Commands::Replay {
            states,
            name,
            array,
            config,
        } => match util::load_config(config.as_deref()) {
            Ok(config) => replay::handle_replay(&states, &name, array, config),
            Err(e) => {
                eprintln!("✗ {}", e);
                false
            }
        },
    };

    if !success {
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}
