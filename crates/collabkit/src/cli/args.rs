//! Command-line argument structures and enums

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "collabkit")]
#[command(version)]
#[command(about = "Structural diff and patch for JSON trees and yrs documents", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the delta that turns OLD into NEW
    Diff {
        /// JSON file with the old state
        old: PathBuf,

        /// JSON file with the new state
        new: PathBuf,

        /// Print on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Patch TARGET so it equals NEW, keeping unchanged subtrees
    Patch {
        /// JSON file to patch
        target: PathBuf,

        /// JSON file with the desired state
        new: PathBuf,

        /// Write the result back to TARGET instead of printing it
        #[arg(short, long)]
        in_place: bool,
    },

    /// Apply a delta produced by `collabkit diff`
    Apply {
        /// JSON file to patch
        target: PathBuf,

        /// JSON file with the delta
        delta: PathBuf,

        /// Write the result back to TARGET instead of printing it
        #[arg(short, long)]
        in_place: bool,
    },

    /// Deep-merge an object UPDATE into TARGET
    Merge {
        /// JSON object file to merge into
        target: PathBuf,

        /// JSON object with the fields to merge
        update: PathBuf,

        /// Write the result back to TARGET instead of printing it
        #[arg(short, long)]
        in_place: bool,
    },

    /// Patch a fresh replicated document with each state in turn
    Replay {
        /// JSON files with successive states
        #[arg(required = true)]
        states: Vec<PathBuf>,

        /// Name of the root container in the document
        #[arg(long, default_value = "root")]
        name: String,

        /// Use an array root instead of a map root
        #[arg(long)]
        array: bool,

        /// Engine config file (default: ~/.config/collabkit/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
