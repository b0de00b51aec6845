#![doc = include_str!(concat!(env!("OUT_DIR"), "/README.md"))]

/// CLI module - command-line interface for collabkit
mod cli;

fn main() {
    cli::run_cli();
}
