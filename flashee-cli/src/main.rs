//! Flash image tool - Main Entry Point

use anyhow::Result;
use clap::Parser;

mod cli;
mod image;
mod value_parser;

fn main() -> Result<()> {
    env_logger::init();
    let cli = cli::Cli::parse();
    cli::run(cli)
}
