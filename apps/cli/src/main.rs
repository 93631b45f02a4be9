//! copyforge CLI — batch marketing-copy generation with quality audits.
//!
//! Turns a product table into audited, SEO-structured marketing copy via
//! the configured text-generation service.

mod commands;
mod tables;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
