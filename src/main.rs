//! AsyncAPI Generator - Command-line tool for generating AsyncAPI documents.
//!
//! Parses a Rust project, collects `#[channel]`, `#[publish]`, `#[subscribe]`,
//! `#[message]` and `#[server]` annotations and writes an AsyncAPI 2.x document.
//!
//! # Usage
//!
//! ```bash
//! asyncapi-from-source [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation:
//! ```bash
//! asyncapi-from-source ./my-service -o asyncapi.yaml
//! ```
//!
//! Only scan the `events` module, as JSON:
//! ```bash
//! asyncapi-from-source ./my-service -m crate::events -f json -o asyncapi.json
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! asyncapi-from-source ./my-service -v
//! ```

use anyhow::Result;
use asyncapi_from_source::cli;
use clap::Parser;
use log::info;

fn main() -> Result<()> {
    // Parse once up front so the verbose flag can configure the logger
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("AsyncAPI Generator starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("AsyncAPI document generation completed successfully");

    Ok(())
}
