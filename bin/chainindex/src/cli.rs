//! Command-line surface (spec §6): a single `run` entry point, config
//! loaded from a TOML file with environment/CLI overrides for the
//! handful of settings an operator is likely to tweak without editing
//! the file.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chainindex", about = "Block/milestone indexer and reconciliation service")]
pub struct Cli {
    /// Path to a TOML config file. Missing fields fall back to defaults.
    #[arg(long, env = "CHAININDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides `database_url` from the config file.
    #[arg(long, env = "CHAININDEX_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Overrides `http_address` from the config file.
    #[arg(long, env = "CHAININDEX_HTTP_ADDRESS")]
    pub http_address: Option<SocketAddr>,
}
