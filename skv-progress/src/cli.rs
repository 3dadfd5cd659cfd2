//! Command-line arguments and bootstrap configuration
//!
//! Priority per value: CLI flag, environment variable, TOML file, compiled
//! default. clap merges the first two; [`ServiceConfig::resolve`] applies
//! the rest.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use skv_common::config::{TomlConfig, DEFAULT_BIND, DEFAULT_PORT};

/// Command-line arguments for skv-progress
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "skv-progress")]
#[command(about = "Skilvania learner progress service")]
#[command(version)]
pub struct Args {
    /// TOML config file
    #[arg(short, long, env = "SKV_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "SKV_DATABASE")]
    pub database: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "SKV_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "SKV_BIND")]
    pub bind: Option<IpAddr>,
}

/// Fully resolved bootstrap configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub listen: SocketAddr,
    pub log_level: String,
}

impl ServiceConfig {
    pub fn resolve(args: &Args, toml: &TomlConfig) -> Result<Self> {
        let database_path = toml.resolve_database_path(args.database.as_deref());

        let port = args.port.or(toml.port).unwrap_or(DEFAULT_PORT);

        let bind = match args.bind {
            Some(ip) => ip,
            None => toml
                .bind
                .as_deref()
                .unwrap_or(DEFAULT_BIND)
                .parse()
                .context("Invalid bind address in config file")?,
        };

        Ok(Self {
            database_path,
            listen: SocketAddr::new(bind, port),
            log_level: toml.logging.level.clone(),
        })
    }
}
