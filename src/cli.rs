//! Command-line argument parsing for the `dune` binary.

use clap::{Args, Parser, Subcommand};
use dune_client::config::ClientConfig;
use dune_client::error::Result;
use dune_client::types::{Performance, QueryId, QueryParameter, QueryParameters};
use std::path::PathBuf;

/// Run Dune queries and fetch their results.
#[derive(Parser, Debug)]
#[command(name = "dune")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Dune API key
    #[arg(long, env = "DUNE_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to a file instead of stderr (default location if no path is given)
    #[arg(long, value_name = "PATH", num_args = 0..=1, global = true)]
    pub log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a query and wait for its results
    Run {
        #[command(flatten)]
        query: QueryArgs,

        /// Execution tier: medium or large
        #[arg(long, value_name = "TIER")]
        performance: Option<Performance>,

        /// Seconds between status checks
        #[arg(long, value_name = "SECS")]
        ping: Option<u64>,

        /// Give up polling after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Fetch the latest results, re-running the query if they are too old
    Latest {
        #[command(flatten)]
        query: QueryArgs,

        /// Oldest acceptable result age in hours
        #[arg(long, value_name = "HOURS")]
        max_age_hours: Option<u64>,
    },
    /// Show the status of an execution
    Status {
        /// Execution id
        execution_id: String,
    },
    /// Cancel a running execution
    Cancel {
        /// Execution id
        execution_id: String,
    },
}

/// Query selection shared by `run` and `latest`.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Query id
    pub query_id: QueryId,

    /// Query parameter as NAME=VALUE (repeatable)
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<QueryParameter>,

    /// Print results as CSV instead of JSON
    #[arg(long)]
    pub csv: bool,
}

impl QueryArgs {
    /// Returns the parameter set, or `None` when no parameters were given.
    pub fn parameters(&self) -> Result<Option<QueryParameters>> {
        if self.params.is_empty() {
            return Ok(None);
        }
        QueryParameters::new(self.params.clone()).map(Some)
    }
}

fn parse_param(s: &str) -> std::result::Result<QueryParameter, String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid parameter '{s}'. Expected NAME=VALUE"))?;
    if name.trim().is_empty() {
        return Err(format!("Invalid parameter '{s}'. Name is empty"));
    }
    Ok(QueryParameter::text(name.trim(), value))
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path (CLI override or platform default).
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(ClientConfig::default_path)
    }

    /// Loads the config file and applies CLI and environment overrides.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::load_from_file(&self.config_path())?;
        if self.api_key.is_some() {
            config.api_key = self.api_key.clone();
        }
        config.apply_env_defaults();
        Ok(config)
    }
}
