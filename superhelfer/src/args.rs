use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use superhelfer_routing::Tier;

pub const DEFAULT_CONFIG: &str = "superhelfer.toml";

/// Local LLM tier router
#[derive(Debug, Parser)]
#[command(name = "superhelfer", about = "Routes queries to fast, code and heavy local models")]
pub struct Args {
    /// Path to configuration file; the default may be absent
    #[arg(short, long, default_value = DEFAULT_CONFIG, env = "SUPERHELFER_CONFIG")]
    pub config: PathBuf,

    /// Log filter directive
    #[arg(long, default_value = "info", env = "SUPERHELFER_LOG")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server with the background sweeps
    Serve {
        /// Override the listen address
        #[arg(long, env = "SUPERHELFER_LISTEN")]
        listen: Option<SocketAddr>,
    },

    /// Print the analysis and routing decision for a query as JSON
    Route { query: String },

    /// Route and answer one query
    Ask {
        query: String,

        /// Skip analysis and use this tier
        #[arg(long)]
        tier: Option<Tier>,
    },

    /// Run calibration cycles and print their KPIs
    Calibrate {
        /// Stop after this many cycles; loops until interrupted when unset
        #[arg(long)]
        cycles: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_ask_with_tier() {
        let args = Args::try_parse_from(["superhelfer", "ask", "Löse 2x = 4", "--tier", "heavy"]).unwrap();
        assert!(matches!(args.command, Command::Ask { tier: Some(Tier::Heavy), .. }));
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG));
    }

    #[test]
    fn rejects_unknown_tier() {
        assert!(Args::try_parse_from(["superhelfer", "ask", "x", "--tier", "medium"]).is_err());
    }
}
