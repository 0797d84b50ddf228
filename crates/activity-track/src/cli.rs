use crate::config::{DEFAULT_DB_PATH, DEFAULT_HTML_PORT, DEFAULT_JS_PORT, ServerConfig};
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "activity-track")]
#[command(about = "Collect and store user-interaction events from web pages")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Event database path
    #[arg(long, global = true, env = "ACTIVITY_TRACK_DB", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    #[command(flatten)]
    pub serve: ServeArgs,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Flags used when serving (no subcommand)
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "ACTIVITY_TRACK_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port for the pages
    #[arg(long, env = "ACTIVITY_TRACK_HTML_PORT", default_value_t = DEFAULT_HTML_PORT)]
    pub html_port: u16,

    /// Port for the tracker script and ingestion endpoint
    #[arg(long, env = "ACTIVITY_TRACK_JS_PORT", default_value_t = DEFAULT_JS_PORT)]
    pub js_port: u16,

    /// Directory holding the static pages
    #[arg(long, env = "ACTIVITY_TRACK_PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,

    /// Build output directory holding client/tracker.js
    #[arg(long, env = "ACTIVITY_TRACK_DIST_DIR", default_value = "dist")]
    pub dist_dir: PathBuf,

    /// Append batches that fail persistence to this file (JSON lines)
    #[arg(long, env = "ACTIVITY_TRACK_DEAD_LETTER")]
    pub dead_letter: Option<PathBuf>,

    /// How long to wait for a locked database
    #[arg(long, env = "ACTIVITY_TRACK_CONNECT_TIMEOUT", default_value = "5s")]
    #[arg(value_parser = parse_duration)]
    pub connect_timeout: Duration,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the most recently stored events
    Events {
        /// Number of events to display
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,

        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show stored event counts per event name
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute raw SQL query on the event database
    Query {
        /// SQL query to execute
        sql: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    // Try humantime first
    if let Ok(d) = humantime::parse_duration(s) {
        return Ok(d);
    }

    // Try bare number as milliseconds
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }

    Err(format!(
        "Invalid duration '{}'. Examples: 5s, 500ms, 1m, 5000",
        s
    ))
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if self.command.is_some() {
            return Ok(());
        }

        if self.serve.html_port == 0 || self.serve.js_port == 0 {
            return Err("Ports must be between 1 and 65535".to_string());
        }

        if self.serve.connect_timeout.is_zero() {
            return Err("Connect timeout must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.serve.host,
            html_port: self.serve.html_port,
            js_port: self.serve.js_port,
            db_path: self.db.clone(),
            public_dir: self.serve.public_dir.clone(),
            dist_dir: self.serve.dist_dir.clone(),
            dead_letter: self.serve.dead_letter.clone(),
            connect_timeout: self.serve.connect_timeout,
        }
    }
}
