//! Check-in server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:5000, ./registrations.sqlite3, logs on stderr
//! checkin_server
//!
//! # Explicit database and rolling log files
//! checkin_server --db /var/lib/checkin/db.sqlite3 --log-dir /var/log/checkin
//! ```

use std::path::PathBuf;

use checkin_core::{init_logging, init_stderr_logging};
use checkin_server::{config::Config, start_server};
use clap::Parser;
use log::info;

/// Event registration and attendance server
#[derive(Parser, Debug)]
#[command(name = "checkin_server")]
#[command(version)]
struct Args {
    /// Interface to bind (overrides CHECKIN_BIND)
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides CHECKIN_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file (overrides CHECKIN_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides CHECKIN_LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files (overrides CHECKIN_LOG_DIR)
    #[arg(long)]
    log_dir: Option<String>,
}

impl Args {
    fn apply(self, mut config: Config) -> Config {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(db) = self.db {
            config.db_path = db;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if self.log_dir.is_some() {
            config.log_dir = self.log_dir;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = args.apply(Config::load()?);

    match config.log_dir.as_deref() {
        Some(dir) => init_logging(&config.log_level, dir)?,
        None => init_stderr_logging(&config.log_level)?,
    }
    info!("event=config_load module=server status=ok {}", config.summary());

    start_server(config).await?;

    Ok(())
}
