//! CLI module for fieldreg
//!
//! Provides the command-line interface for the review core.

pub mod serve;
pub mod verify;

use clap::{Parser, Subcommand};

/// Field registry - fraud review and tamper-evident audit core
#[derive(Parser, Debug)]
#[command(name = "fieldreg")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    FIELDREG_HOST (or HOST)         Bind address (default: 0.0.0.0)
    FIELDREG_PORT (or PORT)         Listen port (default: 8080)
    FIELDREG_LOG_LEVEL              Log level (default: info)
    FIELDREG_DATA_DIR               Data directory (default: ~/.fieldreg)
    FIELDREG_DATABASE_URL           Database URL (default: sqlite:<data dir>/fieldreg.db)
    FIELDREG_CLUSTER_RADIUS_M       Default cluster radius in meters (default: 50)
    FIELDREG_DB_BUSY_TIMEOUT_MS     SQLite lock wait timeout (default: 5000)
    FIELDREG_AUDIT_BUFFER_CAPACITY  Best-effort audit queue size (default: 1000)
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve(serve::ServeArgs),
    /// Verify the audit ledger hash chain
    VerifyChain(verify::VerifyChainArgs),
}
