pub mod chunk;
pub mod ingest;
pub mod init;
pub mod mandates;
pub mod sessions;
pub mod status;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mandata", about = "Mandate revenue ingestion CLI for hospitality groups.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up mandata: choose a data directory and initialize the database.
    Init {
        /// Path for mandata data (default: ~/Documents/mandata)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Ingest a whole export in one call.
    ///
    /// Pass an XLSX workbook with 'Mandants' and 'DayValues' sheets, or a
    /// mandates CSV together with --values for the day-values CSV.
    Ingest {
        /// XLSX workbook, or the mandates CSV when --values is given
        file: String,
        /// Day-values CSV (CSV mode only)
        #[arg(long)]
        values: Option<String>,
    },
    /// Process one chunk of a multi-request upload.
    ///
    /// Reads a JSON chunk request from FILE (or stdin for '-') and prints
    /// the JSON response.
    Chunk {
        /// Path to the chunk request payload, or '-' for stdin
        #[arg(default_value = "-")]
        payload: String,
    },
    /// List mandates with their revenue rollups.
    Mandates,
    /// List import sessions.
    Sessions {
        /// Remove sessions whose completion grace window has elapsed
        #[arg(long)]
        purge: bool,
    },
    /// Show current database and summary statistics.
    Status,
}
