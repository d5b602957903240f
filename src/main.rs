mod classifier;
mod cli;
mod db;
mod error;
mod fmt;
mod ingest;
mod models;
mod parse;
mod reconciler;
mod session;
mod settings;
mod stats;
mod writer;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Ingest { file, values } => cli::ingest::run(&file, values.as_deref()),
        Commands::Chunk { payload } => cli::chunk::run(&payload),
        Commands::Mandates => cli::mandates::run(),
        Commands::Sessions { purge } => cli::sessions::run(purge),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
