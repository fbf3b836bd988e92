//! wikicat CLI
//!
//! Category migrations over a directory of exported page text

use clap::{Parser, Subcommand};
use wikicat_core::logging_facility::{self, Profile};

mod commands;
mod review;

#[derive(Debug, Parser)]
#[command(name = "wikicat")]
#[command(about = "wikicat - Move categories and migrate their members", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a migration from a TSV file
    Run(commands::run::RunArgs),
    /// Inspect and edit learned template rules
    Rules(commands::rules::RulesArgs),
}

fn main() {
    let cli = Cli::parse();
    logging_facility::init(if cli.log_json {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Rules(args) => commands::rules::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
