mod classify;
mod cli;
mod conflict;
mod db;
mod decisions;
mod error;
mod exclusions;
mod executor;
mod fmt;
mod ingest;
mod models;
mod normalize;
mod session;
mod settings;
mod similarity;

use clap::Parser;
use colored::Colorize;

use cli::{AccountsCommands, Cli, Commands, ExclusionsCommands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                account_type,
                institution,
                last_four,
            } => cli::accounts::add(&name, &account_type, institution.as_deref(), last_four.as_deref()),
            AccountsCommands::List => cli::accounts::list(),
        },
        Commands::Analyze { file, account } => cli::analyze::run(&file, &account),
        Commands::Import { file, account, force } => cli::import::run(&file, &account, force),
        Commands::Exclusions { command } => match command {
            ExclusionsCommands::List { account } => cli::exclusions::list(&account),
        },
    };

    if let Err(e) = result {
        eprintln!("{} {e}", "error:".red());
        std::process::exit(1);
    }
}
