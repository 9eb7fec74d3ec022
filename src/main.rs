//! talkcsv CLI - chat with tabular data.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use talkcsv::{cli, logging};

#[derive(Parser)]
#[command(name = "talkcsv")]
#[command(author, version, about = "Chat with a SQLite database or a CSV file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat.
    Chat {
        /// CSV file to chat with instead of the fixed database.
        #[arg(short, long)]
        upload: Option<PathBuf>,

        /// Resume a saved chat by ID.
        #[arg(short, long)]
        resume: Option<String>,
    },

    /// Convert a CSV file into a table of a SQLite database file.
    Convert {
        /// Source CSV file. Defaults to reports.csv.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Target database file. Defaults to analytics_db.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Target table, replaced if it exists. Defaults to test.
        #[arg(long)]
        table: Option<String>,
    },

    /// List saved chats.
    List {
        /// Maximum number of chats to show. Defaults to 20.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print or save a saved chat as text.
    Export {
        /// Chat ID.
        chat_id: String,

        /// Archived session to export ("Session N") instead of the current one.
        #[arg(short, long)]
        session: Option<usize>,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove old saved chats.
    Clean {
        /// Duration (e.g., "7d", "30d", "24h"). Defaults to 7d.
        #[arg(long, default_value = "7d")]
        before: String,

        /// Remove all chats.
        #[arg(long)]
        all: bool,
    },
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat { upload, resume } => cli::chat::run(upload.as_deref(), resume.as_deref()),
        Commands::Convert { csv, db, table } => {
            cli::convert::run(csv.as_deref(), db.as_deref(), table.as_deref())
        }
        Commands::List { limit } => cli::list::run(limit),
        Commands::Export {
            chat_id,
            session,
            output,
        } => cli::export::run(&chat_id, session, output.as_deref()),
        Commands::Clean { before, all } => cli::clean::run(&before, all),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("talkcsv: error: {e}");
            ExitCode::FAILURE
        }
    }
}
