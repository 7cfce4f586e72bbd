//! CLI module for Courtside.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Courtside - question answering over NBA box scores
///
/// Loads game and player box-score CSVs into SQLite, embeds each row, and
/// answers natural-language questions with citations to the rows used.
#[derive(Parser, Debug)]
#[command(name = "courtside")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check API keys, database tables and embedding coverage
    Doctor,

    /// Load teams, players, games and box scores from CSV (replaces existing data)
    Ingest {
        /// Directory containing teams.csv, players.csv, game_details.csv and player_box_scores.csv
        #[arg(short, long)]
        data_dir: Option<String>,
    },

    /// Embed game and box-score rows that have no embedding yet
    Embed {
        /// Only embed games
        #[arg(long, conflicts_with = "players")]
        games: bool,

        /// Only embed player box scores
        #[arg(long)]
        players: bool,

        /// Maximum rows to embed per table
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Ask a question and get an answer with evidence
    Ask {
        /// The question to ask
        question: String,

        /// LLM model to use for answer generation
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Show the rows a question would retrieve, without generating an answer
    Search {
        /// Search query
        query: String,

        /// Number of games to retrieve
        #[arg(short, long)]
        games: Option<usize>,

        /// Number of player rows to retrieve
        #[arg(short, long)]
        players: Option<usize>,
    },

    /// Answer a questions file against its schema template
    Batch {
        /// Questions file (JSON array of {"question": ...})
        #[arg(short, long)]
        questions: Option<String>,

        /// Template file (JSON array of {"result": {...}})
        #[arg(short, long)]
        template: Option<String>,

        /// Answers file to write (merged by id if it exists)
        #[arg(short, long)]
        output: Option<String>,

        /// Only (re)process these 1-based question ids
        #[arg(long, value_delimiter = ',')]
        only: Vec<usize>,
    },

    /// Start the HTTP chat API
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write a default configuration file if none exists
    Init,

    /// Show configuration file path
    Path,
}
