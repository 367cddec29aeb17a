//! CLI module for Sage
//!
//! Provides commands:
//! - `chat`: Run a turn (or an interactive session) on a thread
//! - `resume`: Continue an interrupted thread
//! - `state` / `threads`: Inspect checkpoints
//! - `kg`: Look up entities in the knowledge graph
//! - `graph`: Print the compiled topology

use crate::app::AppConfig;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod inspect;

/// Sage: supervised worker routing
#[derive(Parser, Debug)]
#[command(name = "sage")]
#[command(about = "Supervisor-routed research and humor assistant")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a message on a thread; without a message, start an interactive session
    Chat {
        /// Conversation id
        #[arg(short, long, default_value = "default")]
        thread: String,
        /// Message text
        message: Vec<String>,
    },
    /// Continue an interrupted turn, optionally adding a message
    Resume {
        #[arg(short, long)]
        thread: String,
        message: Vec<String>,
    },
    /// Print the checkpointed state of a thread
    State {
        #[arg(short, long)]
        thread: String,
        /// Print raw JSON
        #[arg(long)]
        raw: bool,
    },
    /// List threads with a checkpoint
    Threads,
    /// Look up entities in the knowledge graph
    Kg {
        /// Entity ids (e.g. MONDO:0005148)
        #[arg(required = true)]
        entities: Vec<String>,
    },
    /// Print the compiled graph topology
    Graph,
}

/// Join positional words into one message; `None` when empty
pub(crate) fn join_message(words: &[String]) -> Option<String> {
    let text = words.join(" ");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Chat { thread, message }) => {
            chat::run(&config, &thread, join_message(&message)).await
        }
        Some(Commands::Resume { thread, message }) => {
            chat::resume(&config, &thread, join_message(&message)).await
        }
        Some(Commands::State { thread, raw }) => inspect::state(&config, &thread, raw).await,
        Some(Commands::Threads) => inspect::threads(&config).await,
        Some(Commands::Kg { entities }) => inspect::kg(&config, &entities).await,
        Some(Commands::Graph) => inspect::graph(&config).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
