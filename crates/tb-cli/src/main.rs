//! Timeblock CLI
//!
//! CLI tool for inspecting and editing a JSON export of the extension's
//! storage, and for working with single stored payloads.

mod commands;
mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tb_core::{BlockSetId, ListType};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "TIMEBLOCK_LOG";

#[derive(Parser)]
#[command(name = "tb-cli")]
#[command(about = "Timeblock block set storage tools")]
struct Cli {
    /// Storage export file with "sync" and "local" areas
    #[arg(short, long, global = true, default_value = "timeblock-storage.json")]
    storage: PathBuf,

    /// Use the sync area (8 KiB per item) instead of local
    #[arg(long, global = true)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ListArg {
    Blacklist,
    Whitelist,
}

impl From<ListArg> for ListType {
    fn from(list: ListArg) -> Self {
        match list {
            ListArg::Blacklist => ListType::Blacklist,
            ListArg::Whitelist => ListType::Whitelist,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List block sets and general options
    Inspect,

    /// Show which block sets block a request
    Check {
        #[arg(short, long)]
        url: String,

        /// YouTube channel id of the page
        #[arg(long)]
        channel: Option<String>,

        /// YouTube category id of the page
        #[arg(long)]
        category: Option<String>,

        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<String>,
    },

    /// Migrate one stored block set (JSON or compressed) to the current shape
    Migrate {
        #[arg(short, long)]
        input: PathBuf,

        /// Treat the input as general options
        #[arg(long)]
        general_options: bool,
    },

    /// Add a block set with default settings
    AddDefault,

    /// Copy a block set
    Copy {
        #[arg(long)]
        id: BlockSetId,
    },

    /// Delete a block set
    Delete {
        #[arg(long)]
        id: BlockSetId,
    },

    /// Move a block set to another position
    Move {
        #[arg(long)]
        id: BlockSetId,

        #[arg(long)]
        index: usize,
    },

    /// Apply due daily resets of elapsed time
    Reset,

    /// Add a wildcard URL pattern
    AddPattern {
        #[arg(long)]
        id: BlockSetId,

        #[arg(short, long, value_enum)]
        list: ListArg,

        #[arg(short, long)]
        pattern: String,
    },

    /// Add a regular expression URL rule
    AddRegexp {
        #[arg(long)]
        id: BlockSetId,

        #[arg(short, long, value_enum)]
        list: ListArg,

        #[arg(short, long)]
        regexp: String,
    },

    /// Add a YouTube category
    AddCategory {
        #[arg(long)]
        id: BlockSetId,

        #[arg(short, long, value_enum)]
        list: ListArg,

        #[arg(short, long)]
        category: String,
    },

    /// Add a YouTube channel, looking up its title
    #[cfg(feature = "youtube-api")]
    AddChannel {
        #[arg(long)]
        id: BlockSetId,

        #[arg(short, long, value_enum)]
        list: ListArg,

        #[arg(short, long)]
        channel: String,

        /// YouTube Data API key, defaults to $YOUTUBE_API_KEY
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Compress a JSON file into the stored payload form
    Compress {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Decompress a stored payload into JSON
    Decompress {
        #[arg(short, long)]
        input: PathBuf,
    },
}

impl Commands {
    /// Commands that only read storage. They never rewrite the file, even
    /// when loading filled in a default block set.
    fn is_read_only(&self) -> bool {
        matches!(self, Commands::Inspect | Commands::Check { .. })
    }
}

fn setup_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    setup_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    // Payload commands do not touch the storage file
    match &cli.command {
        Commands::Migrate { input, general_options } => {
            return commands::cmd_migrate(input, *general_options)
        }
        Commands::Compress { input } => return commands::cmd_compress(input),
        Commands::Decompress { input } => return commands::cmd_decompress(input),
        _ => {}
    }

    let file = store::StorageFile::open(&cli.storage)?;
    let mut block_sets = commands::load(&file, cli.sync).await?;
    let read_only = cli.command.is_read_only();

    let result = match cli.command {
        Commands::Inspect => commands::cmd_inspect(&block_sets).await,
        Commands::Check { url, channel, category, at } => {
            commands::cmd_check(&block_sets, &url, channel.as_deref(), category.as_deref(), at.as_deref())
        }
        Commands::AddDefault => commands::cmd_add_default(&mut block_sets).await,
        Commands::Copy { id } => commands::cmd_copy(&mut block_sets, id).await,
        Commands::Delete { id } => commands::cmd_delete(&mut block_sets, id).await,
        Commands::Move { id, index } => commands::cmd_move(&mut block_sets, id, index).await,
        Commands::Reset => commands::cmd_reset(&mut block_sets).await,
        Commands::AddPattern { id, list, pattern } => {
            commands::cmd_add_rule(&mut block_sets, id, commands::Rule::Pattern(list.into(), pattern)).await
        }
        Commands::AddRegexp { id, list, regexp } => {
            commands::cmd_add_rule(&mut block_sets, id, commands::Rule::RegExp(list.into(), regexp)).await
        }
        Commands::AddCategory { id, list, category } => {
            commands::cmd_add_rule(&mut block_sets, id, commands::Rule::Category(list.into(), category)).await
        }
        #[cfg(feature = "youtube-api")]
        Commands::AddChannel { id, list, channel, api_key } => {
            commands::cmd_add_channel(&mut block_sets, id, list.into(), &channel, api_key).await
        }
        Commands::Migrate { .. } | Commands::Compress { .. } | Commands::Decompress { .. } => Ok(()),
    };

    if read_only {
        tracing::debug!("Leaving {} untouched", cli.storage.display());
    } else {
        // Keep whatever reached storage, even when the command failed afterwards
        file.save()?;
    }
    result
}
