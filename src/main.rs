use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use imsg_archive::config::AppConfig;
use imsg_archive::logging::init_logging;
use imsg_archive::output::{write_conversations, write_messages, write_stream};
use imsg_archive::send::{SendRequest, SendTarget, Sender};
use imsg_archive::validation::InputValidator;
use imsg_archive::{Archive, MessageFilter, MessageRepository, OutputFormat, WatchOptions, Watcher};

#[derive(Parser)]
#[command(name = "imsg", author, version, about = "Read, search and tail the macOS Messages archive", long_about = None)]
struct Cli {
    /// Path to chat.db (overrides configuration)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Extra configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (overrides configuration)
    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Log level (overrides configuration; RUST_LOG wins over both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List conversations by most recent activity
    Chats {
        /// Maximum number of conversations
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show the most recent messages across all conversations
    Recent {
        /// Maximum number of messages
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Find messages whose text contains a term
    Search {
        /// Text to look for (case-insensitive)
        term: String,

        /// Maximum number of messages
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show the history of one conversation
    History {
        /// Conversation identifier, as shown by `imsg chats`
        #[arg(long)]
        chat_id: i64,

        /// Maximum number of messages
        #[arg(short, long)]
        limit: Option<usize>,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print new messages as they arrive
    Watch {
        /// Only watch this conversation
        #[arg(long)]
        chat_id: Option<i64>,

        /// Start after this message row identifier instead of the newest one
        #[arg(long)]
        since_rowid: Option<i64>,

        /// Pause between polls in milliseconds (overrides configuration)
        #[arg(long)]
        interval_ms: Option<u64>,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Send a message or a file
    Send {
        /// Recipient phone number or email
        #[arg(long, conflicts_with = "chat", required_unless_present = "chat")]
        to: Option<String>,

        /// Existing chat guid
        #[arg(long)]
        chat: Option<String>,

        /// Message text
        #[arg(long)]
        text: Option<String>,

        /// File to attach
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Comma-separated sender handles
    #[arg(long)]
    participants: Option<String>,

    /// Inclusive start (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    start: Option<String>,

    /// Exclusive end (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    end: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> Result<MessageFilter> {
        let participants = match &self.participants {
            Some(raw) => InputValidator::parse_participants(raw)?,
            None => Vec::new(),
        };
        let start = parse_optional_date(self.start.as_deref())?;
        let end = parse_optional_date(self.end.as_deref())?;
        InputValidator::validate_date_range(start, end)?;

        Ok(MessageFilter::new().with_participants(participants).with_range(start, end))
    }
}

fn parse_optional_date(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(InputValidator::parse_date).transpose()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load(cli.config.as_deref())?;

    // Initialize logging
    let log_level = cli.log_level.clone().unwrap_or_else(|| config.get_log_level());
    let _guard = init_logging(
        Some(&log_level),
        config.logging.file_path.as_deref().map(Path::new),
        &config.logging.format,
    )?;

    debug!("Starting imsg");

    let format = cli.format.unwrap_or_else(|| config.output_format());

    let preview = config.output.preview_chars;
    let stdout = io::stdout();

    match &cli.command {
        Commands::Config => print!("{}", config.to_yaml()?),
        Commands::Send { to, chat, text, file } => {
            send_message(&config, to.as_deref(), chat.as_deref(), text.as_deref(), file.as_deref()).await?;
        },
        Commands::Chats { limit } => {
            if let Some(limit) = limit {
                InputValidator::validate_limit(*limit)?;
            }
            let conversations = open_archive(&cli, &config)?.list_conversations(*limit)?;
            write_conversations(stdout.lock(), &conversations, format)?;
        },
        Commands::Recent { limit } => {
            let limit = effective_limit(&config, *limit)?;
            let mut messages = open_archive(&cli, &config)?.recent(limit)?;
            messages.reverse();
            write_messages(stdout.lock(), &messages, format, preview)?;
        },
        Commands::Search { term, limit } => {
            InputValidator::validate_search_term(term)?;
            let limit = effective_limit(&config, *limit)?;
            let messages = open_archive(&cli, &config)?.search(term, limit)?;
            info!(term = %term, found = messages.len(), "Search finished");
            write_messages(stdout.lock(), &messages, format, preview)?;
        },
        Commands::History { chat_id, limit, filter } => {
            let limit = effective_limit(&config, *limit)?;
            let filter = filter.to_filter()?;
            let mut messages = open_archive(&cli, &config)?.history(*chat_id, limit, &filter)?;
            messages.reverse();
            write_messages(stdout.lock(), &messages, format, preview)?;
        },
        Commands::Watch {
            chat_id,
            since_rowid,
            interval_ms,
            filter,
        } => {
            let interval = interval_ms.map_or_else(|| config.poll_interval(), Duration::from_millis);
            InputValidator::validate_poll_interval(interval)?;

            let options = WatchOptions {
                chat_id: *chat_id,
                filter: filter.to_filter()?,
                since_rowid: *since_rowid,
                interval,
            };
            watch(&open_archive(&cli, &config)?, options, format, preview).await?;
        },
    }

    Ok(())
}

/// Open the archive named on the command line, or the configured one
fn open_archive(cli: &Cli, config: &AppConfig) -> Result<Archive> {
    let path = cli.db.clone().unwrap_or_else(|| config.database_path());
    Ok(Archive::open(path)?)
}

fn effective_limit(config: &AppConfig, limit: Option<usize>) -> Result<usize> {
    let limit = limit.unwrap_or(config.archive.default_limit);
    InputValidator::validate_limit(limit)?;
    Ok(limit)
}

/// Tail the archive until interrupted
async fn watch(archive: &Archive, options: WatchOptions, format: OutputFormat, preview: usize) -> Result<()> {
    let mut watcher = Watcher::new(archive, options)?;
    info!(watermark = watcher.watermark(), "Watching for new messages (Ctrl-C to stop)");

    let stdout = io::stdout();
    tokio::select! {
        result = watcher.run(|batch| write_stream(stdout.lock(), &batch.messages, format, preview)) => {
            result.context("Live tail stopped")?;
        },
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
        },
    }

    io::stdout().flush()?;
    info!("Watch session ended");
    Ok(())
}

/// Validate and hand one message to Messages
async fn send_message(config: &AppConfig, to: Option<&str>, chat: Option<&str>, text: Option<&str>, file: Option<&Path>) -> Result<()> {
    let target = match (to, chat) {
        (Some(handle), None) => {
            InputValidator::validate_handle(handle)?;
            SendTarget::Handle(handle.trim().to_string())
        },
        (None, Some(guid)) => {
            InputValidator::validate_recipient(guid)?;
            SendTarget::Chat(guid.trim().to_string())
        },
        _ => bail!("Give exactly one of --to or --chat"),
    };

    let text = text.map(InputValidator::sanitize_text).filter(|t| !t.is_empty());
    if let Some(path) = file {
        InputValidator::validate_send_file(path)?;
    }
    if text.is_none() && file.is_none() {
        bail!("Nothing to send: give --text or --file");
    }

    let request = SendRequest {
        target,
        text,
        file: file.map(Path::to_path_buf),
    };
    Sender::from_config(config)?.send(&request).await?;
    info!("Message sent");
    Ok(())
}
