use std::path::PathBuf;

use chatboard::commands::{dispatch, messages, presence};
use chatboard::config::BoardConfig;
use chatboard::output::Format;
use chatboard::store::board::ChatBoard;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(
    name = "chatboard",
    version,
    about = "Multi-user chat board backed by locked JSON documents"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    /// Directory holding messages.json, users.json and the lock file
    /// (default: $CHATBOARD_DATA_DIR, then ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Log filter, e.g. `debug` or `chatboard=trace` (default: $CHATBOARD_LOG, then warn)
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and seed empty documents
    Init,
    /// Show messages newer than a cursor (most recent page)
    Messages {
        /// Only messages with an id greater than this
        #[arg(long, default_value_t = 0)]
        since: u64,
    },
    /// Post a chat message
    Send {
        /// Author name
        #[arg(long)]
        user: String,
        /// Message text
        #[arg(long)]
        message: String,
    },
    /// Post a system notice
    System {
        /// Notice text
        #[arg(long)]
        message: String,
    },
    /// Join the board under a unique name
    Join {
        #[arg(long)]
        user: String,
    },
    /// Refresh presence for a user, re-adding them if missing
    Heartbeat {
        #[arg(long)]
        user: String,
    },
    /// List active users, pruning expired ones
    Users,
    /// Leave the board
    Leave {
        #[arg(long)]
        user: String,
    },
    /// Delete every message
    Clear,
    /// Export the full ledger as plain text
    Export {
        /// Write to this file (or into this directory) instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Answer one JSON request envelope ({"action": ...}) read from --request or stdin
    Dispatch {
        /// Request body; read from stdin when omitted
        #[arg(long)]
        request: Option<String>,
    },
}

fn init_tracing(level: Option<&str>) {
    let directive = level
        .map(str::to_string)
        .or_else(|| std::env::var("CHATBOARD_LOG").ok())
        .unwrap_or_else(|| "warn".into());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries command output; logs go to stderr.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn run(cli: Cli, format: Format) -> chatboard::error::Result<()> {
    let config = BoardConfig::resolve(cli.data_dir.as_deref());
    if let Commands::Init = cli.command {
        return chatboard::commands::init::run(config);
    }

    let board = ChatBoard::open(config)?;
    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Messages { since } => messages::list(&board, since, format),
        Commands::Send { user, message } => messages::send(&board, &user, &message, format),
        Commands::System { message } => messages::system(&board, &message, format),
        Commands::Join { user } => presence::join(&board, &user, format),
        Commands::Heartbeat { user } => presence::heartbeat(&board, &user, format),
        Commands::Users => presence::users(&board, format),
        Commands::Leave { user } => presence::leave(&board, &user, format),
        Commands::Clear => messages::clear(&board, format),
        Commands::Export { output } => messages::export(&board, output.as_deref(), format),
        Commands::Dispatch { request } => dispatch::run(&board, request.as_deref()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
