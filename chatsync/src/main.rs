//! chatsync - command-line client for document-grounded conversations
//!
//! Commands:
//! - Inspecting configuration and backend health
//! - Listing, showing, creating and deleting conversations
//! - Sending messages (optionally grounded in ready documents)
//! - Uploading documents and waiting for processing
//! - Watching a conversation live over the realtime channel
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/chatsync/chatsync.log (~/.local/state/chatsync/chatsync.log)
//! - Config: $XDG_CONFIG_HOME/chatsync/config.toml (~/.config/chatsync/config.toml)

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chatsync_core::notify::NoticeLevel;
use chatsync_core::upload::UploadGate;
use chatsync_core::{
    Config, ConversationApi, DocumentState, HttpApi, Message, RealtimeChannel, Session, UploadFile,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "chatsync")]
#[command(about = "Chat with an assistant over your documents, kept in sync live")]
#[command(version)]
struct Args {
    /// Verbose output (also writes the log file)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show configuration and, with --ping, backend health
    Status {
        #[arg(long)]
        ping: bool,
    },

    /// List conversations
    List {
        #[arg(long, default_value = "0")]
        skip: usize,
        /// Page size (default: from config)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a conversation's messages and documents
    Show { conversation_id: String },

    /// Start a new conversation
    New { message: String },

    /// Send a message to a conversation
    Send {
        conversation_id: String,
        message: String,
        /// Ground the message in these documents (must be ready)
        #[arg(short, long = "doc")]
        docs: Vec<String>,
    },

    /// Delete a conversation
    Delete { conversation_id: String },

    /// Upload documents into a conversation
    Upload {
        conversation_id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Wait until every uploaded document is ready
        #[arg(short, long)]
        wait: bool,
    },

    /// Follow a conversation live; lines typed on stdin are sent as messages
    Watch { conversation_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = if args.verbose {
        Some(
            chatsync_core::logging::init(&config.logging)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    match args.command {
        Command::Status { ping } => cmd_status(&config, ping).await,
        Command::List { skip, limit } => cmd_list(&config, skip, limit).await,
        Command::Show { conversation_id } => cmd_show(&config, &conversation_id).await,
        Command::New { message } => cmd_new(&config, &message).await,
        Command::Send {
            conversation_id,
            message,
            docs,
        } => cmd_send(&config, &conversation_id, &message, &docs).await,
        Command::Delete { conversation_id } => cmd_delete(&config, &conversation_id).await,
        Command::Upload {
            conversation_id,
            files,
            wait,
        } => cmd_upload(&config, &conversation_id, &files, wait).await,
        Command::Watch { conversation_id } => cmd_watch(&config, &conversation_id).await,
    }
}

fn open_session(config: &Config) -> Result<Session> {
    let api = HttpApi::new(&config.server).context("invalid server configuration")?;
    let channel = RealtimeChannel::from_config(&config.server, &config.sync);
    Ok(Session::new(Arc::new(api), channel, config))
}

/// Open a conversation and wait for its first snapshot.
async fn load(session: &mut Session, conversation_id: &str) -> Result<()> {
    session.open(conversation_id);
    session.settle().await;
    print_notices(session);
    if !session.store().is_active(conversation_id) {
        bail!("could not load conversation {}", conversation_id);
    }
    Ok(())
}

async fn cmd_status(config: &Config, ping: bool) -> Result<()> {
    println!("chatsync Configuration");
    println!("======================");
    println!();
    println!("Config file:     {}", Config::config_path().display());
    println!("Log file:        {}", Config::log_path().display());
    println!();
    println!("Server:          {}", config.server.base_url);
    println!("API root:        {}", config.server.api_root());
    println!("Realtime:        {}", config.server.realtime_url);
    println!("Timeout:         {}s", config.server.timeout_secs);
    println!();
    println!("Poll interval:   {}ms", config.sync.poll_interval_ms);
    println!("Reconcile delay: {}ms", config.sync.reconcile_delay_ms);
    println!(
        "Reconnect:       {} attempts, {}ms apart",
        config.sync.reconnect_attempts, config.sync.reconnect_delay_ms
    );
    println!(
        "Uploads:         {}",
        config.upload.allowed_extensions.join(", ")
    );

    if ping {
        let api = HttpApi::new(&config.server).context("invalid server configuration")?;
        println!();
        match api.health().await {
            Ok(true) => println!("Backend:         healthy"),
            Ok(false) => println!("Backend:         unhealthy"),
            Err(e) => println!("Backend:         unreachable ({})", e),
        }
    }
    Ok(())
}

async fn cmd_list(config: &Config, skip: usize, limit: Option<usize>) -> Result<()> {
    let api = HttpApi::new(&config.server).context("invalid server configuration")?;
    let limit = limit.unwrap_or(config.server.list_page_size);
    let conversations = api
        .list_conversations(skip, limit)
        .await
        .context("failed to list conversations")?;

    if conversations.is_empty() {
        println!("No conversations.");
        return Ok(());
    }
    for conv in conversations {
        println!(
            "{}  {}  {}",
            conv.id,
            conv.updated_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M"),
            conv.title.as_deref().unwrap_or("(untitled)")
        );
    }
    Ok(())
}

async fn cmd_show(config: &Config, conversation_id: &str) -> Result<()> {
    let mut session = open_session(config)?;
    load(&mut session, conversation_id).await?;

    let store = session.store();
    println!("{}", store.title().unwrap_or("(untitled)"));
    println!();
    for message in store.messages() {
        print_message(message);
    }

    if !store.documents().is_empty() {
        println!();
        println!("Documents:");
        for doc in store.documents() {
            println!("  {}  {:<10}  {}", doc.id, doc.state().as_str(), doc.filename);
        }
    }
    session.shutdown();
    Ok(())
}

async fn cmd_new(config: &Config, message: &str) -> Result<()> {
    let mut session = open_session(config)?;
    session.create_conversation(message);
    session.settle().await;
    print_notices(&mut session);

    let Some(id) = session.active_conversation().map(str::to_string) else {
        bail!("conversation was not created");
    };
    println!("Created conversation {}", id);
    for message in session.store().messages() {
        print_message(message);
    }
    session.shutdown();
    Ok(())
}

async fn cmd_send(
    config: &Config,
    conversation_id: &str,
    message: &str,
    docs: &[String],
) -> Result<()> {
    let mut session = open_session(config)?;
    load(&mut session, conversation_id).await?;

    for doc in docs {
        if !session.toggle_grounding(doc) {
            bail!("document {} is not ready for grounding", doc);
        }
    }

    let before: HashSet<String> = session
        .store()
        .messages()
        .iter()
        .map(|m| m.id.clone())
        .collect();

    if session.send_message(message).is_none() {
        bail!("nothing to send");
    }
    session.settle().await;
    let notices = session.take_new_notices();
    for notice in &notices {
        eprintln!("{}", notice);
    }
    if notices.iter().any(|n| n.level == NoticeLevel::Error) {
        bail!("message was not sent");
    }

    for message in session.store().messages() {
        if !before.contains(&message.id) {
            print_message(message);
        }
    }
    session.shutdown();
    Ok(())
}

async fn cmd_delete(config: &Config, conversation_id: &str) -> Result<()> {
    let api = HttpApi::new(&config.server).context("invalid server configuration")?;
    api.delete_conversation(conversation_id)
        .await
        .with_context(|| format!("failed to delete conversation {}", conversation_id))?;
    println!("Deleted conversation {}", conversation_id);
    Ok(())
}

async fn cmd_upload(
    config: &Config,
    conversation_id: &str,
    paths: &[PathBuf],
    wait: bool,
) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = UploadFile::from_path(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        files.push(file);
    }

    // Reject what the gate refuses before talking to the server
    let gate = UploadGate::new(&config.upload);
    let plan = gate.plan(files);
    for filename in &plan.rejected {
        eprintln!("Unsupported file type: {}", filename);
    }
    for filename in &plan.duplicates {
        eprintln!("Skipped duplicate file: {}", filename);
    }
    if plan.accepted.is_empty() {
        bail!("no files to upload");
    }

    let mut session = open_session(config)?;
    load(&mut session, conversation_id).await?;
    let started = session.upload(plan.accepted);
    session.settle().await;
    print_notices(&mut session);

    let processing = session.processing_ids();
    println!("Uploaded {} file(s), {} processing", started, processing.len());

    if wait && !processing.is_empty() {
        if let Err(e) = session.connect() {
            tracing::warn!(error = %e, "Realtime unavailable, relying on polling");
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .context("invalid progress template")?,
        );
        pb.enable_steady_tick(Duration::from_millis(120));

        while !session.processing_ids().is_empty() {
            pb.set_message(format!(
                "waiting for {} document(s)",
                session.processing_ids().len()
            ));
            if !session.step().await {
                break;
            }
        }
        pb.finish_and_clear();

        for doc in session.store().documents() {
            if doc.state() == DocumentState::Ready {
                println!("  {}  ready  {}", doc.id, doc.filename);
            }
        }
    }

    session.shutdown();
    Ok(())
}

async fn cmd_watch(config: &Config, conversation_id: &str) -> Result<()> {
    let mut session = open_session(config)?;
    session.connect().context("failed to start realtime connection")?;
    load(&mut session, conversation_id).await?;

    let mut shown: HashSet<String> = HashSet::new();
    for message in session.store().messages() {
        print_message(message);
        shown.insert(message.id.clone());
    }

    println!();
    println!(
        "Watching {}. Type a message and press Enter to send; Ctrl+C to stop.",
        conversation_id
    );

    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        while stdin.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
            if line_tx.send(line.trim_end().to_string()).is_err() {
                break;
            }
            line.clear();
        }
    });

    let mut stdin_open = true;
    let mut doc_states: Vec<(String, DocumentState)> = Vec::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                break;
            }
            line = line_rx.recv(), if stdin_open => {
                match line {
                    Some(text) => {
                        session.send_message(&text);
                    }
                    None => stdin_open = false,
                }
            }
            stepped = session.step() => {
                if !stepped {
                    break;
                }
            }
        }

        for message in session.store().messages() {
            if !message.is_temporary() && shown.insert(message.id.clone()) {
                print_message(message);
            }
        }

        let states: Vec<(String, DocumentState)> = session
            .store()
            .documents()
            .iter()
            .map(|d| (d.id.clone(), d.state()))
            .collect();
        if states != doc_states {
            for (id, state) in &states {
                if !doc_states.contains(&(id.clone(), *state)) {
                    let timestamp = chrono::Local::now().format("%H:%M:%S");
                    println!("[{}] document {} is {}", timestamp, id, state);
                }
            }
            doc_states = states;
        }

        print_notices(&mut session);
    }

    session.shutdown();
    tracing::info!(conversation_id = %conversation_id, "Watch stopped");
    Ok(())
}

fn print_message(message: &Message) {
    let timestamp = message
        .created_at
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S");
    println!("[{}] {}: {}", timestamp, message.role, message.content);
}

fn print_notices(session: &mut Session) {
    for notice in session.take_new_notices() {
        eprintln!("{}", notice);
    }
}
