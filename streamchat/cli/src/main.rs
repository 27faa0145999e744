//! Streamchat - Command-Line Chat Client
//!
//! Sends messages to a streaming chat backend and prints the reply as it
//! arrives.
//!
//! # Usage
//!
//! ```bash
//! # One message in a new conversation
//! streamchat send "What is a monad?"
//!
//! # Continue an existing conversation
//! streamchat send --session 3f2a... "And a functor?"
//!
//! # Interactive
//! streamchat repl --session 3f2a...
//!
//! # Verbose logging
//! RUST_LOG=debug streamchat send "hi"
//! ```
//!
//! # Environment Variables
//!
//! - `STREAMCHAT_BASE_URL`: Backend address (default: http://localhost:8000)
//! - `STREAMCHAT_CONFIG`: Configuration file path
//! - `STREAMCHAT_TOKEN`: Bearer token
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! Without a token, `$XDG_CONFIG_HOME/streamchat/token` is read if present.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use streamchat_core::config::load_config_from_path;
use streamchat_core::{
    load_config, ChatEvent, ChatSynchronizer, ChatTransport, ClientConfig, ConversationId,
    ConversationRegistry, ConversationStore, CredentialProvider, ExchangeOutcome,
    ExchangeReport, HttpTransport, MessageRole, StaticCredentials, TokenFile,
};

/// Streamchat - talk to a streaming chat backend from the terminal
#[derive(Parser, Debug)]
#[command(name = "streamchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend address
    #[arg(short = 'u', long, env = "STREAMCHAT_BASE_URL", value_name = "URL")]
    base_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "STREAMCHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bearer token
    #[arg(short = 't', long, env = "STREAMCHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message and print the reply
    Send {
        /// Conversation ID (a new one is created if omitted)
        #[arg(short = 's', long)]
        session: Option<String>,

        /// Message text
        message: String,
    },

    /// Read messages from stdin, one per line
    Repl {
        /// Conversation ID (a new one is created if omitted)
        #[arg(short = 's', long)]
        session: Option<String>,
    },
}

type Synchronizer = ChatSynchronizer<HttpTransport, ConversationStore>;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so replies on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("streamchat=info".parse()?)
                .add_directive("streamchat_core=warn".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;
    debug!(url = %config.stream_url(), "Using chat endpoint");

    let credentials = resolve_credentials(args.token.clone());
    let transport = HttpTransport::new(&config).context("Failed to build HTTP client")?;
    let store = Arc::new(ConversationStore::new());
    let (event_tx, mut events) = mpsc::channel(config.event_buffer);

    let sync = ChatSynchronizer::new(Arc::new(transport), Arc::clone(&store), credentials)
        .with_config(&config)
        .with_events(event_tx);
    let mut printer = ReplyPrinter::new(Arc::clone(&store), std::io::stdout());

    match args.command {
        Command::Send { session, message } => {
            let id = select_session(&store, session);
            info!(conversation_id = %id, "Sending message");

            let Some(report) = run_exchange(&sync, &mut events, &mut printer, &message).await?
            else {
                anyhow::bail!("Message was not sent");
            };
            if let ExchangeOutcome::Failed(reason) = report.outcome {
                anyhow::bail!("Exchange failed: {reason}");
            }
        }
        Command::Repl { session } => {
            let id = select_session(&store, session);
            eprintln!("conversation {id} (/history, /quit)");
            repl(&sync, &store, &mut events, &mut printer).await?;
        }
    }

    Ok(())
}

/// Config file (explicit or default), then environment, then `--base-url`
fn resolve_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => {
            let (config, source) = load_config().context("Failed to load config")?;
            debug!(source = ?source, "Configuration loaded");
            config
        }
    };

    if let Some(url) = &args.base_url {
        config.base_url.clone_from(url);
        config
            .validate()
            .with_context(|| format!("Invalid --base-url: {url}"))?;
    }
    Ok(config)
}

fn resolve_credentials(token: Option<String>) -> Arc<dyn CredentialProvider> {
    if let Some(token) = token {
        return Arc::new(StaticCredentials::new(token));
    }
    match TokenFile::default_location() {
        Some(file) if file.path().exists() => {
            debug!(path = ?file.path(), "Reading token file");
            Arc::new(file)
        }
        _ => {
            warn!("No token configured; requests will fail as not authenticated");
            Arc::new(StaticCredentials::unauthenticated())
        }
    }
}

fn select_session(store: &ConversationStore, session: Option<String>) -> ConversationId {
    let id = session.map_or_else(ConversationId::new, ConversationId::from);
    store.select(id.clone());
    id
}

/// Prints an agent reply as it grows
///
/// Events only signal that the reply changed; the text itself is read from
/// the conversation store, so a dropped event never drops text.
struct ReplyPrinter<W: Write> {
    store: Arc<ConversationStore>,
    /// Bytes of the current reply already written
    printed: usize,
    out: W,
}

impl<W: Write> ReplyPrinter<W> {
    fn new(store: Arc<ConversationStore>, out: W) -> Self {
        Self {
            store,
            printed: 0,
            out,
        }
    }

    /// Start tracking a new reply
    fn reset(&mut self) {
        self.printed = 0;
    }

    /// Write whatever the reply gained since the last call
    fn catch_up(&mut self, conversation_id: &ConversationId) -> std::io::Result<()> {
        let Some(tail) = self.store.tail(conversation_id) else {
            return Ok(());
        };
        if tail.role() != MessageRole::Agent {
            return Ok(());
        }

        let content = tail.content();
        match content.get(self.printed..) {
            Some(new) if !new.is_empty() => {
                self.out.write_all(new.as_bytes())?;
                self.out.flush()?;
                self.printed = content.len();
            }
            _ => {}
        }
        Ok(())
    }

    /// Write the rest of the reply and end the line
    fn finish(&mut self, conversation_id: &ConversationId) -> std::io::Result<()> {
        self.catch_up(conversation_id)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// Run one exchange, printing the reply until it finishes
///
/// `None` if the submission was ignored.
async fn run_exchange<T, W>(
    sync: &ChatSynchronizer<T, ConversationStore>,
    events: &mut mpsc::Receiver<ChatEvent>,
    printer: &mut ReplyPrinter<W>,
    input: &str,
) -> Result<Option<ExchangeReport>>
where
    T: ChatTransport + 'static,
    W: Write,
{
    printer.reset();
    let mut handle = match sync.spawn_submit(input) {
        Ok(handle) => handle,
        Err(reason) => {
            warn!(reason = reason.description(), "Message not sent");
            return Ok(None);
        }
    };

    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                ChatEvent::ExchangeStarted { message_id, .. } => {
                    debug!(message_id = %message_id, "Reply started");
                }
                ChatEvent::Token { conversation_id, .. }
                | ChatEvent::StreamEnd { conversation_id, .. }
                | ChatEvent::StreamError { conversation_id, .. } => {
                    printer.catch_up(&conversation_id)?;
                }
            },
            joined = &mut handle => {
                let report = joined.context("Exchange task panicked")?;
                printer.finish(&report.conversation_id)?;
                while events.try_recv().is_ok() {}
                return Ok(Some(report));
            }
            _ = tokio::signal::ctrl_c() => {
                anyhow::bail!("Interrupted");
            }
        }
    }
}

async fn repl(
    sync: &Synchronizer,
    store: &ConversationStore,
    events: &mut mpsc::Receiver<ChatEvent>,
    printer: &mut ReplyPrinter<std::io::Stdout>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("> ");
        std::io::stderr().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/history" => print_history(store),
            input => {
                if let Some(report) = run_exchange(sync, events, printer, input).await? {
                    debug!(
                        tokens = report.token_count,
                        elapsed_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
                        "Reply finished"
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_history(store: &ConversationStore) {
    let Some(id) = store.selected() else {
        return;
    };
    for message in store.messages(&id) {
        let who = match message.role() {
            MessageRole::User => "you",
            MessageRole::Agent => "agent",
        };
        println!("{who}: {}", message.content());
    }
}
