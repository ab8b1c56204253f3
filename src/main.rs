use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use oxichat::application::{ChatSession, StoreHandle};
use oxichat::domain::entities::{ChannelId, ChatSnapshot, UserIdentity};
use oxichat::domain::errors::ChatError;
use oxichat::domain::ports::TransportPort;
use oxichat::infrastructure::{AppConfig, LoopbackTransport, WsTransport};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.effective_log_level().to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry().with(filter).init();
    }

    Ok(())
}

fn session_identity(config: &AppConfig) -> UserIdentity {
    let name = config
        .name
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "anonymous".to_string());
    let avatar = config.avatar.clone().unwrap_or_else(|| "default.png".to_string());
    UserIdentity::new(name, avatar)
}

async fn connect(config: &AppConfig) -> Result<(Arc<dyn TransportPort>, ChatSnapshot)> {
    if let Some(url) = &config.server {
        info!(url = %url, "Connecting to chat server");
        let (transport, snapshot) = WsTransport::connect(url).await?;
        Ok((Arc::new(transport), snapshot))
    } else {
        info!("No server configured, starting loopback session");
        let transport = LoopbackTransport::new().with_channel("random");
        let snapshot = transport.snapshot(session_identity(config));
        Ok((Arc::new(transport), snapshot))
    }
}

/// Tracks what the feed printer has already written.
struct FeedCursor {
    channel: Option<ChannelId>,
    printed: usize,
}

impl FeedCursor {
    const fn new() -> Self {
        Self {
            channel: None,
            printed: 0,
        }
    }

    /// Prints messages the cursor has not seen yet, re-rendering the feed
    /// when the active channel changed.
    fn print_new(&mut self, store: &StoreHandle) {
        let Some(active) = store.active_channel_id() else {
            return;
        };

        let messages = store.messages_in(active);
        if self.channel != Some(active) {
            self.channel = Some(active);
            self.printed = 0;
            if let Some(channel) = store.channel(active) {
                println!("--- {} ---", channel.display_name());
            }
        }

        for message in messages.iter().skip(self.printed) {
            let marker = if message.is_pending() { "…" } else { " " };
            println!(
                "[{}]{marker}{}: {}",
                message.formatted_timestamp(),
                message.author().name(),
                message.text()
            );
        }
        self.printed = messages.len();
    }
}

fn print_help() {
    println!("commands: /channels, /join <channel>, /add <name>, /rename <id> <name>, /remove <id>, /quit");
    println!("anything else is sent to the active channel");
}

fn print_channels(store: &StoreHandle) {
    let active = store.active_channel_id();
    for channel in store.channels() {
        let marker = if Some(channel.id()) == active { "*" } else { " " };
        println!("{marker} {} {}", channel.id(), channel.display_name());
    }
}

fn resolve_channel(store: &StoreHandle, arg: &str) -> Option<ChannelId> {
    if let Ok(id) = arg.parse::<u64>() {
        let id = ChannelId(id);
        if store.has_channel(id) {
            return Some(id);
        }
    }
    store.channel_id_named(arg.trim_start_matches('#'))
}

fn report(result: Result<(), ChatError>) {
    if let Err(e) = result {
        println!("error: {e}");
    }
}

/// Handles one input line. Returns false when the session should end.
async fn handle_line(session: &ChatSession, line: &str) -> bool {
    let store = session.store();
    let actions = session.actions();

    match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
        ("/quit", _) => return false,
        ("/help", _) => print_help(),
        ("/channels", _) => print_channels(store),
        ("/join", arg) => match resolve_channel(store, arg) {
            Some(id) => report(actions.switch_active_channel(id)),
            None => println!("error: no channel named {arg}"),
        },
        ("/add", arg) => report(actions.create_channel(arg).await),
        ("/rename", arg) => match arg.split_once(' ') {
            Some((id, name)) => match resolve_channel(store, id) {
                Some(id) => report(actions.rename_channel(id, name.trim()).await),
                None => println!("error: no channel named {id}"),
            },
            None => println!("usage: /rename <id> <name>"),
        },
        ("/remove", arg) => match resolve_channel(store, arg) {
            Some(id) => report(actions.remove_channel(id).await),
            None => println!("error: no channel named {arg}"),
        },
        ("", _) => {}
        (command, _) if command.starts_with('/') => {
            println!("unknown command {command}");
            print_help();
        }
        _ => report(actions.send_message(line).await.map(|_| ())),
    }
    true
}

async fn run_repl(session: ChatSession) -> Result<()> {
    let store = session.store().clone();
    let mut changes = store.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut cursor = FeedCursor::new();

    print_help();
    print_channels(&store);
    cursor.print_new(&store);

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                cursor.print_new(&store);
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&session, line.trim()).await {
                    break;
                }
                cursor.print_new(&store);
            }
        }
    }

    session.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let mut config = AppConfig::parse();
    config.merge_with_file();

    init_logging(&config)?;

    info!(version = oxichat::VERSION, "Starting oxichat");

    let (transport, snapshot) = connect(&config).await?;
    let session = ChatSession::start(transport, &snapshot);

    run_repl(session).await
}
