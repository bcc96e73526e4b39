//! `mambo` — terminal client for the Mambo support chat.
//!
//! Joins one conversation room, prints the room's history and live
//! messages, and sends lines typed on stdin. Slash commands: `/reconnect`,
//! `/dismiss`, `/quit`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tracing::warn;
use tracing_subscriber::prelude::*;

use chat_transport::{ChatClient, ClientOptions, ChatMessage, HttpHistoryProvider, WsChannelFactory};

mod config;
mod idle;

use crate::config::FileConfig;
use crate::idle::{AssistNotification, IdleMonitor};

#[derive(Parser, Debug)]
#[command(name = "mambo", version, about = "Terminal client for the Mambo support chat")]
struct Cli {
    /// Conversation room to join.
    room: String,

    /// HTTP base URL of the chat backend (overrides config).
    #[arg(long)]
    server: Option<String>,

    /// Display name for outbound messages (overrides config).
    #[arg(long)]
    user: Option<String>,

    /// Directory holding config.toml (defaults to the current directory).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Disable the idle-assistance monitor.
    #[arg(long)]
    no_idle: bool,

    /// Verbose logging (RUST_LOG overrides this).
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug {
        "mambo=debug,chat_transport=debug,info"
    } else {
        "mambo=info,chat_transport=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let data_dir = cli.data_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut config: FileConfig = config::load_config(&data_dir)
        .extract()
        .context("invalid configuration")?;
    if let Some(server) = cli.server {
        config.server.base_url = server;
        config.server.ws_url = None;
    }
    if let Some(user) = cli.user {
        config.chat.display_name = user;
    }

    run(cli.room, config, !cli.no_idle).await
}

async fn run(room: String, config: FileConfig, idle_enabled: bool) -> Result<()> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to build http client")?;

    let factory = Arc::new(WsChannelFactory::new(config.server.ws_base_url()));
    let history = Arc::new(HttpHistoryProvider::new(
        http.clone(),
        config.server.base_url.clone(),
    ));
    let options = ClientOptions {
        policy: config.reconnect.to_policy(),
        local_echo: config.chat.local_echo,
    };

    let client = ChatClient::start(&room, &config.chat.display_name, factory, history, options)
        .context("failed to start chat client")?;

    let monitor = (idle_enabled && config.idle.enabled).then(|| {
        IdleMonitor::start(
            http.clone(),
            config.server.base_url.clone(),
            Duration::from_secs(config.idle.check_interval_secs),
        )
    });

    println!("joined room '{room}' as {}", config.chat.display_name);

    let mut updates = client.updates();
    let mut assist = monitor.as_ref().map(|m| m.notifications());
    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0usize;
    let mut last_status = String::new();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let update = updates.borrow_and_update().clone();
                if update.status != last_status {
                    println!("* {}", update.status);
                    last_status = update.status.clone();
                }
                for msg in &update.messages[printed..] {
                    print_message(msg);
                }
                printed = update.messages.len();
            }

            changed = async { assist.as_mut().expect("guarded by is_some").changed().await },
                if assist.is_some() =>
            {
                match changed {
                    Ok(()) => {
                        let note = assist
                            .as_mut()
                            .expect("guarded by is_some")
                            .borrow_and_update()
                            .clone();
                        print_assistance(note.as_ref());
                    }
                    Err(_) => assist = None,
                }
            }

            line = stdin.next_line() => {
                let Some(line) = line.context("stdin read failed")? else {
                    break;
                };
                let line = line.trim();
                match line {
                    "" => {}
                    "/quit" => break,
                    "/reconnect" => client.reconnect_now().await,
                    "/dismiss" => {
                        if let Some(monitor) = &monitor {
                            monitor.dismiss().await;
                        }
                    }
                    text => {
                        if let Some(monitor) = &monitor {
                            monitor.track_activity();
                        }
                        if let Err(err) = client.send_message(text).await {
                            warn!(error = %err, "message not sent");
                            println!("* not sent: {err}");
                        }
                    }
                }
            }
        }
    }

    if let Some(monitor) = monitor {
        monitor.stop().await;
    }
    client.stop().await;
    println!("left '{room}'");
    Ok(())
}

fn print_message(msg: &ChatMessage) {
    let tag = if msg.is_bot { "bot" } else { "user" };
    println!(
        "[{}] {} ({tag}): {}",
        msg.timestamp.format("%H:%M:%S"),
        msg.user,
        msg.content
    );
}

fn print_assistance(note: Option<&AssistNotification>) {
    match note {
        Some(note) => {
            println!("* {}", note.message);
            if !note.subtitle.is_empty() {
                println!("  {}", note.subtitle);
            }
            for option in &note.assistance_options {
                println!("  - {option}");
            }
            println!("  (/dismiss to hide)");
        }
        None => println!("* assistance prompt cleared"),
    }
}
