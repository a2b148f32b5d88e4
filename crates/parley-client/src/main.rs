//! `parley` command-line client.

use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use parley_client::views::{last_activity_label, unread_badge};
use parley_client::{init_tracing, AppState, ClientConfig, ClientEvent};
use parley_shared::models::ChatLog;
use parley_shared::types::{RoomId, UserId};

/// Parley messaging client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Command-line client for the Parley messaging service")]
#[command(version)]
struct Args {
    #[arg(long, env = "PARLEY_LOGIN_ID", global = true)]
    login_id: Option<String>,

    #[arg(long, env = "PARLEY_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List chat rooms, unread first
    Rooms,
    /// List friends, online first
    Friends,
    /// List pending friend requests
    Requests,
    /// Accept a friend request
    Accept { friend_id: i64 },
    /// Decline a friend request
    Decline { friend_id: i64 },
    /// Search users by keyword
    Search { keyword: String },
    /// Send a friend request
    Add { user_id: i64 },
    /// Open (or create) the private room with a friend
    NewRoom { friend_user_id: i64 },
    /// Follow a room interactively; each stdin line is sent as a message
    Chat { room_id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = ClientConfig::from_env();
    info!(api = %config.api_url, socket = %config.socket_url, "Starting Parley client");
    let state = AppState::new(config)?;

    let (Some(login_id), Some(password)) = (args.login_id.as_deref(), args.password.as_deref())
    else {
        bail!("--login-id and --password (or PARLEY_LOGIN_ID / PARLEY_PASSWORD) are required");
    };

    let lifecycle = matches!(args.command, Cmd::Chat { .. }).then(|| state.start_lifecycle());
    state.session.login(login_id, password).await?;

    let outcome = run(&state, args.command).await;

    state.session.logout().await;
    if let Some(task) = lifecycle {
        task.abort();
    }
    outcome
}

async fn run(state: &AppState, command: Cmd) -> anyhow::Result<()> {
    match command {
        Cmd::Rooms => {
            let mut view = state.room_list_view();
            view.load().await?;
            for room in view.sorted() {
                println!(
                    "{:>6}  {:<24} {:>4}  {:<10} {}",
                    room.id,
                    room.name,
                    unread_badge(room.unread_ct).unwrap_or_default(),
                    last_activity_label(room).unwrap_or_default(),
                    room.last_message.as_deref().unwrap_or(""),
                );
            }
        }
        Cmd::Friends => {
            let mut view = state.friends_view();
            view.load().await?;
            for friend in view.friends() {
                let presence = if friend.is_online { "online" } else { "offline" };
                println!(
                    "{:>6}  {:<24} {:<8} {}",
                    friend.id, friend.nick_name, presence, friend.description
                );
            }
        }
        Cmd::Requests => {
            let mut view = state.friends_view();
            view.load_requests().await?;
            for request in view.requests() {
                println!(
                    "{:>6}  {:<24} user {}",
                    request.friend_id, request.nick_name, request.requested_user_id
                );
            }
        }
        Cmd::Accept { friend_id } => {
            state.friends_view().accept(friend_id).await?;
            println!("Accepted request {friend_id}");
        }
        Cmd::Decline { friend_id } => {
            state.friends_view().decline(friend_id).await?;
            println!("Declined request {friend_id}");
        }
        Cmd::Search { keyword } => {
            let mut view = state.friends_view();
            view.search(&keyword).await?;
            for found in view.search_results() {
                let status = found
                    .requested
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_default();
                println!("{:>6}  {:<24} {}", found.user_id, found.nick_name, status);
            }
        }
        Cmd::Add { user_id } => {
            state.friends_view().send_request(UserId(user_id)).await?;
            println!("Friend request sent to {user_id}");
        }
        Cmd::NewRoom { friend_user_id } => {
            let mut view = state.room_list_view();
            match view.create_private(UserId(friend_user_id)).await? {
                Some(room) => println!("Room {} ({})", room.id, room.name),
                None => println!("Room created"),
            }
        }
        Cmd::Chat { room_id } => chat(state, RoomId(room_id)).await?,
    }
    Ok(())
}

async fn chat(state: &AppState, room_id: RoomId) -> anyhow::Result<()> {
    let wait = state.config.handshake_timeout + Duration::from_secs(1);
    tokio::time::timeout(wait, async {
        while !state.realtime.is_connected() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .context("Could not connect to the message broker")?;

    let mut events = state.events.subscribe();
    let mut view = state.open_room(room_id).await?;
    for log in view.messages() {
        print_log(&log);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = view.send(&line).await {
                    eprintln!("! {e}");
                }
            }
            event = events.recv() => match event {
                Ok(ClientEvent::NewMessage { room_id: room, log }) if room == room_id => {
                    print_log(&log)
                }
                Ok(ClientEvent::ConnectionChanged { state: connection }) => {
                    eprintln!("* connection {connection}")
                }
                Ok(ClientEvent::SessionExpired) => bail!("Session expired"),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => eprintln!("* {missed} updates skipped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    view.close();
    Ok(())
}

fn print_log(log: &ChatLog) {
    println!(
        "[{}] {}: {}{}",
        log.wrote_time.as_deref().unwrap_or("-"),
        log.write_user_nick_name,
        log.content,
        match log.unread_count {
            0 => String::new(),
            n => format!(" ({n})"),
        }
    );
}
