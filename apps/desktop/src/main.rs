use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use client_core::{ClientSettings, HttpTodoApi, ListEvent, MutationCoordinator};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod command;
mod render;

use command::{parse_command, Command, HELP};
use render::render;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let settings = ClientSettings::new(&args.server_url, Duration::from_millis(args.timeout_ms))?;
    let api = HttpTodoApi::new(&settings)?;
    let coordinator = MutationCoordinator::new(Arc::new(api));
    info!(server_url = %settings.server_url, "desktop client starting");

    let events = coordinator.subscribe();
    let listener = tokio::spawn(print_events(Arc::clone(&coordinator), events));
    println!("{HELP}");
    tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move {
            if let Err(err) = coordinator.load().await {
                debug!(error = %err, "initial load failed");
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => dispatch(&coordinator, command),
            Err(err) => println!("{err}"),
        }
    }

    listener.abort();
    Ok(())
}

/// Turns one user intent into a spawned coordinator call so slow requests
/// never block the prompt.
fn dispatch(coordinator: &Arc<MutationCoordinator>, command: Command) {
    let view = coordinator.view();
    match command {
        Command::Add(title) => {
            if !view.can_submit() {
                println!("still saving the previous item");
                return;
            }
            coordinator.set_draft(title);
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move {
                if let Err(err) = coordinator.submit_draft().await {
                    debug!(error = %err, "create settled with error");
                }
            });
        }
        Command::Toggle(index) => {
            let Some(todo) = view.items.items().get(index - 1).cloned() else {
                println!("no item {index}");
                return;
            };
            if !view.can_toggle(&todo) {
                println!("item {index} cannot be toggled right now");
                return;
            }
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move {
                if let Err(err) = coordinator.toggle_item(&todo.id).await {
                    debug!(todo_id = %todo.id, error = %err, "toggle settled with error");
                }
            });
        }
        Command::Remove(index) => {
            let Some(todo) = view.items.items().get(index - 1).cloned() else {
                println!("no item {index}");
                return;
            };
            if !view.can_delete(&todo) {
                println!("item {index} is already being deleted");
                return;
            }
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move {
                if let Err(err) = coordinator.delete(&todo.id).await {
                    debug!(todo_id = %todo.id, error = %err, "delete settled with error");
                }
            });
        }
        Command::List => println!("{}", render(&view)),
        Command::Refresh => {
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move {
                if let Ok(false) = coordinator.refresh().await {
                    debug!("refresh superseded by a newer mutation");
                }
            });
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

async fn print_events(
    coordinator: Arc<MutationCoordinator>,
    mut events: broadcast::Receiver<ListEvent>,
) {
    loop {
        match events.recv().await {
            Ok(ListEvent::CacheChanged | ListEvent::PendingChanged) => {
                println!("{}", render(&coordinator.view()));
            }
            Ok(ListEvent::MutationFailed {
                kind,
                todo_id,
                message,
            }) => match todo_id {
                Some(id) if !id.is_placeholder() => println!("{kind} of {id} failed: {message}"),
                _ => println!("{kind} failed: {message}"),
            },
            Ok(ListEvent::RefreshFailed { message }) => {
                println!("could not refresh: {message}");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event listener fell behind");
                println!("{}", render(&coordinator.view()));
            }
            Err(RecvError::Closed) => break,
        }
    }
}
