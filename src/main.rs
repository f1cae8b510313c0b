mod terminal;

use anyhow::Context;
use council::api::HttpBackend;
use council::config::Config;
use council::state::ConnectionState;
use council::store::{FileStore, KeyValueStore};
use council::types::Message;
use council::{Controller, ControllerError, ExchangeOutcome};
use std::sync::Arc;
use terminal::{Command, Progress};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

fn load_dotenv() {
    // A missing .env is fine; the process environment and defaults still apply
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        eprintln!("ignoring unreadable .env: {err}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let config = Config::from_env().context("invalid council configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_writer(std::io::stderr)
        .init();

    let store = match &config.state_dir {
        Some(dir) => FileStore::new(dir.clone()),
        None => FileStore::in_data_dir(),
    };
    tracing::debug!(dir = %store.dir().display(), "remembering selection");
    let store: Arc<dyn KeyValueStore> = Arc::new(store);
    let backend = Arc::new(HttpBackend::new(config.api_base.clone()));
    let controller = Arc::new(Controller::new(backend, store, config.retry));

    tokio::spawn(watch_progress(Arc::clone(&controller)));

    println!("Connecting to Council at {}...", config.api_base);
    report_bootstrap(&controller).await;
    println!("{}", terminal::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Empty => {}
            Command::Help => println!("{}", terminal::HELP),
            Command::Quit => break,
            Command::Retry => report_bootstrap(&controller).await,
            Command::List => {
                controller.refresh().await;
                println!("{}", terminal::registry(&controller.snapshot()));
            }
            Command::New => match controller.create().await {
                Ok(summary) => println!("Created {} ({})", summary.id, summary.display_title()),
                Err(err) => println!("Could not create a conversation: {err}"),
            },
            Command::Select(id) => match controller.select(&id).await {
                Ok(()) => print_transcript(&controller),
                Err(err) => println!("{err}"),
            },
            Command::Delete(id) => {
                let Some(summary) = controller
                    .snapshot()
                    .conversations
                    .iter()
                    .find(|summary| summary.id == id)
                    .cloned()
                else {
                    println!("{}", ControllerError::UnknownConversation(id));
                    continue;
                };
                println!("Delete \"{}\"? [y/N]", summary.display_title());
                let answer = lines.next_line().await?.unwrap_or_default();
                let confirmed = matches!(answer.trim(), "y" | "Y" | "yes");
                match controller.delete(&id, |_| confirmed).await {
                    Ok(true) => println!("{}", terminal::registry(&controller.snapshot())),
                    Ok(false) => println!("Kept {}", summary.display_title()),
                    Err(err) => println!("Could not delete: {err}"),
                }
            }
            Command::Send(content) => {
                let snapshot = controller.snapshot();
                let Some(conversation_id) = snapshot.selected_summary().map(|summary| summary.id.clone())
                else {
                    println!("No conversation selected. Use /new to start one.");
                    continue;
                };
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    match controller.send(&conversation_id, &content).await {
                        Ok(ExchangeOutcome::Completed) => {}
                        Ok(ExchangeOutcome::Errored(message)) => println!("Council error: {message}"),
                        Ok(ExchangeOutcome::Interrupted) => println!("The response was cut off."),
                        Ok(ExchangeOutcome::Abandoned) => {
                            tracing::debug!(conversation = %conversation_id, "stopped following response");
                        }
                        Err(err) => println!("Message not sent: {err}"),
                    }
                });
            }
        }
    }

    Ok(())
}

async fn report_bootstrap(controller: &Controller) {
    if controller.bootstrap().await {
        println!("{}", terminal::registry(&controller.snapshot()));
        print_transcript(controller);
    } else if controller.snapshot().connection == ConnectionState::Disconnected {
        println!("Could not reach the council backend. Use /retry to try again.");
    }
}

fn print_transcript(controller: &Controller) {
    let snapshot = controller.snapshot();
    let Some(active) = snapshot.active_for_selection() else {
        return;
    };
    for message in &active.messages {
        match &**message {
            Message::User(user) => println!("> {}", user.content),
            Message::Assistant(assistant) => {
                if let Some(stage3) = &assistant.stage3 {
                    println!("{}", terminal::final_answer(stage3));
                }
            }
        }
    }
}

async fn watch_progress(controller: Arc<Controller>) {
    let mut snapshots = controller.subscribe();
    let mut progress = Progress::default();
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        for line in progress.observe(&snapshot) {
            println!("{line}");
        }
    }
}
