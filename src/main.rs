use anyhow::{Context, Result};
use std::env;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use inboxnav::badge::{BadgeState, spawn_badge_poller};
use inboxnav::messages::local_now;
use inboxnav::retry::offers_retry;
use inboxnav::{Config, HttpInboxApi, InboxController};

fn setup_logging() {
    use std::fs::OpenOptions;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,inboxnav=debug"));

    // Try to create a log file in the config directory
    let log_file = Config::config_dir()
        .ok()
        .and_then(|dir| std::fs::create_dir_all(&dir).ok().map(|_| dir))
        .map(|dir| dir.join("inboxnav.log"))
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .ok()
        });

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        // Fallback to stderr if file logging fails
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"inboxnav - Headless inbox navigator

Usage: inboxnav [command] [route]

Commands:
    show [route]    Load a route once and print it (default)
    watch [route]   Keep the list fresh, polling the unread badge
    help            Show this help message

Routes are relative to the history root, e.g. inbox/, unread/group/2/,
id/72637/, mod/4/msg/10/.

Configuration file: ~/.config/inboxnav/config.toml
"#
    );
}

fn build_controller(config: &Config) -> Result<(InboxController<HttpInboxApi>, HttpInboxApi)> {
    let api = HttpInboxApi::new(&config.server, config.retry.policy())
        .context("Failed to build HTTP client")?;
    let controller = InboxController::new(api.clone(), config.groups(), config);
    Ok((controller, api))
}

fn print_view(controller: &InboxController<HttpInboxApi>) {
    println!("{}", controller.page_title());
    if let Some(e) = controller.last_error() {
        if offers_retry(e) {
            println!("! {} (retrying on next refresh)", e);
        } else {
            println!("! {}", e);
        }
    }

    if let Some(detail) = controller.detail() {
        let now = local_now();
        if let Some(message) = detail.moderated() {
            println!("Moderating message {} in {}", message.id, detail.thread().subject);
        }
        for message in detail.messages().items() {
            if message.scrunched() {
                continue;
            }
            let date = message.date(now).unwrap_or_default();
            if message.scrunch_toggle() {
                println!("  ... {} older messages", message.scrunch_length());
            }
            println!("  [{}] {} {}", message.id, message.sender.sender, date);
            if detail.is_expanded(message.id) {
                println!("      {}", message.text);
            }
        }
        return;
    }

    if let Some(empty) = controller.empty_state() {
        println!("{}\n{}", empty.header, empty.subhead);
        return;
    }

    let modifiers = controller.threads().modifiers();
    for thread in controller.threads().threads().items() {
        let marker = if thread.read { ' ' } else { '*' };
        println!(
            "{} {:>8}  {:<43} {}",
            marker,
            thread.id,
            thread.display_subject(),
            thread.date_formatted().unwrap_or_default()
        );
    }
    println!(
        "{}-{} of {}",
        modifiers.start,
        modifiers.end,
        modifiers.total_threads()
    );
}

async fn run_show(config: Config, route: &str) -> Result<()> {
    let (mut controller, _) = build_controller(&config)?;
    controller.handle_route(route).await?;
    controller.flush().await?;
    print_view(&controller);
    Ok(())
}

async fn run_watch(config: Config, route: &str) -> Result<()> {
    let (mut controller, api) = build_controller(&config)?;
    controller.handle_route(route).await?;
    controller.flush().await?;
    print_view(&controller);

    let mut badge = if config.badge.enabled {
        let handle = spawn_badge_poller(api, BadgeState::from_config(&config.badge));
        controller.attach_badge(handle.cmd_tx.clone());
        Some(handle)
    } else {
        None
    };

    loop {
        let deadline = controller.next_deadline();
        tokio::select! {
            event = async {
                match badge.as_mut() {
                    Some(handle) => handle.event_rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                let Some(event) = event else {
                    tracing::warn!("Badge poller stopped");
                    badge = None;
                    continue;
                };
                let generation = controller.threads().generation();
                if let Err(e) = controller.on_badge_event(event).await {
                    tracing::warn!("Refresh after badge update failed: {}", e);
                }
                if controller.threads().generation() != generation {
                    print_view(&controller);
                }
            }
            _ = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {
                if let Err(e) = controller.tick(tokio::time::Instant::now()).await {
                    tracing::warn!("List refresh failed: {}", e);
                }
                print_view(&controller);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    if let Some(handle) = badge {
        handle
            .cmd_tx
            .send(inboxnav::badge::BadgeCommand::Shutdown)
            .await
            .ok();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let route = args.get(2).map(|s| s.as_str()).unwrap_or("inbox/");

    match args.get(1).map(|s| s.as_str()) {
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("show") | None => {
            setup_logging();
            run_show(Config::load()?, route).await
        }
        Some("watch") => {
            setup_logging();
            run_watch(Config::load()?, route).await
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
    }
}
