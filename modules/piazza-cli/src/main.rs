use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use piazza_client::ApiClient;
use piazza_common::{Config, Visibility};
use piazza_feed::headless::{HeadlessChat, HeadlessDetail, HeadlessFeed, HeadlessMap, HeadlessRails};
use piazza_feed::{
    ChatPollingSession, FeedLoader, FollowingFeed, GeoMapProjector, MapLink,
    SelectionController, ViewerContext,
};

#[derive(Parser)]
#[command(name = "piazza", about = "Headless shell for the Piazza events view core")]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the home feed and print the rendered cards
    Feed,
    /// Load followed events grouped by organizer
    Following,
    /// Build map markers for the current event set
    Map {
        /// Also layer in private events from followed organizers
        #[arg(long)]
        include_following: bool,
    },
    /// Open an event's chat room and follow it for a few poll ticks
    Chat {
        event_id: String,
        /// Post a message once the room is open
        #[arg(long)]
        send: Option<String>,
        /// Poll ticks to wait before printing
        #[arg(long, default_value_t = 0)]
        ticks: u32,
    },
    /// Join an event from the following page
    Join { event_id: String },
    /// Re-select an event by id, as when navigating back to the map
    Restore { event_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("piazza=info".parse()?))
        .with_writer(std::io::stderr);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    let config = Config::from_env()?;
    config.log_redacted();

    let api = Arc::new(ApiClient::new(&config.api_base_url, config.api_token.as_deref())?);
    let ctx = match &config.user_id {
        Some(user_id) => ViewerContext::for_user(user_id.clone()),
        None => ViewerContext::anonymous(),
    };

    match cli.command {
        Command::Feed => {
            let surface = HeadlessMap::default();
            let map = Arc::new(Mutex::new(GeoMapProjector::new(surface.clone(), config.map.clone())));
            let loader = FeedLoader::new(api, HeadlessFeed::default(), ctx, config.chat.notice_ttl)
                .with_map(map);
            let outcome = loader.load_events().await;
            print_json(&json!({
                "outcome": outcome,
                "feed": loader.sink().snapshot(),
                "map": surface.snapshot(),
            }))?;
        }

        Command::Following => {
            let feed = FollowingFeed::new(
                api,
                HeadlessRails::default(),
                ctx,
                config.banners.clone(),
                config.chat.notice_ttl,
            );
            feed.load().await;
            print_json(&feed.sink().snapshot())?;
        }

        Command::Map { include_following } => {
            let surface = HeadlessMap::default();
            let mut projector = GeoMapProjector::new(surface.clone(), config.map.clone());
            let events = api.list_events().await?;
            let placed = projector.update_from_events(&events);
            let mut added = 0;
            if include_following {
                let private: Vec<_> = api
                    .list_following_events()
                    .await?
                    .into_iter()
                    .filter(|e| e.visibility == Visibility::Private)
                    .collect();
                added = projector.add_private_events_if_missing(&private);
            }
            info!(placed, added, "Map built");
            print_json(&surface.snapshot())?;
        }

        Command::Chat {
            event_id,
            send,
            ticks,
        } => {
            let title = api.get_event(&event_id).await.ok().map(|e| e.display_title().to_string());
            let chat = ChatPollingSession::new(api, HeadlessChat::default(), config.chat.clone());
            let opened = chat.open_for_event(&event_id, title.as_deref()).await;
            let sent = match send {
                Some(text) => Some(chat.send(&text).await),
                None => None,
            };
            for _ in 0..ticks {
                tokio::time::sleep(config.chat.poll_interval).await;
            }
            print_json(&json!({
                "opened": opened,
                "sent": sent,
                "phase": chat.phase(),
                "panel": chat.panel().snapshot(),
            }))?;
            chat.stop();
        }

        Command::Join { event_id } => {
            let feed = FollowingFeed::new(
                api,
                HeadlessRails::default(),
                ctx,
                config.banners.clone(),
                config.chat.notice_ttl,
            );
            feed.load().await;
            let joined = feed.join(&event_id).await;
            print_json(&json!({
                "joined": joined,
                "rails": feed.sink().snapshot(),
            }))?;
        }

        Command::Restore { event_id } => {
            let surface = HeadlessMap::default();
            let map: Arc<dyn MapLink> = Arc::new(Mutex::new(GeoMapProjector::new(
                surface.clone(),
                config.map.clone(),
            )));
            let loader = FeedLoader::new(api.clone(), HeadlessFeed::default(), ctx.clone(), config.chat.notice_ttl)
                .with_map(map.clone());
            loader.load_events().await;

            let selection = SelectionController::new(
                api,
                HeadlessDetail::default(),
                HeadlessChat::default(),
                config.chat.clone(),
                ctx,
            )
            .with_map(map);
            let restored = selection.restore(Some(&event_id)).await;
            print_json(&json!({
                "restored": restored,
                "detail": selection.detail().snapshot(),
                "chat": selection.chat().panel().snapshot(),
                "map": surface.snapshot(),
            }))?;
            selection.stop();
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
