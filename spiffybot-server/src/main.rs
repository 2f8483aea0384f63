use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use spiffybot_common::models::ChannelIdentity;
use spiffybot_common::traits::{ChatApi, TokenProvider};
use spiffybot_core::config::ConfigDir;
use spiffybot_core::platforms::twitch_eventsub::{EventKind, EventSubSession};
use spiffybot_core::platforms::twitch_helix::{AppTokenProvider, HelixClient, UserTokenAuth};
use spiffybot_core::services::{CommandDispatcher, EventAnnouncer};
use spiffybot_core::tasks::AnnouncementScheduler;

#[derive(Parser, Debug, Clone)]
#[command(name = "spiffybot")]
#[command(author, version, about = "SpiffyBot - Twitch EventSub chat bot")]
struct Args {
    /// Directory holding commands.json, events.json, announcements.json and modtools.json
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Directory holding broadcaster.json and bot.json user tokens
    #[arg(long)]
    tokens_dir: Option<PathBuf>,

    #[arg(long)]
    broadcaster_id: String,

    #[arg(long)]
    bot_user_id: String,

    /// Moderator used for the follow subscription; defaults to the bot
    #[arg(long)]
    moderator_user_id: Option<String>,

    /// IANA zone for !time and !xmas
    #[arg(long, default_value = "Europe/London")]
    time_zone: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spiffybot")
}

fn load_user_token(client_id: &str, secret: &str, path: PathBuf) -> anyhow::Result<Arc<dyn TokenProvider>> {
    let auth = UserTokenAuth::load(client_id, secret, &path)
        .with_context(|| format!("loading user token {}", path.display()))?;
    Ok(Arc::new(auth))
}

/// Hands each announceable event of `kinds` to the announcer on a detached task.
fn route_to_announcer(session: &EventSubSession, kinds: &[EventKind], announcer: &EventAnnouncer) {
    for &kind in kinds {
        let announcer = announcer.clone();
        session.on_event(kind, move |ev| {
            let announcer = announcer.clone();
            let ev = ev.clone();
            tokio::spawn(async move {
                announcer.handle_event(&ev).await;
            });
            Ok(())
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let client_id = std::env::var("TWITCH_CLIENT_ID").context("TWITCH_CLIENT_ID is not set")?;
    let client_secret = std::env::var("TWITCH_CLIENT_SECRET").context("TWITCH_CLIENT_SECRET is not set")?;
    let time_zone: Tz = args
        .time_zone
        .parse()
        .map_err(|_| anyhow!("unknown time zone '{}'", args.time_zone))?;

    let config_dir = args.config_dir.clone().unwrap_or_else(default_config_dir);
    let tokens_dir = args.tokens_dir.clone().unwrap_or_else(|| config_dir.join("tokens"));
    let cfg = ConfigDir::new(&config_dir).load_all().await?;

    info!(
        "SpiffyBot starting. broadcaster={}, bot={}, config={}",
        args.broadcaster_id,
        args.bot_user_id,
        config_dir.display()
    );

    let broadcaster_auth = load_user_token(&client_id, &client_secret, tokens_dir.join("broadcaster.json"))?;
    let bot_auth = load_user_token(&client_id, &client_secret, tokens_dir.join("bot.json"))?;
    let app_auth: Arc<dyn TokenProvider> = Arc::new(AppTokenProvider::new(&client_id, &client_secret));

    let helix: Arc<dyn ChatApi> = Arc::new(
        HelixClient::new(broadcaster_auth.clone(), app_auth).with_moderator_auth(bot_auth.clone()),
    );
    let channel = ChannelIdentity::new(&args.broadcaster_id, &args.bot_user_id);
    let moderator_id = args
        .moderator_user_id
        .clone()
        .unwrap_or_else(|| args.bot_user_id.clone());

    let dispatcher = Arc::new(
        CommandDispatcher::new(helix.clone(), channel.clone(), cfg.commands)
            .with_time_zone(time_zone)
            .with_modtools(cfg.modtools),
    );
    let announcer = EventAnnouncer::new(helix.clone(), channel.clone(), cfg.events);
    let scheduler = Arc::new(AnnouncementScheduler::new(helix.clone(), channel.clone(), cfg.announcements));

    let bot_session = EventSubSession::new("bot", bot_auth);
    let broadcaster_session = EventSubSession::new("broadcaster", broadcaster_auth);

    {
        let dispatcher = dispatcher.clone();
        let scheduler = scheduler.clone();
        bot_session.on_chat_message(move |msg| {
            scheduler.note_chat_activity();
            let dispatcher = dispatcher.clone();
            let msg = msg.clone();
            tokio::spawn(async move {
                dispatcher.handle_chat_message(&msg).await;
            });
            Ok(())
        });
    }
    route_to_announcer(&bot_session, &[EventKind::Follow], &announcer);
    route_to_announcer(
        &broadcaster_session,
        &[
            EventKind::Subscribe,
            EventKind::SubscriptionMessage,
            EventKind::Cheer,
            EventKind::Raid,
            EventKind::Redemption,
        ],
        &announcer,
    );

    bot_session.connect().await.context("connecting bot EventSub session")?;
    broadcaster_session
        .connect()
        .await
        .context("connecting broadcaster EventSub session")?;

    if let Err(e) = bot_session
        .ensure_bot_subscriptions(&args.broadcaster_id, &moderator_id, &args.bot_user_id)
        .await
    {
        error!("Bot subscriptions incomplete: {}", e);
    }
    if let Err(e) = broadcaster_session
        .ensure_broadcaster_subscriptions(&args.broadcaster_id)
        .await
    {
        error!("Broadcaster subscriptions incomplete: {}", e);
    }

    scheduler.start();
    info!("SpiffyBot running with {} command(s). Ctrl-C to stop.", dispatcher.command_count());

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Ctrl-C received; shutting down...");

    scheduler.stop().await;
    bot_session.shutdown().await;
    broadcaster_session.shutdown().await;

    info!("Main finished. Goodbye!");
    Ok(())
}
