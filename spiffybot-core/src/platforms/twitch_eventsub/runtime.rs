// twitch_eventsub/runtime.rs

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqwest::Client as ReqwestClient;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use spiffybot_common::traits::TokenProvider;

use crate::Error;
use super::events::{
    decode_notification, ChatMessage, CheerEvent, EventKind, FollowEvent, InboundEvent, RaidEvent,
    RedemptionEvent, SubscribeEvent, SubscriptionMessageEvent,
};
use super::handlers::{EventCallback, EventHandlers};
use super::subscriptions::{bot_subscriptions, broadcaster_subscriptions, SubscriptionSpec};

pub const DEFAULT_EVENTSUB_URL: &str = "wss://eventsub.wss.twitch.tv/ws";
pub const DEFAULT_HELIX_BASE: &str = "https://api.twitch.tv/helix";

/// How long `ensure_subscriptions` waits for `session_welcome`.
pub const DEFAULT_WELCOME_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `shutdown` gives the receive loop before closing the socket anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// State shared between the session handle and its receive task.
struct SessionShared {
    tag: String,
    handlers: EventHandlers,
    session_tx: watch::Sender<Option<String>>,
}

struct RunningLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    sink: SplitSink<WsStream, Message>,
}

/// One EventSub WebSocket connection for one credential identity.
///
/// The session id from `session_welcome` is required before any subscription
/// can be created. There is no auto-reconnect: once the socket drops, the
/// session id is cleared and the owner decides what to do.
pub struct EventSubSession {
    endpoint: String,
    helix_base: String,
    welcome_timeout: Duration,
    http: ReqwestClient,
    auth: Arc<dyn TokenProvider>,
    shared: Arc<SessionShared>,
    running: Mutex<Option<RunningLoop>>,
}

macro_rules! typed_subscriber {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name<F>(&self, f: F)
        where
            F: Fn(&$ty) -> Result<(), Error> + Send + Sync + 'static,
        {
            self.on_event(EventKind::$variant, move |ev| match ev {
                InboundEvent::$variant(inner) => f(inner),
                _ => Ok(()),
            });
        }
    };
}

impl EventSubSession {
    /// `tag` only shows up in logs, e.g. "bot" or "broadcaster".
    pub fn new(tag: &str, auth: Arc<dyn TokenProvider>) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            endpoint: DEFAULT_EVENTSUB_URL.to_string(),
            helix_base: DEFAULT_HELIX_BASE.to_string(),
            welcome_timeout: DEFAULT_WELCOME_TIMEOUT,
            http: ReqwestClient::new(),
            auth,
            shared: Arc::new(SessionShared {
                tag: tag.to_string(),
                handlers: EventHandlers::new(),
                session_tx,
            }),
            running: Mutex::new(None),
        }
    }

    pub fn with_endpoint(mut self, url: &str) -> Self {
        self.endpoint = url.to_string();
        self
    }

    pub fn with_helix_base(mut self, base: &str) -> Self {
        self.helix_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_welcome_timeout(mut self, timeout: Duration) -> Self {
        self.welcome_timeout = timeout;
        self
    }

    pub fn with_http_client(mut self, http: ReqwestClient) -> Self {
        self.http = http;
        self
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.session_tx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Opens the socket and starts the receive loop. Returns as soon as the
    /// socket is open; the welcome frame is awaited by `ensure_subscriptions`.
    pub async fn connect(&self) -> Result<(), Error> {
        if self.is_connected() {
            return Err(Error::Platform(format!(
                "EventSub session '{}' is already connected",
                self.shared.tag
            )));
        }

        let (ws, _) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| Error::Platform(format!("EventSub connect error: {e}")))?;
        info!("[EventSub:{}] connected → {}", self.shared.tag, self.endpoint);

        let (sink, stream) = ws.split();
        let cancel = CancellationToken::new();
        self.shared.session_tx.send_replace(None);

        let task = tokio::spawn(run_read_loop(self.shared.clone(), stream, cancel.clone()));

        let previous = self.running.lock().replace(RunningLoop { cancel, task, sink });
        if let Some(old) = previous {
            // a loop that had already ended
            old.cancel.cancel();
        }
        Ok(())
    }

    /// Waits for the session id, then creates each subscription in order.
    /// The first failure aborts the rest of this call.
    pub async fn ensure_subscriptions(&self, specs: &[SubscriptionSpec]) -> Result<(), Error> {
        let session_id = self.wait_for_session().await?;
        for spec in specs {
            self.create_subscription(&session_id, spec).await?;
        }
        Ok(())
    }

    pub async fn ensure_bot_subscriptions(
        &self,
        broadcaster_id: &str,
        moderator_id: &str,
        bot_user_id: &str,
    ) -> Result<(), Error> {
        self.ensure_subscriptions(&bot_subscriptions(broadcaster_id, moderator_id, bot_user_id))
            .await
    }

    pub async fn ensure_broadcaster_subscriptions(&self, broadcaster_id: &str) -> Result<(), Error> {
        self.ensure_subscriptions(&broadcaster_subscriptions(broadcaster_id))
            .await
    }

    async fn wait_for_session(&self) -> Result<String, Error> {
        let mut rx = self.shared.session_tx.subscribe();
        let waited = tokio::time::timeout(self.welcome_timeout, rx.wait_for(|id| id.is_some())).await;
        let id = match waited {
            Ok(Ok(id)) => id.clone(),
            _ => None,
        };
        id.ok_or(Error::NoSession(self.welcome_timeout))
    }

    async fn create_subscription(&self, session_id: &str, spec: &SubscriptionSpec) -> Result<(), Error> {
        self.auth.ensure_valid().await?;

        let body = spec.request_body(session_id);
        debug!("[EventSub:{}] Subscribing to {} v{} => {}", self.shared.tag, spec.sub_type, spec.version, body);

        let req = self
            .http
            .post(format!("{}/eventsub/subscriptions", self.helix_base))
            .json(&body);
        let resp = self.auth.apply_auth(req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!(
                "[EventSub:{}] EventSub {} for {}: {}",
                self.shared.tag, status, spec.sub_type, text
            );
            return Err(Error::SubscriptionCreate {
                sub_type: spec.sub_type.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        info!("[EventSub:{}] subscribed to {} v{}", self.shared.tag, spec.sub_type, spec.version);
        Ok(())
    }

    /// Feeds one raw text frame through the decoder, exactly as the receive
    /// loop does.
    pub fn process_frame(&self, raw: &str) {
        self.shared.handle_text(raw);
    }

    pub fn on_event<F>(&self, kind: EventKind, f: F)
    where
        F: Fn(&InboundEvent) -> Result<(), Error> + Send + Sync + 'static,
    {
        let cb: EventCallback = Arc::new(f);
        self.shared.handlers.register(kind, cb);
    }

    typed_subscriber!(on_chat_message, ChatMessage, ChatMessage);
    typed_subscriber!(on_follow, Follow, FollowEvent);
    typed_subscriber!(on_subscribe, Subscribe, SubscribeEvent);
    typed_subscriber!(
        /// Resubs that carry a chat message.
        on_subscription_message,
        SubscriptionMessage,
        SubscriptionMessageEvent
    );
    typed_subscriber!(on_redemption, Redemption, RedemptionEvent);
    typed_subscriber!(on_cheer, Cheer, CheerEvent);
    typed_subscriber!(on_raid, Raid, RaidEvent);

    /// Cancels the receive loop, gives it a short grace period, then closes
    /// the socket. Safe to call when not connected.
    pub async fn shutdown(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        let RunningLoop { cancel, task, mut sink } = running;

        cancel.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            warn!("[EventSub:{}] receive loop did not stop within {:?}", self.shared.tag, SHUTDOWN_GRACE);
        }

        // the peer may already have closed; nothing to do then
        if let Err(e) = sink.close().await {
            debug!("[EventSub:{}] close after shutdown: {}", self.shared.tag, e);
        }

        self.shared.session_tx.send_replace(None);
        info!("[EventSub:{}] shut down", self.shared.tag);
    }
}

impl SessionShared {
    fn handle_text(&self, raw: &str) {
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                debug!("[EventSub:{}] dropping malformed frame: {}", self.tag, e);
                return;
            }
        };

        match parsed.pointer("/metadata/message_type").and_then(Value::as_str) {
            Some("session_welcome") => {
                match parsed.pointer("/payload/session/id").and_then(Value::as_str) {
                    Some(id) => {
                        info!("[EventSub:{}] session ready: {}", self.tag, id);
                        self.session_tx.send_replace(Some(id.to_string()));
                    }
                    None => warn!("[EventSub:{}] session_welcome without a session id", self.tag),
                }
            }
            Some("notification") => {
                let sub_type = parsed
                    .pointer("/payload/subscription/type")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let null = Value::Null;
                let event = parsed.pointer("/payload/event").unwrap_or(&null);

                match decode_notification(sub_type, event) {
                    Some(evt) => {
                        debug!("[EventSub:{}] notification {}", self.tag, sub_type);
                        self.handlers.dispatch(&evt, &self.tag);
                    }
                    None => debug!("[EventSub:{}] unhandled subscription type {:?}", self.tag, sub_type),
                }
            }
            Some("session_keepalive") => trace!("[EventSub:{}] keepalive", self.tag),
            Some("revocation") => warn!("[EventSub:{}] subscription revoked, check scopes: {}", self.tag, raw),
            other => debug!("[EventSub:{}] unhandled message_type={:?}", self.tag, other),
        }
    }
}

/// Reads complete messages until close, error or cancellation, then clears
/// the session id.
async fn run_read_loop(
    shared: Arc<SessionShared>,
    mut stream: SplitStream<WsStream>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("[EventSub:{}] receive loop cancelled", shared.tag);
                break;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(txt))) => shared.handle_text(txt.as_str()),
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(txt) => shared.handle_text(txt),
                Err(_) => debug!("[EventSub:{}] ignoring non-utf8 binary frame", shared.tag),
            },
            Some(Ok(Message::Close(frame))) => {
                info!("[EventSub:{}] websocket closed by server: {:?}", shared.tag, frame);
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!("[EventSub:{}] websocket error: {}", shared.tag, e);
                break;
            }
            None => {
                info!("[EventSub:{}] websocket stream ended", shared.tag);
                break;
            }
        }
    }

    shared.session_tx.send_replace(None);
}
