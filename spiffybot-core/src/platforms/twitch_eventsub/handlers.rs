// File: spiffybot-core/src/platforms/twitch_eventsub/handlers.rs

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::Error;
use super::events::{EventKind, InboundEvent};

/// A subscriber callback. Runs on the receive task, so anything that does
/// I/O should hand off to `tokio::spawn`.
pub type EventCallback = Arc<dyn Fn(&InboundEvent) -> Result<(), Error> + Send + Sync>;

/// Callbacks per event kind, kept in registration order.
#[derive(Default)]
pub struct EventHandlers {
    by_kind: RwLock<HashMap<EventKind, Vec<EventCallback>>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: EventKind, cb: EventCallback) {
        self.by_kind.write().entry(kind).or_default().push(cb);
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.by_kind.read().get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Invokes every callback for the event's kind and returns how many ran.
    /// A failing callback is logged and does not stop the ones after it.
    pub fn dispatch(&self, event: &InboundEvent, tag: &str) -> usize {
        // snapshot so callbacks may register further handlers
        let callbacks: Vec<EventCallback> = self
            .by_kind
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for cb in &callbacks {
            if let Err(e) = cb(event) {
                warn!("[EventSub:{}] {:?} subscriber failed: {}", tag, event.kind(), e);
            }
        }
        callbacks.len()
    }
}
