// File: src/platforms/twitch_eventsub/mod.rs

pub mod events;
pub mod handlers;
pub mod runtime;
pub mod subscriptions;

pub use events::{EventKind, InboundEvent};
pub use runtime::EventSubSession;
pub use subscriptions::SubscriptionSpec;
