// File: spiffybot-core/src/services/twitch/builtin_commands/mod.rs
//! Handlers for `dynamic` commands. Each command lives in its own file; the
//! dispatcher calls `handle_builtin_command` with the command's canonical name.

pub mod channel_commands;
pub mod clip_command;
pub mod clock_commands;
pub mod followage_command;
pub mod ping_command;
pub mod quote_commands;
pub mod shoutout_commands;
pub mod uptime_command;

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use spiffybot_common::models::CommandDef;

use crate::Error;
use crate::services::twitch::command_service::CommandContext;
use crate::utils::time::deadline_after;

pub async fn handle_builtin_command(
    name: &str,
    def: &CommandDef,
    ctx: &CommandContext<'_>,
    raw_args: &str,
) -> Result<Option<String>, Error> {
    match name {
        "ping" => Ok(Some(ping_command::handle_ping())),
        "uptime" => uptime_command::handle_uptime(ctx).await,
        "followage" => followage_command::handle_followage(ctx, raw_args).await,
        "so" | "shoutout" => shoutout_commands::handle_shoutout(ctx, raw_args).await,
        "softshout" | "soshout" => shoutout_commands::handle_softshout(ctx, def, raw_args).await,
        "title" => channel_commands::handle_title(ctx, raw_args).await,
        "game" => channel_commands::handle_game(ctx, raw_args).await,
        "clip" => clip_command::handle_clip(ctx).await,
        "time" => Ok(Some(clock_commands::handle_time(ctx.time_zone, chrono::Utc::now()))),
        "xmas" => Ok(Some(clock_commands::handle_xmas(ctx.time_zone, chrono::Utc::now()))),
        "quote" => quote_commands::handle_quote(ctx, raw_args).await,
        "addquote" => quote_commands::handle_add_quote(ctx, raw_args).await,
        "delquote" => quote_commands::handle_del_quote(ctx, raw_args).await,
        _ => {
            debug!("[Commands] no built-in handler named '{}'", name);
            Ok(None)
        }
    }
}

/// Process-wide cooldowns for moderator setters (`!title x`, `!game y`),
/// separate from the per-command cooldowns in the dispatcher.
#[derive(Default)]
pub struct SetterCooldowns {
    next_allowed: Mutex<HashMap<&'static str, Instant>>,
}

impl SetterCooldowns {
    /// Claims the slot for `key` if its cooldown has passed.
    pub fn try_acquire(&self, key: &'static str, cooldown: Duration) -> bool {
        let mut next = self.next_allowed.lock();
        let now = Instant::now();
        if next.get(key).is_some_and(|t| now < *t) {
            return false;
        }
        next.insert(key, deadline_after(now, cooldown));
        true
    }
}

/// `@Name` → `Name`, trimmed.
pub(crate) fn target_login(raw_args: &str) -> &str {
    raw_args
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_start_matches('@')
}
