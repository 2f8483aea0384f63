use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use spiffybot_common::models::{ChannelIdentity, CommandDef, CommandFile, CommandKind, ModToolsConfig};
use spiffybot_common::traits::{ChatApi, QuoteStore};

use crate::Error;
use crate::platforms::twitch_eventsub::events::ChatMessage;
use crate::services::twitch::builtin_commands::{handle_builtin_command, SetterCooldowns};
use crate::utils::time::deadline_after;

/// How often the dispatcher asks Helix which stream is live.
pub const STREAM_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Context passed to built-in command handlers.
pub struct CommandContext<'a> {
    pub api: &'a Arc<dyn ChatApi>,
    pub quotes: Option<&'a Arc<dyn QuoteStore>>,
    pub broadcaster_id: &'a str,
    pub bot_user_id: &'a str,
    pub message: &'a ChatMessage,
    pub modtools: &'a ModToolsConfig,
    pub setter_cooldowns: &'a SetterCooldowns,
    pub time_zone: Tz,
}

/// Why an invocation was stopped before its handler ran. Never shown in chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandRejection {
    #[error("permission denied")]
    PermissionDenied,
    #[error("cooldown active")]
    CooldownActive,
    #[error("usage limit reached")]
    UsageExhausted,
}

/// What happened to one chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a command (no prefix, empty body or unknown name).
    Ignored,
    Rejected { command: String, reason: CommandRejection },
    /// Handler ran and produced no text.
    Silent { command: String },
    HandlerFailed { command: String },
    SendFailed { command: String },
    Sent { command: String },
}

/// Name and alias lookup, rebuilt on every reload.
struct CommandTable {
    prefix: String,
    by_name: HashMap<String, Arc<CommandDef>>,
    alias_to_name: HashMap<String, String>,
}

impl CommandTable {
    fn build(file: CommandFile) -> Self {
        let mut by_name = HashMap::new();
        let mut alias_to_name = HashMap::new();

        for def in file.commands {
            let key = def.name.trim().to_lowercase();
            if key.is_empty() {
                warn!("[Commands] skipping command with a blank name");
                continue;
            }
            for alias in &def.aliases {
                let alias = alias.trim().to_lowercase();
                if !alias.is_empty() {
                    alias_to_name.insert(alias, key.clone());
                }
            }
            by_name.insert(key, Arc::new(def));
        }

        Self {
            prefix: file.prefix,
            by_name,
            alias_to_name,
        }
    }

    /// Name first, then one alias hop. Returns the canonical (lowercased) name.
    fn resolve(&self, token: &str) -> Option<(String, Arc<CommandDef>)> {
        let token = token.to_lowercase();
        if let Some(def) = self.by_name.get(&token) {
            return Some((token, def.clone()));
        }
        let target = self.alias_to_name.get(&token)?;
        self.by_name.get(target).map(|def| (target.clone(), def.clone()))
    }
}

/// Cooldown deadlines and usage counts. In memory only.
#[derive(Default)]
struct UsageState {
    next_global: HashMap<String, Instant>,
    next_user: HashMap<(String, String), Instant>,
    global_usage: HashMap<String, u32>,
    user_usage: HashMap<(String, String), u32>,
    current_stream_id: Option<String>,
    last_stream_check: Option<Instant>,
}

/// Matches chat lines against the configured commands and enforces
/// permission, cooldown and usage policy before replying.
pub struct CommandDispatcher {
    api: Arc<dyn ChatApi>,
    quotes: Option<Arc<dyn QuoteStore>>,
    channel: ChannelIdentity,
    time_zone: Tz,
    stream_check_interval: Duration,
    table: RwLock<Arc<CommandTable>>,
    state: Mutex<UsageState>,
    modtools: RwLock<Arc<ModToolsConfig>>,
    setter_cooldowns: SetterCooldowns,
    // serializes gate → execute → record for one command name
    command_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CommandDispatcher {
    pub fn new(api: Arc<dyn ChatApi>, channel: ChannelIdentity, commands: CommandFile) -> Self {
        let table = CommandTable::build(commands);
        debug!(
            "[Commands] loaded {} commands (prefix '{}')",
            table.by_name.len(),
            table.prefix
        );
        Self {
            api,
            quotes: None,
            channel,
            time_zone: chrono_tz::Europe::London,
            stream_check_interval: STREAM_CHECK_INTERVAL,
            table: RwLock::new(Arc::new(table)),
            state: Mutex::new(UsageState::default()),
            modtools: RwLock::new(Arc::new(ModToolsConfig::default())),
            setter_cooldowns: SetterCooldowns::default(),
            command_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_quote_store(mut self, store: Arc<dyn QuoteStore>) -> Self {
        self.quotes = Some(store);
        self
    }

    pub fn with_time_zone(mut self, tz: Tz) -> Self {
        self.time_zone = tz;
        self
    }

    pub fn with_modtools(self, cfg: ModToolsConfig) -> Self {
        self.set_modtools(cfg);
        self
    }

    pub fn with_stream_check_interval(mut self, interval: Duration) -> Self {
        self.stream_check_interval = interval;
        self
    }

    pub fn set_modtools(&self, cfg: ModToolsConfig) {
        *self.modtools.write() = Arc::new(cfg);
    }

    /// Swaps in a new command table and forgets every cooldown and usage count.
    pub fn reload(&self, commands: CommandFile) {
        let table = Arc::new(CommandTable::build(commands));
        let mut state = self.state.lock();
        let count = table.by_name.len();
        *self.table.write() = table;
        *state = UsageState::default();
        info!("[Commands] reloaded {} commands; cooldowns and usage reset", count);
    }

    pub fn command_count(&self) -> usize {
        self.table.read().by_name.len()
    }

    /// Processes one chat line end to end.
    pub async fn handle_chat_message(&self, msg: &ChatMessage) -> DispatchOutcome {
        let table = self.table.read().clone();

        // -----------------------------------------------------------------
        // 1) Must start with the prefix
        // -----------------------------------------------------------------
        let Some(rest) = msg.text.strip_prefix(table.prefix.as_str()) else {
            return DispatchOutcome::Ignored;
        };

        // -----------------------------------------------------------------
        // 2) Split into token + args, 3) resolve name or alias
        // -----------------------------------------------------------------
        let Some((token, args)) = tokenize(rest) else {
            return DispatchOutcome::Ignored;
        };
        let Some((name, def)) = table.resolve(token) else {
            debug!("[Commands] unknown command '{}'", token);
            return DispatchOutcome::Ignored;
        };

        // -----------------------------------------------------------------
        // 4) Permission, before anything per-user is looked at
        // -----------------------------------------------------------------
        if !msg.roles.satisfies(def.permission) {
            info!(
                "[Commands] Permission denied for {} (user '{}' needs {})",
                token,
                msg.chatter_user_login,
                def.permission.as_str()
            );
            return DispatchOutcome::Rejected {
                command: name,
                reason: CommandRejection::PermissionDenied,
            };
        }

        // -----------------------------------------------------------------
        // 5) Stream context (usage resets when the live stream changes)
        // -----------------------------------------------------------------
        self.refresh_stream_context().await;

        let command_lock = self.command_lock(&name);
        let _serialized = command_lock.lock().await;

        // -----------------------------------------------------------------
        // 6) Cooldowns, 7) usage caps
        // -----------------------------------------------------------------
        if let Err(reason) = self.check_gates(&def, &name, &msg.chatter_user_id) {
            debug!("[Commands] {} for {}", reason, name);
            return DispatchOutcome::Rejected { command: name, reason };
        }

        // -----------------------------------------------------------------
        // 8) Execute
        // -----------------------------------------------------------------
        let output = match self.execute(&def, &name, msg, args).await {
            Ok(out) => out,
            Err(e) => {
                error!("[Commands] {}", e);
                return DispatchOutcome::HandlerFailed { command: name };
            }
        };
        let Some(text) = output.filter(|t| !t.trim().is_empty()) else {
            debug!("[Commands] '{}' produced no output", name);
            return DispatchOutcome::Silent { command: name };
        };

        // -----------------------------------------------------------------
        // 9) Send, then advance cooldowns and usage
        // -----------------------------------------------------------------
        let reply_to = (def.reply_to_user && !msg.message_id.is_empty()).then_some(msg.message_id.as_str());
        if let Err(e) = self
            .api
            .send_chat_message(&self.channel.broadcaster_id, &self.channel.bot_user_id, &text, reply_to)
            .await
        {
            warn!("[Commands] sending '{}' failed: {}", name, e);
            return DispatchOutcome::SendFailed { command: name };
        }

        self.record_invocation(&def, &name, &msg.chatter_user_id);
        info!("[Commands] Command '{}' sent.", name);
        DispatchOutcome::Sent { command: name }
    }

    fn command_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.command_locks
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    async fn refresh_stream_context(&self) {
        {
            let mut state = self.state.lock();
            let now = Instant::now();
            if let Some(last) = state.last_stream_check {
                if now.duration_since(last) < self.stream_check_interval {
                    return;
                }
            }
            state.last_stream_check = Some(now);
        }

        let observed = match self.api.get_stream(&self.channel.broadcaster_id).await {
            Ok(stream) => stream.map(|s| s.id).filter(|id| !id.is_empty()),
            Err(e) => {
                warn!("[Commands] stream lookup failed, keeping usage state: {}", e);
                return;
            }
        };

        let mut state = self.state.lock();
        if state.current_stream_id != observed {
            info!(
                "[Commands] stream changed {:?} -> {:?}; usage counters reset",
                state.current_stream_id, observed
            );
            state.current_stream_id = observed;
            state.global_usage.clear();
            state.user_usage.clear();
        }
    }

    fn check_gates(&self, def: &CommandDef, name: &str, user_id: &str) -> Result<(), CommandRejection> {
        let state = self.state.lock();
        let now = Instant::now();
        let user_key = (name.to_string(), user_id.to_string());

        if def.global_cooldown > 0 && state.next_global.get(name).is_some_and(|next| now < *next) {
            return Err(CommandRejection::CooldownActive);
        }
        if def.user_cooldown > 0 && state.next_user.get(&user_key).is_some_and(|next| now < *next) {
            return Err(CommandRejection::CooldownActive);
        }

        if def.global_usage > 0 && state.global_usage.get(name).copied().unwrap_or(0) >= def.global_usage {
            return Err(CommandRejection::UsageExhausted);
        }
        if def.user_usage > 0 && state.user_usage.get(&user_key).copied().unwrap_or(0) >= def.user_usage {
            return Err(CommandRejection::UsageExhausted);
        }
        Ok(())
    }

    fn record_invocation(&self, def: &CommandDef, name: &str, user_id: &str) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let user_key = (name.to_string(), user_id.to_string());

        if def.global_cooldown > 0 {
            state
                .next_global
                .insert(name.to_string(), deadline_after(now, def.global_cooldown_window()));
        }
        if def.user_cooldown > 0 {
            state
                .next_user
                .insert(user_key.clone(), deadline_after(now, def.user_cooldown_window()));
        }
        *state.global_usage.entry(name.to_string()).or_insert(0) += 1;
        *state.user_usage.entry(user_key).or_insert(0) += 1;
    }

    async fn execute(
        &self,
        def: &CommandDef,
        name: &str,
        msg: &ChatMessage,
        args: &str,
    ) -> Result<Option<String>, Error> {
        match def.kind {
            CommandKind::Static => Ok(def.data_str("text").map(str::to_string)),
            CommandKind::Dynamic => {
                let modtools = self.modtools.read().clone();
                let ctx = CommandContext {
                    api: &self.api,
                    quotes: self.quotes.as_ref(),
                    broadcaster_id: &self.channel.broadcaster_id,
                    bot_user_id: &self.channel.bot_user_id,
                    message: msg,
                    modtools: &modtools,
                    setter_cooldowns: &self.setter_cooldowns,
                    time_zone: self.time_zone,
                };
                handle_builtin_command(name, def, &ctx, args)
                    .await
                    .map_err(|e| match e {
                        Error::Handler { .. } => e,
                        other => Error::handler(name, other),
                    })
            }
        }
    }
}

/// Splits on the first whitespace run: `"so  @someone"` → `("so", "@someone")`.
fn tokenize(rest: &str) -> Option<(&str, &str)> {
    let body = rest.trim();
    if body.is_empty() {
        return None;
    }
    Some(match body.split_once(char::is_whitespace) {
        Some((token, args)) => (token, args.trim_start()),
        None => (body, ""),
    })
}
