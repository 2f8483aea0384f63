// File: spiffybot-core/src/services/twitch/builtin_commands/channel_commands.rs
//! `!title` and `!game`: anyone can read, mods and the broadcaster can set.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use spiffybot_common::models::modtools::SanitizationConfig;

use crate::Error;
use crate::services::twitch::command_service::CommandContext;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").expect("static regex")
});

pub async fn handle_title(ctx: &CommandContext<'_>, raw_args: &str) -> Result<Option<String>, Error> {
    let requested = raw_args.trim();

    if requested.is_empty() {
        let title = ctx
            .api
            .get_channel_info(ctx.broadcaster_id)
            .await?
            .map(|c| c.title.trim().to_string())
            .filter(|t| !t.is_empty());
        return Ok(Some(match title {
            Some(t) => format!("Current title: {t}"),
            None => "Current title: (unknown)".to_string(),
        }));
    }

    if !ctx.message.roles.is_mod_or_broadcaster() {
        return Ok(None);
    }
    let cooldown = ctx.modtools.cooldowns.title_change();
    if !ctx.setter_cooldowns.try_acquire("title", cooldown) {
        return Ok(None);
    }

    let clean = sanitize(requested, &ctx.modtools.sanitization);
    if clean.trim().is_empty() {
        return Ok(None);
    }

    ctx.api.update_title(ctx.broadcaster_id, &clean).await?;
    info!(
        "[Commands] Title changed by {} ({}) -> \"{}\"",
        ctx.message.chatter_user_login, ctx.message.chatter_user_id, clean
    );
    Ok(Some(format!("Title changed to --> {clean}")))
}

pub async fn handle_game(ctx: &CommandContext<'_>, raw_args: &str) -> Result<Option<String>, Error> {
    let requested = raw_args.trim();

    if requested.is_empty() {
        let game = ctx
            .api
            .get_channel_info(ctx.broadcaster_id)
            .await?
            .map(|c| c.game_name.trim().to_string())
            .filter(|g| !g.is_empty());
        return Ok(Some(match game {
            Some(g) => format!("Current category: {g}"),
            None => "Current category: (none)".to_string(),
        }));
    }

    if !ctx.message.roles.is_mod_or_broadcaster() {
        return Ok(None);
    }
    let cooldown = ctx.modtools.cooldowns.game_change();
    if !ctx.setter_cooldowns.try_acquire("game", cooldown) {
        return Ok(None);
    }

    let (game_id, shown) = if requested.chars().all(|c| c.is_ascii_digit()) {
        // an id is used as-is; the lookup only prettifies the reply
        let name = ctx.api.find_game(requested).await.ok().flatten().map(|g| g.name);
        (requested.to_string(), name.unwrap_or_else(|| requested.to_string()))
    } else {
        match ctx.api.find_game(requested).await? {
            Some(g) => (g.id, g.name),
            None => return Ok(None),
        }
    };

    ctx.api.update_game(ctx.broadcaster_id, &game_id).await?;
    info!(
        "[Commands] Category changed by {} ({}) -> \"{}\"",
        ctx.message.chatter_user_login, ctx.message.chatter_user_id, shown
    );
    Ok(Some(format!("Game changed to --> {shown}")))
}

pub fn sanitize(input: &str, rules: &SanitizationConfig) -> String {
    let mut out = input.to_string();
    if rules.strip_control_chars {
        out = out.chars().filter(|c| !c.is_control() || *c == ' ').collect();
    }
    if rules.collapse_whitespace {
        out = WHITESPACE_RUN.replace_all(&out, " ").into_owned();
    }
    if rules.trim {
        out = out.trim().to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_controls_and_collapses_spaces() {
        let rules = SanitizationConfig::default();
        assert_eq!(sanitize("  Chill \u{7}  vibes   only ", &rules), "Chill vibes only");
        // tabs count as control characters and are dropped, not collapsed
        assert_eq!(sanitize("a\tb", &rules), "ab");
    }

    #[test]
    fn sanitize_respects_switches() {
        let rules = SanitizationConfig {
            collapse_whitespace: false,
            strip_control_chars: false,
            trim: false,
        };
        assert_eq!(sanitize(" a  b ", &rules), " a  b ");
    }
}
