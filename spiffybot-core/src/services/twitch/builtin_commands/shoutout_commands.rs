use tracing::{debug, warn};

use spiffybot_common::models::CommandDef;

use crate::Error;
use crate::services::twitch::builtin_commands::target_login;
use crate::services::twitch::command_service::CommandContext;
use crate::utils::template::render;

const SOFTSHOUT_LIVE: &str =
    "👍 Please consider following the lovely {name} - they are LIVE NOW streaming {game} ➡️ https://www.twitch.tv/{user.name}";
const SOFTSHOUT_OFFLINE: &str =
    "👍 Please consider following the lovely {name} - they were last seen streaming {game} ➡️ https://www.twitch.tv/{user.name}";

/// `!so @someone`: official Helix shoutout plus a green announcement.
/// Answers with the announcement only, never a plain chat line.
pub async fn handle_shoutout(ctx: &CommandContext<'_>, raw_args: &str) -> Result<Option<String>, Error> {
    let target = target_login(raw_args);
    if target.is_empty() {
        return Ok(None);
    }
    // the command table normally enforces this too
    if !ctx.message.roles.is_mod_or_broadcaster() {
        return Ok(None);
    }

    let Some(to_user) = ctx.api.get_user_by_login(target).await? else {
        debug!("[Commands] shoutout target '{}' not found", target);
        return Ok(None);
    };

    // rejected shoutouts (cooldown, self, offline) still get the announcement
    if let Err(e) = ctx
        .api
        .shoutout(ctx.broadcaster_id, &to_user.id, ctx.bot_user_id)
        .await
    {
        debug!("[Commands] official shoutout for '{}' refused: {}", to_user.login, e);
    }

    let is_live = ctx.api.is_live(&to_user.id).await.unwrap_or(false);
    let game = ctx
        .api
        .get_channel_info(&to_user.id)
        .await
        .ok()
        .flatten()
        .map(|c| c.game_name)
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| "Just Chatting".to_string());

    let display = to_user.display_or_login();
    let text = if is_live {
        format!(
            "👍 Please consider following the lovely {display} - they're LIVE NOW streaming a bit of {game}! https://www.twitch.tv/{}",
            to_user.login
        )
    } else {
        format!(
            "👍 Please consider following the lovely {display} - they were last seen streaming a bit of {game}! https://www.twitch.tv/{}",
            to_user.login
        )
    };

    if let Err(e) = ctx
        .api
        .send_announcement(ctx.broadcaster_id, ctx.bot_user_id, &text, "green")
        .await
    {
        warn!("[Commands] shoutout announcement failed: {}", e);
    }
    Ok(None)
}

/// `!softshout someone`: announcement only, no official shoutout. The
/// templates and colour can be overridden through the command's `data`.
pub async fn handle_softshout(
    ctx: &CommandContext<'_>,
    def: &CommandDef,
    raw_args: &str,
) -> Result<Option<String>, Error> {
    let target = target_login(raw_args);
    if target.is_empty() {
        return Ok(None);
    }
    let Some(user) = ctx.api.get_user_by_login(target).await? else {
        return Ok(None);
    };

    let is_live = ctx.api.is_live(&user.id).await?;
    let game = ctx
        .api
        .get_channel_info(&user.id)
        .await?
        .map(|c| c.game_name)
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| "something great".to_string());

    let color = def.data_str("announce_color").unwrap_or("green");
    let template = if is_live {
        def.data_str("announce_live").unwrap_or(SOFTSHOUT_LIVE)
    } else {
        def.data_str("announce_offline").unwrap_or(SOFTSHOUT_OFFLINE)
    };

    let text = render(
        template,
        &[
            ("name", user.display_or_login()),
            ("user.name", user.login.as_str()),
            ("game", game.as_str()),
        ],
    );

    ctx.api
        .send_announcement(ctx.broadcaster_id, ctx.bot_user_id, &text, color)
        .await?;
    Ok(None)
}
