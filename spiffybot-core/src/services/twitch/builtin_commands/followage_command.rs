use chrono::Utc;
use tracing::info;

use crate::Error;
use crate::services::twitch::builtin_commands::target_login;
use crate::services::twitch::command_service::CommandContext;
use crate::utils::time::format_follow_age;

/// The `handle_followage` function implements the `!followage` command.
/// Mods and the broadcaster may ask about `@someone`; everyone else always
/// gets their own follow age.
pub async fn handle_followage(ctx: &CommandContext<'_>, raw_args: &str) -> Result<Option<String>, Error> {
    let msg = ctx.message;
    let can_target_others = msg.roles.is_mod_or_broadcaster();
    let requested = target_login(raw_args);

    let (target_id, label) = if requested.is_empty() || !can_target_others {
        (msg.chatter_user_id.clone(), msg.display_name().to_string())
    } else {
        match ctx.api.get_user_by_login(requested).await? {
            Some(user) => (user.id.clone(), user.display_or_login().to_string()),
            None => return Ok(Some(format!("User '{requested}' not found."))),
        }
    };

    info!("[Commands] followage for '{}' requested by '{}'", label, msg.chatter_user_login);

    let since = ctx
        .api
        .get_follow_since(ctx.broadcaster_id, &target_id, ctx.bot_user_id)
        .await?;

    let Some(since) = since else {
        return Ok(Some(if can_target_others {
            format!("😢 {label} is not following.")
        } else {
            "😢 You're not following.".to_string()
        }));
    };

    let age = format_follow_age(since, Utc::now());
    let since_str = since.format("%Y-%m-%d");
    Ok(Some(if can_target_others {
        format!("📏 Followage for {label}: {age} (since {since_str})")
    } else {
        format!("📏 You've been following for {age} (since {since_str}).")
    }))
}
