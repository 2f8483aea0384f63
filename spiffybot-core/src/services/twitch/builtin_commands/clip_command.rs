use tracing::debug;

use crate::Error;
use crate::services::twitch::command_service::CommandContext;

pub async fn handle_clip(ctx: &CommandContext<'_>) -> Result<Option<String>, Error> {
    if !ctx.api.is_live(ctx.broadcaster_id).await? {
        return Ok(Some("❌ Can't clip when offline".to_string()));
    }

    // refused clips (rate limit, clipping disabled) stay silent
    match ctx.api.create_clip(ctx.broadcaster_id).await {
        Ok(Some(id)) if !id.trim().is_empty() => {
            Ok(Some(format!("📽️ Here's your clip! → https://clips.twitch.tv/{id}")))
        }
        Ok(_) => Ok(None),
        Err(e) => {
            debug!("[Commands] clip creation failed: {}", e);
            Ok(None)
        }
    }
}
