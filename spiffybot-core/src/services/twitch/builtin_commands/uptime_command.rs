use chrono::Utc;

use crate::Error;
use crate::services::twitch::command_service::CommandContext;
use crate::utils::time::format_uptime;

pub async fn handle_uptime(ctx: &CommandContext<'_>) -> Result<Option<String>, Error> {
    let started_at = ctx.api.get_stream_start_time(ctx.broadcaster_id).await?;
    Ok(Some(match started_at {
        Some(start) => format!("Uptime: {}", format_uptime(start, Utc::now())),
        None => "Stream offline".to_string(),
    }))
}
