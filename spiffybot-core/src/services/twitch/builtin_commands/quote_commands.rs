// File: spiffybot-core/src/services/twitch/builtin_commands/quote_commands.rs
//! `!quote`, `!addquote` and `!delquote`. All three stay silent when no
//! quote store is wired in.

use crate::Error;
use crate::services::twitch::command_service::CommandContext;

pub async fn handle_quote(ctx: &CommandContext<'_>, raw_args: &str) -> Result<Option<String>, Error> {
    let Some(store) = ctx.quotes else {
        return Ok(None);
    };
    let args = raw_args.trim();

    if args.is_empty() {
        let quote = store.random_quote().await?;
        return Ok(Some(match quote {
            Some(q) => format!("Quote #{}: {}", q.id, q.text),
            None => "No quotes yet.".to_string(),
        }));
    }

    if let Ok(id) = args.parse::<i64>() {
        let quote = store.quote_by_id(id).await?;
        return Ok(Some(match quote {
            Some(q) => format!("Quote #{}: {}", q.id, q.text),
            None => format!("No quote with id {id}."),
        }));
    }

    Ok(Some(match store.search_quote(args).await? {
        Some(q) => format!("Quote #{}: {}", q.id, q.text),
        None => "No matching quote found.".to_string(),
    }))
}

pub async fn handle_add_quote(ctx: &CommandContext<'_>, raw_args: &str) -> Result<Option<String>, Error> {
    let Some(store) = ctx.quotes else {
        return Ok(None);
    };
    let text = raw_args.trim();
    if text.is_empty() {
        return Ok(Some("Please provide a quote text.".to_string()));
    }

    let msg = ctx.message;
    let added_by = if msg.chatter_user_login.trim().is_empty() {
        msg.chatter_user_name.as_str()
    } else {
        msg.chatter_user_login.as_str()
    };
    let id = store.add_quote(text, &msg.chatter_user_id, added_by).await?;
    Ok(Some(format!("Quote #{id} added.")))
}

pub async fn handle_del_quote(ctx: &CommandContext<'_>, raw_args: &str) -> Result<Option<String>, Error> {
    let Some(store) = ctx.quotes else {
        return Ok(None);
    };
    let Ok(id) = raw_args.trim().parse::<i64>() else {
        return Ok(Some("Usage: !delquote <id>".to_string()));
    };

    Ok(Some(if store.delete_quote(id).await? {
        format!("Quote #{id} deleted.")
    } else {
        format!("No quote with id {id}.")
    }))
}
