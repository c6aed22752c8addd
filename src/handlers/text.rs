use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::MessageId;

use crate::handlers::subscription::channel_recipient;
use crate::handlers::HandlerResult;
use crate::router::{Reply, Router};

pub async fn text_handler(bot: Bot, msg: Message, router: Arc<Router>) -> HandlerResult {
    let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;

    if let Some(reply) = router.handle_text(user_id, text).await {
        deliver(&bot, msg.chat.id, reply).await?;
    }
    Ok(())
}

pub async fn deliver(bot: &Bot, chat_id: ChatId, reply: Reply) -> HandlerResult {
    match reply {
        Reply::Text { text, markup } => {
            let mut request = bot.send_message(chat_id, text);
            if let Some(markup) = markup {
                request = request.reply_markup(markup);
            }
            request.await?;
        }
        Reply::Content { locator, markup } => {
            let mut request = bot.copy_message(
                chat_id,
                channel_recipient(&locator.channel),
                MessageId(locator.content_id),
            );
            if let Some(markup) = markup {
                request = request.reply_markup(markup);
            }
            if let Err(e) = request.await {
                log::error!(
                    "Failed to copy {}/{} to {}: {}",
                    locator.channel, locator.content_id, chat_id.0, e
                );
                bot.send_message(chat_id, "⚠️ Could not fetch the content, please try again later.")
                    .await?;
            }
        }
    }
    Ok(())
}
