use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::CallbackQuery;

use crate::handlers::HandlerResult;
use crate::router::{CallbackReply, Router};

pub async fn callback_handler(bot: Bot, q: CallbackQuery, router: Arc<Router>) -> HandlerResult {
    let user_id = q.from.id.0 as i64;
    let data = q.data.as_deref().unwrap_or_default();
    log::info!("Received callback query with data: {}", data);

    match router.handle_callback(user_id, data).await {
        CallbackReply::EditText(text) => {
            bot.answer_callback_query(q.id.clone()).await?;
            if let Some(message) = q.message.as_ref().and_then(|m| m.regular_message()) {
                bot.edit_message_text(message.chat.id, message.id, text).await?;
            }
        }
        CallbackReply::Alert(text) => {
            bot.answer_callback_query(q.id.clone())
                .text(text)
                .show_alert(true)
                .await?;
        }
        CallbackReply::Acknowledge => {
            bot.answer_callback_query(q.id.clone()).await?;
        }
    }
    Ok(())
}
