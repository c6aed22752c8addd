use anyhow::{anyhow, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, Recipient};

use crate::gate::{ChannelApi, MemberStatus};

/// `@username` channels are addressed by name, numeric ids (`-100...`) by id.
pub fn channel_recipient(channel: &str) -> Recipient {
    match channel.trim().parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(channel.trim().to_string()),
    }
}

fn member_status(kind: &ChatMemberKind) -> MemberStatus {
    match kind {
        ChatMemberKind::Owner { .. } => MemberStatus::Creator,
        ChatMemberKind::Administrator { .. } => MemberStatus::Administrator,
        ChatMemberKind::Member { .. } => MemberStatus::Member,
        ChatMemberKind::Restricted { .. } => MemberStatus::Restricted,
        ChatMemberKind::Left { .. } => MemberStatus::Left,
        ChatMemberKind::Banned { .. } => MemberStatus::Kicked,
    }
}

/// Channel lookups through the Bot API.
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChannelApi for TelegramChannel {
    async fn membership_status(&self, channel: &str, user_id: i64) -> Result<MemberStatus> {
        let user_id = u64::try_from(user_id).map_err(|_| anyhow!("Invalid user id {}", user_id))?;
        let member = self
            .bot
            .get_chat_member(channel_recipient(channel), UserId(user_id))
            .await?;
        Ok(member_status(&member.kind))
    }

    async fn member_count(&self, channel: &str) -> Result<u32> {
        let count = self.bot.get_chat_member_count(channel_recipient(channel)).await?;
        Ok(count)
    }
}
