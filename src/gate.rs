use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::timeout;

/// Membership status as reported by the chat platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    pub fn counts_as_subscribed(self) -> bool {
        matches!(self, MemberStatus::Creator | MemberStatus::Administrator | MemberStatus::Member)
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberStatus::Creator => "creator",
            MemberStatus::Administrator => "administrator",
            MemberStatus::Member => "member",
            MemberStatus::Restricted => "restricted",
            MemberStatus::Left => "left",
            MemberStatus::Kicked => "kicked",
        };
        f.write_str(name)
    }
}

/// Remote calls the gate needs from the transport.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    async fn membership_status(&self, channel: &str, user_id: i64) -> Result<MemberStatus>;
    async fn member_count(&self, channel: &str) -> Result<u32>;
}

#[derive(Debug)]
pub enum SubscriptionCheck {
    Subscribed(MemberStatus),
    NotMember(MemberStatus),
    LookupFailed(String),
}

impl SubscriptionCheck {
    pub fn is_subscribed(&self) -> bool {
        matches!(self, SubscriptionCheck::Subscribed(_))
    }
}

/// Decides whether a user is a member of the required channel.
///
/// Any failure of the remote lookup, including a timeout, is treated as "not
/// subscribed". Callers never see an error from here.
pub struct SubscriptionGate {
    api: Arc<dyn ChannelApi>,
    channel: String,
    lookup_timeout: Duration,
}

impl SubscriptionGate {
    pub fn new(api: Arc<dyn ChannelApi>, channel: impl Into<String>, lookup_timeout: Duration) -> Self {
        Self {
            api,
            channel: channel.into(),
            lookup_timeout,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn check(&self, user_id: i64) -> SubscriptionCheck {
        let lookup = self.api.membership_status(&self.channel, user_id);
        let outcome = match timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(status)) if status.counts_as_subscribed() => SubscriptionCheck::Subscribed(status),
            Ok(Ok(status)) => SubscriptionCheck::NotMember(status),
            Ok(Err(e)) => SubscriptionCheck::LookupFailed(e.to_string()),
            Err(_) => SubscriptionCheck::LookupFailed(format!(
                "membership lookup timed out after {:?}",
                self.lookup_timeout
            )),
        };

        match &outcome {
            SubscriptionCheck::Subscribed(status) => {
                log::debug!("User {} is subscribed to {} ({})", user_id, self.channel, status)
            }
            SubscriptionCheck::NotMember(status) => {
                log::debug!("User {} is not subscribed to {} ({})", user_id, self.channel, status)
            }
            SubscriptionCheck::LookupFailed(reason) => {
                log::warn!("Membership lookup for user {} in {} failed: {}", user_id, self.channel, reason)
            }
        }
        outcome
    }

    pub async fn is_subscribed(&self, user_id: i64) -> bool {
        self.check(user_id).await.is_subscribed()
    }

    pub async fn subscriber_count(&self) -> Result<u32> {
        timeout(self.lookup_timeout, self.api.member_count(&self.channel))
            .await
            .map_err(|_| anyhow::anyhow!("member count lookup timed out after {:?}", self.lookup_timeout))?
    }
}
