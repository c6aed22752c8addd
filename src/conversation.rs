use std::collections::HashMap;

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::Mutex;

use crate::admins::AdminRegistry;
use crate::registry::RegistryStore;

lazy_static! {
    static ref CODE_PAYLOAD: Regex = Regex::new(r"^([0-9]+)\s+([0-9]+)$").unwrap();
}

/// Which multi-step admin operation is waiting for its next message.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingCodeAdd,
    AwaitingCodeRemoval,
    AwaitingAdminId,
}

impl ConversationState {
    pub fn prompt(self) -> Option<&'static str> {
        match self {
            ConversationState::Idle => None,
            ConversationState::AwaitingCodeAdd => {
                Some("➕ Send the new code and the post ID. Example: 47 1000")
            }
            ConversationState::AwaitingCodeRemoval => Some("🗑 Send the code you want to remove:"),
            ConversationState::AwaitingAdminId => Some("🆔 Send the Telegram ID of the new admin:"),
        }
    }
}

/// Per-user conversation states. A missing entry means `Idle`.
#[derive(Default)]
pub struct ConversationStore {
    states: Mutex<HashMap<i64, ConversationState>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn current(&self, user_id: i64) -> ConversationState {
        self.states
            .lock()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }

    /// Starts a flow, replacing whatever flow the user had pending.
    pub async fn begin(&self, user_id: i64, state: ConversationState) {
        let mut states = self.states.lock().await;
        let previous = if state == ConversationState::Idle {
            states.remove(&user_id)
        } else {
            states.insert(user_id, state)
        };
        if let Some(previous) = previous.filter(|p| *p != state) {
            log::debug!("User {} abandoned {:?} for {:?}", user_id, previous, state);
        }
    }

    /// Removes and returns the pending state, leaving the user `Idle`.
    pub async fn take(&self, user_id: i64) -> ConversationState {
        self.states
            .lock()
            .await
            .remove(&user_id)
            .unwrap_or_default()
    }
}

pub fn parse_code_payload(text: &str) -> Option<(String, i32)> {
    let caps = CODE_PAYLOAD.captures(text.trim())?;
    let content_id = caps[2].parse::<i32>().ok()?;
    Some((caps[1].to_string(), content_id))
}

pub fn parse_user_id(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Consumes one message for a pending flow and returns the reply text.
/// The caller has already reset the user to `Idle`.
pub async fn complete_step(
    state: ConversationState,
    input: &str,
    channel: &str,
    registry: &dyn RegistryStore,
    admins: &AdminRegistry,
) -> Result<Option<String>> {
    let reply = match state {
        ConversationState::Idle => return Ok(None),
        ConversationState::AwaitingCodeAdd => match parse_code_payload(input) {
            Some((code, content_id)) => {
                registry.save_code(&code, channel, content_id).await?;
                log::info!("Code {} now points to {}/{}", code, channel, content_id);
                format!("✅ Code added: {} → {}", code, content_id)
            }
            None => "❌ Wrong format! Example: 47 1000".to_string(),
        },
        ConversationState::AwaitingCodeRemoval => {
            let code = input.trim();
            if registry.remove_code(code).await? {
                log::info!("Code {} removed", code);
                format!("✅ Code removed: {}", code)
            } else {
                format!("⚠️ Code {} was not in the list.", code)
            }
        }
        ConversationState::AwaitingAdminId => match parse_user_id(input) {
            Some(user_id) => {
                if admins.add_admin(user_id).await {
                    format!("✅ Admin added: {}", user_id)
                } else {
                    "⚠️ This user is already an admin.".to_string()
                }
            }
            None => "❌ Wrong ID!".to_string(),
        },
    };
    Ok(Some(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::temp_registry;

    #[test]
    fn test_parse_code_payload() {
        assert_eq!(parse_code_payload("47 1000"), Some(("47".to_string(), 1000)));
        assert_eq!(parse_code_payload("  47\t 1000 "), Some(("47".to_string(), 1000)));
        assert_eq!(parse_code_payload("abc"), None);
        assert_eq!(parse_code_payload("47"), None);
        assert_eq!(parse_code_payload("47 10 5"), None);
        assert_eq!(parse_code_payload("47 -10"), None);
        assert_eq!(parse_code_payload("47 99999999999"), None);
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id(" 6486825926 "), Some(6486825926));
        assert_eq!(parse_user_id("12a"), None);
        assert_eq!(parse_user_id("-5"), None);
        assert_eq!(parse_user_id(""), None);
    }

    #[tokio::test]
    async fn test_store_begin_take() {
        let store = ConversationStore::new();
        assert_eq!(store.current(1).await, ConversationState::Idle);

        store.begin(1, ConversationState::AwaitingCodeAdd).await;
        assert_eq!(store.current(1).await, ConversationState::AwaitingCodeAdd);
        assert_eq!(store.current(2).await, ConversationState::Idle);

        // A new flow replaces the pending one.
        store.begin(1, ConversationState::AwaitingAdminId).await;
        assert_eq!(store.current(1).await, ConversationState::AwaitingAdminId);

        assert_eq!(store.take(1).await, ConversationState::AwaitingAdminId);
        assert_eq!(store.current(1).await, ConversationState::Idle);
        assert_eq!(store.take(1).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_add_code_step() {
        let (_dir, registry) = temp_registry();
        let admins = AdminRegistry::new(Vec::new());

        let reply = complete_step(ConversationState::AwaitingCodeAdd, "abc", "@chan", &registry, &admins)
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("❌ Wrong format! Example: 47 1000"));
        assert_eq!(registry.count_codes().await.unwrap(), 0);

        complete_step(ConversationState::AwaitingCodeAdd, "47 100", "@chan", &registry, &admins)
            .await
            .unwrap();
        let locator = registry.find_code("47").await.unwrap().unwrap();
        assert_eq!(locator.channel, "@chan");
        assert_eq!(locator.content_id, 100);
    }

    #[tokio::test]
    async fn test_remove_code_step() {
        let (_dir, registry) = temp_registry();
        let admins = AdminRegistry::new(Vec::new());
        registry.save_code("9", "@chan", 3).await.unwrap();

        let reply = complete_step(ConversationState::AwaitingCodeRemoval, " 9 ", "@chan", &registry, &admins)
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("✅ Code removed: 9"));
        assert!(registry.find_code("9").await.unwrap().is_none());

        let reply = complete_step(ConversationState::AwaitingCodeRemoval, "hello", "@chan", &registry, &admins)
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("⚠️ Code hello was not in the list."));
    }

    #[tokio::test]
    async fn test_add_admin_step() {
        let (_dir, registry) = temp_registry();
        let admins = AdminRegistry::new(vec![1]);

        let reply = complete_step(ConversationState::AwaitingAdminId, "5", "@chan", &registry, &admins)
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("✅ Admin added: 5"));
        assert!(admins.is_admin(5).await);

        let reply = complete_step(ConversationState::AwaitingAdminId, "5", "@chan", &registry, &admins)
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("⚠️ This user is already an admin."));

        let reply = complete_step(ConversationState::AwaitingAdminId, "five", "@chan", &registry, &admins)
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("❌ Wrong ID!"));
        assert_eq!(admins.list().await, vec![1, 5]);
    }
}
