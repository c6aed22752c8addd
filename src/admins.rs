use std::collections::HashSet;

use tokio::sync::RwLock;

/// Privileged user ids. Seeded from config at startup and only ever grows.
/// Lives in memory, so ids added at runtime are gone after a restart.
pub struct AdminRegistry {
    ids: RwLock<HashSet<i64>>,
}

impl AdminRegistry {
    pub fn new<I: IntoIterator<Item = i64>>(seed: I) -> Self {
        Self {
            ids: RwLock::new(seed.into_iter().collect()),
        }
    }

    pub async fn is_admin(&self, user_id: i64) -> bool {
        self.ids.read().await.contains(&user_id)
    }

    /// Returns `false` without changing anything if the id is already an admin.
    pub async fn add_admin(&self, user_id: i64) -> bool {
        let added = self.ids.write().await.insert(user_id);
        if added {
            log::info!("Admin added: {}", user_id);
        }
        added
    }

    pub async fn list(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.ids.read().await.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_admins() {
        let admins = AdminRegistry::new(vec![123456, 789012]);
        assert!(admins.is_admin(123456).await);
        assert!(admins.is_admin(789012).await);
        assert!(!admins.is_admin(555555).await);
    }

    #[tokio::test]
    async fn test_add_admin_is_idempotent() {
        let admins = AdminRegistry::new(Vec::new());
        assert!(!admins.is_admin(5).await);

        assert!(admins.add_admin(5).await);
        assert!(admins.is_admin(5).await);

        assert!(!admins.add_admin(5).await);
        assert!(admins.is_admin(5).await);
        assert_eq!(admins.list().await, vec![5]);
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let admins = AdminRegistry::new(vec![30, 10]);
        admins.add_admin(20).await;
        assert_eq!(admins.list().await, vec![10, 20, 30]);
    }
}
