use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::database::DatabasePool;

/// Where a redeemable piece of content lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentLocator {
    pub channel: String,
    pub content_id: i32,
}

/// Durable users and codes. Keys are independent; there are no cross-key
/// transactions.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    #[allow(dead_code)]
    async fn list_user_ids(&self) -> Result<Vec<i64>>;
    /// Idempotent: saving a known user is a no-op.
    async fn save_user(&self, user_id: i64) -> Result<()>;
    async fn list_codes(&self) -> Result<BTreeMap<String, ContentLocator>>;
    async fn find_code(&self, code: &str) -> Result<Option<ContentLocator>>;
    /// Upsert: replaces the whole locator of an existing code.
    async fn save_code(&self, code: &str, channel: &str, content_id: i32) -> Result<()>;
    /// Returns whether a code was actually deleted.
    async fn remove_code(&self, code: &str) -> Result<bool>;
    async fn count_users(&self) -> Result<i64>;
    async fn count_codes(&self) -> Result<i64>;
}

pub struct SqliteRegistry {
    pool: Arc<DatabasePool>,
}

impl SqliteRegistry {
    pub fn new(pool: Arc<DatabasePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistryStore for SqliteRegistry {
    async fn list_user_ids(&self) -> Result<Vec<i64>> {
        self.pool
            .execute_with_timeout(|conn| {
                let mut stmt = conn.prepare("SELECT telegram_id FROM users")?;
                let users_iter = stmt.query_map([], |row| row.get::<_, i64>(0))?;
                let mut users = Vec::new();
                for user_result in users_iter {
                    users.push(user_result?);
                }
                Ok(users)
            })
            .await
    }

    async fn save_user(&self, user_id: i64) -> Result<()> {
        self.pool
            .execute_with_timeout(move |conn| {
                conn.execute("INSERT OR IGNORE INTO users (telegram_id) VALUES (?1)", [user_id])?;
                Ok(())
            })
            .await
    }

    async fn list_codes(&self) -> Result<BTreeMap<String, ContentLocator>> {
        self.pool
            .execute_with_timeout(|conn| {
                let mut stmt = conn.prepare("SELECT code, channel, content_id FROM codes")?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        ContentLocator {
                            channel: row.get(1)?,
                            content_id: row.get(2)?,
                        },
                    ))
                })?;
                rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()
            })
            .await
    }

    async fn find_code(&self, code: &str) -> Result<Option<ContentLocator>> {
        let code = code.to_string();
        self.pool
            .execute_with_timeout(move |conn| {
                conn.query_row(
                    "SELECT channel, content_id FROM codes WHERE code = ?1",
                    [code],
                    |row| {
                        Ok(ContentLocator {
                            channel: row.get(0)?,
                            content_id: row.get(1)?,
                        })
                    },
                )
                .optional()
            })
            .await
    }

    async fn save_code(&self, code: &str, channel: &str, content_id: i32) -> Result<()> {
        let code = code.to_string();
        let channel = channel.to_string();
        self.pool
            .execute_with_timeout(move |conn| {
                conn.execute(
                    "INSERT INTO codes (code, channel, content_id) VALUES (?1, ?2, ?3)
                     ON CONFLICT(code) DO UPDATE SET
                         channel = excluded.channel,
                         content_id = excluded.content_id",
                    params![code, channel, content_id],
                )?;
                Ok(())
            })
            .await
    }

    async fn remove_code(&self, code: &str) -> Result<bool> {
        let code = code.to_string();
        self.pool
            .execute_with_timeout(move |conn| {
                let deleted = conn.execute("DELETE FROM codes WHERE code = ?1", [code])?;
                Ok(deleted > 0)
            })
            .await
    }

    async fn count_users(&self) -> Result<i64> {
        self.pool
            .execute_with_timeout(|conn| conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)))
            .await
    }

    async fn count_codes(&self) -> Result<i64> {
        self.pool
            .execute_with_timeout(|conn| conn.query_row("SELECT COUNT(*) FROM codes", [], |row| row.get(0)))
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database::init_database;
    use tempfile::TempDir;

    /// Registry over a throwaway database file. Keep the `TempDir` alive for
    /// as long as the registry is used.
    pub(crate) fn temp_registry() -> (TempDir, SqliteRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        init_database(&path).unwrap();
        let registry = SqliteRegistry::new(Arc::new(DatabasePool::new(path, 2)));
        (dir, registry)
    }

    #[tokio::test]
    async fn test_save_user_is_idempotent() {
        let (_dir, registry) = temp_registry();
        registry.save_user(42).await.unwrap();
        registry.save_user(42).await.unwrap();
        registry.save_user(7).await.unwrap();

        let mut users = registry.list_user_ids().await.unwrap();
        users.sort();
        assert_eq!(users, vec![7, 42]);
        assert_eq!(registry.count_users().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_save_code_overwrites_locator() {
        let (_dir, registry) = temp_registry();
        registry.save_code("47", "chanA", 100).await.unwrap();
        registry.save_code("47", "chanA", 200).await.unwrap();

        let codes = registry.list_codes().await.unwrap();
        assert_eq!(codes.len(), 1);
        assert_eq!(
            codes.get("47"),
            Some(&ContentLocator { channel: "chanA".to_string(), content_id: 200 })
        );
        assert_eq!(registry.count_codes().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_removed_code_is_a_miss() {
        let (_dir, registry) = temp_registry();
        registry.save_code("9", "@chan", 5).await.unwrap();
        assert!(registry.find_code("9").await.unwrap().is_some());

        assert!(registry.remove_code("9").await.unwrap());
        assert_eq!(registry.find_code("9").await.unwrap(), None);
        assert!(!registry.list_codes().await.unwrap().contains_key("9"));
    }

    #[tokio::test]
    async fn test_remove_missing_code_is_not_an_error() {
        let (_dir, registry) = temp_registry();
        assert!(!registry.remove_code("nope").await.unwrap());
        assert_eq!(registry.count_codes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_codes_keep_leading_zeros() {
        let (_dir, registry) = temp_registry();
        registry.save_code("007", "@chan", 1).await.unwrap();
        assert!(registry.find_code("007").await.unwrap().is_some());
        assert!(registry.find_code("7").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_on_different_keys() {
        let (_dir, registry) = temp_registry();
        let registry = Arc::new(registry);

        let mut tasks = Vec::new();
        for i in 0..50i32 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.save_user(i64::from(i)).await?;
                registry.save_code(&i.to_string(), "@chan", i).await
            }));
        }

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(registry.count_users().await.unwrap(), 50);
        assert_eq!(registry.count_codes().await.unwrap(), 50);
        assert_eq!(
            registry.find_code("17").await.unwrap(),
            Some(ContentLocator { channel: "@chan".to_string(), content_id: 17 })
        );
    }
}
