use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};

const DB_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Creates the database file and tables if they do not exist yet.
pub fn init_database(path: &Path) -> rusqlite::Result<()> {
    let conn = open_connection(path)?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            telegram_id INTEGER PRIMARY KEY,
            joined_at   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE IF NOT EXISTS codes (
            code       TEXT PRIMARY KEY,
            channel    TEXT NOT NULL,
            content_id INTEGER NOT NULL
        );",
    )?;
    Ok(())
}

/// Small pool of SQLite connections. Every operation runs on the blocking
/// thread pool and is bounded by a timeout.
pub struct DatabasePool {
    path: PathBuf,
    idle: Arc<Mutex<Vec<Connection>>>,
    permits: Arc<Semaphore>,
    op_timeout: Duration,
}

impl DatabasePool {
    pub fn new(path: PathBuf, max_connections: usize) -> Self {
        Self {
            path,
            idle: Arc::new(Mutex::new(Vec::with_capacity(max_connections))),
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
            op_timeout: DB_OPERATION_TIMEOUT,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn execute_with_timeout<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| anyhow!("Database pool closed: {}", e))?;

        let idle = Arc::clone(&self.idle);
        let path = self.path.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<T> {
            let pooled = idle.lock().ok().and_then(|mut conns| conns.pop());
            let conn = match pooled {
                Some(conn) => conn,
                None => open_connection(&path)?,
            };

            let result = f(&conn);

            // A poisoned idle list only costs us a reconnect next time.
            if let Ok(mut conns) = idle.lock() {
                conns.push(conn);
            }
            result.map_err(Into::into)
        });

        match timeout(self.op_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(anyhow!("Database task failed: {}", join_err)),
            Err(_) => Err(anyhow!("Database operation timed out after {:?}", self.op_timeout)),
        }
    }
}
