use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::UserWalletMapping;

/// SQLite-backed identity store.
///
/// `user_address` is the primary key, so the storage layer itself guarantees
/// at most one mapping per primary address.
#[derive(Clone)]
pub struct WalletStore {
    conn: Arc<Mutex<Connection>>,
}

impl WalletStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open wallet db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory wallet db")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_wallets (
                user_address TEXT PRIMARY KEY,
                sub_wallet_address TEXT UNIQUE NOT NULL,
                sub_wallet_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_used TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn get(&self, user_address: &str) -> Result<Option<UserWalletMapping>> {
        let conn = self.conn.lock().await;
        let mapping = conn
            .query_row(
                "SELECT user_address, sub_wallet_address, sub_wallet_id, created_at, last_used
                 FROM user_wallets WHERE user_address = ?1",
                params![user_address],
                row_to_mapping,
            )
            .optional()?;
        Ok(mapping)
    }

    /// Insert unless a mapping for the same primary address exists.
    /// Returns `true` when this call's row was stored.
    pub async fn insert_if_absent(&self, mapping: &UserWalletMapping) -> Result<bool> {
        let conn = self.conn.lock().await;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO user_wallets
                 (user_address, sub_wallet_address, sub_wallet_id, created_at, last_used)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    mapping.user_address,
                    mapping.sub_wallet_address,
                    mapping.sub_wallet_id,
                    mapping.created_at,
                    mapping.last_used,
                ],
            )
            .context("Failed to create user wallet")?;
        Ok(inserted == 1)
    }

    pub async fn touch(&self, user_address: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE user_wallets SET last_used = ?2 WHERE user_address = ?1",
            params![user_address, at],
        )?;
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM user_wallets", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Raw SQL against the store, for breaking it on purpose in tests.
    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().await.execute_batch(sql)?;
        Ok(())
    }
}

fn row_to_mapping(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserWalletMapping> {
    Ok(UserWalletMapping {
        user_address: row.get(0)?,
        sub_wallet_address: row.get(1)?,
        sub_wallet_id: row.get(2)?,
        created_at: row.get(3)?,
        last_used: row.get(4)?,
    })
}
