use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::models::{Asset, Portfolio, Transaction, TransactionKind, TransactionStatus};

/// Portfolio, asset and ledger tables.
#[derive(Clone)]
pub struct PortfolioDb {
    conn: Arc<Mutex<Connection>>,
}

impl PortfolioDb {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open portfolio db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory portfolio db")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS portfolios (
                id TEXT PRIMARY KEY,
                owner_address TEXT NOT NULL,
                name TEXT NOT NULL,
                smart_account_address TEXT NOT NULL,
                total_value REAL NOT NULL DEFAULT 0,
                change_24h REAL NOT NULL DEFAULT 0,
                change_24h_percentage REAL NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_portfolios_owner ON portfolios(owner_address, created_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS assets (
                portfolio_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                address TEXT NOT NULL,
                weight REAL NOT NULL,
                amount REAL NOT NULL DEFAULT 0,
                current_value REAL NOT NULL DEFAULT 0,
                price_usd REAL NOT NULL DEFAULT 0,
                change_24h REAL NOT NULL DEFAULT 0,
                PRIMARY KEY (portfolio_id, symbol)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                portfolio_id TEXT NOT NULL,
                owner_address TEXT NOT NULL,
                kind TEXT NOT NULL,
                amount REAL NOT NULL,
                status TEXT NOT NULL,
                settlement_ref TEXT,
                error_detail TEXT,
                created_at INTEGER NOT NULL,
                finalized_at INTEGER
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_portfolio ON transactions(portfolio_id, created_at DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status, created_at ASC)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a portfolio with its assets. If any asset row fails, the
    /// portfolio row and the assets written so far are deleted again.
    pub async fn create_portfolio(&self, portfolio: &Portfolio) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO portfolios
             (id, owner_address, name, smart_account_address, total_value, change_24h,
              change_24h_percentage, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                portfolio.id,
                portfolio.owner_address,
                portfolio.name,
                portfolio.smart_account_address,
                portfolio.total_value,
                portfolio.change_24h,
                portfolio.change_24h_percentage,
                portfolio.is_active,
                portfolio.created_at.timestamp_millis(),
                portfolio.updated_at.timestamp_millis(),
            ],
        )
        .context("Failed to create portfolio")?;

        for (position, asset) in portfolio.assets.iter().enumerate() {
            let inserted = conn.execute(
                "INSERT INTO assets
                 (portfolio_id, symbol, position, name, address, weight, amount,
                  current_value, price_usd, change_24h)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    portfolio.id,
                    asset.symbol,
                    position as i64,
                    asset.name,
                    asset.address,
                    asset.weight,
                    asset.amount,
                    asset.current_value,
                    asset.price_usd,
                    asset.change_24h,
                ],
            );

            if let Err(e) = inserted {
                warn!(portfolio_id = %portfolio.id, symbol = %asset.symbol, "asset insert failed, removing portfolio");
                delete_portfolio_rows(&conn, &portfolio.id)?;
                return Err(e).context("Failed to create portfolio assets");
            }
        }

        Ok(())
    }

    pub async fn get_portfolio(&self, id: &str) -> Result<Option<Portfolio>> {
        let conn = self.conn.lock().await;
        let portfolio = conn
            .query_row(
                &format!("{} WHERE id = ?1", PORTFOLIO_SELECT),
                params![id],
                row_to_portfolio,
            )
            .optional()?;

        match portfolio {
            Some(mut p) => {
                p.assets = load_assets(&conn, &p.id)?;
                Ok(Some(p))
            }
            None => Ok(None),
        }
    }

    /// Newest first.
    pub async fn list_by_owner(&self, owner_address: &str) -> Result<Vec<Portfolio>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "{} WHERE owner_address = ?1 ORDER BY created_at DESC, id ASC",
            PORTFOLIO_SELECT
        ))?;
        let portfolios = stmt
            .query_map(params![owner_address], row_to_portfolio)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        let mut out = Vec::with_capacity(portfolios.len());
        for mut p in portfolios {
            p.assets = load_assets(&conn, &p.id)?;
            out.push(p);
        }
        Ok(out)
    }

    /// Persist amounts, values and portfolio totals in one SQLite transaction.
    pub async fn update_holdings(&self, portfolio: &Portfolio) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        for asset in &portfolio.assets {
            tx.execute(
                "UPDATE assets
                 SET amount = ?3, current_value = ?4, price_usd = ?5, change_24h = ?6
                 WHERE portfolio_id = ?1 AND symbol = ?2",
                params![
                    portfolio.id,
                    asset.symbol,
                    asset.amount,
                    asset.current_value,
                    asset.price_usd,
                    asset.change_24h,
                ],
            )?;
        }

        let updated = tx.execute(
            "UPDATE portfolios
             SET total_value = ?2, change_24h = ?3, change_24h_percentage = ?4,
                 is_active = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                portfolio.id,
                portfolio.total_value,
                portfolio.change_24h,
                portfolio.change_24h_percentage,
                portfolio.is_active,
                portfolio.updated_at.timestamp_millis(),
            ],
        )?;
        if updated == 0 {
            anyhow::bail!("portfolio {} no longer exists", portfolio.id);
        }

        tx.commit().context("Failed to update holdings")?;
        Ok(())
    }

    pub async fn insert_transaction(&self, t: &Transaction) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO transactions
             (id, portfolio_id, owner_address, kind, amount, status, settlement_ref,
              error_detail, created_at, finalized_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                t.id,
                t.portfolio_id,
                t.owner_address,
                t.kind.as_str(),
                t.amount,
                t.status.as_str(),
                t.settlement_ref,
                t.error_detail,
                t.created_at.timestamp_millis(),
                t.finalized_at.map(|at| at.timestamp_millis()),
            ],
        )
        .context("Failed to create transaction")?;
        Ok(())
    }

    /// Move a pending entry to a terminal status. Returns `false` when no
    /// pending entry with that id exists.
    pub async fn finalize_transaction(
        &self,
        id: &str,
        status: TransactionStatus,
        settlement_ref: Option<&str>,
        error_detail: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE transactions
             SET status = ?2, settlement_ref = COALESCE(?3, settlement_ref),
                 error_detail = ?4, finalized_at = ?5
             WHERE id = ?1 AND status = 'pending'",
            params![id, status.as_str(), settlement_ref, error_detail, at.timestamp_millis()],
        )?;
        Ok(changed == 1)
    }

    pub async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn.lock().await;
        let t = conn
            .query_row(
                &format!("{} WHERE id = ?1", TRANSACTION_SELECT),
                params![id],
                row_to_transaction,
            )
            .optional()?;
        Ok(t)
    }

    /// Newest first.
    pub async fn list_transactions(&self, portfolio_id: &str) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "{} WHERE portfolio_id = ?1 ORDER BY created_at DESC, rowid DESC",
            TRANSACTION_SELECT
        ))?;
        let rows = stmt
            .query_map(params![portfolio_id], row_to_transaction)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Entries still pending that were created at or before `cutoff`, oldest first.
    pub async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "{} WHERE status = 'pending' AND created_at <= ?1 ORDER BY created_at ASC",
            TRANSACTION_SELECT
        ))?;
        let rows = stmt
            .query_map(params![cutoff.timestamp_millis()], row_to_transaction)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Raw SQL against the store, for breaking it on purpose in tests.
    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().await.execute_batch(sql)?;
        Ok(())
    }
}

const PORTFOLIO_SELECT: &str = "SELECT id, owner_address, name, smart_account_address, total_value,
        change_24h, change_24h_percentage, is_active, created_at, updated_at
     FROM portfolios";

const TRANSACTION_SELECT: &str = "SELECT id, portfolio_id, owner_address, kind, amount, status,
        settlement_ref, error_detail, created_at, finalized_at
     FROM transactions";

fn delete_portfolio_rows(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM assets WHERE portfolio_id = ?1", params![id])?;
    conn.execute("DELETE FROM portfolios WHERE id = ?1", params![id])?;
    Ok(())
}

fn load_assets(conn: &Connection, portfolio_id: &str) -> Result<Vec<Asset>> {
    let mut stmt = conn.prepare_cached(
        "SELECT symbol, name, address, weight, amount, current_value, price_usd, change_24h
         FROM assets WHERE portfolio_id = ?1 ORDER BY position ASC",
    )?;
    let assets = stmt
        .query_map(params![portfolio_id], |row| {
            Ok(Asset {
                symbol: row.get(0)?,
                name: row.get(1)?,
                address: row.get(2)?,
                weight: row.get(3)?,
                amount: row.get(4)?,
                current_value: row.get(5)?,
                price_usd: row.get(6)?,
                change_24h: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(assets)
}

fn row_to_portfolio(row: &rusqlite::Row<'_>) -> rusqlite::Result<Portfolio> {
    Ok(Portfolio {
        id: row.get(0)?,
        owner_address: row.get(1)?,
        name: row.get(2)?,
        smart_account_address: row.get(3)?,
        total_value: row.get(4)?,
        change_24h: row.get(5)?,
        change_24h_percentage: row.get(6)?,
        is_active: row.get(7)?,
        created_at: from_millis(row.get(8)?),
        updated_at: from_millis(row.get(9)?),
        assets: Vec::new(),
    })
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let kind: String = row.get(3)?;
    let status: String = row.get(5)?;
    let finalized_at: Option<i64> = row.get(9)?;

    Ok(Transaction {
        id: row.get(0)?,
        portfolio_id: row.get(1)?,
        owner_address: row.get(2)?,
        kind: TransactionKind::from_str(&kind).ok_or_else(|| invalid_text(3, &kind))?,
        amount: row.get(4)?,
        status: TransactionStatus::from_str(&status).ok_or_else(|| invalid_text(5, &status))?,
        settlement_ref: row.get(6)?,
        error_detail: row.get(7)?,
        created_at: from_millis(row.get(8)?),
        finalized_at: finalized_at.map(from_millis),
    })
}

fn invalid_text(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unexpected value '{}'", value).into(),
    )
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

/// Current time at the precision the tables store.
pub fn now_millis() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis())
}
