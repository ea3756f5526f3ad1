//! PostgreSQL snapshot store
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE banks (
//!     id      SMALLINT PRIMARY KEY,
//!     name    TEXT UNIQUE NOT NULL,
//!     balance BIGINT NOT NULL DEFAULT 0
//! );
//! CREATE TABLE accounts (
//!     bank_id SMALLINT REFERENCES banks(id),
//!     account BIGINT NOT NULL,
//!     balance INTEGER NOT NULL DEFAULT 0,
//!     PRIMARY KEY (bank_id, account)
//! );
//! ```

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;

use super::repository::SnapshotStore;
use crate::core_types::{AccountNo, BankId};
use crate::snapshot::{AccountSnapshot, BankSnapshot, SnapshotError};

const BANK_COUNT_Q: &str = "SELECT COUNT(*) AS n FROM banks";
const BANK_LOAD_Q: &str = "SELECT id, name, balance FROM banks ORDER BY id";
const ACCOUNT_LOAD_Q: &str = r#"SELECT b.name, a.bank_id, a.account, a.balance
    FROM accounts a JOIN banks b ON b.id = a.bank_id
    ORDER BY a.bank_id, a.account"#;
const BANK_UPDATE_Q: &str = "UPDATE banks SET balance = $2 WHERE id = $1";
const ACCOUNT_UPSERT_Q: &str = r#"INSERT INTO accounts (bank_id, account, balance)
    VALUES ($1, $2, $3)
    ON CONFLICT (bank_id, account) DO UPDATE SET balance = EXCLUDED.balance"#;

pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, SnapshotError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!(target: "PERSIST", max_connections, "PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), SnapshotError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn bank_id_from(table: &'static str, raw: i16) -> Result<BankId, SnapshotError> {
    BankId::try_from(raw).map_err(|_| SnapshotError::decode(table, format!("bank id {}", raw)))
}

fn decode_bank(row: &PgRow) -> Result<BankSnapshot, SnapshotError> {
    let decode = |e: sqlx::Error| SnapshotError::decode("banks", e.to_string());
    Ok(BankSnapshot {
        bank_id: bank_id_from("banks", row.try_get::<i16, _>("id").map_err(decode)?)?,
        name: row.try_get("name").map_err(decode)?,
        balance: row.try_get("balance").map_err(decode)?,
    })
}

fn decode_account(row: &PgRow) -> Result<AccountSnapshot, SnapshotError> {
    let decode = |e: sqlx::Error| SnapshotError::decode("accounts", e.to_string());
    let raw_account: i64 = row.try_get("account").map_err(decode)?;
    let account = AccountNo::try_from(raw_account)
        .map_err(|_| SnapshotError::decode("accounts", format!("account {}", raw_account)))?;
    Ok(AccountSnapshot {
        bank_name: row.try_get("name").map_err(decode)?,
        bank_id: bank_id_from("accounts", row.try_get::<i16, _>("bank_id").map_err(decode)?)?,
        account,
        balance: row.try_get("balance").map_err(decode)?,
    })
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn bank_count(&self) -> Result<usize, SnapshotError> {
        let row = sqlx::query(BANK_COUNT_Q).fetch_one(&self.pool).await?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| SnapshotError::decode("banks", e.to_string()))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    async fn load_banks(&self) -> Result<Vec<BankSnapshot>, SnapshotError> {
        let rows = sqlx::query(BANK_LOAD_Q).fetch_all(&self.pool).await?;
        rows.iter().map(decode_bank).collect()
    }

    async fn load_accounts(&self) -> Result<Vec<AccountSnapshot>, SnapshotError> {
        let rows = sqlx::query(ACCOUNT_LOAD_Q).fetch_all(&self.pool).await?;
        rows.iter().map(decode_account).collect()
    }

    async fn upsert_bank(&self, row: &BankSnapshot) -> Result<(), SnapshotError> {
        sqlx::query(BANK_UPDATE_Q)
            .bind(row.bank_id as i16)
            .bind(row.balance)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_account(&self, row: &AccountSnapshot) -> Result<(), SnapshotError> {
        sqlx::query(ACCOUNT_UPSERT_Q)
            .bind(row.bank_id as i16)
            .bind(i64::from(row.account))
            .bind(row.balance)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
