//! SQLite ledger backend.
//!
//! Two tables:
//! - `expenses` — one row per recorded expense, indexed by owner and category
//! - `budgets` — one row per (owner, category), enforced by a unique index
//!
//! Timestamps are stored as fixed-width RFC 3339 text so lexical order is
//! chronological order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pennywise_core::error::LedgerError;
use pennywise_core::finance::{Budget, Category, Expense, NewExpense, validate_amount};
use pennywise_core::ledger::Ledger;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed ledger with a connection pool.
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open (or create) the database at `url` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    /// An in-memory database is private to each connection, so the pool is
    /// pinned to a single connection in that case.
    pub async fn new(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| LedgerError::Storage(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let max_connections = if url.contains(":memory:") {
            1
        } else {
            max_connections.max(1)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| LedgerError::Storage(format!("Failed to open SQLite: {e}")))?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;
        info!("SQLite ledger initialized at {url}");
        Ok(ledger)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, LedgerError> {
        let ledger = Self { pool };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS expenses (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                amount      REAL NOT NULL CHECK (amount > 0),
                category    TEXT NOT NULL,
                description TEXT NOT NULL,
                user_id     TEXT NOT NULL DEFAULT 'default_user',
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::MigrationFailed(format!("expenses table: {e}")))?;

        for (name, sql) in [
            (
                "user_id index",
                "CREATE INDEX IF NOT EXISTS idx_expenses_user_id ON expenses(user_id)",
            ),
            (
                "category index",
                "CREATE INDEX IF NOT EXISTS idx_expenses_category ON expenses(category)",
            ),
            (
                "user/category index",
                "CREATE INDEX IF NOT EXISTS idx_user_category ON expenses(user_id, category)",
            ),
        ] {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| LedgerError::MigrationFailed(format!("{name}: {e}")))?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS budgets (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                category    TEXT NOT NULL,
                amount      REAL NOT NULL CHECK (amount > 0),
                user_id     TEXT NOT NULL DEFAULT 'default_user',
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::MigrationFailed(format!("budgets table: {e}")))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_user_budget_category ON budgets(user_id, category)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::MigrationFailed(format!("budget unique index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::QueryFailed(format!("bad created_at '{raw}': {e}")))
}

fn parse_category(raw: &str) -> Result<Category, LedgerError> {
    raw.parse()
        .map_err(|_| LedgerError::QueryFailed(format!("unknown category in row: '{raw}'")))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, LedgerError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| LedgerError::QueryFailed(format!("{name} column: {e}")))
}

fn row_to_expense(row: &SqliteRow) -> Result<Expense, LedgerError> {
    let category: String = column(row, "category")?;
    let created_at: String = column(row, "created_at")?;
    Ok(Expense {
        id: column(row, "id")?,
        amount: column(row, "amount")?,
        category: parse_category(&category)?,
        description: column(row, "description")?,
        user_id: column(row, "user_id")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn row_to_budget(row: &SqliteRow) -> Result<Budget, LedgerError> {
    let category: String = column(row, "category")?;
    let created_at: String = column(row, "created_at")?;
    Ok(Budget {
        id: column(row, "id")?,
        category: parse_category(&category)?,
        amount: column(row, "amount")?,
        user_id: column(row, "user_id")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl Ledger for SqliteLedger {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_expense(
        &self,
        user_id: &str,
        expense: NewExpense,
    ) -> Result<Expense, LedgerError> {
        let created_at = timestamp(Utc::now());
        let row = sqlx::query(
            r#"
            INSERT INTO expenses (amount, category, description, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, amount, category, description, user_id, created_at
            "#,
        )
        .bind(expense.amount())
        .bind(expense.category().as_str())
        .bind(expense.description())
        .bind(user_id)
        .bind(&created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("INSERT expense failed: {e}")))?;

        let stored = row_to_expense(&row)?;
        debug!(id = stored.id, user_id, "Stored expense");
        Ok(stored)
    }

    async fn list_expenses(
        &self,
        user_id: &str,
        category: Option<Category>,
    ) -> Result<Vec<Expense>, LedgerError> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    "SELECT * FROM expenses WHERE user_id = ?1 AND category = ?2 \
                     ORDER BY created_at DESC, id DESC",
                )
                .bind(user_id)
                .bind(category.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT * FROM expenses WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| LedgerError::QueryFailed(format!("list expenses: {e}")))?;

        rows.iter().map(row_to_expense).collect()
    }

    async fn totals_by_category(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<Category, f64>, LedgerError> {
        let rows = sqlx::query(
            "SELECT category, SUM(amount) AS total FROM expenses WHERE user_id = ?1 GROUP BY category",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::QueryFailed(format!("totals by category: {e}")))?;

        let mut totals = BTreeMap::new();
        for row in &rows {
            let category: String = column(row, "category")?;
            let total: f64 = column(row, "total")?;
            totals.insert(parse_category(&category)?, total);
        }
        Ok(totals)
    }

    async fn set_budget(
        &self,
        user_id: &str,
        category: Category,
        amount: f64,
    ) -> Result<Budget, LedgerError> {
        let amount = validate_amount(amount)?;
        let row = sqlx::query(
            r#"
            INSERT INTO budgets (category, amount, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, category) DO UPDATE SET amount = excluded.amount
            RETURNING id, category, amount, user_id, created_at
            "#,
        )
        .bind(category.as_str())
        .bind(amount)
        .bind(user_id)
        .bind(timestamp(Utc::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("UPSERT budget failed: {e}")))?;

        row_to_budget(&row)
    }

    async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>, LedgerError> {
        let rows = sqlx::query("SELECT * FROM budgets WHERE user_id = ?1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LedgerError::QueryFailed(format!("list budgets: {e}")))?;

        let mut budgets = rows
            .iter()
            .map(row_to_budget)
            .collect::<Result<Vec<_>, _>>()?;
        budgets.sort_by_key(|b| b.category);
        Ok(budgets)
    }

    async fn health_check(&self) -> Result<bool, LedgerError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| LedgerError::Storage(format!("health check: {e}")))
    }
}
