//! PostgreSQL ledger backend.
//!
//! Mirrors the SQLite schema (see `migrations/001_create_ledger.sql`) with
//! native `TIMESTAMPTZ` columns.
//!
//! # Feature gate
//!
//! ```toml
//! pennywise-ledger = { workspace = true, features = ["postgres"] }
//! ```

use async_trait::async_trait;
use pennywise_core::error::LedgerError;
use pennywise_core::finance::{Budget, Category, Expense, NewExpense, validate_amount};
use pennywise_core::ledger::Ledger;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// PostgreSQL-backed ledger.
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Connect to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| LedgerError::Storage(format!("PostgreSQL connection failed: {e}")))?;

        info!("Connected to PostgreSQL ledger");
        Ok(Self { pool })
    }

    /// Create from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the schema migration.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        let migration_sql = include_str!("../migrations/001_create_ledger.sql");

        sqlx::raw_sql(migration_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::MigrationFailed(format!("Migration failed: {e}")))?;

        info!("Ledger schema migration complete");
        Ok(())
    }
}

fn parse_category(raw: &str) -> Result<Category, LedgerError> {
    raw.parse()
        .map_err(|_| LedgerError::QueryFailed(format!("unknown category in row: '{raw}'")))
}

fn row_to_expense(row: &PgRow) -> Result<Expense, LedgerError> {
    let category: String = row
        .try_get("category")
        .map_err(|e| LedgerError::QueryFailed(format!("category column: {e}")))?;
    Ok(Expense {
        id: row
            .try_get("id")
            .map_err(|e| LedgerError::QueryFailed(format!("id column: {e}")))?,
        amount: row
            .try_get("amount")
            .map_err(|e| LedgerError::QueryFailed(format!("amount column: {e}")))?,
        category: parse_category(&category)?,
        description: row
            .try_get("description")
            .map_err(|e| LedgerError::QueryFailed(format!("description column: {e}")))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| LedgerError::QueryFailed(format!("user_id column: {e}")))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| LedgerError::QueryFailed(format!("created_at column: {e}")))?,
    })
}

fn row_to_budget(row: &PgRow) -> Result<Budget, LedgerError> {
    let category: String = row
        .try_get("category")
        .map_err(|e| LedgerError::QueryFailed(format!("category column: {e}")))?;
    Ok(Budget {
        id: row
            .try_get("id")
            .map_err(|e| LedgerError::QueryFailed(format!("id column: {e}")))?,
        category: parse_category(&category)?,
        amount: row
            .try_get("amount")
            .map_err(|e| LedgerError::QueryFailed(format!("amount column: {e}")))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| LedgerError::QueryFailed(format!("user_id column: {e}")))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| LedgerError::QueryFailed(format!("created_at column: {e}")))?,
    })
}

#[async_trait]
impl Ledger for PostgresLedger {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn create_expense(
        &self,
        user_id: &str,
        expense: NewExpense,
    ) -> Result<Expense, LedgerError> {
        let row = sqlx::query(
            "INSERT INTO expenses (amount, category, description, user_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, amount, category, description, user_id, created_at",
        )
        .bind(expense.amount())
        .bind(expense.category().as_str())
        .bind(expense.description())
        .bind(user_id)
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
        let rows = sqlx::query(
            "SELECT id, amount, category, description, user_id, created_at FROM expenses \
             WHERE user_id = $1 AND ($2::TEXT IS NULL OR category = $2) \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::QueryFailed(format!("list expenses: {e}")))?;

        rows.iter().map(row_to_expense).collect()
    }

    async fn totals_by_category(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<Category, f64>, LedgerError> {
        let rows = sqlx::query(
            "SELECT category, SUM(amount) AS total FROM expenses WHERE user_id = $1 GROUP BY category",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::QueryFailed(format!("totals by category: {e}")))?;

        let mut totals = BTreeMap::new();
        for row in &rows {
            let category: String = row
                .try_get("category")
                .map_err(|e| LedgerError::QueryFailed(format!("category column: {e}")))?;
            let total: f64 = row
                .try_get("total")
                .map_err(|e| LedgerError::QueryFailed(format!("total column: {e}")))?;
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
            "INSERT INTO budgets (category, amount, user_id) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, category) DO UPDATE SET amount = EXCLUDED.amount \
             RETURNING id, category, amount, user_id, created_at",
        )
        .bind(category.as_str())
        .bind(amount)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("UPSERT budget failed: {e}")))?;

        row_to_budget(&row)
    }

    async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>, LedgerError> {
        let rows = sqlx::query(
            "SELECT id, category, amount, user_id, created_at FROM budgets WHERE user_id = $1",
        )
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
