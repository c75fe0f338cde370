//! Ledger trait — persistent storage for expenses and budgets.
//!
//! Every query is scoped to a single owner identity; no operation ever reads
//! or writes another user's records.

use async_trait::async_trait;
use std::collections::BTreeMap;
use crate::error::LedgerError;
use crate::finance::{Budget, BudgetAlert, Category, Expense, NewExpense};

/// The core Ledger trait.
///
/// Implementations: SQLite, PostgreSQL, in-memory (for testing).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The backend name (e.g., "sqlite", "postgres", "memory").
    fn name(&self) -> &str;

    /// Persist a validated expense for `user_id`.
    async fn create_expense(
        &self,
        user_id: &str,
        expense: NewExpense,
    ) -> std::result::Result<Expense, LedgerError>;

    /// All expenses of `user_id`, newest first, optionally filtered.
    async fn list_expenses(
        &self,
        user_id: &str,
        category: Option<Category>,
    ) -> std::result::Result<Vec<Expense>, LedgerError>;

    /// Sum of expense amounts per category. Categories without expenses
    /// are absent.
    async fn totals_by_category(
        &self,
        user_id: &str,
    ) -> std::result::Result<BTreeMap<Category, f64>, LedgerError>;

    /// Create or replace the budget for (`user_id`, `category`).
    async fn set_budget(
        &self,
        user_id: &str,
        category: Category,
        amount: f64,
    ) -> std::result::Result<Budget, LedgerError>;

    /// All budgets of `user_id`, in category order.
    async fn list_budgets(&self, user_id: &str) -> std::result::Result<Vec<Budget>, LedgerError>;

    /// Can we reach the store?
    async fn health_check(&self) -> std::result::Result<bool, LedgerError>;

    /// Categories whose spending strictly exceeds the budget.
    async fn over_budget_alerts(
        &self,
        user_id: &str,
    ) -> std::result::Result<Vec<BudgetAlert>, LedgerError> {
        let budgets = self.list_budgets(user_id).await?;
        let totals = self.totals_by_category(user_id).await?;
        Ok(compute_alerts(&budgets, &totals))
    }
}

/// Compare budgets against spending totals.
pub fn compute_alerts(budgets: &[Budget], totals: &BTreeMap<Category, f64>) -> Vec<BudgetAlert> {
    budgets
        .iter()
        .filter_map(|budget| {
            let spent = totals.get(&budget.category).copied().unwrap_or(0.0);
            (spent > budget.amount).then(|| BudgetAlert {
                category: budget.category,
                budget: budget.amount,
                spent,
                overage: spent - budget.amount,
            })
        })
        .collect()
}
