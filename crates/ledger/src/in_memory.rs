//! In-memory ledger — useful for testing and throwaway sessions.

use async_trait::async_trait;
use chrono::Utc;
use pennywise_core::error::LedgerError;
use pennywise_core::finance::{Budget, Category, Expense, NewExpense, validate_amount};
use pennywise_core::ledger::Ledger;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    expenses: Vec<Expense>,
    budgets: Vec<Budget>,
    next_expense_id: i64,
    next_budget_id: i64,
}

/// A ledger that keeps everything in process memory.
pub struct InMemoryLedger {
    tables: RwLock<Tables>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_expense(
        &self,
        user_id: &str,
        expense: NewExpense,
    ) -> Result<Expense, LedgerError> {
        let mut tables = self.tables.write().await;
        tables.next_expense_id += 1;
        let stored = Expense {
            id: tables.next_expense_id,
            amount: expense.amount(),
            category: expense.category(),
            description: expense.description().to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        tables.expenses.push(stored.clone());
        Ok(stored)
    }

    async fn list_expenses(
        &self,
        user_id: &str,
        category: Option<Category>,
    ) -> Result<Vec<Expense>, LedgerError> {
        let tables = self.tables.read().await;
        // Insertion order is chronological; reverse for newest first.
        Ok(tables
            .expenses
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .filter(|e| category.is_none_or(|c| e.category == c))
            .cloned()
            .collect())
    }

    async fn totals_by_category(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<Category, f64>, LedgerError> {
        let tables = self.tables.read().await;
        let mut totals = BTreeMap::new();
        for expense in tables.expenses.iter().filter(|e| e.user_id == user_id) {
            *totals.entry(expense.category).or_insert(0.0) += expense.amount;
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
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables
            .budgets
            .iter_mut()
            .find(|b| b.user_id == user_id && b.category == category)
        {
            existing.amount = amount;
            return Ok(existing.clone());
        }

        tables.next_budget_id += 1;
        let budget = Budget {
            id: tables.next_budget_id,
            category,
            amount,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        tables.budgets.push(budget.clone());
        Ok(budget)
    }

    async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>, LedgerError> {
        let tables = self.tables.read().await;
        let mut budgets: Vec<Budget> = tables
            .budgets
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        budgets.sort_by_key(|b| b.category);
        Ok(budgets)
    }

    async fn health_check(&self) -> Result<bool, LedgerError> {
        Ok(true)
    }
}
