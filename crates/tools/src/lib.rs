//! Finance tool implementations for Pennywise.
//!
//! Each tool is a thin adapter between model-supplied JSON arguments and a
//! [`Ledger`] operation. Tools never see another user's data: the caller's
//! identity arrives in the `user_id` argument, injected by the agent loop.

mod args;

pub mod add_expense;
pub mod check_budgets;
pub mod set_budget;
pub mod spending_summary;

pub use add_expense::AddExpenseTool;
pub use check_budgets::CheckBudgetsTool;
pub use set_budget::SetBudgetTool;
pub use spending_summary::SpendingSummaryTool;

use pennywise_core::ledger::Ledger;
use pennywise_core::tool::ToolRegistry;
use std::sync::Arc;

/// Create the registry with all four finance tools over `ledger`.
pub fn default_registry(ledger: Arc<dyn Ledger>) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(AddExpenseTool::new(ledger.clone())))
        .with_tool(Arc::new(SpendingSummaryTool::new(ledger.clone())))
        .with_tool(Arc::new(SetBudgetTool::new(ledger.clone())))
        .with_tool(Arc::new(CheckBudgetsTool::new(ledger)))
}
