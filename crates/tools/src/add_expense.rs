//! Add expense tool — records a purchase in the ledger.

use async_trait::async_trait;
use pennywise_core::error::ToolError;
use pennywise_core::finance::{Category, NewExpense};
use pennywise_core::ledger::Ledger;
use pennywise_core::tool::{ParamSpec, Tool, ToolArgs, ToolName, ToolResult, ToolSchema};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use crate::args::{lenient_f64, parse_args};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddExpenseArgs {
    #[serde(deserialize_with = "lenient_f64")]
    amount: f64,
    category: String,
    description: String,
    user_id: String,
}

pub struct AddExpenseTool {
    ledger: Arc<dyn Ledger>,
}

impl AddExpenseTool {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for AddExpenseTool {
    fn name(&self) -> ToolName {
        ToolName::AddExpense
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::AddExpense,
            description: "Add a new expense to track spending",
            parameters: vec![
                ParamSpec::required("amount", "float", "Amount in dollars"),
                ParamSpec::required(
                    "category",
                    "string",
                    "Category: food, transport, entertainment, shopping, bills, other",
                ),
                ParamSpec::required("description", "string", "What was purchased"),
            ],
        }
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: AddExpenseArgs = parse_args(ToolName::AddExpense, args)?;

        let expense = match args
            .category
            .parse::<Category>()
            .and_then(|category| NewExpense::new(args.amount, category, args.description))
        {
            Ok(expense) => expense,
            Err(e) => return Ok(ToolResult::failure(format!("✗ Error adding expense: {e}"))),
        };

        match self.ledger.create_expense(&args.user_id, expense).await {
            Ok(stored) => {
                debug!(id = stored.id, user_id = %args.user_id, "Expense recorded");
                Ok(ToolResult::ok(format!(
                    "✓ Expense added: ${:.2} for {}",
                    stored.amount, stored.category
                ))
                .with_data(serde_json::json!({
                    "expense_id": stored.id,
                    "amount": stored.amount,
                })))
            }
            Err(e) => Ok(ToolResult::failure(format!("✗ Error adding expense: {e}"))),
        }
    }
}
