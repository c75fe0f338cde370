//! Set budget tool — creates or replaces a category spending limit.

use async_trait::async_trait;
use pennywise_core::error::ToolError;
use pennywise_core::finance::Category;
use pennywise_core::ledger::Ledger;
use pennywise_core::tool::{ParamSpec, Tool, ToolArgs, ToolName, ToolResult, ToolSchema};
use serde::Deserialize;
use std::sync::Arc;
use crate::args::{lenient_f64, parse_args};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetBudgetArgs {
    category: String,
    #[serde(deserialize_with = "lenient_f64")]
    amount: f64,
    user_id: String,
}

pub struct SetBudgetTool {
    ledger: Arc<dyn Ledger>,
}

impl SetBudgetTool {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for SetBudgetTool {
    fn name(&self) -> ToolName {
        ToolName::SetBudget
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::SetBudget,
            description: "Set spending limit for a category",
            parameters: vec![
                ParamSpec::required("category", "string", "Category name"),
                ParamSpec::required("amount", "float", "Budget limit in dollars"),
            ],
        }
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: SetBudgetArgs = parse_args(ToolName::SetBudget, args)?;

        let category = match args.category.parse::<Category>() {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::failure(format!("✗ Error: {e}"))),
        };

        Ok(match self.ledger.set_budget(&args.user_id, category, args.amount).await {
            Ok(budget) => ToolResult::ok(format!(
                "✓ Budget set for {}: ${}",
                budget.category, budget.amount
            ))
            .with_data(serde_json::json!({
                "category": budget.category,
                "amount": budget.amount,
            })),
            Err(e) => ToolResult::failure(format!("✗ Error: {e}")),
        })
    }
}
