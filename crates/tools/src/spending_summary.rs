//! Spending summary tool — totals for one category or all of them.

use async_trait::async_trait;
use pennywise_core::error::ToolError;
use pennywise_core::finance::Category;
use pennywise_core::ledger::Ledger;
use pennywise_core::tool::{ParamSpec, Tool, ToolArgs, ToolName, ToolResult, ToolSchema};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::args::parse_args;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SummaryArgs {
    #[serde(default)]
    category: Option<String>,
    user_id: String,
}

pub struct SpendingSummaryTool {
    ledger: Arc<dyn Ledger>,
}

impl SpendingSummaryTool {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    async fn category_summary(&self, user_id: &str, raw: &str) -> ToolResult {
        let category = match raw.parse::<Category>() {
            Ok(c) => c,
            Err(e) => return ToolResult::failure(format!("✗ Error: {e}")),
        };
        match self.ledger.list_expenses(user_id, Some(category)).await {
            Ok(expenses) => {
                let total: f64 = expenses.iter().map(|e| e.amount).sum();
                ToolResult::ok(format!(
                    "Category '{category}': {} expenses, Total: ${total:.2}",
                    expenses.len()
                ))
                .with_data(serde_json::json!({ "totals": { category.as_str(): total } }))
            }
            Err(e) => ToolResult::failure(format!("✗ Error: {e}")),
        }
    }

    async fn full_summary(&self, user_id: &str) -> ToolResult {
        match self.ledger.totals_by_category(user_id).await {
            Ok(totals) => ToolResult::ok(render_totals(&totals))
                .with_data(serde_json::json!({ "totals": totals })),
            Err(e) => ToolResult::failure(format!("✗ Error: {e}")),
        }
    }
}

fn render_totals(totals: &BTreeMap<Category, f64>) -> String {
    let mut message = String::from("Spending by category:\n");
    for (category, amount) in totals {
        message.push_str(&format!("  • {}: ${amount:.2}\n", category.label()));
    }
    let grand_total: f64 = totals.values().sum();
    message.push_str(&format!("Grand Total: ${grand_total:.2}"));
    message
}

#[async_trait]
impl Tool for SpendingSummaryTool {
    fn name(&self) -> ToolName {
        ToolName::GetSpendingSummary
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::GetSpendingSummary,
            description: "Get spending summary by category",
            parameters: vec![ParamSpec::optional(
                "category",
                "string",
                "Optional: specific category to check",
            )],
        }
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: SummaryArgs = parse_args(ToolName::GetSpendingSummary, args)?;
        // An empty category means "all of them".
        let result = match args.category.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => self.category_summary(&args.user_id, raw).await,
            _ => self.full_summary(&args.user_id).await,
        };
        Ok(result)
    }
}
