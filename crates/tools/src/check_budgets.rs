//! Check budgets tool — reports categories where spending exceeds the limit.

use async_trait::async_trait;
use pennywise_core::error::ToolError;
use pennywise_core::finance::BudgetAlert;
use pennywise_core::ledger::Ledger;
use pennywise_core::tool::{Tool, ToolArgs, ToolName, ToolResult, ToolSchema};
use serde::Deserialize;
use std::sync::Arc;
use crate::args::parse_args;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckBudgetsArgs {
    user_id: String,
}

pub struct CheckBudgetsTool {
    ledger: Arc<dyn Ledger>,
}

impl CheckBudgetsTool {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }
}

fn render_alerts(alerts: &[BudgetAlert]) -> String {
    if alerts.is_empty() {
        return "✓ All categories within budget!".into();
    }
    let mut message = String::from("⚠️ BUDGET ALERTS:\n");
    for alert in alerts {
        message.push_str(&format!(
            "  • {}: ${:.2} spent (budget: ${:.2}), over by ${:.2}\n",
            alert.category, alert.spent, alert.budget, alert.overage
        ));
    }
    message
}

#[async_trait]
impl Tool for CheckBudgetsTool {
    fn name(&self) -> ToolName {
        ToolName::CheckBudgets
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::CheckBudgets,
            description: "Check if any categories are over budget",
            parameters: vec![],
        }
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        let args: CheckBudgetsArgs = parse_args(ToolName::CheckBudgets, args)?;
        Ok(match self.ledger.over_budget_alerts(&args.user_id).await {
            Ok(alerts) => ToolResult::ok(render_alerts(&alerts))
                .with_data(serde_json::json!({ "alerts": alerts })),
            Err(e) => ToolResult::failure(format!("✗ Error: {e}")),
        })
    }
}
