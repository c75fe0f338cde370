//! Tool trait — the abstraction over the assistant's business operations.
//!
//! The tool set is closed: [`ToolName`] enumerates every operation, and the
//! model's free-form string is only turned into a `ToolName` at the registry
//! boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use crate::error::ToolError;

/// Arguments handed to a tool: a JSON object.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// Every operation the assistant can perform.
///
/// Declaration order is the order tools appear in the prompt catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    AddExpense,
    GetSpendingSummary,
    SetBudget,
    CheckBudgets,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::AddExpense,
        ToolName::GetSpendingSummary,
        ToolName::SetBudget,
        ToolName::CheckBudgets,
    ];

    /// The wire name the model uses.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::AddExpense => "add_expense",
            ToolName::GetSpendingSummary => "get_spending_summary",
            ToolName::SetBudget => "set_budget",
            ToolName::CheckBudgets => "check_budgets",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ToolError::NotFound(s.to_string()))
    }
}

/// One declared tool parameter. Used to brief the model only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    /// Type as shown to the model ("float", "string").
    pub kind: &'static str,
    pub description: &'static str,
    pub optional: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: &'static str, description: &'static str) -> Self {
        Self { name, kind, description, optional: false }
    }

    pub const fn optional(name: &'static str, kind: &'static str, description: &'static str) -> Self {
        Self { name, kind, description, optional: true }
    }
}

/// Declarative description of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSchema {
    pub name: ToolName,
    pub description: &'static str,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSchema {
    /// Render as a catalog line: `- name(p:type, q:type(optional)): description`.
    pub fn catalog_line(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| {
                if p.optional {
                    format!("{}:{}(optional)", p.name, p.kind)
                } else {
                    format!("{}:{}", p.name, p.kind)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("- {}({}): {}", self.name, params, self.description)
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the operation succeeded
    pub success: bool,

    /// Human-readable outcome, fed back to the model
    pub message: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The core Tool trait.
///
/// Business failures are reported as `Ok(ToolResult { success: false, .. })`.
/// `Err` is reserved for arguments the tool cannot interpret.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Which operation this is.
    fn name(&self) -> ToolName;

    /// Parameter description sent to the model.
    fn schema(&self) -> ToolSchema;

    /// Execute with the given arguments. The caller's identity is already
    /// present under `user_id`.
    async fn execute(&self, args: ToolArgs) -> std::result::Result<ToolResult, ToolError>;
}

/// A registry of available tools.
///
/// Built once at startup and shared read-only between invocations.
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    /// Builder-style registration.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: ToolName) -> Option<Arc<dyn Tool>> {
        self.tools.get(&name).cloned()
    }

    /// Resolve a model-supplied name. Unknown names yield `None`.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        name.parse::<ToolName>().ok().and_then(|n| self.get(n))
    }

    /// All schemas, in `ToolName` order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// The tool catalog as it appears in the prompt.
    pub fn catalog(&self) -> String {
        self.schemas()
            .iter()
            .map(ToolSchema::catalog_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<ToolName> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
