//! The structured output of one reasoning step.
//!
//! A [`Decision`] can only be obtained by parsing model output or by taking
//! the fixed [`Decision::fallback`]. Everything downstream (routing, tool
//! execution, the transcript) can therefore trust its shape.

use pennywise_core::error::DecisionError;
use pennywise_core::tool::ToolArgs;
use serde::Deserialize;

/// Rationale recorded when the model output could not be used.
pub const FALLBACK_RATIONALE: &str = "Error parsing response";

/// Answer returned to the user when the model output could not be used.
pub const FALLBACK_ANSWER: &str = "I encountered an error. Please try again.";

/// Wire shape the model is asked to emit.
///
/// Unknown keys are ignored; missing required keys and wrong types are not.
#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(alias = "rationale")]
    thought: String,
    needs_tool: bool,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    tool_input: Option<ToolArgs>,
    #[serde(default)]
    final_answer: Option<String>,
}

/// A validated, immutable reasoning decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    rationale: String,
    needs_tool: bool,
    tool_name: Option<String>,
    tool_input: Option<ToolArgs>,
    final_answer: Option<String>,
    fallback: bool,
}

impl Decision {
    /// Validate raw model text.
    ///
    /// The whole text must be a single JSON object; leading or trailing prose
    /// is a parse failure.
    pub fn parse(raw: &str) -> Result<Self, DecisionError> {
        let raw: RawDecision = serde_json::from_str(raw.trim())?;
        Ok(Self {
            rationale: raw.thought,
            needs_tool: raw.needs_tool,
            tool_name: raw.tool_name,
            tool_input: raw.tool_input,
            final_answer: raw.final_answer,
            fallback: false,
        })
    }

    /// The decision substituted for unusable model output.
    pub fn fallback() -> Self {
        Self {
            rationale: FALLBACK_RATIONALE.into(),
            needs_tool: false,
            tool_name: None,
            tool_input: None,
            final_answer: Some(FALLBACK_ANSWER.into()),
            fallback: true,
        }
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    pub fn needs_tool(&self) -> bool {
        self.needs_tool
    }

    /// The requested tool, if the model named a non-empty one.
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn tool_input(&self) -> Option<&ToolArgs> {
        self.tool_input.as_ref()
    }

    /// The final answer, if non-empty.
    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref().filter(|answer| !answer.is_empty())
    }

    /// Whether this decision replaced unusable model output.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}
