//! Per-invocation loop state and the response it collapses into.

use pennywise_core::message::Turn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::decision::Decision;

/// Answer reported when the loop ends without any final answer.
pub const NO_ANSWER: &str = "No answer generated";

/// Where the loop controller currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reasoning,
    Executing,
    Terminal,
}

/// Everything one invocation knows. Owned by that invocation alone and
/// threaded by value through each step.
#[derive(Debug, Clone)]
pub struct LoopState {
    pub user_input: String,
    pub identity: String,
    /// Append-only; the user input itself is not part of it.
    pub history: Vec<Turn>,
    pub current: Option<Decision>,
    /// Completed reasoning steps.
    pub iterations: usize,
    /// Last non-empty final answer seen. Never cleared once set.
    pub final_answer: String,
    /// Tool names in call order, duplicates and unknown names included.
    pub tools_used: Vec<String>,
}

impl LoopState {
    pub fn new(user_input: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            identity: identity.into(),
            history: Vec::new(),
            current: None,
            iterations: 0,
            final_answer: String::new(),
            tools_used: Vec::new(),
        }
    }

    /// Record a reasoning step's decision.
    pub fn record_decision(mut self, decision: Decision) -> Self {
        self.history.push(Turn::assistant(decision.rationale()));
        if let Some(answer) = decision.final_answer() {
            self.final_answer = answer.to_string();
        }
        self.iterations += 1;
        self.current = Some(decision);
        self
    }

    /// Record a tool call and its rendered result.
    pub fn record_tool(mut self, tool_name: &str, message: &str) -> Self {
        self.history
            .push(Turn::tool(format!("Tool '{tool_name}' result: {message}")));
        self.tools_used.push(tool_name.to_string());
        self
    }

    pub fn into_response(self, elapsed: Duration) -> AgentResponse {
        let answer = if self.final_answer.is_empty() {
            NO_ANSWER.to_string()
        } else {
            self.final_answer
        };
        AgentResponse {
            answer,
            steps_taken: self.iterations,
            tools_used: self.tools_used,
            execution_time: round_secs(elapsed),
        }
    }
}

fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

/// The outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub answer: String,
    pub steps_taken: usize,
    pub tools_used: Vec<String>,
    /// Wall-clock seconds, rounded to two decimals
    pub execution_time: f64,
}
