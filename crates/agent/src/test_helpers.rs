//! Shared test doubles for the agent loop.

use async_trait::async_trait;
use pennywise_core::error::{ProviderError, ToolError};
use pennywise_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use pennywise_core::tool::{Tool, ToolArgs, ToolName, ToolResult, ToolSchema};
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted completions.
///
/// Each call to `complete` returns the next text in the queue. Panics if
/// more calls are made than responses provided, unless built with
/// [`SequentialMockProvider::repeating`].
pub struct SequentialMockProvider {
    responses: Vec<String>,
    repeat_last: bool,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: responses.into_iter().map(String::from).collect(),
            repeat_last: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers every call with `text`.
    pub fn repeating(text: &str) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(vec![text])
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        requests.push(request);

        let text = match self.responses.get(index) {
            Some(text) => text,
            None if self.repeat_last && !self.responses.is_empty() => {
                &self.responses[self.responses.len() - 1]
            }
            None => panic!(
                "SequentialMockProvider: no more responses (call #{index}, have {})",
                self.responses.len()
            ),
        };
        Ok(make_response(text))
    }
}

/// A provider whose every call fails.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

pub fn make_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.to_string(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A tool that records the arguments it was called with.
pub struct RecordingTool {
    name: ToolName,
    calls: Mutex<Vec<ToolArgs>>,
}

impl RecordingTool {
    pub fn new(name: ToolName) -> Self {
        Self {
            name,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ToolArgs> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> ToolName {
        self.name
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name,
            description: "Records its arguments",
            parameters: vec![],
        }
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolResult, ToolError> {
        self.calls.lock().unwrap().push(args);
        Ok(ToolResult::ok("recorded"))
    }
}

/// A tool that panics mid-execution.
pub struct PanickingTool(pub ToolName);

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> ToolName {
        self.0
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.0,
            description: "Always panics",
            parameters: vec![],
        }
    }

    async fn execute(&self, _args: ToolArgs) -> Result<ToolResult, ToolError> {
        panic!("ledger exploded")
    }
}

/// A tool that always returns an error.
pub struct ErroringTool(pub ToolName);

#[async_trait]
impl Tool for ErroringTool {
    fn name(&self) -> ToolName {
        self.0
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.0,
            description: "Always fails",
            parameters: vec![],
        }
    }

    async fn execute(&self, _args: ToolArgs) -> Result<ToolResult, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: self.0.to_string(),
            reason: "disk full".into(),
        })
    }
}
