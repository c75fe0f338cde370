//! The agent reasoning loop implementation.

use chrono::Utc;
use futures::FutureExt;
use pennywise_config::AppConfig;
use pennywise_core::error::DecisionError;
use pennywise_core::event::{DomainEvent, EventBus};
use pennywise_core::message::render_transcript;
use pennywise_core::provider::{Provider, ProviderRequest};
use pennywise_core::tool::{ToolRegistry, ToolResult};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::decision::Decision;
use crate::prompt::build_prompt;
use crate::routing::{DEFAULT_MAX_ITERATIONS, Route, route};
use crate::state::{AgentResponse, LoopState, Phase};

/// Drives one reason-act loop per invocation.
///
/// Holds only shared, read-only collaborators; every invocation owns its
/// own [`LoopState`], so one `AgentLoop` can serve concurrent callers.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per completion
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Maximum reasoning steps per invocation
    max_iterations: usize,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop with deterministic sampling and the default cap.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            event_bus,
        }
    }

    /// Create an agent loop using the model settings from `config`.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let agent = Self::new(provider, config.default_model.clone(), tools, event_bus)
            .with_temperature(config.temperature)
            .with_max_iterations(config.agent.max_iterations);
        match config.max_tokens {
            Some(max) => agent.with_max_tokens(max),
            None => agent,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum number of reasoning steps.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the max tokens per completion.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Handle one user message on behalf of `identity`.
    ///
    /// Never fails: unusable model output, unknown tools and failing tools
    /// are all folded into the conversation and the loop carries on.
    pub async fn invoke(&self, message: &str, identity: &str) -> AgentResponse {
        let started = Instant::now();
        info!(identity, chars = message.chars().count(), "Processing request");

        let mut state = LoopState::new(message, identity);
        let mut phase = Phase::Reasoning;
        loop {
            phase = match phase {
                Phase::Reasoning => {
                    state = self.reason(state).await;
                    match self.next_route(&state) {
                        Route::ExecuteTool => Phase::Executing,
                        Route::Finish => Phase::Terminal,
                    }
                }
                Phase::Executing => {
                    state = self.execute_tool(state).await;
                    Phase::Reasoning
                }
                Phase::Terminal => break,
            };
        }

        let answered = !state.final_answer.is_empty();
        let response = state.into_response(started.elapsed());

        self.event_bus.publish(DomainEvent::InvocationCompleted {
            identity: identity.to_string(),
            steps_taken: response.steps_taken,
            tools_used: response.tools_used.clone(),
            answered,
            timestamp: Utc::now(),
        });
        info!(
            identity,
            steps = response.steps_taken,
            tools = ?response.tools_used,
            secs = response.execution_time,
            "Request complete"
        );

        response
    }

    /// One reasoning step: prompt the model and record its decision.
    pub async fn reason(&self, state: LoopState) -> LoopState {
        let prompt = build_prompt(
            &self.tools.catalog(),
            &render_transcript(&state.history),
            &state.user_input,
        );
        let request = ProviderRequest {
            model: self.model.clone(),
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_mode: true,
        };

        let iteration = state.iterations + 1;
        let decision = match self.decide(request).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(identity = %state.identity, iteration, "Unusable model output: {e}");
                Decision::fallback()
            }
        };

        debug!(
            identity = %state.identity,
            iteration,
            needs_tool = decision.needs_tool(),
            tool = decision.tool_name().unwrap_or(""),
            answered = decision.final_answer().is_some(),
            "Reasoning step"
        );
        self.event_bus.publish(DomainEvent::DecisionMade {
            identity: state.identity.clone(),
            iteration,
            needs_tool: decision.needs_tool(),
            tool_name: decision.tool_name().map(String::from),
            fallback: decision.is_fallback(),
            timestamp: Utc::now(),
        });

        state.record_decision(decision)
    }

    async fn decide(&self, request: ProviderRequest) -> Result<Decision, DecisionError> {
        let response = self.provider.complete(request).await?;
        Decision::parse(&response.content)
    }

    fn next_route(&self, state: &LoopState) -> Route {
        let verdict = state.current.as_ref().map_or(Route::Finish, |decision| {
            route(decision, state.iterations, self.max_iterations)
        });
        debug!(identity = %state.identity, iteration = state.iterations, ?verdict, "Routed");
        verdict
    }

    /// One tool step: run the current decision's tool and record the result.
    pub async fn execute_tool(&self, state: LoopState) -> LoopState {
        let Some(tool_name) = state
            .current
            .as_ref()
            .and_then(|d| d.tool_name())
            .map(String::from)
        else {
            return state;
        };

        let started = Instant::now();
        let result = match self.tools.lookup(&tool_name) {
            None => {
                warn!(identity = %state.identity, tool = %tool_name, "Unknown tool requested");
                ToolResult::failure(format!("Unknown tool: {tool_name}"))
            }
            Some(tool) => {
                let mut args = state
                    .current
                    .as_ref()
                    .and_then(|d| d.tool_input())
                    .cloned()
                    .unwrap_or_default();
                args.insert("user_id".into(), state.identity.clone().into());

                match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        warn!(identity = %state.identity, tool = %tool_name, "Tool failed: {e}");
                        ToolResult::failure(format!("Tool execution error: {e}"))
                    }
                    Err(panic) => {
                        let reason = panic_message(panic.as_ref());
                        warn!(identity = %state.identity, tool = %tool_name, "Tool panicked: {reason}");
                        ToolResult::failure(format!("Tool execution error: {reason}"))
                    }
                }
            }
        };

        self.event_bus.publish(DomainEvent::ToolExecuted {
            identity: state.identity.clone(),
            tool_name: tool_name.clone(),
            success: result.success,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        debug!(tool = %tool_name, success = result.success, "Tool step");

        state.record_tool(&tool_name, &result.message)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FALLBACK_ANSWER;
    use crate::state::NO_ANSWER;
    use crate::test_helpers::*;
    use pennywise_core::message::Role;
    use pennywise_core::tool::ToolName;
    use pennywise_ledger::InMemoryLedger;
    use pennywise_tools::default_registry;

    const CHECK: &str = r#"{"thought": "check", "needs_tool": true, "tool_name": "check_budgets", "tool_input": {}}"#;

    fn agent(provider: Arc<dyn Provider>, tools: ToolRegistry) -> AgentLoop {
        AgentLoop::new(provider, "mock-model", Arc::new(tools), Arc::new(EventBus::default()))
    }

    fn finance_tools() -> ToolRegistry {
        default_registry(Arc::new(InMemoryLedger::new()))
    }

    #[tokio::test]
    async fn expense_then_answer() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "User wants to add a lunch expense", "needs_tool": true,
                "tool_name": "add_expense",
                "tool_input": {"amount": 50, "category": "food", "description": "lunch"}}"#,
            r#"{"thought": "Expense added", "needs_tool": false,
                "final_answer": "Added your $50 lunch expense."}"#,
        ]));
        let response = agent(provider.clone(), finance_tools())
            .invoke("I spent $50 on lunch", "alice")
            .await;

        assert_eq!(response.answer, "Added your $50 lunch expense.");
        assert_eq!(response.steps_taken, 2);
        assert_eq!(response.tools_used, vec!["add_expense"]);
        assert!(response.execution_time >= 0.0);

        // The second prompt carries the tool result, the user input does not
        // enter the transcript.
        let requests = provider.requests();
        assert!(requests.iter().all(|r| r.json_mode && r.temperature == 0.0));
        assert!(requests[0].prompt.contains("Conversation:\n\n\nUser: I spent $50 on lunch"));
        assert!(requests[1].prompt.contains(
            "assistant: User wants to add a lunch expense\n\
             tool: Tool 'add_expense' result: ✓ Expense added: $50.00 for food\n\nUser:"
        ));
    }

    #[tokio::test]
    async fn direct_answer() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "greeting", "needs_tool": false, "final_answer": "Hello!"}"#,
        ]));
        let response = agent(provider, finance_tools()).invoke("hi", "u").await;
        assert_eq!(response.answer, "Hello!");
        assert_eq!(response.steps_taken, 1);
        assert!(response.tools_used.is_empty());
    }

    #[tokio::test]
    async fn never_answering_model_stops_at_cap() {
        let provider = Arc::new(SequentialMockProvider::repeating(CHECK));
        let response = agent(provider.clone(), finance_tools()).invoke("loop", "u").await;

        assert_eq!(response.steps_taken, 10);
        assert_eq!(response.tools_used.len(), 9);
        assert_eq!(response.answer, NO_ANSWER);
        assert_eq!(provider.call_count(), 10);
    }

    #[tokio::test]
    async fn configured_cap_is_honoured() {
        let provider = Arc::new(SequentialMockProvider::repeating(CHECK));
        let response = agent(provider, finance_tools())
            .with_max_iterations(3)
            .invoke("loop", "u")
            .await;
        assert_eq!(response.steps_taken, 3);
        assert_eq!(response.tools_used.len(), 2);
    }

    #[tokio::test]
    async fn no_tool_and_no_answer_finishes_at_once() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "hmm", "needs_tool": false}"#,
        ]));
        let response = agent(provider, finance_tools()).invoke("?", "u").await;
        assert_eq!(response.steps_taken, 1);
        assert_eq!(response.answer, NO_ANSWER);
        assert!(response.tools_used.is_empty());
    }

    #[tokio::test]
    async fn unparseable_output_falls_back() {
        for raw in [
            "Sure, I added that for you!",
            r#"{"thought": "adding", "needs_tool": tr"#,
            r#"{"thought": "x", "needs_tool": "yes"}"#,
        ] {
            let provider = Arc::new(SequentialMockProvider::new(vec![raw]));
            let response = agent(provider, finance_tools()).invoke("add lunch", "u").await;
            assert_eq!(response.steps_taken, 1, "input: {raw}");
            assert_eq!(response.answer, FALLBACK_ANSWER);
            assert!(response.tools_used.is_empty());
        }
    }

    #[tokio::test]
    async fn provider_error_falls_back() {
        let response = agent(Arc::new(FailingProvider), finance_tools())
            .invoke("hello", "u")
            .await;
        assert_eq!(response.answer, FALLBACK_ANSWER);
        assert_eq!(response.steps_taken, 1);
    }

    #[tokio::test]
    async fn unknown_tool_is_fed_back() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "try", "needs_tool": true, "tool_name": "transfer_money"}"#,
            r#"{"thought": "cannot", "needs_tool": false, "final_answer": "I can't do that."}"#,
        ]));
        let response = agent(provider.clone(), finance_tools()).invoke("send $5", "u").await;

        assert_eq!(response.answer, "I can't do that.");
        assert_eq!(response.tools_used, vec!["transfer_money"]);
        assert!(provider.requests()[1]
            .prompt
            .contains("tool: Tool 'transfer_money' result: Unknown tool: transfer_money"));
    }

    #[tokio::test]
    async fn identity_overrides_supplied_user_id() {
        let recorder = Arc::new(RecordingTool::new(ToolName::CheckBudgets));
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "x", "needs_tool": true, "tool_name": "check_budgets",
                "tool_input": {"user_id": "mallory", "extra": 1}}"#,
            r#"{"thought": "y", "needs_tool": false, "final_answer": "ok"}"#,
        ]));
        agent(provider, ToolRegistry::new().with_tool(recorder.clone()))
            .invoke("budgets?", "alice")
            .await;

        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["user_id"], "alice");
        assert_eq!(calls[0]["extra"], 1);
    }

    #[tokio::test]
    async fn missing_tool_input_still_gets_identity() {
        let recorder = Arc::new(RecordingTool::new(ToolName::CheckBudgets));
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "x", "needs_tool": true, "tool_name": "check_budgets"}"#,
            r#"{"thought": "y", "needs_tool": false, "final_answer": "ok"}"#,
        ]));
        agent(provider, ToolRegistry::new().with_tool(recorder.clone()))
            .invoke("budgets?", "bob")
            .await;
        assert_eq!(recorder.calls()[0].len(), 1);
        assert_eq!(recorder.calls()[0]["user_id"], "bob");
    }

    #[tokio::test]
    async fn tool_panic_becomes_failed_result() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "x", "needs_tool": true, "tool_name": "set_budget"}"#,
            r#"{"thought": "y", "needs_tool": false, "final_answer": "Something went wrong."}"#,
        ]));
        let registry = ToolRegistry::new().with_tool(Arc::new(PanickingTool(ToolName::SetBudget)));
        let response = agent(provider.clone(), registry).invoke("budget", "u").await;

        assert_eq!(response.answer, "Something went wrong.");
        assert_eq!(response.tools_used, vec!["set_budget"]);
        assert!(provider.requests()[1]
            .prompt
            .contains("Tool 'set_budget' result: Tool execution error: ledger exploded"));
    }

    #[tokio::test]
    async fn tool_error_becomes_failed_result() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "x", "needs_tool": true, "tool_name": "add_expense"}"#,
            r#"{"thought": "y", "needs_tool": false, "final_answer": "Failed."}"#,
        ]));
        let registry = ToolRegistry::new().with_tool(Arc::new(ErroringTool(ToolName::AddExpense)));
        agent(provider.clone(), registry).invoke("add", "u").await;
        assert!(provider.requests()[1].prompt.contains(
            "Tool 'add_expense' result: Tool execution error: Tool execution failed: add_expense: disk full"
        ));
    }

    #[tokio::test]
    async fn history_only_grows() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            CHECK,
            r#"{"thought": "again", "needs_tool": true, "tool_name": "get_spending_summary"}"#,
            r#"{"thought": "done", "needs_tool": false, "final_answer": "All fine."}"#,
        ]));
        let agent = agent(provider, finance_tools());

        let mut state = LoopState::new("status?", "u");
        let mut previous = state.history.clone();
        for _ in 0..3 {
            state = agent.reason(state).await;
            assert!(state.history.starts_with(&previous));
            previous = state.history.clone();
            state = agent.execute_tool(state).await;
            assert!(state.history.starts_with(&previous));
            previous = state.history.clone();
        }

        let roles: Vec<Role> = state.history.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::Assistant, Role::Tool, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(state.final_answer, "All fine.");
    }

    #[tokio::test]
    async fn final_answer_survives_later_steps() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "a", "needs_tool": false, "final_answer": "First answer"}"#,
            r#"{"thought": "b", "needs_tool": true, "tool_name": "check_budgets"}"#,
        ]));
        let agent = agent(provider, finance_tools());

        let state = agent.reason(LoopState::new("q", "u")).await;
        let state = agent.reason(state).await;
        assert_eq!(state.final_answer, "First answer");
        assert_eq!(state.iterations, 2);
    }

    #[tokio::test]
    async fn execute_without_tool_name_is_noop() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "a", "needs_tool": true}"#,
        ]));
        let agent = agent(provider, finance_tools());
        let state = agent.reason(LoopState::new("q", "u")).await;
        let after = agent.execute_tool(state.clone()).await;
        assert_eq!(after.history, state.history);
        assert!(after.tools_used.is_empty());
    }

    #[tokio::test]
    async fn publishes_loop_events() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            CHECK,
            r#"{"thought": "done", "needs_tool": false, "final_answer": "fine"}"#,
        ]));
        let agent = agent(provider, finance_tools());
        let mut rx = agent.event_bus().subscribe();
        agent.invoke("q", "carol").await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::DecisionMade { .. } => "decision",
                DomainEvent::ToolExecuted { .. } => "tool",
                DomainEvent::InvocationCompleted { identity, steps_taken, .. } => {
                    assert_eq!(identity, "carol");
                    assert_eq!(*steps_taken, 2);
                    "done"
                }
            });
        }
        assert_eq!(kinds, vec!["decision", "tool", "decision", "done"]);
    }

    #[tokio::test]
    async fn concurrent_invocations_are_isolated() {
        let ledger = Arc::new(InMemoryLedger::new());
        let script = vec![
            r#"{"thought": "add", "needs_tool": true, "tool_name": "add_expense",
                "tool_input": {"amount": 10, "category": "food", "description": "snack"}}"#,
            r#"{"thought": "done", "needs_tool": false, "final_answer": "ok"}"#,
        ];
        let a = AgentLoop::new(
            Arc::new(SequentialMockProvider::new(script.clone())),
            "mock-model",
            Arc::new(default_registry(ledger.clone())),
            Arc::new(EventBus::default()),
        );
        let b = AgentLoop::new(
            Arc::new(SequentialMockProvider::new(script)),
            "mock-model",
            Arc::new(default_registry(ledger.clone())),
            Arc::new(EventBus::default()),
        );

        let (ra, rb) = tokio::join!(a.invoke("snack", "alice"), b.invoke("snack", "bob"));
        assert_eq!(ra.steps_taken, 2);
        assert_eq!(rb.steps_taken, 2);

        use pennywise_core::ledger::Ledger;
        assert_eq!(ledger.list_expenses("alice", None).await.unwrap().len(), 1);
        assert_eq!(ledger.list_expenses("bob", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn default_config_reasons_at_zero_temperature() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            r#"{"thought": "t", "needs_tool": false, "final_answer": "hi"}"#,
        ]));
        let agent = AgentLoop::from_config(
            &AppConfig::default(),
            provider.clone(),
            Arc::new(ToolRegistry::new()),
            Arc::new(EventBus::default()),
        );
        agent.invoke("hello", "alice").await;
        assert_eq!(provider.requests()[0].temperature, 0.0);
    }

    #[test]
    fn from_config_applies_settings() {
        let mut config = AppConfig::default();
        config.temperature = 0.3;
        config.max_tokens = Some(256);
        config.agent.max_iterations = 4;
        let agent = AgentLoop::from_config(
            &config,
            Arc::new(FailingProvider),
            Arc::new(ToolRegistry::new()),
            Arc::new(EventBus::default()),
        );
        assert_eq!(agent.max_iterations(), 4);
        assert_eq!(agent.temperature, 0.3);
        assert_eq!(agent.max_tokens, Some(256));
        assert_eq!(agent.model, "gpt-4o-mini");
    }
}
