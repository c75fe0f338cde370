//! End-to-end integration tests for the Pennywise finance agent.
//!
//! These tests drive the full pipeline from a user message to the answer:
//! prompt assembly, decision parsing, routing, the real finance tools and a
//! real SQLite ledger. Only the model is scripted.

use std::sync::{Arc, Mutex};

use pennywise_agent::{AgentLoop, AgentResponse};
use pennywise_core::error::ProviderError;
use pennywise_core::event::{DomainEvent, EventBus};
use pennywise_core::finance::Category;
use pennywise_core::ledger::Ledger;
use pennywise_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use pennywise_ledger::SqliteLedger;
use pennywise_tools::default_registry;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted completions in sequence and keeps
/// every prompt it was sent.
struct ScriptedProvider {
    responses: Vec<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new<S: AsRef<str>>(responses: &[S]) -> Self {
        Self {
            responses: responses.iter().map(|r| r.as_ref().to_string()).collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut prompts = self.prompts.lock().unwrap();
        let index = prompts.len();
        prompts.push(request.prompt);
        let content = self
            .responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default();
        Ok(ProviderResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock".into(),
        })
    }
}

fn tool_call(tool: &str, input: serde_json::Value) -> String {
    serde_json::json!({
        "thought": format!("I should use {tool}"),
        "needs_tool": true,
        "tool_name": tool,
        "tool_input": input,
    })
    .to_string()
}

fn answer(text: &str) -> String {
    serde_json::json!({
        "thought": "I have what I need",
        "needs_tool": false,
        "final_answer": text,
    })
    .to_string()
}

async fn ledger() -> Arc<SqliteLedger> {
    Arc::new(SqliteLedger::new("sqlite::memory:", 1).await.unwrap())
}

async fn run<S: AsRef<str>>(
    ledger: Arc<SqliteLedger>,
    script: &[S],
    message: &str,
    user: &str,
) -> (AgentResponse, Arc<ScriptedProvider>) {
    let provider = Arc::new(ScriptedProvider::new(script));
    let agent = AgentLoop::new(
        provider.clone(),
        "mock",
        Arc::new(default_registry(ledger)),
        Arc::new(EventBus::default()),
    );
    (agent.invoke(message, user).await, provider)
}

// ── E2E: Expense Tracking ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_add_expense_then_answer() {
    let ledger = ledger().await;
    let add = tool_call(
        "add_expense",
        serde_json::json!({"amount": 50, "category": "food", "description": "lunch"}),
    );
    let done = answer("Added your $50 lunch expense.");

    let (response, provider) = run(ledger.clone(), &[&add, &done], "I spent $50 on lunch", "alice").await;

    assert_eq!(response.answer, "Added your $50 lunch expense.");
    assert_eq!(response.steps_taken, 2);
    assert_eq!(response.tools_used, vec!["add_expense"]);
    assert_eq!(provider.calls(), 2);

    let expenses = ledger.list_expenses("alice", None).await.unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].amount, 50.0);
    assert_eq!(expenses[0].category, Category::Food);
    assert_eq!(expenses[0].description, "lunch");

    assert!(provider
        .prompt(1)
        .contains("tool: Tool 'add_expense' result: ✓ Expense added: $50.00 for food"));
}

#[tokio::test]
async fn e2e_budget_alert_flow() {
    let ledger = ledger().await;
    let set = tool_call("set_budget", serde_json::json!({"category": "entertainment", "amount": 40}));
    let add = tool_call(
        "add_expense",
        serde_json::json!({"amount": 55.5, "category": "entertainment", "description": "concert"}),
    );
    let check = tool_call("check_budgets", serde_json::json!({}));
    let done = answer("You are $15.50 over your entertainment budget.");

    let (response, provider) = run(
        ledger.clone(),
        &[&set, &add, &check, &done],
        "Budget $40 for fun, I spent $55.50 on a concert. Am I over?",
        "bob",
    )
    .await;

    assert_eq!(response.steps_taken, 4);
    assert_eq!(response.tools_used, vec!["set_budget", "add_expense", "check_budgets"]);
    assert!(provider.prompt(3).contains(
        "⚠️ BUDGET ALERTS:\n  • entertainment: $55.50 spent (budget: $40.00), over by $15.50"
    ));

    let alerts = ledger.over_budget_alerts("bob").await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].overage, 15.5);
}

#[tokio::test]
async fn e2e_spending_summary() {
    let ledger = ledger().await;
    let first = tool_call(
        "add_expense",
        serde_json::json!({"amount": "12.50", "category": "Transport", "description": "taxi"}),
    );
    let second = tool_call(
        "add_expense",
        serde_json::json!({"amount": 7.5, "category": "food", "description": "coffee"}),
    );
    let summary = tool_call("get_spending_summary", serde_json::json!({}));
    let done = answer("You spent $20.00 in total.");

    let (response, provider) =
        run(ledger, &[&first, &second, &summary, &done], "log and summarize", "carol").await;

    assert_eq!(response.answer, "You spent $20.00 in total.");
    assert!(provider.prompt(3).contains(
        "Spending by category:\n  • Food: $7.50\n  • Transport: $12.50\nGrand Total: $20.00"
    ));
}

#[tokio::test]
async fn e2e_users_are_isolated() {
    let ledger = ledger().await;
    let add = tool_call(
        "add_expense",
        serde_json::json!({"amount": 9, "category": "shopping", "description": "socks", "user_id": "victim"}),
    );
    let done = answer("Done.");

    run(ledger.clone(), &[&add, &done], "socks $9", "mallory").await;

    assert_eq!(ledger.list_expenses("mallory", None).await.unwrap().len(), 1);
    assert!(ledger.list_expenses("victim", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn e2e_invalid_expense_is_reported_back() {
    let ledger = ledger().await;
    let add = tool_call(
        "add_expense",
        serde_json::json!({"amount": -5, "category": "food", "description": "refund"}),
    );
    let done = answer("That amount is not valid.");

    let (response, provider) = run(ledger.clone(), &[&add, &done], "refund $5", "dave").await;

    assert_eq!(response.answer, "That amount is not valid.");
    assert!(provider.prompt(1).contains("result: ✗ Error adding expense: "));
    assert!(ledger.list_expenses("dave", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn e2e_malformed_arguments_are_tool_errors() {
    let ledger = ledger().await;
    let add = tool_call("add_expense", serde_json::json!({"amount": 5}));
    let done = answer("I need more details.");

    let (response, provider) = run(ledger, &[&add, &done], "add 5", "erin").await;

    assert_eq!(response.tools_used, vec!["add_expense"]);
    assert!(provider
        .prompt(1)
        .contains("Tool 'add_expense' result: Tool execution error: "));
}

// ── E2E: Loop Termination ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_model_that_never_answers_hits_the_cap() {
    let ledger = ledger().await;
    let check = tool_call("check_budgets", serde_json::json!({}));

    let (response, provider) = run(ledger, &[&check], "loop forever", "frank").await;

    assert_eq!(response.steps_taken, 10);
    assert_eq!(response.tools_used.len(), 9);
    assert_eq!(response.answer, "No answer generated");
    assert_eq!(provider.calls(), 10);
}

#[tokio::test]
async fn e2e_no_tool_and_no_answer_stops_immediately() {
    let ledger = ledger().await;
    let idle = r#"{"thought": "nothing to do", "needs_tool": false}"#;

    let (response, _) = run(ledger, &[idle], "hmm", "gina").await;

    assert_eq!(response.steps_taken, 1);
    assert_eq!(response.answer, "No answer generated");
    assert!(response.tools_used.is_empty());
}

#[tokio::test]
async fn e2e_unparseable_first_output() {
    let ledger = ledger().await;

    let (response, _) = run(ledger, &["Sure! I'll add that right away."], "add lunch", "hank").await;

    assert_eq!(response.steps_taken, 1);
    assert!(response.tools_used.is_empty());
    assert_eq!(response.answer, "I encountered an error. Please try again.");
}

#[tokio::test]
async fn e2e_unknown_tool_then_recovery() {
    let ledger = ledger().await;
    let bogus = tool_call("export_csv", serde_json::json!({}));
    let done = answer("I can't export files, sorry.");

    let (response, provider) = run(ledger, &[&bogus, &done], "export my data", "ivy").await;

    assert_eq!(response.answer, "I can't export files, sorry.");
    assert_eq!(response.tools_used, vec!["export_csv"]);
    assert!(provider.prompt(1).contains("Unknown tool: export_csv"));
}

// ── E2E: Events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_event_stream_mirrors_the_loop() {
    let ledger = ledger().await;
    let add = tool_call(
        "add_expense",
        serde_json::json!({"amount": 3, "category": "bills", "description": "stamp"}),
    );
    let done = answer("Recorded.");
    let provider = Arc::new(ScriptedProvider::new(&[&add, &done]));
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();

    let agent = AgentLoop::new(provider, "mock", Arc::new(default_registry(ledger)), bus);
    agent.invoke("stamp $3", "jack").await;

    let mut tool_events = 0;
    let mut completed = false;
    while let Ok(event) = rx.try_recv() {
        match event.as_ref() {
            DomainEvent::ToolExecuted { tool_name, success, .. } => {
                assert_eq!(tool_name, "add_expense");
                assert!(success);
                tool_events += 1;
            }
            DomainEvent::InvocationCompleted { answered, steps_taken, .. } => {
                assert!(answered);
                assert_eq!(*steps_taken, 2);
                completed = true;
            }
            DomainEvent::DecisionMade { fallback, .. } => assert!(!fallback),
        }
    }
    assert_eq!(tool_events, 1);
    assert!(completed);
}

// ── E2E: HTTP Gateway ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_gateway_chat_and_summary() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use pennywise_gateway::{GatewayState, build_router};
    use tower::ServiceExt;

    let ledger = ledger().await;
    let add = tool_call(
        "add_expense",
        serde_json::json!({"amount": 50, "category": "food", "description": "lunch"}),
    );
    let done = answer("Added your $50 lunch expense.");
    let agent = AgentLoop::new(
        Arc::new(ScriptedProvider::new(&[&add, &done])),
        "mock",
        Arc::new(default_registry(ledger.clone())),
        Arc::new(EventBus::default()),
    );
    let state = Arc::new(GatewayState::new(
        Arc::new(agent),
        ledger,
        &pennywise_config::AppConfig::default(),
    ));

    let chat = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({"message": "I spent $50 on lunch", "user_id": "kim"}).to_string(),
        ))
        .unwrap();
    let response = build_router(state.clone()).oneshot(chat).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let chat: AgentResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(chat.steps_taken, 2);

    let summary = Request::builder()
        .uri("/expenses/summary?user_id=kim")
        .body(Body::empty())
        .unwrap();
    let response = build_router(state).oneshot(summary).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["totals"]["food"], 50.0);
    assert_eq!(json["alerts"], serde_json::json!([]));
}
