//! Route handlers and wire types.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use pennywise_agent::AgentResponse;
use pennywise_core::error::{LedgerError, ValidationError};
use pennywise_core::finance::{BudgetAlert, Category, Expense, NewExpense};

use crate::SharedState;

/// Upper bound on a chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

// --- Errors ---

/// JSON error body: `{"error": "...", "type": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 422: the request was well-formed but its values are not acceptable
    Validation(String),
    /// The body could not be read as the expected JSON
    Rejected { status: StatusCode, message: String },
    /// 503: a dependency is down
    Unavailable(String),
    /// 500
    Internal { kind: &'static str, message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = match self {
            ApiError::Validation(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "ValidationError", message)
            }
            ApiError::Rejected { status, message } => {
                let kind = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PayloadTooLarge"
                } else {
                    "ValidationError"
                };
                (status, kind, message)
            }
            ApiError::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable", message)
            }
            ApiError::Internal { kind, message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, kind, message)
            }
        };
        let body = ErrorBody {
            error,
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Invalid(v) => v.into(),
            other => {
                error!(error = %other, "Ledger operation failed");
                ApiError::Internal {
                    kind: "LedgerError",
                    message: other.to_string(),
                }
            }
        }
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpenseCreate {
    pub amount: f64,
    pub category: String,
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub totals: BTreeMap<Category, f64>,
    pub alerts: Vec<BudgetAlert>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

impl ExpenseQuery {
    fn user_id(&self, state: &SharedState) -> String {
        self.user_id
            .clone()
            .unwrap_or_else(|| state.default_user.clone())
    }

    fn category(&self) -> Result<Option<Category>, ValidationError> {
        match self.category.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw.parse().map(Some),
            _ => Ok(None),
        }
    }
}

// --- Handlers ---

/// `POST /chat`: run one agent invocation.
///
/// The loop runs on its own task so that a panic inside it surfaces as a
/// 500 instead of tearing down the connection.
pub async fn chat(
    State(state): State<SharedState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<AgentResponse>, ApiError> {
    let Json(request) = request?;
    let chars = request.message.chars().count();
    if chars == 0 || chars > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation(format!(
            "message must be 1 to {MAX_MESSAGE_CHARS} characters, got {chars}"
        )));
    }
    let user_id = request
        .user_id
        .unwrap_or_else(|| state.default_user.clone());
    info!(user_id = %user_id, chars, "Chat request received");

    let agent = state.agent.clone();
    let message = request.message;
    match tokio::spawn(async move { agent.invoke(&message, &user_id).await }).await {
        Ok(response) => Ok(Json(response)),
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic().as_ref());
            error!(error = %message, "Agent invocation panicked");
            Err(ApiError::Internal {
                kind: "AgentPanic",
                message,
            })
        }
        Err(e) => {
            error!(error = %e, "Agent invocation was cancelled");
            Err(ApiError::Internal {
                kind: "AgentCancelled",
                message: e.to_string(),
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "agent panicked".to_string()
    }
}

/// `POST /expenses`: record an expense without going through the agent.
pub async fn create_expense(
    State(state): State<SharedState>,
    Query(query): Query<ExpenseQuery>,
    body: Result<Json<ExpenseCreate>, JsonRejection>,
) -> Result<Json<Expense>, ApiError> {
    let Json(body) = body?;
    let category: Category = body.category.parse()?;
    let expense = NewExpense::new(body.amount, category, body.description)?;
    let stored = state
        .ledger
        .create_expense(&query.user_id(&state), expense)
        .await?;
    Ok(Json(stored))
}

/// `GET /expenses`: newest first, optionally for a single category.
pub async fn list_expenses(
    State(state): State<SharedState>,
    Query(query): Query<ExpenseQuery>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let category = query.category()?;
    let expenses = state
        .ledger
        .list_expenses(&query.user_id(&state), category)
        .await?;
    Ok(Json(expenses))
}

/// `GET /expenses/summary`: per-category totals and budget alerts.
pub async fn expense_summary(
    State(state): State<SharedState>,
    Query(query): Query<ExpenseQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let user_id = query.user_id(&state);
    let totals = state.ledger.totals_by_category(&user_id).await?;
    let alerts = state.ledger.over_budget_alerts(&user_id).await?;
    Ok(Json(SummaryResponse { totals, alerts }))
}

/// `GET /health`: 200 only when the ledger answers.
pub async fn health(State(state): State<SharedState>) -> Result<Json<HealthResponse>, ApiError> {
    match state.ledger.health_check().await {
        Ok(true) => Ok(Json(HealthResponse {
            status: "healthy".into(),
            database: "connected".into(),
        })),
        Ok(false) => {
            warn!(ledger = state.ledger.name(), "Health check failed");
            Err(ApiError::Unavailable("Database error: not reachable".into()))
        }
        Err(e) => {
            warn!(ledger = state.ledger.name(), error = %e, "Health check failed");
            Err(ApiError::Unavailable(format!("Database error: {e}")))
        }
    }
}
