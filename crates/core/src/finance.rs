//! Financial records: categories, expenses, budgets and alerts.
//!
//! `NewExpense` is the only way to hand an expense to a [`Ledger`], so the
//! amount/category/description constraints hold for everything persisted.
//!
//! [`Ledger`]: crate::ledger::Ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::error::ValidationError;

/// Longest accepted expense description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// The fixed set of spending categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transport,
    Entertainment,
    Shopping,
    Bills,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Food,
        Category::Transport,
        Category::Entertainment,
        Category::Shopping,
        Category::Bills,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Transport => "transport",
            Category::Entertainment => "entertainment",
            Category::Shopping => "shopping",
            Category::Bills => "bills",
            Category::Other => "other",
        }
    }

    /// Capitalized name for human-readable summaries ("Food", "Bills").
    pub fn label(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Comma-separated list of every category, as shown to the model.
    pub fn catalog() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// Validate a money amount: finite, rounded to cents, strictly positive.
pub fn validate_amount(amount: f64) -> Result<f64, ValidationError> {
    if !amount.is_finite() {
        return Err(ValidationError::NonFiniteAmount);
    }
    let rounded = (amount * 100.0).round() / 100.0;
    // Scaling to cents overflows near f64::MAX.
    if !rounded.is_finite() {
        return Err(ValidationError::NonFiniteAmount);
    }
    if rounded <= 0.0 {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    Ok(rounded)
}

/// A validated expense that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    amount: f64,
    category: Category,
    description: String,
}

impl NewExpense {
    pub fn new(
        amount: f64,
        category: Category,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let amount = validate_amount(amount)?;
        let description = description.into();
        let len = description.chars().count();
        if len == 0 || len > MAX_DESCRIPTION_CHARS {
            return Err(ValidationError::DescriptionLength {
                len,
                max: MAX_DESCRIPTION_CHARS,
            });
        }
        Ok(Self {
            amount,
            category,
            description,
        })
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A persisted expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub amount: f64,
    pub category: Category,
    pub description: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A per-user spending limit for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub category: Category,
    pub amount: f64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A category where spending exceeds its budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub category: Category,
    pub budget: f64,
    pub spent: f64,
    pub overage: f64,
}
