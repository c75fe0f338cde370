//! # Pennywise Core
//!
//! Domain types, traits, and error definitions for the Pennywise finance
//! assistant. This crate has **no framework dependencies**: it defines the
//! domain model that every other crate implements against.
//!
//! Each outer collaborator is a trait here, with implementations in its own
//! crate:
//! - [`Provider`] — the language model (`pennywise-providers`)
//! - [`Ledger`] — the relational store (`pennywise-ledger`)
//! - [`Tool`] — the business operations (`pennywise-tools`)

pub mod error;
pub mod event;
pub mod finance;
pub mod ledger;
pub mod message;
pub mod provider;
pub mod tool;

pub use error::{DecisionError, LedgerError, ProviderError, ToolError, ValidationError};
pub use event::{DomainEvent, EventBus};
pub use finance::{Budget, BudgetAlert, Category, Expense, NewExpense};
pub use ledger::Ledger;
pub use message::{Role, Turn, render_transcript};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use tool::{ParamSpec, Tool, ToolArgs, ToolName, ToolRegistry, ToolResult, ToolSchema};
