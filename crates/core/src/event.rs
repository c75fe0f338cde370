//! Domain event system — decoupled observation of the agent loop.
//!
//! The loop publishes events as it reasons and acts. The CLI subscribes to
//! show tool activity while a request is in flight; tests subscribe to assert
//! on the sequence of steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A reasoning step produced a decision
    DecisionMade {
        identity: String,
        iteration: usize,
        needs_tool: bool,
        tool_name: Option<String>,
        /// Whether the raw output had to be replaced by the fallback
        fallback: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed (or an unknown tool was requested)
    ToolExecuted {
        identity: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An invocation reached its terminal state
    InvocationCompleted {
        identity: String,
        steps_taken: usize,
        tools_used: Vec<String>,
        answered: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
