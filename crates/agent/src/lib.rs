//! The Pennywise agent loop.
//!
//! Each user message runs a bounded **Reason → Act** cycle:
//!
//! 1. **Reason**: render the tool catalog and the transcript so far into a
//!    prompt and ask the model for a JSON [`Decision`]
//! 2. **Route**: a final answer or the iteration cap ends the loop; a tool
//!    request moves on to execution
//! 3. **Act**: run the requested finance tool for the caller's identity and
//!    append its result to the transcript, then reason again
//!
//! Model and tool failures never escape; they become transcript entries or
//! the fixed fallback decision.

pub mod decision;
pub mod loop_runner;
pub mod prompt;
pub mod routing;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use decision::Decision;
pub use loop_runner::AgentLoop;
pub use routing::{DEFAULT_MAX_ITERATIONS, Route, route};
pub use state::{AgentResponse, LoopState, NO_ANSWER, Phase};
