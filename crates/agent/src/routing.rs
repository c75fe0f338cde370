//! Routing policy: what happens after a reasoning step.

use crate::decision::Decision;

/// Default reasoning-step cap per invocation.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// The transition chosen after a reasoning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ExecuteTool,
    Finish,
}

/// Decide the next transition. First matching rule wins:
///
/// 1. a non-empty final answer finishes,
/// 2. reaching the iteration cap finishes,
/// 3. a tool request with a non-empty name executes it,
/// 4. anything else finishes.
pub fn route(decision: &Decision, iterations: usize, max_iterations: usize) -> Route {
    if decision.final_answer().is_some() {
        return Route::Finish;
    }
    if iterations >= max_iterations {
        return Route::Finish;
    }
    if decision.needs_tool() && decision.tool_name().is_some() {
        return Route::ExecuteTool;
    }
    Route::Finish
}
