//! Concurrent tool-call execution (spec.md §4.11 "execute tool calls
//! concurrently ... each tool result is truncated to the remaining context
//! budget").
//!
//! The round loop itself lives in `pipeline::orchestrator` — this module only
//! owns the "given these tool calls, run them all and truncate the results"
//! step, shared by the orchestrator and the (future) agent runner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::provider::ToolCall;

use super::{Tool, ToolResult};

/// One tool call's outcome, tagged with the correlation id the provider sent
/// so the result can be matched back to the right `tool_use` block.
pub struct ToolResultEntry {
    pub tool_use_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

/// Execute every call in `calls` concurrently against `tools`, truncating
/// each result to whatever is left of `remaining_budget_chars` at the moment
/// it completes. Truncation is budgeted with a shared atomic counter so two
/// tool calls finishing at nearly the same time don't together blow past the
/// budget.
pub async fn execute_tool_calls_concurrent(
    tools: &[Box<dyn Tool>],
    calls: &[ToolCall],
    remaining_budget_chars: usize,
) -> Vec<ToolResultEntry> {
    let budget = Arc::new(AtomicUsize::new(remaining_budget_chars));

    let futures = calls.iter().map(|call| {
        let budget = Arc::clone(&budget);
        async move {
            let result = execute_tool(tools, call).await;
            let content = reserve_and_truncate(&budget, result.content);
            ToolResultEntry {
                tool_use_id: call.id.clone(),
                tool_name: call.name.clone(),
                content,
                is_error: result.is_error,
            }
        }
    });

    futures_util::future::join_all(futures).await
}

/// Find and execute the named tool. Returns an error `ToolResult` if not found.
async fn execute_tool(tools: &[Box<dyn Tool>], call: &ToolCall) -> ToolResult {
    match tools.iter().find(|t| t.name() == call.name) {
        Some(tool) => {
            debug!(tool = %call.name, "executing tool");
            tool.execute(call.input.clone()).await
        }
        None => ToolResult::error(format!("unknown tool: {}", call.name)),
    }
}

/// Atomically claim up to `content.len()` bytes from `budget`, truncating
/// `content` to whatever was actually available.
fn reserve_and_truncate(budget: &AtomicUsize, content: String) -> String {
    let mut current = budget.load(Ordering::SeqCst);
    loop {
        let take = content.len().min(current);
        match budget.compare_exchange_weak(current, current - take, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => {
                return if take == content.len() {
                    content
                } else if take == 0 {
                    "[tool result omitted: context budget exhausted]".to_string()
                } else {
                    let mut truncated = truncate_at_char_boundary(&content, take);
                    truncated.push_str("\n[truncated: context budget exhausted]");
                    truncated
                };
            }
            Err(observed) => current = observed,
        }
    }
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> String {
    let mut end = max_bytes.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({})
        }
        async fn execute(&self, input: serde_json::Value) -> ToolResult {
            ToolResult::success(input.to_string())
        }
    }

    #[tokio::test]
    async fn unknown_tool_returns_error_result() {
        let tools: Vec<Box<dyn Tool>> = vec![];
        let call = ToolCall { id: "1".to_string(), name: "missing".to_string(), input: json!({}) };
        let results = execute_tool_calls_concurrent(&tools, std::slice::from_ref(&call), 1000).await;
        assert!(results[0].is_error);
    }

    #[tokio::test]
    async fn truncates_when_budget_exceeded() {
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(EchoTool)];
        let call = ToolCall {
            id: "1".to_string(),
            name: "echo".to_string(),
            input: json!("0123456789"),
        };
        let results = execute_tool_calls_concurrent(&tools, std::slice::from_ref(&call), 5).await;
        assert!(results[0].content.len() <= 5 + "\n[truncated: context budget exhausted]".len());
        assert!(results[0].content.contains("truncated"));
    }
}
