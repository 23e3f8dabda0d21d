//! Memory engine tools (spec.md §4.3, §4.11) — search and write entries in
//! the hybrid vector+FTS memory store.
//!
//! Two tools:
//! - `knowledge_search` — topK memory search, returns matching entries with full content.
//! - `knowledge_write`  — store a new memory entry.

use std::sync::Arc;

use async_trait::async_trait;

use scalyclaw_memory::types::{MemoryInput, SearchOptions};

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

// ---------------------------------------------------------------------------
// knowledge_search
// ---------------------------------------------------------------------------

/// Search the knowledge base by full-text query.
pub struct KnowledgeSearchTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> KnowledgeSearchTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for KnowledgeSearchTool<C> {
    fn name(&self) -> &str {
        "knowledge_search"
    }

    fn description(&self) -> &str {
        "Search the persistent knowledge base for facts, configurations, and technical details. \
         Use this before answering questions about available models, setup instructions, \
         deployment steps, or any topic that might have been saved previously. \
         Returns up to 5 matching entries with full content."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Full-text search query. Use keywords or phrases (e.g. 'claude models', 'discord setup', 'deployment')."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => q.to_string(),
            _ => return ToolResult::error("missing required parameter: query"),
        };

        let opts = SearchOptions { top_k: 5, ..Default::default() };
        match self.ctx.memory().search_memory(&query, opts) {
            Ok(results) if results.is_empty() => {
                ToolResult::success(format!("No memory entries found for: {}", query))
            }
            Ok(results) => {
                let mut out = format!("Found {} memory entry/entries:\n\n", results.len());
                for result in &results {
                    out.push_str(&format!("### {}\n", result.memory.subject));
                    if !result.memory.tags.is_empty() {
                        out.push_str(&format!("tags: {}\n", result.memory.tags.join(", ")));
                    }
                    out.push_str(&result.memory.content);
                    out.push_str("\n\n---\n\n");
                }
                ToolResult::success(out.trim_end_matches("\n\n---\n\n").to_string())
            }
            Err(e) => ToolResult::error(format!("memory search failed: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// knowledge_write
// ---------------------------------------------------------------------------

/// Upsert an entry in the knowledge base.
pub struct KnowledgeWriteTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> KnowledgeWriteTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for KnowledgeWriteTool<C> {
    fn name(&self) -> &str {
        "knowledge_write"
    }

    fn description(&self) -> &str {
        "Save or update a fact in the persistent knowledge base. \
         Use this to remember technical details, configurations, instructions, or \
         any information that should be available in future conversations. \
         Existing entries with the same topic are overwritten."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "Unique slug identifying this entry (e.g. 'claude_models', 'discord_setup', 'deploy_steps'). Use underscores, no spaces."
                },
                "content": {
                    "type": "string",
                    "description": "Markdown content to store. Be concise but complete."
                },
                "tags": {
                    "type": "string",
                    "description": "Optional comma-separated tags for categorisation (e.g. 'ai,anthropic,models')."
                }
            },
            "required": ["topic", "content"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let topic = match input.get("topic").and_then(|v| v.as_str()) {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => return ToolResult::error("missing required parameter: topic"),
        };
        let content = match input.get("content").and_then(|v| v.as_str()) {
            Some(c) if !c.trim().is_empty() => c.trim().to_string(),
            _ => return ToolResult::error("missing required parameter: content"),
        };
        let tags: Vec<String> = input
            .get("tags")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let input = MemoryInput {
            subject: topic.clone(),
            content,
            memory_type: None,
            tags,
            expires_at: None,
        };
        match self.ctx.memory().store_memory(input) {
            Ok(_) => ToolResult::success(format!("Memory saved: {}", topic)),
            Err(e) => ToolResult::error(format!("memory write failed: {e}")),
        }
    }
}
