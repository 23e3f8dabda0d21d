use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::types::{HookAction, HookContext, HookDefinition, HookResult, HookTiming};

/// Central registry and dispatcher for all hooks in the system.
///
/// Designed to be cheaply cloneable via Arc — a single HookEngine instance
/// should be shared across the whole process (pass as Arc<HookEngine>).
pub struct HookEngine {
    /// Sorted by priority ascending after every registration.
    hooks: RwLock<Vec<HookDefinition>>,
}

impl HookEngine {
    pub fn new() -> Self {
        Self { hooks: RwLock::new(Vec::new()) }
    }

    /// Register a hook. Re-sorts the list so priority order is always correct.
    pub fn register(&self, hook: HookDefinition) {
        let mut hooks = self.hooks.write().expect("hook registry poisoned");
        hooks.push(hook);
        // Stable sort preserves registration order within the same priority.
        hooks.sort_by_key(|h| h.priority);
        debug!(name = %hooks.last().unwrap().name, "hook registered");
    }

    /// Remove a hook by name. Silent no-op if the name is not found.
    pub fn unregister(&self, name: &str) {
        let mut hooks = self.hooks.write().expect("hook registry poisoned");
        let before = hooks.len();
        hooks.retain(|h| h.name != name);
        if hooks.len() < before {
            debug!(name, "hook unregistered");
        }
    }

    /// Emit an event: run Before hooks (awaited, fail-closed), then After
    /// hooks (fire-and-forget).
    ///
    /// Returns the combined result — callers should check `action` to decide
    /// whether to continue or abort their operation.
    pub async fn emit(&self, mut ctx: HookContext) -> HookResult {
        let action = self.emit_before(&mut ctx).await;

        // If a Before hook blocked, skip After hooks — the event never happened.
        if matches!(action, HookAction::Block { .. }) {
            return HookResult { action, duration_ms: 0 };
        }

        self.emit_after(ctx);

        HookResult { action, duration_ms: 0 }
    }

    /// Run all Before hooks in priority order, awaiting each in turn.
    ///
    /// Stops at the first Block. Modify updates the context payload in-place
    /// so subsequent hooks see the mutated version. Any handler error is
    /// treated as a block — the pipeline is fail-closed (spec.md §4.9).
    pub async fn emit_before(&self, ctx: &mut HookContext) -> HookAction {
        // Snapshot under the lock, then drop it before awaiting — handlers can
        // run arbitrarily long (LLM calls) and must not hold the registry lock.
        let matching: Vec<_> = {
            let hooks = self.hooks.read().expect("hook registry poisoned");
            hooks
                .iter()
                .filter(|h| h.event == ctx.event && h.timing == HookTiming::Before)
                .map(|h| (h.name.clone(), Arc::clone(&h.handler)))
                .collect()
        };

        for (name, handler) in matching {
            let t = Instant::now();
            let result = handler.handle(ctx).await;
            let elapsed_ms = t.elapsed().as_millis() as u64;

            match result {
                Ok(result) => {
                    debug!(hook = %name, duration_ms = elapsed_ms, "before hook completed");
                    match result.action {
                        HookAction::Block { ref reason } => {
                            warn!(hook = %name, reason, "hook blocked event");
                            return result.action;
                        }
                        HookAction::Modify { ref payload } => {
                            // Propagate payload mutation so the next hook sees updated data.
                            ctx.payload = payload.clone();
                        }
                        HookAction::Allow => {}
                    }
                }
                Err(e) => {
                    // Fail-closed: a hook that errors blocks the event.
                    error!(hook = %name, error = %e, "before hook errored, blocking");
                    return HookAction::Block { reason: format!("hook {name} failed: {e}") };
                }
            }
        }

        HookAction::Allow
    }

    /// Spawn all After hooks concurrently — errors are logged, never propagated.
    pub fn emit_after(&self, ctx: HookContext) {
        let matching: Vec<_> = {
            let hooks = self.hooks.read().expect("hook registry poisoned");
            hooks
                .iter()
                .filter(|h| h.event == ctx.event && h.timing == HookTiming::After)
                .map(|h| (h.name.clone(), Arc::clone(&h.handler)))
                .collect()
        };

        for (name, handler) in matching {
            let ctx_clone = ctx.clone();

            tokio::spawn(async move {
                let t = Instant::now();
                let result = handler.handle(&ctx_clone).await;
                let elapsed_ms = t.elapsed().as_millis() as u64;

                match result {
                    Ok(result) => {
                        if let HookAction::Block { reason } = result.action {
                            // After hooks cannot actually block — log the misconfiguration.
                            error!(
                                hook = %name,
                                duration_ms = elapsed_ms,
                                reason,
                                "after hook returned Block — ignored (use Before timing to block)"
                            );
                        } else {
                            debug!(hook = %name, duration_ms = elapsed_ms, "after hook completed");
                        }
                    }
                    Err(e) => {
                        error!(hook = %name, duration_ms = elapsed_ms, error = %e, "after hook errored");
                    }
                }
            });
        }
    }
}

impl Default for HookEngine {
    fn default() -> Self {
        Self::new()
    }
}
