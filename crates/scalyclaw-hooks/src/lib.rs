//! `scalyclaw-hooks` — the guard pipeline (spec.md §4.9): fail-closed
//! echo/content/skill/agent checks plus a deterministic command shield,
//! dispatched through a priority-ordered [`engine::HookEngine`].

pub mod engine;
pub mod error;
pub mod guard_model;
pub mod guards;
pub mod types;

pub use engine::HookEngine;
pub use error::{HookError, Result};
pub use guard_model::{GuardCompletion, GuardModel, GuardModelError, GuardUsageSink};
pub use guards::{AgentGuard, CommandShield, ContentGuard, EchoGuard, SkillGuard};
pub use types::{
    EchoDirection, GuardVerdict, HookAction, HookContext, HookDefinition, HookEvent, HookHandler,
    HookResult, HookTiming,
};
