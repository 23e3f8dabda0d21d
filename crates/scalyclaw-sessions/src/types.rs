use serde::{Deserialize, Serialize};

/// Per-channel advisory session state (spec.md §3 "Session record":
/// `IDLE → PROCESSING → {TOOL_EXEC, RESPONDING} → DRAINING`;
/// `CANCELLING` may be set externally and is sticky until release).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Processing,
    ToolExec,
    Responding,
    Draining,
    Cancelling,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Processing => write!(f, "processing"),
            SessionState::ToolExec => write!(f, "tool_exec"),
            SessionState::Responding => write!(f, "responding"),
            SessionState::Draining => write!(f, "draining"),
            SessionState::Cancelling => write!(f, "cancelling"),
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SessionState::Idle),
            "processing" => Ok(SessionState::Processing),
            "tool_exec" => Ok(SessionState::ToolExec),
            "responding" => Ok(SessionState::Responding),
            "draining" => Ok(SessionState::Draining),
            "cancelling" => Ok(SessionState::Cancelling),
            other => Err(format!("unknown session state: {other}")),
        }
    }
}

/// Snapshot of a channel's advisory session, for status/debugging surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub channel_id: String,
    pub state: SessionState,
    pub owner: String,
    pub heartbeat_ms: i64,
    pub acquired_ms: i64,
}
