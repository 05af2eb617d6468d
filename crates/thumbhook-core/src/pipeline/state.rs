//! Per-invocation pipeline state machine.

use serde::Serialize;

/// Where a single pipeline invocation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    GateChecked,
    Fetched,
    Normalized,
    Encoded,
    Written,
    Done,
    /// Capability check failed; nothing was fetched or written
    Aborted,
    /// Unrecoverable error; the record was not updated by this run
    Failed,
}

impl PipelineState {
    /// States reachable in one step from `self`.
    pub fn allowed_transitions(self) -> &'static [PipelineState] {
        use PipelineState::*;
        match self {
            Idle => &[GateChecked, Failed],
            GateChecked => &[Fetched, Aborted, Failed],
            Fetched => &[Normalized, Failed],
            Normalized => &[Encoded, Failed],
            Encoded => &[Written, Failed],
            Written => &[Done, Failed],
            Done | Aborted | Failed => &[],
        }
    }

    pub fn can_transition_to(self, next: PipelineState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Done | PipelineState::Aborted | PipelineState::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::GateChecked => "gate_checked",
            PipelineState::Fetched => "fetched",
            PipelineState::Normalized => "normalized",
            PipelineState::Encoded => "encoded",
            PipelineState::Written => "written",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
            PipelineState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one invocation's progress through the states.
#[derive(Debug)]
pub struct PipelineRun {
    key: String,
    state: PipelineState,
}

impl PipelineRun {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Move to `next`, returning the state that was left.
    ///
    /// Illegal transitions are a programming error and panic in debug builds.
    pub fn advance(&mut self, next: PipelineState) -> PipelineState {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal pipeline transition {} -> {} for {}",
            self.state,
            next,
            self.key
        );
        tracing::trace!(key = %self.key, from = %self.state, to = %next, "pipeline transition");
        std::mem::replace(&mut self.state, next)
    }
}
