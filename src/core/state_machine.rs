//! Run sequence states
//!
//! Kept in memory only: a seeding run is a single pass and never resumes.

use crate::core::error::SeedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seeding run state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    WaitForRegistry,
    UnpublishAll,
    PublishAll,
    DoneIdle,
    Failed,
}

impl RunState {
    /// Allowed forward transitions; `Failed` is reachable from every working state
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::WaitForRegistry, Self::UnpublishAll)
                | (Self::UnpublishAll, Self::PublishAll)
                | (Self::PublishAll, Self::DoneIdle)
                | (Self::WaitForRegistry, Self::Failed)
                | (Self::UnpublishAll, Self::Failed)
                | (Self::PublishAll, Self::Failed)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitForRegistry => "WAIT_FOR_REGISTRY",
            Self::UnpublishAll => "UNPUBLISH_ALL",
            Self::PublishAll => "PUBLISH_ALL",
            Self::DoneIdle => "DONE_IDLE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: RunState,
    pub to: RunState,
    pub timestamp: DateTime<Utc>,
    /// Error message when entering `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// State machine for one seeding run
#[derive(Debug)]
pub struct RunStateMachine {
    current_state: RunState,
    transitions: Vec<StateTransition>,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: RunState::WaitForRegistry,
            transitions: Vec::new(),
        }
    }

    /// Move to `to`, rejecting transitions the run sequence never makes
    pub fn transition(&mut self, to: RunState) -> Result<(), SeedError> {
        self.push(to, None)
    }

    /// Enter `Failed`, recording the error that caused it
    pub fn fail(&mut self, error: &SeedError) -> Result<(), SeedError> {
        self.push(RunState::Failed, Some(error.to_string()))
    }

    fn push(&mut self, to: RunState, error: Option<String>) -> Result<(), SeedError> {
        if !self.current_state.can_transition_to(to) {
            return Err(SeedError::InvalidTransition {
                from: self.current_state.to_string(),
                to: to.to_string(),
            });
        }

        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
            error,
        });
        self.current_state = to;

        Ok(())
    }

    pub fn state(&self) -> RunState {
        self.current_state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}
