//! Orchestrator lifecycle states and the validated transition table.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    #[default]
    Idle,
    Analyzing,
    Planning,
    Delegating,
    Monitoring,
    Integrating,
    Verifying,
    /// Conversational side branch.
    Responding,
    Complete,
    Error,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::Analyzing => "analyzing",
            OrchestratorState::Planning => "planning",
            OrchestratorState::Delegating => "delegating",
            OrchestratorState::Monitoring => "monitoring",
            OrchestratorState::Integrating => "integrating",
            OrchestratorState::Verifying => "verifying",
            OrchestratorState::Responding => "responding",
            OrchestratorState::Complete => "complete",
            OrchestratorState::Error => "error",
        }
    }

    /// Whether a request may start from this state.
    pub fn is_resting(&self) -> bool {
        matches!(
            self,
            OrchestratorState::Idle | OrchestratorState::Complete | OrchestratorState::Error
        )
    }

    /// Check if a transition to `target` is allowed.
    ///
    /// - Idle / Complete / Error -> Analyzing
    /// - Analyzing -> Planning or Responding
    /// - Planning -> Delegating, or Integrating for an empty plan
    /// - Delegating -> Monitoring -> Delegating (next group) or Integrating
    /// - Integrating -> Verifying -> Complete
    /// - Responding -> Complete
    /// - anything -> Error
    pub fn can_transition(&self, target: OrchestratorState) -> bool {
        use OrchestratorState::*;

        if target == Error {
            return true;
        }
        matches!(
            (self, target),
            (Idle | Complete | Error, Analyzing)
                | (Analyzing, Planning | Responding)
                | (Planning, Delegating | Integrating)
                | (Delegating, Monitoring)
                | (Monitoring, Delegating | Integrating)
                | (Integrating, Verifying)
                | (Verifying, Complete)
                | (Responding, Complete)
        )
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current state plus the time each state was entered.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: OrchestratorState,
    history: Vec<(OrchestratorState, Instant)>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: OrchestratorState::Idle,
            history: vec![(OrchestratorState::Idle, Instant::now())],
        }
    }

    pub fn current(&self) -> OrchestratorState {
        self.current
    }

    /// Time spent in the current state so far.
    pub fn elapsed(&self) -> Duration {
        self.history
            .last()
            .map(|(_, entered_at)| entered_at.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    pub fn history(&self) -> &[(OrchestratorState, Instant)] {
        &self.history
    }

    /// Move to `target`, returning the state left behind.
    ///
    /// # Errors
    /// `Error::InvalidStateTransition` if the table forbids the move.
    pub fn transition(&mut self, target: OrchestratorState) -> Result<OrchestratorState> {
        if !self.current.can_transition(target) {
            return Err(Error::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            });
        }
        let from = self.current;
        self.current = target;
        self.history.push((target, Instant::now()));
        Ok(from)
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
