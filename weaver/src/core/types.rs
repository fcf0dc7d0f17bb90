//! Shared types for the session core.
//!
//! These types carry no I/O handles. They are the contracts passed between the
//! allocator, the content selector, drive adapters and the session controller.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One catalog entry: a topic and the example that illustrates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub label: String,
    pub description: String,
    pub example: String,
}

impl Topic {
    pub fn new(label: &str, description: &str, example: &str) -> Self {
        Self {
            label: label.to_string(),
            description: description.to_string(),
            example: example.to_string(),
        }
    }
}

/// Label plus rendered, size-bounded body produced by the content selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub label: String,
    pub body: String,
    /// True when the rendered body hit the size ceiling and was cut.
    pub truncated: bool,
}

/// A name handed out by the allocator and the output path it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub path: PathBuf,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    DeadlineReached,
    FailureThresholdExceeded,
    Cancelled,
    StartupFailed,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeadlineReached => "deadline_reached",
            Self::FailureThresholdExceeded => "failure_threshold_exceeded",
            Self::Cancelled => "cancelled",
            Self::StartupFailed => "startup_failed",
        }
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Running,
    Terminating(TerminationReason),
    Terminated(TerminationReason),
}

/// Final counters for a session. Always produced, however the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub success_count: u32,
    pub failure_count: u32,
    pub elapsed: Duration,
    pub termination_reason: TerminationReason,
}

/// Per-iteration progress, handed to the caller's observer after every iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationOutcome {
    /// Iteration number (1-indexed).
    pub iter: u32,
    pub label: Option<String>,
    pub artifact: Option<PathBuf>,
    /// `kind: message` of the failure, if the iteration failed.
    pub error: Option<String>,
    pub success_count: u32,
    pub failure_count: u32,
    pub consecutive_failures: u32,
    pub remaining: Duration,
}

impl IterationOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
