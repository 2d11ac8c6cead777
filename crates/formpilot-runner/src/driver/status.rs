use std::fmt;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunPhase {
    #[default]
    Idle,
    Analyzing,
    Mapping,
    Answering,
    Filling,
    Settling,
    Navigating,
    Complete,
    Failed,
}

impl RunPhase {
    /// Whether the run has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Mapping => "mapping",
            Self::Answering => "answering",
            Self::Filling => "filling",
            Self::Settling => "settling",
            Self::Navigating => "navigating",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepState {
    /// Successful advances so far.
    pub step: usize,
    /// Fields the page reported as filled, summed over steps.
    pub filled: usize,
    pub running: bool,
}

/// Snapshot published on every phase change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatus {
    pub phase: RunPhase,
    pub step: usize,
    pub filled: usize,
    pub message: String,
}

/// Why a run stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// No forward-progress control was left.
    Finished,
    /// The step cap tripped.
    SafetyLimit,
}

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Number of successful advances.
    pub steps: usize,
    /// Total fields filled.
    pub filled: usize,
    pub completion: Completion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display_and_terminal() {
        assert_eq!(RunPhase::Answering.to_string(), "answering");
        assert!(RunPhase::Failed.is_terminal());
        assert!(RunPhase::Complete.is_terminal());
        assert!(!RunPhase::Settling.is_terminal());
        assert_eq!(RunStatus::default().phase, RunPhase::Idle);
    }
}
