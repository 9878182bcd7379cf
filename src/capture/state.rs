use serde::{Deserialize, Serialize};

/// Lifecycle of one capture loop. Only moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum PipelineState {
    Initializing,
    Running,
    Draining,
    Terminated,
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState::Initializing
    }
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Initializing => "Initializing",
            PipelineState::Running => "Running",
            PipelineState::Draining => "Draining",
            PipelineState::Terminated => "Terminated",
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: PipelineState) -> bool {
        matches!(
            (self, next),
            (PipelineState::Initializing, PipelineState::Running)
                | (PipelineState::Running, PipelineState::Draining)
                | (PipelineState::Draining, PipelineState::Terminated)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward_one_step() {
        use PipelineState::*;
        assert!(Initializing.can_advance_to(Running));
        assert!(Running.can_advance_to(Draining));
        assert!(Draining.can_advance_to(Terminated));

        assert!(!Terminated.can_advance_to(Initializing));
        assert!(!Running.can_advance_to(Initializing));
        assert!(!Initializing.can_advance_to(Draining));
        assert!(!Terminated.can_advance_to(Running));
    }
}
