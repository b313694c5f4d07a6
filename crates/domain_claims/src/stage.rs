//! The claim pipeline stage machine

use serde::{Deserialize, Serialize};

/// One named step of the claim recovery pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Claim registered by intake; denial not yet recorded
    Intake,
    /// Denial recorded and amounts validated
    Denied,
    /// Denial category assigned by the reasoning service
    Classified,
    /// Structured denial facts extracted
    Extracted,
    /// Appeal letter drafted
    AppealDrafted,
    /// Recovery strategy and estimate set
    StrategySet,
    /// Parked awaiting a human decision
    PendingApproval,
    /// Appeal filed through the submission channel
    Submitted,
    /// Money recovered; terminal
    Recovered,
    /// Recovery failed; terminal
    Failed,
    /// Written off by a human decision; terminal
    WrittenOff,
}

impl Stage {
    /// Returns true for terminal stages
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Recovered | Stage::Failed | Stage::WrittenOff)
    }

    /// The next stage on the happy path, if any
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Intake => Some(Stage::Denied),
            Stage::Denied => Some(Stage::Classified),
            Stage::Classified => Some(Stage::Extracted),
            Stage::Extracted => Some(Stage::AppealDrafted),
            Stage::AppealDrafted => Some(Stage::StrategySet),
            Stage::StrategySet => Some(Stage::PendingApproval),
            Stage::PendingApproval => Some(Stage::Submitted),
            Stage::Submitted => None,
            Stage::Recovered | Stage::Failed | Stage::WrittenOff => None,
        }
    }

    /// Checks whether a transition is valid
    ///
    /// Stages execute strictly in sequence. The exceptions: any non-terminal
    /// stage may route to `PendingApproval` (policy failures and human edits),
    /// and terminal dispositions are reachable from `PendingApproval` and
    /// `Submitted`. Skipping forward requires the engine's audited human
    /// override path, not this check.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        if target == Stage::PendingApproval {
            return true;
        }
        match (self, target) {
            (Stage::PendingApproval, Stage::Failed | Stage::WrittenOff) => true,
            (Stage::Submitted, Stage::Recovered | Stage::Failed) => true,
            _ => self.next() == Some(target),
        }
    }

    /// Stable stage name for records and wire formats
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Denied => "denied",
            Stage::Classified => "classified",
            Stage::Extracted => "extracted",
            Stage::AppealDrafted => "appeal_drafted",
            Stage::StrategySet => "strategy_set",
            Stage::PendingApproval => "pending_approval",
            Stage::Submitted => "submitted",
            Stage::Recovered => "recovered",
            Stage::Failed => "failed",
            Stage::WrittenOff => "written_off",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
