//! Per-candidate results of an escalation cycle.

use crate::types::{ComplaintId, DepartmentId, Level, OfficerId, RuleId};
use serde::{Deserialize, Serialize};

/// Why a candidate produced no escalation this cycle. None of these are
/// errors; the candidate is simply looked at again next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MaxLevelReached,
    NoMatchingRule,
    ConditionsNotMet,
    AlreadyEscalated,
    NoTargetDepartment,
    NoAuthority,
    ConcurrentlyModified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Escalated {
        escalation_id: String,
        rule_id: RuleId,
        from_level: Level,
        to_level: Level,
        department_id: DepartmentId,
        officer_id: Option<OfficerId>,
    },
    /// Dry-run: everything up to the write succeeded.
    WouldEscalate {
        rule_id: RuleId,
        from_level: Level,
        to_level: Level,
        department_id: DepartmentId,
        officer_id: Option<OfficerId>,
    },
    Reminded {
        rule_id: RuleId,
        level: Level,
    },
    Skipped {
        skip: SkipReason,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub complaint_id: ComplaintId,
    pub complaint_number: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub reason: String,
}

impl CandidateResult {
    pub fn is_escalated(&self) -> bool {
        matches!(self.outcome, Outcome::Escalated { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.outcome {
            Outcome::Skipped { skip } => Some(skip),
            _ => None,
        }
    }
}

/// Aggregate counts for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    pub processed: usize,
    pub escalated: usize,
    pub reminders: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleStats {
    pub fn record(&mut self, outcome: &Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Escalated { .. } => self.escalated += 1,
            Outcome::Reminded { .. } => self.reminders += 1,
            Outcome::WouldEscalate { .. } | Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_each_outcome_once() {
        let mut stats = CycleStats::default();
        stats.record(&Outcome::Skipped { skip: SkipReason::NoMatchingRule });
        stats.record(&Outcome::Failed { error: "boom".into() });
        stats.record(&Outcome::Reminded { rule_id: "r".into(), level: 0 });
        assert_eq!(
            stats,
            CycleStats { processed: 3, escalated: 0, reminders: 1, skipped: 1, failed: 1 }
        );
    }

    #[test]
    fn result_serializes_flat() {
        let r = CandidateResult {
            complaint_id: "c1".into(),
            complaint_number: "CMP-1".into(),
            outcome: Outcome::Skipped { skip: SkipReason::AlreadyEscalated },
            reason: "Already escalated at L1 within cooldown".into(),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["outcome"], "skipped");
        assert_eq!(v["skip"], "already_escalated");
        assert_eq!(v["complaint_number"], "CMP-1");
    }
}
