//! Reasoning statistics and the search trace
//!
//! Counters accumulate across a session's lifetime and are reported by
//! `dump`. The search trace is a human-readable account of which proof
//! strategies were attempted for a goal and why each declined; it is
//! collected only when tracing is enabled for the session.

use serde::{Deserialize, Serialize};

/// Session-lifetime reasoning counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningStats {
    /// `prove` invocations
    pub proofs_run: u64,
    /// `query` invocations
    pub queries_run: u64,
    /// Rule unification attempts
    pub rule_attempts: u64,
    /// Fact-index scans
    pub kb_scans: u64,
    /// Vector similarity evaluations
    pub similarity_checks: u64,
    /// Proof-goal memo hits
    pub memo_hits: u64,
    /// Reasoning steps consumed across all proofs
    pub steps_executed: u64,
}

impl ReasoningStats {
    /// Fold per-proof deltas into the session totals
    pub fn merge(&mut self, other: &ReasoningStats) {
        self.proofs_run += other.proofs_run;
        self.queries_run += other.queries_run;
        self.rule_attempts += other.rule_attempts;
        self.kb_scans += other.kb_scans;
        self.similarity_checks += other.similarity_checks;
        self.memo_hits += other.memo_hits;
        self.steps_executed += other.steps_executed;
    }
}

/// Human-readable record of declined strategies for one proof
#[derive(Debug, Clone, Default)]
pub struct SearchTrace {
    enabled: bool,
    entries: Vec<String>,
}

impl SearchTrace {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Record why a strategy declined the goal
    pub fn declined(&mut self, strategy: &str, goal: &str, why: &str) {
        if self.enabled {
            self.entries.push(format!("{}: '{}' - {}", strategy, goal, why));
        }
    }

    /// Record a strategy success
    pub fn matched(&mut self, strategy: &str, goal: &str) {
        if self.enabled {
            self.entries.push(format!("{}: '{}' - matched", strategy, goal));
        }
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}

// ============================================================================
// TESTS
// ============================================================================
