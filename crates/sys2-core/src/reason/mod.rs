//! Proof engine (symbolic priority)
//!
//! Backward chaining over a fixed ladder of proof strategies. For every goal
//! the engine tries, in order: quantified-goal handling, the negation
//! family, reflexive/direct matches, symmetric/inverse/synonym rewrites,
//! transitive chains, property inheritance with default-exception blocking,
//! modus ponens, indexed rule unification, and a last-resort weak vector
//! match. The first success wins.
//!
//! Termination is layered: per-branch depth guards, a global step budget, a
//! wall-clock timeout, goal-string cycle detection (vector hashes are
//! unusable here because commutative binding equates permuted-argument
//! goals), and memoization keyed by goal string plus the negation/CWA mode
//! flags so results never leak across modes.

mod chains;
mod conditions;
mod negation;
mod quantifier;
mod rules;
mod stats;
mod unify;

pub use rules::{Rule, RuleId, RuleSet};
pub use stats::{ReasoningStats, SearchTrace};
pub use unify::{instantiate, unify_pattern, walk, Bindings};

use crate::dsl::{Expr, Statement};
use crate::executor;
use crate::hdc::{Strategy, Vector};
use crate::kb::{CanonicalMetadata, KnowledgeBase};
use crate::scope::Scope;
use crate::semantics::{SemanticIndex, NOT_OPERATOR, TYPE_OPERATOR};
use crate::vocabulary::{Vocabulary, MAX_POSITIONS};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Quantifier operator handled structurally
pub const EXISTS_OPERATOR: &str = "Exists";

// ============================================================================
// OPTIONS AND RESULTS
// ============================================================================

/// Per-proof budgets and mode flags
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOptions {
    /// Per-branch recursion guard
    pub max_depth: usize,
    /// Global reasoning-step budget
    pub max_steps: usize,
    /// Wall-clock budget in milliseconds
    pub timeout_ms: u64,
    /// Closed-world assumption: unprovable statements count as false
    pub closed_world: bool,
    /// Collect the human-readable search trace
    pub trace_enabled: bool,
}

impl Default for ProofOptions {
    fn default() -> Self {
        Self {
            max_depth: 200,
            max_steps: 1000,
            timeout_ms: 5000,
            closed_world: false,
            trace_enabled: false,
        }
    }
}

/// One step of a successful proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofStep {
    pub method: String,
    pub statement: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub detail: String,
}

impl ProofStep {
    pub fn new(method: &str, statement: impl Into<String>) -> Self {
        Self {
            method: method.to_string(),
            statement: statement.into(),
            detail: String::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// Outcome of one `prove` call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub goal: String,
    pub steps: Vec<ProofStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// A definitive failure (e.g. a blocked default) stops the ladder; the
    /// goal is known false, not merely unproven
    #[serde(default)]
    pub definitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_trace: Option<Vec<String>>,
}

impl ProofResult {
    pub fn success(
        goal: &str,
        method: &str,
        confidence: f64,
        steps: Vec<ProofStep>,
    ) -> Self {
        Self {
            valid: true,
            method: Some(method.to_string()),
            confidence: Some(confidence),
            goal: goal.to_string(),
            steps,
            reason: None,
            definitive: true,
            search_trace: None,
        }
    }

    pub fn failure(goal: &str, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            method: None,
            confidence: None,
            goal: goal.to_string(),
            steps: Vec::new(),
            reason: Some(reason.into()),
            definitive: false,
            search_trace: None,
        }
    }

    fn definitive_failure(goal: &str, reason: impl Into<String>, steps: Vec<ProofStep>) -> Self {
        let mut result = Self::failure(goal, reason);
        result.definitive = true;
        result.steps = steps;
        result
    }
}

// ============================================================================
// PROOF STATE
// ============================================================================

/// Memo key: goal string plus remaining depth and the mode flags
type MemoKey = (String, usize, bool, bool);

/// Mutable per-proof search state; dropped when the proof returns
pub(crate) struct ProofState {
    visited: FxHashSet<String>,
    memo: FxHashMap<MemoKey, ProofResult>,
    started: Instant,
    steps_used: usize,
    pub(crate) stats: ReasoningStats,
    pub(crate) trace: SearchTrace,
}

impl ProofState {
    fn new(trace_enabled: bool) -> Self {
        Self {
            visited: FxHashSet::default(),
            memo: FxHashMap::default(),
            started: Instant::now(),
            steps_used: 0,
            stats: ReasoningStats::default(),
            trace: SearchTrace::new(trace_enabled),
        }
    }
}

// ============================================================================
// PROOF ENGINE
// ============================================================================

/// Backward-chaining prover over one session's immutable state.
///
/// The engine borrows the session's collections; all mutable search state
/// lives in a per-proof [`ProofState`] passed explicitly, so sub-strategies
/// never share mutable receivers.
pub struct ProofEngine<'a> {
    pub(crate) kb: &'a KnowledgeBase,
    pub(crate) semantics: &'a SemanticIndex,
    pub(crate) rules: &'a RuleSet,
    pub(crate) vocabulary: &'a Vocabulary,
    pub(crate) strategy: Arc<dyn Strategy>,
    pub(crate) options: ProofOptions,
}

impl<'a> ProofEngine<'a> {
    pub fn new(
        kb: &'a KnowledgeBase,
        semantics: &'a SemanticIndex,
        rules: &'a RuleSet,
        vocabulary: &'a Vocabulary,
        options: ProofOptions,
    ) -> Self {
        let strategy = vocabulary.strategy().clone();
        Self {
            kb,
            semantics,
            rules,
            vocabulary,
            strategy,
            options,
        }
    }

    /// Prove a parsed goal statement. Returns the result plus the reasoning
    /// counters consumed by this proof (the caller folds them into session
    /// totals).
    pub fn prove(&self, stmt: &Statement, scope: &Scope) -> (ProofResult, ReasoningStats) {
        let mut state = ProofState::new(self.options.trace_enabled);
        state.stats.proofs_run += 1;

        let mut result = self.prove_statement(&mut state, stmt, scope, self.options.max_depth);
        if state.trace.enabled() {
            result.search_trace = Some(std::mem::take(&mut state.trace).into_entries());
        }
        tracing::debug!(goal = %result.goal, valid = result.valid, method = ?result.method, "proof finished");
        (result, state.stats)
    }

    /// Statement-level entry: quantified goals keep their AST structure;
    /// everything else reduces to canonical metadata.
    fn prove_statement(
        &self,
        state: &mut ProofState,
        stmt: &Statement,
        scope: &Scope,
        depth: usize,
    ) -> ProofResult {
        let operator = self.semantics.canonical_atom(&stmt.operator);
        if operator == EXISTS_OPERATOR {
            return self.prove_exists(state, stmt, scope, depth, false);
        }
        if operator == NOT_OPERATOR && stmt.args.len() == 1 {
            if let Expr::Statement(inner) = &stmt.args[0] {
                if self.semantics.canonical_atom(&inner.operator) == EXISTS_OPERATOR {
                    return self.prove_not_exists(state, inner, scope, depth);
                }
            }
        }

        match executor::extract_canonical_metadata(stmt, scope, self.semantics) {
            Ok(goal) => self.prove_goal(state, &goal, depth, false),
            Err(err) => ProofResult::failure(&render_statement(stmt), err.to_string()),
        }
    }

    /// Core goal dispatcher with budgets, cycle detection, and memoization
    pub(crate) fn prove_goal(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        depth: usize,
        ignore_negation: bool,
    ) -> ProofResult {
        let goal_text = goal.render();

        // Budgets terminate with a failure result, never an error.
        state.steps_used += 1;
        state.stats.steps_executed += 1;
        if state.steps_used > self.options.max_steps {
            return ProofResult::failure(&goal_text, "Step limit exceeded");
        }
        if state.started.elapsed().as_millis() as u64 > self.options.timeout_ms {
            return ProofResult::failure(&goal_text, "Proof timed out");
        }
        if depth == 0 {
            return ProofResult::failure(&goal_text, "Depth limit exceeded");
        }

        let cycle_key = goal.canonical_key();
        if state.visited.contains(&cycle_key) {
            return ProofResult::failure(&goal_text, "Cyclic goal");
        }

        let memo_key = (
            cycle_key.clone(),
            depth,
            ignore_negation,
            self.options.closed_world,
        );
        if let Some(hit) = state.memo.get(&memo_key) {
            state.stats.memo_hits += 1;
            return hit.clone();
        }

        state.visited.insert(cycle_key.clone());
        let result = if goal.is_negation() {
            self.prove_negation(state, goal, depth, ignore_negation)
        } else {
            self.prove_positive(state, goal, depth)
        };
        state.visited.remove(&cycle_key);

        // Path-dependent failures (cycles, exhausted budgets) must not be
        // replayed from the memo.
        let memoizable = match result.reason.as_deref() {
            Some("Cyclic goal") | Some("Step limit exceeded") | Some("Proof timed out")
            | Some("Depth limit exceeded") => false,
            _ => true,
        };
        if memoizable {
            state.memo.insert(memo_key, result.clone());
        }
        result
    }

    /// Positive-goal ladder
    fn prove_positive(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        depth: usize,
    ) -> ProofResult {
        let goal_text = goal.render();

        if let Some(result) = self.try_reflexive(state, goal) {
            return result;
        }
        if let Some(result) = self.try_direct(state, goal) {
            return result;
        }
        state
            .trace
            .declined("direct", &goal_text, "fact not stored in the index");

        if let Some(result) = self.try_symmetric(state, goal, depth) {
            return result;
        }
        if let Some(result) = self.try_inverse(state, goal, depth) {
            return result;
        }
        if let Some(result) = self.try_synonym(state, goal) {
            return result;
        }
        if let Some(result) = self.try_transitive(state, goal, depth) {
            return result;
        }
        if let Some(result) = self.try_inheritance(state, goal) {
            // Includes definitive failures from blocked defaults.
            return result;
        }
        if let Some(result) = self.try_modus_ponens(state, goal, depth) {
            return result;
        }
        if let Some(result) = self.try_rules(state, goal, depth) {
            return result;
        }
        state.trace.declined(
            "rule",
            &goal_text,
            &format!("no matching rule with conclusion op {}", goal.operator),
        );
        if let Some(result) = self.try_weak_match(state, goal) {
            return result;
        }

        ProofResult::failure(&goal_text, "No proof strategy succeeded")
    }

    // ------------------------------------------------------------------
    // Cheap structural strategies
    // ------------------------------------------------------------------

    /// Reflexive relation applied to identical arguments
    fn try_reflexive(&self, state: &mut ProofState, goal: &CanonicalMetadata) -> Option<ProofResult> {
        let [a, b] = goal.args.as_slice() else {
            return None;
        };
        if a == b && self.semantics.is_reflexive(&goal.operator) {
            state.trace.matched("reflexive", &goal.render());
            return Some(ProofResult::success(
                &goal.render(),
                "reflexive",
                1.0,
                vec![ProofStep::new("reflexive", goal.render())
                    .with_detail(format!("{} is reflexive", goal.operator))],
            ));
        }
        None
    }

    /// Direct match: stored fact, optionally confirmed by KB-bundle
    /// similarity above the very-strong threshold
    fn try_direct(&self, state: &mut ProofState, goal: &CanonicalMetadata) -> Option<ProofResult> {
        state.stats.kb_scans += 1;
        let fact = self.kb.find_canonical(goal)?;
        let goal_text = goal.render();

        if let (Some(kb_vector), Some(goal_vector)) = (self.kb.kb_vector(), self.goal_vector(goal))
        {
            state.stats.similarity_checks += 1;
            let sim = self.strategy.similarity(kb_vector, &goal_vector);
            if sim >= self.strategy.thresholds().very_strong_match {
                state.trace.matched("direct", &goal_text);
                return Some(ProofResult::success(
                    &goal_text,
                    "direct",
                    1.0,
                    vec![ProofStep::new("direct", fact.render())
                        .with_detail(format!("KB similarity {:.3}", sim))],
                ));
            }
        }
        // The record exists even when the bundle signal is below threshold.
        state.trace.matched("direct_metadata", &goal_text);
        Some(ProofResult::success(
            &goal_text,
            "direct_metadata",
            1.0,
            vec![ProofStep::new("direct_metadata", fact.render())],
        ))
    }

    /// Last-resort heuristic: strong bundle similarity plus a typed subject
    fn try_weak_match(&self, state: &mut ProofState, goal: &CanonicalMetadata) -> Option<ProofResult> {
        let kb_vector = self.kb.kb_vector()?;
        let goal_vector = self.goal_vector(goal)?;
        state.stats.similarity_checks += 1;
        let sim = self.strategy.similarity(kb_vector, &goal_vector);
        if sim < self.strategy.thresholds().strong_match {
            return None;
        }
        let subject = goal.args.first()?;
        state.stats.kb_scans += 1;
        if self
            .kb
            .find_by_operator_and_arg0(TYPE_OPERATOR, subject)
            .is_empty()
        {
            return None;
        }
        let goal_text = goal.render();
        state.trace.matched("weak_match", &goal_text);
        Some(ProofResult::success(
            &goal_text,
            "weak_match",
            sim.min(self.strategy.thresholds().very_strong_match),
            vec![ProofStep::new("weak_match", goal_text.clone()).with_detail(format!(
                "heuristic: KB similarity {:.3} and '{}' is a known entity",
                sim, subject
            ))],
        ))
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    /// Rebuild the statement vector a goal's metadata denotes. Read-only:
    /// unknown atoms are seeded on the fly (deterministically identical to
    /// what the vocabulary would cache).
    pub(crate) fn goal_vector(&self, goal: &CanonicalMetadata) -> Option<Vector> {
        if goal.args.len() > MAX_POSITIONS {
            return None;
        }
        let mut acc = self.atom_vector(&goal.operator);
        for (i, arg) in goal.args.iter().enumerate() {
            let position = self.vocabulary.position_vector(i + 1).ok()?;
            let role = self.strategy.bind(position, &self.atom_vector(arg)).ok()?;
            acc = self.strategy.bind(&acc, &role).ok()?;
        }
        Some(acc)
    }

    pub(crate) fn atom_vector(&self, name: &str) -> Vector {
        self.vocabulary
            .get(name)
            .cloned()
            .unwrap_or_else(|| {
                self.strategy
                    .create_from_name(name, self.vocabulary.geometry())
            })
    }
}

/// Plain rendering of a statement for failure reporting before metadata
/// extraction is possible
pub(crate) fn render_statement(stmt: &Statement) -> String {
    let mut out = stmt.operator.clone();
    for arg in &stmt.args {
        out.push(' ');
        match arg {
            Expr::Identifier(name, _) => out.push_str(name),
            Expr::Reference(name, _) => {
                out.push('$');
                out.push_str(name);
            }
            Expr::Hole(name, _) => {
                out.push('?');
                out.push_str(name);
            }
            Expr::IntLiteral(value, _) => out.push_str(&value.to_string()),
            Expr::StrLiteral(value, _) => out.push_str(value),
            Expr::Statement(inner) => {
                out.push('(');
                out.push_str(&render_statement(inner));
                out.push(')');
            }
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
