//! Relational rewrites and structural walks
//!
//! The ladder strategies that exploit declared operator properties:
//! symmetric/inverse rewrites, synonym expansion over pre-canonicalization
//! facts, transitive chain search, and property inheritance with
//! default-exception blocking over the `IS_A` taxonomy.

use super::{ProofEngine, ProofResult, ProofState, ProofStep};
use crate::kb::CanonicalMetadata;
use crate::semantics::TYPE_OPERATOR;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

impl<'a> ProofEngine<'a> {
    /// Symmetric relation: try the swapped goal
    pub(crate) fn try_symmetric(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        depth: usize,
    ) -> Option<ProofResult> {
        let [a, b] = goal.args.as_slice() else {
            return None;
        };
        if !self.semantics.is_symmetric(&goal.operator) {
            return None;
        }
        let swapped =
            CanonicalMetadata::positive(goal.operator.clone(), vec![b.clone(), a.clone()]);
        let sub = self.prove_goal(state, &swapped, depth - 1, false);
        if !sub.valid {
            state
                .trace
                .declined("symmetric", &goal.render(), "swapped goal unproven");
            return None;
        }
        let goal_text = goal.render();
        state.trace.matched("symmetric", &goal_text);
        let mut steps = sub.steps;
        steps.push(
            ProofStep::new("symmetric", goal_text.clone())
                .with_detail(format!("{} is symmetric", goal.operator)),
        );
        Some(ProofResult::success(
            &goal_text,
            "symmetric",
            sub.confidence.unwrap_or(1.0),
            steps,
        ))
    }

    /// Inverse relation: try the inverse operator with swapped arguments
    pub(crate) fn try_inverse(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        depth: usize,
    ) -> Option<ProofResult> {
        let [a, b] = goal.args.as_slice() else {
            return None;
        };
        let inverse = self.semantics.inverse_of(&goal.operator)?;
        let flipped = CanonicalMetadata::positive(inverse.to_string(), vec![b.clone(), a.clone()]);
        let sub = self.prove_goal(state, &flipped, depth - 1, false);
        if !sub.valid {
            state
                .trace
                .declined("inverse", &goal.render(), "inverse goal unproven");
            return None;
        }
        let goal_text = goal.render();
        state.trace.matched("inverse", &goal_text);
        let mut steps = sub.steps;
        steps.push(
            ProofStep::new("inverse", goal_text.clone())
                .with_detail(format!("{} inverseOf {}", goal.operator, inverse)),
        );
        Some(ProofResult::success(
            &goal_text,
            "inverse",
            sub.confidence.unwrap_or(1.0),
            steps,
        ))
    }

    /// Synonym expansion: facts learned before an alias was declared are
    /// stored under the old spelling, so the index is retried with every
    /// alias combination of the goal arguments.
    pub(crate) fn try_synonym(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
    ) -> Option<ProofResult> {
        let [a, b] = goal.args.as_slice() else {
            return None;
        };
        let variants_a = self.semantics.aliases_of(a);
        let variants_b = self.semantics.aliases_of(b);
        if variants_a.len() == 1 && variants_b.len() == 1 {
            return None;
        }
        for va in &variants_a {
            for vb in &variants_b {
                if va == a && vb == b {
                    continue;
                }
                state.stats.kb_scans += 1;
                let candidate = CanonicalMetadata::positive(
                    goal.operator.clone(),
                    vec![va.clone(), vb.clone()],
                );
                if let Some(fact) = self.kb.find_canonical(&candidate) {
                    let goal_text = goal.render();
                    state.trace.matched("synonym", &goal_text);
                    return Some(ProofResult::success(
                        &goal_text,
                        "synonym",
                        1.0,
                        vec![
                            ProofStep::new("synonym", fact.render())
                                .with_detail(format!("alias form of '{}'", goal_text)),
                        ],
                    ));
                }
            }
        }
        state
            .trace
            .declined("synonym", &goal.render(), "no alias form stored");
        None
    }

    /// Transitive chain: breadth-first composition of stored edges
    pub(crate) fn try_transitive(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        depth: usize,
    ) -> Option<ProofResult> {
        let [start, target] = goal.args.as_slice() else {
            return None;
        };
        if !self.semantics.is_transitive(&goal.operator) {
            return None;
        }

        // BFS over op-edges, shortest chain wins. Paths carry the edge facts
        // so the proof lists one step per hop.
        let mut seen: FxHashSet<String> = FxHashSet::default();
        seen.insert(start.clone());
        let mut frontier: VecDeque<(String, Vec<String>)> = VecDeque::new();
        frontier.push_back((start.clone(), Vec::new()));

        while let Some((node, path)) = frontier.pop_front() {
            if path.len() >= depth {
                continue;
            }
            state.steps_used += 1;
            state.stats.steps_executed += 1;
            if state.steps_used > self.options.max_steps {
                return Some(ProofResult::failure(&goal.render(), "Step limit exceeded"));
            }
            state.stats.kb_scans += 1;
            for fact in self.kb.find_by_operator_and_arg0(&goal.operator, &node) {
                let Some(next) = fact.args.get(1) else {
                    continue;
                };
                let mut path = path.clone();
                path.push(fact.render());
                if next == target {
                    let goal_text = goal.render();
                    state.trace.matched("transitive", &goal_text);
                    let hops = path.len();
                    let steps = path
                        .into_iter()
                        .map(|edge| ProofStep::new("transitive", edge))
                        .collect();
                    let confidence = self
                        .strategy
                        .thresholds()
                        .confidence_decay
                        .powi(hops.saturating_sub(1) as i32);
                    return Some(ProofResult::success(
                        &goal_text,
                        "transitive",
                        confidence,
                        steps,
                    ));
                }
                if seen.insert(next.clone()) {
                    frontier.push_back((next.clone(), path));
                }
            }
        }
        state
            .trace
            .declined("transitive", &goal.render(), "no chain reaches the target");
        None
    }

    /// Property inheritance with default-exception blocking.
    ///
    /// Walks the `IS_A` taxonomy from the subject outward, nearest ancestors
    /// first. The first level carrying an explicit value decides: a stored
    /// negation blocks the default definitively (more-specific-wins), a
    /// stored positive inherits it.
    pub(crate) fn try_inheritance(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
    ) -> Option<ProofResult> {
        let [subject, value] = goal.args.as_slice() else {
            return None;
        };
        if !self.semantics.is_inheritable(&goal.operator) {
            return None;
        }

        let decay = self.strategy.thresholds().confidence_decay;
        let mut chain: Vec<String> = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
        frontier.push_back((subject.clone(), 0));
        seen.insert(subject.clone());

        while let Some((holder, distance)) = frontier.pop_front() {
            state.stats.kb_scans += 1;

            // Exception first: an explicit negation at this level overrides
            // anything a more general ancestor declares.
            let blocked = CanonicalMetadata::negation(
                goal.operator.clone(),
                vec![holder.clone(), value.clone()],
            );
            if let Some(exception) = self.kb.find_canonical(&blocked) {
                let goal_text = goal.render();
                state.trace.declined(
                    "inheritance",
                    &goal_text,
                    &format!("default blocked by exception at '{}'", holder),
                );
                let mut steps: Vec<ProofStep> = chain
                    .iter()
                    .map(|edge| ProofStep::new("inheritance", edge.clone()))
                    .collect();
                steps.push(
                    ProofStep::new("exception", exception.render())
                        .with_detail(format!("more specific level '{}' wins", holder)),
                );
                return Some(ProofResult::definitive_failure(
                    &goal_text,
                    format!(
                        "default '{} {}' is overridden by an exception at '{}'",
                        goal.operator, value, holder
                    ),
                    steps,
                ));
            }

            // A stored positive at this level (the subject's own facts are
            // the direct-match strategy's job, so distance 0 is skipped).
            if distance > 0 {
                let candidate = CanonicalMetadata::positive(
                    goal.operator.clone(),
                    vec![holder.clone(), value.clone()],
                );
                if let Some(default_fact) = self.kb.find_canonical(&candidate) {
                    let goal_text = goal.render();
                    state.trace.matched("inheritance", &goal_text);
                    let mut steps: Vec<ProofStep> = chain
                        .iter()
                        .map(|edge| ProofStep::new("inheritance", edge.clone()))
                        .collect();
                    steps.push(
                        ProofStep::new("inheritance", default_fact.render())
                            .with_detail(format!("inherited via '{}'", holder)),
                    );
                    return Some(ProofResult::success(
                        &goal_text,
                        "inheritance",
                        decay.powi(distance as i32),
                        steps,
                    ));
                }
            }

            for fact in self.kb.find_by_operator_and_arg0(TYPE_OPERATOR, &holder) {
                if let Some(parent) = fact.args.get(1) {
                    if seen.insert(parent.clone()) {
                        chain.push(fact.render());
                        frontier.push_back((parent.clone(), distance + 1));
                    }
                }
            }
        }
        state
            .trace
            .declined("inheritance", &goal.render(), "no ancestor declares a value");
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
