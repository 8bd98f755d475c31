//! Condition trees and rule application
//!
//! Rule conditions are And/Or/Not trees over patterns. Solving one yields
//! candidate variable bindings with a confidence and the proof steps that
//! justified each premise: And threads bindings through its parts
//! (backtracking over index candidates, capped), Or takes its parts in
//! order, Not recurses into the negation ladder on a ground instantiation.

use super::unify::{instantiate, unify_pattern, Bindings};
use super::{ProofEngine, ProofResult, ProofState, ProofStep};
use crate::dsl::{ConditionNode, Pattern};
use crate::kb::CanonicalMetadata;

/// Backtracking width cap for premise enumeration
const MAX_BRANCH: usize = 64;

/// One way of satisfying a condition tree
#[derive(Debug, Clone)]
pub(crate) struct Solution {
    pub bindings: Bindings,
    pub confidence: f64,
    pub steps: Vec<ProofStep>,
}

impl<'a> ProofEngine<'a> {
    /// First acceptable solution of a condition tree
    pub(crate) fn solve_condition(
        &self,
        state: &mut ProofState,
        node: &ConditionNode,
        bindings: &Bindings,
        depth: usize,
    ) -> Option<Solution> {
        let floor = self.strategy.thresholds().condition_confidence;
        self.condition_solutions(state, node, bindings, depth)
            .into_iter()
            .find(|s| s.confidence >= floor)
    }

    fn condition_solutions(
        &self,
        state: &mut ProofState,
        node: &ConditionNode,
        bindings: &Bindings,
        depth: usize,
    ) -> Vec<Solution> {
        match node {
            ConditionNode::Leaf(pattern) => self.leaf_solutions(state, pattern, bindings, depth),
            ConditionNode::And(parts) => {
                let mut solutions = vec![Solution {
                    bindings: bindings.clone(),
                    confidence: 1.0,
                    steps: Vec::new(),
                }];
                for part in parts {
                    let mut next = Vec::new();
                    'outer: for solution in &solutions {
                        for extension in
                            self.condition_solutions(state, part, &solution.bindings, depth)
                        {
                            let mut steps = solution.steps.clone();
                            steps.extend(extension.steps);
                            next.push(Solution {
                                bindings: extension.bindings,
                                confidence: solution.confidence.min(extension.confidence),
                                steps,
                            });
                            if next.len() >= MAX_BRANCH {
                                break 'outer;
                            }
                        }
                    }
                    solutions = next;
                    if solutions.is_empty() {
                        return Vec::new();
                    }
                }
                solutions
            }
            ConditionNode::Or(parts) => {
                let mut solutions = Vec::new();
                for part in parts {
                    solutions.extend(self.condition_solutions(state, part, bindings, depth));
                    if solutions.len() >= MAX_BRANCH {
                        break;
                    }
                }
                solutions
            }
            ConditionNode::Not(inner) => {
                // Only a ground negated pattern is decidable here.
                let ConditionNode::Leaf(pattern) = inner.as_ref() else {
                    return Vec::new();
                };
                let (meta, ground) = instantiate(pattern, bindings);
                if !ground {
                    return Vec::new();
                }
                let negated = self
                    .semantics
                    .canonicalize(&CanonicalMetadata::negation(meta.operator, meta.args));
                let result = self.prove_goal(state, &negated, depth, false);
                if result.valid {
                    vec![Solution {
                        bindings: bindings.clone(),
                        confidence: result.confidence.unwrap_or(1.0),
                        steps: result.steps,
                    }]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Solutions for one pattern leaf: recursive proof when ground,
    /// index-backed unification otherwise
    fn leaf_solutions(
        &self,
        state: &mut ProofState,
        pattern: &Pattern,
        bindings: &Bindings,
        depth: usize,
    ) -> Vec<Solution> {
        let (meta, ground) = instantiate(pattern, bindings);
        if ground {
            let canonical = self.semantics.canonicalize(&meta);
            let result = self.prove_goal(state, &canonical, depth, false);
            return if result.valid {
                vec![Solution {
                    bindings: bindings.clone(),
                    confidence: result.confidence.unwrap_or(1.0),
                    steps: result.steps,
                }]
            } else {
                Vec::new()
            };
        }

        // Unbound variables remain: enumerate stored facts through the
        // narrowest applicable index.
        state.stats.kb_scans += 1;
        let operator = self.semantics.canonical_atom(&pattern.operator);
        let first_bound = pattern
            .args
            .first()
            .and_then(|arg| super::unify::walk(arg, bindings));
        let candidates = match first_bound {
            Some(arg0) => self.kb.find_by_operator_and_arg0(&operator, &arg0),
            None => self.kb.find_by_operator(&operator),
        };
        candidates
            .into_iter()
            .filter(|fact| !fact.metadata.is_negation())
            .filter_map(|fact| {
                unify_pattern(pattern, &fact.operator, &fact.args, bindings).map(|extended| {
                    Solution {
                        bindings: extended,
                        confidence: 1.0,
                        steps: vec![ProofStep::new("fact", fact.render())],
                    }
                })
            })
            .take(MAX_BRANCH)
            .collect()
    }

    /// Indexed rule lookup with unification (modus ponens over general
    /// implications)
    pub(crate) fn try_rules(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        depth: usize,
    ) -> Option<ProofResult> {
        let thresholds = self.strategy.thresholds();
        for rule in self.rules.by_conclusion_op(&goal.operator) {
            // Level pruning: a derived-level goal can only come from a rule
            // concluding at that level with strictly lower premises.
            if goal.level > 0
                && !(rule.conc_level == goal.level && rule.max_prem_level < goal.level)
            {
                continue;
            }
            for (negated, leaf) in rule.conclusions() {
                if negated {
                    continue;
                }
                state.stats.rule_attempts += 1;
                let Some(bindings) =
                    unify_pattern(&leaf, &goal.operator, &goal.args, &Bindings::default())
                else {
                    continue;
                };
                let Some(solution) =
                    self.solve_condition(state, &rule.condition, &bindings, depth - 1)
                else {
                    continue;
                };
                let confidence = solution.confidence * thresholds.confidence_decay;
                if confidence < thresholds.rule_confidence {
                    continue;
                }
                let goal_text = goal.render();
                state.trace.matched("rule", &goal_text);
                let mut steps = solution.steps;
                steps.push(
                    ProofStep::new("rule", goal_text.clone())
                        .with_detail(format!("by rule '{}'", rule.label)),
                );
                return Some(ProofResult::success(&goal_text, "rule", confidence, steps));
            }
        }
        None
    }

    /// Modus ponens for `holds X`: rules concluding the bare proposition `X`
    pub(crate) fn try_modus_ponens(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        depth: usize,
    ) -> Option<ProofResult> {
        if goal.operator != "holds" || goal.args.len() != 1 {
            return None;
        }
        let target = &goal.args[0];
        let thresholds = self.strategy.thresholds();
        for rule in self.rules.by_conclusion_op(target) {
            for (negated, leaf) in rule.conclusions() {
                if negated || leaf.operator != *target || !leaf.args.is_empty() {
                    continue;
                }
                state.stats.rule_attempts += 1;
                let Some(solution) =
                    self.solve_condition(state, &rule.condition, &Bindings::default(), depth - 1)
                else {
                    continue;
                };
                let goal_text = goal.render();
                state.trace.matched("modus_ponens", &goal_text);
                let mut steps = solution.steps;
                steps.push(
                    ProofStep::new("modus_ponens", goal_text.clone())
                        .with_detail(format!("by rule '{}'", rule.label)),
                );
                return Some(ProofResult::success(
                    &goal_text,
                    "modus_ponens",
                    solution.confidence * thresholds.confidence_decay,
                    steps,
                ));
            }
        }
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
