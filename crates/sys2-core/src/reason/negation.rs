//! Negation-goal strategies
//!
//! Ordered ladder for `Not (...)` goals: explicit stored negation, rules
//! concluding a negation, contrapositive over conjunctive rules, taxonomy
//! disjointness, and finally inner refutation with the closed-world
//! assumption as the configurable last resort. The inner refutation runs
//! with `ignore_negation` set so a nested negation cannot bounce back into
//! the closed-world shortcut.

use super::unify::{instantiate, unify_pattern, Bindings};
use super::{ProofEngine, ProofResult, ProofState, ProofStep};
use crate::dsl::ConditionNode;
use crate::kb::CanonicalMetadata;
use crate::semantics::TYPE_OPERATOR;

impl<'a> ProofEngine<'a> {
    /// Negation ladder entry
    pub(crate) fn prove_negation(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        depth: usize,
        ignore_negation: bool,
    ) -> ProofResult {
        let goal_text = goal.render();
        let (Some(inner_op), Some(inner_args)) = (&goal.inner_operator, &goal.inner_args) else {
            return ProofResult::failure(&goal_text, "Malformed negation goal");
        };
        let inner = CanonicalMetadata::positive(inner_op.clone(), inner_args.clone());

        // 1. Explicit stored negation.
        state.stats.kb_scans += 1;
        if let Some(fact) = self.kb.find_canonical(goal) {
            state.trace.matched("explicit_negation", &goal_text);
            return ProofResult::success(
                &goal_text,
                "explicit_negation",
                1.0,
                vec![ProofStep::new("explicit_negation", fact.render())],
            );
        }
        state
            .trace
            .declined("explicit_negation", &goal_text, "negation hit no explicit Not fact");

        // 2. Rules concluding this negation.
        if let Some(result) = self.try_negation_rules(state, goal, &inner, depth) {
            return result;
        }

        // 3. Contrapositive over conjunctive rules.
        if let Some(result) = self.try_contrapositive(state, goal, &inner, depth) {
            return result;
        }

        // 4. Taxonomy disjointness for `Not (x IS_A B)`.
        if let Some(result) = self.try_disjointness(state, goal, &inner) {
            return result;
        }

        // 5. Inner refutation, then the closed-world assumption.
        let refutation = self.prove_goal(state, &inner, depth.saturating_sub(1), true);
        if refutation.valid {
            return ProofResult::failure(
                &goal_text,
                format!("inner statement '{}' is provable", inner.render()),
            );
        }
        if self.options.closed_world && !ignore_negation {
            state.trace.matched("closed_world_assumption", &goal_text);
            return ProofResult::success(
                &goal_text,
                "closed_world_assumption",
                self.strategy.thresholds().confidence_decay,
                vec![ProofStep::new("closed_world_assumption", goal_text.clone())
                    .with_detail(format!("'{}' is unprovable", inner.render()))],
            );
        }
        ProofResult::failure(&goal_text, "Not goal requires explicit negation (open world)")
    }

    /// Rules whose conclusion is `Not (...)`, directly or inside And/Or
    fn try_negation_rules(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        inner: &CanonicalMetadata,
        depth: usize,
    ) -> Option<ProofResult> {
        let goal_text = goal.render();
        for rule in self.rules.by_negated_conclusion_op(&inner.operator) {
            for (negated, leaf) in rule.conclusions() {
                if !negated {
                    continue;
                }
                state.stats.rule_attempts += 1;
                let Some(bindings) =
                    unify_pattern(&leaf, &inner.operator, &inner.args, &Bindings::default())
                else {
                    continue;
                };
                let Some(solution) =
                    self.solve_condition(state, &rule.condition, &bindings, depth - 1)
                else {
                    continue;
                };
                state.trace.matched("rule_negation", &goal_text);
                let decay = self.strategy.thresholds().confidence_decay;
                let mut steps = solution.steps;
                steps.push(
                    ProofStep::new("rule_negation", goal_text.clone())
                        .with_detail(format!("by rule '{}'", rule.label)),
                );
                return Some(ProofResult::success(
                    &goal_text,
                    "rule_negation",
                    solution.confidence * decay,
                    steps,
                ));
            }
        }
        state.trace.declined(
            "rule_negation",
            &goal_text,
            &format!("no rule concludes Not {}", inner.operator),
        );
        None
    }

    /// Contrapositive: from `A ∧ B → C`, `Not C` and all-but-one premise
    /// conclude the negation of the remaining premise.
    fn try_contrapositive(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        inner: &CanonicalMetadata,
        depth: usize,
    ) -> Option<ProofResult> {
        let goal_text = goal.render();
        for rule in self.rules.rules() {
            // Only plain conjunctive rules with a single positive conclusion
            // have a usable contrapositive here.
            let premises: Vec<_> = match &rule.condition {
                ConditionNode::Leaf(p) => vec![p.clone()],
                ConditionNode::And(parts) => {
                    let leaves: Option<Vec<_>> = parts
                        .iter()
                        .map(|part| match part {
                            ConditionNode::Leaf(p) => Some(p.clone()),
                            _ => None,
                        })
                        .collect();
                    match leaves {
                        Some(leaves) => leaves,
                        None => continue,
                    }
                }
                _ => continue,
            };
            let conclusions = rule.conclusions();
            let [(false, conclusion)] = conclusions.as_slice() else {
                continue;
            };

            for (target_idx, premise) in premises.iter().enumerate() {
                state.stats.rule_attempts += 1;
                let Some(bindings) =
                    unify_pattern(premise, &inner.operator, &inner.args, &Bindings::default())
                else {
                    continue;
                };

                // Not(conclusion) must be ground and provable.
                let (conclusion_meta, ground) = instantiate(conclusion, &bindings);
                if !ground {
                    continue;
                }
                let negated_conclusion = CanonicalMetadata::negation(
                    conclusion_meta.operator.clone(),
                    conclusion_meta.args.clone(),
                );
                let sub = self.prove_goal(state, &negated_conclusion, depth - 1, true);
                if !sub.valid {
                    continue;
                }

                // Every other premise must hold under the same bindings.
                let mut steps = sub.steps;
                let mut confidence = sub.confidence.unwrap_or(1.0);
                let mut all_hold = true;
                for (idx, other) in premises.iter().enumerate() {
                    if idx == target_idx {
                        continue;
                    }
                    let (other_meta, ground) = instantiate(other, &bindings);
                    if !ground {
                        all_hold = false;
                        break;
                    }
                    let proof = self.prove_goal(state, &other_meta, depth - 1, false);
                    if !proof.valid {
                        all_hold = false;
                        break;
                    }
                    confidence = confidence.min(proof.confidence.unwrap_or(1.0));
                    steps.extend(proof.steps);
                }
                if !all_hold {
                    continue;
                }

                state.trace.matched("contrapositive", &goal_text);
                let decay = self.strategy.thresholds().confidence_decay;
                steps.push(
                    ProofStep::new("contrapositive", goal_text.clone())
                        .with_detail(format!("contrapositive of rule '{}'", rule.label)),
                );
                return Some(ProofResult::success(
                    &goal_text,
                    "contrapositive",
                    confidence * decay,
                    steps,
                ));
            }
        }
        None
    }

    /// `Not (x IS_A B)` via a disjoint sibling type
    fn try_disjointness(
        &self,
        state: &mut ProofState,
        goal: &CanonicalMetadata,
        inner: &CanonicalMetadata,
    ) -> Option<ProofResult> {
        if inner.operator != TYPE_OPERATOR {
            return None;
        }
        let [entity, target_type] = inner.args.as_slice() else {
            return None;
        };
        state.stats.kb_scans += 1;
        for known_type in crate::semantics::type_closure(self.kb, entity) {
            if let Some(constraint) = self.semantics.are_disjoint(&known_type, target_type) {
                let goal_text = goal.render();
                state.trace.matched("disjointness", &goal_text);
                return Some(ProofResult::success(
                    &goal_text,
                    "disjointness",
                    1.0,
                    vec![
                        ProofStep::new(
                            "fact",
                            format!("{} {} {}", entity, TYPE_OPERATOR, known_type),
                        ),
                        ProofStep::new("constraint", constraint.source.text.clone()),
                        ProofStep::new("disjointness", goal_text.clone()).with_detail(format!(
                            "'{}' and '{}' are disjoint",
                            known_type, target_type
                        )),
                    ],
                ));
            }
        }
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
