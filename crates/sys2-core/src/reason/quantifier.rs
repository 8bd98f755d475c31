//! Existential goals
//!
//! `Exists $x (...)` keeps its AST structure instead of flattening to
//! metadata: the engine enumerates candidate entities from the `IS_A` type
//! constraints on the variable, instantiates the predicate per candidate,
//! and proves it recursively. `Not (Exists ...)` first attempts a purely
//! structural refutation: if a required type of the variable reaches a
//! forbidden type (over stored taxonomy edges and `IS_A`-implication rules),
//! or two required types are declared disjoint, no witness can exist.

use super::{render_statement, ProofEngine, ProofResult, ProofState, ProofStep};
use crate::dsl::{ConditionNode, Expr, Statement};
use crate::executor;
use crate::scope::Scope;
use crate::semantics::{type_closure, NOT_OPERATOR, TYPE_OPERATOR};
use rustc_hash::FxHashSet;

/// Witness enumeration cap
const MAX_CANDIDATES: usize = 256;

impl<'a> ProofEngine<'a> {
    /// Positive existential: find a witness
    pub(crate) fn prove_exists(
        &self,
        state: &mut ProofState,
        stmt: &Statement,
        scope: &Scope,
        depth: usize,
        quiet: bool,
    ) -> ProofResult {
        let goal_text = render_statement(stmt);
        let Some(var) = exists_variable(stmt) else {
            return ProofResult::failure(&goal_text, "Exists goal requires a $variable");
        };
        let predicates = exists_predicates(stmt);
        if predicates.is_empty() {
            return ProofResult::failure(&goal_text, "Exists goal requires a predicate");
        }

        let required = self.required_types(&var, &predicates);
        let candidates = self.witness_candidates(state, &required, &predicates);
        if candidates.is_empty() {
            if !quiet {
                state
                    .trace
                    .declined("existence_witness", &goal_text, "no typed candidates");
            }
            return ProofResult::failure(&goal_text, "no candidate entities for the existential");
        }

        'candidates: for candidate in candidates.iter().take(MAX_CANDIDATES) {
            let mut steps = vec![ProofStep::new("witness", candidate.clone())
                .with_detail(format!("candidate for ${}", var))];
            let mut confidence = 1.0f64;
            for predicate in &predicates {
                let grounded = substitute_variable(predicate, &var, candidate);
                let meta = match executor::extract_canonical_metadata(
                    &grounded,
                    scope,
                    self.semantics,
                ) {
                    Ok(meta) => meta,
                    Err(_) => continue 'candidates,
                };
                let sub = self.prove_goal(state, &meta, depth.saturating_sub(1), false);
                if !sub.valid {
                    continue 'candidates;
                }
                confidence = confidence.min(sub.confidence.unwrap_or(1.0));
                steps.extend(sub.steps);
            }
            if !quiet {
                state.trace.matched("existence_witness", &goal_text);
            }
            return ProofResult::success(&goal_text, "existence_witness", confidence, steps);
        }
        ProofResult::failure(&goal_text, "no witness satisfies the existential")
    }

    /// `Not (Exists ...)`: structural refutation first, then inversion of
    /// the positive search
    pub(crate) fn prove_not_exists(
        &self,
        state: &mut ProofState,
        exists_stmt: &Statement,
        scope: &Scope,
        depth: usize,
    ) -> ProofResult {
        let goal_text = format!("Not ({})", render_statement(exists_stmt));
        let Some(var) = exists_variable(exists_stmt) else {
            return ProofResult::failure(&goal_text, "Exists goal requires a $variable");
        };
        let predicates = exists_predicates(exists_stmt);
        let required = self.required_types(&var, &predicates);
        let forbidden = self.forbidden_types(&var, &predicates);

        // Required type reaches a forbidden type: unsatisfiable.
        for required_type in &required {
            let reachable = self.reachable_types(state, required_type);
            for forbidden_type in &forbidden {
                if required_type == forbidden_type || reachable.contains(forbidden_type) {
                    state.trace.matched("quantifier_type_disjointness", &goal_text);
                    return ProofResult::success(
                        &goal_text,
                        "quantifier_type_disjointness",
                        1.0,
                        vec![ProofStep::new("quantifier_type_disjointness", goal_text.clone())
                            .with_detail(format!(
                                "required type '{}' entails forbidden type '{}'",
                                required_type, forbidden_type
                            ))],
                    );
                }
            }
            // Two required types declared disjoint are equally fatal.
            for other in &required {
                if other != required_type {
                    if let Some(constraint) = self.semantics.are_disjoint(required_type, other) {
                        state.trace.matched("quantifier_type_disjointness", &goal_text);
                        return ProofResult::success(
                            &goal_text,
                            "quantifier_type_disjointness",
                            1.0,
                            vec![
                                ProofStep::new("constraint", constraint.source.text.clone()),
                                ProofStep::new(
                                    "quantifier_type_disjointness",
                                    goal_text.clone(),
                                )
                                .with_detail(format!(
                                    "required types '{}' and '{}' are disjoint",
                                    required_type, other
                                )),
                            ],
                        );
                    }
                }
            }
        }

        // No structural refutation: fall back to refuting by search.
        let witness = self.prove_exists(state, exists_stmt, scope, depth, true);
        if witness.valid {
            return ProofResult::failure(&goal_text, "a witness satisfies the existential");
        }
        if self.options.closed_world {
            state.trace.matched("closed_world_assumption", &goal_text);
            return ProofResult::success(
                &goal_text,
                "closed_world_assumption",
                self.strategy.thresholds().confidence_decay,
                vec![ProofStep::new("closed_world_assumption", goal_text.clone())],
            );
        }
        ProofResult::failure(&goal_text, "Not goal requires explicit negation (open world)")
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// `IS_A` constraints on the existential variable
    fn required_types(&self, var: &str, predicates: &[&Statement]) -> Vec<String> {
        predicates
            .iter()
            .filter(|p| self.semantics.canonical_atom(&p.operator) == TYPE_OPERATOR)
            .filter(|p| is_var_ref(p.args.first(), var))
            .filter_map(|p| p.args.get(1).and_then(Expr::atom_name))
            .map(|t| self.semantics.canonical_atom(&t))
            .collect()
    }

    /// Types the variable must NOT have: `Not ($x IS_A T)` predicates
    fn forbidden_types(&self, var: &str, predicates: &[&Statement]) -> Vec<String> {
        let mut out = Vec::new();
        for predicate in predicates {
            if self.semantics.canonical_atom(&predicate.operator) != NOT_OPERATOR {
                continue;
            }
            let Some(Expr::Statement(inner)) = predicate.args.first() else {
                continue;
            };
            if self.semantics.canonical_atom(&inner.operator) == TYPE_OPERATOR
                && is_var_ref(inner.args.first(), var)
            {
                if let Some(t) = inner.args.get(1).and_then(Expr::atom_name) {
                    out.push(self.semantics.canonical_atom(&t));
                }
            }
        }
        out
    }

    /// Entities that carry every required type (directly or transitively);
    /// without type constraints, subjects of the first predicate's operator
    fn witness_candidates(
        &self,
        state: &mut ProofState,
        required: &[String],
        predicates: &[&Statement],
    ) -> Vec<String> {
        state.stats.kb_scans += 1;
        if required.is_empty() {
            let Some(first) = predicates.first() else {
                return Vec::new();
            };
            let operator = self.semantics.canonical_atom(&first.operator);
            let mut out: Vec<String> = self
                .kb
                .find_by_operator(&operator)
                .iter()
                .filter_map(|f| f.args.first().cloned())
                .collect();
            out.sort();
            out.dedup();
            return out;
        }
        let mut out: Vec<String> = self
            .kb
            .find_by_operator(TYPE_OPERATOR)
            .iter()
            .filter_map(|f| f.args.first().cloned())
            .collect();
        out.sort();
        out.dedup();
        out.retain(|entity| {
            let closure: FxHashSet<String> = type_closure(self.kb, entity).into_iter().collect();
            required.iter().all(|t| closure.contains(t))
        });
        out
    }

    /// Type-level reachability over stored taxonomy edges plus
    /// `IS_A`-implication rules (`($x IS_A A) THEN ($x IS_A B)` adds A→B)
    fn reachable_types(&self, state: &mut ProofState, from: &str) -> FxHashSet<String> {
        let mut rule_edges: Vec<(String, String)> = Vec::new();
        for rule in self.rules.rules() {
            let ConditionNode::Leaf(condition) = &rule.condition else {
                continue;
            };
            if condition.operator != TYPE_OPERATOR {
                continue;
            }
            for (negated, leaf) in rule.conclusions() {
                if negated || leaf.operator != TYPE_OPERATOR {
                    continue;
                }
                if let (Some(from_type), Some(to_type)) = (
                    condition.args.get(1).map(ToString::to_string),
                    leaf.args.get(1).map(ToString::to_string),
                ) {
                    rule_edges.push((from_type, to_type));
                }
            }
        }

        let mut reachable: FxHashSet<String> = FxHashSet::default();
        let mut frontier = vec![from.to_string()];
        while let Some(current) = frontier.pop() {
            state.stats.kb_scans += 1;
            for fact in self.kb.find_by_operator_and_arg0(TYPE_OPERATOR, &current) {
                if let Some(next) = fact.args.get(1) {
                    if reachable.insert(next.clone()) {
                        frontier.push(next.clone());
                    }
                }
            }
            for (edge_from, edge_to) in &rule_edges {
                if *edge_from == current && reachable.insert(edge_to.clone()) {
                    frontier.push(edge_to.clone());
                }
            }
        }
        reachable
    }
}

/// The `$x` the existential binds
fn exists_variable(stmt: &Statement) -> Option<String> {
    match stmt.args.first() {
        Some(Expr::Reference(name, _)) => Some(name.clone()),
        Some(Expr::Identifier(name, _)) => Some(name.clone()),
        _ => None,
    }
}

/// Predicate statements of the existential body
fn exists_predicates(stmt: &Statement) -> Vec<&Statement> {
    let mut out = Vec::new();
    for arg in stmt.args.iter().skip(1) {
        if let Expr::Statement(inner) = arg {
            // An AND wrapper is flattened; anything else is one predicate.
            if inner.operator == "AND" {
                for part in &inner.args {
                    if let Expr::Statement(p) = part {
                        out.push(p.as_ref());
                    }
                }
            } else {
                out.push(inner.as_ref());
            }
        }
    }
    out
}

fn is_var_ref(expr: Option<&Expr>, var: &str) -> bool {
    matches!(expr, Some(Expr::Reference(name, _)) if name == var)
}

/// Replace the existential variable with a concrete witness name
fn substitute_variable(stmt: &Statement, var: &str, witness: &str) -> Statement {
    Statement {
        dest: stmt.dest.clone(),
        operator: stmt.operator.clone(),
        args: stmt
            .args
            .iter()
            .map(|arg| match arg {
                Expr::Reference(name, span) if name == var => {
                    Expr::Identifier(witness.to_string(), *span)
                }
                Expr::Statement(inner) => {
                    Expr::Statement(Box::new(substitute_variable(inner, var, witness)))
                }
                other => other.clone(),
            })
            .collect(),
        span: stmt.span,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::reason::test_support::Fixture;

    #[test]
    fn test_existence_witness() {
        let mut fx = Fixture::new();
        fx.fact("IS_A", &["Opus", "penguin"]);
        fx.fact("LIVES_IN", &["Opus", "Antarctica"]);

        let result = fx.prove("Exists $x (($x IS_A penguin) AND ($x LIVES_IN Antarctica))");
        assert!(result.valid);
        assert_eq!(result.method.as_deref(), Some("existence_witness"));
        assert!(result.steps.iter().any(|s| s.statement.contains("Opus")));
    }

    #[test]
    fn test_exists_fails_without_witness() {
        let mut fx = Fixture::new();
        fx.fact("IS_A", &["Opus", "penguin"]);

        let result = fx.prove("Exists $x (($x IS_A penguin) AND ($x LIVES_IN Sahara))");
        assert!(!result.valid);
    }

    #[test]
    fn test_not_exists_by_type_disjointness() {
        let mut fx = Fixture::new();
        // penguin entails bird (by rule); a penguin that is not a bird is
        // structurally impossible.
        fx.rule("rule pb: IF ($x IS_A penguin) THEN ($x IS_A bird)");
        fx.fact("IS_A", &["Opus", "penguin"]);

        let result =
            fx.prove("Not (Exists $x (($x IS_A penguin) AND (Not ($x IS_A bird))))");
        assert!(result.valid);
        assert_eq!(
            result.method.as_deref(),
            Some("quantifier_type_disjointness")
        );
    }

    #[test]
    fn test_not_exists_by_required_disjoint_pair() {
        let mut fx = Fixture::new();
        fx.fact("disjointWith", &["fish", "mammal"]);
        fx.reindex();

        let result = fx.prove("Not (Exists $x (($x IS_A fish) AND ($x IS_A mammal)))");
        assert!(result.valid);
        assert_eq!(
            result.method.as_deref(),
            Some("quantifier_type_disjointness")
        );
    }
}
