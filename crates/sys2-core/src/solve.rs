//! Constraint-solving substrate
//!
//! Deterministic backtracking over variables typed by `IS_A` domains, with
//! condition-tree constraints checked through the proof engine (so rules and
//! declared negations participate, not just stored facts). Each solution is
//! stored back into the knowledge base as a `cspSolution` fact whose vector
//! is the bundle of the assignment bindings and whose argument list spells
//! the assignments out; the argument list is what the query decoder treats
//! as authoritative.

use crate::dsl::{ConditionNode, Pattern, TemplateArg};
use crate::hdc::Vector;
use crate::kb::{FactId, KnowledgeBase};
use crate::reason::{instantiate, Bindings, ProofEngine, ProofOptions, ReasoningStats, RuleSet};
use crate::semantics::{SemanticIndex, TYPE_OPERATOR};
use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default cap on enumerated solutions
pub const DEFAULT_MAX_SOLUTIONS: usize = 8;

/// One typed variable of a constraint problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CspVariable {
    /// Logical variable name (matched by `$name` in constraints)
    pub name: String,
    /// Domain: entities stored as `IS_A <entity> <domain_type>`
    pub domain_type: String,
}

/// A constraint-satisfaction problem over the session's knowledge
#[derive(Debug, Clone)]
pub struct CspProblem {
    pub name: String,
    pub variables: Vec<CspVariable>,
    /// Condition trees that must hold under a full assignment
    pub constraints: Vec<ConditionNode>,
    /// Enumeration cap; `DEFAULT_MAX_SOLUTIONS` when zero
    pub max_solutions: usize,
}

/// A complete assignment, variable name → entity
pub type Assignment = BTreeMap<String, String>;

/// Outcome of one `solve` call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOutcome {
    pub solutions: Vec<Assignment>,
    /// Ids of the `cspSolution` facts stored for each solution
    pub stored_fact_ids: Vec<FactId>,
}

/// Deterministic backtracking search. Read-only over the session state;
/// storing the solution facts is the caller's (session's) transaction.
pub fn solve(
    problem: &CspProblem,
    kb: &KnowledgeBase,
    semantics: &SemanticIndex,
    rules: &RuleSet,
    vocabulary: &Vocabulary,
    options: ProofOptions,
) -> (Vec<Assignment>, ReasoningStats) {
    let mut stats = ReasoningStats::default();
    let cap = if problem.max_solutions == 0 {
        DEFAULT_MAX_SOLUTIONS
    } else {
        problem.max_solutions
    };

    // Domains are enumerated up front; candidate order is the stored-fact
    // order, so runs are reproducible.
    let mut domains: Vec<(String, Vec<String>)> = Vec::new();
    for variable in &problem.variables {
        stats.kb_scans += 1;
        let domain_type = semantics.canonical_atom(&variable.domain_type);
        let mut members: Vec<String> = kb
            .find_by_operator_and_arg1(TYPE_OPERATOR, &domain_type)
            .iter()
            .filter_map(|f| f.args.first().cloned())
            .collect();
        members.dedup();
        if members.is_empty() {
            return (Vec::new(), stats);
        }
        domains.push((variable.name.clone(), members));
    }

    let engine = ProofEngine::new(kb, semantics, rules, vocabulary, options);
    let mut solutions = Vec::new();
    let mut assignment = Bindings::default();
    backtrack(
        &engine,
        problem,
        &domains,
        0,
        &mut assignment,
        &mut solutions,
        cap,
        &mut stats,
    );
    (solutions, stats)
}

#[allow(clippy::too_many_arguments)]
fn backtrack(
    engine: &ProofEngine<'_>,
    problem: &CspProblem,
    domains: &[(String, Vec<String>)],
    index: usize,
    assignment: &mut Bindings,
    solutions: &mut Vec<Assignment>,
    cap: usize,
    stats: &mut ReasoningStats,
) {
    if solutions.len() >= cap {
        return;
    }
    if index == domains.len() {
        solutions.push(
            assignment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        return;
    }
    let (name, members) = &domains[index];
    for member in members {
        assignment.insert(name.clone(), member.clone());
        if constraints_hold(engine, problem, assignment, stats) {
            backtrack(
                engine, problem, domains, index + 1, assignment, solutions, cap, stats,
            );
        }
        assignment.remove(name);
        if solutions.len() >= cap {
            return;
        }
    }
}

/// Check every constraint whose variables are fully assigned; partially
/// assigned constraints are deferred to deeper levels.
fn constraints_hold(
    engine: &ProofEngine<'_>,
    problem: &CspProblem,
    assignment: &Bindings,
    stats: &mut ReasoningStats,
) -> bool {
    for constraint in &problem.constraints {
        if !constraint_decidable(constraint, assignment) {
            continue;
        }
        let (holds, delta) = engine.check_ground_condition(constraint, assignment);
        stats.merge(&delta);
        if !holds {
            return false;
        }
    }
    true
}

fn constraint_decidable(node: &ConditionNode, assignment: &Bindings) -> bool {
    node.leaves()
        .iter()
        .all(|leaf| pattern_ground(leaf, assignment))
}

fn pattern_ground(pattern: &Pattern, assignment: &Bindings) -> bool {
    pattern.args.iter().all(|arg| match arg {
        TemplateArg::Atom(_) => true,
        TemplateArg::Var(name) => assignment.contains_key(name),
    })
}

/// Compose the stored vector for one solution: the bundle of the per-pair
/// `variable ⊗ value` bindings.
pub fn solution_vector(
    assignment: &Assignment,
    vocabulary: &mut Vocabulary,
) -> crate::vocabulary::Result<Vector> {
    let strategy = vocabulary.strategy().clone();
    let mut parts = Vec::with_capacity(assignment.len());
    for (variable, value) in assignment {
        let variable_vec = vocabulary.get_or_create(variable)?;
        let value_vec = vocabulary.get_or_create(value)?;
        parts.push(strategy.bind(&variable_vec, &value_vec)?);
    }
    Ok(strategy.bundle(&parts)?)
}

/// `name=value` argument list stored on the solution fact (sorted by
/// variable name, so byte-stable)
pub fn assignment_args(assignment: &Assignment) -> Vec<String> {
    assignment
        .iter()
        .map(|(variable, value)| format!("{}={}", variable, value))
        .collect()
}

impl<'a> ProofEngine<'a> {
    /// Decide one fully-ground condition tree (used by the solver)
    pub(crate) fn check_ground_condition(
        &self,
        node: &ConditionNode,
        assignment: &Bindings,
    ) -> (bool, ReasoningStats) {
        match node {
            ConditionNode::Leaf(pattern) => {
                let (meta, ground) = instantiate(pattern, assignment);
                if !ground {
                    return (false, ReasoningStats::default());
                }
                let canonical = self.semantics.canonicalize(&meta);
                let rendered = canonical.render();
                let Ok(stmt) = crate::dsl::parse_statement(&rendered) else {
                    return (false, ReasoningStats::default());
                };
                let (result, stats) = self.prove(&stmt, &crate::scope::Scope::new());
                (result.valid, stats)
            }
            ConditionNode::And(parts) => {
                let mut total = ReasoningStats::default();
                for part in parts {
                    let (holds, delta) = self.check_ground_condition(part, assignment);
                    total.merge(&delta);
                    if !holds {
                        return (false, total);
                    }
                }
                (true, total)
            }
            ConditionNode::Or(parts) => {
                let mut total = ReasoningStats::default();
                for part in parts {
                    let (holds, delta) = self.check_ground_condition(part, assignment);
                    total.merge(&delta);
                    if holds {
                        return (true, total);
                    }
                }
                (false, total)
            }
            ConditionNode::Not(inner) => {
                let (holds, stats) = self.check_ground_condition(inner, assignment);
                (!holds, stats)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Span;
    use crate::reason::test_support::Fixture;

    fn leaf(op: &str, args: &[TemplateArg]) -> ConditionNode {
        ConditionNode::Leaf(Pattern {
            operator: op.to_string(),
            args: args.to_vec(),
            span: Span::default(),
        })
    }

    fn var(name: &str) -> TemplateArg {
        TemplateArg::Var(name.to_string())
    }

    #[test]
    fn test_two_variable_coloring() {
        let mut fx = Fixture::new();
        fx.fact("IS_A", &["Red", "color"]);
        fx.fact("IS_A", &["Green", "color"]);
        fx.fact("DIFFERENT", &["Red", "Green"]);
        fx.fact("DIFFERENT", &["Green", "Red"]);

        let problem = CspProblem {
            name: "coloring".into(),
            variables: vec![
                CspVariable {
                    name: "a".into(),
                    domain_type: "color".into(),
                },
                CspVariable {
                    name: "b".into(),
                    domain_type: "color".into(),
                },
            ],
            constraints: vec![leaf("DIFFERENT", &[var("a"), var("b")])],
            max_solutions: 0,
        };
        let (solutions, _) = solve(
            &problem,
            &fx.kb,
            &fx.semantics,
            &fx.rules,
            &fx.vocabulary,
            fx.options,
        );
        assert_eq!(solutions.len(), 2);
        for solution in &solutions {
            assert_ne!(solution.get("a"), solution.get("b"));
        }
    }

    #[test]
    fn test_unsatisfiable_problem() {
        let mut fx = Fixture::new();
        fx.fact("IS_A", &["Red", "color"]);

        let problem = CspProblem {
            name: "impossible".into(),
            variables: vec![
                CspVariable {
                    name: "a".into(),
                    domain_type: "color".into(),
                },
                CspVariable {
                    name: "b".into(),
                    domain_type: "color".into(),
                },
            ],
            constraints: vec![leaf("DIFFERENT", &[var("a"), var("b")])],
            max_solutions: 0,
        };
        let (solutions, _) = solve(
            &problem,
            &fx.kb,
            &fx.semantics,
            &fx.rules,
            &fx.vocabulary,
            fx.options,
        );
        assert!(solutions.is_empty());
    }

    #[test]
    fn test_empty_domain_short_circuits() {
        let fx = Fixture::new();
        let problem = CspProblem {
            name: "empty".into(),
            variables: vec![CspVariable {
                name: "a".into(),
                domain_type: "color".into(),
            }],
            constraints: vec![],
            max_solutions: 0,
        };
        let (solutions, _) = solve(
            &problem,
            &fx.kb,
            &fx.semantics,
            &fx.rules,
            &fx.vocabulary,
            fx.options,
        );
        assert!(solutions.is_empty());
    }

    #[test]
    fn test_solution_vector_bundles_assignments() {
        let mut fx = Fixture::new();
        let mut assignment = Assignment::new();
        assignment.insert("a".into(), "Red".into());
        assignment.insert("b".into(), "Green".into());
        let vector = solution_vector(&assignment, &mut fx.vocabulary).unwrap();
        let strategy = fx.vocabulary.strategy().clone();
        let a = fx.vocabulary.get_or_create("a").unwrap();
        let red = fx.vocabulary.get_or_create("Red").unwrap();
        let pair = strategy.bind(&a, &red).unwrap();
        assert!(strategy.similarity(&vector, &pair) >= strategy.thresholds().very_strong_match);
    }
}
