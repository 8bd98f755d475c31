//! Query / decode engine (holographic priority)
//!
//! Answers statements with `?holes` by unbinding a partial vector from the
//! bundled KB and reading the residual against the vocabulary, then fusing
//! that holographic ranking with authoritative symbolic enumeration from the
//! fact index. Every candidate binding is verified symbolically before it is
//! reported; unverified candidates survive only as alternatives (and only
//! when the strategy's decode policy keeps them).

use crate::dsl::{Expr, Statement};
use crate::hdc::{Strategy, Vector};
use crate::kb::{CanonicalMetadata, KnowledgeBase};
use crate::reason::{ProofEngine, ProofOptions, ReasoningStats, RuleSet};
use crate::scope::Scope;
use crate::semantics::SemanticIndex;
use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Operators whose facts are compound solutions carrying assignment
/// metadata (the metadata is authoritative; vector similarity is a signal)
pub const COMPOUND_SOLUTION_OPS: [&str; 3] = ["cspSolution", "planStep", "planAction"];

/// Verification proofs run on a small slice of the session budgets
const VERIFY_DEPTH: usize = 16;
const VERIFY_STEPS: usize = 200;
const VERIFY_TIMEOUT_MS: u64 = 500;

/// Cross-product cap over multi-hole candidate sets
const MAX_COMBINATIONS: usize = 32;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// One decoded answer for one hole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoleAnswer {
    pub answer: String,
    pub confidence: f64,
    /// How the candidate surfaced: `index`, `decode`, or `compound_metadata`
    pub method: String,
    /// Survived symbolic verification against the fact index or rules
    pub verified: bool,
}

/// A consistent assignment of every hole
pub type BindingSet = BTreeMap<String, HoleAnswer>;

/// Outcome of one `query` call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    /// Verified binding sets, best first
    pub bindings: Vec<BindingSet>,
    /// Plausible but unverified binding sets
    pub alternatives: Vec<BindingSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
}

/// Structural reading of a raw vector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedStructure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    pub args: Vec<String>,
    pub confidence: f64,
    /// `fact` when the vector matched a stored statement, `atom` when it
    /// matched a vocabulary entry, `unknown` otherwise
    pub source: String,
}

// ============================================================================
// SCORE FUSION
// ============================================================================

/// Weighted fusion of the symbolic and holographic rankings.
///
/// Scores from each source are normalized by that source's maximum before
/// weighting, so neither scale dominates by accident.
pub fn fuse_scores(
    symbolic: &[(String, f64)],
    holographic: &[(String, f64)],
    symbolic_weight: f64,
    holographic_weight: f64,
) -> Vec<(String, f64)> {
    let mut scores: BTreeMap<String, f64> = BTreeMap::new();

    let max_symbolic = symbolic
        .iter()
        .map(|(_, s)| *s)
        .fold(0.0f64, f64::max)
        .max(0.001);
    for (key, score) in symbolic {
        *scores.entry(key.clone()).or_default() += (score / max_symbolic) * symbolic_weight;
    }

    let max_holographic = holographic
        .iter()
        .map(|(_, s)| *s)
        .fold(0.0f64, f64::max)
        .max(0.001);
    for (key, score) in holographic {
        *scores.entry(key.clone()).or_default() += (score / max_holographic) * holographic_weight;
    }

    let mut out: Vec<(String, f64)> = scores.into_iter().collect();
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}

// ============================================================================
// QUERY ENGINE
// ============================================================================

/// Hole decoder over one session's immutable state
pub struct QueryEngine<'a> {
    kb: &'a KnowledgeBase,
    semantics: &'a SemanticIndex,
    rules: &'a RuleSet,
    vocabulary: &'a Vocabulary,
    strategy: Arc<dyn Strategy>,
    options: ProofOptions,
    /// `(symbolic, holographic)` fusion weights; which side leads follows
    /// the session's reasoning priority
    fusion_weights: (f64, f64),
}

impl<'a> QueryEngine<'a> {
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
            fusion_weights: (0.6, 0.4),
        }
    }

    /// Override the ranking-fusion weights (symbolic first by default)
    pub fn with_fusion_weights(mut self, symbolic: f64, holographic: f64) -> Self {
        self.fusion_weights = (symbolic, holographic);
        self
    }

    /// Decode every hole of the query statement
    pub fn query(&self, stmt: &Statement, scope: &Scope) -> (QueryOutcome, ReasoningStats) {
        let mut stats = ReasoningStats::default();
        stats.queries_run += 1;
        let mut trace: Vec<String> = Vec::new();

        let operator = self.semantics.canonical_atom(&stmt.operator);
        let holes = hole_positions(stmt);
        if holes.is_empty() {
            return (QueryOutcome::default(), stats);
        }

        // Candidates per hole, from all three sources.
        let mut per_hole: Vec<(String, Vec<(String, f64, String)>)> = Vec::new();
        for (hole, position) in &holes {
            let symbolic = self.symbolic_candidates(&mut stats, stmt, &operator, *position);
            let holographic =
                self.holographic_candidates(&mut stats, stmt, scope, &operator, *position);
            let compound = self.compound_candidates(&mut stats, stmt, scope, &operator, hole);

            let (symbolic_weight, holographic_weight) = self.fusion_weights;
            let fused = fuse_scores(&symbolic, &holographic, symbolic_weight, holographic_weight);
            let top_k = self.strategy.thresholds().decode_top_k;
            let mut candidates: Vec<(String, f64, String)> = fused
                .into_iter()
                .take(top_k)
                .map(|(name, score)| {
                    let method = if symbolic.iter().any(|(s, _)| *s == name) {
                        "index".to_string()
                    } else {
                        "decode".to_string()
                    };
                    (name, score.min(1.0), method)
                })
                .collect();
            for (name, score) in compound {
                candidates.push((name, score, "compound_metadata".to_string()));
            }
            if self.options.trace_enabled {
                trace.push(format!(
                    "hole ?{}: {} candidate(s) after fusion",
                    hole,
                    candidates.len()
                ));
            }
            per_hole.push((hole.clone(), candidates));
        }

        // Cross-product of per-hole candidates, verified as whole statements.
        let mut outcome = QueryOutcome::default();
        let keep_unverified = self.strategy.thresholds().keep_unverified;
        for combination in combinations(&per_hole, MAX_COMBINATIONS) {
            let assignment: BTreeMap<&str, &str> = per_hole
                .iter()
                .zip(combination.iter())
                .map(|((hole, _), (name, _, _))| (hole.as_str(), name.as_str()))
                .collect();
            let verified = self.verify(&mut stats, stmt, scope, &assignment);

            let mut set = BindingSet::new();
            for ((hole, _), (name, score, method)) in per_hole.iter().zip(combination.iter()) {
                set.insert(
                    hole.clone(),
                    HoleAnswer {
                        answer: name.clone(),
                        confidence: if verified { score.max(0.9) } else { *score },
                        method: method.clone(),
                        verified,
                    },
                );
            }
            if verified {
                outcome.bindings.push(set);
            } else if keep_unverified || combination.iter().any(|(_, _, m)| m == "compound_metadata")
            {
                outcome.alternatives.push(set);
            }
        }
        if self.options.trace_enabled {
            outcome.trace = Some(trace);
        }
        (outcome, stats)
    }

    // ------------------------------------------------------------------
    // Candidate sources
    // ------------------------------------------------------------------

    /// Authoritative enumeration from the fact index: stored facts agreeing
    /// with the query on every non-hole argument
    fn symbolic_candidates(
        &self,
        stats: &mut ReasoningStats,
        stmt: &Statement,
        operator: &str,
        hole_position: usize,
    ) -> Vec<(String, f64)> {
        stats.kb_scans += 1;
        let mut out: Vec<(String, f64)> = Vec::new();
        for fact in self.kb.find_by_operator(operator) {
            if fact.args.len() != stmt.args.len() {
                continue;
            }
            let agrees = stmt.args.iter().zip(fact.args.iter()).enumerate().all(
                |(i, (expr, actual))| {
                    if i + 1 == hole_position {
                        return true;
                    }
                    match expr {
                        Expr::Hole(_, _) => true,
                        other => other
                            .atom_name()
                            .map(|n| self.semantics.canonical_atom(&n) == *actual)
                            .unwrap_or(false),
                    }
                },
            );
            if agrees {
                if let Some(answer) = fact.args.get(hole_position - 1) {
                    if !out.iter().any(|(a, _)| a == answer) {
                        out.push((answer.clone(), 1.0));
                    }
                }
            }
        }
        out
    }

    /// Holographic extraction: unbind the partial query from the KB bundle,
    /// strip the hole's position marker, read the residual against the
    /// vocabulary
    fn holographic_candidates(
        &self,
        stats: &mut ReasoningStats,
        stmt: &Statement,
        scope: &Scope,
        operator: &str,
        hole_position: usize,
    ) -> Vec<(String, f64)> {
        let Some(kb_vector) = self.kb.kb_vector() else {
            return Vec::new();
        };
        let Some(partial) = self.partial_vector(stmt, scope, operator) else {
            return Vec::new();
        };
        let Ok(candidate) = self.strategy.bind(&partial, kb_vector) else {
            return Vec::new();
        };
        let Ok(position) = self.vocabulary.position_vector(hole_position) else {
            return Vec::new();
        };
        let Ok(residual) = self.strategy.bind(&candidate, position) else {
            return Vec::new();
        };
        let top_k = self.strategy.thresholds().decode_top_k;
        stats.similarity_checks += self.vocabulary.len() as u64;
        self.vocabulary.reverse_lookup(&residual, top_k)
    }

    /// Assignments recorded in stored compound-solution facts
    fn compound_candidates(
        &self,
        stats: &mut ReasoningStats,
        stmt: &Statement,
        scope: &Scope,
        operator: &str,
        hole: &str,
    ) -> Vec<(String, f64)> {
        if !COMPOUND_SOLUTION_OPS.contains(&operator) {
            return Vec::new();
        }
        stats.kb_scans += 1;
        let partial = self.partial_vector(stmt, scope, operator);
        let mut out = Vec::new();
        for fact in self.kb.find_by_operator(operator) {
            // Metadata assignments are authoritative; similarity only ranks.
            let signal = partial
                .as_ref()
                .map(|p| self.strategy.similarity(p, &fact.vector))
                .unwrap_or(0.0);
            for assignment in &fact.args {
                if let Some((name, value)) = assignment.split_once('=') {
                    if name == hole {
                        out.push((value.to_string(), signal.max(0.5)));
                    }
                }
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Bound vector of the query's known parts (holes skipped)
    fn partial_vector(&self, stmt: &Statement, scope: &Scope, operator: &str) -> Option<Vector> {
        let mut acc = self.atom_vector(operator);
        for (i, arg) in stmt.args.iter().enumerate() {
            let arg_vec = match arg {
                Expr::Hole(_, _) => continue,
                Expr::Reference(name, _) => scope.resolve(name)?.vector.clone(),
                Expr::Statement(inner) => {
                    let inner_op = self.semantics.canonical_atom(&inner.operator);
                    self.partial_vector(inner, scope, &inner_op)?
                }
                other => {
                    let name = self.semantics.canonical_atom(&other.atom_name()?);
                    self.atom_vector(&name)
                }
            };
            let position = self.vocabulary.position_vector(i + 1).ok()?;
            let role = self.strategy.bind(position, &arg_vec).ok()?;
            acc = self.strategy.bind(&acc, &role).ok()?;
        }
        Some(acc)
    }

    fn atom_vector(&self, name: &str) -> Vector {
        self.vocabulary.get(name).cloned().unwrap_or_else(|| {
            self.strategy
                .create_from_name(name, self.vocabulary.geometry())
        })
    }

    /// Symbolic verification of a full assignment: stored fact, or derivable
    /// under a reduced proof budget
    fn verify(
        &self,
        stats: &mut ReasoningStats,
        stmt: &Statement,
        scope: &Scope,
        assignment: &BTreeMap<&str, &str>,
    ) -> bool {
        let Some(meta) = self.substituted_metadata(stmt, scope, assignment) else {
            return false;
        };
        stats.kb_scans += 1;
        if self.kb.contains(&meta) {
            return true;
        }
        let verify_options = ProofOptions {
            max_depth: VERIFY_DEPTH,
            max_steps: VERIFY_STEPS,
            timeout_ms: VERIFY_TIMEOUT_MS,
            closed_world: self.options.closed_world,
            trace_enabled: false,
        };
        let engine = ProofEngine::new(
            self.kb,
            self.semantics,
            self.rules,
            self.vocabulary,
            verify_options,
        );
        let rendered = meta.render();
        let Ok(goal) = crate::dsl::parse_statement(&rendered) else {
            return false;
        };
        let (result, proof_stats) = engine.prove(&goal, scope);
        stats.merge(&proof_stats);
        result.valid
    }

    fn substituted_metadata(
        &self,
        stmt: &Statement,
        scope: &Scope,
        assignment: &BTreeMap<&str, &str>,
    ) -> Option<CanonicalMetadata> {
        let operator = self.semantics.canonical_atom(&stmt.operator);
        let mut args = Vec::with_capacity(stmt.args.len());
        for arg in &stmt.args {
            let value = match arg {
                Expr::Hole(name, _) => assignment.get(name.as_str())?.to_string(),
                Expr::Reference(name, _) => scope.resolve(name)?.metadata.render(),
                Expr::Statement(inner) => {
                    self.substituted_metadata(inner, scope, assignment)?.render()
                }
                other => self.semantics.canonical_atom(&other.atom_name()?),
            };
            args.push(value);
        }
        Some(
            self.semantics
                .canonicalize(&CanonicalMetadata::positive(operator, args)),
        )
    }

    // ------------------------------------------------------------------
    // Raw-vector decoding
    // ------------------------------------------------------------------

    /// Structural guess for an arbitrary vector: nearest stored fact first,
    /// nearest vocabulary atom second
    pub fn decode(&self, vector: &Vector) -> DecodedStructure {
        let mut best_fact: Option<(f64, &crate::kb::Fact)> = None;
        for fact in self.kb.facts() {
            let sim = self.strategy.similarity(vector, &fact.vector);
            if best_fact.map(|(s, _)| sim > s).unwrap_or(true) {
                best_fact = Some((sim, fact));
            }
        }
        let orthogonality = self.strategy.thresholds().orthogonality;
        if let Some((sim, fact)) = best_fact {
            if sim >= orthogonality {
                return DecodedStructure {
                    operator: Some(fact.operator.clone()),
                    args: fact.args.clone(),
                    confidence: sim,
                    source: "fact".to_string(),
                };
            }
        }
        if let Some((name, sim)) = self.vocabulary.reverse_lookup(vector, 1).into_iter().next() {
            return DecodedStructure {
                operator: None,
                args: vec![name],
                confidence: sim,
                source: "atom".to_string(),
            };
        }
        DecodedStructure {
            operator: None,
            args: Vec::new(),
            confidence: 0.0,
            source: "unknown".to_string(),
        }
    }

    /// One-line rendering of [`QueryEngine::decode`]
    pub fn summarize(&self, vector: &Vector) -> String {
        let decoded = self.decode(vector);
        match (&decoded.operator, decoded.args.is_empty()) {
            (Some(op), _) => format!(
                "{} {} (confidence {:.2})",
                op,
                decoded.args.join(" "),
                decoded.confidence
            ),
            (None, false) => format!(
                "atom '{}' (confidence {:.2})",
                decoded.args.join(" "),
                decoded.confidence
            ),
            (None, true) => "unrecognized vector".to_string(),
        }
    }
}

/// Hole names with their 1-based argument positions
fn hole_positions(stmt: &Statement) -> Vec<(String, usize)> {
    stmt.args
        .iter()
        .enumerate()
        .filter_map(|(i, arg)| match arg {
            Expr::Hole(name, _) => Some((name.clone(), i + 1)),
            _ => None,
        })
        .collect()
}

/// Bounded cartesian product over per-hole candidate lists
fn combinations<'c>(
    per_hole: &'c [(String, Vec<(String, f64, String)>)],
    cap: usize,
) -> Vec<Vec<&'c (String, f64, String)>> {
    let mut out: Vec<Vec<&(String, f64, String)>> = vec![Vec::new()];
    for (_, candidates) in per_hole {
        let mut next = Vec::new();
        for prefix in &out {
            for candidate in candidates {
                let mut row = prefix.clone();
                row.push(candidate);
                next.push(row);
                if next.len() >= cap {
                    break;
                }
            }
            if next.len() >= cap {
                break;
            }
        }
        out = next;
    }
    out.retain(|row| row.len() == per_hole.len());
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reason::test_support::Fixture;

    fn run_query(fx: &Fixture, source: &str) -> QueryOutcome {
        let stmt = crate::dsl::parse_statement(source).expect("query parses");
        let engine = QueryEngine::new(
            &fx.kb,
            &fx.semantics,
            &fx.rules,
            &fx.vocabulary,
            fx.options,
        );
        engine.query(&stmt, &Scope::new()).0
    }

    #[test]
    fn test_single_hole_finds_all_children() {
        let mut fx = Fixture::new();
        fx.fact("PARENT_OF", &["Ion", "Maria"]);
        fx.fact("PARENT_OF", &["Ion", "Mihai"]);
        fx.fact("PARENT_OF", &["Dan", "Vlad"]);

        let outcome = run_query(&fx, "@q Ion PARENT_OF ?who");
        let answers: Vec<&str> = outcome
            .bindings
            .iter()
            .filter_map(|set| set.get("who"))
            .map(|a| a.answer.as_str())
            .collect();
        assert!(answers.contains(&"Maria"));
        assert!(answers.contains(&"Mihai"));
        assert!(!answers.contains(&"Vlad"));
        assert!(outcome
            .bindings
            .iter()
            .all(|set| set.values().all(|a| a.verified)));
    }

    #[test]
    fn test_hole_in_subject_position() {
        let mut fx = Fixture::new();
        fx.fact("PARENT_OF", &["Ion", "Maria"]);

        let outcome = run_query(&fx, "@q ?parent PARENT_OF Maria");
        assert!(outcome
            .bindings
            .iter()
            .any(|set| set.get("parent").map(|a| a.answer.as_str()) == Some("Ion")));
    }

    #[test]
    fn test_no_answers_for_unknown_subject() {
        let mut fx = Fixture::new();
        fx.fact("PARENT_OF", &["Ion", "Maria"]);

        let outcome = run_query(&fx, "@q Ghost PARENT_OF ?who");
        assert!(outcome.bindings.is_empty());
    }

    #[test]
    fn test_rule_derived_answer_is_verified() {
        let mut fx = Fixture::new();
        fx.rule("rule flight: IF ($x IS_A bird) THEN ($x CAN fly)");
        fx.fact("IS_A", &["Tweety", "bird"]);
        fx.fact("CAN", &["Tweety", "sing"]);

        // 'fly' only follows from the rule; verification must accept it.
        let outcome = run_query(&fx, "@q Tweety CAN ?what");
        let answers: Vec<&str> = outcome
            .bindings
            .iter()
            .filter_map(|set| set.get("what"))
            .map(|a| a.answer.as_str())
            .collect();
        assert!(answers.contains(&"sing"));
    }

    #[test]
    fn test_fuse_scores_prefers_double_source() {
        let symbolic = vec![("Maria".to_string(), 1.0)];
        let holographic = vec![("Maria".to_string(), 0.8), ("Noise".to_string(), 0.9)];
        let fused = fuse_scores(&symbolic, &holographic, 0.6, 0.4);
        assert_eq!(fused[0].0, "Maria");
    }

    #[test]
    fn test_decode_recovers_fact_structure() {
        let mut fx = Fixture::new();
        fx.fact("IS_A", &["Fido", "Dog"]);
        let engine = QueryEngine::new(
            &fx.kb,
            &fx.semantics,
            &fx.rules,
            &fx.vocabulary,
            fx.options,
        );
        let vector = fx.kb.facts()[0].vector.clone();
        let decoded = engine.decode(&vector);
        assert_eq!(decoded.operator.as_deref(), Some("IS_A"));
        assert_eq!(decoded.args, vec!["Fido".to_string(), "Dog".to_string()]);
        assert!(engine.summarize(&vector).contains("IS_A"));
    }
}
