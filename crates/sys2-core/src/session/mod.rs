//! Session lifecycle and transactions
//!
//! One [`Session`] exclusively owns the vocabulary, knowledge base, rules,
//! graphs, semantic index, and scope, and exposes the synchronous public
//! API: `learn`, `query`, `prove`, `solve`, `dump`, `similarity`, `decode`,
//! `summarize`, and `close`. A session is single-threaded cooperative:
//! operations run to completion or to budget exhaustion, and clients wanting
//! parallelism create independent sessions.
//!
//! `learn` is all-or-nothing: a transaction snapshot captures the sizes of
//! every owned collection (plus the KB bundle), and any failure — including
//! a detected contradiction — truncates everything back and rebuilds the
//! derived indices.

mod config;
mod core_theory;

pub use config::{ReasoningPriority, ResourceLimits, SessionConfig};
pub use core_theory::CORE_THEORY;

use crate::dsl::{
    is_verb_name, parse_program, parse_statement, Expr, GraphDecl, Item, ParseError, Program,
    RuleDecl, Span, Statement,
};
use crate::executor::{self, ExecError};
use crate::hdc::{strategy_for, Strategy, StrategyError, Vector};
use crate::kb::{CanonicalMetadata, KbError, KbSnapshot, KnowledgeBase};
use crate::query::{DecodedStructure, QueryEngine, QueryOutcome};
use crate::reason::{ProofEngine, ProofResult, ReasoningStats, RuleSet};
use crate::scope::{Scope, ScopeBinding, ScopeSnapshot};
use crate::semantics::{
    is_declaration, Contradiction, ContradictionDetector, SemanticIndex,
};
use crate::solve::{self, CspProblem, SolveOutcome};
use crate::storage::{self, FactImage, SessionImage, StorageAdapter, StorageError};
use crate::vocabulary::{Vocabulary, VocabularyError};
use chrono::{DateTime, Utc};
use lru::LruCache;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use uuid::Uuid;

/// Operators understood by the engine itself (everything else must be a
/// verb-cased relation, a declared operator, or a graph)
pub const BUILTIN_OPERATORS: [&str; 13] = [
    "Not",
    "Exists",
    "holds",
    "synonym",
    "canonical",
    "inverseOf",
    "negationOf",
    "mutuallyExclusive",
    "contradictsSameArgs",
    "disjointWith",
    "cspSolution",
    "planStep",
    "planAction",
];

/// Decoded-query cache entries kept per session
const DECODE_CACHE_SIZE: usize = 64;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Session error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Strict validation failure (unknown operator, holes where forbidden,
    /// capacity overruns of the statement shape)
    #[error("Validation error at {span}: {message}")]
    Validation { message: String, span: Span },
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),
    #[error(transparent)]
    Knowledge(#[from] KbError),
    #[error(transparent)]
    Execution(#[from] ExecError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Invariant violation; names the invariant
    #[error("Internal invariant '{invariant}' violated: {message}")]
    Internal {
        invariant: &'static str,
        message: String,
    },
    #[error("Session is closed")]
    Closed,
}

/// Session result type
pub type Result<T> = std::result::Result<T, SessionError>;

// ============================================================================
// OUTCOME TYPES
// ============================================================================

/// Result of one `learn` call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnOutcome {
    pub success: bool,
    pub facts_added: usize,
    pub errors: Vec<String>,
    pub contradictions: Vec<Contradiction>,
}

impl LearnOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            facts_added: 0,
            errors: vec![message.into()],
            contradictions: Vec::new(),
        }
    }
}

/// State report used for diagnostics and the no-mutation-on-failure checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpReport {
    pub strategy_id: String,
    pub geometry: usize,
    pub vocab_size: usize,
    pub fact_count: usize,
    pub rule_count: usize,
    pub graph_count: usize,
    pub scope_bindings: usize,
    pub reasoning_stats: ReasoningStats,
}

/// Why a learn batch aborted
enum LearnAbort {
    Contradiction(Box<Contradiction>),
    Error(SessionError),
}

impl<E: Into<SessionError>> From<E> for LearnAbort {
    fn from(err: E) -> Self {
        LearnAbort::Error(err.into())
    }
}

/// Captured collection sizes for all-or-nothing rollback
struct TransactionSnapshot {
    kb: KbSnapshot,
    rule_count: usize,
    graph_count: usize,
    vocab_count: usize,
    scope: ScopeSnapshot,
}

// ============================================================================
// SESSION
// ============================================================================

/// One reasoning session over one strategy and one knowledge base
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    strategy: Arc<dyn Strategy>,
    vocabulary: Vocabulary,
    kb: KnowledgeBase,
    rules: RuleSet,
    graphs: FxHashMap<String, GraphDecl>,
    graph_order: Vec<String>,
    semantics: SemanticIndex,
    scope: Scope,
    detector: ContradictionDetector,
    stats: ReasoningStats,
    decode_cache: LruCache<String, QueryOutcome>,
    created_at: DateTime<Utc>,
    closed: bool,
}

impl Session {
    /// Wire a strategy, empty vocabulary/KB/indices, and (by default) the
    /// core theory pack
    pub fn new(config: SessionConfig) -> Result<Session> {
        let strategy = strategy_for(&config.strategy_id)?;
        let geometry = config.effective_geometry();
        strategy.validate(geometry)?;
        let vocabulary = Vocabulary::new(strategy.clone(), geometry, config.limits.max_atoms)?;
        let kb = KnowledgeBase::new(strategy.clone(), config.limits.max_facts);
        let cache_size = NonZeroUsize::new(DECODE_CACHE_SIZE)
            .ok_or_else(|| SessionError::Internal {
                invariant: "decode-cache-size",
                message: "cache size must be nonzero".to_string(),
            })?;

        let mut session = Session {
            id: Uuid::new_v4(),
            config,
            strategy,
            vocabulary,
            kb,
            rules: RuleSet::new(),
            graphs: FxHashMap::default(),
            graph_order: Vec::new(),
            semantics: SemanticIndex::new(),
            scope: Scope::new(),
            detector: ContradictionDetector::new(),
            stats: ReasoningStats::default(),
            decode_cache: LruCache::new(cache_size),
            created_at: Utc::now(),
            closed: false,
        };
        if session.config.auto_load_core {
            let outcome = session.learn(CORE_THEORY);
            if !outcome.success {
                return Err(SessionError::Internal {
                    invariant: "core-theory-loads",
                    message: outcome.errors.join("; "),
                });
            }
        }
        tracing::debug!(id = %session.id, strategy = %session.config.strategy_id, "session created");
        Ok(session)
    }

    /// Construct from the stable environment variables
    pub fn from_env() -> Result<Session> {
        Self::new(SessionConfig::from_env())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ------------------------------------------------------------------
    // learn
    // ------------------------------------------------------------------

    /// Parse and execute a Sys2DSL source as one transaction. Any failure —
    /// parse, validation, execution, contradiction — rolls the whole batch
    /// back and reports it in the outcome; the session state is then
    /// indistinguishable from before the call.
    pub fn learn(&mut self, source: &str) -> LearnOutcome {
        if self.closed {
            return LearnOutcome::failed("Session is closed");
        }
        let program = match parse_program(source) {
            Ok(program) => program,
            Err(err) => return LearnOutcome::failed(err.to_string()),
        };
        if let Err(err) = self.check_dsl(&program) {
            return LearnOutcome::failed(err.to_string());
        }

        let snapshot = self.begin_transaction();
        let mut facts_added = 0usize;
        let mut batch_declared: FxHashSet<String> = FxHashSet::default();
        match self.execute_items(&program.items, &mut facts_added, &mut batch_declared) {
            Ok(()) => {
                self.semantics = SemanticIndex::derive(&self.kb);
                self.decode_cache.clear();
                tracing::debug!(facts_added, "learn committed");
                LearnOutcome {
                    success: true,
                    facts_added,
                    errors: Vec::new(),
                    contradictions: Vec::new(),
                }
            }
            Err(LearnAbort::Contradiction(contradiction)) => {
                self.rollback(&snapshot);
                tracing::warn!(fact = %contradiction.new_fact, "learn rolled back on contradiction");
                LearnOutcome {
                    success: false,
                    facts_added: 0,
                    errors: Vec::new(),
                    contradictions: vec![*contradiction],
                }
            }
            Err(LearnAbort::Error(err)) => {
                self.rollback(&snapshot);
                tracing::warn!(error = %err, "learn rolled back on error");
                LearnOutcome::failed(err.to_string())
            }
        }
    }

    /// Strict static validation before any state is touched
    fn check_dsl(&self, program: &Program) -> Result<()> {
        for stmt in program.statements() {
            if let Some(hole) = stmt.holes().into_iter().next() {
                return Err(SessionError::Validation {
                    message: format!("hole '?{}' is not allowed in learn", hole),
                    span: stmt.span,
                });
            }
            if stmt.nesting_depth() > self.config.limits.max_nesting_depth {
                return Err(SessionError::Validation {
                    message: format!(
                        "statement nesting {} exceeds limit {}",
                        stmt.nesting_depth(),
                        self.config.limits.max_nesting_depth
                    ),
                    span: stmt.span,
                });
            }
            if stmt.args.len() > self.config.limits.max_positions {
                return Err(SessionError::Validation {
                    message: format!(
                        "statement has {} arguments; limit is {}",
                        stmt.args.len(),
                        self.config.limits.max_positions
                    ),
                    span: stmt.span,
                });
            }
        }
        Ok(())
    }

    fn execute_items(
        &mut self,
        items: &[Item],
        facts_added: &mut usize,
        declared: &mut FxHashSet<String>,
    ) -> std::result::Result<(), LearnAbort> {
        for item in items {
            match item {
                Item::Block(inner) => self.execute_items(inner, facts_added, declared)?,
                Item::Rule(decl) => {
                    self.validate_rule(decl)?;
                    self.rules.register(decl);
                }
                Item::Graph(decl) => {
                    if !self.graphs.contains_key(&decl.name) {
                        self.graph_order.push(decl.name.clone());
                    }
                    self.graphs.insert(decl.name.clone(), decl.clone());
                }
                Item::Fact(stmt) => self.execute_statement(stmt, facts_added, declared)?,
            }
        }
        Ok(())
    }

    fn execute_statement(
        &mut self,
        stmt: &Statement,
        facts_added: &mut usize,
        declared: &mut FxHashSet<String>,
    ) -> std::result::Result<(), LearnAbort> {
        // Graph invocation expands to its body in a fresh frame.
        if let Some(decl) = self.graphs.get(&stmt.operator).cloned() {
            let (body, returns) = executor::expand_graph(&decl, &stmt.args)?;
            self.scope.push_frame(&format!("graph:{}", decl.name));
            for inner in &body {
                if let Err(err) = self.execute_statement(inner, facts_added, declared) {
                    self.scope.pop_frame();
                    return Err(err);
                }
            }
            let binding = returns.as_ref().and_then(|expr| self.binding_for_expr(expr));
            self.scope.pop_frame();
            if let (Some(dest), Some(binding)) = (&stmt.dest, binding) {
                self.scope.bind(dest, binding);
            }
            return Ok(());
        }

        self.validate_operator(stmt, declared)?;
        if self.config.strict_dependencies {
            self.check_dependencies(stmt)?;
        }

        let metadata = executor::extract_canonical_metadata(stmt, &self.scope, &self.semantics)?;
        let vector =
            executor::build_statement_vector(stmt, &self.scope, &mut self.vocabulary, &self.semantics)?;

        if let Some(contradiction) = self.detector.check(&self.kb, &self.semantics, &metadata) {
            return Err(LearnAbort::Contradiction(Box::new(contradiction)));
        }

        self.kb
            .add_fact(vector.clone(), metadata.clone(), None, Some(stmt.span))?;
        *facts_added += 1;

        if is_declaration(&metadata) {
            // Later statements of this batch must see the new declaration.
            declared.extend(metadata.args.first().cloned());
            self.semantics = SemanticIndex::derive(&self.kb);
        }

        if let Some(dest) = &stmt.dest {
            self.scope.bind(dest, ScopeBinding { metadata, vector });
        }
        Ok(())
    }

    /// An operator must be a verb-cased relation, a builtin, a graph, or an
    /// operator introduced by a declaration (this batch or an earlier one)
    fn validate_operator(&self, stmt: &Statement, declared: &FxHashSet<String>) -> Result<()> {
        let op = self.semantics.canonical_atom(&stmt.operator);
        let known = is_verb_name(&op)
            || BUILTIN_OPERATORS.contains(&op.as_str())
            || self.graphs.contains_key(&op)
            || declared.contains(&op)
            || self.declared_by_theory(&op);
        if known {
            return Ok(());
        }
        Err(SessionError::Validation {
            message: format!("unknown operator '{}'", stmt.operator),
            span: stmt.span,
        })
    }

    fn declared_by_theory(&self, op: &str) -> bool {
        self.semantics
            .mutual_exclusions()
            .iter()
            .any(|c| c.operator == op)
            || self.semantics.contradicts_same_args(op).is_some()
            || self.semantics.is_inheritable(op)
            || self.semantics.is_transitive(op)
            || self.semantics.is_symmetric(op)
            || self.semantics.is_reflexive(op)
            || self.semantics.negation_target(op).is_some()
            || self.semantics.inverse_of(op).is_some()
            || !self.kb.find_by_operator(op).is_empty()
    }

    /// Strict-dependency mode: argument identifiers must already be atoms
    fn check_dependencies(&self, stmt: &Statement) -> Result<()> {
        for arg in &stmt.args {
            if let Expr::Identifier(name, span) = arg {
                let canonical = self.semantics.canonical_atom(name);
                if !self.vocabulary.contains(&canonical) {
                    return Err(SessionError::Validation {
                        message: format!("unknown identifier '{}' (strict dependencies)", name),
                        span: *span,
                    });
                }
            }
        }
        Ok(())
    }

    /// Conclusion variables must all be bound by the condition
    fn validate_rule(&self, decl: &RuleDecl) -> Result<()> {
        let condition_vars = decl.condition.variables();
        for var in decl.conclusion.variables() {
            if !condition_vars.contains(&var) {
                return Err(SessionError::Validation {
                    message: format!(
                        "rule '{}' concludes with unbound variable '${}'",
                        decl.name, var
                    ),
                    span: decl.span,
                });
            }
        }
        Ok(())
    }

    fn binding_for_expr(&mut self, expr: &Expr) -> Option<ScopeBinding> {
        match expr {
            Expr::Reference(name, _) => self.scope.resolve(name).cloned(),
            Expr::Identifier(name, _) => {
                let canonical = self.semantics.canonical_atom(name);
                let vector = self.vocabulary.get_or_create(&canonical).ok()?;
                Some(ScopeBinding {
                    metadata: CanonicalMetadata::positive(canonical, Vec::new()),
                    vector,
                })
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    fn begin_transaction(&self) -> TransactionSnapshot {
        TransactionSnapshot {
            kb: self.kb.snapshot(),
            rule_count: self.rules.len(),
            graph_count: self.graph_order.len(),
            vocab_count: self.vocabulary.len(),
            scope: self.scope.snapshot(),
        }
    }

    /// Restore every owned collection to its snapshot size and re-derive
    /// the semantic index from the surviving facts
    fn rollback(&mut self, snapshot: &TransactionSnapshot) {
        self.kb.rollback(&snapshot.kb);
        self.rules.truncate(snapshot.rule_count);
        while self.graph_order.len() > snapshot.graph_count {
            if let Some(name) = self.graph_order.pop() {
                self.graphs.remove(&name);
            }
        }
        self.vocabulary.truncate(snapshot.vocab_count);
        self.scope.rollback(&snapshot.scope);
        self.semantics = SemanticIndex::derive(&self.kb);
        self.decode_cache.clear();
    }

    // ------------------------------------------------------------------
    // prove / query / solve
    // ------------------------------------------------------------------

    /// Prove a single goal statement. Does not mutate session state beyond
    /// the reasoning counters.
    pub fn prove(&mut self, source: &str) -> Result<ProofResult> {
        self.ensure_open()?;
        let stmt = parse_statement(source)?;
        if let Some(hole) = stmt.holes().into_iter().next() {
            return Err(SessionError::Validation {
                message: format!("prove goal may not contain hole '?{}'", hole),
                span: stmt.span,
            });
        }
        let engine = ProofEngine::new(
            &self.kb,
            &self.semantics,
            &self.rules,
            &self.vocabulary,
            self.config.proof_options(),
        );
        let (result, delta) = engine.prove(&stmt, &self.scope);
        self.stats.merge(&delta);
        Ok(result)
    }

    /// Decode a query with holes. Results are cached per query text until
    /// the knowledge base changes.
    pub fn query(&mut self, source: &str) -> Result<QueryOutcome> {
        self.ensure_open()?;
        let stmt = parse_statement(source)?;
        let holes = stmt.holes();
        if holes.len() > self.config.limits.max_holes_per_query {
            return Err(SessionError::Validation {
                message: format!(
                    "query has {} holes; limit is {}",
                    holes.len(),
                    self.config.limits.max_holes_per_query
                ),
                span: stmt.span,
            });
        }
        if holes.is_empty() {
            return Ok(QueryOutcome::default());
        }
        if let Some(hit) = self.decode_cache.get(source) {
            return Ok(hit.clone());
        }
        let weights = match self.config.reasoning_priority {
            ReasoningPriority::SymbolicPriority => (0.6, 0.4),
            ReasoningPriority::HolographicPriority => (0.4, 0.6),
        };
        let engine = QueryEngine::new(
            &self.kb,
            &self.semantics,
            &self.rules,
            &self.vocabulary,
            self.config.proof_options(),
        )
        .with_fusion_weights(weights.0, weights.1);
        let (outcome, delta) = engine.query(&stmt, &self.scope);
        self.stats.merge(&delta);
        self.decode_cache.put(source.to_string(), outcome.clone());
        Ok(outcome)
    }

    /// Run a constraint problem and store each solution as a `cspSolution`
    /// fact (one transaction; capacity failures roll everything back)
    pub fn solve(&mut self, problem: &CspProblem) -> Result<SolveOutcome> {
        self.ensure_open()?;
        let (solutions, delta) = solve::solve(
            problem,
            &self.kb,
            &self.semantics,
            &self.rules,
            &self.vocabulary,
            self.config.proof_options(),
        );
        self.stats.merge(&delta);

        let snapshot = self.begin_transaction();
        let mut stored_fact_ids = Vec::with_capacity(solutions.len());
        for assignment in &solutions {
            let stored = solve::solution_vector(assignment, &mut self.vocabulary)
                .map_err(SessionError::from)
                .and_then(|vector| {
                    let metadata = CanonicalMetadata::positive(
                        "cspSolution",
                        solve::assignment_args(assignment),
                    );
                    self.kb
                        .add_fact(vector, metadata, Some(format!("solve:{}", problem.name)), None)
                        .map_err(SessionError::from)
                });
            match stored {
                Ok(id) => stored_fact_ids.push(id),
                Err(err) => {
                    self.rollback(&snapshot);
                    return Err(err);
                }
            }
        }
        self.decode_cache.clear();
        Ok(SolveOutcome {
            solutions,
            stored_fact_ids,
        })
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Sizes and counters of every owned collection
    pub fn dump(&self) -> DumpReport {
        DumpReport {
            strategy_id: self.config.strategy_id.clone(),
            geometry: self.vocabulary.geometry(),
            vocab_size: self.vocabulary.len(),
            fact_count: self.kb.fact_count(),
            rule_count: self.rules.len(),
            graph_count: self.graph_order.len(),
            scope_bindings: self.scope.binding_count(),
            reasoning_stats: self.stats,
        }
    }

    /// Similarity between two statements (or bare atoms) under the session
    /// strategy. Pure: no atoms are created.
    pub fn similarity(&self, a: &str, b: &str) -> Result<f64> {
        let va = self.statement_vector_pure(&parse_statement(a)?)?;
        let vb = self.statement_vector_pure(&parse_statement(b)?)?;
        Ok(self.strategy.similarity(&va, &vb))
    }

    /// Structural guess for a raw vector
    pub fn decode(&self, vector: &Vector) -> DecodedStructure {
        QueryEngine::new(
            &self.kb,
            &self.semantics,
            &self.rules,
            &self.vocabulary,
            self.config.proof_options(),
        )
        .decode(vector)
    }

    /// One-line rendering of [`Session::decode`]
    pub fn summarize(&self, vector: &Vector) -> String {
        QueryEngine::new(
            &self.kb,
            &self.semantics,
            &self.rules,
            &self.vocabulary,
            self.config.proof_options(),
        )
        .summarize(vector)
    }

    /// Close the session; every subsequent call fails with `Closed`
    pub fn close(&mut self) {
        self.closed = true;
        tracing::debug!(id = %self.id, "session closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    /// Build a statement vector without touching the vocabulary; unknown
    /// atoms are seeded deterministically on the fly
    fn statement_vector_pure(&self, stmt: &Statement) -> Result<Vector> {
        let operator = self.semantics.canonical_atom(&stmt.operator);
        let mut acc = self.atom_vector_pure(&operator);
        for (i, arg) in stmt.args.iter().enumerate() {
            let arg_vec = match arg {
                Expr::Hole(name, span) => {
                    return Err(SessionError::Validation {
                        message: format!("hole '?{}' has no vector", name),
                        span: *span,
                    });
                }
                Expr::Reference(name, span) => self
                    .scope
                    .resolve(name)
                    .map(|b| b.vector.clone())
                    .ok_or_else(|| SessionError::Validation {
                        message: format!("undefined reference '${}'", name),
                        span: *span,
                    })?,
                Expr::Statement(inner) => self.statement_vector_pure(inner)?,
                other => {
                    let name = other.atom_name().unwrap_or_default();
                    self.atom_vector_pure(&self.semantics.canonical_atom(&name))
                }
            };
            let position = self.vocabulary.position_vector(i + 1)?;
            let role = self.strategy.bind(position, &arg_vec)?;
            acc = self.strategy.bind(&acc, &role)?;
        }
        Ok(acc)
    }

    fn atom_vector_pure(&self, name: &str) -> Vector {
        self.vocabulary.get(name).cloned().unwrap_or_else(|| {
            self.strategy
                .create_from_name(name, self.vocabulary.geometry())
        })
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Byte-stable image of the vector/KB state (rules and graphs travel as
    /// theory text, not in the binary image)
    pub fn to_image(&self) -> SessionImage {
        SessionImage {
            strategy_id: self.config.strategy_id.clone(),
            geometry: self.vocabulary.geometry(),
            vocab_names: self.vocabulary.names().to_vec(),
            facts: self
                .kb
                .facts()
                .iter()
                .map(|fact| FactImage {
                    operator: fact.operator.clone(),
                    args: fact.args.clone(),
                    inner_operator: fact.metadata.inner_operator.clone(),
                    inner_args: fact.metadata.inner_args.clone(),
                    level: fact.metadata.level,
                    source_rule: fact.source_rule.clone(),
                    span: fact.span,
                    created_at_millis: fact.created_at.timestamp_millis(),
                    vector_bytes: self.strategy.serialize(&fact.vector),
                })
                .collect(),
        }
    }

    /// Serialize and hand the snapshot to a storage adapter
    pub fn save_to(&self, adapter: &mut dyn StorageAdapter, key: &str) -> Result<()> {
        let bytes = storage::encode(&self.to_image());
        adapter.save(key, &bytes)?;
        Ok(())
    }

    /// Load a snapshot image back into a fresh session
    pub fn load_from(
        adapter: &dyn StorageAdapter,
        key: &str,
        config: SessionConfig,
    ) -> Result<Session> {
        let image = storage::decode(&adapter.load(key)?)?;
        Self::restore(image, config)
    }

    /// Rebuild a session from a snapshot image. Facts are replayed in exact
    /// stored order, so the KB bundle is byte-identical to the saved one.
    pub fn restore(image: SessionImage, mut config: SessionConfig) -> Result<Session> {
        config.strategy_id = image.strategy_id.clone();
        config.geometry = image.geometry;
        config.auto_load_core = false;
        let mut session = Session::new(config)?;

        for name in &image.vocab_names {
            session.vocabulary.get_or_create(name)?;
        }
        for fact in &image.facts {
            let vector = session.strategy.deserialize(&fact.vector_bytes)?;
            let mut metadata =
                CanonicalMetadata::positive(fact.operator.clone(), fact.args.clone());
            metadata.inner_operator = fact.inner_operator.clone();
            metadata.inner_args = fact.inner_args.clone();
            metadata.level = fact.level;
            let created_at = DateTime::from_timestamp_millis(fact.created_at_millis)
                .ok_or_else(|| SessionError::Internal {
                    invariant: "snapshot-timestamp",
                    message: format!("timestamp {} out of range", fact.created_at_millis),
                })?;
            session.kb.restore_fact(
                vector,
                metadata,
                fact.source_rule.clone(),
                fact.span,
                created_at,
            )?;
        }
        session.semantics = SemanticIndex::derive(&session.kb);
        Ok(session)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("strategy", &self.config.strategy_id)
            .field("facts", &self.kb.fact_count())
            .field("rules", &self.rules.len())
            .field("closed", &self.closed)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdc::STRATEGY_DENSE_BINARY;

    fn bare_session() -> Session {
        let config = SessionConfig {
            auto_load_core: false,
            ..SessionConfig::default()
        };
        Session::new(config).expect("session")
    }

    fn core_session() -> Session {
        Session::new(SessionConfig::default()).expect("session")
    }

    #[test]
    fn test_learn_adds_facts() {
        let mut session = bare_session();
        let outcome = session.learn("@_ Fido IS_A Dog\n@_ Dog IS_A Mammal");
        assert!(outcome.success, "{:?}", outcome.errors);
        assert_eq!(outcome.facts_added, 2);
        assert_eq!(session.dump().fact_count, 2);
    }

    #[test]
    fn test_parse_error_leaves_state_unchanged() {
        let mut session = bare_session();
        let before = session.dump();
        let outcome = session.learn("@ broken");
        assert!(!outcome.success);
        assert!(!outcome.errors.is_empty());
        assert_eq!(session.dump(), before);
    }

    #[test]
    fn test_unknown_operator_rejected_and_rolled_back() {
        let mut session = bare_session();
        let before = session.dump();
        let outcome = session.learn("@_ A IS_A b\nflies Dog wings");
        assert!(!outcome.success);
        assert!(outcome.errors[0].contains("unknown operator"));
        assert_eq!(session.dump(), before);
    }

    #[test]
    fn test_holes_rejected_in_learn() {
        let mut session = bare_session();
        let outcome = session.learn("Ion PARENT_OF ?who");
        assert!(!outcome.success);
        assert!(outcome.errors[0].contains("hole"));
    }

    #[test]
    fn test_contradiction_rolls_back_whole_batch() {
        let mut session = bare_session();
        session.learn("mutuallyExclusive hasState Open Closed");
        session.learn("hasState Door Open");
        let before = session.dump();

        let outcome = session.learn("@_ Extra IS_A thing\nhasState Door Closed");
        assert!(!outcome.success);
        assert_eq!(outcome.facts_added, 0);
        assert_eq!(outcome.contradictions.len(), 1);
        assert_eq!(session.dump(), before);
        // The session stays usable after the rollback.
        assert!(session.learn("@_ Probe IS_A thing").success);
    }

    #[test]
    fn test_prove_rejects_holes() {
        let mut session = bare_session();
        let err = session.prove("Ion PARENT_OF ?who").unwrap_err();
        assert!(matches!(err, SessionError::Validation { .. }));
    }

    #[test]
    fn test_query_hole_limit() {
        let mut session = bare_session();
        let err = session
            .query("rel ?a ?b ?c ?d")
            .expect_err("limit is three holes");
        assert!(matches!(err, SessionError::Validation { .. }));
    }

    #[test]
    fn test_core_theory_enables_transitivity() {
        let mut session = core_session();
        session.learn("@_ Fido IS_A Dog\n@_ Dog IS_A Mammal\n@_ Mammal IS_A Animal");
        let result = session.prove("@q Fido IS_A Animal").unwrap();
        assert!(result.valid);
        assert_eq!(result.method.as_deref(), Some("transitive"));
    }

    #[test]
    fn test_scope_reference_binding() {
        let mut session = bare_session();
        let outcome = session.learn("@f Opus CAN fly\n@_ Not $f");
        assert!(outcome.success, "{:?}", outcome.errors);
        let result = session.prove("Not (Opus CAN fly)").unwrap();
        assert!(result.valid);
        assert_eq!(result.method.as_deref(), Some("explicit_negation"));
    }

    #[test]
    fn test_graph_invocation() {
        let mut session = bare_session();
        let outcome = session.learn(
            "graph Parentage(subject, object) {\n  @c subject PARENT_OF object\n  @return $c\n}\n@p Parentage Ion Maria",
        );
        assert!(outcome.success, "{:?}", outcome.errors);
        assert!(session.prove("Ion PARENT_OF Maria").unwrap().valid);
    }

    #[test]
    fn test_strict_dependencies() {
        let mut session = bare_session();
        session.config.strict_dependencies = true;
        let outcome = session.learn("@_ Fido IS_A Dog");
        assert!(!outcome.success);
        assert!(outcome.errors[0].contains("strict dependencies"));
    }

    #[test]
    fn test_close_blocks_calls() {
        let mut session = bare_session();
        session.close();
        assert!(session.learn("A IS_A b").errors[0].contains("closed"));
        assert!(matches!(
            session.prove("A IS_A b"),
            Err(SessionError::Closed)
        ));
    }

    #[test]
    fn test_similarity_identical_statements() {
        let mut session = bare_session();
        session.learn("@_ Fido IS_A Dog");
        let sim = session.similarity("Fido IS_A Dog", "Fido IS_A Dog").unwrap();
        assert_eq!(sim, 1.0);
        let other = session.similarity("Fido IS_A Dog", "Rex IS_A Cat").unwrap();
        assert!(other < 1.0);
    }

    #[test]
    fn test_snapshot_roundtrip_dense() {
        let config = SessionConfig {
            strategy_id: STRATEGY_DENSE_BINARY.to_string(),
            geometry: 2048,
            auto_load_core: false,
            ..SessionConfig::default()
        };
        let mut session = Session::new(config.clone()).unwrap();
        session.learn("@_ Fido IS_A Dog\n@_ Dog IS_A Mammal");

        let mut adapter = crate::storage::MemoryAdapter::new();
        session.save_to(&mut adapter, "snap").unwrap();
        let restored = Session::load_from(&adapter, "snap", config).unwrap();

        assert_eq!(restored.dump().fact_count, 2);
        assert_eq!(restored.dump().vocab_size, session.dump().vocab_size);
        // Byte-identical re-encode proves the bundle rebuilt identically.
        assert_eq!(
            storage::encode(&session.to_image()),
            storage::encode(&restored.to_image())
        );
    }

    #[test]
    fn test_solve_stores_solutions() {
        let mut session = bare_session();
        session.learn("@_ Red IS_A color\n@_ Green IS_A color\nDIFFERENT Red Green\nDIFFERENT Green Red");
        let problem = CspProblem {
            name: "pair".into(),
            variables: vec![
                crate::solve::CspVariable {
                    name: "a".into(),
                    domain_type: "color".into(),
                },
                crate::solve::CspVariable {
                    name: "b".into(),
                    domain_type: "color".into(),
                },
            ],
            constraints: vec![],
            max_solutions: 0,
        };
        let outcome = session.solve(&problem).unwrap();
        assert_eq!(outcome.solutions.len(), 4);
        assert_eq!(outcome.stored_fact_ids.len(), 4);
        let report = session.dump();
        assert_eq!(report.fact_count, 4 + 4);
    }
}
