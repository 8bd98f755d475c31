//! # Sys2 Core
//!
//! Neuro-symbolic "System 2" reasoning engine. Statements are
//! subject-verb-object triples; each one is bound into a hyperdimensional
//! vector and bundled into a transactional knowledge base, and goals are
//! answered by a dual engine that combines symbolic proof search with
//! holographic vector decoding:
//!
//! - **HDC strategies**: pluggable vector codecs (`exact` structural
//!   default, `dense-binary` at geometry 32768 for production stress runs,
//!   `sparse-polynomial`, `metric-affine`) with strict algebraic contracts —
//!   involutive bind, commutative bundle, normalized similarity,
//!   deterministic name seeding
//! - **Transactional KB**: append-only fact records under a four-way index,
//!   all-or-nothing learn with snapshot rollback, contradiction detection
//!   against declared constraints
//! - **Proof engine**: backward chaining with symmetric/inverse/synonym
//!   rewrites, transitive chains, property inheritance with
//!   default-exception blocking, contrapositive and rule-derived negation,
//!   existential witnesses with type-disjointness refutation, cycle
//!   detection, memoization, and depth/step/time budgets
//! - **Query decoder**: unbinds partial statement vectors from the KB
//!   bundle, reads residuals against the vocabulary, fuses them with
//!   index enumeration, and verifies every binding symbolically
//!
//! ## Quick Start
//!
//! ```rust
//! use sys2_core::{Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default())?;
//!
//! // Learn a small taxonomy (one atomic transaction).
//! let outcome = session.learn(
//!     "@_ Fido IS_A Dog\n\
//!      @_ Dog IS_A Mammal\n\
//!      @_ Mammal IS_A Animal",
//! );
//! assert!(outcome.success);
//!
//! // Prove across the transitive chain.
//! let proof = session.prove("@q Fido IS_A Animal")?;
//! assert!(proof.valid);
//! assert_eq!(proof.method.as_deref(), Some("transitive"));
//!
//! // Query with a hole.
//! session.learn("@_ Ion PARENT_OF Maria");
//! let answers = session.query("@q Ion PARENT_OF ?who")?;
//! assert!(!answers.bindings.is_empty());
//! # Ok::<(), sys2_core::SessionError>(())
//! ```
//!
//! ## Environment
//!
//! Sessions built with [`Session::from_env`] honor `HDC_STRATEGY`,
//! `AUTO_LOAD_CORE`, `DEBUG_TRACE`, and `REASONING_PRIORITY`.

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod dsl;
pub mod executor;
pub mod hdc;
pub mod kb;
pub mod query;
pub mod reason;
pub mod scope;
pub mod semantics;
pub mod session;
pub mod solve;
pub mod storage;
pub mod vocabulary;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Strategy layer
pub use hdc::{
    get_thresholds, registered_ids, strategy_for, Strategy, StrategyError, Thresholds, Vector,
    VectorHash, STRATEGY_DENSE_BINARY, STRATEGY_EXACT, STRATEGY_METRIC_AFFINE,
    STRATEGY_SPARSE_POLYNOMIAL,
};

// DSL surface
pub use dsl::{parse_program, parse_statement, ParseError, Program, Span, Statement};

// Knowledge base
pub use kb::{CanonicalMetadata, Fact, FactId, FactIndex, KbError, KnowledgeBase};

// Semantics
pub use semantics::{
    Contradiction, ContradictionDetector, ContradictionKind, SemanticIndex,
};

// Reasoning
pub use reason::{
    ProofOptions, ProofResult, ProofStep, ReasoningStats, Rule, RuleId, RuleSet, SearchTrace,
};

// Query decoding
pub use query::{BindingSet, DecodedStructure, HoleAnswer, QueryOutcome};

// Session lifecycle
pub use session::{
    DumpReport, LearnOutcome, ReasoningPriority, ResourceLimits, Session, SessionConfig,
    SessionError, CORE_THEORY,
};

// Solving
pub use solve::{Assignment, CspProblem, CspVariable, SolveOutcome};

// Storage
pub use storage::{
    FileAdapter, MemoryAdapter, SessionImage, StorageAdapter, StorageError, FORMAT_VERSION, MAGIC,
};

// Vocabulary
pub use vocabulary::{Vocabulary, VocabularyError, MAX_POSITIONS};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        CanonicalMetadata, Contradiction, CspProblem, DumpReport, LearnOutcome, ProofResult,
        QueryOutcome, Session, SessionConfig, SessionError, Strategy, Vector,
    };
}
