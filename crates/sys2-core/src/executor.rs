//! Statement executor
//!
//! Turns a parsed statement plus the current scope into (a) its bound
//! hyperdimensional vector and (b) its canonical metadata. The vector
//! encoding is
//!
//! ```text
//! op ⊗ (Pos1 ⊗ arg1) ⊗ (Pos2 ⊗ arg2) ⊗ … ⊗ (PosN ⊗ argN)
//! ```
//!
//! where `⊗` is the strategy bind. Argument vectors come from scope lookup
//! for `$refs`, from the vocabulary (auto-created) for identifiers and
//! literals, and from recursive encoding for nested statements. Both outputs
//! are deterministic: the same statement under the same scope and semantic
//! index always produces identical results.

use crate::dsl::{Expr, GraphDecl, Span, Statement};
use crate::hdc::{StrategyError, Vector};
use crate::kb::CanonicalMetadata;
use crate::scope::Scope;
use crate::semantics::{SemanticIndex, NOT_OPERATOR};
use crate::vocabulary::{Vocabulary, VocabularyError, MAX_POSITIONS};
use rustc_hash::FxHashMap;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Executor error type
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    /// `$name` does not resolve in any scope frame
    #[error("Undefined reference '${name}' at {span}")]
    UndefinedReference { name: String, span: Span },
    /// Holes are only legal in queries; facts and proofs reject them here
    #[error("Hole '?{name}' not allowed here at {span}")]
    HoleNotAllowed { name: String, span: Span },
    /// More arguments than encodable positions
    #[error("Statement has {count} arguments; at most {limit} positions are encodable")]
    TooManyArguments { count: usize, limit: usize },
    /// Graph invoked with the wrong number of arguments
    #[error("Graph '{graph}' expects {expected} arguments, got {got}")]
    GraphArity {
        graph: String,
        expected: usize,
        got: usize,
    },
    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

/// Executor result type
pub type Result<T> = std::result::Result<T, ExecError>;

// ============================================================================
// VECTOR CONSTRUCTION
// ============================================================================

/// Encode a statement as a single bound vector
pub fn build_statement_vector(
    stmt: &Statement,
    scope: &Scope,
    vocabulary: &mut Vocabulary,
    semantics: &SemanticIndex,
) -> Result<Vector> {
    if stmt.args.len() > MAX_POSITIONS {
        return Err(ExecError::TooManyArguments {
            count: stmt.args.len(),
            limit: MAX_POSITIONS,
        });
    }
    let strategy = vocabulary.strategy().clone();
    let operator = semantics.canonical_atom(&stmt.operator);
    let mut acc = vocabulary.get_or_create(&operator)?;
    for (i, arg) in stmt.args.iter().enumerate() {
        let arg_vec = argument_vector(arg, scope, vocabulary, semantics)?;
        let position = vocabulary.position_vector(i + 1)?;
        let role_bound = strategy.bind(position, &arg_vec)?;
        acc = strategy.bind(&acc, &role_bound)?;
    }
    Ok(acc)
}

/// Resolve one argument expression to a vector
fn argument_vector(
    arg: &Expr,
    scope: &Scope,
    vocabulary: &mut Vocabulary,
    semantics: &SemanticIndex,
) -> Result<Vector> {
    match arg {
        Expr::Reference(name, span) => scope
            .resolve(name)
            .map(|b| b.vector.clone())
            .ok_or_else(|| ExecError::UndefinedReference {
                name: name.clone(),
                span: *span,
            }),
        Expr::Hole(name, span) => Err(ExecError::HoleNotAllowed {
            name: name.clone(),
            span: *span,
        }),
        Expr::Statement(inner) => build_statement_vector(inner, scope, vocabulary, semantics),
        other => {
            // Identifier or literal: vocabulary lookup on the canonical name.
            let name = other
                .atom_name()
                .map(|n| semantics.canonical_atom(&n))
                .unwrap_or_default();
            Ok(vocabulary.get_or_create(&name)?)
        }
    }
}

// ============================================================================
// CANONICAL METADATA
// ============================================================================

/// Derive canonical metadata for a statement under the current scope.
///
/// `Not $ref` and `Not (compound)` produce identical metadata when they name
/// the same statement: the reference is looked through to its bound
/// statement, never collapsed to the `$ref` name.
pub fn extract_canonical_metadata(
    stmt: &Statement,
    scope: &Scope,
    semantics: &SemanticIndex,
) -> Result<CanonicalMetadata> {
    let operator = semantics.canonical_atom(&stmt.operator);

    if operator == NOT_OPERATOR && stmt.args.len() == 1 {
        if let Some((inner, level)) = negated_inner(&stmt.args[0], scope, semantics)? {
            let mut meta = CanonicalMetadata::negation(inner.operator, inner.args);
            meta.level = level;
            return Ok(semantics.canonicalize(&meta));
        }
    }

    let mut level = 0u32;
    let mut args = Vec::with_capacity(stmt.args.len());
    for arg in &stmt.args {
        args.push(argument_name(arg, scope, semantics, &mut level)?);
    }
    let mut meta = CanonicalMetadata::positive(operator, args);
    meta.level = level;
    Ok(semantics.canonicalize(&meta))
}

/// The inner (operator, args) a `Not` argument denotes, if it denotes a
/// statement at all
fn negated_inner(
    arg: &Expr,
    scope: &Scope,
    semantics: &SemanticIndex,
) -> Result<Option<(CanonicalMetadata, u32)>> {
    match arg {
        Expr::Reference(name, span) => {
            let binding = scope
                .resolve(name)
                .ok_or_else(|| ExecError::UndefinedReference {
                    name: name.clone(),
                    span: *span,
                })?;
            Ok(Some((
                binding.metadata.clone(),
                binding.metadata.level.saturating_add(1),
            )))
        }
        Expr::Statement(inner) => {
            let meta = extract_canonical_metadata(inner, scope, semantics)?;
            let level = meta.level.saturating_add(1);
            Ok(Some((meta, level)))
        }
        Expr::Identifier(name, _) => {
            // `Not X` over a bare proposition atom.
            let meta = CanonicalMetadata::positive(semantics.canonical_atom(name), vec![]);
            Ok(Some((meta, 1)))
        }
        _ => Ok(None),
    }
}

/// Atom-name rendering of one argument, accumulating the constructivist
/// level of referenced and nested statements
fn argument_name(
    arg: &Expr,
    scope: &Scope,
    semantics: &SemanticIndex,
    level: &mut u32,
) -> Result<String> {
    match arg {
        Expr::Reference(name, span) => {
            let binding = scope
                .resolve(name)
                .ok_or_else(|| ExecError::UndefinedReference {
                    name: name.clone(),
                    span: *span,
                })?;
            *level = (*level).max(binding.metadata.level.saturating_add(1));
            Ok(binding.metadata.render())
        }
        Expr::Statement(inner) => {
            let meta = extract_canonical_metadata(inner, scope, semantics)?;
            *level = (*level).max(meta.level.saturating_add(1));
            Ok(meta.render())
        }
        Expr::Hole(name, span) => Err(ExecError::HoleNotAllowed {
            name: name.clone(),
            span: *span,
        }),
        other => Ok(other
            .atom_name()
            .map(|n| semantics.canonical_atom(&n))
            .unwrap_or_default()),
    }
}

// ============================================================================
// GRAPH MACRO EXPANSION
// ============================================================================

/// Implicit parameter names used when a graph declares none
fn implicit_params(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i {
            0 => "subject".to_string(),
            1 => "object".to_string(),
            n => format!("freevar{}", n - 1),
        })
        .collect()
}

/// Expand a graph invocation into its body statements with caller-supplied
/// arguments substituted for the parameters. Returns the statements and the
/// `@return` expression (defaulting to a reference to the last statement's
/// destination when the graph declares none).
pub fn expand_graph(decl: &GraphDecl, args: &[Expr]) -> Result<(Vec<Statement>, Option<Expr>)> {
    let params = if decl.params.is_empty() {
        implicit_params(args.len())
    } else {
        decl.params.clone()
    };
    if params.len() != args.len() {
        return Err(ExecError::GraphArity {
            graph: decl.name.clone(),
            expected: params.len(),
            got: args.len(),
        });
    }
    let map: FxHashMap<&str, &Expr> = params
        .iter()
        .map(String::as_str)
        .zip(args.iter())
        .collect();
    let body = decl
        .body
        .iter()
        .map(|stmt| substitute(stmt, &map))
        .collect();
    let returns = decl
        .returns
        .as_ref()
        .map(|r| substitute_expr(r, &map))
        .or_else(|| {
            // Topologically last statement stands in for a missing @return.
            decl.body
                .last()
                .and_then(|stmt| stmt.dest.as_ref())
                .map(|dest| Expr::Reference(dest.clone(), decl.span))
        });
    Ok((body, returns))
}

fn substitute(stmt: &Statement, map: &FxHashMap<&str, &Expr>) -> Statement {
    Statement {
        dest: stmt.dest.clone(),
        operator: stmt.operator.clone(),
        args: stmt.args.iter().map(|a| substitute_expr(a, map)).collect(),
        span: stmt.span,
    }
}

fn substitute_expr(expr: &Expr, map: &FxHashMap<&str, &Expr>) -> Expr {
    match expr {
        Expr::Identifier(name, _) => map
            .get(name.as_str())
            .map(|e| (*e).clone())
            .unwrap_or_else(|| expr.clone()),
        Expr::Statement(inner) => Expr::Statement(Box::new(substitute(inner, map))),
        other => other.clone(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
