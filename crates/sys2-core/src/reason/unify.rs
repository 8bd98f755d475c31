//! Pattern unification
//!
//! Substitution-based matching of rule patterns against stored facts. Facts
//! in this engine are flat (operator plus atom arguments), so unification
//! reduces to walking variable bindings and extending them consistently —
//! the same discipline as a full term unifier, without compound recursion.

use crate::dsl::{Pattern, TemplateArg};
use crate::kb::CanonicalMetadata;
use rustc_hash::FxHashMap;

/// Variable bindings accumulated during rule matching
pub type Bindings = FxHashMap<String, String>;

/// Resolve a template argument through the bindings
pub fn walk(arg: &TemplateArg, bindings: &Bindings) -> Option<String> {
    match arg {
        TemplateArg::Atom(name) => Some(name.clone()),
        TemplateArg::Var(name) => bindings.get(name).cloned(),
    }
}

/// Unify a pattern against a concrete `(operator, args)` pair, returning the
/// extended bindings on success
pub fn unify_pattern(
    pattern: &Pattern,
    operator: &str,
    args: &[String],
    bindings: &Bindings,
) -> Option<Bindings> {
    if pattern.operator != operator || pattern.args.len() != args.len() {
        return None;
    }
    let mut extended = bindings.clone();
    for (template, concrete) in pattern.args.iter().zip(args.iter()) {
        match template {
            TemplateArg::Atom(name) => {
                if name != concrete {
                    return None;
                }
            }
            TemplateArg::Var(name) => match extended.get(name) {
                Some(bound) if bound != concrete => return None,
                Some(_) => {}
                None => {
                    extended.insert(name.clone(), concrete.clone());
                }
            },
        }
    }
    Some(extended)
}

/// Instantiate a pattern under the bindings. The boolean reports whether the
/// result is ground (no unresolved variables survive; unresolved variables
/// are carried through by their `$name` so callers can still render them).
pub fn instantiate(pattern: &Pattern, bindings: &Bindings) -> (CanonicalMetadata, bool) {
    let mut ground = true;
    let args = pattern
        .args
        .iter()
        .map(|arg| match walk(arg, bindings) {
            Some(value) => value,
            None => {
                ground = false;
                arg.to_string()
            }
        })
        .collect();
    (
        CanonicalMetadata::positive(pattern.operator.clone(), args),
        ground,
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Span;

    fn pattern(op: &str, args: &[TemplateArg]) -> Pattern {
        Pattern {
            operator: op.to_string(),
            args: args.to_vec(),
            span: Span::default(),
        }
    }

    fn var(name: &str) -> TemplateArg {
        TemplateArg::Var(name.to_string())
    }

    fn atom(name: &str) -> TemplateArg {
        TemplateArg::Atom(name.to_string())
    }

    #[test]
    fn test_unify_binds_variables() {
        let p = pattern("IS_A", &[var("x"), atom("bird")]);
        let bindings = unify_pattern(
            &p,
            "IS_A",
            &["Opus".to_string(), "bird".to_string()],
            &Bindings::default(),
        )
        .unwrap();
        assert_eq!(bindings.get("x").map(String::as_str), Some("Opus"));
    }

    #[test]
    fn test_unify_respects_existing_bindings() {
        let p = pattern("PARENT_OF", &[var("x"), var("y")]);
        let mut bindings = Bindings::default();
        bindings.insert("x".to_string(), "Ion".to_string());

        assert!(unify_pattern(
            &p,
            "PARENT_OF",
            &["Ion".to_string(), "Maria".to_string()],
            &bindings
        )
        .is_some());
        assert!(unify_pattern(
            &p,
            "PARENT_OF",
            &["Mihai".to_string(), "Maria".to_string()],
            &bindings
        )
        .is_none());
    }

    #[test]
    fn test_unify_repeated_variable() {
        let p = pattern("LIKES", &[var("x"), var("x")]);
        assert!(unify_pattern(
            &p,
            "LIKES",
            &["Ana".to_string(), "Ana".to_string()],
            &Bindings::default()
        )
        .is_some());
        assert!(unify_pattern(
            &p,
            "LIKES",
            &["Ana".to_string(), "Dan".to_string()],
            &Bindings::default()
        )
        .is_none());
    }

    #[test]
    fn test_operator_and_arity_must_match() {
        let p = pattern("IS_A", &[var("x"), atom("bird")]);
        assert!(unify_pattern(&p, "CAN", &["a".into(), "bird".into()], &Bindings::default()).is_none());
        assert!(unify_pattern(&p, "IS_A", &["a".into()], &Bindings::default()).is_none());
    }

    #[test]
    fn test_instantiate_reports_groundness() {
        let p = pattern("CAN", &[var("x"), atom("fly")]);
        let (partial, ground) = instantiate(&p, &Bindings::default());
        assert!(!ground);
        assert_eq!(partial.args[0], "$x");

        let mut bindings = Bindings::default();
        bindings.insert("x".to_string(), "Opus".to_string());
        let (full, ground) = instantiate(&p, &bindings);
        assert!(ground);
        assert_eq!(full.render(), "CAN Opus fly");
    }
}
