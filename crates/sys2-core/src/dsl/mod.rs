//! Sys2DSL - textual form of the statement language
//!
//! Line-oriented triples with a small amount of block structure:
//!
//! ```text
//! # facts: SVO when the middle token is an ALL_CAPS verb, prefix otherwise
//! @_ Fido IS_A Dog
//! hasState Door Open
//!
//! # negation, references, holes
//! @f Opus CAN fly
//! Not $f
//! @q Ion PARENT_OF ?who
//!
//! # rules and graphs
//! rule flightless: IF ($x IS_A penguin) THEN (Not ($x CAN fly))
//! graph Offspring(subject, object) {
//!     @c subject PARENT_OF object
//!     @return $c
//! }
//! ```
//!
//! Naming conventions carry meaning: `ALL_CAPS` names are verbs/relations,
//! `all_lower` names are concepts, `First_upper` names are instances, `_` is
//! the discard destination. The parser only reads structure; the session's
//! validation pass enforces the conventions.

mod ast;
mod lexer;
mod parser;

pub use ast::{
    ConditionNode, Expr, GraphDecl, Item, Pattern, Program, RuleDecl, Span, Statement, TemplateArg,
};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{parse_program, parse_statement, ParseError, ParseErrorKind};

/// True when every alphabetic character is uppercase and at least one is
/// present: the verb/relation naming convention.
pub fn is_verb_name(name: &str) -> bool {
    let mut saw_alpha = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            saw_alpha = true;
            if !c.is_uppercase() {
                return false;
            }
        } else if c != '_' && !c.is_ascii_digit() {
            return false;
        }
    }
    saw_alpha
}

/// True for `all_lower` concept names
pub fn is_concept_name(name: &str) -> bool {
    let mut saw_alpha = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            saw_alpha = true;
            if !c.is_lowercase() {
                return false;
            }
        }
    }
    saw_alpha
}

/// True for `First_upper_rest_lower` instance names
pub fn is_instance_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_uppercase() && chars.all(|c| !c.is_alphabetic() || c.is_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_conventions() {
        assert!(is_verb_name("IS_A"));
        assert!(is_verb_name("CANNOT"));
        assert!(is_verb_name("MARRIED_TO"));
        assert!(!is_verb_name("Fido"));
        assert!(!is_verb_name("bird"));
        assert!(!is_verb_name("hasState"));

        assert!(is_concept_name("bird"));
        assert!(is_concept_name("symmetric_relation"));
        assert!(!is_concept_name("Bird"));

        assert!(is_instance_name("Fido"));
        assert!(is_instance_name("Opus"));
        assert!(!is_instance_name("fido"));
        assert!(!is_instance_name("IS_A"));
    }
}
