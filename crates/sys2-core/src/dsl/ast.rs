//! Parsed-statement AST
//!
//! Every node carries a [`Span`] so validation and contradiction reports can
//! point back at the source line.

use serde::{Deserialize, Serialize};

/// Source position (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An argument expression inside a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Bare identifier (atom name)
    Identifier(String, Span),
    /// `$name` - reference to a scope binding
    Reference(String, Span),
    /// `?name` - query hole
    Hole(String, Span),
    /// Integer literal, carried as an atom-compatible token
    IntLiteral(i64, Span),
    /// Double-quoted string literal
    StrLiteral(String, Span),
    /// Parenthesized nested statement
    Statement(Box<Statement>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Identifier(_, s)
            | Expr::Reference(_, s)
            | Expr::Hole(_, s)
            | Expr::IntLiteral(_, s)
            | Expr::StrLiteral(_, s) => *s,
            Expr::Statement(stmt) => stmt.span,
        }
    }

    /// Atom-name rendering for identifiers and literals; `None` for holes,
    /// references, and nested statements.
    pub fn atom_name(&self) -> Option<String> {
        match self {
            Expr::Identifier(name, _) => Some(name.clone()),
            Expr::IntLiteral(v, _) => Some(v.to_string()),
            Expr::StrLiteral(v, _) => Some(v.clone()),
            _ => None,
        }
    }
}

/// One subject-verb-object (or prefix-operator) statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// `@dest` binding name; `_` discards, `None` when absent
    pub dest: Option<String>,
    pub operator: String,
    pub args: Vec<Expr>,
    pub span: Span,
}

impl Statement {
    /// Holes appearing anywhere in the argument list (by name, in order)
    pub fn holes(&self) -> Vec<String> {
        let mut out = Vec::new();
        for arg in &self.args {
            match arg {
                Expr::Hole(name, _) => {
                    if !out.contains(name) {
                        out.push(name.clone());
                    }
                }
                Expr::Statement(inner) => {
                    let new_holes: Vec<String> = inner
                        .holes()
                        .into_iter()
                        .filter(|h| !out.contains(h))
                        .collect();
                    out.extend(new_holes);
                }
                _ => {}
            }
        }
        out
    }

    /// Maximum statement-in-statement nesting below this node
    pub fn nesting_depth(&self) -> usize {
        self.args
            .iter()
            .map(|a| match a {
                Expr::Statement(inner) => 1 + inner.nesting_depth(),
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }
}

/// Template argument inside a rule pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateArg {
    /// `$x` logical variable
    Var(String),
    /// Concrete atom name
    Atom(String),
}

impl std::fmt::Display for TemplateArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateArg::Var(name) => write!(f, "${}", name),
            TemplateArg::Atom(name) => write!(f, "{}", name),
        }
    }
}

/// Atom template with logical variables, the leaf of a condition tree
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub operator: String,
    pub args: Vec<TemplateArg>,
    pub span: Span,
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.operator)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Tree of leaves/And/Or/Not over atom templates
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    Leaf(Pattern),
    And(Vec<ConditionNode>),
    Or(Vec<ConditionNode>),
    Not(Box<ConditionNode>),
}

impl ConditionNode {
    /// All pattern leaves in the tree, in source order
    pub fn leaves(&self) -> Vec<&Pattern> {
        match self {
            ConditionNode::Leaf(p) => vec![p],
            ConditionNode::And(parts) | ConditionNode::Or(parts) => {
                parts.iter().flat_map(|p| p.leaves()).collect()
            }
            ConditionNode::Not(inner) => inner.leaves(),
        }
    }

    /// All `$var` names in the tree, deduplicated in source order
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        for leaf in self.leaves() {
            for arg in &leaf.args {
                if let TemplateArg::Var(name) = arg {
                    if !out.contains(name) {
                        out.push(name.clone());
                    }
                }
            }
        }
        out
    }
}

/// `rule name: IF <condition> THEN <conclusion>`
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDecl {
    pub name: String,
    pub condition: ConditionNode,
    pub conclusion: ConditionNode,
    pub span: Span,
}

/// `graph Name(params) { ... [@return expr] }`
#[derive(Debug, Clone, PartialEq)]
pub struct GraphDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    pub returns: Option<Expr>,
    pub span: Span,
}

/// Top-level parse unit
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Fact(Statement),
    Rule(RuleDecl),
    Graph(GraphDecl),
    /// `begin ... end` grouping, kept for span-faithful error reporting
    Block(Vec<Item>),
}

/// A parsed Sys2DSL source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    /// Iterate statements depth-first, flattening blocks
    pub fn statements(&self) -> Vec<&Statement> {
        fn walk<'a>(items: &'a [Item], out: &mut Vec<&'a Statement>) {
            for item in items {
                match item {
                    Item::Fact(stmt) => out.push(stmt),
                    Item::Block(inner) => walk(inner, out),
                    Item::Rule(_) | Item::Graph(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.items, &mut out);
        out
    }
}
