//! Recursive-descent parser for Sys2DSL
//!
//! Statements are disambiguated by naming convention: a three-argument line
//! whose middle token is an ALL_CAPS verb is subject-verb-object; everything
//! else is prefix `operator arg...`. Rule conditions form a tree of
//! parenthesized patterns joined by `AND` / `OR` / `NOT`.

use super::ast::{
    ConditionNode, Expr, GraphDecl, Item, Pattern, Program, RuleDecl, Span, Statement, TemplateArg,
};
use super::is_verb_name;
use super::lexer::{Lexer, Token, TokenKind};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// What went wrong
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    UnexpectedChar(char),
    UnterminatedString,
    /// `@`, `$`, or `?` with no name attached
    DanglingSigil,
    BadNumber(String),
    UnexpectedToken { expected: String, found: String },
    /// A line with a destination but nothing after it
    EmptyStatement,
    /// Prefix statement whose first token cannot be an operator
    MissingOperator,
    /// Rule pattern used a construct patterns do not allow
    BadPattern(String),
    UnexpectedEof,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::UnexpectedChar(c) => write!(f, "unexpected character '{}'", c),
            ParseErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            ParseErrorKind::DanglingSigil => write!(f, "sigil must be followed by a name"),
            ParseErrorKind::BadNumber(text) => write!(f, "malformed number '{}'", text),
            ParseErrorKind::UnexpectedToken { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ParseErrorKind::EmptyStatement => write!(f, "statement has no content"),
            ParseErrorKind::MissingOperator => {
                write!(f, "statement must start with an operator or be subject-verb-object")
            }
            ParseErrorKind::BadPattern(msg) => write!(f, "invalid rule pattern: {}", msg),
            ParseErrorKind::UnexpectedEof => write!(f, "unexpected end of input"),
        }
    }
}

/// Parse failure with position and the offending source line
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Parse error at {span}: {kind} | {snippet}")]
pub struct ParseError {
    kind: ParseErrorKind,
    span: Span,
    snippet: String,
}

impl ParseError {
    pub(crate) fn at(kind: ParseErrorKind, span: Span, source: &str) -> Self {
        let snippet = source
            .lines()
            .nth(span.line.saturating_sub(1) as usize)
            .unwrap_or("")
            .trim()
            .to_string();
        Self { kind, span, snippet }
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn snippet(&self) -> &str {
        &self.snippet
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Parse a full Sys2DSL source into a [`Program`]
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens, source).program()
}

/// Parse a source expected to contain exactly one statement (query/prove
/// goals use this)
pub fn parse_statement(source: &str) -> Result<Statement, ParseError> {
    let program = parse_program(source)?;
    let statements = program.statements();
    match statements.len() {
        1 if program.items.len() == 1 => Ok(statements[0].clone()),
        _ => Err(ParseError::at(
            ParseErrorKind::UnexpectedToken {
                expected: "exactly one statement".into(),
                found: format!("{} items", program.items.len()),
            },
            Span { line: 1, column: 1 },
            source,
        )),
    }
}

// ============================================================================
// PARSER
// ============================================================================

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, source: &'a str) -> Self {
        Self { tokens, pos: 0, source }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, kind: ParseErrorKind, span: Span) -> ParseError {
        ParseError::at(kind, span, self.source)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        self.error(
            ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.to_string(),
            },
            token.span,
        )
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.bump();
        }
    }

    fn expect_ident(&mut self, word: &str) -> Result<Span, ParseError> {
        match &self.peek().kind {
            TokenKind::Ident(name) if name == word => Ok(self.bump().span),
            _ => Err(self.unexpected(&format!("'{}'", word))),
        }
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == word)
    }

    fn program(mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if matches!(self.peek().kind, TokenKind::Eof) {
                return Ok(Program { items });
            }
            items.push(self.item()?);
        }
    }

    fn item(&mut self) -> Result<Item, ParseError> {
        if self.at_keyword("rule") {
            return Ok(Item::Rule(self.rule_decl()?));
        }
        if self.at_keyword("graph") {
            return Ok(Item::Graph(self.graph_decl()?));
        }
        if self.at_keyword("begin") {
            return self.block();
        }
        Ok(Item::Fact(self.statement_line()?))
    }

    fn block(&mut self) -> Result<Item, ParseError> {
        self.bump(); // begin
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.at_keyword("end") {
                self.bump();
                return Ok(Item::Block(items));
            }
            if matches!(self.peek().kind, TokenKind::Eof) {
                return Err(self.unexpected("'end'"));
            }
            items.push(self.item()?);
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement_line(&mut self) -> Result<Statement, ParseError> {
        let start = self.peek().span;
        let dest = match &self.peek().kind {
            TokenKind::Dest(name) => {
                let name = name.clone();
                self.bump();
                Some(name)
            }
            _ => None,
        };

        let mut exprs = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Newline | TokenKind::Eof | TokenKind::RBrace => break,
                _ => exprs.push(self.expr()?),
            }
        }
        self.build_statement(dest, exprs, start)
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let token = self.bump();
        match token.kind {
            TokenKind::Ident(name) => Ok(Expr::Identifier(name, token.span)),
            TokenKind::Ref(name) => Ok(Expr::Reference(name, token.span)),
            TokenKind::Hole(name) => Ok(Expr::Hole(name, token.span)),
            TokenKind::Int(value) => Ok(Expr::IntLiteral(value, token.span)),
            TokenKind::Str(value) => Ok(Expr::StrLiteral(value, token.span)),
            TokenKind::LParen => {
                let mut inner = Vec::new();
                loop {
                    match &self.peek().kind {
                        TokenKind::RParen => {
                            self.bump();
                            break;
                        }
                        TokenKind::Eof => return Err(self.unexpected("')'")),
                        _ => inner.push(self.expr()?),
                    }
                }
                let stmt = self.build_statement(None, inner, token.span)?;
                Ok(Expr::Statement(Box::new(stmt)))
            }
            other => Err(self.error(
                ParseErrorKind::UnexpectedToken {
                    expected: "an expression".into(),
                    found: other.to_string(),
                },
                token.span,
            )),
        }
    }

    fn build_statement(
        &self,
        dest: Option<String>,
        exprs: Vec<Expr>,
        span: Span,
    ) -> Result<Statement, ParseError> {
        if exprs.is_empty() {
            return Err(self.error(ParseErrorKind::EmptyStatement, span));
        }

        // Subject-verb-object when the middle of three tokens is a verb. An
        // ALL_CAPS object token forces prefix form instead (declarations
        // like `negationOf CANNOT CAN` name verbs in argument positions).
        let mut exprs = exprs;
        if exprs.len() == 3
            && matches!(&exprs[1], Expr::Identifier(name, _) if is_verb_name(name))
            && !matches!(&exprs[2], Expr::Identifier(name, _) if is_verb_name(name))
        {
            let object = exprs.pop();
            let verb = exprs.pop();
            let subject = exprs.pop();
            if let (Some(subject), Some(Expr::Identifier(operator, _)), Some(object)) =
                (subject, verb, object)
            {
                return Ok(Statement {
                    dest,
                    operator,
                    args: vec![subject, object],
                    span,
                });
            }
        }

        // Prefix form: first token is the operator.
        let mut iter = exprs.into_iter();
        let Some(head) = iter.next() else {
            return Err(self.error(ParseErrorKind::EmptyStatement, span));
        };
        let Expr::Identifier(operator, _) = head else {
            return Err(self.error(ParseErrorKind::MissingOperator, head.span()));
        };
        Ok(Statement {
            dest,
            operator,
            args: iter.collect(),
            span,
        })
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    fn rule_decl(&mut self) -> Result<RuleDecl, ParseError> {
        let span = self.bump().span; // rule
        let name = match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump();
                name
            }
            _ => return Err(self.unexpected("a rule name")),
        };
        if matches!(self.peek().kind, TokenKind::Colon) {
            self.bump();
        }
        self.expect_ident("IF")?;
        let condition = self.condition_or()?;
        self.expect_ident("THEN")?;
        let conclusion = self.condition_or()?;
        Ok(RuleDecl {
            name,
            condition,
            conclusion,
            span,
        })
    }

    fn condition_or(&mut self) -> Result<ConditionNode, ParseError> {
        let mut parts = vec![self.condition_and()?];
        while self.at_keyword("OR") {
            self.bump();
            parts.push(self.condition_and()?);
        }
        Ok(match parts.len() {
            1 => parts.remove(0),
            _ => ConditionNode::Or(parts),
        })
    }

    fn condition_and(&mut self) -> Result<ConditionNode, ParseError> {
        let mut parts = vec![self.condition_unary()?];
        while self.at_keyword("AND") {
            self.bump();
            parts.push(self.condition_unary()?);
        }
        Ok(match parts.len() {
            1 => parts.remove(0),
            _ => ConditionNode::And(parts),
        })
    }

    fn condition_unary(&mut self) -> Result<ConditionNode, ParseError> {
        if self.at_keyword("NOT") || self.at_keyword("Not") {
            self.bump();
            return Ok(ConditionNode::Not(Box::new(self.condition_unary()?)));
        }
        if !matches!(self.peek().kind, TokenKind::LParen) {
            return Err(self.unexpected("'(' or NOT"));
        }
        self.bump(); // (

        // A parenthesized group restarts the OR grammar; a pattern is a flat
        // template. Negation directly inside parentheses is also accepted.
        let node = if matches!(self.peek().kind, TokenKind::LParen)
            || self.at_keyword("NOT")
            || (self.at_keyword("Not")
                && matches!(
                    self.tokens.get(self.pos + 1).map(|t| &t.kind),
                    Some(TokenKind::LParen)
                ))
        {
            self.condition_or()?
        } else {
            ConditionNode::Leaf(self.pattern()?)
        };
        match self.peek().kind {
            TokenKind::RParen => {
                self.bump();
                Ok(node)
            }
            _ => Err(self.unexpected("')'")),
        }
    }

    fn pattern(&mut self) -> Result<Pattern, ParseError> {
        let span = self.peek().span;
        let mut parts: Vec<(TemplateArg, Span)> = Vec::new();
        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Ident(name) => {
                    self.bump();
                    parts.push((TemplateArg::Atom(name), token.span));
                }
                TokenKind::Ref(name) => {
                    self.bump();
                    parts.push((TemplateArg::Var(name), token.span));
                }
                TokenKind::Int(value) => {
                    self.bump();
                    parts.push((TemplateArg::Atom(value.to_string()), token.span));
                }
                TokenKind::Str(value) => {
                    self.bump();
                    parts.push((TemplateArg::Atom(value), token.span));
                }
                TokenKind::RParen => break,
                TokenKind::Hole(name) => {
                    return Err(self.error(
                        ParseErrorKind::BadPattern(format!("holes ('?{}') cannot appear in rules", name)),
                        token.span,
                    ));
                }
                _ => return Err(self.unexpected("a pattern atom or ')'")),
            }
        }
        if parts.is_empty() {
            return Err(self.error(ParseErrorKind::BadPattern("empty pattern".into()), span));
        }

        // Same SVO convention as statements.
        if parts.len() == 3
            && !matches!(&parts[2].0, TemplateArg::Atom(name) if is_verb_name(name))
        {
            if let (TemplateArg::Atom(name), _) = &parts[1] {
                if is_verb_name(name) {
                    let operator = name.clone();
                    let subject = parts[0].0.clone();
                    let object = parts[2].0.clone();
                    return Ok(Pattern {
                        operator,
                        args: vec![subject, object],
                        span,
                    });
                }
            }
        }
        let (head, head_span) = parts.remove(0);
        let TemplateArg::Atom(operator) = head else {
            return Err(self.error(
                ParseErrorKind::BadPattern("pattern operator cannot be a variable".into()),
                head_span,
            ));
        };
        Ok(Pattern {
            operator,
            args: parts.into_iter().map(|(arg, _)| arg).collect(),
            span,
        })
    }

    // ------------------------------------------------------------------
    // Graphs
    // ------------------------------------------------------------------

    fn graph_decl(&mut self) -> Result<GraphDecl, ParseError> {
        let span = self.bump().span; // graph
        let name = match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump();
                name
            }
            _ => return Err(self.unexpected("a graph name")),
        };

        let mut params = Vec::new();
        if matches!(self.peek().kind, TokenKind::LParen) {
            self.bump();
            loop {
                match &self.peek().kind {
                    TokenKind::RParen => {
                        self.bump();
                        break;
                    }
                    TokenKind::Comma => {
                        self.bump();
                    }
                    TokenKind::Ident(name) => {
                        params.push(name.clone());
                        self.bump();
                    }
                    _ => return Err(self.unexpected("a parameter name or ')'")),
                }
            }
        }

        match self.peek().kind {
            TokenKind::LBrace => self.bump(),
            _ => return Err(self.unexpected("'{'")),
        };

        let mut body = Vec::new();
        let mut returns = None;
        loop {
            self.skip_newlines();
            match &self.peek().kind {
                TokenKind::RBrace => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => return Err(self.unexpected("'}'")),
                TokenKind::Dest(name) if name == "return" => {
                    let token = self.bump();
                    if returns.is_some() {
                        return Err(self.error(
                            ParseErrorKind::BadPattern("duplicate @return".into()),
                            token.span,
                        ));
                    }
                    returns = Some(self.expr()?);
                }
                _ => body.push(self.statement_line()?),
            }
        }
        Ok(GraphDecl {
            name,
            params,
            body,
            returns,
            span,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_svo_statement() {
        let stmt = parse_statement("@_ Fido IS_A Dog").unwrap();
        assert_eq!(stmt.dest.as_deref(), Some("_"));
        assert_eq!(stmt.operator, "IS_A");
        assert_eq!(
            stmt.args,
            vec![
                Expr::Identifier("Fido".into(), Span { line: 1, column: 4 }),
                Expr::Identifier("Dog".into(), Span { line: 1, column: 14 }),
            ]
        );
    }

    #[test]
    fn test_prefix_statement() {
        let stmt = parse_statement("mutuallyExclusive hasState Open Closed").unwrap();
        assert_eq!(stmt.operator, "mutuallyExclusive");
        assert_eq!(stmt.args.len(), 3);
    }

    #[test]
    fn test_prefix_when_middle_not_verb() {
        // Middle token is an instance, so this cannot be SVO.
        let stmt = parse_statement("hasState Door Open").unwrap();
        assert_eq!(stmt.operator, "hasState");
        assert_eq!(stmt.args.len(), 2);
    }

    #[test]
    fn test_verb_object_forces_prefix() {
        // Declarations name verbs in argument positions; SVO must not fire.
        let stmt = parse_statement("negationOf CANNOT CAN").unwrap();
        assert_eq!(stmt.operator, "negationOf");
        assert_eq!(stmt.args.len(), 2);
    }

    #[test]
    fn test_not_with_nested_statement() {
        let stmt = parse_statement("Not (flies Dog)").unwrap();
        assert_eq!(stmt.operator, "Not");
        let Expr::Statement(inner) = &stmt.args[0] else {
            panic!("expected nested statement");
        };
        assert_eq!(inner.operator, "flies");
        assert_eq!(stmt.nesting_depth(), 1);
    }

    #[test]
    fn test_holes_in_query() {
        let stmt = parse_statement("@q Ion PARENT_OF ?who").unwrap();
        assert_eq!(stmt.holes(), vec!["who".to_string()]);
    }

    #[test]
    fn test_rule_with_and_not() {
        let program =
            parse_program("rule flight: IF ($x IS_A bird) AND NOT ($x IS_A penguin) THEN ($x CAN fly)")
                .unwrap();
        let Item::Rule(rule) = &program.items[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.name, "flight");
        let ConditionNode::And(parts) = &rule.condition else {
            panic!("expected And");
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[1], ConditionNode::Not(_)));
        let ConditionNode::Leaf(conclusion) = &rule.conclusion else {
            panic!("expected leaf conclusion");
        };
        assert_eq!(conclusion.operator, "CAN");
        assert_eq!(
            conclusion.args,
            vec![TemplateArg::Var("x".into()), TemplateArg::Atom("fly".into())]
        );
    }

    #[test]
    fn test_rule_with_or_group() {
        let program = parse_program(
            "rule wet: IF (($x IS_A fish) OR ($x IS_A frog)) THEN ($x LIVES_IN water)",
        )
        .unwrap();
        let Item::Rule(rule) = &program.items[0] else {
            panic!("expected rule");
        };
        assert!(matches!(rule.condition, ConditionNode::Or(_)));
    }

    #[test]
    fn test_rule_negated_conclusion() {
        let program =
            parse_program("rule grounded: IF ($x IS_A penguin) THEN (Not ($x CAN fly))").unwrap();
        let Item::Rule(rule) = &program.items[0] else {
            panic!("expected rule");
        };
        assert!(matches!(rule.conclusion, ConditionNode::Not(_)));
    }

    #[test]
    fn test_holes_rejected_in_rules() {
        let err = parse_program("rule bad: IF ($x IS_A ?thing) THEN ($x CAN fly)").unwrap_err();
        assert!(matches!(err.kind(), ParseErrorKind::BadPattern(_)));
    }

    #[test]
    fn test_graph_with_return() {
        let source = "graph Offspring(subject, object) {\n  @c subject PARENT_OF object\n  @return $c\n}";
        let program = parse_program(source).unwrap();
        let Item::Graph(graph) = &program.items[0] else {
            panic!("expected graph");
        };
        assert_eq!(graph.name, "Offspring");
        assert_eq!(graph.params, vec!["subject".to_string(), "object".to_string()]);
        assert_eq!(graph.body.len(), 1);
        assert!(matches!(graph.returns, Some(Expr::Reference(_, _))));
    }

    #[test]
    fn test_begin_end_block() {
        let program = parse_program("begin\n A IS_A b\n C IS_A d\nend").unwrap();
        let Item::Block(items) = &program.items[0] else {
            panic!("expected block");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(program.statements().len(), 2);
    }

    #[test]
    fn test_multiline_program() {
        let source = "@_ Fido IS_A Dog\n@_ Dog IS_A Mammal\n@_ Mammal IS_A Animal\n";
        let program = parse_program(source).unwrap();
        assert_eq!(program.statements().len(), 3);
    }

    #[test]
    fn test_error_carries_line_and_snippet() {
        let err = parse_program("A IS_A b\n?who foo bar baz\n").unwrap_err();
        assert!(matches!(err.kind(), ParseErrorKind::MissingOperator));
        assert_eq!(err.span().line, 2);
        assert_eq!(err.snippet(), "?who foo bar baz");
    }

    #[test]
    fn test_parse_statement_rejects_multiple() {
        assert!(parse_statement("A IS_A b\nC IS_A d").is_err());
    }
}
