//! Sys2DSL lexer
//!
//! Line-oriented: newlines are significant tokens except inside parentheses,
//! where statements may wrap. `#` and `//` start comments that run to the
//! end of the line.

use super::ast::Span;
use super::parser::{ParseError, ParseErrorKind};

/// Token kinds produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare identifier or keyword
    Ident(String),
    /// `@name` destination marker (also `@return`)
    Dest(String),
    /// `$name` reference / logical variable
    Ref(String),
    /// `?name` hole
    Hole(String),
    /// Integer literal
    Int(i64),
    /// Double-quoted string
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Colon,
    Comma,
    /// End of a logical line (suppressed inside parentheses)
    Newline,
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "'{}'", s),
            TokenKind::Dest(s) => write!(f, "'@{}'", s),
            TokenKind::Ref(s) => write!(f, "'${}'", s),
            TokenKind::Hole(s) => write!(f, "'?{}'", s),
            TokenKind::Int(v) => write!(f, "'{}'", v),
            TokenKind::Str(s) => write!(f, "\"{}\"", s),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its source position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Hand-rolled character lexer
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
    paren_depth: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            paren_depth: 0,
        }
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, kind: ParseErrorKind, span: Span) -> ParseError {
        ParseError::at(kind, span, self.source)
    }

    fn skip_to_eol(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn lex_word(&mut self, first: char, span: Span) -> Token {
        let mut word = String::new();
        word.push(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Ident(word).at(span)
    }

    fn lex_name_after_sigil(&mut self, span: Span) -> Result<String, ParseError> {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if word.is_empty() {
            return Err(self.error(ParseErrorKind::DanglingSigil, span));
        }
        Ok(word)
    }

    /// Lex the whole source to a token list ending with `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let span = self.span();
            let Some(c) = self.bump() else {
                tokens.push(TokenKind::Eof.at(span));
                return Ok(tokens);
            };
            match c {
                ' ' | '\t' | '\r' => {}
                '\n' => {
                    // Statements wrap freely inside parentheses.
                    if self.paren_depth == 0
                        && !matches!(
                            tokens.last().map(|t| &t.kind),
                            None | Some(TokenKind::Newline)
                        )
                    {
                        tokens.push(TokenKind::Newline.at(span));
                    }
                }
                '#' => self.skip_to_eol(),
                '/' if self.chars.peek() == Some(&'/') => self.skip_to_eol(),
                '(' => {
                    self.paren_depth += 1;
                    tokens.push(TokenKind::LParen.at(span));
                }
                ')' => {
                    self.paren_depth = self.paren_depth.saturating_sub(1);
                    tokens.push(TokenKind::RParen.at(span));
                }
                '{' => tokens.push(TokenKind::LBrace.at(span)),
                '}' => tokens.push(TokenKind::RBrace.at(span)),
                ':' => tokens.push(TokenKind::Colon.at(span)),
                ',' => tokens.push(TokenKind::Comma.at(span)),
                '@' => {
                    let name = self.lex_name_after_sigil(span)?;
                    tokens.push(TokenKind::Dest(name).at(span));
                }
                '$' => {
                    let name = self.lex_name_after_sigil(span)?;
                    tokens.push(TokenKind::Ref(name).at(span));
                }
                '?' => {
                    let name = self.lex_name_after_sigil(span)?;
                    tokens.push(TokenKind::Hole(name).at(span));
                }
                '"' => {
                    let mut value = String::new();
                    loop {
                        match self.bump() {
                            Some('"') => break,
                            Some('\n') | None => {
                                return Err(self.error(ParseErrorKind::UnterminatedString, span));
                            }
                            Some(c) => value.push(c),
                        }
                    }
                    tokens.push(TokenKind::Str(value).at(span));
                }
                c if c.is_ascii_digit() || c == '-' => {
                    let mut text = String::new();
                    text.push(c);
                    while let Some(&d) = self.chars.peek() {
                        if d.is_ascii_digit() {
                            text.push(d);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    let value: i64 = text
                        .parse()
                        .map_err(|_| self.error(ParseErrorKind::BadNumber(text.clone()), span))?;
                    tokens.push(TokenKind::Int(value).at(span));
                }
                c if c.is_alphabetic() || c == '_' => tokens.push(self.lex_word(c, span)),
                other => {
                    return Err(self.error(ParseErrorKind::UnexpectedChar(other), span));
                }
            }
        }
    }
}

impl TokenKind {
    fn at(self, span: Span) -> Token {
        Token { kind: self, span }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_triple() {
        let toks = kinds("@_ Fido IS_A Dog\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Dest("_".into()),
                TokenKind::Ident("Fido".into()),
                TokenKind::Ident("IS_A".into()),
                TokenKind::Ident("Dog".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_sigils_and_holes() {
        let toks = kinds("Ion PARENT_OF ?who $prev");
        assert!(toks.contains(&TokenKind::Hole("who".into())));
        assert!(toks.contains(&TokenKind::Ref("prev".into())));
    }

    #[test]
    fn test_comments_are_skipped() {
        let toks = kinds("# full line\nA IS_A b // trailing\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("A".into()),
                TokenKind::Ident("IS_A".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_suppressed_inside_parens() {
        let toks = kinds("Not (Opus CAN\n fly)\n");
        let newlines = toks
            .iter()
            .filter(|k| matches!(k, TokenKind::Newline))
            .count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_dangling_sigil_is_error() {
        assert!(Lexer::new("@ Fido").tokenize().is_err());
        assert!(Lexer::new("x $ y").tokenize().is_err());
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("say \"hello").tokenize().unwrap_err();
        assert_eq!(err.span().line, 1);
    }

    #[test]
    fn test_negative_number() {
        let toks = kinds("temp HAS -40");
        assert!(toks.contains(&TokenKind::Int(-40)));
    }
}
