//! Path parser.
//!
//! ```text
//! path     := name_seg ( '.' name_seg | '[' INTEGER ']' | '[' STRING ']' )*
//! name_seg := IDENT ( '(' INTEGER ')' )?
//! ```

use crate::model::{PathExpression, Segment};
use crate::{Error, Result};
use super::lexer::{tokenize, Token, TokenKind};

/// Parser state — wraps a token slice with cursor.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token> {
        let tok = self.peek();
        if tok.kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!("Expected {:?}, got {:?} '{}'", kind, tok.kind, tok.text)))
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, msg: String) -> Error {
        Error::SyntaxError {
            position: self.peek().span.start,
            message: msg,
        }
    }

    fn integer(&mut self) -> Result<usize> {
        let tok = self.expect(TokenKind::Integer)?;
        let position = tok.span.start;
        tok.text.parse().map_err(|_| Error::SyntaxError {
            position,
            message: format!("Index '{}' out of range", tok.text),
        })
    }

    fn name_segment(&mut self) -> Result<Segment> {
        let name = self.expect(TokenKind::Identifier)?.text.clone();
        let ordinal = if self.eat(TokenKind::LParen) {
            let n = self.integer()?;
            self.expect(TokenKind::RParen)?;
            Some(n)
        } else {
            None
        };
        Ok(Segment::Name { name, ordinal })
    }
}

/// Parse a reference path such as `ext.libs["core"][0]`.
pub fn parse_path(input: &str) -> Result<PathExpression> {
    let tokens = tokenize(input)?;
    let mut p = Parser::new(&tokens);
    let mut segments = vec![p.name_segment()?];

    loop {
        match p.peek_kind() {
            TokenKind::Dot => {
                p.advance();
                segments.push(p.name_segment()?);
            }
            TokenKind::LBracket => {
                p.advance();
                let seg = match p.peek_kind() {
                    TokenKind::Integer => Segment::Index(p.integer()?),
                    TokenKind::StringLiteral => Segment::Key(p.advance().text.clone()),
                    kind => return Err(p.error(format!("Expected index or key, got {kind:?}"))),
                };
                p.expect(TokenKind::RBracket)?;
                segments.push(seg);
            }
            TokenKind::Eof => break,
            kind => return Err(p.error(format!("Unexpected {kind:?} in path"))),
        }
    }

    Ok(PathExpression { segments })
}

/// True when `input` is a single bare identifier.
pub fn is_identifier(input: &str) -> bool {
    let mut chars = input.chars();
    matches!(chars.next(), Some(c) if super::lexer::is_ident_start(c))
        && chars.all(super::lexer::is_ident_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_name() {
        let p = parse_path("prop1").unwrap();
        assert_eq!(p.segments, vec![Segment::name("prop1")]);
    }

    #[test]
    fn test_nested_path() {
        let p = parse_path("ext.map1['key2'][0]").unwrap();
        assert_eq!(p.segments, vec![
            Segment::name("ext"),
            Segment::name("map1"),
            Segment::Key("key2".into()),
            Segment::Index(0),
        ]);
    }

    #[test]
    fn test_order_annotation() {
        let p = parse_path("repositories.maven(1).url").unwrap();
        assert_eq!(p.segments[1], Segment::Name { name: "maven".into(), ordinal: Some(1) });
        assert_eq!(p.to_string(), "repositories.maven(1).url");
    }

    #[test]
    fn test_rejects_expressions() {
        assert!(parse_path("obj.getName()").is_err());
        assert!(parse_path("1 + 2").is_err());
        assert!(parse_path("z(1)(2)").is_err());
        assert!(parse_path("").is_err());
        assert!(parse_path("a.").is_err());
        assert!(parse_path("a[").is_err());
    }

    #[test]
    fn test_function_call_with_argument_is_an_ordinal() {
        // `z(1)` is syntactically an order annotation; it only resolves if
        // a second sibling named `z` exists.
        let p = parse_path("z(1)").unwrap();
        assert_eq!(p.segments, vec![Segment::Name { name: "z".into(), ordinal: Some(1) }]);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("newKey1"));
        assert!(is_identifier("_x"));
        assert!(!is_identifier("1a"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier(""));
    }
}
