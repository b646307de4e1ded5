use std::{error::Error, fmt::Display, rc::Rc};

use crate::{
    lexer::{Lexer, Token, TokenKind},
    span::Span,
};

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Atom(String),
    Str(String),
    List(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn is_atom(&self, text: &str) -> bool {
        matches!(&self.kind, NodeKind::Atom(a) if a == text)
    }

    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Atom(a) => Some(a.as_str()),
            _ => None,
        }
    }

    pub fn as_str_lit(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// The `n`th element of a list node, or `None` for a non-list or a short list.
    pub fn nth(&self, n: usize) -> Option<&Node> {
        self.as_list().and_then(|items| items.get(n))
    }

    /// The leading atom of a list form, e.g. `"fn"` in `(fn main ...)`.
    pub fn head(&self) -> Option<&str> {
        self.nth(0).and_then(Node::as_atom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

impl Error for ParseError {}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn parse_node(&mut self) -> Result<Node, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::LParen => self.parse_list(),
            TokenKind::Atom(text) => {
                self.bump();
                Ok(Node {
                    kind: NodeKind::Atom(text),
                    span: tok.span,
                })
            }
            TokenKind::Str(text) => {
                self.bump();
                Ok(Node {
                    kind: NodeKind::Str(text),
                    span: tok.span,
                })
            }
            TokenKind::RParen => Err(ParseError {
                message: "unexpected ')'".into(),
                span: tok.span,
            }),
            TokenKind::Eof => Err(ParseError {
                message: "unexpected end of input".into(),
                span: tok.span,
            }),
        }
    }

    fn parse_list(&mut self) -> Result<Node, ParseError> {
        let open = self.bump();
        debug_assert_eq!(open.kind, TokenKind::LParen);
        let mut items = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::RParen => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    return Err(ParseError {
                        message: "unterminated list, expected ')'".into(),
                        span: self.peek().span.clone(),
                    })
                }
                _ => items.push(self.parse_node()?),
            }
        }
        Ok(Node {
            kind: NodeKind::List(items),
            span: open.span,
        })
    }

    /// Parses every top-level form and wraps them in one synthetic list node.
    fn parse_top(mut self) -> Result<Node, ParseError> {
        let span = self.peek().span.clone();
        let mut forms = Vec::new();
        while !matches!(self.peek().kind, TokenKind::Eof) {
            forms.push(self.parse_node()?);
        }
        Ok(Node {
            kind: NodeKind::List(forms),
            span,
        })
    }
}

/// Lexes and parses `source`, returning a synthetic top-level `List` node
/// whose children are the file's forms in source order.
pub fn parse_source(file: impl Into<Rc<str>>, source: &str) -> Result<Node, ParseError> {
    let file = file.into();
    let tokens = Lexer::new(file.clone(), source).lex().map_err(|e| ParseError {
        message: e.message,
        span: e.span,
    })?;
    Parser { tokens, pos: 0 }.parse_top()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_lists() {
        let top = parse_source("t", "(fn main (params) (body 0))").unwrap();
        let forms = top.as_list().unwrap();
        assert_eq!(forms.len(), 1);
        let fn_form = &forms[0];
        assert_eq!(fn_form.head(), Some("fn"));
        assert_eq!(fn_form.nth(1).unwrap().as_atom(), Some("main"));
    }

    #[test]
    fn reports_unterminated_list() {
        let err = parse_source("t", "(fn main").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn reports_unexpected_close_paren() {
        let err = parse_source("t", "(a))").unwrap_err();
        assert!(err.message.contains("unexpected ')'"));
    }

    #[test]
    fn parses_multiple_top_level_forms() {
        let top = parse_source("t", "(a) (b)").unwrap();
        assert_eq!(top.as_list().unwrap().len(), 2);
    }
}
