use std::{error::Error, fmt::Display, iter::Peekable, rc::Rc, str::Chars};

use crate::span::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    Atom(String),
    Str(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

impl Error for LexError {}

/// Splits source text into a flat token stream. Whitespace is skipped,
/// `;` starts a line comment, and an atom is the longest run of characters
/// excluding whitespace, parens, `"` and `;`.
pub struct Lexer<'a> {
    file: Rc<str>,
    iterator: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
}

fn is_atom_boundary(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == ';'
}

impl<'a> Lexer<'a> {
    pub fn new(file: impl Into<Rc<str>>, input: &'a str) -> Self {
        Self {
            file: file.into(),
            iterator: input.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn span(&self) -> Span {
        Span::new(self.file.clone(), self.line, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.iterator.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.iterator.peek().copied()
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some(';') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_string(&mut self) -> Result<String, LexError> {
        let start = self.span();
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(LexError {
                        message: "unterminated string literal".into(),
                        span: start,
                    })
                }
                Some('"') => break,
                Some('\\') => match self.bump() {
                    None => {
                        return Err(LexError {
                            message: "unterminated string literal".into(),
                            span: start,
                        })
                    }
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(other) => out.push(other),
                },
                Some(c) => out.push(c),
            }
        }
        Ok(out)
    }

    fn read_atom(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if is_atom_boundary(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    /// Tokenizes the whole input, ending in exactly one `Eof` token.
    pub fn lex(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_ws_and_comments();
            let span = self.span();
            match self.peek() {
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        span,
                    });
                    break;
                }
                Some('(') => {
                    self.bump();
                    tokens.push(Token {
                        kind: TokenKind::LParen,
                        span,
                    });
                }
                Some(')') => {
                    self.bump();
                    tokens.push(Token {
                        kind: TokenKind::RParen,
                        span,
                    });
                }
                Some('"') => {
                    let text = self.read_string()?;
                    tokens.push(Token {
                        kind: TokenKind::Str(text),
                        span,
                    });
                }
                Some(_) => {
                    let text = self.read_atom();
                    tokens.push(Token {
                        kind: TokenKind::Atom(text),
                        span,
                    });
                }
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<TokenKind> {
        Lexer::new("test", src)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_parens_and_atoms() {
        assert_eq!(
            lex("(fn main)"),
            vec![
                TokenKind::LParen,
                TokenKind::Atom("fn".into()),
                TokenKind::Atom("main".into()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            lex("; a comment\n(a)"),
            vec![
                TokenKind::LParen,
                TokenKind::Atom("a".into()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn reads_string_escapes() {
        assert_eq!(
            lex(r#" "a\nb\"c" "#),
            vec![TokenKind::Str("a\nb\"c".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Lexer::new("test", r#" "abc"#).lex().unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn reports_line_and_col() {
        let tokens = Lexer::new("test", "(a)\n(b)").lex().unwrap();
        assert_eq!(tokens[4].span.line, 2);
        assert_eq!(tokens[4].span.col, 1);
    }
}
