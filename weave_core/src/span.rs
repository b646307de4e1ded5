use std::fmt;

/// A source location: the file it came from plus 1-based line and column.
///
/// Cheap to copy around; the file name is shared via `Rc` so spans can be
/// handed out liberally during lexing and parsing without reallocating the
/// path on every token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: std::rc::Rc<str>,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(file: std::rc::Rc<str>, line: usize, col: usize) -> Self {
        Self { file, line, col }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}
