use std::{error::Error, fmt::Display};

use colored::Colorize;

use crate::span::Span;

/// Every fatal condition the compiler can hit, each paired with the [`Span`]
/// where it was detected. There is exactly one way to report one of these:
/// [`Diagnostic::report`] prints it and the caller exits. Nothing here is
/// recoverable mid-compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticError {
    Syntax(SyntaxError, Span),
    Include(IncludeError, Span),
    TypeMismatch(TypeMismatch, Span),
    MissingTests(MissingTests, Span),
    BadForm(BadForm, Span),
    InternalInvariant(InternalInvariant, Span),
}

impl DiagnosticError {
    pub fn span(&self) -> &Span {
        match self {
            DiagnosticError::Syntax(_, span) => span,
            DiagnosticError::Include(_, span) => span,
            DiagnosticError::TypeMismatch(_, span) => span,
            DiagnosticError::MissingTests(_, span) => span,
            DiagnosticError::BadForm(_, span) => span,
            DiagnosticError::InternalInvariant(_, span) => span,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticError::Syntax(..) => "E0001",
            DiagnosticError::Include(..) => "E0002",
            DiagnosticError::TypeMismatch(..) => "E0003",
            DiagnosticError::MissingTests(..) => "E0004",
            DiagnosticError::BadForm(..) => "E0005",
            DiagnosticError::InternalInvariant(..) => "E0006",
        }
    }

    fn body(&self) -> Box<dyn Error> {
        match self {
            DiagnosticError::Syntax(e, _) => Box::new(e.clone()),
            DiagnosticError::Include(e, _) => Box::new(e.clone()),
            DiagnosticError::TypeMismatch(e, _) => Box::new(e.clone()),
            DiagnosticError::MissingTests(e, _) => Box::new(e.clone()),
            DiagnosticError::BadForm(e, _) => Box::new(e.clone()),
            DiagnosticError::InternalInvariant(e, _) => Box::new(e.clone()),
        }
    }

    /// Prints `error[CODE]: message` at the offending span, colored the way a
    /// terminal diagnostic from this compiler always is, and logs the same
    /// text at `error` level for anyone capturing logs instead of a tty.
    pub fn report(&self) {
        let line = format!(
            "{}: {} {}",
            "error".red().bold(),
            format!("[{}]", self.code()).bright_black(),
            self.body()
        );
        eprintln!("{line}");
        eprintln!("  {} {}", "-->".blue(), self.span());
        log::error!("{} at {}: {}", self.code(), self.span(), self.body());
    }
}

impl Display for DiagnosticError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}: {}", self.code(), self.span(), self.body())
    }
}

impl Error for DiagnosticError {}

/// Informational-only note, never fatal. The only one in use today warns
/// when `addr-of` is handed a value whose declared type doesn't match the
/// pointee it is being addressed as.
pub fn warn(span: &Span, message: impl Display) {
    eprintln!(
        "{}: {} {}",
        "warning".yellow().bold(),
        format!("{span}").bright_black(),
        message
    );
    log::warn!("{span}: {message}");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for SyntaxError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeError {
    pub path: String,
    pub reason: String,
}

impl Display for IncludeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot include '{}': {}", self.path, self.reason)
    }
}

impl Error for IncludeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub function: String,
    pub context: String,
    pub wanted: String,
    pub got: String,
}

impl Display for TypeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "in function '{}', context '{}': wanted {}, got {}",
            self.function, self.context, self.wanted, self.got
        )
    }
}

impl Error for TypeMismatch {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTests {
    pub function: String,
}

impl Display for MissingTests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "function '{}' has no (tests ...) block",
            self.function
        )
    }
}

impl Error for MissingTests {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadForm {
    pub form: String,
    pub message: String,
}

impl Display for BadForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed '{}' form: {}", self.form, self.message)
    }
}

impl Error for BadForm {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalInvariant {
    pub message: String,
}

impl Display for InternalInvariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "internal invariant violated: {}", self.message)
    }
}

impl Error for InternalInvariant {}
