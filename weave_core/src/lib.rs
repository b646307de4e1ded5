//! `weave_core`: lexes, parses, resolves includes, and compiles a small
//! s-expression language into LLVM textual IR.
//!
//! [`compile`] is the single entry point a front end needs: feed it a path
//! and a [`CompileOptions`], get back an [`assemble::AssembledModule`] or a
//! [`diagnostics::DiagnosticError`] naming exactly what went wrong and where.

pub mod assemble;
pub mod backend;
pub mod codegen;
pub mod diagnostics;
pub mod env;
pub mod include;
pub mod ir;
pub mod lexer;
pub mod sexpr;
pub mod sig;
pub mod span;
pub mod testgen;
pub mod types;
pub mod value;

use std::path::{Path, PathBuf};

pub use assemble::AssembledModule;
pub use diagnostics::DiagnosticError;
pub use testgen::TestModeOptions;

/// Everything [`compile`] needs beyond the entry file itself.
pub struct CompileOptions {
    /// Searched in order for a bare (non-`./`, non-`../`) `(include "...")`
    /// path, after which the current directory is tried.
    pub include_dirs: Vec<PathBuf>,
    /// `Some` puts the compiler in test-generation mode (spec section 4.8):
    /// the program's `entry` is not compiled and a synthetic `main` runs the
    /// selected tests instead.
    pub test_mode: Option<TestModeOptions>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            include_dirs: Vec::new(),
            test_mode: None,
        }
    }
}

/// Reads `entry`, resolves every `(include ...)` it transitively names, and
/// compiles the merged program into one LLVM IR module.
pub fn compile(entry: &Path, options: &CompileOptions) -> Result<AssembledModule, DiagnosticError> {
    let merged = include::load_and_resolve(entry, &options.include_dirs)?;
    let forms = merged.as_list().unwrap_or(&[]);
    let assemble_opts = assemble::AssembleOptions {
        test_mode: options.test_mode.as_ref().map(|t| TestModeOptions {
            names: t.names.clone(),
            tags: t.tags.clone(),
        }),
    };
    assemble::assemble(forms, &assemble_opts)
}

/// Lists every test name eligible under `options` without compiling anything
/// - backs the CLI's `-list-tests` flag.
pub fn list_tests(
    entry: &Path,
    include_dirs: &[PathBuf],
    options: &TestModeOptions,
) -> Result<Vec<String>, DiagnosticError> {
    let merged = include::load_and_resolve(entry, include_dirs)?;
    let forms = merged.as_list().unwrap_or(&[]);
    assemble::list_tests(forms, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::TempSource;

    #[test]
    fn compiles_an_entry_point_end_to_end() {
        let src = TempSource::new("e2e-entry", "(entry main (params) (returns Int32) (body (return 0)))");
        let module = compile(src.path(), &CompileOptions::default()).unwrap();
        assert!(module.ir.contains("define i32 @main()"));
    }

    #[test]
    fn test_mode_option_is_threaded_through() {
        let src = TempSource::new(
            "e2e-tests",
            "(fn add (params (a Int32) (b Int32)) (returns Int32) (body (return (+ a b))) \
             (tests (test adds (body (expect-eq (add 2 3) 5)))))",
        );
        let options = CompileOptions {
            include_dirs: Vec::new(),
            test_mode: Some(TestModeOptions::all()),
        };
        let module = compile(src.path(), &options).unwrap();
        assert_eq!(module.test_names, vec!["adds".to_string()]);
    }
}
