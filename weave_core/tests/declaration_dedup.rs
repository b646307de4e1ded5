//! Testable property 5: a symbol referenced multiple times via `ccall`
//! gets exactly one `declare` line.

use weave_core::{compile, CompileOptions};

#[test]
fn repeated_ccalls_to_the_same_symbol_declare_it_once() {
    let src = test_utils::TempSource::new(
        "dedup-ccall",
        "(fn f (params) (returns Int32)
           (body
             (ccall strlen (returns Int32) (args (Int32 5)))
             (ccall strlen (returns Int32) (args (Int32 5))))
           (tests (test t (body (expect-true 1)))))",
    );
    let module = compile(src.path(), &CompileOptions::default()).unwrap();
    assert_eq!(module.ir.matches("declare i32 @strlen").count(), 1);
}
