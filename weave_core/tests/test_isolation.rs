//! Testable property 6: two tests under the same function never share a
//! binding - each `__test_<fn>_<n>` gets its own, disjoint set of SSA names.

use weave_core::{compile, CompileOptions, TestModeOptions};

#[test]
fn sibling_tests_bind_independent_locals() {
    let src = test_utils::TempSource::new(
        "isolation",
        "(fn f (params) (returns Int32) (body (return 0))
           (tests
             (test first (setup (let n Int32 1)) (body (expect-eq n 1)))
             (test second (setup (let n Int32 2)) (body (expect-eq n 2)))))",
    );
    let options = CompileOptions {
        include_dirs: Vec::new(),
        test_mode: Some(TestModeOptions::all()),
    };
    let module = compile(src.path(), &options).unwrap();
    assert_eq!(module.test_names, vec!["first".to_string(), "second".to_string()]);

    let first_body = module.ir.split("define i32 @__test_f_0(").nth(1).unwrap();
    let first_body = &first_body[..first_body.find("\ndefine").unwrap_or(first_body.len())];
    let second_body = module.ir.split("define i32 @__test_f_1(").nth(1).unwrap();

    assert!(first_body.contains("store i32 1,"));
    assert!(!first_body.contains("store i32 2,"));
    assert!(second_body.contains("store i32 2,"));
}
