//! End-to-end scenarios 3 and 4: `-run-tests` synthesizes a `main` that
//! reports each test it runs and fails loudly with a located diagnostic.

use weave_core::{compile, CompileOptions, TestModeOptions};

const ADD_SRC: &str = "\
(fn add (params (a Int32) (b Int32)) (returns Int32) (body (return (+ a b)))
 (tests (test t (body (expect-eq (add 2 3) 5)))))";

#[test]
fn a_passing_test_is_announced_and_excluded_from_the_entry_point() {
    let src = test_utils::TempSource::new("run-tests-pass", ADD_SRC);
    let options = CompileOptions {
        include_dirs: Vec::new(),
        test_mode: Some(TestModeOptions::all()),
    };
    let module = compile(src.path(), &options).unwrap();
    assert_eq!(module.test_names, vec!["t".to_string()]);
    test_utils::assert_contains_in_order(
        &module.ir,
        &["define i32 @__test_add_0()", "Running test: t", "define i32 @main()"],
    );
}

#[test]
fn a_failing_expectation_emits_a_located_diagnostic_and_a_nonzero_return() {
    let src = test_utils::TempSource::new(
        "run-tests-fail",
        "(fn add (params (a Int32) (b Int32)) (returns Int32) (body (return (+ a b)))
         (tests (test t (body (expect-eq (add 2 3) 6)))))",
    );
    let options = CompileOptions {
        include_dirs: Vec::new(),
        test_mode: Some(TestModeOptions::all()),
    };
    let module = compile(src.path(), &options).unwrap();
    assert!(module.ir.contains("expect-eq failed: expected %d, got %d"));
    assert!(module.ir.contains("ret i32 1"));
}

#[test]
fn name_filter_excludes_unselected_tests() {
    let src = test_utils::TempSource::new(
        "run-tests-filter",
        "(fn add (params (a Int32) (b Int32)) (returns Int32) (body (return (+ a b)))
         (tests (test wanted (body (expect-true 1))) (test skipped (body (expect-true 1)))))",
    );
    let options = CompileOptions {
        include_dirs: Vec::new(),
        test_mode: Some(TestModeOptions {
            names: vec!["wanted".to_string()],
            tags: Vec::new(),
        }),
    };
    let module = compile(src.path(), &options).unwrap();
    assert_eq!(module.test_names, vec!["wanted".to_string()]);
    assert!(!module.ir.contains("Running test: skipped"));
}
