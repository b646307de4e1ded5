//! End-to-end scenario 1: the simplest possible program.

use weave_core::{compile, CompileOptions};

#[test]
fn entry_emits_main_returning_zero() {
    let src = test_utils::TempSource::new(
        "entry-point",
        "(entry main (params) (returns Int32) (body (return 0)))",
    );
    let module = compile(src.path(), &CompileOptions::default()).unwrap();
    test_utils::assert_contains_in_order(&module.ir, &["define i32 @main()", "ret i32 0"]);
}
