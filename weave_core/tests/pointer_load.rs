//! End-to-end scenario 5: `addr-of` a local, pass it through a pointer
//! parameter, and `load` it back out.

use weave_core::{compile, CompileOptions, TestModeOptions};

#[test]
fn a_local_s_address_round_trips_through_a_pointer_parameter() {
    let src = test_utils::TempSource::new(
        "pointer-load",
        "(fn f (params (p (ptr Int32))) (returns Int32) (body (return (load Int32 p)))
         (tests (test t (setup (let n Int32 42)) (inspect (expect-eq (f (addr-of Int32 n)) 42)))))",
    );
    let options = CompileOptions {
        include_dirs: Vec::new(),
        test_mode: Some(TestModeOptions::all()),
    };
    let module = compile(src.path(), &options).unwrap();
    assert_eq!(module.test_names, vec!["t".to_string()]);
    // `f` takes its argument as a raw i32* and loads through it directly -
    // no getelementptr is involved in bridging the local to the parameter.
    test_utils::assert_contains_in_order(
        &module.ir,
        &["define i32 @f(i32* %raw_p_0)", "load i32, i32*"],
    );
    let f_body = module.ir.split("define i32 @f(").nth(1).unwrap();
    let f_body = &f_body[..f_body.find("\n}").unwrap()];
    assert!(!f_body.contains("getelementptr"));
}
