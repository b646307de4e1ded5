//! Testable property 4 (record field order) and end-to-end scenario 2
//! (constructing a record with `make`).

use weave_core::{compile, CompileOptions};

const SRC: &str = "\
(type Pair (struct (x Int32) (y Int32)))
(fn mk (params) (returns (ptr Pair)) (body (return (make Pair (x 1) (y 2))))
 (tests (test t (body (expect-eq 1 1)))))";

#[test]
fn make_emits_typedef_and_indexed_field_stores() {
    let src = test_utils::TempSource::new("record-layout", SRC);
    let module = compile(src.path(), &CompileOptions::default()).unwrap();
    test_utils::assert_contains_in_order(
        &module.ir,
        &[
            "%Pair = type { i32, i32 }",
            "call i8* @malloc",
            "getelementptr %Pair, %Pair* %t",
            ", i32 0, i32 0",
            "store i32 1,",
            "getelementptr %Pair, %Pair* %t",
            ", i32 0, i32 1",
            "store i32 2,",
        ],
    );
}

#[test]
fn a_nested_by_value_record_field_is_embedded_not_pointed_to() {
    let src = test_utils::TempSource::new(
        "record-layout-nested",
        "(type Inner (struct (x Int32)))
         (type Outer (struct (inner Inner) (y Int32)))
         (fn mk (params) (returns Int32) (body (return 0))
           (tests (test t (body (expect-eq 1 1)))))",
    );
    let module = compile(src.path(), &CompileOptions::default()).unwrap();
    assert!(module.ir.contains("%Outer = type { %Inner, i32 }"));
}

#[test]
fn loading_a_record_by_value_emits_a_single_star_pointer_operand() {
    let src = test_utils::TempSource::new(
        "record-layout-load",
        "(type Pair (struct (x Int32) (y Int32)))
         (fn read (params (p (ptr Pair))) (returns Int32)
           (body (let copy Pair (load Pair p)) (return 0))
           (tests (test t (body (expect-true 1)))))",
    );
    let module = compile(src.path(), &CompileOptions::default()).unwrap();
    assert!(module.ir.contains("alloca %Pair"));
    assert!(module.ir.contains("load %Pair, %Pair* %raw_p_0"));
    assert!(module.ir.contains("store %Pair %t"));
    assert!(!module.ir.contains("%Pair**"));
}

#[test]
fn a_three_field_record_keeps_declaration_order_under_get_field() {
    let src = test_utils::TempSource::new(
        "record-layout-three",
        "(type Triple (struct (a Int32) (b Int32) (c Int32)))
         (fn sum (params (t (ptr Triple))) (returns Int32)
           (body (return (+ (+ (get-field t a) (get-field t b)) (get-field t c))))
           (tests (test t (body (expect-true 1)))))",
    );
    let module = compile(src.path(), &CompileOptions::default()).unwrap();
    assert!(module.ir.contains("%Triple = type { i32, i32, i32 }"));
    assert!(module.ir.contains(", i32 0, i32 0"));
    assert!(module.ir.contains(", i32 0, i32 1"));
    assert!(module.ir.contains(", i32 0, i32 2"));
}
