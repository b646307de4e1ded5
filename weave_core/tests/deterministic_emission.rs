//! Testable property 2: compiling byte-identical input twice produces
//! byte-identical IR.

use weave_core::{assemble::{assemble, AssembleOptions}, sexpr::parse_source};

const SRC: &str = "\
(type Pair (struct (x Int32) (y Int32)))
(fn add (params (a Int32) (b Int32)) (returns Int32) (body (return (+ a b)))
 (tests (test t (body (expect-eq (add 2 3) 5)))))
(entry main (params) (returns Int32) (body (return (add 1 2))))";

#[test]
fn two_compiles_of_the_same_source_produce_identical_ir() {
    let forms = |src: &str| parse_source("t", src).unwrap().as_list().unwrap().to_vec();

    let first = assemble(&forms(SRC), &AssembleOptions::normal()).unwrap();
    let second = assemble(&forms(SRC), &AssembleOptions::normal()).unwrap();
    assert_eq!(first.ir, second.ir);
}
