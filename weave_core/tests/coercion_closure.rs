//! Testable property 3: `ensure_type` is idempotent, and coercing a value to
//! its own type is a no-op.

use weave_core::{
    codegen::FunctionCodegen,
    env::VarEnv,
    ir::IrContext,
    sig::FnTable,
    span::Span,
    types::{Type, TypeEnv},
    value::Value,
};

fn codegen<'a>(ir: &'a mut IrContext, types: &'a TypeEnv, fns: &'a FnTable) -> FunctionCodegen<'a> {
    FunctionCodegen {
        ir,
        types,
        fns,
        vars: VarEnv::new(),
        return_type: Type::Int32,
    }
}

#[test]
fn coercing_to_the_value_s_own_type_is_a_no_op() {
    let mut ir = IrContext::new();
    let types = TypeEnv::new();
    let fns = FnTable::new();
    let mut cg = codegen(&mut ir, &types, &fns);
    let span = Span::new("t".into(), 1, 1);

    let before = cg.ir.function_bodies.len();
    let v = Value::int_const(7);
    let coerced = cg.ensure_type(v, &Type::Int32, "ctx", &span).unwrap();
    assert_eq!(coerced, Value::int_const(7));
    assert_eq!(cg.ir.function_bodies.len(), before);
}

#[test]
fn coercing_twice_matches_coercing_once() {
    let mut ir = IrContext::new();
    let types = TypeEnv::new();
    let fns = FnTable::new();
    let mut cg = codegen(&mut ir, &types, &fns);
    let span = Span::new("t".into(), 1, 1);

    let v = Value::int_const(0);
    let once = cg
        .ensure_type(v.clone(), &Type::PointerToByte, "ctx", &span)
        .unwrap();
    let twice = cg
        .ensure_type(once.clone(), &Type::PointerToByte, "ctx", &span)
        .unwrap();
    assert_eq!(once, twice);
}
