//! Assembles one `(fn ...)`/`(entry ...)` declaration into a `define` block:
//! prologue (every parameter materialized into a stack slot, spec section
//! 4.7), the compiled body, and the implicit-return rule.

use crate::{
    codegen::{statements::compile_block, FunctionCodegen},
    diagnostics::DiagnosticError,
    env::VarEnv,
    ir::IrContext,
    sig::{FnDecl, FnTable},
    types::{Type, TypeEnv},
};

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

pub fn compile_function(
    ir: &mut IrContext,
    types: &TypeEnv,
    fns: &FnTable,
    decl: &FnDecl,
) -> Result<(), DiagnosticError> {
    ir.begin_function(&decl.name);

    let param_decls = decl
        .params
        .iter()
        .enumerate()
        .map(|(i, (name, ty))| format!("{} %raw_{}_{i}", ty.llvm_name(), sanitize(name)))
        .collect::<Vec<_>>()
        .join(", ");
    ir.emit_body(format!(
        "define {} @{}({param_decls}) {{",
        decl.return_type.llvm_name(),
        decl.name
    ));
    ir.emit_body("entry:");

    let mut vars = VarEnv::new();
    vars.enter_scope();
    for (i, (name, ty)) in decl.params.iter().enumerate() {
        let ssa_name = vars.add_parameter(name, ty.clone());
        ir.emit_body(format!("  %{ssa_name} = alloca {}", ty.llvm_name()));
        ir.emit_body(format!(
            "  store {} %raw_{}_{i}, {}* %{ssa_name}",
            ty.llvm_name(),
            sanitize(name),
            ty.llvm_name()
        ));
    }

    let mut cg = FunctionCodegen {
        ir,
        types,
        fns,
        vars,
        return_type: decl.return_type.clone(),
    };
    let result = compile_block(&mut cg, &decl.body)?;

    if !result.returns {
        emit_implicit_return(&mut cg, result.last_value)?;
    }
    cg.vars.exit_scope();
    ir.emit_body("}");
    Ok(())
}

/// A function body that falls off the end without a definite return: `ret
/// void` for a `Void`-returning function, the coerced last statement value
/// if there was one, or a type-appropriate zero (`0`, `null`, or
/// `zeroinitializer`) otherwise.
fn emit_implicit_return(
    cg: &mut FunctionCodegen,
    last_value: Option<crate::value::Value>,
) -> Result<(), DiagnosticError> {
    let return_type = cg.return_type.clone();
    if matches!(return_type, Type::Void) {
        cg.ir.emit_body("  ret void");
        return Ok(());
    }
    let value = match last_value {
        Some(v) => {
            let span = trivial_span(cg);
            cg.ensure_type(v, &return_type, "implicit return", &span)?
        }
        None => default_value(&return_type),
    };
    cg.ir
        .emit_body(format!("  ret {} {}", return_type.llvm_name(), value.operand()));
    Ok(())
}

fn trivial_span(cg: &FunctionCodegen) -> crate::span::Span {
    crate::span::Span::new(cg.ir.current_function.clone().into(), 0, 0)
}

fn default_value(ty: &Type) -> crate::value::Value {
    match ty {
        Type::Int32 => crate::value::Value::int_const(0),
        Type::PointerToByte | Type::Record(_) | Type::Pointer(_) => {
            crate::value::Value::null(ty.clone())
        }
        Type::Void => crate::value::Value::int_const(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sig::collect_signatures;
    use crate::sig::collect_type_env;
    use crate::sexpr::parse_source;

    fn compile(src: &str) -> String {
        let top = parse_source("t", src).unwrap();
        let forms = top.as_list().unwrap().to_vec();
        let types = collect_type_env(&forms);
        let (mut fns, decls) = collect_signatures(&forms, &types).unwrap();
        fns.install_builtins();
        let mut ir = IrContext::new();
        for decl in &decls {
            compile_function(&mut ir, &types, &fns, decl).unwrap();
        }
        ir.assemble()
    }

    #[test]
    fn entry_with_constant_return() {
        let ir = compile("(entry main (params) (returns Int32) (body (return 0)))");
        assert!(ir.contains("define i32 @main()"));
        assert!(ir.contains("ret i32 0"));
    }

    #[test]
    fn parameters_are_materialized_into_slots() {
        let ir = compile(
            "(fn add (params (a Int32) (b Int32)) (returns Int32) (body (return (+ a b))) \
             (tests (test t (body (expect-eq (add 2 3) 5)))))",
        );
        assert!(ir.contains("alloca i32"));
        assert!(ir.contains("store i32 %raw_a_0"));
        assert!(ir.contains("add i32"));
    }

    #[test]
    fn implicit_return_uses_last_statement_value() {
        let ir = compile(
            "(fn f (params) (returns Int32) (body (+ 1 2)) (tests (test t (body (expect-true 1)))))",
        );
        assert!(ir.contains("ret i32"));
    }

    #[test]
    fn implicit_return_defaults_to_zero_when_body_is_empty() {
        let ir = compile(
            "(fn f (params) (returns Int32) (body) (tests (test t (body (expect-true 1)))))",
        );
        assert!(ir.contains("ret i32 0"));
    }
}
