//! Test-generation mode (spec section 4.8).
//!
//! Each `(tests (test ...))` entry collected by [`crate::sig`] becomes its
//! own `__test_<fn>_<index>` function; `expect-eq|ne|true|false` desugars
//! into a compare-and-branch that prints a diagnostic and returns `1` on
//! failure. A synthetic `main` then sequences every eligible test and
//! tallies the failures.

use crate::{
    codegen::{expressions::compile_expr, expressions::intern_string, statements::compile_block, FunctionCodegen},
    diagnostics::{BadForm, DiagnosticError},
    env::VarEnv,
    ir::IrContext,
    sexpr::Node,
    sig::{FnDecl, FnTable, TestDecl},
    span::Span,
    types::{Type, TypeEnv},
    value::Value,
};

pub struct TestModeOptions {
    pub names: Vec<String>,
    pub tags: Vec<String>,
}

impl TestModeOptions {
    pub fn all() -> Self {
        TestModeOptions {
            names: Vec::new(),
            tags: Vec::new(),
        }
    }

    fn selects(&self, test: &TestDecl) -> bool {
        if self.names.is_empty() && self.tags.is_empty() {
            return true;
        }
        self.names.iter().any(|n| n == &test.name) || test.tags.iter().any(|t| self.tags.contains(t))
    }
}

/// A single selected test, paired with the declaring function and its index
/// within that function's `(tests ...)` section (used to build the
/// `__test_<fn>_<index>` symbol).
pub struct EligibleTest<'a> {
    pub decl: &'a FnDecl,
    pub index: usize,
    pub test: &'a TestDecl,
    pub symbol: String,
}

pub fn eligible_tests<'a>(decls: &'a [FnDecl], opts: &TestModeOptions) -> Vec<EligibleTest<'a>> {
    let mut out = Vec::new();
    for decl in decls {
        for (index, test) in decl.tests.iter().enumerate() {
            if opts.selects(test) {
                out.push(EligibleTest {
                    decl,
                    index,
                    test,
                    symbol: format!("__test_{}_{}", decl.source_name, index),
                });
            }
        }
    }
    out
}

/// Compiles every eligible test into its own function body and emits a
/// synthetic `main` that runs them in order. Returns the list of compiled
/// tests (used by the CLI for `-list-tests` and for reporting).
pub fn generate<'a>(
    ir: &mut IrContext,
    types: &TypeEnv,
    fns: &FnTable,
    decls: &'a [FnDecl],
    opts: &TestModeOptions,
) -> Result<Vec<EligibleTest<'a>>, DiagnosticError> {
    let selected = eligible_tests(decls, opts);
    for t in &selected {
        compile_test_function(ir, types, fns, t)?;
    }
    emit_synthetic_main(ir, &selected);
    Ok(selected)
}

fn compile_test_function(
    ir: &mut IrContext,
    types: &TypeEnv,
    fns: &FnTable,
    t: &EligibleTest,
) -> Result<(), DiagnosticError> {
    ir.begin_function(&t.symbol);
    ir.emit_body(format!("define i32 @{}() {{", t.symbol));
    ir.emit_body("entry:");

    let mut vars = VarEnv::new();
    vars.enter_scope();

    let mut cg = FunctionCodegen {
        ir,
        types,
        fns,
        vars,
        return_type: Type::Int32,
    };

    compile_block(&mut cg, &t.test.setup)?;
    compile_test_assertions(&mut cg, t)?;

    cg.ir.emit_body("  ret i32 0");
    cg.vars.exit_scope();
    cg.ir.emit_body("}");
    Ok(())
}

fn compile_test_assertions(cg: &mut FunctionCodegen, t: &EligibleTest) -> Result<(), DiagnosticError> {
    for node in &t.test.assertions {
        match node.head() {
            Some("expect-eq") => compile_expectation(cg, Expectation::Eq, node, t)?,
            Some("expect-ne") => compile_expectation(cg, Expectation::Ne, node, t)?,
            Some("expect-true") => compile_expectation(cg, Expectation::True, node, t)?,
            Some("expect-false") => compile_expectation(cg, Expectation::False, node, t)?,
            _ => {
                crate::codegen::statements::compile_stmt(cg, node)?;
            }
        }
    }
    Ok(())
}

enum Expectation {
    Eq,
    Ne,
    True,
    False,
}

/// Picks the `printf` conversion spec for a rendered operand, and the value
/// to print with it, the way spec section 4.8 describes: `%d` for `Int32`,
/// `%s` for `PointerToByte`, `%p` for anything else pointer-like (coerced to
/// `i8*` so a generic pointer print always has a matching vararg).
fn render_operand(cg: &mut FunctionCodegen, value: Value, span: &Span) -> Result<(&'static str, Value), DiagnosticError> {
    match &value.ty {
        Type::Int32 => Ok(("%d", value)),
        Type::PointerToByte => Ok(("%s", value)),
        _ => {
            let coerced = cg.ensure_type(value, &Type::PointerToByte, "expectation render", span)?;
            Ok(("%p", coerced))
        }
    }
}

fn compile_expectation(
    cg: &mut FunctionCodegen,
    kind: Expectation,
    node: &Node,
    t: &EligibleTest,
) -> Result<(), DiagnosticError> {
    let span = node.span.clone();

    let (ok, actual, expected): (Value, Value, Option<Value>) = match kind {
        Expectation::True | Expectation::False => {
            let items = node.as_list().ok_or_else(|| bad_form("expect", &span))?;
            let operand_node = items.get(1).ok_or_else(|| bad_form("expect", &span))?;
            let operand = compile_expr(cg, operand_node)?;
            let operand_i32 = cg.ensure_type(operand, &Type::Int32, "expectation", &span)?;
            let cmp_id = cg.ir.fresh_temp();
            let cond = if matches!(kind, Expectation::True) { "ne" } else { "eq" };
            cg.ir
                .emit_body(format!("  %t{cmp_id} = icmp {cond} i32 {}, 0", operand_i32.operand()));
            (Value::temp(cmp_id, Type::Int32), operand_i32, None)
        }
        Expectation::Eq | Expectation::Ne => {
            let items = node.as_list().ok_or_else(|| bad_form("expect", &span))?;
            let actual_node = items.get(1).ok_or_else(|| bad_form("expect", &span))?;
            let expected_node = items.get(2).ok_or_else(|| bad_form("expect", &span))?;
            let actual = compile_expr(cg, actual_node)?;
            let expected = compile_expr(cg, expected_node)?;
            let is_string = actual.ty == Type::PointerToByte && expected.ty == Type::PointerToByte;
            let ok = if is_string {
                let a = actual.clone();
                let e = expected.clone();
                crate::codegen::expressions::emit_call(
                    cg,
                    "weave_string_eq",
                    &Type::Int32,
                    &[a, e],
                )
            } else {
                let pointer_cmp = actual.ty.is_pointer_like() || expected.ty.is_pointer_like();
                let (a, e, llvm_ty) = if pointer_cmp {
                    let a = cg.ensure_type(actual.clone(), &Type::PointerToByte, "expectation", &span)?;
                    let e = cg.ensure_type(expected.clone(), &Type::PointerToByte, "expectation", &span)?;
                    (a, e, "i8*".to_string())
                } else {
                    let a = cg.ensure_type(actual.clone(), &Type::Int32, "expectation", &span)?;
                    let e = cg.ensure_type(expected.clone(), &Type::Int32, "expectation", &span)?;
                    (a, e, "i32".to_string())
                };
                let cmp_id = cg.ir.fresh_temp();
                cg.ir.emit_body(format!(
                    "  %t{cmp_id} = icmp eq {llvm_ty} {}, {}",
                    a.operand(),
                    e.operand()
                ));
                Value::temp(cmp_id, Type::Int32)
            };
            let is_eq = matches!(kind, Expectation::Eq);
            let final_ok = if is_eq {
                ok
            } else {
                let id = cg.ir.fresh_temp();
                cg.ir
                    .emit_body(format!("  %t{id} = icmp eq i32 {}, 0", ok.operand()));
                let zext = cg.ir.fresh_temp();
                cg.ir.emit_body(format!("  %t{zext} = zext i1 %t{id} to i32"));
                Value::temp(zext, Type::Int32)
            };
            (final_ok, actual, Some(expected))
        }
    };

    let ok_bit = cg.ir.fresh_temp();
    cg.ir.emit_body(format!("  %t{ok_bit} = icmp ne i32 {}, 0", ok.operand()));
    let pass_l = cg.ir.fresh_label();
    let fail_l = cg.ir.fresh_label();
    cg.ir.emit_body(format!(
        "  br i1 %t{ok_bit}, label {}, label {}",
        IrContext::label_ref(pass_l),
        IrContext::label_ref(fail_l)
    ));

    cg.ir.emit_body(IrContext::label_def(fail_l));
    emit_failure_diagnostic(cg, &kind, t, &span, actual, expected)?;
    cg.ir.emit_body("  ret i32 1");

    cg.ir.emit_body(IrContext::label_def(pass_l));
    Ok(())
}

fn emit_failure_diagnostic(
    cg: &mut FunctionCodegen,
    kind: &Expectation,
    t: &EligibleTest,
    span: &Span,
    actual: Value,
    expected: Option<Value>,
) -> Result<(), DiagnosticError> {
    let form_name = match kind {
        Expectation::Eq => "expect-eq",
        Expectation::Ne => "expect-ne",
        Expectation::True => "expect-true",
        Expectation::False => "expect-false",
    };

    let mut fmt = format!("{}:{}:{}: {} failed", span.file, span.line, span.col, form_name);
    let mut call_args = Vec::new();
    if let Some(expected) = expected {
        let (espec, evalue) = render_operand(cg, expected, span)?;
        let (aspec, avalue) = render_operand(cg, actual, span)?;
        fmt.push_str(&format!(": expected {espec}, got {aspec}\n"));
        call_args.push(evalue);
        call_args.push(avalue);
    } else {
        let (aspec, avalue) = render_operand(cg, actual, span)?;
        fmt.push_str(&format!(": got {aspec}\n"));
        call_args.push(avalue);
    }

    let fmt_value = intern_string(cg.ir, &fmt);
    cg.ir
        .declare_extern_once("printf", "declare i32 @printf(i8*, ...)");
    let mut arg_list = format!("{} {}", fmt_value.ty.llvm_name(), fmt_value.operand());
    for arg in &call_args {
        arg_list.push_str(&format!(", {} {}", arg.ty.llvm_name(), arg.operand()));
    }
    let id = cg.ir.fresh_temp();
    cg.ir
        .emit_body(format!("  %t{id} = call i32 (i8*, ...) @printf({arg_list})"));
    Ok(())
}

fn bad_form(form: &str, span: &Span) -> DiagnosticError {
    DiagnosticError::BadForm(
        BadForm {
            form: form.to_string(),
            message: "malformed assertion".into(),
        },
        span.clone(),
    )
}

/// The synthetic `main` emitted in test mode: calls each eligible test,
/// prints `Running test: <name>` for each (spec scenario 3), tallies
/// non-zero returns, and returns the total failure count.
fn emit_synthetic_main(ir: &mut IrContext, selected: &[EligibleTest]) {
    ir.begin_function("main");
    ir.emit_body("define i32 @main() {");
    ir.emit_body("entry:");
    ir.emit_body("  %failures = alloca i32");
    ir.emit_body("  store i32 0, i32* %failures");
    ir.declare_extern_once("puts", "declare i32 @puts(i8*)");

    for t in selected {
        let line = intern_string(ir, &format!("Running test: {}", t.test.name));
        let puts_id = ir.fresh_temp();
        ir.emit_body(format!(
            "  %t{puts_id} = call i32 @puts({} {})",
            line.ty.llvm_name(),
            line.operand()
        ));

        let call_id = ir.fresh_temp();
        ir.emit_body(format!("  %t{call_id} = call i32 @{}()", t.symbol));
        let cmp_id = ir.fresh_temp();
        ir.emit_body(format!("  %t{cmp_id} = icmp ne i32 %t{call_id}, 0"));
        let fail_l = ir.fresh_label();
        let ok_l = ir.fresh_label();
        ir.emit_body(format!(
            "  br i1 %t{cmp_id}, label {}, label {}",
            IrContext::label_ref(fail_l),
            IrContext::label_ref(ok_l)
        ));
        ir.emit_body(IrContext::label_def(fail_l));
        let cur_id = ir.fresh_temp();
        ir.emit_body(format!("  %t{cur_id} = load i32, i32* %failures"));
        let next_id = ir.fresh_temp();
        ir.emit_body(format!("  %t{next_id} = add i32 %t{cur_id}, 1"));
        ir.emit_body(format!("  store i32 %t{next_id}, i32* %failures"));
        ir.emit_body(format!("  br label {}", IrContext::label_ref(ok_l)));
        ir.emit_body(IrContext::label_def(ok_l));
    }

    let final_id = ir.fresh_temp();
    ir.emit_body(format!("  %t{final_id} = load i32, i32* %failures"));
    ir.emit_body(format!("  ret i32 %t{final_id}"));
    ir.emit_body("}");
}
