//! Statement dispatch (spec section 4.7's table).

use crate::{
    codegen::{expressions::compile_expr, FunctionCodegen},
    diagnostics::{BadForm, DiagnosticError},
    sexpr::{Node, NodeKind},
    span::Span,
    types::Type,
    value::Value,
};

/// Whatever a statement leaves behind for its caller: whether this branch
/// definitely returns (so the caller can suppress a default `ret`), and the
/// value of the last expression evaluated (for implicit-return semantics and
/// for `(block ...)`'s expression-position result).
pub struct StmtResult {
    pub returns: bool,
    pub last_value: Option<Value>,
}

impl StmtResult {
    fn value(value: Value) -> Self {
        StmtResult {
            returns: false,
            last_value: Some(value),
        }
    }

    fn returning() -> Self {
        StmtResult {
            returns: true,
            last_value: None,
        }
    }

    fn empty() -> Self {
        StmtResult {
            returns: false,
            last_value: None,
        }
    }
}

/// Compiles a sequence of statements, stopping as soon as one definitely
/// returns (everything after that point is unreachable, so there is no
/// reason to keep emitting instructions into a block LLVM will never enter).
pub fn compile_block(cg: &mut FunctionCodegen, stmts: &[Node]) -> Result<StmtResult, DiagnosticError> {
    let mut last_value = None;
    for stmt in stmts {
        let result = compile_stmt(cg, stmt)?;
        if result.returns {
            return Ok(result);
        }
        if result.last_value.is_some() {
            last_value = result.last_value;
        }
    }
    Ok(StmtResult {
        returns: false,
        last_value,
    })
}

pub fn compile_stmt(cg: &mut FunctionCodegen, node: &Node) -> Result<StmtResult, DiagnosticError> {
    let NodeKind::List(items) = &node.kind else {
        // A bare atom/string in statement position: evaluate for its value.
        let value = compile_expr(cg, node)?;
        return Ok(StmtResult::value(value));
    };
    match items.first().and_then(Node::as_atom) {
        Some("doc") => Ok(StmtResult::empty()),
        Some("return") => compile_return(cg, items, &node.span),
        Some("let") => compile_let(cg, items, &node.span),
        Some("set") => compile_set(cg, items, &node.span),
        Some("store") => compile_store(cg, items, &node.span),
        Some("set-field") => compile_set_field(cg, items, &node.span),
        Some("do") => compile_block(cg, &items[1..]),
        Some("if-stmt") => compile_if(cg, items, &node.span),
        Some("while") => compile_while(cg, items, &node.span),
        _ => {
            let value = compile_expr(cg, node)?;
            Ok(StmtResult::value(value))
        }
    }
}

fn bad_form(form: &str, message: &str, span: &Span) -> DiagnosticError {
    DiagnosticError::BadForm(
        BadForm {
            form: form.to_string(),
            message: message.to_string(),
        },
        span.clone(),
    )
}

fn compile_return(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<StmtResult, DiagnosticError> {
    let expr = items
        .get(1)
        .ok_or_else(|| bad_form("return", "expected an expression", span))?;
    let value = compile_expr(cg, expr)?;
    let return_type = cg.return_type.clone();
    if matches!(return_type, Type::Void) {
        cg.ir.emit_body("  ret void");
    } else {
        let value = cg.ensure_type(value, &return_type, "return", span)?;
        cg.ir
            .emit_body(format!("  ret {} {}", return_type.llvm_name(), value.operand()));
    }
    Ok(StmtResult::returning())
}

fn compile_let(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<StmtResult, DiagnosticError> {
    let name = items
        .get(1)
        .and_then(Node::as_atom)
        .ok_or_else(|| bad_form("let", "expected a name", span))?;
    let ty_node = items
        .get(2)
        .ok_or_else(|| bad_form("let", "expected a type", span))?;
    let init_node = items
        .get(3)
        .ok_or_else(|| bad_form("let", "expected an initializer", span))?;
    let ty = cg.types.parse_type_node(ty_node);
    let init = compile_expr(cg, init_node)?;
    let init = cg.ensure_type(init, &ty, "let initializer", span)?;

    // No scope push/pop here: a `let` with no trailing statements of its own
    // binds for the remainder of the *enclosing* block (spec section 4.7
    // treats `stmt...` as optional precisely because its absence means "the
    // rest of this block continues with the new binding in scope"). `if`
    // and `while` are what give this language block scoping, not `let`.
    let ssa_name = cg.vars.add_local(name, ty.clone());
    cg.alloca(&ssa_name, &ty);
    cg.store(&ty, &init, &ssa_name);

    compile_block(cg, &items[4..])
}

fn compile_set(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<StmtResult, DiagnosticError> {
    let name = items
        .get(1)
        .and_then(Node::as_atom)
        .ok_or_else(|| bad_form("set", "expected a name", span))?;
    let expr = items
        .get(2)
        .ok_or_else(|| bad_form("set", "expected an expression", span))?;
    let Some(binding) = cg.vars.find(name) else {
        return Err(bad_form("set", &format!("unbound identifier '{name}'"), span));
    };
    let ty = binding.ty.clone();
    let ssa_name = binding.ssa_name.clone();
    let value = compile_expr(cg, expr)?;
    let value = cg.ensure_type(value, &ty, "set", span)?;
    cg.store(&ty, &value, &ssa_name);
    Ok(StmtResult::empty())
}

fn compile_store(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<StmtResult, DiagnosticError> {
    let ty_node = items
        .get(1)
        .ok_or_else(|| bad_form("store", "expected a type", span))?;
    let ptr_node = items
        .get(2)
        .ok_or_else(|| bad_form("store", "expected a pointer expression", span))?;
    let value_node = items
        .get(3)
        .ok_or_else(|| bad_form("store", "expected a value expression", span))?;
    let ty = cg.types.parse_type_node(ty_node);
    let ptr = compile_expr(cg, ptr_node)?;
    let value = compile_expr(cg, value_node)?;
    let value = cg.ensure_type(value, &ty, "store", span)?;
    cg.ir.emit_body(format!(
        "  store {} {}, {}* {}",
        ty.llvm_name(),
        value.operand(),
        ty.llvm_name(),
        ptr.operand()
    ));
    Ok(StmtResult::empty())
}

fn compile_set_field(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<StmtResult, DiagnosticError> {
    let base_node = items
        .get(1)
        .ok_or_else(|| bad_form("set-field", "expected a base expression", span))?;
    let field = items
        .get(2)
        .and_then(Node::as_atom)
        .ok_or_else(|| bad_form("set-field", "expected a field name", span))?;
    let value_node = items
        .get(3)
        .ok_or_else(|| bad_form("set-field", "expected a value expression", span))?;

    let base = compile_expr(cg, base_node)?;
    let Some(record) = base.ty.bare_record_name().map(str::to_string) else {
        return Err(bad_form(
            "set-field",
            &format!("base has no record type ({})", base.ty.debug_name()),
            span,
        ));
    };
    let Some(def) = cg.types.find_record(&record).cloned() else {
        return Err(bad_form("set-field", &format!("unknown record '{record}'"), span));
    };
    let Some(index) = def.field_index(field) else {
        return Err(bad_form(
            "set-field",
            &format!("'{record}' has no field '{field}'"),
            span,
        ));
    };
    let field_ty = def.field_type(field).cloned().unwrap_or(Type::Int32);
    let value = compile_expr(cg, value_node)?;
    let value = cg.ensure_type(value, &field_ty, "set-field", span)?;
    let field_ptr = cg.gep_field(&record, &base, index, &field_ty);
    cg.ir.emit_body(format!(
        "  store {} {}, {}* {}",
        field_ty.llvm_name(),
        value.operand(),
        field_ty.llvm_name(),
        field_ptr.operand()
    ));
    Ok(StmtResult::empty())
}

/// Evaluates `cond`, coercing it to `Int32` first (bridging a pointer
/// condition through `ptrtoint` the same way arithmetic does), and branches
/// on whether it is nonzero.
fn emit_branch_on(cg: &mut FunctionCodegen, cond_node: &Node, then_label: u32, else_label: u32) -> Result<(), DiagnosticError> {
    let cond = compile_expr(cg, cond_node)?;
    let cond = cg.ensure_type(cond, &Type::Int32, "condition", &cond_node.span)?;
    let bit_id = cg.ir.fresh_temp();
    cg.ir
        .emit_body(format!("  %t{bit_id} = icmp ne i32 {}, 0", cond.operand()));
    cg.ir.emit_body(format!(
        "  br i1 %t{bit_id}, label {}, label {}",
        crate::ir::IrContext::label_ref(then_label),
        crate::ir::IrContext::label_ref(else_label)
    ));
    Ok(())
}

fn compile_if(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<StmtResult, DiagnosticError> {
    let cond_node = items
        .get(1)
        .ok_or_else(|| bad_form("if-stmt", "expected a condition", span))?;
    let then_node = items
        .get(2)
        .ok_or_else(|| bad_form("if-stmt", "expected a then branch", span))?;
    let else_node = items
        .get(3)
        .ok_or_else(|| bad_form("if-stmt", "expected an else branch", span))?;

    let then_l = cg.ir.fresh_label();
    let else_l = cg.ir.fresh_label();
    let end_l = cg.ir.fresh_label();

    emit_branch_on(cg, cond_node, then_l, else_l)?;

    cg.ir.emit_body(format!("{}", crate::ir::IrContext::label_def(then_l)));
    cg.vars.enter_scope();
    let then_result = compile_stmt(cg, then_node)?;
    cg.vars.exit_scope();
    if !then_result.returns {
        cg.ir
            .emit_body(format!("  br label {}", crate::ir::IrContext::label_ref(end_l)));
    }

    cg.ir.emit_body(format!("{}", crate::ir::IrContext::label_def(else_l)));
    cg.vars.enter_scope();
    let else_result = compile_stmt(cg, else_node)?;
    cg.vars.exit_scope();
    if !else_result.returns {
        cg.ir
            .emit_body(format!("  br label {}", crate::ir::IrContext::label_ref(end_l)));
    }

    // Per spec's resolved open question: the join label is emitted whenever
    // at least one arm falls through, matching the original's unconditional
    // `ir_emit_label_def(end_l)` guarded only by `!(then_ret && else_ret)`.
    let both_return = then_result.returns && else_result.returns;
    if !both_return {
        cg.ir.emit_body(format!("{}", crate::ir::IrContext::label_def(end_l)));
    }

    if both_return {
        Ok(StmtResult::returning())
    } else {
        Ok(StmtResult::empty())
    }
}

fn compile_while(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<StmtResult, DiagnosticError> {
    let cond_node = items
        .get(1)
        .ok_or_else(|| bad_form("while", "expected a condition", span))?;
    let body_node = items
        .get(2)
        .ok_or_else(|| bad_form("while", "expected a body", span))?;

    let header_l = cg.ir.fresh_label();
    let body_l = cg.ir.fresh_label();
    let end_l = cg.ir.fresh_label();

    cg.ir
        .emit_body(format!("  br label {}", crate::ir::IrContext::label_ref(header_l)));
    cg.ir.emit_body(format!("{}", crate::ir::IrContext::label_def(header_l)));
    emit_branch_on(cg, cond_node, body_l, end_l)?;

    cg.ir.emit_body(format!("{}", crate::ir::IrContext::label_def(body_l)));
    cg.vars.enter_scope();
    let body_result = compile_stmt(cg, body_node)?;
    cg.vars.exit_scope();
    if !body_result.returns {
        cg.ir
            .emit_body(format!("  br label {}", crate::ir::IrContext::label_ref(header_l)));
    }

    cg.ir.emit_body(format!("{}", crate::ir::IrContext::label_def(end_l)));
    Ok(StmtResult::empty())
}
