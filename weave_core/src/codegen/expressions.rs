//! Expression dispatch (spec section 4.6's table), one arm per row.

use crate::{
    codegen::FunctionCodegen,
    diagnostics::{BadForm, DiagnosticError, InternalInvariant},
    ir::IrContext,
    sexpr::{Node, NodeKind},
    span::Span,
    types::Type,
    value::Value,
};

/// Symbols the runtime library, not this module, defines. An ordinary call
/// naming one of these gets an extern `declare` the first time it is seen;
/// everything else is assumed to be a sibling function defined later (or
/// earlier) in the same module.
const EXTERNAL_RUNTIME_FNS: &[&str] = &[
    "malloc",
    "puts",
    "weave_string_eq",
    "llvm_jit_call_i32_i32_i32",
];

pub fn compile_expr(cg: &mut FunctionCodegen, node: &Node) -> Result<Value, DiagnosticError> {
    match &node.kind {
        NodeKind::Str(s) => Ok(intern_string(cg.ir, s)),
        NodeKind::Atom(atom) => compile_atom(cg, atom, &node.span),
        NodeKind::List(items) => compile_list(cg, items, &node.span, node),
    }
}

fn parse_int_atom(atom: &str) -> Option<i32> {
    atom.parse::<i32>().ok()
}

fn compile_atom(cg: &mut FunctionCodegen, atom: &str, span: &Span) -> Result<Value, DiagnosticError> {
    if let Some(n) = parse_int_atom(atom) {
        return Ok(Value::int_const(n));
    }
    match cg.vars.find(atom) {
        Some(binding) => {
            let ssa_name = binding.ssa_name.clone();
            let ty = binding.ty.clone();
            Ok(cg.load(&ty, &ssa_name))
        }
        None => Err(DiagnosticError::InternalInvariant(
            InternalInvariant {
                message: format!("reference to unbound identifier '{atom}'"),
            },
            span.clone(),
        )),
    }
}

/// Interns a string literal as a private module-level byte array (escaping
/// non-printable bytes and the trailing NUL the way LLVM's `c"..."` syntax
/// wants) and returns a GEP to its first byte - this, not a raw global
/// reference, is what every use site of a string literal actually sees.
pub(crate) fn intern_string(ir: &mut IrContext, s: &str) -> Value {
    let name = ir.fresh_string_lit_name();
    let bytes = s.as_bytes();
    let len = bytes.len() + 1;
    let mut escaped = String::new();
    for &b in bytes {
        match b {
            b'"' => escaped.push_str("\\22"),
            b'\\' => escaped.push_str("\\5C"),
            0x20..=0x7e => escaped.push(b as char),
            _ => escaped.push_str(&format!("\\{b:02X}")),
        }
    }
    escaped.push_str("\\00");
    ir.emit_global(format!(
        "{name} = private constant [{len} x i8] c\"{escaped}\""
    ));
    let id = ir.fresh_temp();
    ir.emit_body(format!(
        "  %t{id} = getelementptr [{len} x i8], [{len} x i8]* {name}, i32 0, i32 0"
    ));
    Value::temp(id, Type::PointerToByte)
}

fn compile_list(
    cg: &mut FunctionCodegen,
    items: &[Node],
    span: &Span,
    whole: &Node,
) -> Result<Value, DiagnosticError> {
    let Some(head) = items.first().and_then(Node::as_atom) else {
        return Err(DiagnosticError::BadForm(
            BadForm {
                form: "<empty list>".into(),
                message: "expression list has no head".into(),
            },
            span.clone(),
        ));
    };
    match head {
        "doc" => Ok(Value::int_const(0)),
        "block" => crate::codegen::statements::compile_block(cg, &items[1..])
            .map(|r| r.last_value.unwrap_or_else(|| Value::int_const(0))),
        "addr" => compile_addr(cg, items, span, None),
        "addr-of" => {
            let ty = items.get(1).map(|n| cg.types.parse_type_node(n));
            compile_addr(cg, &[items[0].clone(), items[2].clone()], span, ty)
        }
        "load" => compile_load(cg, items, span),
        "make" => compile_make(cg, items, span),
        "get-field" => compile_get_field(cg, items, span),
        "bitcast" => compile_bitcast(cg, items, span),
        "+" | "-" | "*" | "/" => compile_arith(cg, head, items, span),
        "==" | "!=" | "<" | "<=" | ">" | ">=" => compile_compare(cg, head, items, span),
        "&&" | "||" => compile_logical(cg, head, items, span),
        "ccall" => compile_ccall(cg, items, span),
        "llvm-jit" => compile_llvm_jit(cg, items, span),
        _ => compile_call(cg, head, &items[1..], span, whole),
    }
}

fn compile_addr(
    cg: &mut FunctionCodegen,
    items: &[Node],
    span: &Span,
    declared: Option<Type>,
) -> Result<Value, DiagnosticError> {
    let name = items
        .get(1)
        .and_then(Node::as_atom)
        .ok_or_else(|| bad_form("addr", "expected an identifier", span))?;
    let Some(binding) = cg.vars.find(name) else {
        return Err(DiagnosticError::InternalInvariant(
            InternalInvariant {
                message: format!("address-of unbound identifier '{name}'"),
            },
            span.clone(),
        ));
    };
    let actual = binding.ty.clone();
    let ssa_name = binding.ssa_name.clone();
    if let Some(declared) = &declared {
        if declared != &actual {
            crate::diagnostics::warn(
                span,
                format!(
                    "addr-of declared type {} does not match '{}''s actual type {}",
                    declared.debug_name(),
                    name,
                    actual.debug_name()
                ),
            );
        }
    }
    let pointee = declared.unwrap_or(actual.clone());
    Ok(Value::named(ssa_name, Type::pointer(pointee), true))
}

fn compile_load(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<Value, DiagnosticError> {
    let ty_node = items
        .get(1)
        .ok_or_else(|| bad_form("load", "expected a type", span))?;
    let ptr_node = items
        .get(2)
        .ok_or_else(|| bad_form("load", "expected a pointer expression", span))?;
    let target = cg.types.parse_type_node(ty_node);
    let ptr_val = compile_expr(cg, ptr_node)?;
    if !ptr_val.ty.is_pointer_like() {
        return Err(DiagnosticError::BadForm(
            BadForm {
                form: "load".into(),
                message: format!("expected a pointer, got {}", ptr_val.ty.debug_name()),
            },
            span.clone(),
        ));
    }
    let ptr_val = coerce_pointer_operand(cg, ptr_val, &target);
    let id = cg.ir.fresh_temp();
    cg.ir.emit_body(format!(
        "  %t{id} = load {}, {}* {}",
        target.llvm_name(),
        target.llvm_name(),
        ptr_val.operand()
    ));
    Ok(Value::temp(id, target))
}

/// Bitcasts `value` to `Pointer(target)` unless it already has exactly that
/// type - used by `load` so a pointer whose static type already matches
/// doesn't grow a redundant bitcast line.
fn coerce_pointer_operand(cg: &mut FunctionCodegen, value: Value, target: &Type) -> Value {
    let wanted = Type::pointer(target.clone());
    if value.ty == wanted {
        return value;
    }
    let id = cg.ir.fresh_temp();
    cg.ir.emit_body(format!(
        "  %t{id} = bitcast {} {} to {}",
        value.ty.llvm_name(),
        value.operand(),
        wanted.llvm_name()
    ));
    Value::temp(id, wanted)
}

fn compile_make(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<Value, DiagnosticError> {
    let ty_node = items
        .get(1)
        .ok_or_else(|| bad_form("make", "expected a record type", span))?;
    let ty = cg.types.parse_type_node(ty_node);
    let record = ty
        .bare_record_name()
        .ok_or_else(|| bad_form("make", "expected a record type", span))?
        .to_string();

    let size = cg.sizeof_record(&record);
    cg.ir
        .declare_extern_once("malloc", "declare i8* @malloc(i32)");
    let raw_id = cg.ir.fresh_temp();
    cg.ir
        .emit_body(format!("  %t{raw_id} = call i8* @malloc(i32 {})", size.operand()));
    let cast_id = cg.ir.fresh_temp();
    cg.ir.emit_body(format!(
        "  %t{cast_id} = bitcast i8* %t{raw_id} to %{record}*"
    ));
    let result = Value::temp(cast_id, Type::pointer(Type::Record(record.clone())));

    let def = cg.types.find_record(&record).cloned();
    for field_form in &items[2..] {
        let field_name = field_form.nth(0).and_then(Node::as_atom).unwrap_or("");
        let value_node = field_form
            .nth(1)
            .ok_or_else(|| bad_form("make", "field entry missing a value", span))?;
        let (index, field_ty) = match def.as_ref().and_then(|d| {
            d.field_index(field_name)
                .zip(d.field_type(field_name).cloned())
        }) {
            Some(pair) => pair,
            None => (0, Type::Int32),
        };
        let value = compile_expr(cg, value_node)?;
        let value = cg.ensure_type(value, &field_ty, "make field", &field_form.span)?;
        let field_ptr = cg.gep_field(&record, &result, index, &field_ty);
        cg.store(&field_ty, &value, &strip_percent(&field_ptr.operand()));
    }
    Ok(result)
}

/// [`FunctionCodegen::store`] takes a named slot, not an arbitrary operand,
/// so a GEP'd field pointer (always an SSA temp) needs its leading `%`
/// stripped before being handed to it.
fn strip_percent(operand: &str) -> String {
    operand.trim_start_matches('%').to_string()
}

fn compile_get_field(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<Value, DiagnosticError> {
    let base_node = items
        .get(1)
        .ok_or_else(|| bad_form("get-field", "expected a base expression", span))?;
    let field = items
        .get(2)
        .and_then(Node::as_atom)
        .ok_or_else(|| bad_form("get-field", "expected a field name", span))?;
    let base = compile_expr(cg, base_node)?;
    let Some(record) = base.ty.bare_record_name().map(str::to_string) else {
        return Err(DiagnosticError::BadForm(
            BadForm {
                form: "get-field".into(),
                message: format!("base has no record type ({})", base.ty.debug_name()),
            },
            span.clone(),
        ));
    };
    let Some(def) = cg.types.find_record(&record).cloned() else {
        return Err(DiagnosticError::BadForm(
            BadForm {
                form: "get-field".into(),
                message: format!("unknown record '{record}'"),
            },
            span.clone(),
        ));
    };
    let Some(index) = def.field_index(field) else {
        return Err(DiagnosticError::BadForm(
            BadForm {
                form: "get-field".into(),
                message: format!("'{record}' has no field '{field}'"),
            },
            span.clone(),
        ));
    };
    let field_ty = def.field_type(field).cloned().unwrap_or(Type::Int32);
    let field_ptr = cg.gep_field(&record, &base, index, &field_ty);
    let id = cg.ir.fresh_temp();
    cg.ir.emit_body(format!(
        "  %t{id} = load {}, {}* {}",
        field_ty.llvm_name(),
        field_ty.llvm_name(),
        field_ptr.operand()
    ));
    Ok(Value::temp(id, field_ty))
}

fn compile_bitcast(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<Value, DiagnosticError> {
    let ty_node = items
        .get(1)
        .ok_or_else(|| bad_form("bitcast", "expected a target type", span))?;
    let expr_node = items
        .get(2)
        .ok_or_else(|| bad_form("bitcast", "expected an expression", span))?;
    let target = cg.types.parse_type_node(ty_node);
    let value = compile_expr(cg, expr_node)?;
    // Unconditional, per spec's open question #1: any source type is
    // accepted, matching the original `maybe_bitcast`/`cg_bitcast_impl`.
    let id = cg.ir.fresh_temp();
    cg.ir.emit_body(format!(
        "  %t{id} = bitcast {} {} to {}",
        value.ty.llvm_name(),
        value.operand(),
        target.llvm_name()
    ));
    Ok(Value::temp(id, target))
}

fn compile_arith(
    cg: &mut FunctionCodegen,
    op: &str,
    items: &[Node],
    span: &Span,
) -> Result<Value, DiagnosticError> {
    let lhs = compile_expr(cg, items.get(1).ok_or_else(|| bad_form(op, "expected lhs", span))?)?;
    let rhs = compile_expr(cg, items.get(2).ok_or_else(|| bad_form(op, "expected rhs", span))?)?;
    let lhs = cg.ensure_type(lhs, &Type::Int32, op, span)?;
    let rhs = cg.ensure_type(rhs, &Type::Int32, op, span)?;
    let instr = match op {
        "+" => "add",
        "-" => "sub",
        "*" => "mul",
        "/" => "sdiv",
        _ => unreachable!(),
    };
    let id = cg.ir.fresh_temp();
    cg.ir.emit_body(format!(
        "  %t{id} = {instr} i32 {}, {}",
        lhs.operand(),
        rhs.operand()
    ));
    Ok(Value::temp(id, Type::Int32))
}

fn compile_compare(
    cg: &mut FunctionCodegen,
    op: &str,
    items: &[Node],
    span: &Span,
) -> Result<Value, DiagnosticError> {
    let lhs = compile_expr(cg, items.get(1).ok_or_else(|| bad_form(op, "expected lhs", span))?)?;
    let rhs = compile_expr(cg, items.get(2).ok_or_else(|| bad_form(op, "expected rhs", span))?)?;
    let pointer_cmp = lhs.ty.is_pointer_like() || rhs.ty.is_pointer_like();
    let (lhs, rhs, llvm_ty) = if pointer_cmp {
        let lhs = cg.ensure_type(lhs, &Type::PointerToByte, op, span)?;
        let rhs = cg.ensure_type(rhs, &Type::PointerToByte, op, span)?;
        (lhs, rhs, "i8*".to_string())
    } else {
        let lhs = cg.ensure_type(lhs, &Type::Int32, op, span)?;
        let rhs = cg.ensure_type(rhs, &Type::Int32, op, span)?;
        (lhs, rhs, "i32".to_string())
    };
    let cond = match op {
        "==" => "eq",
        "!=" => "ne",
        "<" => "slt",
        "<=" => "sle",
        ">" => "sgt",
        ">=" => "sge",
        _ => unreachable!(),
    };
    let cmp_id = cg.ir.fresh_temp();
    cg.ir.emit_body(format!(
        "  %t{cmp_id} = icmp {cond} {llvm_ty} {}, {}",
        lhs.operand(),
        rhs.operand()
    ));
    let zext_id = cg.ir.fresh_temp();
    cg.ir.emit_body(format!("  %t{zext_id} = zext i1 %t{cmp_id} to i32"));
    Ok(Value::temp(zext_id, Type::Int32))
}

fn compile_logical(
    cg: &mut FunctionCodegen,
    op: &str,
    items: &[Node],
    span: &Span,
) -> Result<Value, DiagnosticError> {
    let lhs = compile_expr(cg, items.get(1).ok_or_else(|| bad_form(op, "expected lhs", span))?)?;
    let rhs = compile_expr(cg, items.get(2).ok_or_else(|| bad_form(op, "expected rhs", span))?)?;
    let lhs = cg.ensure_type(lhs, &Type::Int32, op, span)?;
    let rhs = cg.ensure_type(rhs, &Type::Int32, op, span)?;
    let lhs_bit = cg.ir.fresh_temp();
    cg.ir
        .emit_body(format!("  %t{lhs_bit} = icmp ne i32 {}, 0", lhs.operand()));
    let rhs_bit = cg.ir.fresh_temp();
    cg.ir
        .emit_body(format!("  %t{rhs_bit} = icmp ne i32 {}, 0", rhs.operand()));
    let instr = if op == "&&" { "and" } else { "or" };
    let combined = cg.ir.fresh_temp();
    cg.ir.emit_body(format!(
        "  %t{combined} = {instr} i1 %t{lhs_bit}, %t{rhs_bit}"
    ));
    let zext_id = cg.ir.fresh_temp();
    cg.ir
        .emit_body(format!("  %t{zext_id} = zext i1 %t{combined} to i32"));
    Ok(Value::temp(zext_id, Type::Int32))
}

/// Emits a non-variadic call to `symbol`, returning the placeholder
/// `Int32(0)` value spec section 4.6 prescribes for a `void` result.
pub(crate) fn emit_call(cg: &mut FunctionCodegen, symbol: &str, ret: &Type, args: &[Value]) -> Value {
    let arg_list = args
        .iter()
        .map(|v| format!("{} {}", v.ty.llvm_name(), v.operand()))
        .collect::<Vec<_>>()
        .join(", ");
    if matches!(ret, Type::Void) {
        cg.ir.emit_body(format!("  call void @{symbol}({arg_list})"));
        Value::int_const(0)
    } else {
        let id = cg.ir.fresh_temp();
        cg.ir.emit_body(format!(
            "  %t{id} = call {} @{symbol}({arg_list})",
            ret.llvm_name()
        ));
        Value::temp(id, ret.clone())
    }
}

fn compile_ccall(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<Value, DiagnosticError> {
    let symbol = items
        .get(1)
        .and_then(Node::as_atom)
        .ok_or_else(|| bad_form("ccall", "expected a symbol name", span))?
        .to_string();
    let returns_form = items
        .iter()
        .find(|n| n.head() == Some("returns"))
        .ok_or_else(|| bad_form("ccall", "missing (returns T)", span))?;
    let ret = returns_form
        .nth(1)
        .map(|n| cg.types.parse_type_node(n))
        .unwrap_or(Type::Int32);
    let args_form = items.iter().find(|n| n.head() == Some("args"));
    let arg_nodes = args_form.and_then(Node::as_list).map(|l| &l[1..]).unwrap_or(&[]);

    let mut arg_types = Vec::with_capacity(arg_nodes.len());
    let mut arg_values = Vec::with_capacity(arg_nodes.len());
    for arg in arg_nodes {
        let ty = arg
            .nth(0)
            .map(|n| cg.types.parse_type_node(n))
            .unwrap_or(Type::Int32);
        let expr = arg
            .nth(1)
            .ok_or_else(|| bad_form("ccall", "argument entry missing a value", span))?;
        let value = compile_expr(cg, expr)?;
        let value = cg.ensure_type(value, &ty, "ccall argument", &arg.span)?;
        arg_types.push(ty);
        arg_values.push(value);
    }

    if symbol == "printf" {
        cg.ir
            .declare_extern_once("printf", "declare i32 @printf(i8*, ...)");
        let arg_list = arg_values
            .iter()
            .map(|v| format!("{} {}", v.ty.llvm_name(), v.operand()))
            .collect::<Vec<_>>()
            .join(", ");
        let id = cg.ir.fresh_temp();
        cg.ir.emit_body(format!(
            "  %t{id} = call i32 (i8*, ...) @printf({arg_list})"
        ));
        return Ok(Value::temp(id, Type::Int32));
    }

    let param_list = arg_types.iter().map(Type::llvm_name).collect::<Vec<_>>().join(", ");
    cg.ir.declare_extern_once(
        &symbol,
        &format!("declare {} @{symbol}({param_list})", ret.llvm_name()),
    );
    Ok(emit_call(cg, &symbol, &ret, &arg_values))
}

fn compile_llvm_jit(cg: &mut FunctionCodegen, items: &[Node], span: &Span) -> Result<Value, DiagnosticError> {
    let ir_text = items
        .get(1)
        .and_then(Node::as_str_lit)
        .ok_or_else(|| bad_form("llvm-jit", "expected a literal IR string", span))?;
    let fn_name = items
        .get(2)
        .and_then(Node::as_str_lit)
        .ok_or_else(|| bad_form("llvm-jit", "expected a literal function-name string", span))?;
    let args_form = items
        .get(3)
        .filter(|n| n.head() == Some("args"))
        .ok_or_else(|| bad_form("llvm-jit", "expected (args e1 e2)", span))?;
    let arg_nodes = args_form.as_list().map(|l| &l[1..]).unwrap_or(&[]);
    if arg_nodes.len() != 2 {
        return Err(bad_form("llvm-jit", "expected exactly two arguments", span));
    }

    let ir_value = intern_string(cg.ir, ir_text);
    let name_value = intern_string(cg.ir, fn_name);
    let a1 = compile_expr(cg, &arg_nodes[0])?;
    let a1 = cg.ensure_type(a1, &Type::Int32, "llvm-jit argument", &arg_nodes[0].span)?;
    let a2 = compile_expr(cg, &arg_nodes[1])?;
    let a2 = cg.ensure_type(a2, &Type::Int32, "llvm-jit argument", &arg_nodes[1].span)?;

    cg.ir.declare_extern_once(
        "llvm_jit_call_i32_i32_i32",
        "declare i32 @llvm_jit_call_i32_i32_i32(i8*, i8*, i32, i32)",
    );
    Ok(emit_call(
        cg,
        "llvm_jit_call_i32_i32_i32",
        &Type::Int32,
        &[ir_value, name_value, a1, a2],
    ))
}

fn compile_call(
    cg: &mut FunctionCodegen,
    name: &str,
    arg_nodes: &[Node],
    span: &Span,
    _whole: &Node,
) -> Result<Value, DiagnosticError> {
    let sig = cg.fns.lookup_or_bootstrap(name, arg_nodes.len());
    let mut arg_values = Vec::with_capacity(arg_nodes.len());
    for (i, arg) in arg_nodes.iter().enumerate() {
        let value = compile_expr(cg, arg)?;
        let param_ty = sig.params.get(i).cloned().unwrap_or(Type::Int32);
        let value = cg.ensure_type(value, &param_ty, &format!("call to '{name}', argument {i}"), &arg.span)?;
        arg_values.push(value);
    }
    if EXTERNAL_RUNTIME_FNS.contains(&name) {
        let param_list = sig.params.iter().map(Type::llvm_name).collect::<Vec<_>>().join(", ");
        cg.ir.declare_extern_once(
            name,
            &format!("declare {} @{name}({param_list})", sig.return_type.llvm_name()),
        );
    }
    Ok(emit_call(cg, name, &sig.return_type, &arg_values))
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
