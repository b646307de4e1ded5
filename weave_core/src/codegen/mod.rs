//! Expression and statement code generation (spec sections 4.6/4.7).
//!
//! [`FunctionCodegen`] is the per-function generation state: the shared
//! [`IrContext`] buffers, the read-only [`TypeEnv`]/[`FnTable`] built before
//! any body is compiled, a fresh [`VarEnv`] for this function's locals, and
//! the function's declared return type (needed by `(return e)` and by the
//! implicit-return rule at the end of the body). It is created once per
//! function and dropped when that function's body finishes emitting,
//! mirroring the lifecycle spec section 3 describes for `VarEnv`.

pub mod expressions;
pub mod function;
pub mod statements;

use crate::{
    diagnostics::{DiagnosticError, TypeMismatch},
    env::VarEnv,
    ir::IrContext,
    sig::FnTable,
    span::Span,
    types::{Type, TypeEnv},
    value::{Value, ValueKind},
};

pub struct FunctionCodegen<'a> {
    pub ir: &'a mut IrContext,
    pub types: &'a TypeEnv,
    pub fns: &'a FnTable,
    pub vars: VarEnv,
    pub return_type: Type,
}

impl<'a> FunctionCodegen<'a> {
    /// The single coercion routine every implicit conversion in the
    /// language goes through. Exactly the four bridges spec section 4.6
    /// lists; anything else is a fatal [`DiagnosticError::TypeMismatch`]
    /// naming the current function, `context`, and both types.
    pub fn ensure_type(
        &mut self,
        value: Value,
        to: &Type,
        context: &str,
        span: &Span,
    ) -> Result<Value, DiagnosticError> {
        if &value.ty == to {
            return Ok(value);
        }
        match (&value.ty, to) {
            (Type::Int32, Type::PointerToByte)
                if matches!(value.kind, ValueKind::IntConst(0)) =>
            {
                Ok(Value::null(Type::PointerToByte))
            }
            (from, Type::PointerToByte) if from.is_pointer_like() => {
                let id = self.ir.fresh_temp();
                self.ir.emit_body(format!(
                    "  %t{id} = bitcast {} {} to i8*",
                    from.llvm_name(),
                    value.operand()
                ));
                Ok(Value::temp(id, Type::PointerToByte))
            }
            (from, Type::Int32) if from.is_pointer_like() => {
                let id = self.ir.fresh_temp();
                self.ir.emit_body(format!(
                    "  %t{id} = ptrtoint {} {} to i32",
                    from.llvm_name(),
                    value.operand()
                ));
                Ok(Value::temp(id, Type::Int32))
            }
            _ => Err(DiagnosticError::TypeMismatch(
                TypeMismatch {
                    function: self.ir.current_function.clone(),
                    context: context.to_string(),
                    wanted: to.debug_name(),
                    got: value.ty.debug_name(),
                },
                span.clone(),
            )),
        }
    }

    /// Materializes a fresh stack slot of type `ty` and returns its
    /// sanitized SSA name, emitting the `alloca`. Used by `let`, by
    /// function-prologue parameter slots, and by test `setup` bindings.
    pub fn alloca(&mut self, ssa_name: &str, ty: &Type) {
        self.ir
            .emit_body(format!("  %{ssa_name} = alloca {}", ty.llvm_name()));
    }

    pub fn store(&mut self, ty: &Type, value: &Value, ssa_name: &str) {
        self.ir.emit_body(format!(
            "  store {} {}, {}* %{ssa_name}",
            ty.llvm_name(),
            value.operand(),
            ty.llvm_name()
        ));
    }

    pub fn load(&mut self, ty: &Type, ssa_name: &str) -> Value {
        let id = self.ir.fresh_temp();
        self.ir.emit_body(format!(
            "  %t{id} = load {}, {}* %{ssa_name}",
            ty.llvm_name(),
            ty.llvm_name()
        ));
        Value::temp(id, ty.clone())
    }

    /// `getelementptr` to index `index` of the record named `record` through
    /// pointer operand `base`, as used by `get-field`/`set-field` and by the
    /// field stores inside `make`.
    pub fn gep_field(&mut self, record: &str, base: &Value, index: usize, field_ty: &Type) -> Value {
        let id = self.ir.fresh_temp();
        self.ir.emit_body(format!(
            "  %t{id} = getelementptr %{record}, %{record}* {}, i32 0, i32 {index}",
            base.operand()
        ));
        Value::temp(id, Type::pointer(field_ty.clone()))
    }

    /// The null-GEP `sizeof` trick: `getelementptr T, T* null, i32 1` then
    /// `ptrtoint` to `i32`, used by `make` to size its `malloc` call without
    /// a dedicated `sizeof` instruction in this dialect of LLVM IR.
    pub fn sizeof_record(&mut self, record: &str) -> Value {
        let gep_id = self.ir.fresh_temp();
        self.ir.emit_body(format!(
            "  %t{gep_id} = getelementptr %{record}, %{record}* null, i32 1"
        ));
        let size_id = self.ir.fresh_temp();
        self.ir.emit_body(format!(
            "  %t{size_id} = ptrtoint %{record}* %t{gep_id} to i32"
        ));
        Value::temp(size_id, Type::Int32)
    }
}
