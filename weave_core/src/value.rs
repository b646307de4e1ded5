use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    IntConst(i32),
    Temp(u32),
    NamedSsa(String),
    /// The LLVM `null` constant. Kept distinct from `IntConst(0)` so
    /// `operand()` never has to guess, from the type alone, whether a zero
    /// means the integer zero or the null pointer `ensure_type` coerced it
    /// into.
    Null,
}

/// Anything code generation can hand back to its caller: a constant, a
/// fresh SSA temporary, or a named SSA value (a parameter/local's slot, or
/// a global). `is_pointer` tracks whether the LLVM-level operand is itself
/// a pointer (as opposed to `ty` being `Pointer(_)`, which instead says
/// "the *value this points to* is a pointer") - they coincide for most
/// expressions but diverge for addresses-of-locals, which is why both
/// fields exist separately rather than deriving one from the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub kind: ValueKind,
    pub ty: Type,
    pub is_pointer: bool,
    pub is_const: bool,
}

impl Value {
    pub fn int_const(n: i32) -> Self {
        Value {
            kind: ValueKind::IntConst(n),
            ty: Type::Int32,
            is_pointer: false,
            is_const: true,
        }
    }

    pub fn temp(id: u32, ty: Type) -> Self {
        Value {
            kind: ValueKind::Temp(id),
            ty,
            is_pointer: false,
            is_const: false,
        }
    }

    pub fn named(name: impl Into<String>, ty: Type, is_pointer: bool) -> Self {
        Value {
            kind: ValueKind::NamedSsa(name.into()),
            ty,
            is_pointer,
            is_const: false,
        }
    }

    pub fn null(ty: Type) -> Self {
        Value {
            kind: ValueKind::Null,
            ty,
            is_pointer: true,
            is_const: true,
        }
    }

    /// How this value is written as an LLVM operand (the bit after the type).
    pub fn operand(&self) -> String {
        match &self.kind {
            ValueKind::IntConst(n) => n.to_string(),
            ValueKind::Temp(id) => format!("%t{id}"),
            ValueKind::NamedSsa(name) => format!("%{name}"),
            ValueKind::Null => "null".to_string(),
        }
    }
}
