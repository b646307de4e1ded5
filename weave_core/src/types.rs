use crate::{
    diagnostics::{BadForm, DiagnosticError},
    sexpr::Node,
};

/// A value's type. Structural equality: two `Record`s are equal iff they
/// name the same record, two `Pointer`s iff their pointees are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int32,
    PointerToByte,
    Void,
    Record(String),
    Pointer(Box<Type>),
}

impl Type {
    pub fn pointer(to: Type) -> Type {
        Type::Pointer(Box::new(to))
    }

    /// The string `ensure_type`'s diagnostics and the code generator both use
    /// to name a type to LLVM. `Record(name)` renders bare (`%name`, the
    /// struct's own typedef, no star): a record is a value type, not
    /// implicitly a handle. Every pointer-operand call site (`gep_field`,
    /// `sizeof_record`, `compile_make`'s cast, a `load`/`store`'s address
    /// operand) appends its own star instead of relying on this method to
    /// bake one in. `Pointer(T)` always adds exactly one star on top of
    /// `T`'s own rendering, so `Pointer(Record(name))` comes out `%name*`
    /// with no special-casing needed.
    pub fn llvm_name(&self) -> String {
        match self {
            Type::Int32 => "i32".to_string(),
            Type::PointerToByte => "i8*".to_string(),
            Type::Void => "void".to_string(),
            Type::Record(name) => format!("%{name}"),
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Void => "i8*".to_string(),
                other => format!("{}*", other.llvm_name()),
            },
        }
    }

    /// The bare `%Name` typedef reference (no trailing star), used for the
    /// first, type-only operand of a `getelementptr` and for the
    /// null-pointer `sizeof` trick. `None` unless this type or the type it
    /// points to names a record.
    pub fn bare_record_name(&self) -> Option<&str> {
        match self {
            Type::Record(name) => Some(name),
            Type::Pointer(inner) => inner.bare_record_name(),
            _ => None,
        }
    }

    pub fn is_pointer_like(&self) -> bool {
        matches!(self, Type::Pointer(_) | Type::PointerToByte | Type::Record(_))
    }

    /// Same information, formatted for diagnostics rather than for LLVM.
    pub fn debug_name(&self) -> String {
        match self {
            Type::Int32 => "Int32".to_string(),
            Type::PointerToByte => "PointerToByte".to_string(),
            Type::Void => "Void".to_string(),
            Type::Record(name) => format!("Record({name})"),
            Type::Pointer(inner) => format!("Pointer({})", inner.debug_name()),
        }
    }

    fn names_handle(name: &str) -> bool {
        matches!(name, "String" | "Buffer" | "ArrayString" | "ArrayInt32")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDef {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

impl RecordDef {
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == field)
    }

    pub fn field_type(&self, field: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == field).map(|(_, t)| t)
    }
}

/// Alias table (ordered, last write wins on a repeated name) plus a record
/// table (ordered, one definition per name). Lookups are independent: an
/// alias and a record may not share a name, but nothing here enforces that
/// - the signature/type collector is responsible for rejecting it.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    aliases: Vec<(String, Type)>,
    records: Vec<RecordDef>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_alias(&mut self, name: impl Into<String>, ty: Type) {
        let name = name.into();
        if let Some(slot) = self.aliases.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = ty;
        } else {
            self.aliases.push((name, ty));
        }
    }

    pub fn add_record(&mut self, def: RecordDef) {
        if let Some(slot) = self.records.iter_mut().find(|r| r.name == def.name) {
            *slot = def;
        } else {
            self.records.push(def);
        }
    }

    pub fn resolve_alias(&self, name: &str) -> Option<&Type> {
        self.aliases.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn find_record(&self, name: &str) -> Option<&RecordDef> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn records_in_order(&self) -> &[RecordDef] {
        &self.records
    }

    /// Emits one `%Name = type { ... }` line per record into `ir`'s
    /// typedef buffer, in declaration order (testable property #4: field
    /// order in the struct body always matches declaration order).
    pub fn emit_typedefs(&self, ir: &mut crate::ir::IrContext) {
        for record in &self.records {
            let fields = record
                .fields
                .iter()
                .map(|(_, ty)| ty.llvm_name())
                .collect::<Vec<_>>()
                .join(", ");
            ir.emit_typedef(format!("%{} = type {{ {} }}", record.name, fields));
        }
    }

    /// Parses a type-position node: an atom (`Int32`, `Void`, an opaque
    /// handle name mapped straight to `PointerToByte`, an alias, or else an
    /// as-yet-unseen record name), or a `(ptr T)` / `(struct Name)` list.
    /// A malformed node is an internal-invariant bug upstream, not a user
    /// error, so this defensively repairs to `Int32` rather than panicking.
    pub fn parse_type_node(&self, node: &Node) -> Type {
        if let Some(atom) = node.as_atom() {
            return self.parse_type_atom(atom);
        }
        if let Some(items) = node.as_list() {
            match items.first().and_then(Node::as_atom) {
                Some("ptr") => {
                    let inner = items
                        .get(1)
                        .map(|n| self.parse_type_node(n))
                        .unwrap_or(Type::Void);
                    return Type::pointer(inner);
                }
                Some("struct") => {
                    let name = items
                        .get(1)
                        .and_then(Node::as_atom)
                        .unwrap_or("Int32")
                        .to_string();
                    return Type::Record(name);
                }
                _ => {}
            }
        }
        Type::Int32
    }

    fn parse_type_atom(&self, atom: &str) -> Type {
        match atom {
            "Int32" => Type::Int32,
            "Void" => Type::Void,
            name if Type::names_handle(name) => Type::PointerToByte,
            name => {
                if let Some(ty) = self.resolve_alias(name) {
                    ty.clone()
                } else {
                    Type::Record(name.to_string())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::parse_source;

    fn type_of(env: &TypeEnv, src: &str) -> Type {
        let top = parse_source("t", src).unwrap();
        env.parse_type_node(&top.as_list().unwrap()[0])
    }

    #[test]
    fn parses_primitive_atoms() {
        let env = TypeEnv::new();
        assert_eq!(type_of(&env, "Int32"), Type::Int32);
        assert_eq!(type_of(&env, "Void"), Type::Void);
    }

    #[test]
    fn opaque_handles_are_pointer_to_byte() {
        let env = TypeEnv::new();
        assert_eq!(type_of(&env, "String"), Type::PointerToByte);
        assert_eq!(type_of(&env, "Buffer"), Type::PointerToByte);
    }

    #[test]
    fn unknown_atom_is_a_record_name() {
        let env = TypeEnv::new();
        assert_eq!(type_of(&env, "Pair"), Type::Record("Pair".into()));
    }

    #[test]
    fn ptr_and_struct_forms() {
        let env = TypeEnv::new();
        assert_eq!(
            type_of(&env, "(ptr Int32)"),
            Type::Pointer(Box::new(Type::Int32))
        );
        assert_eq!(
            type_of(&env, "(struct Pair)"),
            Type::Record("Pair".into())
        );
    }

    #[test]
    fn alias_resolves_through_the_table() {
        let mut env = TypeEnv::new();
        env.add_alias("Handle", Type::PointerToByte);
        assert_eq!(type_of(&env, "Handle"), Type::PointerToByte);
    }

    #[test]
    fn record_renders_bare_pointer_to_record_gains_one_star() {
        assert_eq!(Type::Record("Pair".into()).llvm_name(), "%Pair");
        assert_eq!(
            Type::pointer(Type::Record("Pair".into())).llvm_name(),
            "%Pair*"
        );
    }

    #[test]
    fn emits_typedefs_in_declaration_order() {
        let mut env = TypeEnv::new();
        env.add_record(RecordDef {
            name: "Pair".into(),
            fields: vec![("x".into(), Type::Int32), ("y".into(), Type::Int32)],
        });
        let mut ir = crate::ir::IrContext::new();
        env.emit_typedefs(&mut ir);
        assert_eq!(ir.typedefs.trim(), "%Pair = type { i32, i32 }");
    }

    #[test]
    fn structural_equality_ignores_identity() {
        assert_eq!(
            Type::Record("Pair".into()),
            Type::Record("Pair".into())
        );
        assert_eq!(
            Type::pointer(Type::Int32),
            Type::pointer(Type::Int32)
        );
    }
}
