use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Local,
    Parameter,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub ssa_name: String,
    pub kind: BindingKind,
    pub ty: Type,
}

/// Replaces every character an LLVM identifier can't carry with `_`, so a
/// source name like `my-var!` becomes a valid (if ugly) SSA name fragment.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// A scoped stack of variable bindings. Lookup scans from the most recently
/// pushed binding backwards, so an inner `let` shadows an outer one of the
/// same name without removing it - popping the inner scope reveals the outer
/// binding again.
#[derive(Debug, Default)]
pub struct VarEnv {
    bindings: Vec<Binding>,
    scope_marks: Vec<usize>,
    next_index: u32,
}

impl VarEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&mut self) {
        self.scope_marks.push(self.bindings.len());
    }

    pub fn exit_scope(&mut self) {
        if let Some(mark) = self.scope_marks.pop() {
            self.bindings.truncate(mark);
        }
    }

    fn make_ssa_name(&mut self, name: &str) -> String {
        let index = self.next_index;
        self.next_index += 1;
        format!("v_{}_{}", sanitize_name(name), index)
    }

    fn add(&mut self, name: &str, kind: BindingKind, ty: Type) -> String {
        let ssa_name = self.make_ssa_name(name);
        self.bindings.push(Binding {
            name: name.to_string(),
            ssa_name: ssa_name.clone(),
            kind,
            ty,
        });
        ssa_name
    }

    pub fn add_local(&mut self, name: &str, ty: Type) -> String {
        self.add(name, BindingKind::Local, ty)
    }

    pub fn add_parameter(&mut self, name: &str, ty: Type) -> String {
        self.add(name, BindingKind::Parameter, ty)
    }

    pub fn find(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().rev().find(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssa_names_are_unique_even_for_the_same_source_name() {
        let mut env = VarEnv::new();
        let a = env.add_local("x", Type::Int32);
        let b = env.add_local("x", Type::Int32);
        assert_ne!(a, b);
    }

    #[test]
    fn inner_scope_shadows_then_reveals_outer() {
        let mut env = VarEnv::new();
        env.add_local("x", Type::Int32);
        env.enter_scope();
        let inner = env.add_local("x", Type::PointerToByte);
        assert_eq!(env.find("x").unwrap().ssa_name, inner);
        env.exit_scope();
        assert_eq!(env.find("x").unwrap().ty, Type::Int32);
    }

    #[test]
    fn sanitizes_non_identifier_characters() {
        let mut env = VarEnv::new();
        let ssa = env.add_local("my-var!", Type::Int32);
        assert_eq!(ssa, "v_my_var__0");
    }
}
