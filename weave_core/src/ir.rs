use std::collections::HashSet;
use std::fmt::Write as _;

/// The four append-only text buffers that make up a module: record type
/// definitions, global constants, extern declarations, and function bodies.
/// Nothing here ever rewrites a previously emitted line - code generation is
/// a single forward pass that only appends, mirroring the fact that the
/// compiler itself makes exactly one pass over the program.
#[derive(Debug, Default)]
pub struct IrContext {
    pub typedefs: String,
    pub globals: String,
    pub extern_decls: String,
    pub function_bodies: String,

    declared_externs: HashSet<String>,
    next_temp: u32,
    next_label: u32,
    next_string_lit: u32,

    /// Name of the function currently being generated, used only to give
    /// diagnostics a `context` to point at.
    pub current_function: String,
}

impl IrContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_temp(&mut self) -> u32 {
        let id = self.next_temp;
        self.next_temp += 1;
        id
    }

    pub fn fresh_label(&mut self) -> u32 {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    pub fn fresh_string_lit_name(&mut self) -> String {
        let id = self.next_string_lit;
        self.next_string_lit += 1;
        format!("@.str{id}")
    }

    pub fn label_ref(id: u32) -> String {
        format!("%L{id}")
    }

    pub fn label_def(id: u32) -> String {
        format!("L{id}:")
    }

    /// Resets the per-function temp/label counters. Called once per function
    /// body so generated names stay small and functions are independent of
    /// each other's size; extern/string-literal counters are module-global
    /// and are not reset.
    pub fn begin_function(&mut self, name: &str) {
        self.next_temp = 0;
        self.next_label = 0;
        self.current_function = name.to_string();
    }

    /// Declares `symbol` in `extern_decls` unless it has already been
    /// declared in this module. Returns whether this call actually emitted
    /// the declaration.
    pub fn declare_extern_once(&mut self, symbol: &str, decl_line: &str) -> bool {
        if !self.declared_externs.insert(symbol.to_string()) {
            return false;
        }
        let _ = writeln!(self.extern_decls, "{decl_line}");
        true
    }

    pub fn emit_body(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.function_bodies, "{}", line.as_ref());
    }

    pub fn emit_typedef(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.typedefs, "{}", line.as_ref());
    }

    pub fn emit_global(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.globals, "{}", line.as_ref());
    }

    /// Concatenates the four buffers in the module's canonical order:
    /// typedefs, globals, extern declarations, then function bodies.
    pub fn assemble(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.typedefs);
        out.push('\n');
        out.push_str(&self.globals);
        out.push('\n');
        out.push_str(&self.extern_decls);
        out.push('\n');
        out.push_str(&self.function_bodies);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temps_and_labels_reset_per_function() {
        let mut ir = IrContext::new();
        assert_eq!(ir.fresh_temp(), 0);
        assert_eq!(ir.fresh_temp(), 1);
        ir.begin_function("other");
        assert_eq!(ir.fresh_temp(), 0);
    }

    #[test]
    fn extern_decls_are_deduplicated() {
        let mut ir = IrContext::new();
        assert!(ir.declare_extern_once("puts", "declare i32 @puts(i8*)"));
        assert!(!ir.declare_extern_once("puts", "declare i32 @puts(i8*)"));
        assert_eq!(ir.extern_decls.matches("@puts").count(), 1);
    }

    #[test]
    fn assemble_orders_the_four_buffers() {
        let mut ir = IrContext::new();
        ir.emit_typedef("%Pair = type { i32, i32 }");
        ir.emit_global("@.str0 = private constant [1 x i8] c\"\\00\"");
        ir.declare_extern_once("malloc", "declare i8* @malloc(i32)");
        ir.emit_body("define i32 @main() { ret i32 0 }");
        let text = ir.assemble();
        let pos_typedef = text.find("%Pair").unwrap();
        let pos_global = text.find("@.str0").unwrap();
        let pos_extern = text.find("@malloc").unwrap();
        let pos_body = text.find("@main").unwrap();
        assert!(pos_typedef < pos_global);
        assert!(pos_global < pos_extern);
        assert!(pos_extern < pos_body);
    }
}
