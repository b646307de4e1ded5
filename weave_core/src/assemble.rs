//! Assembles a fully include-resolved program into one LLVM IR module
//! (spec section 5): type collection, signature collection, one
//! [`crate::codegen::function::compile_function`] call per declared function,
//! and, in test mode, the [`crate::testgen`] pass instead of the program's
//! own `entry`.

use crate::{
    codegen::function::compile_function,
    diagnostics::DiagnosticError,
    ir::IrContext,
    sexpr::Node,
    sig::{collect_signatures, collect_type_env},
    testgen::{self, TestModeOptions},
};

pub struct AssembleOptions {
    pub test_mode: Option<TestModeOptions>,
}

impl AssembleOptions {
    pub fn normal() -> Self {
        AssembleOptions { test_mode: None }
    }
}

/// One compiled module: the assembled IR text plus, in test mode, the list
/// of test names that were actually selected (for `-list-tests` and for
/// the CLI's summary once the binary runs).
pub struct AssembledModule {
    pub ir: String,
    pub test_names: Vec<String>,
}

/// Builds the module from an already include-merged top-level form list
/// (spec section 5's "Program assembly" steps 1-5).
pub fn assemble(forms: &[Node], options: &AssembleOptions) -> Result<AssembledModule, DiagnosticError> {
    let types = collect_type_env(forms);
    let (mut fns, decls) = collect_signatures(forms, &types)?;
    fns.install_builtins();

    let mut ir = IrContext::new();
    types.emit_typedefs(&mut ir);
    emit_arena_constructor(&mut ir);

    let test_names = match &options.test_mode {
        Some(test_opts) => {
            for decl in decls.iter().filter(|d| !d.is_entry) {
                compile_function(&mut ir, &types, &fns, decl)?;
            }
            let selected = testgen::generate(&mut ir, &types, &fns, &decls, test_opts)?;
            selected.iter().map(|t| t.test.name.clone()).collect()
        }
        None => {
            for decl in &decls {
                compile_function(&mut ir, &types, &fns, decl)?;
            }
            Vec::new()
        }
    };

    Ok(AssembledModule {
        ir: ir.assemble(),
        test_names,
    })
}

/// The arena constructor is always present, whether or not anything in the
/// program calls `arena-new` (spec section 5): a four-field record, each
/// field a null `i8*`, allocated with the same null-GEP `sizeof` trick the
/// code generator uses for `make`.
fn emit_arena_constructor(ir: &mut IrContext) {
    ir.emit_typedef("%Arena = type { i8*, i8*, i8*, i8* }");
    ir.declare_extern_once("malloc", "declare i8* @malloc(i32)");

    ir.begin_function("arena-new");
    ir.emit_body("define %Arena* @arena-new() {");
    ir.emit_body("entry:");
    let gep_id = ir.fresh_temp();
    ir.emit_body(format!("  %t{gep_id} = getelementptr %Arena, %Arena* null, i32 1"));
    let size_id = ir.fresh_temp();
    ir.emit_body(format!("  %t{size_id} = ptrtoint %Arena* %t{gep_id} to i32"));
    let raw_id = ir.fresh_temp();
    ir.emit_body(format!("  %t{raw_id} = call i8* @malloc(i32 %t{size_id})"));
    let cast_id = ir.fresh_temp();
    ir.emit_body(format!("  %t{cast_id} = bitcast i8* %t{raw_id} to %Arena*"));
    for i in 0..4 {
        let field_id = ir.fresh_temp();
        ir.emit_body(format!(
            "  %t{field_id} = getelementptr %Arena, %Arena* %t{cast_id}, i32 0, i32 {i}"
        ));
        ir.emit_body(format!("  store i8* null, i8** %t{field_id}"));
    }
    ir.emit_body(format!("  ret %Arena* %t{cast_id}"));
    ir.emit_body("}");
}

/// Lists every test name eligible under `options` without emitting any IR -
/// backs the CLI's `-list-tests` flag (spec section 6.2).
pub fn list_tests(forms: &[Node], options: &TestModeOptions) -> Result<Vec<String>, DiagnosticError> {
    let types = collect_type_env(forms);
    let (_, decls) = collect_signatures(forms, &types)?;
    Ok(testgen::eligible_tests(&decls, options)
        .into_iter()
        .map(|t| t.test.name.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::parse_source;

    fn forms(src: &str) -> Vec<Node> {
        parse_source("t", src).unwrap().as_list().unwrap().to_vec()
    }

    #[test]
    fn assembles_entry_only_program() {
        let forms = forms("(entry main (params) (returns Int32) (body (return 0)))");
        let module = assemble(&forms, &AssembleOptions::normal()).unwrap();
        assert!(module.ir.contains("define i32 @main()"));
        assert!(module.ir.contains("define %Arena* @arena-new()"));
        assert!(module.ir.contains("%Arena = type { i8*, i8*, i8*, i8* }"));
        assert!(module.test_names.is_empty());
    }

    #[test]
    fn test_mode_replaces_entry_with_synthetic_main() {
        let forms = forms(
            "(entry main (params) (returns Int32) (body (return 0))) \
             (fn add (params (a Int32) (b Int32)) (returns Int32) (body (return (+ a b))) \
             (tests (test sums_two_numbers (body (expect-eq (add 2 3) 5)))))",
        );
        let module = assemble(&forms, &AssembleOptions { test_mode: Some(TestModeOptions::all()) }).unwrap();
        assert!(module.ir.contains("@__test_add_0"));
        assert!(module.ir.contains("Running test: sums_two_numbers"));
        assert_eq!(module.test_names, vec!["sums_two_numbers".to_string()]);
    }

    #[test]
    fn list_tests_does_not_emit_ir() {
        let forms = forms(
            "(fn add (params (a Int32) (b Int32)) (returns Int32) (body (return (+ a b))) \
             (tests (test t (tags (fast)) (body (expect-eq (add 2 3) 5)))))",
        );
        let names = list_tests(&forms, &TestModeOptions::all()).unwrap();
        assert_eq!(names, vec!["t".to_string()]);
    }
}
