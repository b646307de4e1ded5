//! Function-signature collection (spec section "Signature collector").
//!
//! Two passes over the include-merged top list: [`crate::types::TypeEnv`]
//! collects every `(type ...)` form first, then this module walks the same
//! list again collecting `(fn ...)` / `(entry ...)` forms into a [`FnTable`]
//! and a parallel `Vec<FnDecl>` that the code generator later compiles body
//! by body. Builtin signatures are installed as a second, overlaid table
//! rather than written destructively into the user table, so a builtin name
//! always wins without ever discarding what the user wrote.

use crate::{
    diagnostics::{DiagnosticError, MissingTests},
    sexpr::Node,
    span::Span,
    types::{RecordDef, Type, TypeEnv},
};

#[derive(Debug, Clone)]
pub struct FnSig {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Type>,
}

/// One `test` entry inside a `fn`'s `(tests ...)` section.
#[derive(Debug, Clone)]
pub struct TestDecl {
    pub name: String,
    pub tags: Vec<String>,
    pub setup: Vec<Node>,
    /// `inspect` statements if present, else `body` statements; spec 4.8
    /// treats the two as interchangeable with `inspect` preferred.
    pub assertions: Vec<Node>,
    pub span: Span,
}

/// A collected, not-yet-compiled function or entry point.
#[derive(Debug, Clone)]
pub struct FnDecl {
    /// The name as emitted into IR; `entry`'s name is always `main`.
    pub name: String,
    /// The name as written in source, used for diagnostics and for the
    /// `__test_<fn>_<n>` symbol the test generator derives.
    pub source_name: String,
    pub is_entry: bool,
    pub params: Vec<(String, Type)>,
    pub return_type: Type,
    pub body: Vec<Node>,
    pub tests: Vec<TestDecl>,
    pub span: Span,
}

/// `FnTable::lookup` checks the builtin table first and the user table
/// second - an explicit two-layer overlay (spec section 9's redesign flag)
/// replacing the original's destructive "collect user signatures, then
/// clobber with builtins" overwrite.
#[derive(Debug, Default)]
pub struct FnTable {
    user: Vec<FnSig>,
    builtin: Vec<FnSig>,
}

impl FnTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_user(&mut self, sig: FnSig) {
        if let Some(slot) = self.user.iter_mut().find(|s| s.name == sig.name) {
            *slot = sig;
        } else {
            self.user.push(sig);
        }
    }

    /// Installs the fixed set of runtime/JIT/arena signatures. Called once,
    /// after every user `fn`/`entry` has been collected.
    pub fn install_builtins(&mut self) {
        self.builtin = vec![
            FnSig {
                name: "arena-new".into(),
                return_type: Type::pointer(Type::Record("Arena".into())),
                params: vec![],
            },
            FnSig {
                name: "malloc".into(),
                return_type: Type::PointerToByte,
                params: vec![Type::Int32],
            },
            FnSig {
                name: "puts".into(),
                return_type: Type::Int32,
                params: vec![Type::PointerToByte],
            },
            FnSig {
                name: "weave_string_eq".into(),
                return_type: Type::Int32,
                params: vec![Type::PointerToByte, Type::PointerToByte],
            },
            FnSig {
                name: "llvm_jit_call_i32_i32_i32".into(),
                return_type: Type::Int32,
                params: vec![Type::PointerToByte, Type::PointerToByte, Type::Int32, Type::Int32],
            },
            FnSig {
                name: "llvm_compile_ir_to_assembly".into(),
                return_type: Type::Int32,
                params: vec![Type::PointerToByte, Type::PointerToByte, Type::Int32],
            },
            FnSig {
                name: "llvm_compile_ir_to_object".into(),
                return_type: Type::Int32,
                params: vec![Type::PointerToByte, Type::PointerToByte, Type::Int32],
            },
            FnSig {
                name: "llvm_link_objects".into(),
                return_type: Type::Int32,
                params: vec![Type::PointerToByte, Type::PointerToByte, Type::PointerToByte],
            },
        ];
    }

    /// An unknown callee resolves to `(Int32, params coerced to Int32)`,
    /// spec section 3's "bootstrap flexibility" contract - not a promise
    /// that the call will succeed at link time, just that the compiler
    /// does not refuse to emit it.
    pub fn lookup(&self, name: &str) -> Option<&FnSig> {
        self.builtin
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.user.iter().find(|s| s.name == name))
    }

    pub fn lookup_or_bootstrap(&self, name: &str, arg_count: usize) -> FnSig {
        self.lookup(name).cloned().unwrap_or_else(|| FnSig {
            name: name.to_string(),
            return_type: Type::Int32,
            params: vec![Type::Int32; arg_count],
        })
    }
}

fn children_of<'a>(form: &'a Node, head: &str) -> &'a [Node] {
    form.as_list()
        .filter(|items| items.first().and_then(Node::as_atom) == Some(head))
        .map(|items| &items[1..])
        .unwrap_or(&[])
}

/// Pass 1: walks the merged top list (recursing into `module`/`program`
/// groupings) collecting every `(type ...)` form into a fresh [`TypeEnv`].
pub fn collect_type_env(forms: &[Node]) -> TypeEnv {
    let mut env = TypeEnv::new();
    collect_types_into(forms, &mut env);
    env
}

fn collect_types_into(forms: &[Node], env: &mut TypeEnv) {
    for form in forms {
        match form.head() {
            Some("module") | Some("program") => {
                if let Some(items) = form.as_list() {
                    collect_types_into(&items[1..], env);
                }
            }
            Some("type") => collect_one_type(form, env),
            _ => {}
        }
    }
}

fn collect_one_type(form: &Node, env: &mut TypeEnv) {
    let Some(name) = form.nth(1).and_then(Node::as_atom) else {
        return;
    };
    let Some(body) = form.nth(2) else { return };
    match body.head() {
        Some("alias") => {
            let ty = body
                .nth(1)
                .map(|n| env.parse_type_node(n))
                .unwrap_or(Type::Int32);
            env.add_alias(name, ty);
        }
        Some("struct") => {
            let fields = body
                .as_list()
                .map(|items| &items[1..])
                .unwrap_or(&[])
                .iter()
                .filter_map(|field| {
                    let fname = field.nth(0).and_then(Node::as_atom)?;
                    let fty = field
                        .nth(1)
                        .map(|n| env.parse_type_node(n))
                        .unwrap_or(Type::Int32);
                    Some((fname.to_string(), fty))
                })
                .collect();
            env.add_record(RecordDef {
                name: name.to_string(),
                fields,
            });
        }
        _ => {}
    }
}

/// Pass 2: walks the same list collecting `(fn ...)` / `(entry ...)` forms.
/// Fails with [`crate::diagnostics::DiagnosticError::MissingTests`] for any
/// non-entry `fn` lacking a non-empty `(tests ...)` section.
pub fn collect_signatures(
    forms: &[Node],
    types: &TypeEnv,
) -> Result<(FnTable, Vec<FnDecl>), DiagnosticError> {
    let mut table = FnTable::new();
    let mut decls = Vec::new();
    collect_fns_into(forms, types, &mut table, &mut decls)?;
    Ok((table, decls))
}

fn collect_fns_into(
    forms: &[Node],
    types: &TypeEnv,
    table: &mut FnTable,
    decls: &mut Vec<FnDecl>,
) -> Result<(), DiagnosticError> {
    for form in forms {
        match form.head() {
            Some("module") | Some("program") => {
                if let Some(items) = form.as_list() {
                    collect_fns_into(&items[1..], types, table, decls)?;
                }
            }
            Some("fn") => decls.push(collect_one_fn(form, types, false)?),
            Some("entry") => decls.push(collect_one_fn(form, types, true)?),
            _ => {}
        }
    }
    for decl in decls.iter() {
        table.add_user(FnSig {
            name: decl.name.clone(),
            return_type: decl.return_type.clone(),
            params: decl.params.iter().map(|(_, t)| t.clone()).collect(),
        });
    }
    Ok(())
}

fn parse_params(node: Option<&Node>, types: &TypeEnv) -> Vec<(String, Type)> {
    let Some(items) = node.and_then(Node::as_list) else {
        return Vec::new();
    };
    items[1..]
        .iter()
        .filter_map(|p| {
            let name = p.nth(0).and_then(Node::as_atom)?;
            let ty = p
                .nth(1)
                .map(|n| types.parse_type_node(n))
                .unwrap_or(Type::Int32);
            Some((name.to_string(), ty))
        })
        .collect()
}

fn parse_returns(node: Option<&Node>, types: &TypeEnv) -> Type {
    node.and_then(|n| n.nth(1))
        .map(|n| types.parse_type_node(n))
        .unwrap_or(Type::Int32)
}

fn parse_tests_section(form: &Node) -> Vec<TestDecl> {
    let Some(tests_form) = form
        .as_list()
        .and_then(|items| items.iter().find(|n| n.head() == Some("tests")))
    else {
        return Vec::new();
    };
    children_of(tests_form, "tests")
        .iter()
        .map(parse_one_test)
        .collect()
}

fn parse_one_test(test: &Node) -> TestDecl {
    let name = test
        .nth(1)
        .and_then(Node::as_atom)
        .unwrap_or("test")
        .to_string();
    let mut tags = Vec::new();
    let mut setup = Vec::new();
    let mut inspect = Vec::new();
    let mut body = Vec::new();
    if let Some(items) = test.as_list() {
        for item in &items[2..] {
            match item.head() {
                Some("tags") => tags.extend(
                    children_of(item, "tags")
                        .iter()
                        .filter_map(Node::as_atom)
                        .map(str::to_string),
                ),
                Some("setup") => setup.extend(children_of(item, "setup").to_vec()),
                Some("inspect") => inspect.extend(children_of(item, "inspect").to_vec()),
                Some("body") => body.extend(children_of(item, "body").to_vec()),
                _ => {}
            }
        }
    }
    let assertions = if !inspect.is_empty() { inspect } else { body };
    TestDecl {
        name,
        tags,
        setup,
        assertions,
        span: test.span.clone(),
    }
}

fn collect_one_fn(form: &Node, types: &TypeEnv, is_entry: bool) -> Result<FnDecl, DiagnosticError> {
    let source_name = form
        .nth(1)
        .and_then(Node::as_atom)
        .unwrap_or("<anonymous>")
        .to_string();
    let name = if is_entry {
        "main".to_string()
    } else {
        source_name.clone()
    };

    // `(doc "...")` between the name and `params` is optional; skip it.
    let mut idx = 2;
    if form.nth(idx).map(|n| n.head() == Some("doc")).unwrap_or(false) {
        idx += 1;
    }
    let params_node = form.nth(idx);
    let returns_node = form.nth(idx + 1);
    let body_node = form.nth(idx + 2);

    let params = parse_params(params_node, types);
    let return_type = parse_returns(returns_node, types);
    let body = body_node
        .and_then(Node::as_list)
        .map(|items| items[1..].to_vec())
        .unwrap_or_default();
    let tests = parse_tests_section(form);

    if !is_entry {
        let has_tests_form = form
            .as_list()
            .map(|items| items.iter().any(|n| n.head() == Some("tests")))
            .unwrap_or(false);
        if !has_tests_form || tests.is_empty() {
            return Err(DiagnosticError::MissingTests(
                MissingTests {
                    function: source_name,
                },
                form.span.clone(),
            ));
        }
    }

    Ok(FnDecl {
        name,
        source_name,
        is_entry,
        params,
        return_type,
        body,
        tests,
        span: form.span.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::parse_source;

    fn forms(src: &str) -> Vec<Node> {
        parse_source("t", src).unwrap().as_list().unwrap().to_vec()
    }

    #[test]
    fn entry_is_renamed_to_main() {
        let forms = forms("(entry e (params) (returns Int32) (body (return 0)))");
        let types = collect_type_env(&forms);
        let (_, decls) = collect_signatures(&forms, &types).unwrap();
        assert_eq!(decls[0].name, "main");
        assert!(decls[0].is_entry);
    }

    #[test]
    fn fn_without_tests_is_an_error() {
        let forms = forms("(fn f (params) (returns Int32) (body (return 0)))");
        let types = collect_type_env(&forms);
        let err = collect_signatures(&forms, &types).unwrap_err();
        assert!(matches!(err, DiagnosticError::MissingTests(..)));
    }

    #[test]
    fn fn_with_empty_tests_is_an_error() {
        let forms = forms(
            "(fn f (params) (returns Int32) (body (return 0)) (tests))",
        );
        let types = collect_type_env(&forms);
        let err = collect_signatures(&forms, &types).unwrap_err();
        assert!(matches!(err, DiagnosticError::MissingTests(..)));
    }

    #[test]
    fn fn_with_tests_is_collected_with_params_and_return() {
        let forms = forms(
            "(fn add (params (a Int32) (b Int32)) (returns Int32) (body (return (+ a b))) \
             (tests (test t (body (expect-eq (add 2 3) 5)))))",
        );
        let types = collect_type_env(&forms);
        let (table, decls) = collect_signatures(&forms, &types).unwrap();
        assert_eq!(decls[0].params.len(), 2);
        let sig = table.lookup("add").unwrap();
        assert_eq!(sig.params, vec![Type::Int32, Type::Int32]);
        assert_eq!(sig.return_type, Type::Int32);
        assert_eq!(decls[0].tests.len(), 1);
    }

    #[test]
    fn empty_returns_form_defaults_to_int32() {
        let forms = forms(
            "(fn f (params) (returns) (body (return 0)) (tests (test t (body (expect-true 1)))))",
        );
        let types = collect_type_env(&forms);
        let (_, decls) = collect_signatures(&forms, &types).unwrap();
        assert_eq!(decls[0].return_type, Type::Int32);
    }

    #[test]
    fn builtins_shadow_a_same_named_user_function() {
        let mut table = FnTable::new();
        table.add_user(FnSig {
            name: "malloc".into(),
            return_type: Type::Int32,
            params: vec![],
        });
        table.install_builtins();
        assert_eq!(table.lookup("malloc").unwrap().return_type, Type::PointerToByte);
    }

    #[test]
    fn unknown_callee_bootstraps_to_int32() {
        let table = FnTable::new();
        let sig = table.lookup_or_bootstrap("mystery", 2);
        assert_eq!(sig.return_type, Type::Int32);
        assert_eq!(sig.params, vec![Type::Int32, Type::Int32]);
    }
}
