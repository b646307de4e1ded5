use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::{
    diagnostics::{DiagnosticError, IncludeError, SyntaxError},
    sexpr::{parse_source, Node, NodeKind},
    span::Span,
};

/// Finds the file an `(include "path")` form refers to.
///
/// `./` and `../` prefixed paths are resolved relative to the directory of
/// the file that contains the `include` form. Anything else is tried against
/// each of `include_dirs`, in order, and finally against the current working
/// directory.
fn resolve_include_path(
    requested: &str,
    including_dir: &Path,
    include_dirs: &[PathBuf],
) -> Result<PathBuf, String> {
    if requested.starts_with("./") || requested.starts_with("../") {
        let candidate = including_dir.join(requested);
        return if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(format!(
                "relative include not found next to including file: {}",
                candidate.display()
            ))
        };
    }

    for dir in include_dirs {
        let candidate = dir.join(requested);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    let cwd_candidate = std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(requested);
    if cwd_candidate.is_file() {
        return Ok(cwd_candidate);
    }

    Err(format!(
        "'{requested}' not found in any include directory or the current directory"
    ))
}

fn include_target<'a>(form: &'a Node) -> Option<&'a str> {
    if form.head() != Some("include") {
        return None;
    }
    form.nth(1).and_then(|n| match &n.kind {
        NodeKind::Str(s) => Some(s.as_str()),
        NodeKind::Atom(s) => Some(s.as_str()),
        NodeKind::List(_) => None,
    })
}

fn merge_file(
    path: &Path,
    include_dirs: &[PathBuf],
    seen: &mut HashSet<PathBuf>,
    out: &mut Vec<Node>,
) -> Result<(), DiagnosticError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !seen.insert(canonical) {
        // Already merged earlier in this compilation; skip silently so
        // re-including the same file (directly or via a diamond of
        // includes) is a no-op rather than a duplicate-definition error.
        return Ok(());
    }

    let file_span = Span::new(path.to_string_lossy().into_owned().into(), 1, 1);
    let contents = std::fs::read_to_string(path).map_err(|e| {
        DiagnosticError::Include(
            IncludeError {
                path: path.to_string_lossy().into_owned(),
                reason: e.to_string(),
            },
            file_span.clone(),
        )
    })?;

    let file_name: std::rc::Rc<str> = path.to_string_lossy().into_owned().into();
    let top = parse_source(file_name, &contents).map_err(|e| {
        DiagnosticError::Syntax(
            SyntaxError {
                message: e.message,
            },
            e.span,
        )
    })?;
    let forms = match top.kind {
        NodeKind::List(forms) => forms,
        _ => unreachable!("parse_source always returns a List"),
    };

    let including_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    merge_forms_into(forms, &including_dir, include_dirs, seen, out)
}

/// Processes one level of forms, expanding `(include "path")` in place and
/// recursing into `(module ...)`/`(program ...)` groupings - spec section
/// 4.3's "walks the top list and every grouping" - so an include nested
/// inside a `module`/`program` is resolved exactly like a top-level one.
fn merge_forms_into(
    forms: Vec<Node>,
    including_dir: &Path,
    include_dirs: &[PathBuf],
    seen: &mut HashSet<PathBuf>,
    out: &mut Vec<Node>,
) -> Result<(), DiagnosticError> {
    for form in forms {
        match include_target(&form) {
            Some(requested) => {
                let resolved = resolve_include_path(requested, including_dir, include_dirs)
                    .map_err(|reason| {
                        DiagnosticError::Include(
                            IncludeError {
                                path: requested.to_string(),
                                reason,
                            },
                            form.span.clone(),
                        )
                    })?;
                merge_file(&resolved, include_dirs, seen, out)?;
            }
            None => match form.head() {
                Some("module") | Some("program") => {
                    let span = form.span.clone();
                    let NodeKind::List(items) = form.kind else {
                        unreachable!("head() only returns Some for a List")
                    };
                    let mut items = items.into_iter();
                    let head = items.next().expect("head() found an atom here");
                    let mut children = Vec::new();
                    merge_forms_into(items.collect(), including_dir, include_dirs, seen, &mut children)?;
                    let mut grouped = Vec::with_capacity(children.len() + 1);
                    grouped.push(head);
                    grouped.extend(children);
                    out.push(Node {
                        kind: NodeKind::List(grouped),
                        span,
                    });
                }
                _ => out.push(form),
            },
        }
    }
    Ok(())
}

/// Reads `entry`, recursively expanding every `(include "path")` form into
/// its target's top-level forms, and returns the flattened program as one
/// synthetic top-level list. Re-including a file already merged (directly,
/// or through a cycle of includes) is a no-op, so running this twice over
/// the same entry point yields the same program.
pub fn load_and_resolve(
    entry: &Path,
    include_dirs: &[PathBuf],
) -> Result<Node, DiagnosticError> {
    let mut seen = HashSet::new();
    let mut forms = Vec::new();
    merge_file(entry, include_dirs, &mut seen, &mut forms)?;
    Ok(Node {
        span: Span::new(entry.to_string_lossy().into_owned().into(), 1, 1),
        kind: NodeKind::List(forms),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::TempSource;

    #[test]
    fn inlines_a_relative_include_once() {
        let included = TempSource::new("inc-lib", "(fn helper (params) (body 0))");
        let entry_src = format!(
            "(include \"./{}\")\n(fn main (params) (body 0))",
            included.path().file_name().unwrap().to_string_lossy()
        );
        let entry = TempSource::new("inc-main", &entry_src);

        let merged = load_and_resolve(entry.path(), &[]).unwrap();
        let forms = merged.as_list().unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].nth(1).unwrap().as_atom(), Some("helper"));
        assert_eq!(forms[1].nth(1).unwrap().as_atom(), Some("main"));
    }

    #[test]
    fn including_the_same_file_twice_is_idempotent() {
        let included = TempSource::new("inc-lib2", "(fn helper (params) (body 0))");
        let name = included.path().file_name().unwrap().to_string_lossy();
        let entry_src = format!("(include \"./{name}\")\n(include \"./{name}\")\n");
        let entry = TempSource::new("inc-main2", &entry_src);

        let merged = load_and_resolve(entry.path(), &[]).unwrap();
        assert_eq!(merged.as_list().unwrap().len(), 1);
    }

    #[test]
    fn missing_include_is_an_error() {
        let entry = TempSource::new("inc-missing", "(include \"./does-not-exist.weave\")\n");
        let err = load_and_resolve(entry.path(), &[]).unwrap_err();
        assert!(matches!(err, DiagnosticError::Include(..)));
    }

    #[test]
    fn resolves_an_include_nested_inside_a_module_grouping() {
        let included = TempSource::new("inc-lib3", "(fn helper (params) (body 0))");
        let entry_src = format!(
            "(module (include \"./{}\") (fn main (params) (body 0)))",
            included.path().file_name().unwrap().to_string_lossy()
        );
        let entry = TempSource::new("inc-main3", &entry_src);

        let merged = load_and_resolve(entry.path(), &[]).unwrap();
        let forms = merged.as_list().unwrap();
        assert_eq!(forms.len(), 1);
        let module_children = forms[0].as_list().unwrap();
        // index 0 is the `module` head atom itself.
        assert_eq!(module_children[1].nth(1).unwrap().as_atom(), Some("helper"));
        assert_eq!(module_children[2].nth(1).unwrap().as_atom(), Some("main"));
    }
}
