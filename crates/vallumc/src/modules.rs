//! Module dependency resolution.
//!
//! Imports are walked depth first with an explicit stack so self imports and
//! cycles are reported instead of recursing forever. Each module is included
//! once, after everything it imports.

use std::collections::BTreeMap;

use crate::ast::ModuleAst;
use crate::compile::{CompilerError, Site};

/// Auxiliary modules by name. Duplicate names are rejected.
pub fn index_modules(
    main: &ModuleAst,
    modules: Vec<ModuleAst>,
) -> Result<BTreeMap<String, ModuleAst>, CompilerError> {
    let mut out: BTreeMap<String, ModuleAst> = BTreeMap::new();
    for m in modules {
        if m.name == main.name || out.contains_key(&m.name) {
            return Err(CompilerError::syntax(
                &Site::new(&m.name, ""),
                format!("duplicate module name {}", m.name),
            ));
        }
        out.insert(m.name.clone(), m);
    }
    Ok(out)
}

/// Dependency modules of the main module, split by the segment importing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleOrder {
    /// Needed by the statements up to and including `main`.
    pub pre: Vec<String>,
    /// Needed only after `main`.
    pub post: Vec<String>,
}

struct Frame<'a> {
    module: &'a str,
    imports: Vec<(&'a str, &'a Site)>,
    next: usize,
}

/// Orders the modules `main` depends on. `split` is the index of the first
/// post-main statement.
pub fn resolve_dependencies(
    main: &ModuleAst,
    split: usize,
    candidates: &BTreeMap<String, ModuleAst>,
) -> Result<ModuleOrder, CompilerError> {
    let split = split.min(main.statements.len());
    let mut included = Vec::new();
    walk(main, &main.statements[..split], candidates, &mut included)?;
    let pre_len = included.len();
    walk(main, &main.statements[split..], candidates, &mut included)?;
    let post = included.split_off(pre_len);
    tracing::debug!(module = %main.name, pre = ?included, post = ?post, "resolved dependencies");
    Ok(ModuleOrder { pre: included, post })
}

fn walk<'a>(
    main: &'a ModuleAst,
    statements: &'a [crate::ast::Statement],
    candidates: &'a BTreeMap<String, ModuleAst>,
    included: &mut Vec<String>,
) -> Result<(), CompilerError> {
    let mut stack = vec![Frame {
        module: &main.name,
        imports: ModuleAst::imports_in(statements),
        next: 0,
    }];

    while let Some(top) = stack.last_mut() {
        let Some(&(name, site)) = top.imports.get(top.next) else {
            let done = top.module;
            stack.pop();
            if !stack.is_empty() {
                included.push(done.to_string());
            }
            continue;
        };
        top.next += 1;
        let importer = top.module;

        if name == importer {
            return Err(CompilerError::syntax(
                site,
                format!("module {name} imports itself"),
            ));
        }
        if let Some(pos) = stack.iter().position(|f| f.module == name) {
            let mut path: Vec<&str> = stack[pos..].iter().map(|f| f.module).collect();
            path.push(name);
            return Err(CompilerError::syntax(
                site,
                format!("import cycle: {}", path.join(" -> ")),
            ));
        }
        if included.iter().any(|m| m == name) {
            continue;
        }
        let Some(module) = candidates.get(name) else {
            return Err(CompilerError::reference(
                site,
                format!("module {name} not found"),
            ));
        };
        if !module.is_library() {
            return Err(CompilerError::syntax(
                site,
                format!(
                    "cannot import {name}: it is a {} script, not a module",
                    module.kind.as_str()
                ),
            ));
        }
        stack.push(Frame {
            module: &module.name,
            imports: ModuleAst::imports_in(&module.statements),
            next: 0,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_json::parse_module_value;
    use crate::compile::CompileErrorKind;
    use serde_json::{json, Value};

    fn module(kind: &str, name: &str, imports: &[&str]) -> ModuleAst {
        let statements: Vec<Value> = imports
            .iter()
            .map(|m| json!({"kind": "import", "module": m, "names": []}))
            .collect();
        parse_module_value(&json!({
            "schema_version": vallum_contracts::VALLUM_AST_SCHEMA_VERSION,
            "kind": kind,
            "name": name,
            "statements": statements,
        }))
        .expect("parse module")
    }

    fn resolve(main: &ModuleAst, libs: Vec<ModuleAst>) -> Result<ModuleOrder, CompilerError> {
        let candidates = index_modules(main, libs)?;
        resolve_dependencies(main, main.statements.len(), &candidates)
    }

    #[test]
    fn dependencies_come_first() {
        let main = module("testing", "main_mod", &["b", "a"]);
        let order = resolve(
            &main,
            vec![
                module("module", "a", &[]),
                module("module", "b", &["c", "a"]),
                module("module", "c", &["a"]),
            ],
        )
        .expect("acyclic");
        assert_eq!(order.pre, vec!["a", "c", "b"]);
        assert!(order.post.is_empty());
    }

    #[test]
    fn post_main_imports_are_appended_once() {
        let main = module("spending", "v", &["a", "b"]);
        let candidates = index_modules(
            &main,
            vec![module("module", "a", &[]), module("module", "b", &["a"])],
        )
        .expect("index");
        let order = resolve_dependencies(&main, 1, &candidates).expect("acyclic");
        assert_eq!(order.pre, vec!["a"]);
        assert_eq!(order.post, vec!["b"]);
    }

    #[test]
    fn self_import_is_fatal() {
        let main = module("testing", "t", &["a"]);
        let err = resolve(&main, vec![module("module", "a", &["a"])]).expect_err("self import");
        assert_eq!(err.kind, CompileErrorKind::Syntax);
        assert!(err.message.contains("module a imports itself"), "{}", err.message);

        let main = module("testing", "t", &["t"]);
        let err = resolve(&main, vec![]).expect_err("main imports itself");
        assert!(err.message.contains("imports itself"), "{}", err.message);
    }

    #[test]
    fn cycles_name_the_path() {
        let main = module("testing", "t", &["a"]);
        let err = resolve(
            &main,
            vec![module("module", "a", &["b"]), module("module", "b", &["a"])],
        )
        .expect_err("cycle");
        assert_eq!(err.kind, CompileErrorKind::Syntax);
        assert_eq!(err.message, "import cycle: a -> b -> a");
    }

    #[test]
    fn missing_and_script_modules() {
        let main = module("testing", "t", &["nope"]);
        let err = resolve(&main, vec![]).expect_err("missing");
        assert_eq!(err.kind, CompileErrorKind::Reference);

        let main = module("testing", "t", &["other"]);
        let err = resolve(&main, vec![module("minting", "other", &[])]).expect_err("script import");
        assert_eq!(err.kind, CompileErrorKind::Syntax);
        assert!(err.message.contains("minting script"), "{}", err.message);
    }

    #[test]
    fn duplicate_module_names() {
        let main = module("testing", "t", &[]);
        let err = index_modules(&main, vec![module("module", "a", &[]), module("module", "a", &[])])
            .expect_err("duplicate");
        assert_eq!(err.kind, CompileErrorKind::Syntax);
        let err = index_modules(&main, vec![module("module", "t", &[])]).expect_err("shadows main");
        assert!(err.message.contains("duplicate module name t"));
    }
}
