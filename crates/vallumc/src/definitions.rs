//! Definition-graph builder.
//!
//! Collects the IR fragments of the checked statements, pulls in the builtin
//! library entries they reference, specializes generic templates on demand,
//! rewrites forward and recursive references into explicit parameters and
//! finally nests everything around the root as `let` bindings.

use std::collections::{BTreeMap, BTreeSet};

use crate::check::{CheckedKind, CheckedStatement};
use crate::compile::{CompileErrorKind, CompilerError};
use crate::ir::IrExpr;
use crate::language::limits;
use crate::library;
use crate::members::{has_current_member, HASH_TYPES};
use crate::primitives::is_primitive;
use crate::types::{is_path_within, member_path, MODULE_PREFIX};

/// Prefix of the holes left for parameters in a parametric compile.
pub const PARAM_PREFIX: &str = "__PARAM_";

/// Where to stop collecting statements (inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stop {
    /// The entry function of the main module.
    Entry,
    /// The top-level const with this path.
    Const(String),
    Never,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Replacement definitions of top-level consts, by path.
    pub overrides: BTreeMap<String, IrExpr>,
    pub current_script_hash: Option<Vec<u8>>,
    /// Accept free `__PARAM_<i>` names.
    pub allow_params: bool,
    pub max_specializations: usize,
    pub max_type_depth: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            current_script_hash: None,
            allow_params: false,
            max_specializations: limits::max_specializations(),
            max_type_depth: limits::max_type_depth(),
        }
    }
}

/// Ordered, closed list of definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionGraph {
    defs: Vec<(String, IrExpr)>,
}

impl DefinitionGraph {
    pub fn definitions(&self) -> &[(String, IrExpr)] {
        &self.defs
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.defs.iter().any(|(k, _)| k == key)
    }

    /// `((k0) -> { ((k1) -> { … root … })(def1) })(def0)`
    pub fn wrap(&self, root: IrExpr) -> IrExpr {
        self.defs
            .iter()
            .rev()
            .fold(root, |body, (key, value)| IrExpr::let_in(key, value.clone(), body))
    }
}

/// Builds the graph for `root` from the statements up to `stop`.
pub fn build_definitions(
    statements: &[CheckedStatement],
    root: IrExpr,
    stop: &Stop,
    options: &BuildOptions,
) -> Result<(DefinitionGraph, IrExpr), CompilerError> {
    let mut user = Vec::new();
    let mut stopped = false;
    for stmt in statements {
        for (key, ir) in &stmt.defs {
            let ir = match &stmt.kind {
                CheckedKind::Const { path, .. } if path == key => {
                    options.overrides.get(path).cloned().unwrap_or_else(|| ir.clone())
                }
                _ => ir.clone(),
            };
            user.push((key.clone(), ir));
        }
        let hit = match (stop, &stmt.kind) {
            (Stop::Entry, CheckedKind::Func { is_main, .. }) => *is_main,
            (Stop::Const(want), CheckedKind::Const { path, .. }) => path == want,
            _ => false,
        };
        if hit {
            stopped = true;
            break;
        }
    }
    if !stopped && *stop != Stop::Never {
        return Err(CompilerError::internal(format!(
            "statement list ended before reaching {stop:?}"
        )));
    }
    link(user, root, options)
}

/// Resolves `root` against `user` definitions (in order) and the builtin
/// library, then applies the recursion rewrite.
pub fn link(
    user: Vec<(String, IrExpr)>,
    root: IrExpr,
    options: &BuildOptions,
) -> Result<(DefinitionGraph, IrExpr), CompilerError> {
    let mut b = Builder::new(options);
    for (key, ir) in user {
        if !b.placed.insert(key.clone()) {
            return Err(CompilerError::internal(format!("definition {key} is defined twice")));
        }
        if key.contains('$') {
            let after = b.user.last().map(|(k, _)| k.clone());
            b.templates.insert(key, (ir, after));
        } else {
            b.user.push((key, ir));
        }
    }
    let mut i = 0;
    while i < b.user.len() {
        let body = b.user[i].1.clone();
        let key = b.user[i].0.clone();
        b.resolve_refs(&body)?;
        // insertions may have shifted the current definition
        i = b.user.iter().position(|(k, _)| *k == key).unwrap_or(i) + 1;
    }
    b.resolve_refs(&root)?;

    let mut defs = b.library;
    defs.extend(b.user);
    check_closed(&defs, &root, options.allow_params)?;
    let (defs, root) = rewrite_recursion(&defs, &root);
    tracing::debug!(definitions = defs.len(), specializations = b.specializations, "definition graph built");
    Ok((DefinitionGraph { defs }, root))
}

enum Origin {
    Library,
    /// User template declared after this definition (or first).
    User(Option<String>),
}

struct Builder<'a> {
    options: &'a BuildOptions,
    library: Vec<(String, IrExpr)>,
    user: Vec<(String, IrExpr)>,
    templates: BTreeMap<String, (IrExpr, Option<String>)>,
    placed: BTreeSet<String>,
    specializations: usize,
}

impl<'a> Builder<'a> {
    fn new(options: &'a BuildOptions) -> Self {
        Self {
            options,
            library: Vec::new(),
            user: Vec::new(),
            templates: BTreeMap::new(),
            placed: BTreeSet::new(),
            specializations: 0,
        }
    }

    fn resolve_refs(&mut self, body: &IrExpr) -> Result<(), CompilerError> {
        for name in body.free_names() {
            self.resolve(&name)?;
        }
        Ok(())
    }

    fn resolve(&mut self, name: &str) -> Result<(), CompilerError> {
        if self.placed.contains(name)
            || is_primitive(name)
            || (self.options.allow_params && name.starts_with(PARAM_PREFIX))
        {
            return Ok(());
        }
        if is_current_hash(name) {
            let Some(hash) = &self.options.current_script_hash else {
                return Err(CompilerError::new(
                    CompileErrorKind::Reference,
                    "CURRENT needs the hash of the script being compiled, which was not provided"
                        .to_string(),
                ));
            };
            self.placed.insert(name.to_string());
            self.library.push((name.to_string(), IrExpr::bytes(hash.clone())));
            return Ok(());
        }
        if let Some(body) = library::lookup(name)? {
            self.placed.insert(name.to_string());
            self.resolve_refs(&body)?;
            self.library.push((name.to_string(), body));
            return Ok(());
        }
        if name.contains('[') {
            return self.specialize(name);
        }
        Ok(())
    }

    fn specialize(&mut self, name: &str) -> Result<(), CompilerError> {
        let Some((key, args)) = split_instance_name(name) else {
            return Ok(());
        };
        let (template, origin) = match self.templates.get(&key) {
            Some((t, after)) => (t.clone(), Origin::User(after.clone())),
            None => match library::template(&key)? {
                Some(t) => (t, Origin::Library),
                None => return Ok(()),
            },
        };

        let depth = args.iter().map(|a| type_depth(a)).max().unwrap_or(0);
        if depth > self.options.max_type_depth {
            return Err(CompilerError::budget(format!(
                "generic instance nests types {depth} deep, more than the limit of {}",
                self.options.max_type_depth
            )));
        }
        self.specializations += 1;
        if self.specializations > self.options.max_specializations {
            return Err(CompilerError::budget(format!(
                "more than {} generic specializations",
                self.options.max_specializations
            )));
        }

        let body = fill_holes(&template, &args);
        self.placed.insert(name.to_string());
        self.resolve_refs(&body)?;

        let builtin_only = args.iter().all(|a| !a.contains(MODULE_PREFIX));
        match origin {
            Origin::Library if builtin_only => self.library.push((name.to_string(), body)),
            Origin::Library => {
                let pos = self.insert_position(&body, &args, None);
                self.user.insert(pos, (name.to_string(), body));
            }
            Origin::User(after) => {
                let pos = self.insert_position(&body, &args, after.as_deref());
                self.user.insert(pos, (name.to_string(), body));
            }
        }
        tracing::debug!(instance = name, template = %key, "specialized generic definition");
        Ok(())
    }

    /// Index just after the last user definition the instance depends on:
    /// definitions it references, members of user types named in its holes,
    /// and the template's own declaration.
    fn insert_position(&self, body: &IrExpr, args: &[String], after: Option<&str>) -> usize {
        let refs = body.free_name_set();
        let type_paths: Vec<String> = args.iter().flat_map(|a| user_paths_in(a)).collect();
        let mut pos = 0;
        for (i, (k, _)) in self.user.iter().enumerate() {
            let depends = refs.contains(k)
                || after == Some(k.as_str())
                || type_paths.iter().any(|p| is_path_within(k, p));
            if depends {
                pos = i + 1;
            }
        }
        pos
    }
}

fn is_current_hash(name: &str) -> bool {
    HASH_TYPES
        .iter()
        .any(|h| has_current_member(h) && member_path(&h.path(), "CURRENT") == name)
}

/// Splits a concrete instance name into its template key and hole values:
/// `__vallum__map[A@B]__fold[C]` gives `__vallum__map[$0@$1]__fold[$2]` and
/// `[A, B, C]`. Returns `None` for names without brackets or with holes.
pub fn split_instance_name(name: &str) -> Option<(String, Vec<String>)> {
    let mut key = String::new();
    let mut args: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '[' => {
                if depth == 0 {
                    key.push('[');
                } else {
                    current.push(c);
                }
                depth += 1;
            }
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    key.push_str(&format!("${}", args.len()));
                    args.push(std::mem::take(&mut current));
                    key.push(']');
                } else {
                    current.push(c);
                }
            }
            '@' if depth == 1 => {
                key.push_str(&format!("${}", args.len()));
                args.push(std::mem::take(&mut current));
                key.push('@');
            }
            _ if depth > 0 => current.push(c),
            _ => key.push(c),
        }
    }
    if depth != 0 || args.is_empty() || args.iter().any(|a| a.is_empty() || a.contains('$')) {
        return None;
    }
    Some((key, args))
}

fn type_depth(path: &str) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    for c in path.chars() {
        match c {
            '[' => {
                depth += 1;
                max = max.max(depth);
            }
            ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max + 1
}

/// User type paths mentioned in a hole value.
fn user_paths_in(arg: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = arg;
    while let Some(start) = rest.find(MODULE_PREFIX) {
        let tail = &rest[start..];
        let end = tail.find(['[', ']', '@']).unwrap_or(tail.len());
        out.push(tail[..end].to_string());
        rest = &tail[end..];
    }
    out
}

fn fill_holes(template: &IrExpr, args: &[String]) -> IrExpr {
    template.map_names(&|n| {
        if !n.contains('$') {
            return n.to_string();
        }
        let mut s = n.to_string();
        for (i, a) in args.iter().enumerate().rev() {
            s = s.replace(&format!("${i}"), a);
        }
        s
    })
}

fn check_closed(
    defs: &[(String, IrExpr)],
    root: &IrExpr,
    allow_params: bool,
) -> Result<(), CompilerError> {
    let keys: BTreeSet<&str> = defs.iter().map(|(k, _)| k.as_str()).collect();
    let known = |n: &str| {
        keys.contains(n) || is_primitive(n) || (allow_params && n.starts_with(PARAM_PREFIX))
    };
    for (key, body) in defs {
        if let Some(n) = body.free_names().into_iter().find(|n| !known(n)) {
            return Err(CompilerError::internal(format!(
                "unresolved reference {n} in definition {key}"
            )));
        }
    }
    if let Some(n) = root.free_names().into_iter().find(|n| !known(n)) {
        return Err(CompilerError::internal(format!(
            "unresolved reference {n} in the entry expression"
        )));
    }
    Ok(())
}

/// Turns references to definitions at or after the referencing one into
/// explicit parameters. A definition `x` whose extra set `E_x` is non-empty
/// becomes `(E_x…) -> { body }`; every reference to such a `d` becomes
/// `d(E_d…)`.
pub fn rewrite_recursion(
    defs: &[(String, IrExpr)],
    root: &IrExpr,
) -> (Vec<(String, IrExpr)>, IrExpr) {
    let pos: BTreeMap<&str, usize> = defs
        .iter()
        .enumerate()
        .map(|(i, (k, _))| (k.as_str(), i))
        .collect();
    let refs: Vec<Vec<usize>> = defs
        .iter()
        .map(|(_, body)| {
            body.free_names()
                .iter()
                .filter_map(|n| pos.get(n.as_str()).copied())
                .collect()
        })
        .collect();

    let mut extra: Vec<BTreeSet<usize>> = refs
        .iter()
        .enumerate()
        .map(|(x, r)| r.iter().copied().filter(|d| *d >= x).collect())
        .collect();
    loop {
        let mut changed = false;
        for x in 0..defs.len() {
            for &d in &refs[x] {
                let inherited: Vec<usize> = extra[d].iter().copied().filter(|e| *e >= x).collect();
                for e in inherited {
                    changed |= extra[x].insert(e);
                }
            }
        }
        if !changed {
            break;
        }
    }

    let names = |set: &BTreeSet<usize>| -> Vec<String> {
        set.iter().map(|i| defs[*i].0.clone()).collect()
    };
    let rewrite = |body: &IrExpr| {
        body.replace_free(&mut |n| {
            let d = *pos.get(n)?;
            if extra[d].is_empty() {
                return None;
            }
            Some(IrExpr::call(
                IrExpr::name(n),
                names(&extra[d]).into_iter().map(IrExpr::name).collect(),
            ))
        })
    };

    let out = defs
        .iter()
        .enumerate()
        .map(|(x, (key, body))| {
            let body = rewrite(body);
            if extra[x].is_empty() {
                (key.clone(), body)
            } else {
                (key.clone(), IrExpr::lambda(names(&extra[x]), body))
            }
        })
        .collect();
    (out, rewrite(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Data;
    use crate::ir_eval::{evaluate, Constant};
    use crate::ir_parse::{parse_definitions, parse_ir};

    fn run(defs: &str, root: &str, options: &BuildOptions) -> Result<Constant, String> {
        let user = parse_definitions(defs).expect("parse defs");
        let root = parse_ir(root).expect("parse root");
        let (graph, root) = link(user, root, options).map_err(|e| e.to_string())?;
        evaluate(&graph.wrap(root), 1_000_000).result
    }

    const FACT: &str = r#"
        __module__t__fact = (n) -> {
            __core__ifThenElse(
                __core__lessThanEqualsInteger(n, 0),
                () -> { 1 },
                () -> { __core__multiplyInteger(n, __module__t__fact(__core__subtractInteger(n, 1))) }
            )()
        };
    "#;

    #[test]
    fn instance_names_split_into_templates() {
        assert_eq!(
            split_instance_name("__vallum__list[__vallum__int]__map[__vallum__bool]"),
            Some((
                "__vallum__list[$0]__map[$1]".to_string(),
                vec!["__vallum__int".to_string(), "__vallum__bool".to_string()]
            ))
        );
        assert_eq!(
            split_instance_name("__vallum__map[__vallum__int@__vallum__list[__vallum__int]]__fold[__module__m__S]"),
            Some((
                "__vallum__map[$0@$1]__fold[$2]".to_string(),
                vec![
                    "__vallum__int".to_string(),
                    "__vallum__list[__vallum__int]".to_string(),
                    "__module__m__S".to_string()
                ]
            ))
        );
        assert_eq!(split_instance_name("__vallum__int____add"), None);
        assert_eq!(split_instance_name("__vallum__list[$0]__length"), None);
    }

    #[test]
    fn self_recursion_is_rewritten() {
        let out = run(FACT, "__module__t__fact(5)", &BuildOptions::default());
        assert_eq!(out, Ok(Constant::Int(120)));
    }

    #[test]
    fn forward_and_mutual_references() {
        let defs = r#"
            __module__t__is_even = (n) -> {
                __core__ifThenElse(__core__equalsInteger(n, 0), () -> { true }, () -> { __module__t__is_odd(__core__subtractInteger(n, 1)) })()
            };
            __module__t__is_odd = (n) -> {
                __core__ifThenElse(__core__equalsInteger(n, 0), () -> { false }, () -> { __module__t__is_even(__core__subtractInteger(n, 1)) })()
            };
        "#;
        let options = BuildOptions::default();
        assert_eq!(run(defs, "__module__t__is_even(10)", &options), Ok(Constant::Bool(true)));
        assert_eq!(run(defs, "__module__t__is_odd(7)", &options), Ok(Constant::Bool(true)));
    }

    #[test]
    fn rewriting_again_keeps_the_meaning() {
        let user = parse_definitions(FACT).expect("parse");
        let root = parse_ir("__module__t__fact(4)").expect("parse");
        let options = BuildOptions::default();
        let (graph, root) = link(user.clone(), root.clone(), &options).expect("link");
        let (again, again_root) = rewrite_recursion(graph.definitions(), &root);
        let first = evaluate(&graph.wrap(root.clone()), 100_000).result;
        let second = evaluate(&DefinitionGraph { defs: again }.wrap(again_root), 100_000).result;
        assert_eq!(first, Ok(Constant::Int(24)));
        assert_eq!(first, second);

        let (graph2, root2) = link(user, parse_ir("__module__t__fact(4)").expect("parse"), &options)
            .expect("link again");
        assert_eq!(graph2.wrap(root2).to_string(), graph.wrap(root).to_string());
    }

    #[test]
    fn acyclic_graphs_are_left_alone() {
        let defs = parse_definitions("a = 1; b = (x) -> { __core__addInteger(a, x) };").expect("parse");
        let root = parse_ir("b(2)").expect("parse");
        let (out, out_root) = rewrite_recursion(&defs, &root);
        assert_eq!(out, defs);
        assert_eq!(out_root, root);
    }

    #[test]
    fn builtin_templates_are_specialized() {
        let out = run(
            "",
            "__vallum__list[__vallum__int]__length(__core__mkCons(__core__iData(1), __core__mkCons(__core__iData(2), __core__mkNilData(()))))",
            &BuildOptions::default(),
        );
        assert_eq!(out, Ok(Constant::Int(2)));
    }

    #[test]
    fn user_templates_are_specialized_after_their_dependencies() {
        let defs = r#"
            __module__t__S____eq = (self) -> { (other) -> { __core__equalsData(self, other) } };
            __module__t__same[$0] = (a, b) -> { $0____eq(a)(b) };
        "#;
        let user = parse_definitions(defs).expect("parse");
        let root = parse_ir(
            "__module__t__same[__module__t__S](__core__iData(1), __core__iData(1))",
        )
        .expect("parse");
        let (graph, root) = link(user, root, &BuildOptions::default()).expect("link");
        let keys: Vec<&str> = graph.definitions().iter().map(|(k, _)| k.as_str()).collect();
        assert!(!keys.contains(&"__module__t__same[$0]"));
        let eq = keys.iter().position(|k| *k == "__module__t__S____eq").expect("eq");
        let inst = keys
            .iter()
            .position(|k| *k == "__module__t__same[__module__t__S]")
            .expect("instance");
        assert!(inst > eq);
        assert_eq!(evaluate(&graph.wrap(root), 100_000).result, Ok(Constant::Bool(true)));
    }

    #[test]
    fn specialization_budget() {
        let options = BuildOptions {
            max_specializations: 1,
            ..BuildOptions::default()
        };
        let err = run(
            "",
            "__vallum__list[__vallum__list[__vallum__int]]__head(__core__mkNilData(()))",
            &options,
        )
        .expect_err("head needs the item's from_data as a second specialization");
        assert!(err.contains("budget exceeded"), "{err}");

        let options = BuildOptions {
            max_type_depth: 2,
            ..BuildOptions::default()
        };
        let err = run(
            "",
            "__vallum__list[__vallum__list[__vallum__list[__vallum__int]]]__length(__core__mkNilData(()))",
            &options,
        )
        .expect_err("too deep");
        assert!(err.contains("deep"), "{err}");
    }

    #[test]
    fn unresolved_names_are_internal_errors() {
        let user = parse_definitions("f = (x) -> { nowhere(x) };").expect("parse");
        let err = link(user, parse_ir("f(1)").expect("parse"), &BuildOptions::default())
            .expect_err("unresolved");
        assert_eq!(err.kind, CompileErrorKind::Internal);
        assert_eq!(err.message, "unresolved reference nowhere in definition f");
        assert!(err.site.is_none());
    }

    #[test]
    fn parameter_holes_and_current_hash() {
        let root = parse_ir("__core__unIData(__PARAM_0)").expect("parse");
        let err = link(Vec::new(), root.clone(), &BuildOptions::default()).expect_err("hole");
        assert_eq!(err.kind, CompileErrorKind::Internal);
        let options = BuildOptions {
            allow_params: true,
            ..BuildOptions::default()
        };
        let (graph, root) = link(Vec::new(), root, &options).expect("holes allowed");
        assert!(graph.is_empty());
        assert_eq!(root.free_names(), vec!["__core__unIData", "__PARAM_0"]);

        let root = parse_ir("__vallum__validatorhash__CURRENT").expect("parse");
        let err = link(Vec::new(), root.clone(), &BuildOptions::default()).expect_err("unknown");
        assert_eq!(err.kind, CompileErrorKind::Reference);
        let options = BuildOptions {
            current_script_hash: Some(vec![0xab, 0xcd]),
            ..BuildOptions::default()
        };
        let (graph, root) = link(Vec::new(), root, &options).expect("known hash");
        assert_eq!(
            evaluate(&graph.wrap(root), 100).result,
            Ok(Constant::Bytes(vec![0xab, 0xcd]))
        );
    }

    #[test]
    fn library_members_evaluate() {
        let options = BuildOptions::default();
        assert_eq!(
            run("", "__vallum__int__show(__core__subtractInteger(0, 120))()", &options),
            Ok(Constant::Str("-120".to_string()))
        );
        assert_eq!(
            run("", "__vallum__bytearray__show(#00ff1a)()", &options),
            Ok(Constant::Str("00ff1a".to_string()))
        );
        assert_eq!(
            run("", "__vallum__bool____to_data(true)", &options),
            Ok(Constant::Data(Data::constr(1, vec![])))
        );
        assert_eq!(
            run("", "__vallum__real____mul(1500000)(2000000)", &options),
            Ok(Constant::Int(3_000_000))
        );
        assert_eq!(
            run("", "__vallum__value__lovelace(__vallum__value__from_lovelace(42))", &options),
            Ok(Constant::Int(42))
        );
        let err = run(
            "",
            "__vallum__option[__vallum__int]__unwrap(__vallum__option[__vallum__int]__None)()",
            &options,
        )
        .expect_err("unwrap on None");
        assert!(err.contains("unwrap called on None"), "{err}");
    }
}
