//! A checked program: ordered modules, the entry wrapper and the parameter
//! interface.

use std::collections::BTreeMap;

use vallum_purposes::ScriptPurpose;

use crate::ast::{ModuleAst, ModuleKind, StatementKind};
use crate::ast_json::parse_module_json;
use crate::check::{CheckedKind, CheckedStatement, Checker, Phase};
use crate::compile::{CompileErrorKind, CompilerError, Site};
use crate::data::Data;
use crate::definitions::{build_definitions, BuildOptions, Stop, PARAM_PREFIX};
use crate::diagnostics::Diagnostic;
use crate::entry::{lower_entry, EntryFunction};
use crate::ir::IrExpr;
use crate::ir_eval::{evaluate, Constant};
use crate::language::limits;
use crate::members;
use crate::modules::{index_modules, resolve_dependencies};
use crate::scope::Symbol;
use crate::types::Type;

/// A top-level const of the main module.
#[derive(Debug, Clone)]
struct ParamDecl {
    name: String,
    path: String,
    ty: Type,
    phase: Phase,
    site: Site,
}

#[derive(Debug)]
pub struct Program {
    purpose: ScriptPurpose,
    name: String,
    statements: Vec<CheckedStatement>,
    params: Vec<ParamDecl>,
    entry: IrExpr,
    warnings: Vec<Diagnostic>,
    /// Values supplied through `set_parameter`.
    overrides: BTreeMap<String, Data>,
    /// Computed values of the remaining parameters.
    cache: BTreeMap<String, Data>,
    current_script_hash: Option<Vec<u8>>,
    max_eval_steps: u64,
}

/// IR with `__PARAM_<i>` holes in place of the chosen parameters.
#[derive(Debug, Clone)]
pub struct ParametricProgram {
    pub ir: IrExpr,
    /// Name and type of each hole, by hole index.
    pub parameters: Vec<(String, Type)>,
}

impl ParametricProgram {
    /// Fills the holes in order. Values are not re-validated.
    pub fn instantiate(&self, values: &[Data]) -> Result<IrExpr, CompilerError> {
        if values.len() != self.parameters.len() {
            return Err(CompilerError::new(
                CompileErrorKind::Type,
                format!(
                    "expected {} parameter values, got {}",
                    self.parameters.len(),
                    values.len()
                ),
            ));
        }
        Ok(self.ir.replace_free(&mut |n| {
            let index: usize = n.strip_prefix(PARAM_PREFIX)?.parse().ok()?;
            values.get(index).cloned().map(IrExpr::data)
        }))
    }
}

impl Program {
    pub fn from_json(main: &[u8], modules: &[Vec<u8>]) -> Result<Self, CompilerError> {
        let main = parse_module_json(main)?;
        let modules = modules
            .iter()
            .map(|m| parse_module_json(m))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(main, modules)
    }

    /// Resolves imports and checks every statement once.
    pub fn new(main: ModuleAst, modules: Vec<ModuleAst>) -> Result<Self, CompilerError> {
        let module_site = Site::new(&main.name, "");
        let ModuleKind::Script(purpose) = main.kind else {
            return Err(CompilerError::syntax(
                &module_site,
                format!("{} is a module; the main document must be a script", main.name),
            ));
        };
        let Some(main_index) = main.main_index() else {
            return Err(CompilerError::syntax(
                &module_site,
                format!("script {} has no main function", main.name),
            ));
        };
        let split = main_index + 1;
        let candidates = index_modules(&main, modules)?;
        let order = resolve_dependencies(&main, split, &candidates)?;

        let mut checker = Checker::new();
        let full = |m: &ModuleAst| 0..m.statements.len();
        for name in &order.pre {
            if let Some(m) = candidates.get(name) {
                checker.check_segment(m, full(m), Phase::PreMain, false)?;
            }
        }
        checker.check_segment(&main, 0..split, Phase::PreMain, true)?;
        for name in &order.post {
            if let Some(m) = candidates.get(name) {
                checker.check_segment(m, full(m), Phase::PostMain, false)?;
            }
        }
        checker.check_segment(&main, split..main.statements.len(), Phase::PostMain, true)?;

        let (_, statements, scopes) = checker.into_parts();
        let StatementKind::Func(decl) = &main.statements[main_index].kind else {
            return Err(CompilerError::internal("main is not a function".to_string()));
        };
        let Some(Symbol::Func { inst, path }) = scopes.get(&main.name).and_then(|s| s.get(&decl.name)) else {
            return Err(CompilerError::internal(format!(
                "main of {} was not declared",
                main.name
            )));
        };
        let entry = lower_entry(purpose, EntryFunction { decl, inst, path })?;

        let params = statements
            .iter()
            .filter(|s| s.module == main.name)
            .filter_map(|s| match (&s.kind, &s.name) {
                (CheckedKind::Const { path, ty }, Some(name)) => Some(ParamDecl {
                    name: name.clone(),
                    path: path.clone(),
                    ty: ty.clone(),
                    phase: s.phase,
                    site: s.site.clone(),
                }),
                _ => None,
            })
            .collect();

        tracing::debug!(
            program = %main.name,
            %purpose,
            statements = statements.len(),
            "program checked"
        );
        Ok(Self {
            purpose,
            name: main.name,
            statements,
            params,
            entry: entry.root,
            warnings: entry.warnings,
            overrides: BTreeMap::new(),
            cache: BTreeMap::new(),
            current_script_hash: None,
            max_eval_steps: limits::max_eval_steps(),
        })
    }

    pub fn purpose(&self) -> ScriptPurpose {
        self.purpose
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn set_current_script_hash(&mut self, hash: Vec<u8>) {
        self.current_script_hash = Some(hash);
        self.cache.clear();
    }

    pub fn set_max_eval_steps(&mut self, steps: u64) {
        self.max_eval_steps = steps;
    }

    fn build_options(&self) -> BuildOptions {
        let overrides = self
            .params
            .iter()
            .filter_map(|p| {
                let value = self.overrides.get(&p.name)?;
                Some((
                    p.path.clone(),
                    IrExpr::call_named(
                        &members::from_data_path(&p.ty),
                        vec![IrExpr::data(value.clone())],
                    ),
                ))
            })
            .collect();
        BuildOptions {
            overrides,
            current_script_hash: self.current_script_hash.clone(),
            ..BuildOptions::default()
        }
    }

    /// Closed IR of the entry wrapper and everything up to `main`.
    pub fn to_ir(&self) -> Result<IrExpr, CompilerError> {
        let (graph, root) =
            build_definitions(&self.statements, self.entry.clone(), &Stop::Entry, &self.build_options())?;
        Ok(graph.wrap(root))
    }

    /// Like `to_ir`, leaving the named parameters as holes.
    pub fn compile_parametric(&self, names: &[String]) -> Result<ParametricProgram, CompilerError> {
        let mut options = self.build_options();
        options.allow_params = true;
        let mut parameters = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let p = self.param(name)?;
            if p.phase == Phase::PostMain {
                return Err(CompilerError::syntax(
                    &p.site,
                    format!("parameter {name} must be declared before main to be left open"),
                ));
            }
            if parameters.iter().any(|(n, _)| n == name) {
                return Err(CompilerError::syntax(
                    &p.site,
                    format!("parameter {name} is listed twice"),
                ));
            }
            options.overrides.insert(
                p.path.clone(),
                IrExpr::call_named(
                    &members::from_data_path(&p.ty),
                    vec![IrExpr::name(format!("{PARAM_PREFIX}{i}"))],
                ),
            );
            parameters.push((name.clone(), p.ty.clone()));
        }
        let (graph, root) =
            build_definitions(&self.statements, self.entry.clone(), &Stop::Entry, &options)?;
        Ok(ParametricProgram {
            ir: graph.wrap(root),
            parameters,
        })
    }

    fn param(&self, name: &str) -> Result<&ParamDecl, CompilerError> {
        self.params.iter().find(|p| p.name == name).ok_or_else(|| {
            CompilerError::reference(
                &Site::new(&self.name, ""),
                format!("undeclared parameter {name} in {}", self.name),
            )
        })
    }

    /// Name and type of every top-level const of the main module.
    pub fn parameter_types(&self) -> Vec<(String, Type)> {
        self.params
            .iter()
            .map(|p| (p.name.clone(), p.ty.clone()))
            .collect()
    }

    /// Data value of a parameter: the one set explicitly, or the declared
    /// value evaluated on first request.
    pub fn parameter_value(&mut self, name: &str) -> Result<Data, CompilerError> {
        let p = self.param(name)?.clone();
        if let Some(v) = self.overrides.get(name).or_else(|| self.cache.get(name)) {
            return Ok(v.clone());
        }
        let root = IrExpr::call_named(&members::to_data_path(&p.ty), vec![IrExpr::name(p.path.as_str())]);
        let (graph, root) = build_definitions(
            &self.statements,
            root,
            &Stop::Const(p.path.clone()),
            &self.build_options(),
        )?;
        let outcome = evaluate(&graph.wrap(root), self.max_eval_steps);
        let value = match outcome.into_result() {
            Ok(Constant::Data(d)) => d,
            Ok(other) => {
                return Err(CompilerError::internal(format!(
                    "parameter {name} evaluated to {other:?} instead of data"
                )))
            }
            Err(e) => {
                return Err(CompilerError::reference(
                    &p.site,
                    format!("cannot compute the value of parameter {name}: {e}"),
                ))
            }
        };
        tracing::debug!(parameter = name, "parameter value computed");
        self.cache.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Overrides a parameter's value. The data must be a valid encoding of
    /// the declared type; no re-check of the program takes place.
    pub fn set_parameter(&mut self, name: &str, value: Data) -> Result<(), CompilerError> {
        let p = self.param(name)?.clone();
        let root = IrExpr::call_named(
            &members::is_valid_data_path(&p.ty),
            vec![IrExpr::data(value.clone())],
        );
        let stop = match p.phase {
            Phase::PreMain => Stop::Entry,
            Phase::PostMain => Stop::Never,
        };
        let (graph, root) = build_definitions(&self.statements, root, &stop, &self.build_options())?;
        let outcome = evaluate(&graph.wrap(root), self.max_eval_steps);
        match outcome.into_result() {
            Ok(Constant::Bool(true)) => {}
            Ok(_) => {
                return Err(CompilerError::type_error(
                    &p.site,
                    format!("value {} is not a valid {} for parameter {name}", value.to_json(), p.ty),
                ))
            }
            Err(e) => {
                return Err(CompilerError::type_error(
                    &p.site,
                    format!("cannot validate the value of parameter {name}: {e}"),
                ))
            }
        }
        self.overrides.insert(name.to_string(), value);
        self.cache.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_json::parse_module_value;
    use serde_json::{json, Value};

    fn program(statements: Value) -> Program {
        let main = parse_module_value(&json!({
            "schema_version": vallum_contracts::VALLUM_AST_SCHEMA_VERSION,
            "kind": "testing",
            "name": "p",
            "statements": statements,
        }))
        .expect("parse");
        Program::new(main, Vec::new()).expect("check")
    }

    fn sample() -> Program {
        program(json!([
            {"kind": "const", "name": "LIMIT", "type": "Int", "value": ["*", 6, 7]},
            {"kind": "const", "name": "OWNER", "type": "ByteArray", "value": ["bytes", "abcd"]},
            {"kind": "func", "name": "main", "args": [{"name": "x", "type": "Int"}], "returns": "Bool",
             "body": ["&&", ["<", "x", "LIMIT"], ["==", ["." , "OWNER", "length"], 2]]}
        ]))
    }

    #[test]
    fn undeclared_parameters_are_reference_errors() {
        let mut p = sample();
        let err = p.parameter_value("MISSING").expect_err("undeclared");
        assert_eq!(err.kind, CompileErrorKind::Reference);
        assert!(err.message.contains("MISSING"), "{}", err.message);
        let err = p.set_parameter("MISSING", Data::Int(1)).expect_err("undeclared");
        assert_eq!(err.kind, CompileErrorKind::Reference);
    }

    #[test]
    fn parameter_values_are_computed_and_overridden() {
        let mut p = sample();
        assert_eq!(
            p.parameter_types(),
            vec![
                ("LIMIT".to_string(), Type::int()),
                ("OWNER".to_string(), Type::bytes())
            ]
        );
        assert_eq!(p.parameter_value("LIMIT").expect("value"), Data::Int(42));
        assert_eq!(p.parameter_value("OWNER").expect("value"), Data::bytes(vec![0xab, 0xcd]));

        let err = p.set_parameter("LIMIT", Data::bytes(vec![1])).expect_err("not an Int");
        assert_eq!(err.kind, CompileErrorKind::Type);
        p.set_parameter("LIMIT", Data::Int(7)).expect("valid Int");
        assert_eq!(p.parameter_value("LIMIT").expect("value"), Data::Int(7));
    }

    #[test]
    fn parametric_compile_leaves_holes() {
        let p = sample();
        let parametric = p.compile_parametric(&["LIMIT".to_string()]).expect("parametric");
        assert_eq!(parametric.parameters, vec![("LIMIT".to_string(), Type::int())]);
        assert!(parametric.ir.free_names().contains(&"__PARAM_0".to_string()));
        let ir = parametric.instantiate(&[Data::Int(10)]).expect("instantiate");
        assert!(ir.free_names().iter().all(|n| n.starts_with("__core__")));
        assert!(parametric.instantiate(&[]).is_err());

        let err = p.compile_parametric(&["NOPE".to_string()]).expect_err("unknown");
        assert_eq!(err.kind, CompileErrorKind::Reference);
    }

    #[test]
    fn ir_is_stable_across_requests() {
        let p = sample();
        let a = p.to_ir().expect("ir").to_string();
        let b = p.to_ir().expect("ir").to_string();
        assert_eq!(a, b);
    }
}
