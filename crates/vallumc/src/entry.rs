//! Entry-function contracts and the wrapper the chain invokes.

use vallum_purposes::{EntrySlot, ScriptPurpose};

use crate::ast::FuncDecl;
use crate::compile::{CompilerError, Site};
use crate::diagnostics::Diagnostic;
use crate::instance::Instance;
use crate::ir::IrExpr;
use crate::members;
use crate::types::{FuncType, Type};

const REJECTED: &str = "transaction rejected";

/// The checked `main` of the main module.
pub struct EntryFunction<'a> {
    pub decl: &'a FuncDecl,
    pub inst: &'a Instance,
    pub path: &'a str,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub root: IrExpr,
    pub warnings: Vec<Diagnostic>,
}

struct EntryArg<'a> {
    ty: &'a Type,
    placeholder: bool,
    site: &'a Site,
}

/// Validates `main` against the purpose's contract and builds the wrapper.
pub fn lower_entry(purpose: ScriptPurpose, main: EntryFunction<'_>) -> Result<Entry, CompilerError> {
    let site = &main.decl.site;
    let ty = match main.inst {
        Instance::Func(ty) => ty,
        Instance::Parametric(_) => {
            return Err(CompilerError::type_error(
                site,
                "main cannot have type parameters".to_string(),
            ))
        }
        other => {
            return Err(CompilerError::internal(format!("main has instance {other}")));
        }
    };
    if let Some(a) = main.decl.args.iter().find(|a| a.default.is_some()) {
        return Err(CompilerError::type_error(
            &a.site,
            format!("argument {} of main cannot have a default value", a.name),
        ));
    }
    if ty.args.len() != main.decl.args.len() {
        return Err(CompilerError::internal(
            "main signature does not match its declaration".to_string(),
        ));
    }
    let args: Vec<EntryArg<'_>> = ty
        .args
        .iter()
        .zip(&main.decl.args)
        .map(|(a, d)| EntryArg {
            ty: &a.ty,
            placeholder: d.name == "_",
            site: &d.site,
        })
        .collect();
    if let Some(a) = args.iter().find(|a| !a.ty.is_data()) {
        return Err(CompilerError::type_error(
            a.site,
            format!("arguments of main must be data types, got {}", a.ty),
        ));
    }

    if !purpose.is_validator() {
        return lower_testing(main.path, ty, &args, site);
    }

    let returns_bool = ty.returns.len() == 1 && ty.returns[0].is_bool();
    if !returns_bool {
        return Err(CompilerError::type_error(
            site,
            format!(
                "main of a {purpose} script must return Bool, got {}",
                Instance::from_returns(&ty.returns)
            ),
        ));
    }

    let (slots, warnings) = assign_slots(purpose, &args, site)?;
    let contract = purpose.entry_slots();
    let params: Vec<&str> = contract
        .iter()
        .enumerate()
        .map(|(j, slot)| {
            if slots.iter().any(|s| *s == j) {
                slot.wrapper_arg()
            } else {
                "_"
            }
        })
        .collect();
    let call_args = args
        .iter()
        .zip(&slots)
        .map(|(a, &j)| {
            let raw = IrExpr::name(contract[j].wrapper_arg());
            if a.placeholder {
                raw
            } else {
                IrExpr::call_named(&members::from_data_path(a.ty), vec![raw])
            }
        })
        .collect();
    let body = IrExpr::if_then_else(
        IrExpr::call_named(main.path, call_args),
        IrExpr::unit(),
        IrExpr::error(REJECTED),
    );
    tracing::debug!(%purpose, ?slots, "entry wrapper built");
    Ok(Entry {
        root: IrExpr::lambda(params, body),
        warnings,
    })
}

fn lower_testing(
    path: &str,
    ty: &FuncType,
    args: &[EntryArg<'_>],
    site: &Site,
) -> Result<Entry, CompilerError> {
    let ret = match ty.returns.as_slice() {
        [t] if t.is_data() => t,
        [t] => {
            return Err(CompilerError::type_error(
                site,
                format!("main must return a data value, got {t}"),
            ))
        }
        _ => {
            return Err(CompilerError::type_error(
                site,
                format!(
                    "main must return a single value, got {}",
                    Instance::from_returns(&ty.returns)
                ),
            ))
        }
    };
    let params: Vec<String> = (0..args.len()).map(|i| format!("__arg_{i}")).collect();
    let call_args = args
        .iter()
        .zip(&params)
        .map(|(a, p)| {
            if a.placeholder {
                IrExpr::name(p.as_str())
            } else {
                IrExpr::call_named(&members::from_data_path(a.ty), vec![IrExpr::name(p.as_str())])
            }
        })
        .collect();
    let body = IrExpr::call_named(
        &members::to_data_path(ret),
        vec![IrExpr::call_named(path, call_args)],
    );
    let root = if params.is_empty() {
        body
    } else {
        IrExpr::lambda(params, body)
    };
    Ok(Entry {
        root,
        warnings: Vec::new(),
    })
}

/// Contract slot of each argument.
fn assign_slots(
    purpose: ScriptPurpose,
    args: &[EntryArg<'_>],
    site: &Site,
) -> Result<(Vec<usize>, Vec<Diagnostic>), CompilerError> {
    let contract = purpose.entry_slots();
    let arity = contract.len();
    if args.len() > arity {
        return Err(CompilerError::type_error(
            site,
            format!(
                "main of a {purpose} script takes at most {arity} arguments ({}), got {}",
                keywords(contract),
                args.len()
            ),
        ));
    }

    let slot_of = |a: &EntryArg<'_>| -> Result<usize, CompilerError> {
        let name = a.ty.keyword_name();
        EntrySlot::parse_keyword(&name)
            .and_then(|slot| contract.iter().position(|s| *s == slot))
            .ok_or_else(|| {
                CompilerError::type_error(
                    a.site,
                    format!(
                        "unrecognized argument type {name} for main of a {purpose} script (expected {})",
                        keywords(contract)
                    ),
                )
            })
    };

    let strict = args.iter().any(|a| a.placeholder) || args.len() == arity;
    let mut slots: Vec<usize> = Vec::with_capacity(args.len());
    let mut warnings = Vec::new();
    if strict {
        for (i, a) in args.iter().enumerate() {
            if a.placeholder {
                slots.push(i);
                continue;
            }
            let j = slot_of(a)?;
            if slots.contains(&j) {
                return Err(duplicate(a, contract[j]));
            }
            if j != i {
                return Err(CompilerError::type_error(
                    a.site,
                    format!(
                        "{} argument of main is out of order: expected {} at position {}",
                        contract[j].keyword(),
                        contract[i].keyword(),
                        i + 1
                    ),
                ));
            }
            slots.push(j);
        }
        if args.len() != arity {
            return Err(CompilerError::type_error(
                site,
                format!(
                    "main of a {purpose} script takes {arity} arguments ({}); use _ for the ones it ignores",
                    keywords(contract)
                ),
            ));
        }
    } else {
        let message = format!(
            "main of a {purpose} script should declare all {arity} arguments ({}), using _ for ignored ones",
            keywords(contract)
        );
        tracing::warn!(%site, "{message}");
        warnings.push(Diagnostic::deprecation(site, message));
        for a in args {
            let j = slot_of(a)?;
            if slots.contains(&j) {
                return Err(duplicate(a, contract[j]));
            }
            if slots.last().is_some_and(|last| *last > j) {
                return Err(CompilerError::type_error(
                    a.site,
                    format!("{} argument of main is out of order", contract[j].keyword()),
                ));
            }
            slots.push(j);
        }
    }
    Ok((slots, warnings))
}

fn duplicate(a: &EntryArg<'_>, slot: EntrySlot) -> CompilerError {
    CompilerError::type_error(
        a.site,
        format!("duplicate {} argument in main", slot.keyword()),
    )
}

fn keywords(contract: &[EntrySlot]) -> String {
    contract
        .iter()
        .map(|s| s.keyword())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StatementKind;
    use crate::ast_json::parse_module_value;
    use crate::check::{Checker, Phase};
    use crate::compile::CompileErrorKind;
    use crate::scope::Symbol;
    use serde_json::{json, Value};

    /// Checks a module declaring `Datum`, `Redeemer` and a `main` taking
    /// `args` (name, type) that reads every named argument.
    fn lower(kind: &str, args: &[(&str, &str)], returns: &str) -> Result<Entry, CompilerError> {
        let arg_decls: Vec<Value> = args
            .iter()
            .map(|(n, t)| json!({"name": n, "type": t}))
            .collect();
        let mut body = json!(true);
        for (n, _) in args.iter().filter(|(n, _)| *n != "_") {
            body = json!(["&&", ["==", n, n], body]);
        }
        if returns != "Bool" {
            body = json!(["if", body, 1, 2]);
        }
        let m = parse_module_value(&json!({
            "schema_version": vallum_contracts::VALLUM_AST_SCHEMA_VERSION,
            "kind": kind,
            "name": "v",
            "statements": [
                {"kind": "struct", "name": "Datum", "fields": [{"name": "owner", "type": "ByteArray"}]},
                {"kind": "struct", "name": "Redeemer", "fields": [{"name": "n", "type": "Int"}]},
                {"kind": "func", "name": "main", "args": arg_decls, "returns": returns, "body": body}
            ],
        }))
        .expect("parse module");
        let mut c = Checker::new();
        c.check_segment(&m, 0..m.statements.len(), Phase::PreMain, true)?;
        let StatementKind::Func(decl) = &m.statements[2].kind else {
            panic!("main is a function");
        };
        let Some(Symbol::Func { inst, path }) = c.scope("v").and_then(|s| s.get("main")).cloned() else {
            panic!("main is declared");
        };
        let purpose = ScriptPurpose::parse(kind).expect("script kind");
        lower_entry(purpose, EntryFunction { decl, inst: &inst, path: &path })
    }

    #[test]
    fn spending_contract_in_order() {
        let entry = lower(
            "spending",
            &[("d", "Datum"), ("r", "Redeemer"), ("ctx", "ScriptContext")],
            "Bool",
        )
        .expect("valid contract");
        assert!(entry.warnings.is_empty());
        let text = entry.root.to_string();
        assert!(text.starts_with("(__datum, __redeemer, __context) -> {"), "{text}");
        assert!(text.contains("__module__v__Datum__from_data(__datum)"), "{text}");
        assert!(text.contains("__vallum__scriptcontext__from_data(__context)"), "{text}");
        assert!(text.contains("error(\"transaction rejected\")"), "{text}");
    }

    #[test]
    fn out_of_order_and_duplicate_arguments() {
        let err = lower(
            "spending",
            &[("r", "Redeemer"), ("d", "Datum"), ("ctx", "ScriptContext")],
            "Bool",
        )
        .expect_err("out of order");
        assert_eq!(err.kind, CompileErrorKind::Type);
        assert!(err.message.contains("out of order"), "{}", err.message);

        let err = lower(
            "spending",
            &[("d", "Datum"), ("ctx", "ScriptContext"), ("ctx2", "ScriptContext")],
            "Bool",
        )
        .expect_err("ScriptContext twice");
        assert_eq!(err.kind, CompileErrorKind::Type);

        let err = lower("spending", &[("a", "ScriptContext"), ("b", "ScriptContext")], "Bool")
            .expect_err("legacy duplicate");
        assert_eq!(err.kind, CompileErrorKind::Type);
        assert!(err.message.contains("duplicate ScriptContext"), "{}", err.message);

        let err = lower("minting", &[("r", "Redeemer"), ("n", "Int")], "Bool")
            .expect_err("not a keyword");
        assert!(err.message.contains("unrecognized argument type Int"), "{}", err.message);
    }

    #[test]
    fn placeholders_receive_the_raw_slot() {
        let entry = lower(
            "spending",
            &[("_", "Data"), ("r", "Redeemer"), ("ctx", "ScriptContext")],
            "Bool",
        )
        .expect("placeholder datum");
        let text = entry.root.to_string();
        assert!(text.contains("__module__v__main(__datum, __module__v__Redeemer__from_data(__redeemer)"), "{text}");

        let err = lower("spending", &[("_", "Data"), ("r", "Redeemer")], "Bool")
            .expect_err("placeholders need the full arity");
        assert!(err.message.contains("takes 3 arguments"), "{}", err.message);
    }

    #[test]
    fn legacy_short_signatures_warn() {
        let entry = lower("minting", &[("ctx", "ScriptContext")], "Bool").expect("legacy");
        assert_eq!(entry.warnings.len(), 1);
        assert_eq!(entry.warnings[0].code, "VAL-DEPRECATED-0001");
        assert!(entry.root.to_string().starts_with("(_, __context) -> {"));

        let err = lower("staking", &[("ctx", "ScriptContext"), ("r", "Redeemer")], "Bool")
            .expect_err("wrong order");
        assert!(err.message.contains("out of order"), "{}", err.message);
    }

    #[test]
    fn return_types() {
        let err = lower("minting", &[("r", "Redeemer"), ("ctx", "ScriptContext")], "Int")
            .expect_err("validators return Bool");
        assert!(err.message.contains("must return Bool, got Int"), "{}", err.message);

        let entry = lower("testing", &[("a", "Int")], "Int").expect("testing");
        assert_eq!(
            entry.root.to_string(),
            "(__arg_0) -> {\n    __vallum__int____to_data(__module__v__main(__vallum__int__from_data(__arg_0)))\n}"
        );
    }

    #[test]
    fn too_many_arguments() {
        let err = lower(
            "minting",
            &[("r", "Redeemer"), ("ctx", "ScriptContext"), ("d", "Datum")],
            "Bool",
        )
        .expect_err("arity");
        assert!(err.message.contains("at most 2 arguments"), "{}", err.message);
    }
}
