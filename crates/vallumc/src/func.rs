use crate::compile::{CompilerError, Site};
use crate::instance::Instance;
use crate::ir::IrExpr;
use crate::types::FuncType;

/// One argument as written at a call site.
#[derive(Debug, Clone)]
pub struct CallArg {
    pub site: Site,
    pub name: Option<String>,
    pub inst: Instance,
}

/// Which provided argument fills each declared argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlan {
    pub slots: Vec<Option<usize>>,
    pub result: Instance,
}

impl CallPlan {
    /// Orders lowered argument IR by declared position. Optional arguments are
    /// followed by their `__useopt__` flag; omitted ones pass `()`.
    pub fn lower_args(&self, func: &FuncType, mut provided: Vec<Option<IrExpr>>) -> Vec<IrExpr> {
        let mut out = Vec::new();
        for (decl, slot) in func.args.iter().zip(&self.slots) {
            let value = slot.and_then(|i| provided.get_mut(i).and_then(Option::take));
            let given = value.is_some();
            out.push(value.unwrap_or_else(IrExpr::unit));
            if decl.optional {
                out.push(IrExpr::bool(given));
            }
        }
        out
    }
}

impl FuncType {
    pub fn check_call(&self, site: &Site, args: &[CallArg]) -> Result<CallPlan, CompilerError> {
        let mut slots: Vec<Option<usize>> = vec![None; self.args.len()];
        let mut seen_named = false;
        let mut positional = 0usize;

        for (i, arg) in args.iter().enumerate() {
            match &arg.name {
                None => {
                    if seen_named {
                        return Err(CompilerError::syntax(
                            &arg.site,
                            "positional argument after named argument".to_string(),
                        ));
                    }
                    if positional >= self.args.len() {
                        return Err(CompilerError::type_error(
                            site,
                            format!(
                                "too many arguments: expected at most {}, got {}",
                                self.args.len(),
                                args.iter().filter(|a| a.name.is_none()).count()
                            ),
                        ));
                    }
                    slots[positional] = Some(i);
                    positional += 1;
                }
                Some(name) => {
                    seen_named = true;
                    let Some(pos) = self
                        .args
                        .iter()
                        .position(|a| a.name.as_deref() == Some(name.as_str()))
                    else {
                        return Err(CompilerError::type_error(
                            &arg.site,
                            format!("function {self} has no argument named {name}"),
                        ));
                    };
                    if pos < positional {
                        return Err(CompilerError::type_error(
                            &arg.site,
                            format!("argument {name} is already given positionally"),
                        ));
                    }
                    if slots[pos].is_some() {
                        return Err(CompilerError::syntax(
                            &arg.site,
                            format!("duplicate named argument {name}"),
                        ));
                    }
                    slots[pos] = Some(i);
                }
            }
        }

        for (pos, (decl, slot)) in self.args.iter().zip(&slots).enumerate() {
            match slot {
                None if !decl.optional => {
                    let what = decl
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("#{}", pos + 1));
                    return Err(CompilerError::type_error(
                        site,
                        format!("missing argument {what} in call to {self}"),
                    ));
                }
                None => {}
                Some(i) => {
                    let arg = &args[*i];
                    if matches!(arg.inst, Instance::Multi(_)) {
                        return Err(CompilerError::type_error(
                            &arg.site,
                            "a multi-valued expression cannot be used as an argument".to_string(),
                        ));
                    }
                    if !arg.inst.fits(&decl.ty) {
                        return Err(CompilerError::type_error(
                            &arg.site,
                            format!(
                                "argument #{} of call: expected {}, got {}",
                                pos + 1,
                                decl.ty,
                                arg.inst
                            ),
                        ));
                    }
                }
            }
        }

        Ok(CallPlan {
            slots,
            result: Instance::from_returns(&self.returns),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::CompileErrorKind;
    use crate::types::{FuncArg, Type};

    fn site() -> Site {
        Site::new("m", "/x")
    }

    fn arg(name: Option<&str>, t: Type) -> CallArg {
        CallArg {
            site: site(),
            name: name.map(str::to_string),
            inst: Instance::Data(t),
        }
    }

    fn sig() -> FuncType {
        FuncType {
            args: vec![
                FuncArg::named("a", Type::int(), false),
                FuncArg::named("b", Type::bool(), true),
                FuncArg::named("c", Type::bytes(), true),
            ],
            returns: vec![Type::int()],
        }
    }

    #[test]
    fn positional_and_named_fill_slots() {
        let plan = sig()
            .check_call(&site(), &[arg(None, Type::int()), arg(Some("c"), Type::bytes())])
            .expect("valid call");
        assert_eq!(plan.slots, vec![Some(0), None, Some(1)]);
        assert_eq!(plan.result, Instance::Data(Type::int()));

        let lowered = plan.lower_args(
            &sig(),
            vec![Some(IrExpr::int(1)), Some(IrExpr::bytes(vec![1]))],
        );
        let text: Vec<String> = lowered.iter().map(|e| e.to_string()).collect();
        assert_eq!(text, vec!["1", "()", "false", "#01", "true"]);
    }

    #[test]
    fn named_argument_already_positional() {
        let err = sig()
            .check_call(&site(), &[arg(None, Type::int()), arg(Some("a"), Type::int())])
            .expect_err("a given twice");
        assert_eq!(err.kind, CompileErrorKind::Type);
        assert!(err.message.contains("already given positionally"), "{}", err.message);
    }

    #[test]
    fn missing_and_mismatched_arguments() {
        let err = sig().check_call(&site(), &[]).expect_err("a is required");
        assert!(err.message.contains("missing argument a"), "{}", err.message);

        let err = sig()
            .check_call(&site(), &[arg(None, Type::bool())])
            .expect_err("wrong type");
        assert!(err.message.contains("expected Int, got Bool"), "{}", err.message);

        let err = sig()
            .check_call(&site(), &[arg(Some("zz"), Type::int())])
            .expect_err("unknown name");
        assert!(err.message.contains("no argument named zz"), "{}", err.message);
    }

    #[test]
    fn too_many_positional() {
        let f = FuncType::new(vec![Type::int()], Type::int());
        let err = f
            .check_call(&site(), &[arg(None, Type::int()), arg(None, Type::int())])
            .expect_err("too many");
        assert!(err.message.contains("too many arguments"), "{}", err.message);
    }
}
