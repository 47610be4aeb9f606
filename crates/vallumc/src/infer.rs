//! Single-pass inference of generic type parameters at call sites.
//!
//! Declared argument types are walked in lock-step with the concrete argument
//! types. The first occurrence of a parameter binds it; later occurrences must
//! agree with the existing binding, which is never overwritten.

use crate::defs::DefTable;
use crate::instance::{Instance, ParametricFunc};
use crate::members;
use crate::types::{BuiltinType, ParamType, Type, TypeClass};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    params: Vec<ParamType>,
    slots: Vec<Option<Type>>,
}

impl Bindings {
    pub fn new(params: &[ParamType]) -> Self {
        Self {
            params: params.to_vec(),
            slots: vec![None; params.len()],
        }
    }

    fn slot_of(&self, p: &ParamType) -> Option<usize> {
        self.params.iter().position(|q| q == p)
    }

    pub fn get(&self, p: &ParamType) -> Option<&Type> {
        self.slot_of(p).and_then(|i| self.slots[i].as_ref())
    }

    /// Binds `p` to `t`, checking the parameter's class. A later match must
    /// name the same type; a base or variant of the binding is an error.
    pub fn bind(&mut self, defs: &DefTable, p: &ParamType, t: &Type) -> Result<(), String> {
        let Some(i) = self.slot_of(p) else {
            return Ok(());
        };
        if let Some(prev) = &self.slots[i] {
            if prev == t {
                return Ok(());
            }
            return Err(format!(
                "type parameter {} is already bound to {prev}, got {t}; supply explicit type arguments",
                p.name
            ));
        }
        if !t.is_data() {
            return Err(format!(
                "type parameter {} must be a data type, got {t}",
                p.name
            ));
        }
        if !members::implements_class(defs, p.class, t) {
            return Err(format!(
                "{t} does not implement type class {} required by {}",
                p.class.as_str(),
                p.name
            ));
        }
        self.slots[i] = Some(t.clone());
        Ok(())
    }

    /// All bindings in parameter order, or the first unbound parameter.
    pub fn resolved(&self) -> Result<Vec<Type>, &ParamType> {
        self.slots
            .iter()
            .zip(&self.params)
            .map(|(s, p)| s.clone().ok_or(p))
            .collect()
    }

    pub fn substitute(&self, t: &Type) -> Type {
        t.substitute(&|p| self.get(p).cloned())
    }
}

/// Walks `declared` against `actual`, binding parameters of `bindings`.
///
/// Structural mismatches are not reported here; the caller re-checks the
/// substituted signature and produces the type error.
pub fn infer(
    defs: &DefTable,
    declared: &Type,
    actual: &Type,
    bindings: &mut Bindings,
) -> Result<(), String> {
    match (declared, actual) {
        (Type::Param(p), _) => bindings.bind(defs, p, actual),
        (Type::Builtin(d), Type::Builtin(a)) => {
            use BuiltinType as B;
            match (d, a) {
                (B::List(d), B::List(a))
                | (B::Option(d), B::Option(a) | B::OptionSome(a))
                | (B::OptionSome(d), B::OptionSome(a)) => infer(defs, d, a, bindings),
                (B::Map(dk, dv), B::Map(ak, av)) => {
                    infer(defs, dk, ak, bindings)?;
                    infer(defs, dv, av, bindings)
                }
                _ => Ok(()),
            }
        }
        (Type::Func(d), Type::Func(a)) => {
            for (da, aa) in d.args.iter().zip(&a.args) {
                infer(defs, &da.ty, &aa.ty, bindings)?;
            }
            for (dr, ar) in d.returns.iter().zip(&a.returns) {
                infer(defs, dr, ar, bindings)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Infers the type arguments of a generic call from its argument instances.
///
/// `named` arguments are matched to declared arguments by name.
pub fn infer_call(
    defs: &DefTable,
    func: &ParametricFunc,
    positional: &[Instance],
    named: &[(String, Instance)],
) -> Result<Vec<Type>, String> {
    let mut bindings = Bindings::new(&func.params);
    let mut walk = |declared: &Type, actual: &Instance| -> Result<(), String> {
        match actual.as_type() {
            Some(t) => infer(defs, declared, &t, &mut bindings),
            None => Ok(()),
        }
    };
    for (arg, actual) in func.ty.args.iter().zip(positional) {
        walk(&arg.ty, actual)?;
    }
    for (name, actual) in named {
        if let Some(arg) = func.ty.args.iter().find(|a| a.name.as_deref() == Some(name)) {
            walk(&arg.ty, actual)?;
        }
    }
    bindings.resolved().map_err(|p| {
        format!(
            "cannot infer type parameter {} of {}; supply explicit type arguments",
            p.name, func.name
        )
    })
}

/// Checks explicit type arguments against a generic function's parameters.
pub fn check_explicit(
    defs: &DefTable,
    func: &ParametricFunc,
    types: &[Type],
) -> Result<(), String> {
    if types.len() != func.params.len() {
        return Err(format!(
            "{} expects {} type argument(s), got {}",
            func.name,
            func.params.len(),
            types.len()
        ));
    }
    let mut bindings = Bindings::new(&func.params);
    for (p, t) in func.params.iter().zip(types) {
        bindings.bind(defs, p, t)?;
    }
    Ok(())
}

pub fn class_of(name: &str) -> Result<TypeClass, String> {
    TypeClass::parse(name).ok_or_else(|| {
        format!("unknown type class {name:?} (expected Any|Ord|Num|Show)")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FuncType;

    fn param(index: usize, name: &str, class: TypeClass) -> ParamType {
        ParamType {
            owner: "__module__m__f".into(),
            index,
            name: name.into(),
            class,
        }
    }

    #[test]
    fn first_match_binds_and_is_never_overwritten() {
        let defs = DefTable::default();
        let t = param(0, "T", TypeClass::Any);
        let mut b = Bindings::new(std::slice::from_ref(&t));
        infer(&defs, &Type::list(Type::Param(t.clone())), &Type::list(Type::int()), &mut b)
            .expect("bind");
        assert_eq!(b.get(&t), Some(&Type::int()));

        // Idempotent on the same input.
        let before = b.clone();
        infer(&defs, &Type::Param(t.clone()), &Type::int(), &mut b).expect("same type");
        assert_eq!(b, before);

        let err = infer(&defs, &Type::Param(t.clone()), &Type::bool(), &mut b).expect_err("conflict");
        assert!(err.contains("already bound to Int"), "{err}");
        assert_eq!(b.get(&t), Some(&Type::int()));
    }

    #[test]
    fn rebinding_needs_the_same_type_in_either_order() {
        let defs = DefTable::default();
        let t = param(0, "T", TypeClass::Any);
        let some = Type::Builtin(BuiltinType::OptionSome(Box::new(Type::int())));
        let opt = Type::option(Type::int());
        for (first, second) in [(&opt, &some), (&some, &opt)] {
            let mut b = Bindings::new(std::slice::from_ref(&t));
            b.bind(&defs, &t, first).expect("first match binds");
            let err = b.bind(&defs, &t, second).expect_err("base and variant differ");
            assert!(err.contains("supply explicit type arguments"), "{err}");
            assert_eq!(b.get(&t), Some(first));
        }
    }

    #[test]
    fn class_constraints_are_checked() {
        let defs = DefTable::default();
        let t = param(0, "T", TypeClass::Ord);
        let mut b = Bindings::new(std::slice::from_ref(&t));
        let err = b.bind(&defs, &t, &Type::bool()).expect_err("Bool is not Ord");
        assert!(err.contains("does not implement type class Ord"), "{err}");
        b.bind(&defs, &t, &Type::int()).expect("Int is Ord");
    }

    #[test]
    fn unbound_parameters_ask_for_explicit_arguments() {
        let defs = DefTable::default();
        let a = param(0, "A", TypeClass::Any);
        let r = param(1, "R", TypeClass::Any);
        let func = ParametricFunc {
            name: "convert".to_string(),
            params: vec![a.clone(), r.clone()],
            ty: FuncType::new(vec![Type::Param(a)], Type::Param(r)),
            path: "__module__m__convert".to_string(),
            receiver: None,
        };
        let err = infer_call(&defs, &func, &[Instance::Data(Type::int())], &[]).expect_err("R unbound");
        assert!(err.contains("cannot infer type parameter R"), "{err}");
        assert!(err.contains("supply explicit type arguments"), "{err}");
    }

    #[test]
    fn function_arguments_bind_returns() {
        let defs = DefTable::default();
        let b_param = param(0, "B", TypeClass::Any);
        let func = ParametricFunc {
            name: "map".to_string(),
            params: vec![b_param.clone()],
            ty: FuncType::new(
                vec![Type::func(vec![Type::int()], Type::Param(b_param))],
                Type::list(Type::int()),
            ),
            path: "__vallum__list[__vallum__int]__map".to_string(),
            receiver: None,
        };
        let actual = Instance::Func(FuncType::new(vec![Type::int()], Type::bool()));
        let types = infer_call(&defs, &func, &[actual], &[]).expect("infer");
        assert_eq!(types, vec![Type::bool()]);
        let (_, ir) = func.instantiate(&types);
        assert_eq!(ir.to_string(), "__vallum__list[__vallum__int]__map[__vallum__bool]");
    }
}
