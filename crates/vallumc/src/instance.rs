use std::fmt::Display;

use crate::ir::IrExpr;
use crate::types::{FuncType, ParamType, Type};

/// What a value-level expression evaluates to during type checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instance {
    Data(Type),
    Func(FuncType),
    /// A generic function whose type parameters are not bound yet.
    Parametric(ParametricFunc),
    /// An expression that never returns normally (`error(...)`).
    Void,
    /// The result of a call to a multi-return function.
    Multi(Vec<Type>),
}

/// A generic function value. Binding its parameters yields the mangled
/// instance path `path[P0@P1…]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParametricFunc {
    pub name: String,
    pub params: Vec<ParamType>,
    pub ty: FuncType,
    pub path: String,
    /// Receiver of a generic method, applied before the call arguments.
    pub receiver: Option<Box<IrExpr>>,
}

impl ParametricFunc {
    /// Concrete signature and lowering for the given type arguments.
    pub fn instantiate(&self, types: &[Type]) -> (FuncType, IrExpr) {
        let ty = self.ty.substitute(&|p| {
            if p.owner == self.params.first()?.owner {
                types.get(p.index).cloned()
            } else {
                None
            }
        });
        let holes: Vec<String> = types.iter().map(Type::path).collect();
        let path = format!("{}[{}]", self.path, holes.join("@"));
        let ir = match &self.receiver {
            Some(recv) => IrExpr::call_named(&path, vec![(**recv).clone()]),
            None => IrExpr::name(path),
        };
        (ty, ir)
    }
}

impl Instance {
    pub fn data_type(&self) -> Option<&Type> {
        match self {
            Instance::Data(t) => Some(t),
            _ => None,
        }
    }

    /// The type a binding of this instance carries, if it has one.
    pub fn as_type(&self) -> Option<Type> {
        match self {
            Instance::Data(t) => Some(t.clone()),
            Instance::Func(f) => Some(Type::Func(f.clone())),
            _ => None,
        }
    }

    pub fn from_type(t: &Type) -> Instance {
        match t {
            Type::Func(f) => Instance::Func(f.clone()),
            other => Instance::Data(other.clone()),
        }
    }

    /// Instance produced by calling a function with these return types.
    pub fn from_returns(returns: &[Type]) -> Instance {
        match returns {
            [single] => Instance::from_type(single),
            many => Instance::Multi(many.to_vec()),
        }
    }

    /// True if a value of this instance may be used where `expected` is required.
    pub fn fits(&self, expected: &Type) -> bool {
        match self {
            Instance::Void => true,
            Instance::Data(t) => expected.is_base_of(t),
            Instance::Func(f) => expected.is_base_of(&Type::Func(f.clone())),
            Instance::Parametric(_) | Instance::Multi(_) => false,
        }
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instance::Data(t) => write!(f, "{t}"),
            Instance::Func(ft) => write!(f, "{ft}"),
            Instance::Parametric(p) => {
                let names: Vec<&str> = p.params.iter().map(|p| p.name.as_ref()).collect();
                write!(f, "[{}]{}", names.join(", "), p.ty)
            }
            Instance::Void => f.write_str("Void"),
            Instance::Multi(ts) => {
                let parts: Vec<String> = ts.iter().map(Type::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

/// Result of a type-level lookup: either a type (`Option[Int]::Some`) or a value
/// (`Int::from_data`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalEntity {
    Type(Type),
    Value(Instance),
}
