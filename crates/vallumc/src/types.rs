use std::fmt::Display;
use std::rc::Rc;

/// Handle of a user type definition in the program's definition arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub usize);

pub const BUILTIN_PREFIX: &str = "__vallum__";
pub const MODULE_PREFIX: &str = "__module__";

/// Joins a type path and a member name into the member's IR path.
pub fn member_path(type_path: &str, member: &str) -> String {
    format!("{type_path}__{member}")
}

pub fn user_type_path(module: &str, name: &str) -> String {
    format!("{MODULE_PREFIX}{module}__{name}")
}

/// True when `path` is `base` or one of its member or variant paths.
/// Compares whole `__`-separated segments, so `T` does not contain `T_`'s members.
pub fn is_path_within(path: &str, base: &str) -> bool {
    let mut have = path.split("__");
    base.split("__").all(|seg| have.next() == Some(seg))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Any,
    Ord,
    Num,
    Show,
}

impl TypeClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeClass::Any => "Any",
            TypeClass::Ord => "Ord",
            TypeClass::Num => "Num",
            TypeClass::Show => "Show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Any" => Some(TypeClass::Any),
            "Ord" => Some(TypeClass::Ord),
            "Num" => Some(TypeClass::Num),
            "Show" => Some(TypeClass::Show),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Int,
    Real,
    Bool,
    String,
    ByteArray,
    Data,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Option(Box<Type>),
    OptionSome(Box<Type>),
    PubKeyHash,
    ValidatorHash,
    MintingPolicyHash,
    StakingValidatorHash,
    DatumHash,
    TxId,
    TxOutputId,
    Address,
    Credential,
    CredentialPubKey,
    CredentialValidator,
    Value,
    TxOutput,
    TxInput,
    Tx,
    ScriptContext,
}

/// Builtins that are referenced by a bare name (no type arguments).
pub const NAMED_BUILTINS: &[(&str, BuiltinType)] = &[
    ("Int", BuiltinType::Int),
    ("Real", BuiltinType::Real),
    ("Bool", BuiltinType::Bool),
    ("String", BuiltinType::String),
    ("ByteArray", BuiltinType::ByteArray),
    ("Data", BuiltinType::Data),
    ("PubKeyHash", BuiltinType::PubKeyHash),
    ("ValidatorHash", BuiltinType::ValidatorHash),
    ("MintingPolicyHash", BuiltinType::MintingPolicyHash),
    ("StakingValidatorHash", BuiltinType::StakingValidatorHash),
    ("DatumHash", BuiltinType::DatumHash),
    ("TxId", BuiltinType::TxId),
    ("TxOutputId", BuiltinType::TxOutputId),
    ("Address", BuiltinType::Address),
    ("Credential", BuiltinType::Credential),
    ("Value", BuiltinType::Value),
    ("TxOutput", BuiltinType::TxOutput),
    ("TxInput", BuiltinType::TxInput),
    ("Tx", BuiltinType::Tx),
    ("ScriptContext", BuiltinType::ScriptContext),
];

impl BuiltinType {
    pub fn by_name(name: &str) -> Option<BuiltinType> {
        NAMED_BUILTINS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| t.clone())
    }

    pub fn path(&self) -> String {
        let simple = match self {
            BuiltinType::Int => "int",
            BuiltinType::Real => "real",
            BuiltinType::Bool => "bool",
            BuiltinType::String => "string",
            BuiltinType::ByteArray => "bytearray",
            BuiltinType::Data => "data",
            BuiltinType::List(item) => return format!("{BUILTIN_PREFIX}list[{}]", item.path()),
            BuiltinType::Map(k, v) => {
                return format!("{BUILTIN_PREFIX}map[{}@{}]", k.path(), v.path())
            }
            BuiltinType::Option(item) => {
                return format!("{BUILTIN_PREFIX}option[{}]", item.path())
            }
            BuiltinType::OptionSome(item) => {
                return format!("{BUILTIN_PREFIX}option[{}]__some", item.path())
            }
            BuiltinType::PubKeyHash => "pubkeyhash",
            BuiltinType::ValidatorHash => "validatorhash",
            BuiltinType::MintingPolicyHash => "mintingpolicyhash",
            BuiltinType::StakingValidatorHash => "stakingvalidatorhash",
            BuiltinType::DatumHash => "datumhash",
            BuiltinType::TxId => "txid",
            BuiltinType::TxOutputId => "txoutputid",
            BuiltinType::Address => "address",
            BuiltinType::Credential => "credential",
            BuiltinType::CredentialPubKey => "credential__pubkey",
            BuiltinType::CredentialValidator => "credential__validator",
            BuiltinType::Value => "value",
            BuiltinType::TxOutput => "txoutput",
            BuiltinType::TxInput => "txinput",
            BuiltinType::Tx => "tx",
            BuiltinType::ScriptContext => "scriptcontext",
        };
        format!("{BUILTIN_PREFIX}{simple}")
    }

    /// Nominal, covariant in item/key/value types; a variant is-a its enum.
    pub fn is_base_of(&self, other: &BuiltinType) -> bool {
        use BuiltinType as B;
        match (self, other) {
            (B::List(a), B::List(b)) => a.is_base_of(b),
            (B::Map(ak, av), B::Map(bk, bv)) => ak.is_base_of(bk) && av.is_base_of(bv),
            (B::Option(a), B::Option(b) | B::OptionSome(b)) => a.is_base_of(b),
            (B::OptionSome(a), B::OptionSome(b)) => a.is_base_of(b),
            (B::Credential, B::Credential | B::CredentialPubKey | B::CredentialValidator) => true,
            (a, b) => !a.has_params() && a == b,
        }
    }

    fn has_params(&self) -> bool {
        matches!(
            self,
            BuiltinType::List(_)
                | BuiltinType::Map(_, _)
                | BuiltinType::Option(_)
                | BuiltinType::OptionSome(_)
        )
    }

    pub fn type_args(&self) -> Vec<&Type> {
        match self {
            BuiltinType::List(t) | BuiltinType::Option(t) | BuiltinType::OptionSome(t) => vec![t],
            BuiltinType::Map(k, v) => vec![k, v],
            _ => Vec::new(),
        }
    }

    fn map_args(&self, f: &dyn Fn(&Type) -> Type) -> BuiltinType {
        match self {
            BuiltinType::List(t) => BuiltinType::List(Box::new(f(t))),
            BuiltinType::Option(t) => BuiltinType::Option(Box::new(f(t))),
            BuiltinType::OptionSome(t) => BuiltinType::OptionSome(Box::new(f(t))),
            BuiltinType::Map(k, v) => BuiltinType::Map(Box::new(f(k)), Box::new(f(v))),
            other => other.clone(),
        }
    }
}

impl Display for BuiltinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuiltinType::List(t) => write!(f, "List[{t}]"),
            BuiltinType::Map(k, v) => write!(f, "Map[{k}]{v}"),
            BuiltinType::Option(t) => write!(f, "Option[{t}]"),
            BuiltinType::OptionSome(t) => write!(f, "Option[{t}]::Some"),
            BuiltinType::CredentialPubKey => f.write_str("Credential::PubKey"),
            BuiltinType::CredentialValidator => f.write_str("Credential::Validator"),
            other => {
                let name = NAMED_BUILTINS
                    .iter()
                    .find(|(_, t)| t == other)
                    .map(|(n, _)| *n)
                    .unwrap_or("?");
                f.write_str(name)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserKind {
    Struct,
    Enum,
    Variant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserType {
    pub def: DefId,
    /// Index of the variant within its enum for `UserKind::Variant`.
    pub variant: Option<usize>,
    pub kind: UserKind,
    /// Display name: `Datum`, `Action::Claim`.
    pub name: Rc<str>,
    pub path: Rc<str>,
}

/// A type parameter of one generic function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamType {
    pub owner: Rc<str>,
    pub index: usize,
    pub name: Rc<str>,
    pub class: TypeClass,
}

impl ParamType {
    pub fn path(&self) -> String {
        format!("${}", self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncArg {
    pub name: Option<String>,
    pub ty: Type,
    pub optional: bool,
}

impl FuncArg {
    pub fn required(ty: Type) -> Self {
        Self {
            name: None,
            ty,
            optional: false,
        }
    }

    pub fn named(name: &str, ty: Type, optional: bool) -> Self {
        Self {
            name: Some(name.to_string()),
            ty,
            optional,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    pub args: Vec<FuncArg>,
    pub returns: Vec<Type>,
}

impl FuncType {
    pub fn new(args: Vec<Type>, ret: Type) -> Self {
        Self {
            args: args.into_iter().map(FuncArg::required).collect(),
            returns: vec![ret],
        }
    }

    pub fn required_count(&self) -> usize {
        self.args.iter().filter(|a| !a.optional).count()
    }

    /// Contravariant in arguments, covariant in returns.
    pub fn is_base_of(&self, other: &FuncType) -> bool {
        self.args.len() == other.args.len()
            && self.returns.len() == other.returns.len()
            && self
                .args
                .iter()
                .zip(&other.args)
                .all(|(a, b)| a.optional == b.optional && b.ty.is_base_of(&a.ty))
            && self
                .returns
                .iter()
                .zip(&other.returns)
                .all(|(a, b)| a.is_base_of(b))
    }

    pub fn substitute(&self, f: &dyn Fn(&ParamType) -> Option<Type>) -> FuncType {
        FuncType {
            args: self
                .args
                .iter()
                .map(|a| FuncArg {
                    name: a.name.clone(),
                    ty: a.ty.substitute(f),
                    optional: a.optional,
                })
                .collect(),
            returns: self.returns.iter().map(|t| t.substitute(f)).collect(),
        }
    }
}

impl Display for FuncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("(")?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if let Some(name) = &a.name {
                write!(f, "{name}: ")?;
            }
            if a.optional {
                f.write_str("?")?;
            }
            write!(f, "{}", a.ty)?;
        }
        f.write_str(") -> ")?;
        if self.returns.len() == 1 {
            write!(f, "{}", self.returns[0])
        } else {
            f.write_str("(")?;
            for (i, r) in self.returns.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{r}")?;
            }
            f.write_str(")")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Builtin(BuiltinType),
    User(UserType),
    Param(ParamType),
    Func(FuncType),
}

impl Type {
    pub fn int() -> Type {
        Type::Builtin(BuiltinType::Int)
    }

    pub fn bool() -> Type {
        Type::Builtin(BuiltinType::Bool)
    }

    pub fn string() -> Type {
        Type::Builtin(BuiltinType::String)
    }

    pub fn bytes() -> Type {
        Type::Builtin(BuiltinType::ByteArray)
    }

    pub fn data() -> Type {
        Type::Builtin(BuiltinType::Data)
    }

    pub fn list(item: Type) -> Type {
        Type::Builtin(BuiltinType::List(Box::new(item)))
    }

    pub fn map(k: Type, v: Type) -> Type {
        Type::Builtin(BuiltinType::Map(Box::new(k), Box::new(v)))
    }

    pub fn option(item: Type) -> Type {
        Type::Builtin(BuiltinType::Option(Box::new(item)))
    }

    pub fn func(args: Vec<Type>, ret: Type) -> Type {
        Type::Func(FuncType::new(args, ret))
    }

    /// Symbolic path used to name this type's members in IR.
    pub fn path(&self) -> String {
        match self {
            Type::Builtin(b) => b.path(),
            Type::User(u) => u.path.to_string(),
            Type::Param(p) => p.path(),
            Type::Func(_) => String::new(),
        }
    }

    pub fn is_data(&self) -> bool {
        !matches!(self, Type::Func(_))
    }

    pub fn as_builtin(&self) -> Option<&BuiltinType> {
        match self {
            Type::Builtin(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Builtin(BuiltinType::Bool))
    }

    pub fn is_base_of(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Builtin(a), Type::Builtin(b)) => a.is_base_of(b),
            (Type::User(a), Type::User(b)) => {
                a.def == b.def && (a.variant == b.variant || a.kind == UserKind::Enum)
            }
            (Type::Param(a), Type::Param(b)) => a == b,
            (Type::Func(a), Type::Func(b)) => a.is_base_of(b),
            _ => false,
        }
    }

    /// Replaces type parameters for which `f` has a binding.
    pub fn substitute(&self, f: &dyn Fn(&ParamType) -> Option<Type>) -> Type {
        match self {
            Type::Param(p) => f(p).unwrap_or_else(|| self.clone()),
            Type::Builtin(b) => Type::Builtin(b.map_args(&|t| t.substitute(f))),
            Type::Func(ft) => Type::Func(ft.substitute(f)),
            Type::User(_) => self.clone(),
        }
    }

    pub fn contains_params(&self) -> bool {
        match self {
            Type::Param(_) => true,
            Type::Builtin(b) => b.type_args().iter().any(|t| t.contains_params()),
            Type::Func(ft) => {
                ft.args.iter().any(|a| a.ty.contains_params())
                    || ft.returns.iter().any(Type::contains_params)
            }
            Type::User(_) => false,
        }
    }

    /// Nesting depth of type arguments; bounds monomorphization.
    pub fn depth(&self) -> usize {
        match self {
            Type::Builtin(b) => {
                1 + b.type_args().iter().map(|t| t.depth()).max().unwrap_or(0)
            }
            Type::Func(ft) => {
                1 + ft
                    .args
                    .iter()
                    .map(|a| a.ty.depth())
                    .chain(ft.returns.iter().map(Type::depth))
                    .max()
                    .unwrap_or(0)
            }
            Type::User(_) | Type::Param(_) => 1,
        }
    }

    /// The name entry-contract keywords are matched against.
    pub fn keyword_name(&self) -> String {
        match self {
            Type::User(u) => u.name.to_string(),
            other => other.to_string(),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Builtin(b) => write!(f, "{b}"),
            Type::User(u) => f.write_str(&u.name),
            Type::Param(p) => f.write_str(&p.name),
            Type::Func(ft) => write!(f, "{ft}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(def: usize, path: &str, kind: UserKind) -> Type {
        Type::User(UserType {
            def: DefId(def),
            variant: (kind == UserKind::Variant).then_some(0),
            kind,
            name: path.rsplit("__").next().unwrap_or(path).into(),
            path: path.into(),
        })
    }

    fn samples() -> Vec<Type> {
        vec![
            Type::int(),
            Type::bool(),
            Type::bytes(),
            Type::Builtin(BuiltinType::PubKeyHash),
            Type::list(Type::int()),
            Type::list(Type::bool()),
            Type::map(Type::bytes(), Type::int()),
            Type::map(Type::int(), Type::int()),
            Type::option(Type::int()),
            Type::Builtin(BuiltinType::OptionSome(Box::new(Type::int()))),
            Type::Builtin(BuiltinType::Credential),
            Type::Builtin(BuiltinType::CredentialPubKey),
        ]
    }

    #[test]
    fn mutual_base_iff_identical() {
        for a in samples() {
            for b in samples() {
                let mutual = a.is_base_of(&b) && b.is_base_of(&a);
                assert_eq!(mutual, a == b, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn variants_are_subtypes() {
        let opt = Type::option(Type::int());
        let some = Type::Builtin(BuiltinType::OptionSome(Box::new(Type::int())));
        assert!(opt.is_base_of(&some));
        assert!(!some.is_base_of(&opt));

        let e = user(0, "__module__m__Action", UserKind::Enum);
        let v = user(0, "__module__m__Action__Claim", UserKind::Variant);
        let other = user(1, "__module__m__ActionLog", UserKind::Struct);
        assert!(e.is_base_of(&v));
        assert!(!v.is_base_of(&e));
        assert!(!e.is_base_of(&other));
        assert!(Type::list(e.clone()).is_base_of(&Type::list(v)));
    }

    #[test]
    fn path_containment_is_by_segment() {
        assert!(is_path_within("__module__m__T", "__module__m__T"));
        assert!(is_path_within("__module__m__T__new", "__module__m__T"));
        assert!(is_path_within("__module__m__E__V__from_data", "__module__m__E"));
        assert!(!is_path_within("__module__m__T_x__new", "__module__m__T"));
        assert!(!is_path_within("__module__m__Ta", "__module__m__T"));
    }

    #[test]
    fn sibling_types_sharing_a_name_prefix_are_unrelated() {
        let t = user(0, "__module__m__T", UserKind::Struct);
        let t_v = user(1, "__module__m__T___V", UserKind::Variant);
        assert!(!t.is_base_of(&t_v));
        assert!(!t_v.is_base_of(&t));
    }

    #[test]
    fn function_subtyping() {
        let e = user(0, "__module__m__E", UserKind::Enum);
        let v = user(0, "__module__m__E__V", UserKind::Variant);
        let takes_enum = Type::func(vec![e.clone()], v.clone());
        let takes_variant = Type::func(vec![v], e);
        assert!(takes_variant.is_base_of(&takes_enum));
        assert!(!takes_enum.is_base_of(&takes_variant));
    }

    #[test]
    fn paths_and_names() {
        let t = Type::map(Type::bytes(), Type::list(Type::int()));
        assert_eq!(
            t.path(),
            "__vallum__map[__vallum__bytearray@__vallum__list[__vallum__int]]"
        );
        assert_eq!(t.to_string(), "Map[ByteArray]List[Int]");
        assert_eq!(
            Type::Builtin(BuiltinType::OptionSome(Box::new(Type::int()))).path(),
            "__vallum__option[__vallum__int]__some"
        );
        assert_eq!(Type::Builtin(BuiltinType::ScriptContext).keyword_name(), "ScriptContext");
        assert_eq!(member_path("__vallum__int", "__add"), "__vallum__int____add");
    }
}
