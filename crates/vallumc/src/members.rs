//! Member tables of builtin and user types.
//!
//! Every member resolves to an `Instance` plus the IR path implementing it.
//! Instance members are curried: `path(self)` yields the field value or the
//! method closure. Type members are referenced by path directly.

use crate::check::Phase;
use crate::defs::{DefTable, ImplKind};
use crate::instance::{EvalEntity, Instance, ParametricFunc};
use crate::types::{
    member_path, BuiltinType, FuncArg, FuncType, ParamType, Type, TypeClass, UserKind,
};

pub const EQ: &str = "__eq";
pub const NEQ: &str = "__neq";
pub const TO_DATA: &str = "__to_data";
pub const FROM_DATA: &str = "from_data";
pub const IS_VALID_DATA: &str = "is_valid_data";
pub const NEW: &str = "__new";
pub const COPY: &str = "copy";
pub const SERIALIZE: &str = "serialize";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub inst: Instance,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeMember {
    Type(Type),
    Value(Member),
}

impl TypeMember {
    pub fn entity(&self) -> EvalEntity {
        match self {
            TypeMember::Type(t) => EvalEntity::Type(t.clone()),
            TypeMember::Value(m) => EvalEntity::Value(m.inst.clone()),
        }
    }
}

pub fn to_data_path(t: &Type) -> String {
    member_path(&t.path(), TO_DATA)
}

pub fn from_data_path(t: &Type) -> String {
    member_path(&t.path(), FROM_DATA)
}

pub fn is_valid_data_path(t: &Type) -> String {
    member_path(&t.path(), IS_VALID_DATA)
}

pub fn constructor_path(t: &Type) -> String {
    member_path(&t.path(), NEW)
}

fn func(args: Vec<Type>, ret: Type) -> Instance {
    Instance::Func(FuncType::new(args, ret))
}

fn value(t: Type) -> Instance {
    Instance::Data(t)
}

fn bi(b: BuiltinType) -> Type {
    Type::Builtin(b)
}

/// Builtin record field tables: `(record, field, constructor field index, type)`.
pub fn record_fields() -> Vec<(BuiltinType, &'static str, usize, Type)> {
    use BuiltinType as B;
    vec![
        (B::TxOutputId, "tx_id", 0, bi(B::TxId)),
        (B::TxOutputId, "index", 1, Type::int()),
        (B::Address, "credential", 0, bi(B::Credential)),
        (B::CredentialPubKey, "hash", 0, bi(B::PubKeyHash)),
        (B::CredentialValidator, "hash", 0, bi(B::ValidatorHash)),
        (B::TxOutput, "address", 0, bi(B::Address)),
        (B::TxOutput, "value", 1, bi(B::Value)),
        (B::TxInput, "output_id", 0, bi(B::TxOutputId)),
        (B::TxInput, "output", 1, bi(B::TxOutput)),
        (B::Tx, "inputs", 0, Type::list(bi(B::TxInput))),
        (B::Tx, "ref_inputs", 1, Type::list(bi(B::TxInput))),
        (B::Tx, "outputs", 2, Type::list(bi(B::TxOutput))),
        (B::Tx, "fee", 3, bi(B::Value)),
        (B::Tx, "minted", 4, bi(B::Value)),
        (B::Tx, "signatories", 8, Type::list(bi(B::PubKeyHash))),
        (B::Tx, "id", 11, bi(B::TxId)),
        (B::ScriptContext, "tx", 0, bi(B::Tx)),
    ]
}

pub const HASH_TYPES: [BuiltinType; 5] = [
    BuiltinType::PubKeyHash,
    BuiltinType::ValidatorHash,
    BuiltinType::MintingPolicyHash,
    BuiltinType::StakingValidatorHash,
    BuiltinType::DatumHash,
];

fn is_hash(b: &BuiltinType) -> bool {
    HASH_TYPES.contains(b)
}

/// Hash types with a `CURRENT` member, available after `main`.
pub fn has_current_member(b: &BuiltinType) -> bool {
    matches!(
        b,
        BuiltinType::ValidatorHash
            | BuiltinType::MintingPolicyHash
            | BuiltinType::StakingValidatorHash
    )
}

fn comparisons(self_ty: &Type) -> Vec<(&'static str, Instance)> {
    ["__lt", "__leq", "__gt", "__geq"]
        .into_iter()
        .map(|op| (op, func(vec![self_ty.clone()], Type::bool())))
        .collect()
}

fn arithmetic(self_ty: &Type, ops: &[&'static str]) -> Vec<(&'static str, Instance)> {
    ops.iter()
        .map(|op| (*op, func(vec![self_ty.clone()], self_ty.clone())))
        .collect()
}

/// Generic method with one type parameter of its own, named after the method.
fn generic_method(
    owner_path: &str,
    name: &str,
    build: impl Fn(Type) -> FuncType,
) -> Instance {
    let path = member_path(owner_path, name);
    let p = ParamType {
        owner: path.as_str().into(),
        index: 0,
        name: "B".into(),
        class: TypeClass::Any,
    };
    Instance::Parametric(ParametricFunc {
        name: name.to_string(),
        ty: build(Type::Param(p.clone())),
        params: vec![p],
        path,
        receiver: None,
    })
}

fn builtin_instance_members(b: &BuiltinType, self_ty: &Type) -> Vec<(&'static str, Instance)> {
    use BuiltinType as B;
    let mut out: Vec<(&'static str, Instance)> = Vec::new();
    match b {
        B::Int => {
            out.extend(arithmetic(self_ty, &["__add", "__sub", "__mul", "__div", "__mod"]));
            out.extend(comparisons(self_ty));
            out.push(("__neg", value(Type::int())));
            out.push(("abs", func(vec![], Type::int())));
            out.push(("show", func(vec![], Type::string())));
            out.push(("to_bool", func(vec![], Type::bool())));
            out.push(("to_real", func(vec![], bi(B::Real))));
        }
        B::Real => {
            out.extend(arithmetic(self_ty, &["__add", "__sub", "__mul", "__div"]));
            out.extend(comparisons(self_ty));
            out.push(("__neg", value(self_ty.clone())));
            out.push(("floor", func(vec![], Type::int())));
        }
        B::Bool => {
            out.push(("__not", value(Type::bool())));
            out.push(("to_int", func(vec![], Type::int())));
            out.push(("show", func(vec![], Type::string())));
        }
        B::String => {
            out.extend(arithmetic(self_ty, &["__add"]));
            out.push(("encode_utf8", func(vec![], Type::bytes())));
        }
        B::ByteArray => {
            out.extend(arithmetic(self_ty, &["__add"]));
            out.extend(comparisons(self_ty));
            out.push(("length", value(Type::int())));
            out.push(("slice", func(vec![Type::int(), Type::int()], Type::bytes())));
            out.push(("sha2", func(vec![], Type::bytes())));
            out.push(("decode_utf8", func(vec![], Type::string())));
            out.push(("show", func(vec![], Type::string())));
            out.push(("starts_with", func(vec![Type::bytes()], Type::bool())));
        }
        B::Data => {
            out.push(("tag", value(Type::int())));
        }
        B::List(item) => {
            let item = (**item).clone();
            let path = self_ty.path();
            let pred = Type::func(vec![item.clone()], Type::bool());
            out.extend(arithmetic(self_ty, &["__add"]));
            out.push(("length", value(Type::int())));
            out.push(("head", value(item.clone())));
            out.push(("tail", value(self_ty.clone())));
            out.push(("is_empty", func(vec![], Type::bool())));
            out.push(("get", func(vec![Type::int()], item.clone())));
            out.push(("prepend", func(vec![item.clone()], self_ty.clone())));
            out.push(("any", func(vec![pred.clone()], Type::bool())));
            out.push(("all", func(vec![pred.clone()], Type::bool())));
            out.push(("filter", func(vec![pred.clone()], self_ty.clone())));
            out.push(("find", func(vec![pred.clone()], item.clone())));
            out.push(("find_safe", func(vec![pred], Type::option(item.clone()))));
            let map_item = item.clone();
            out.push((
                "map",
                generic_method(&path, "map", move |b| {
                    FuncType::new(
                        vec![Type::func(vec![map_item.clone()], b.clone())],
                        Type::list(b),
                    )
                }),
            ));
            out.push((
                "fold",
                generic_method(&path, "fold", move |b| {
                    FuncType::new(
                        vec![Type::func(vec![b.clone(), item.clone()], b.clone()), b.clone()],
                        b,
                    )
                }),
            ));
        }
        B::Map(k, v) => {
            let (k, v) = ((**k).clone(), (**v).clone());
            let path = self_ty.path();
            let pred = Type::func(vec![k.clone(), v.clone()], Type::bool());
            out.push(("length", value(Type::int())));
            out.push(("is_empty", func(vec![], Type::bool())));
            out.push(("get", func(vec![k.clone()], v.clone())));
            out.push(("get_safe", func(vec![k.clone()], Type::option(v.clone()))));
            out.push(("prepend", func(vec![k.clone(), v.clone()], self_ty.clone())));
            out.push(("delete", func(vec![k.clone()], self_ty.clone())));
            out.push(("all", func(vec![pred.clone()], Type::bool())));
            out.push(("any", func(vec![pred.clone()], Type::bool())));
            out.push(("filter", func(vec![pred], self_ty.clone())));
            out.push(("keys", func(vec![], Type::list(k.clone()))));
            out.push(("values", func(vec![], Type::list(v.clone()))));
            out.push((
                "fold",
                generic_method(&path, "fold", move |c| {
                    FuncType::new(
                        vec![
                            Type::func(vec![c.clone(), k.clone(), v.clone()], c.clone()),
                            c.clone(),
                        ],
                        c,
                    )
                }),
            ));
        }
        B::Option(item) => {
            out.push(("unwrap", func(vec![], (**item).clone())));
            out.push(("is_some", func(vec![], Type::bool())));
        }
        B::OptionSome(item) => {
            out.push(("some", value((**item).clone())));
            // Variants see their enum's members; paths stay on the variant.
            out.push(("unwrap", func(vec![], (**item).clone())));
            out.push(("is_some", func(vec![], Type::bool())));
        }
        h if is_hash(h) => {
            out.extend(comparisons(self_ty));
            out.push(("bytes", value(Type::bytes())));
            out.push(("show", func(vec![], Type::string())));
        }
        B::TxId => {
            out.push(("bytes", value(Type::bytes())));
            out.push(("show", func(vec![], Type::string())));
        }
        B::Value => {
            out.push(("lovelace", value(Type::int())));
            out.push((
                "get",
                func(vec![bi(B::MintingPolicyHash), Type::bytes()], Type::int()),
            ));
            out.push((
                "contains_policy",
                func(vec![bi(B::MintingPolicyHash)], Type::bool()),
            ));
        }
        B::Tx => {
            out.push(("is_signed_by", func(vec![bi(B::PubKeyHash)], Type::bool())));
        }
        B::ScriptContext => {
            out.push((
                "get_current_minting_policy_hash",
                func(vec![], bi(B::MintingPolicyHash)),
            ));
            out.push(("get_spending_output_id", func(vec![], bi(B::TxOutputId))));
            out.push(("get_current_input", func(vec![], bi(B::TxInput))));
        }
        _ => {}
    }
    for (owner, name, _, ty) in record_fields() {
        if &owner == b {
            out.push((name, value(ty)));
        }
    }
    out
}

fn builtin_type_members(
    b: &BuiltinType,
    self_ty: &Type,
    phase: Phase,
) -> Vec<(&'static str, TypeMemberSpec)> {
    use BuiltinType as B;
    let mut out: Vec<(&'static str, TypeMemberSpec)> = Vec::new();
    match b {
        B::Int => {
            out.push(("min", TypeMemberSpec::Value(func(vec![Type::int(), Type::int()], Type::int()))));
            out.push(("max", TypeMemberSpec::Value(func(vec![Type::int(), Type::int()], Type::int()))));
        }
        B::List(item) => {
            out.push((
                "new_const",
                TypeMemberSpec::Value(func(vec![Type::int(), (**item).clone()], self_ty.clone())),
            ));
        }
        B::Option(item) => {
            out.push((
                "Some",
                TypeMemberSpec::Type(bi(B::OptionSome(item.clone()))),
            ));
            out.push(("None", TypeMemberSpec::Value(value(self_ty.clone()))));
        }
        B::Credential => {
            out.push(("PubKey", TypeMemberSpec::Type(bi(B::CredentialPubKey))));
            out.push(("Validator", TypeMemberSpec::Type(bi(B::CredentialValidator))));
            out.push((
                "new_pubkey",
                TypeMemberSpec::Value(func(vec![bi(B::PubKeyHash)], self_ty.clone())),
            ));
            out.push((
                "new_validator",
                TypeMemberSpec::Value(func(vec![bi(B::ValidatorHash)], self_ty.clone())),
            ));
        }
        h if is_hash(h) => {
            out.push((
                "new",
                TypeMemberSpec::Value(func(vec![Type::bytes()], self_ty.clone())),
            ));
            if has_current_member(h) && phase == Phase::PostMain {
                out.push(("CURRENT", TypeMemberSpec::Value(value(self_ty.clone()))));
            }
        }
        B::TxId => {
            out.push((
                "new",
                TypeMemberSpec::Value(func(vec![Type::bytes()], self_ty.clone())),
            ));
        }
        B::TxOutputId => {
            out.push((
                "new",
                TypeMemberSpec::Value(func(vec![bi(B::TxId), Type::int()], self_ty.clone())),
            ));
        }
        B::Address => {
            out.push((
                "new",
                TypeMemberSpec::Value(func(vec![bi(B::Credential)], self_ty.clone())),
            ));
        }
        B::Value => {
            out.push(("ZERO", TypeMemberSpec::Value(value(self_ty.clone()))));
            out.push((
                "from_lovelace",
                TypeMemberSpec::Value(func(vec![Type::int()], self_ty.clone())),
            ));
        }
        _ => {}
    }
    out
}

enum TypeMemberSpec {
    Type(Type),
    Value(Instance),
}

/// Fields of builtin variants that can be built with a `new` expression.
pub fn builtin_constructor_fields(b: &BuiltinType) -> Option<Vec<(&'static str, Type)>> {
    match b {
        BuiltinType::OptionSome(item) => Some(vec![("some", (**item).clone())]),
        BuiltinType::CredentialPubKey => Some(vec![("hash", bi(BuiltinType::PubKeyHash))]),
        BuiltinType::CredentialValidator => {
            Some(vec![("hash", bi(BuiltinType::ValidatorHash))])
        }
        _ => None,
    }
}

/// A case a `switch` over a value of some enum-like type can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchVariant {
    pub name: String,
    pub index: usize,
    /// Type of the case binding; `None` when the variant carries nothing to bind.
    pub ty: Option<Type>,
}

pub fn switch_variants(defs: &DefTable, t: &Type) -> Option<Vec<SwitchVariant>> {
    match t {
        Type::Builtin(BuiltinType::Option(item)) => Some(vec![
            SwitchVariant {
                name: "Some".to_string(),
                index: 0,
                ty: Some(bi(BuiltinType::OptionSome(item.clone()))),
            },
            SwitchVariant {
                name: "None".to_string(),
                index: 1,
                ty: None,
            },
        ]),
        Type::Builtin(BuiltinType::Credential) => Some(vec![
            SwitchVariant {
                name: "PubKey".to_string(),
                index: 0,
                ty: Some(bi(BuiltinType::CredentialPubKey)),
            },
            SwitchVariant {
                name: "Validator".to_string(),
                index: 1,
                ty: Some(bi(BuiltinType::CredentialValidator)),
            },
        ]),
        Type::User(u) if u.kind == UserKind::Enum => Some(
            defs.get(u.def)
                .variants()
                .iter()
                .filter_map(|v| {
                    Some(SwitchVariant {
                        name: v.name.clone(),
                        index: v.index,
                        ty: Some(Type::User(defs.variant_type(u.def, v.index)?)),
                    })
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Members every data type has, whatever its kind.
fn auto_instance_members(self_ty: &Type) -> Vec<(&'static str, Instance)> {
    vec![
        (EQ, func(vec![self_ty.clone()], Type::bool())),
        (NEQ, func(vec![self_ty.clone()], Type::bool())),
        (SERIALIZE, func(vec![], Type::bytes())),
    ]
}

fn auto_type_members(self_ty: &Type) -> Vec<(&'static str, Instance)> {
    vec![
        (FROM_DATA, func(vec![Type::data()], self_ty.clone())),
        (IS_VALID_DATA, func(vec![Type::data()], Type::bool())),
    ]
}

/// Members a type class requires, with `Self` replaced by `self_ty`.
pub fn class_requirements(class: TypeClass, self_ty: &Type) -> Vec<(&'static str, Instance)> {
    match class {
        TypeClass::Any => Vec::new(),
        TypeClass::Ord => comparisons(self_ty),
        TypeClass::Num => arithmetic(self_ty, &["__add", "__sub", "__mul"]),
        TypeClass::Show => vec![("show", func(vec![], Type::string()))],
    }
}

pub fn implements_class(defs: &DefTable, class: TypeClass, t: &Type) -> bool {
    class_requirements(class, t).into_iter().all(|(name, req)| {
        match instance_member(defs, t, name) {
            Ok(m) => match (req.as_type(), m.inst.as_type()) {
                (Some(r), Some(have)) => r.is_base_of(&have),
                _ => false,
            },
            Err(_) => false,
        }
    })
}

fn copy_signature(defs: &DefTable, t: &Type) -> Instance {
    let args = match t {
        Type::User(u) => defs
            .fields_of(u)
            .iter()
            .map(|f| FuncArg::named(&f.name, f.ty.clone(), true))
            .collect(),
        _ => Vec::new(),
    };
    Instance::Func(FuncType {
        args,
        returns: vec![t.clone()],
    })
}

/// All instance members of `t` in resolution order.
fn instance_members(defs: &DefTable, t: &Type) -> Vec<(String, Member)> {
    let path = t.path();
    let mut out: Vec<(String, Member)> = Vec::new();
    let mut push = |name: &str, inst: Instance, path: String| {
        if !out.iter().any(|(n, _)| n == name) {
            out.push((name.to_string(), Member { inst, path }));
        }
    };
    for (name, inst) in auto_instance_members(t) {
        push(name, inst, member_path(&path, name));
    }
    match t {
        Type::Builtin(b) => {
            for (name, inst) in builtin_instance_members(b, t) {
                push(name, inst, member_path(&path, name));
            }
        }
        Type::User(u) => {
            if u.kind != UserKind::Enum {
                push(COPY, copy_signature(defs, t), member_path(&path, COPY));
            }
            for f in defs.fields_of(u) {
                push(&f.name, Instance::from_type(&f.ty), member_path(&path, &f.name));
            }
            let def = defs.get(u.def);
            for m in def.impl_members.iter().filter(|m| m.kind == ImplKind::Method) {
                push(&m.name, m.inst.clone(), m.path.clone());
            }
        }
        Type::Param(p) => {
            for (name, inst) in class_requirements(p.class, t) {
                push(name, inst, member_path(&path, name));
            }
        }
        Type::Func(_) => {}
    }
    out
}

/// All type-level members of `t`.
fn type_members(defs: &DefTable, t: &Type, phase: Phase) -> Vec<(String, TypeMember)> {
    let path = t.path();
    let mut out: Vec<(String, TypeMember)> = Vec::new();
    if !t.is_data() {
        return out;
    }
    for (name, inst) in auto_type_members(t) {
        out.push((
            name.to_string(),
            TypeMember::Value(Member {
                inst,
                path: member_path(&path, name),
            }),
        ));
    }
    match t {
        Type::Builtin(b) => {
            for (name, spec) in builtin_type_members(b, t, phase) {
                let tm = match spec {
                    TypeMemberSpec::Type(ty) => TypeMember::Type(ty),
                    TypeMemberSpec::Value(inst) => TypeMember::Value(Member {
                        inst,
                        path: member_path(&path, name),
                    }),
                };
                out.push((name.to_string(), tm));
            }
        }
        Type::User(u) => {
            let def = defs.get(u.def);
            if u.kind == UserKind::Enum {
                for v in def.variants() {
                    if let Some(vt) = defs.variant_type(u.def, v.index) {
                        out.push((v.name.clone(), TypeMember::Type(Type::User(vt))));
                    }
                }
            }
            if u.kind != UserKind::Variant {
                for m in def.impl_members.iter().filter(|m| m.kind != ImplKind::Method) {
                    out.push((
                        m.name.clone(),
                        TypeMember::Value(Member {
                            inst: m.inst.clone(),
                            path: m.path.clone(),
                        }),
                    ));
                }
            }
        }
        Type::Param(_) | Type::Func(_) => {}
    }
    out
}

pub fn instance_member(defs: &DefTable, t: &Type, name: &str) -> Result<Member, String> {
    let members = instance_members(defs, t);
    if let Some((_, m)) = members.iter().find(|(n, _)| n == name) {
        return Ok(m.clone());
    }
    if type_members(defs, t, Phase::PostMain)
        .iter()
        .any(|(n, _)| n == name)
    {
        return Err(format!(
            "{name} is a type member of {t}, not an instance member; use {t}::{name}"
        ));
    }
    Err(not_found(t, name, "instance member", members.iter().map(|(n, _)| n.as_str())))
}

pub fn type_member(
    defs: &DefTable,
    t: &Type,
    name: &str,
    phase: Phase,
) -> Result<TypeMember, String> {
    let members = type_members(defs, t, phase);
    if let Some((_, m)) = members.iter().find(|(n, _)| n == name) {
        return Ok(m.clone());
    }
    if let Type::Builtin(b) = t {
        if name == "CURRENT" && has_current_member(b) {
            return Err(format!(
                "{t}::CURRENT is only available after the entry function"
            ));
        }
    }
    if instance_members(defs, t).iter().any(|(n, _)| n == name) {
        return Err(format!(
            "{name} is an instance member of {t}, not a type member"
        ));
    }
    Err(not_found(t, name, "type member", members.iter().map(|(n, _)| n.as_str())))
}

fn not_found<'a>(
    t: &Type,
    name: &str,
    what: &str,
    candidates: impl Iterator<Item = &'a str>,
) -> String {
    let visible: Vec<&str> = candidates.filter(|c| !c.starts_with("__")).collect();
    match closest_name(name, visible.iter().copied()) {
        Some(s) => format!("{t} has no {what} {name}; did you mean {s}?"),
        None => format!("{t} has no {what} {name}"),
    }
}

/// Closest candidate within edit distance 3.
pub fn closest_name<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let dist = edit_distance(name, candidate);
        if best.is_none_or(|(_, current)| dist < current) {
            best = Some((candidate, dist));
        }
    }
    match best {
        Some((candidate, dist)) if dist <= 3 && candidate != name => Some(candidate),
        _ => None,
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Every builtin member path a program over `sample` types may reference,
/// paired with its owner. Used to check the IR library is complete.
pub fn builtin_member_paths(samples: &[Type]) -> Vec<String> {
    let defs = DefTable::default();
    let mut out = Vec::new();
    for t in samples {
        let path = t.path();
        for (_, m) in instance_members(&defs, t) {
            match &m.inst {
                Instance::Parametric(p) => out.push(format!("{}[__vallum__int]", p.path)),
                _ => out.push(m.path),
            }
        }
        for (name, m) in type_members(&defs, t, Phase::PostMain) {
            if let TypeMember::Value(m) = m {
                if name != "CURRENT" {
                    out.push(m.path);
                }
            }
        }
        out.push(member_path(&path, TO_DATA));
        if let Type::Builtin(b) = t {
            if builtin_constructor_fields(b).is_some() {
                out.push(member_path(&path, NEW));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_use_edit_distance() {
        let err = instance_member(&DefTable::default(), &Type::list(Type::int()), "lenght")
            .expect_err("typo");
        assert!(err.contains("did you mean length?"), "{err}");
        let err = instance_member(&DefTable::default(), &Type::int(), "zzzzzzzz")
            .expect_err("no such member");
        assert!(!err.contains("did you mean"), "{err}");
    }

    #[test]
    fn level_confusion_is_reported() {
        let defs = DefTable::default();
        let err = instance_member(&defs, &Type::int(), "from_data").expect_err("type-level");
        assert!(err.contains("is a type member of Int"), "{err}");
        let err = type_member(&defs, &Type::bytes(), "length", Phase::PreMain)
            .expect_err("instance-level");
        assert!(err.contains("is an instance member of ByteArray"), "{err}");
    }

    #[test]
    fn current_hash_is_post_main_only() {
        let defs = DefTable::default();
        let vh = Type::Builtin(BuiltinType::ValidatorHash);
        let err = type_member(&defs, &vh, "CURRENT", Phase::PreMain).expect_err("pre-main");
        assert!(err.contains("only available after the entry function"), "{err}");
        let m = type_member(&defs, &vh, "CURRENT", Phase::PostMain).expect("post-main");
        assert_eq!(
            m,
            TypeMember::Value(Member {
                inst: Instance::Data(vh),
                path: "__vallum__validatorhash__CURRENT".to_string(),
            })
        );
    }

    #[test]
    fn builtin_classes() {
        let defs = DefTable::default();
        assert!(implements_class(&defs, TypeClass::Ord, &Type::int()));
        assert!(implements_class(&defs, TypeClass::Num, &Type::int()));
        assert!(implements_class(&defs, TypeClass::Show, &Type::bytes()));
        assert!(!implements_class(&defs, TypeClass::Ord, &Type::bool()));
        assert!(!implements_class(&defs, TypeClass::Num, &Type::bytes()));
        assert!(implements_class(&defs, TypeClass::Any, &Type::list(Type::bool())));
    }

    #[test]
    fn generic_methods_are_parametric() {
        let m = instance_member(&DefTable::default(), &Type::list(Type::int()), "map")
            .expect("map");
        match m.inst {
            Instance::Parametric(p) => {
                assert_eq!(p.path, "__vallum__list[__vallum__int]__map");
                assert_eq!(p.params.len(), 1);
            }
            other => panic!("expected parametric, got {other}"),
        }
    }
}
