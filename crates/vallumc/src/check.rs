//! Statement evaluation.
//!
//! Walks the statements of each module in three passes (imports and type
//! names, then fields and signatures, then values and bodies), checks every
//! expression against the type model and lowers it to an IR fragment.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::ast::*;
use crate::compile::{CompilerError, Site};
use crate::defs::{DefTable, Field, ImplKind, ImplMember, TypeDefKind};
use crate::func::CallArg;
use crate::infer;
use crate::instance::Instance;
use crate::ir::IrExpr;
use crate::language::ENTRY_FUNCTION;
use crate::members::{self, TypeMember};
use crate::scope::{LocalScope, ModuleScope, Symbol};
use crate::type_ir;
use crate::types::{
    member_path, user_type_path, BuiltinType, DefId, FuncArg, FuncType, ParamType, Type,
    UserKind, NAMED_BUILTINS,
};

/// Whether the statement being checked comes after the entry function.
/// Some builtin members (`ValidatorHash::CURRENT`, …) only exist afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PreMain,
    PostMain,
}

/// A checked expression: what it evaluates to and its lowering.
#[derive(Debug, Clone)]
pub struct Typed {
    pub inst: Instance,
    pub ir: IrExpr,
}

impl Typed {
    fn new(inst: Instance, ir: IrExpr) -> Self {
        Self { inst, ir }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckedKind {
    Import,
    Type,
    Const { path: String, ty: Type },
    Func { path: String, is_main: bool },
}

#[derive(Debug, Clone)]
pub struct CheckedStatement {
    pub module: String,
    pub name: Option<String>,
    pub kind: CheckedKind,
    /// IR definitions contributed by this statement, in order.
    pub defs: Vec<(String, IrExpr)>,
    pub site: Site,
    pub phase: Phase,
}

const RESERVED_MEMBERS: &[&str] = &[
    members::COPY,
    members::SERIALIZE,
    members::FROM_DATA,
    members::IS_VALID_DATA,
];

struct Ctx<'a> {
    module: &'a str,
    phase: Phase,
    type_params: Vec<ParamType>,
    locals: LocalScope,
}

impl<'a> Ctx<'a> {
    fn new(module: &'a str, phase: Phase, type_params: Vec<ParamType>) -> Self {
        Self {
            module,
            phase,
            type_params,
            locals: LocalScope::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Checker {
    defs: DefTable,
    scopes: BTreeMap<String, ModuleScope>,
    checked: Vec<CheckedStatement>,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defs(&self) -> &DefTable {
        &self.defs
    }

    pub fn statements(&self) -> &[CheckedStatement] {
        &self.checked
    }

    pub fn scope(&self, module: &str) -> Option<&ModuleScope> {
        self.scopes.get(module)
    }

    pub fn into_parts(self) -> (DefTable, Vec<CheckedStatement>, BTreeMap<String, ModuleScope>) {
        (self.defs, self.checked, self.scopes)
    }

    fn scope_mut(&mut self, module: &str) -> &mut ModuleScope {
        self.scopes
            .entry(module.to_string())
            .or_insert_with(|| ModuleScope::new(module))
    }

    fn module_scope(&self, module: &str) -> Result<&ModuleScope, CompilerError> {
        self.scopes
            .get(module)
            .ok_or_else(|| CompilerError::internal(format!("module {module} has no scope")))
    }

    /// Checks `module.statements[range]` and appends the results.
    pub fn check_segment(
        &mut self,
        module: &ModuleAst,
        range: Range<usize>,
        phase: Phase,
        is_main_module: bool,
    ) -> Result<(), CompilerError> {
        let name = module.name.as_str();
        let statements = module.statements.get(range.clone()).ok_or_else(|| {
            CompilerError::internal(format!("statement range {range:?} out of bounds in {name}"))
        })?;
        tracing::debug!(module = name, count = statements.len(), ?phase, "checking statements");
        self.scope_mut(name);

        for stmt in statements {
            self.declare_types(name, stmt)?;
        }
        for stmt in statements {
            self.define_fields(name, stmt)?;
        }
        for stmt in statements {
            self.declare_signatures(name, stmt)?;
        }
        let mut impl_const_defs = BTreeMap::new();
        for (i, stmt) in statements.iter().enumerate() {
            let defs = self.check_impl_consts(name, stmt, phase)?;
            impl_const_defs.insert(i, defs);
        }
        for (i, stmt) in statements.iter().enumerate() {
            let pending = impl_const_defs.remove(&i).unwrap_or_default();
            let checked = self.check_statement(name, stmt, phase, is_main_module, pending)?;
            self.checked.push(checked);
        }
        Ok(())
    }

    fn declare_types(&mut self, module: &str, stmt: &Statement) -> Result<(), CompilerError> {
        match &stmt.kind {
            StatementKind::Import { module: from, names } => self.check_import(module, from, names),
            StatementKind::Struct(s) => {
                let id = self.defs.alloc_struct(module, &s.name, &stmt.site);
                let t = Type::User(self.defs.user_type(id));
                self.scope_mut(module).declare(&s.name, Symbol::Type(t), &stmt.site)
            }
            StatementKind::Enum(e) => {
                if e.variants.is_empty() {
                    return Err(CompilerError::syntax(
                        &stmt.site,
                        format!("enum {} has no variants", e.name),
                    ));
                }
                let mut seen = BTreeSet::new();
                for v in &e.variants {
                    if !seen.insert(v.name.as_str()) {
                        return Err(CompilerError::syntax(
                            &v.site,
                            format!("duplicate variant {} in enum {}", v.name, e.name),
                        ));
                    }
                }
                let variants = e
                    .variants
                    .iter()
                    .map(|v| (v.name.clone(), v.site.clone()))
                    .collect();
                let id = self.defs.alloc_enum(module, &e.name, &stmt.site, variants);
                let t = Type::User(self.defs.user_type(id));
                self.scope_mut(module).declare(&e.name, Symbol::Type(t), &stmt.site)
            }
            _ => Ok(()),
        }
    }

    fn check_import(
        &mut self,
        module: &str,
        from: &str,
        names: &[ImportName],
    ) -> Result<(), CompilerError> {
        let mut imported = Vec::new();
        {
            let source = self.module_scope(from)?;
            for n in names {
                let Some(symbol) = source.exported(&n.name) else {
                    let hint = members::closest_name(&n.name, source.names())
                        .map(|s| format!("; did you mean {s}?"))
                        .unwrap_or_default();
                    return Err(CompilerError::reference(
                        &n.site,
                        format!("module {from} has no declaration {}{hint}", n.name),
                    ));
                };
                imported.push((n.local_name().to_string(), symbol.clone(), n.site.clone()));
            }
        }
        let scope = self.scope_mut(module);
        for (name, symbol, site) in imported {
            scope.import(&name, symbol, &site)?;
        }
        Ok(())
    }

    fn user_def_of(&self, module: &str, name: &str) -> Result<DefId, CompilerError> {
        match self.module_scope(module)?.get(name) {
            Some(Symbol::Type(Type::User(u))) => Ok(u.def),
            _ => Err(CompilerError::internal(format!(
                "type {name} was not allocated in {module}"
            ))),
        }
    }

    fn define_fields(&mut self, module: &str, stmt: &Statement) -> Result<(), CompilerError> {
        match &stmt.kind {
            StatementKind::Struct(s) => {
                let fields = self.resolve_fields(module, &s.fields, true)?;
                let id = self.user_def_of(module, &s.name)?;
                if let TypeDefKind::Struct { fields: slot } = &mut self.defs.get_mut(id).kind {
                    *slot = fields;
                }
                Ok(())
            }
            StatementKind::Enum(e) => {
                let mut resolved = Vec::new();
                for v in &e.variants {
                    resolved.push(self.resolve_fields(module, &v.fields, false)?);
                }
                let id = self.user_def_of(module, &e.name)?;
                if let TypeDefKind::Enum { variants } = &mut self.defs.get_mut(id).kind {
                    for (v, fields) in variants.iter_mut().zip(resolved) {
                        v.fields = fields;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn resolve_fields(
        &self,
        module: &str,
        decls: &[FieldDecl],
        tags_allowed: bool,
    ) -> Result<Vec<Field>, CompilerError> {
        let mut names = BTreeSet::new();
        let mut tags = BTreeSet::new();
        let tagged = decls.iter().filter(|f| f.tag.is_some()).count();
        if tagged != 0 && tagged != decls.len() {
            return Err(CompilerError::syntax(
                &decls[0].site,
                "either every field has a tag or none does".to_string(),
            ));
        }
        let mut out = Vec::new();
        for f in decls {
            if !names.insert(f.name.as_str()) {
                return Err(CompilerError::syntax(
                    &f.site,
                    format!("duplicate field {}", f.name),
                ));
            }
            if let Some(tag) = &f.tag {
                if !tags_allowed {
                    return Err(CompilerError::syntax(
                        &f.site,
                        "enum variant fields cannot have tags".to_string(),
                    ));
                }
                if !tags.insert(tag.as_str()) {
                    return Err(CompilerError::syntax(&f.site, format!("duplicate field tag {tag:?}")));
                }
            }
            let ty = self.resolve_type(module, &[], &f.ty)?;
            if !ty.is_data() {
                return Err(CompilerError::type_error(
                    &f.ty.site,
                    format!("field {} must have a data type, got {ty}", f.name),
                ));
            }
            out.push(Field {
                name: f.name.clone(),
                ty,
                tag: f.tag.clone(),
            });
        }
        Ok(out)
    }

    fn declare_signatures(&mut self, module: &str, stmt: &Statement) -> Result<(), CompilerError> {
        match &stmt.kind {
            StatementKind::Func(f) => {
                if f.is_method() {
                    return Err(CompilerError::syntax(
                        &f.site,
                        "self is only allowed on impl functions".to_string(),
                    ));
                }
                let path = user_type_path(module, &f.name);
                let (params, ty) = self.func_signature(module, f, &path, false)?;
                let inst = if params.is_empty() {
                    Instance::Func(ty)
                } else {
                    Instance::Parametric(crate::instance::ParametricFunc {
                        name: f.name.clone(),
                        params,
                        ty,
                        path: path.clone(),
                        receiver: None,
                    })
                };
                self.scope_mut(module)
                    .declare(&f.name, Symbol::Func { inst, path }, &stmt.site)
            }
            StatementKind::Const(c) => {
                let ty = match &c.ty {
                    Some(te) => Some(self.resolve_type(module, &[], te)?),
                    None => None,
                };
                let symbol = Symbol::Const {
                    ty,
                    path: user_type_path(module, &c.name),
                    ready: false,
                };
                self.scope_mut(module).declare(&c.name, symbol, &stmt.site)
            }
            StatementKind::Struct(StructDecl { name, impl_members, .. })
            | StatementKind::Enum(EnumDecl { name, impl_members, .. }) => {
                let id = self.user_def_of(module, name)?;
                for m in impl_members {
                    let ImplDecl::Func(f) = m else {
                        continue;
                    };
                    self.check_member_name(id, &f.name, &f.site)?;
                    if !f.type_params.is_empty() {
                        return Err(CompilerError::syntax(
                            &f.site,
                            format!("impl function {} cannot be generic", f.name),
                        ));
                    }
                    let path = member_path(&self.defs.get(id).path, &f.name);
                    let method = f.is_method();
                    let (_, ty) = self.func_signature(module, f, &path, method)?;
                    self.defs.get_mut(id).impl_members.push(ImplMember {
                        name: f.name.clone(),
                        kind: if method { ImplKind::Method } else { ImplKind::Static },
                        inst: Instance::Func(ty),
                        path,
                        site: f.site.clone(),
                    });
                }
                Ok(())
            }
            StatementKind::Import { .. } => Ok(()),
        }
    }

    fn check_member_name(&self, id: DefId, name: &str, site: &Site) -> Result<(), CompilerError> {
        let def = self.defs.get(id);
        let field_clash = match &def.kind {
            TypeDefKind::Struct { fields } => fields.iter().any(|f| f.name == name),
            TypeDefKind::Enum { variants } => variants.iter().any(|v| v.name == name),
        };
        if field_clash
            || RESERVED_MEMBERS.contains(&name)
            || def.impl_member(name).is_some()
        {
            return Err(CompilerError::syntax(
                site,
                format!("duplicate member {name} on {}", def.name),
            ));
        }
        Ok(())
    }

    /// Type parameters and signature of a function. For methods the `self`
    /// argument is not part of the signature.
    fn func_signature(
        &self,
        module: &str,
        f: &FuncDecl,
        path: &str,
        method: bool,
    ) -> Result<(Vec<ParamType>, FuncType), CompilerError> {
        let mut params: Vec<ParamType> = Vec::new();
        for (index, p) in f.type_params.iter().enumerate() {
            if params.iter().any(|q| *q.name == *p.name) {
                return Err(CompilerError::syntax(
                    &p.site,
                    format!("duplicate type parameter {}", p.name),
                ));
            }
            let class = infer::class_of(p.class.as_deref().unwrap_or("Any"))
                .map_err(|m| CompilerError::reference(&p.site, m))?;
            params.push(ParamType {
                owner: path.into(),
                index,
                name: p.name.as_str().into(),
                class,
            });
        }

        let mut args = Vec::new();
        let mut seen = BTreeSet::new();
        let declared = if method { &f.args[1..] } else { &f.args[..] };
        for a in declared {
            if a.name == "self" {
                return Err(CompilerError::syntax(
                    &a.site,
                    "self must be the first argument".to_string(),
                ));
            }
            if a.name != "_" && !seen.insert(a.name.as_str()) {
                return Err(CompilerError::syntax(
                    &a.site,
                    format!("duplicate argument {}", a.name),
                ));
            }
            let ty = self.arg_type(module, &params, a)?;
            args.push(FuncArg::named(&a.name, ty, a.default.is_some()));
        }
        let returns = f
            .returns
            .iter()
            .map(|t| self.resolve_type(module, &params, t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((params, FuncType { args, returns }))
    }

    fn arg_type(&self, module: &str, params: &[ParamType], a: &ArgDecl) -> Result<Type, CompilerError> {
        match &a.ty {
            Some(te) => self.resolve_type(module, params, te),
            None if a.name == "_" => Ok(Type::data()),
            None => Err(CompilerError::syntax(
                &a.site,
                format!("argument {} needs a type", a.name),
            )),
        }
    }

    pub fn resolve_type(
        &self,
        module: &str,
        params: &[ParamType],
        te: &TypeExpr,
    ) -> Result<Type, CompilerError> {
        let item = |t: &TypeExpr, what: &str| -> Result<Type, CompilerError> {
            let ty = self.resolve_type(module, params, t)?;
            if !ty.is_data() {
                return Err(CompilerError::type_error(
                    &t.site,
                    format!("{what} must be a data type, got {ty}"),
                ));
            }
            Ok(ty)
        };
        match &te.kind {
            TypeExprKind::Named(n) => {
                if let Some(p) = params.iter().find(|p| *p.name == **n) {
                    return Ok(Type::Param(p.clone()));
                }
                if let Some(b) = BuiltinType::by_name(n) {
                    return Ok(Type::Builtin(b));
                }
                if matches!(n.as_str(), "List" | "Map" | "Option") {
                    return Err(CompilerError::syntax(
                        &te.site,
                        format!("{n} requires type arguments"),
                    ));
                }
                let scope = self.module_scope(module)?;
                match scope.get(n) {
                    Some(Symbol::Type(t)) => Ok(t.clone()),
                    Some(_) => Err(CompilerError::reference(
                        &te.site,
                        format!("{n} is a value, not a type"),
                    )),
                    None => {
                        let candidates = scope
                            .names()
                            .filter(|c| matches!(scope.get(c), Some(Symbol::Type(_))))
                            .chain(NAMED_BUILTINS.iter().map(|(n, _)| *n))
                            .chain(params.iter().map(|p| p.name.as_ref()));
                        let hint = members::closest_name(n, candidates)
                            .map(|s| format!("; did you mean {s}?"))
                            .unwrap_or_default();
                        Err(CompilerError::reference(&te.site, format!("unknown type {n}{hint}")))
                    }
                }
            }
            TypeExprKind::List(t) => Ok(Type::list(item(t, "list item type")?)),
            TypeExprKind::Option(t) => Ok(Type::option(item(t, "option item type")?)),
            TypeExprKind::Map(k, v) => Ok(Type::map(
                item(k, "map key type")?,
                item(v, "map value type")?,
            )),
            TypeExprKind::Func { args, returns } => {
                let args = args
                    .iter()
                    .map(|t| self.resolve_type(module, params, t).map(FuncArg::required))
                    .collect::<Result<Vec<_>, _>>()?;
                let returns = returns
                    .iter()
                    .map(|t| self.resolve_type(module, params, t))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::Func(FuncType { args, returns }))
            }
            TypeExprKind::Member(base, name) => {
                let base_ty = self.resolve_type(module, params, base)?;
                match members::type_member(&self.defs, &base_ty, name, Phase::PostMain) {
                    Ok(TypeMember::Type(t)) => Ok(t),
                    Ok(TypeMember::Value(_)) => Err(CompilerError::reference(
                        &te.site,
                        format!("{base_ty}::{name} is a value, not a type"),
                    )),
                    Err(m) => Err(CompilerError::reference(&te.site, m)),
                }
            }
        }
    }

    fn check_impl_consts(
        &mut self,
        module: &str,
        stmt: &Statement,
        phase: Phase,
    ) -> Result<Vec<(String, IrExpr)>, CompilerError> {
        let (name, impl_members) = match &stmt.kind {
            StatementKind::Struct(s) => (&s.name, &s.impl_members),
            StatementKind::Enum(e) => (&e.name, &e.impl_members),
            _ => return Ok(Vec::new()),
        };
        let id = self.user_def_of(module, name)?;
        let mut out = Vec::new();
        for m in impl_members {
            let ImplDecl::Const(c) = m else {
                continue;
            };
            self.check_member_name(id, &c.name, &c.site)?;
            let (ty, ir) = self.check_const_value(module, phase, c)?;
            let path = member_path(&self.defs.get(id).path, &c.name);
            self.defs.get_mut(id).impl_members.push(ImplMember {
                name: c.name.clone(),
                kind: ImplKind::Const,
                inst: Instance::from_type(&ty),
                path: path.clone(),
                site: c.site.clone(),
            });
            out.push((path, ir));
        }
        Ok(out)
    }

    fn check_const_value(
        &mut self,
        module: &str,
        phase: Phase,
        c: &ConstDecl,
    ) -> Result<(Type, IrExpr), CompilerError> {
        let annotated = match &c.ty {
            Some(te) => Some(self.resolve_type(module, &[], te)?),
            None => None,
        };
        let mut cx = Ctx::new(module, phase, Vec::new());
        let value = self.check_expr(&mut cx, &c.value)?;
        let ty = match (annotated, &value.inst) {
            (Some(t), inst) => {
                if !inst.fits(&t) {
                    return Err(CompilerError::type_error(
                        &c.value.site,
                        format!("const {}: expected {t}, got {inst}", c.name),
                    ));
                }
                t
            }
            (None, inst) => inst.as_type().ok_or_else(|| {
                CompilerError::type_error(
                    &c.value.site,
                    format!("cannot infer the type of const {} from {inst}", c.name),
                )
            })?,
        };
        Ok((ty, value.ir))
    }

    fn check_statement(
        &mut self,
        module: &str,
        stmt: &Statement,
        phase: Phase,
        is_main_module: bool,
        impl_const_defs: Vec<(String, IrExpr)>,
    ) -> Result<CheckedStatement, CompilerError> {
        let mut checked = CheckedStatement {
            module: module.to_string(),
            name: stmt.name().map(str::to_string),
            kind: CheckedKind::Import,
            defs: Vec::new(),
            site: stmt.site.clone(),
            phase,
        };
        match &stmt.kind {
            StatementKind::Import { .. } => {}
            StatementKind::Const(c) => {
                let (ty, ir) = self.check_const_value(module, phase, c)?;
                let path = user_type_path(module, &c.name);
                if let Some(Symbol::Const { ty: slot, ready, .. }) = self.scope_mut(module).get_mut(&c.name) {
                    *slot = Some(ty.clone());
                    *ready = true;
                }
                checked.defs.push((path.clone(), ir));
                checked.kind = CheckedKind::Const { path, ty };
            }
            StatementKind::Func(f) => {
                let Some(Symbol::Func { inst, path }) = self.module_scope(module)?.get(&f.name).cloned() else {
                    return Err(CompilerError::internal(format!("function {} was not declared", f.name)));
                };
                let (params, ty, key) = match inst {
                    Instance::Func(ty) => (Vec::new(), ty, path.clone()),
                    Instance::Parametric(p) => {
                        let holes: Vec<String> = p.params.iter().map(ParamType::path).collect();
                        let key = format!("{path}[{}]", holes.join("@"));
                        (p.params, p.ty, key)
                    }
                    other => {
                        return Err(CompilerError::internal(format!(
                            "function {} has instance {other}",
                            f.name
                        )))
                    }
                };
                let ir = self.check_func_body(module, phase, params, f, &ty, None)?;
                checked.defs.push((key, ir));
                checked.kind = CheckedKind::Func {
                    path,
                    is_main: is_main_module && phase == Phase::PreMain && f.name == ENTRY_FUNCTION,
                };
            }
            StatementKind::Struct(StructDecl { name, impl_members, .. })
            | StatementKind::Enum(EnumDecl { name, impl_members, .. }) => {
                let id = self.user_def_of(module, name)?;
                checked.defs = type_ir::generate(&self.defs, id)?;
                checked.defs.extend(impl_const_defs);
                let self_ty = Type::User(self.defs.user_type(id));
                for m in impl_members {
                    let ImplDecl::Func(f) = m else {
                        continue;
                    };
                    let Some(member) = self.defs.get(id).impl_member(&f.name).cloned() else {
                        return Err(CompilerError::internal(format!(
                            "impl function {} was not declared",
                            f.name
                        )));
                    };
                    let Instance::Func(ty) = &member.inst else {
                        return Err(CompilerError::internal(format!(
                            "impl function {} has instance {}",
                            f.name, member.inst
                        )));
                    };
                    let receiver = (member.kind == ImplKind::Method).then(|| self_ty.clone());
                    let ir = self.check_func_body(module, phase, Vec::new(), f, ty, receiver)?;
                    checked.defs.push((member.path.clone(), ir));
                }
                checked.kind = CheckedKind::Type;
            }
        }
        Ok(checked)
    }

    /// Lowers a declared function. Optional arguments are followed by their
    /// `__useopt__` flag; methods are curried over `self`.
    fn check_func_body(
        &mut self,
        module: &str,
        phase: Phase,
        params: Vec<ParamType>,
        f: &FuncDecl,
        ty: &FuncType,
        receiver: Option<Type>,
    ) -> Result<IrExpr, CompilerError> {
        let declared = if receiver.is_some() { &f.args[1..] } else { &f.args[..] };
        let mut cx = Ctx::new(module, phase, params.clone());
        cx.locals.push_frame();
        if let (Some(self_ty), Some(self_arg)) = (&receiver, f.args.first()) {
            cx.locals
                .declare("self", Instance::Data(self_ty.clone()), &self_arg.site)?;
        }
        for (decl, arg) in declared.iter().zip(&ty.args) {
            cx.locals
                .declare(&decl.name, Instance::from_type(&arg.ty), &decl.site)?;
        }
        let body = self.check_expr(&mut cx, &f.body)?;
        check_returns(&body, &ty.returns, &f.body.site)?;
        cx.locals.pop_frame()?;

        let mut body_ir = body.ir;
        let mut arg_names = Vec::new();
        for (decl, arg) in declared.iter().zip(&ty.args).rev() {
            if let Some(default) = &decl.default {
                let mut dcx = Ctx::new(module, phase, params.clone());
                let value = self.check_expr(&mut dcx, default)?;
                if !value.inst.fits(&arg.ty) {
                    return Err(CompilerError::type_error(
                        &default.site,
                        format!("default of {}: expected {}, got {}", decl.name, arg.ty, value.inst),
                    ));
                }
                let flag = format!("__useopt__{}", decl.name);
                body_ir = IrExpr::let_in(
                    &decl.name,
                    IrExpr::if_then_else(IrExpr::name(flag.as_str()), IrExpr::name(decl.name.as_str()), value.ir),
                    body_ir,
                );
                arg_names.push(flag);
            }
            arg_names.push(decl.name.clone());
        }
        arg_names.reverse();
        let lowered = IrExpr::lambda(arg_names, body_ir);
        Ok(match receiver {
            Some(_) => IrExpr::lambda(["self"], lowered),
            None => lowered,
        })
    }

    fn check_expr(&mut self, cx: &mut Ctx<'_>, e: &Expr) -> Result<Typed, CompilerError> {
        let site = &e.site;
        match &e.kind {
            ExprKind::Int(i) => Ok(Typed::new(Instance::Data(Type::int()), IrExpr::int(*i))),
            ExprKind::Real(r) => Ok(Typed::new(
                Instance::Data(Type::Builtin(BuiltinType::Real)),
                IrExpr::int(*r),
            )),
            ExprKind::Bool(b) => Ok(Typed::new(Instance::Data(Type::bool()), IrExpr::bool(*b))),
            ExprKind::Str(s) => Ok(Typed::new(Instance::Data(Type::string()), IrExpr::str(s.as_str()))),
            ExprKind::Bytes(b) => Ok(Typed::new(Instance::Data(Type::bytes()), IrExpr::bytes(b.clone()))),
            ExprKind::Name(n) => self.check_name(cx, n, site),
            ExprKind::TypeMember { ty, name } => {
                let t = self.resolve_type(cx.module, &cx.type_params, ty)?;
                match members::type_member(&self.defs, &t, name, cx.phase) {
                    Ok(TypeMember::Value(m)) => Ok(Typed::new(m.inst, IrExpr::name(m.path))),
                    Ok(TypeMember::Type(t)) => Err(CompilerError::reference(
                        site,
                        format!("{t} is a type, not a value; construct it with new"),
                    )),
                    Err(m) => Err(CompilerError::reference(site, m)),
                }
            }
            ExprKind::Member { object, name } => {
                let obj = self.check_expr(cx, object)?;
                let t = expect_data(&obj, &object.site)?;
                if !t.is_data() {
                    return Err(CompilerError::type_error(site, format!("{t} has no members")));
                }
                let m = members::instance_member(&self.defs, &t, name)
                    .map_err(|m| CompilerError::reference(site, m))?;
                Ok(match m.inst {
                    Instance::Parametric(mut p) => {
                        p.receiver = Some(Box::new(obj.ir));
                        let placeholder = IrExpr::name(p.path.as_str());
                        Typed::new(Instance::Parametric(p), placeholder)
                    }
                    inst => Typed::new(inst, IrExpr::call_named(&m.path, vec![obj.ir])),
                })
            }
            ExprKind::Call { callee, args } => self.check_call(cx, callee, args, site),
            ExprKind::TypeApply { callee, types } => {
                let f = self.check_expr(cx, callee)?;
                let Instance::Parametric(p) = f.inst else {
                    return Err(CompilerError::type_error(
                        site,
                        format!("{} is not generic", f.inst),
                    ));
                };
                let types = types
                    .iter()
                    .map(|t| self.resolve_type(cx.module, &cx.type_params, t))
                    .collect::<Result<Vec<_>, _>>()?;
                infer::check_explicit(&self.defs, &p, &types)
                    .map_err(|m| CompilerError::type_error(site, m))?;
                let (ty, ir) = p.instantiate(&types);
                Ok(Typed::new(Instance::Func(ty), ir))
            }
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(cx, *op, lhs, rhs, site),
            ExprKind::Unary { op, operand } => {
                let v = self.check_expr(cx, operand)?;
                let t = expect_data(&v, &operand.site)?;
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                };
                let m = members::instance_member(&self.defs, &t, op.member()).map_err(|_| {
                    CompilerError::type_error(site, format!("operator {symbol} is not defined for {t}"))
                })?;
                Ok(Typed::new(m.inst, IrExpr::call_named(&m.path, vec![v.ir])))
            }
            ExprKind::If { cond, then, otherwise } => {
                let c = self.check_expr(cx, cond)?;
                expect_fits(&c, &Type::bool(), &cond.site, "if condition")?;
                let a = self.check_expr(cx, then)?;
                let b = self.check_expr(cx, otherwise)?;
                let inst = unify(&self.defs, &a.inst, &b.inst).ok_or_else(|| {
                    CompilerError::type_error(
                        site,
                        format!("if branches have incompatible types {} and {}", a.inst, b.inst),
                    )
                })?;
                Ok(Typed::new(inst, IrExpr::if_then_else(c.ir, a.ir, b.ir)))
            }
            ExprKind::Let { bindings, destructure, value, body } => {
                self.check_let(cx, bindings, *destructure, value, body)
            }
            ExprKind::New { ty, fields } => self.check_new(cx, ty, fields, site),
            ExprKind::Switch { subject, cases, default } => {
                self.check_switch(cx, subject, cases, default.as_deref(), site)
            }
            ExprKind::Lambda { args, returns, body } => {
                let mut fargs = Vec::new();
                for a in args {
                    if a.default.is_some() {
                        return Err(CompilerError::syntax(
                            &a.site,
                            "default values are only allowed on declared functions".to_string(),
                        ));
                    }
                    let ty = self.arg_type(cx.module, &cx.type_params, a)?;
                    fargs.push(FuncArg::named(&a.name, ty, false));
                }
                let returns = returns
                    .iter()
                    .map(|t| self.resolve_type(cx.module, &cx.type_params, t))
                    .collect::<Result<Vec<_>, _>>()?;
                cx.locals.push_frame();
                for (a, fa) in args.iter().zip(&fargs) {
                    cx.locals.declare(&a.name, Instance::from_type(&fa.ty), &a.site)?;
                }
                let b = self.check_expr(cx, body)?;
                check_returns(&b, &returns, &body.site)?;
                cx.locals.pop_frame()?;
                let names: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();
                Ok(Typed::new(
                    Instance::Func(FuncType { args: fargs, returns }),
                    IrExpr::lambda(names, b.ir),
                ))
            }
            ExprKind::List { item, items } => {
                let item_ty = self.resolve_type(cx.module, &cx.type_params, item)?;
                if !item_ty.is_data() {
                    return Err(CompilerError::type_error(
                        &item.site,
                        format!("list item type must be a data type, got {item_ty}"),
                    ));
                }
                let to_data = members::to_data_path(&item_ty);
                let mut lowered = Vec::new();
                for x in items {
                    let v = self.check_expr(cx, x)?;
                    expect_fits(&v, &item_ty, &x.site, "list item")?;
                    lowered.push(IrExpr::call_named(&to_data, vec![v.ir]));
                }
                let nil = IrExpr::call_named("__core__mkNilData", vec![IrExpr::unit()]);
                let ir = lowered.into_iter().rev().fold(nil, |acc, x| {
                    IrExpr::call_named("__core__mkCons", vec![x, acc])
                });
                Ok(Typed::new(Instance::Data(Type::list(item_ty)), ir))
            }
            ExprKind::Map { key, value, entries } => {
                let k_ty = self.resolve_type(cx.module, &cx.type_params, key)?;
                let v_ty = self.resolve_type(cx.module, &cx.type_params, value)?;
                for (t, te) in [(&k_ty, key), (&v_ty, value)] {
                    if !t.is_data() {
                        return Err(CompilerError::type_error(
                            &te.site,
                            format!("map key and value types must be data types, got {t}"),
                        ));
                    }
                }
                let (k_to, v_to) = (members::to_data_path(&k_ty), members::to_data_path(&v_ty));
                let mut lowered = Vec::new();
                for (k, v) in entries {
                    let kt = self.check_expr(cx, k)?;
                    expect_fits(&kt, &k_ty, &k.site, "map key")?;
                    let vt = self.check_expr(cx, v)?;
                    expect_fits(&vt, &v_ty, &v.site, "map value")?;
                    lowered.push(IrExpr::call_named(
                        "__core__mkPairData",
                        vec![
                            IrExpr::call_named(&k_to, vec![kt.ir]),
                            IrExpr::call_named(&v_to, vec![vt.ir]),
                        ],
                    ));
                }
                let nil = IrExpr::call_named("__core__mkNilPairData", vec![IrExpr::unit()]);
                let ir = lowered.into_iter().rev().fold(nil, |acc, x| {
                    IrExpr::call_named("__core__mkCons", vec![x, acc])
                });
                Ok(Typed::new(Instance::Data(Type::map(k_ty, v_ty)), ir))
            }
            ExprKind::Error(msg) => Ok(Typed::new(Instance::Void, IrExpr::error(msg.as_str()))),
            ExprKind::Print { message, body } => {
                let m = self.check_expr(cx, message)?;
                expect_fits(&m, &Type::string(), &message.site, "print message")?;
                let b = self.check_expr(cx, body)?;
                Ok(Typed::new(
                    b.inst,
                    IrExpr::force(IrExpr::call_named("__core__trace", vec![m.ir, IrExpr::delay(b.ir)])),
                ))
            }
            ExprKind::Values(items) => {
                let mut types = Vec::new();
                let mut irs = Vec::new();
                for x in items {
                    let v = self.check_expr(cx, x)?;
                    types.push(expect_data(&v, &x.site)?);
                    irs.push(v.ir);
                }
                Ok(Typed::new(
                    Instance::Multi(types),
                    IrExpr::lambda(["__cb"], IrExpr::call(IrExpr::name("__cb"), irs)),
                ))
            }
        }
    }

    fn check_name(&mut self, cx: &mut Ctx<'_>, name: &str, site: &Site) -> Result<Typed, CompilerError> {
        if let Some(inst) = cx.locals.lookup(name) {
            return Ok(Typed::new(inst, IrExpr::name(name)));
        }
        let scope = self.module_scope(cx.module)?;
        match scope.get(name) {
            Some(Symbol::Func { inst, path }) => Ok(Typed::new(inst.clone(), IrExpr::name(path.as_str()))),
            Some(Symbol::Const { ty: Some(t), path, ready: true }) => {
                Ok(Typed::new(Instance::from_type(t), IrExpr::name(path.as_str())))
            }
            Some(Symbol::Const { .. }) => Err(CompilerError::reference(
                site,
                format!("const {name} is referenced before its declaration"),
            )),
            Some(Symbol::Type(t)) => Err(CompilerError::reference(
                site,
                format!("{t} is a type, not a value"),
            )),
            None => {
                if BuiltinType::by_name(name).is_some() || cx.type_params.iter().any(|p| *p.name == *name) {
                    return Err(CompilerError::reference(site, format!("{name} is a type, not a value")));
                }
                let locals = cx.locals.names();
                let hint = members::closest_name(name, locals.into_iter().chain(scope.names()))
                    .map(|s| format!("; did you mean {s}?"))
                    .unwrap_or_default();
                Err(CompilerError::reference(site, format!("undefined name {name}{hint}")))
            }
        }
    }

    fn check_call(
        &mut self,
        cx: &mut Ctx<'_>,
        callee: &Expr,
        args: &[CallArgExpr],
        site: &Site,
    ) -> Result<Typed, CompilerError> {
        let f = self.check_expr(cx, callee)?;
        let mut call_args = Vec::new();
        let mut lowered = Vec::new();
        for a in args {
            let v = self.check_expr(cx, &a.value)?;
            call_args.push(CallArg {
                site: a.value.site.clone(),
                name: a.name.clone(),
                inst: v.inst,
            });
            lowered.push(Some(v.ir));
        }
        let (ty, callee_ir) = match f.inst {
            Instance::Func(ty) => (ty, f.ir),
            Instance::Parametric(p) => {
                let positional: Vec<Instance> = call_args
                    .iter()
                    .filter(|a| a.name.is_none())
                    .map(|a| a.inst.clone())
                    .collect();
                let named: Vec<(String, Instance)> = call_args
                    .iter()
                    .filter_map(|a| a.name.clone().map(|n| (n, a.inst.clone())))
                    .collect();
                let types = infer::infer_call(&self.defs, &p, &positional, &named)
                    .map_err(|m| CompilerError::type_error(site, m))?;
                p.instantiate(&types)
            }
            other => {
                return Err(CompilerError::type_error(
                    &callee.site,
                    format!("a value of type {other} is not callable"),
                ))
            }
        };
        let plan = ty.check_call(site, &call_args)?;
        let args_ir = plan.lower_args(&ty, lowered);
        Ok(Typed::new(plan.result, IrExpr::call(callee_ir, args_ir)))
    }

    fn check_binary(
        &mut self,
        cx: &mut Ctx<'_>,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        site: &Site,
    ) -> Result<Typed, CompilerError> {
        let l = self.check_expr(cx, lhs)?;
        let Some(member) = op.member() else {
            expect_fits(&l, &Type::bool(), &lhs.site, op.symbol())?;
            let r = self.check_expr(cx, rhs)?;
            expect_fits(&r, &Type::bool(), &rhs.site, op.symbol())?;
            let ir = match op {
                BinaryOp::And => IrExpr::if_then_else(l.ir, r.ir, IrExpr::bool(false)),
                _ => IrExpr::if_then_else(l.ir, IrExpr::bool(true), r.ir),
            };
            return Ok(Typed::new(Instance::Data(Type::bool()), ir));
        };
        let lt = expect_data(&l, &lhs.site)?;
        let undefined = || {
            CompilerError::type_error(
                site,
                format!("operator {} is not defined for {lt}", op.symbol()),
            )
        };
        let m = members::instance_member(&self.defs, &lt, member).map_err(|_| undefined())?;
        let Instance::Func(ty) = &m.inst else {
            return Err(undefined());
        };
        let r = self.check_expr(cx, rhs)?;
        let expected = ty.args.first().map(|a| a.ty.clone()).ok_or_else(undefined)?;
        if !r.inst.fits(&expected) {
            return Err(CompilerError::type_error(
                &rhs.site,
                format!(
                    "operator {} on {lt} expects {expected} on the right, got {}",
                    op.symbol(),
                    r.inst
                ),
            ));
        }
        Ok(Typed::new(
            Instance::from_returns(&ty.returns),
            IrExpr::call(IrExpr::call_named(&m.path, vec![l.ir]), vec![r.ir]),
        ))
    }

    fn check_let(
        &mut self,
        cx: &mut Ctx<'_>,
        bindings: &[LetBinding],
        destructure: bool,
        value: &Expr,
        body: &Expr,
    ) -> Result<Typed, CompilerError> {
        let v = self.check_expr(cx, value)?;
        let annotated = |this: &Self, b: &LetBinding, cx: &Ctx<'_>| -> Result<Option<Type>, CompilerError> {
            b.ty.as_ref()
                .map(|te| this.resolve_type(cx.module, &cx.type_params, te))
                .transpose()
        };

        if !destructure {
            let [b] = bindings else {
                return Err(CompilerError::internal("let without a single binding".to_string()));
            };
            let inst = match (annotated(self, b, &*cx)?, &v.inst) {
                (Some(t), inst) => {
                    if !inst.fits(&t) {
                        return Err(CompilerError::type_error(
                            &value.site,
                            format!("let {}: expected {t}, got {inst}", b.name),
                        ));
                    }
                    Instance::from_type(&t)
                }
                (None, inst @ (Instance::Data(_) | Instance::Func(_))) => inst.clone(),
                (None, Instance::Multi(_)) => {
                    return Err(CompilerError::type_error(
                        &value.site,
                        "a multi-valued expression must be destructured with [a, b, …]".to_string(),
                    ))
                }
                (None, Instance::Parametric(p)) => {
                    return Err(CompilerError::type_error(
                        &value.site,
                        format!("generic function {} must be called or given explicit type arguments", p.name),
                    ))
                }
                (None, Instance::Void) => {
                    return Err(CompilerError::type_error(
                        &value.site,
                        format!("{} is bound to an expression that never returns", b.name),
                    ))
                }
            };
            cx.locals.push_frame();
            cx.locals.declare(&b.name, inst, &b.site)?;
            let body_t = self.check_expr(cx, body)?;
            cx.locals.pop_frame()?;
            return Ok(Typed::new(body_t.inst, IrExpr::let_in(&b.name, v.ir, body_t.ir)));
        }

        let Instance::Multi(types) = &v.inst else {
            return Err(CompilerError::type_error(
                &value.site,
                format!("cannot destructure a single value of type {}", v.inst),
            ));
        };
        if types.len() != bindings.len() {
            return Err(CompilerError::type_error(
                &value.site,
                format!("expected {} values, got {}", bindings.len(), types.len()),
            ));
        }
        cx.locals.push_frame();
        for (b, t) in bindings.iter().zip(types) {
            let ty = match annotated(self, b, &*cx)? {
                Some(declared) => {
                    if !declared.is_base_of(t) {
                        return Err(CompilerError::type_error(
                            &b.site,
                            format!("let {}: expected {declared}, got {t}", b.name),
                        ));
                    }
                    declared
                }
                None => t.clone(),
            };
            cx.locals.declare(&b.name, Instance::Data(ty), &b.site)?;
        }
        let body_t = self.check_expr(cx, body)?;
        cx.locals.pop_frame()?;
        let names: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
        Ok(Typed::new(
            body_t.inst,
            IrExpr::call(v.ir, vec![IrExpr::lambda(names, body_t.ir)]),
        ))
    }

    fn check_new(
        &mut self,
        cx: &mut Ctx<'_>,
        ty: &TypeExpr,
        fields: &NewFields,
        site: &Site,
    ) -> Result<Typed, CompilerError> {
        let t = self.resolve_type(cx.module, &cx.type_params, ty)?;
        let declared: Vec<(String, Type)> = match &t {
            Type::User(u) if u.kind == UserKind::Enum => {
                return Err(CompilerError::type_error(
                    site,
                    format!("cannot construct enum {t} directly; construct one of its variants"),
                ))
            }
            Type::User(u) => self
                .defs
                .fields_of(u)
                .iter()
                .map(|f| (f.name.clone(), f.ty.clone()))
                .collect(),
            Type::Builtin(b) => members::builtin_constructor_fields(b)
                .ok_or_else(|| CompilerError::type_error(site, format!("{t} has no constructor")))?
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
            _ => {
                return Err(CompilerError::type_error(site, format!("{t} has no constructor")));
            }
        };

        let ordered: Vec<&Expr> = match fields {
            NewFields::Positional(values) => {
                if values.len() != declared.len() {
                    return Err(CompilerError::type_error(
                        site,
                        format!("{t} has {} field(s), got {}", declared.len(), values.len()),
                    ));
                }
                values.iter().collect()
            }
            NewFields::Named(values) => {
                let mut by_name: BTreeMap<&str, &Expr> = BTreeMap::new();
                for (name, value) in values {
                    if !declared.iter().any(|(n, _)| n == name) {
                        let hint = members::closest_name(name, declared.iter().map(|(n, _)| n.as_str()))
                            .map(|s| format!("; did you mean {s}?"))
                            .unwrap_or_default();
                        return Err(CompilerError::reference(
                            &value.site,
                            format!("{t} has no field {name}{hint}"),
                        ));
                    }
                    if by_name.insert(name, value).is_some() {
                        return Err(CompilerError::syntax(&value.site, format!("duplicate field {name}")));
                    }
                }
                let mut out = Vec::new();
                for (name, _) in &declared {
                    let value = by_name.get(name.as_str()).ok_or_else(|| {
                        CompilerError::type_error(site, format!("missing field {name} of {t}"))
                    })?;
                    out.push(*value);
                }
                out
            }
        };

        let mut irs = Vec::new();
        for ((name, fty), value) in declared.iter().zip(ordered) {
            let v = self.check_expr(cx, value)?;
            if !v.inst.fits(fty) {
                return Err(CompilerError::type_error(
                    &value.site,
                    format!("field {name} of {t}: expected {fty}, got {}", v.inst),
                ));
            }
            irs.push(v.ir);
        }
        Ok(Typed::new(
            Instance::Data(t.clone()),
            IrExpr::call_named(&members::constructor_path(&t), irs),
        ))
    }

    fn check_switch(
        &mut self,
        cx: &mut Ctx<'_>,
        subject: &Expr,
        cases: &[SwitchCase],
        default: Option<&Expr>,
        site: &Site,
    ) -> Result<Typed, CompilerError> {
        let s = self.check_expr(cx, subject)?;
        let t = expect_data(&s, &subject.site)?;
        let variants = members::switch_variants(&self.defs, &t).ok_or_else(|| {
            CompilerError::type_error(&subject.site, format!("cannot switch on a value of type {t}"))
        })?;

        let mut seen = BTreeSet::new();
        let mut result: Option<Instance> = None;
        let mut branches = Vec::new();
        let mut checked_cases = Vec::new();
        for c in cases {
            let Some(v) = variants.iter().find(|v| v.name == c.variant) else {
                let hint = members::closest_name(&c.variant, variants.iter().map(|v| v.name.as_str()))
                    .map(|s| format!("; did you mean {s}?"))
                    .unwrap_or_default();
                return Err(CompilerError::reference(
                    &c.site,
                    format!("{t} has no variant {}{hint}", c.variant),
                ));
            };
            if !seen.insert(v.index) {
                return Err(CompilerError::syntax(
                    &c.site,
                    format!("duplicate switch case {}", c.variant),
                ));
            }
            checked_cases.push((c, v.clone()));
        }
        for (c, v) in checked_cases {
            cx.locals.push_frame();
            if let Some(b) = &c.binding {
                let bt = v.ty.clone().ok_or_else(|| {
                    CompilerError::type_error(&c.site, format!("{} carries no value to bind", c.variant))
                })?;
                cx.locals.declare(b, Instance::Data(bt), &c.site)?;
            }
            let body = self.check_expr(cx, &c.body)?;
            cx.locals.pop_frame()?;
            join_branch(&self.defs, &mut result, &body.inst, &c.body.site)?;
            let ir = match &c.binding {
                Some(b) => IrExpr::let_in(b, IrExpr::name("__switch"), body.ir),
                None => body.ir,
            };
            branches.push((v.index, ir));
        }
        let mut rest = match default {
            Some(d) => {
                let body = self.check_expr(cx, d)?;
                join_branch(&self.defs, &mut result, &body.inst, &d.site)?;
                Some(body.ir)
            }
            None => {
                if seen.len() < variants.len() {
                    let missing: Vec<&str> = variants
                        .iter()
                        .filter(|v| !seen.contains(&v.index))
                        .map(|v| v.name.as_str())
                        .collect();
                    return Err(CompilerError::type_error(
                        site,
                        format!("switch over {t} is not exhaustive; missing {}", missing.join(", ")),
                    ));
                }
                None
            }
        };
        for (index, ir) in branches.into_iter().rev() {
            rest = Some(match rest {
                None => ir,
                Some(otherwise) => IrExpr::if_then_else(
                    IrExpr::call_named(
                        "__core__equalsInteger",
                        vec![IrExpr::name("__tag"), IrExpr::int(index as i128)],
                    ),
                    ir,
                    otherwise,
                ),
            });
        }
        let chain = rest.ok_or_else(|| CompilerError::syntax(site, "switch has no cases".to_string()))?;
        let tag = IrExpr::call_named(
            "__core__fstPair",
            vec![IrExpr::call_named("__core__unConstrData", vec![IrExpr::name("__switch")])],
        );
        Ok(Typed::new(
            result.unwrap_or(Instance::Void),
            IrExpr::let_in("__switch", s.ir, IrExpr::let_in("__tag", tag, chain)),
        ))
    }
}

fn join_branch(
    defs: &DefTable,
    result: &mut Option<Instance>,
    inst: &Instance,
    at: &Site,
) -> Result<(), CompilerError> {
    *result = Some(match result.take() {
        None => inst.clone(),
        Some(prev) => unify(defs, &prev, inst).ok_or_else(|| {
            CompilerError::type_error(
                at,
                format!("switch cases have incompatible types {prev} and {inst}"),
            )
        })?,
    });
    Ok(())
}

fn expect_data(t: &Typed, site: &Site) -> Result<Type, CompilerError> {
    match &t.inst {
        Instance::Data(ty) => Ok(ty.clone()),
        other => Err(CompilerError::type_error(
            site,
            format!("expected a data value, got {other}"),
        )),
    }
}

fn expect_fits(t: &Typed, expected: &Type, site: &Site, what: &str) -> Result<(), CompilerError> {
    if t.inst.fits(expected) {
        return Ok(());
    }
    Err(CompilerError::type_error(
        site,
        format!("{what}: expected {expected}, got {}", t.inst),
    ))
}

fn check_returns(body: &Typed, returns: &[Type], site: &Site) -> Result<(), CompilerError> {
    let ok = match (&body.inst, returns) {
        (Instance::Void, _) => true,
        (Instance::Multi(ts), rs) if rs.len() > 1 => {
            ts.len() == rs.len() && rs.iter().zip(ts).all(|(r, t)| r.is_base_of(t))
        }
        (inst, [r]) => inst.fits(r),
        _ => false,
    };
    if ok {
        return Ok(());
    }
    let expected: Vec<String> = returns.iter().map(Type::to_string).collect();
    Err(CompilerError::type_error(
        site,
        format!("body has type {}, expected {}", body.inst, expected.join(", ")),
    ))
}

/// Common type of two branches: one side's type if it is a base of the
/// other's, the enum of two of its variants, or the other side of a `Void`.
pub fn unify(defs: &DefTable, a: &Instance, b: &Instance) -> Option<Instance> {
    match (a, b) {
        (Instance::Void, x) | (x, Instance::Void) => Some(x.clone()),
        (Instance::Multi(xs), Instance::Multi(ys)) if xs.len() == ys.len() => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| common_base(defs, x, y))
            .collect::<Option<Vec<_>>>()
            .map(Instance::Multi),
        _ => {
            let (ta, tb) = (a.as_type()?, b.as_type()?);
            common_base(defs, &ta, &tb).map(|t| Instance::from_type(&t))
        }
    }
}

fn common_base(defs: &DefTable, a: &Type, b: &Type) -> Option<Type> {
    if a.is_base_of(b) {
        return Some(a.clone());
    }
    if b.is_base_of(a) {
        return Some(b.clone());
    }
    use BuiltinType as B;
    match (a, b) {
        (Type::User(x), Type::User(y)) if x.def == y.def => Some(Type::User(defs.user_type(x.def))),
        (
            Type::Builtin(B::CredentialPubKey | B::CredentialValidator),
            Type::Builtin(B::CredentialPubKey | B::CredentialValidator),
        ) => Some(Type::Builtin(B::Credential)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_json::parse_module_value;
    use crate::compile::CompileErrorKind;
    use serde_json::{json, Value};

    fn module(kind: &str, name: &str, statements: Value) -> ModuleAst {
        parse_module_value(&json!({
            "schema_version": vallum_contracts::VALLUM_AST_SCHEMA_VERSION,
            "kind": kind,
            "name": name,
            "statements": statements,
        }))
        .expect("parse module")
    }

    fn check(statements: Value) -> Result<Checker, CompilerError> {
        let m = module("testing", "t", statements);
        let mut c = Checker::new();
        c.check_segment(&m, 0..m.statements.len(), Phase::PreMain, true)?;
        Ok(c)
    }

    fn def_text(c: &Checker, key: &str) -> String {
        c.statements()
            .iter()
            .flat_map(|s| s.defs.iter())
            .find(|(k, _)| k == key)
            .map(|(_, ir)| ir.to_string())
            .unwrap_or_else(|| panic!("no def {key}"))
    }

    #[test]
    fn unused_locals_are_reference_errors() {
        let err = check(json!([
            {"kind": "func", "name": "main", "args": [{"name": "a", "type": "Int"}], "returns": "Int",
             "body": ["let", "b", 1, "a"]}
        ]))
        .err()
        .expect("b is unused");
        assert_eq!(err.kind, CompileErrorKind::Reference);
        assert!(err.message.contains("unused variable b"), "{}", err.message);

        check(json!([
            {"kind": "func", "name": "main", "args": [{"name": "_a", "type": "Int"}], "returns": "Int",
             "body": ["let", "_", 1, 2]}
        ]))
        .expect("discarded bindings are fine");
    }

    #[test]
    fn consts_must_be_declared_before_use() {
        let err = check(json!([
            {"kind": "const", "name": "a", "value": ["+", "b", 1]},
            {"kind": "const", "name": "b", "value": 1}
        ]))
        .err()
        .expect("forward const");
        assert!(err.message.contains("const b is referenced before its declaration"), "{}", err.message);
    }

    #[test]
    fn functions_may_be_used_before_declaration() {
        let c = check(json!([
            {"kind": "func", "name": "main", "args": [], "returns": "Int", "body": ["call", "helper", 2]},
            {"kind": "func", "name": "helper", "args": [{"name": "x", "type": "Int"}], "returns": "Int",
             "body": ["*", "x", 3]}
        ]))
        .expect("check");
        assert_eq!(def_text(&c, "__module__t__main"), "() -> {\n    __module__t__helper(2)\n}");
        assert_eq!(
            def_text(&c, "__module__t__helper"),
            "(x) -> {\n    __vallum__int____mul(x)(3)\n}"
        );
    }

    #[test]
    fn switch_must_be_exhaustive() {
        let err = check(json!([
            {"kind": "enum", "name": "Action", "variants": [{"name": "Claim"}, {"name": "Cancel"}]},
            {"kind": "func", "name": "main", "args": [{"name": "a", "type": "Action"}], "returns": "Int",
             "body": ["switch", "a", {"case": "Claim", "body": 1}]}
        ]))
        .err()
        .expect("missing Cancel");
        assert_eq!(err.kind, CompileErrorKind::Type);
        assert!(err.message.contains("missing Cancel"), "{}", err.message);

        let c = check(json!([
            {"kind": "enum", "name": "Action", "variants": [{"name": "Claim"}, {"name": "Cancel"}]},
            {"kind": "func", "name": "main", "args": [{"name": "a", "type": "Action"}], "returns": "Int",
             "body": ["switch", "a", {"case": "Claim", "body": 1}, {"else": 2}]}
        ]))
        .expect("else covers the rest");
        assert!(def_text(&c, "__module__t__main").contains("__core__equalsInteger(__tag, 0)"));
    }

    #[test]
    fn generic_calls_are_mangled() {
        let c = check(json!([
            {"kind": "func", "name": "same", "type_params": [{"name": "T"}],
             "args": [{"name": "a", "type": "T"}, {"name": "b", "type": "T"}], "returns": "Bool",
             "body": ["==", "a", "b"]},
            {"kind": "func", "name": "main", "args": [], "returns": "Bool",
             "body": ["call", "same", 1, 2]}
        ]))
        .expect("check");
        assert_eq!(
            def_text(&c, "__module__t__same[$0]"),
            "(a, b) -> {\n    $0____eq(a)(b)\n}"
        );
        assert!(def_text(&c, "__module__t__main").contains("__module__t__same[__vallum__int](1, 2)"));
    }

    #[test]
    fn methods_are_curried_over_self() {
        let c = check(json!([
            {"kind": "struct", "name": "Pair", "fields": [{"name": "a", "type": "Int"}, {"name": "b", "type": "Int"}],
             "impl": [{"kind": "func", "name": "sum", "args": [{"name": "self"}], "returns": "Int",
                       "body": ["+", [".", "self", "a"], [".", "self", "b"]]}]},
            {"kind": "func", "name": "main", "args": [], "returns": "Int",
             "body": ["call", [".", ["new", "Pair", 1, 2], "sum"]]}
        ]))
        .expect("check");
        assert!(def_text(&c, "__module__t__Pair__sum").starts_with("(self) -> {\n    () -> {"));
        assert!(def_text(&c, "__module__t__main")
            .contains("__module__t__Pair__sum(__module__t__Pair____new(1, 2))()"));
    }

    #[test]
    fn optional_arguments_carry_a_flag() {
        let c = check(json!([
            {"kind": "func", "name": "inc", "args": [{"name": "x", "type": "Int"}, {"name": "by", "type": "Int", "default": 1}],
             "returns": "Int", "body": ["+", "x", "by"]},
            {"kind": "func", "name": "main", "args": [], "returns": "Int", "body": ["call", "inc", 1]}
        ]))
        .expect("check");
        assert!(def_text(&c, "__module__t__inc").starts_with("(x, by, __useopt__by) -> {"));
        assert!(def_text(&c, "__module__t__main").contains("__module__t__inc(1, (), false)"));
    }

    #[test]
    fn if_branches_join_variants() {
        check(json!([
            {"kind": "enum", "name": "E", "variants": [{"name": "A"}, {"name": "B"}]},
            {"kind": "func", "name": "main", "args": [{"name": "c", "type": "Bool"}], "returns": "E",
             "body": ["if", "c", ["new", "E::A"], ["new", "E::B"]]}
        ]))
        .expect("variants join to their enum");

        let err = check(json!([
            {"kind": "func", "name": "main", "args": [{"name": "c", "type": "Bool"}], "returns": "Int",
             "body": ["if", "c", 1, true]}
        ]))
        .err()
        .expect("Int vs Bool");
        assert!(err.message.contains("incompatible types Int and Bool"), "{}", err.message);
    }
}
