//! Reader for the JSON AST documents produced by the external parser.

use serde_json::{Map, Value};
use vallum_contracts::VALLUM_AST_SCHEMA_VERSIONS_SUPPORTED;
use vallum_purposes::ScriptPurpose;

use crate::ast::*;
use crate::compile::{CompilerError, Site};
use crate::language::limits;
use crate::validate;

const TYPE_HEADS: &[&str] = &["List", "Map", "Option", "Fn", "::"];

pub fn parse_module_json(bytes: &[u8]) -> Result<ModuleAst, CompilerError> {
    if bytes.len() > limits::max_source_bytes() {
        return Err(CompilerError::budget(format!(
            "module document is {} bytes, limit is {}",
            bytes.len(),
            limits::max_source_bytes()
        )));
    }
    let doc: Value = serde_json::from_slice(bytes)
        .map_err(|e| CompilerError::syntax(&Site::new("<input>", ""), e.to_string()))?;
    parse_module_value(&doc)
}

pub fn parse_module_value(root: &Value) -> Result<ModuleAst, CompilerError> {
    let unnamed = Site::new("<input>", "");
    let obj = root
        .as_object()
        .ok_or_else(|| CompilerError::syntax(&unnamed, "module root must be an object".to_string()))?;

    let name = required_str(obj, &unnamed, "name")?;
    validate::validate_module_name(name)
        .map_err(|message| CompilerError::syntax(&unnamed.child("name"), message))?;
    let r = Reader { module: name };
    let root_site = r.site("");

    let schema_version = required_str(obj, &root_site, "schema_version")?;
    if !VALLUM_AST_SCHEMA_VERSIONS_SUPPORTED.contains(&schema_version) {
        return Err(CompilerError::syntax(
            &root_site.child("schema_version"),
            format!(
                "unsupported schema_version: got {schema_version:?} (supported: {})",
                VALLUM_AST_SCHEMA_VERSIONS_SUPPORTED.join(", ")
            ),
        ));
    }

    let kind = required_str(obj, &root_site, "kind")?;
    let kind = match kind {
        "module" => ModuleKind::Library,
        other => ModuleKind::Script(ScriptPurpose::parse(other).ok_or_else(|| {
            CompilerError::syntax(
                &root_site.child("kind"),
                format!("invalid kind: expected testing|spending|minting|staking|module, got {other:?}"),
            )
        })?),
    };

    let statements_site = root_site.child("statements");
    let statements = required(obj, &root_site, "statements")?
        .as_array()
        .ok_or_else(|| CompilerError::syntax(&statements_site, "statements must be an array".to_string()))?
        .iter()
        .enumerate()
        .map(|(i, s)| r.statement(s, &statements_site.child(i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ModuleAst {
        name: name.to_string(),
        kind,
        statements,
    })
}

fn required<'v>(obj: &'v Map<String, Value>, site: &Site, key: &str) -> Result<&'v Value, CompilerError> {
    obj.get(key)
        .ok_or_else(|| CompilerError::syntax(site, format!("missing required field: {key}")))
}

fn required_str<'v>(obj: &'v Map<String, Value>, site: &Site, key: &str) -> Result<&'v str, CompilerError> {
    required(obj, site, key)?
        .as_str()
        .ok_or_else(|| CompilerError::syntax(&site.child(key), format!("{key} must be a string")))
}

fn optional_str<'v>(
    obj: &'v Map<String, Value>,
    site: &Site,
    key: &str,
) -> Result<Option<&'v str>, CompilerError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(CompilerError::syntax(
            &site.child(key),
            format!("{key} must be a string"),
        )),
    }
}

fn as_object<'v>(v: &'v Value, site: &Site, what: &str) -> Result<&'v Map<String, Value>, CompilerError> {
    v.as_object()
        .ok_or_else(|| CompilerError::syntax(site, format!("{what} must be an object")))
}

fn as_array<'v>(v: &'v Value, site: &Site, what: &str) -> Result<&'v [Value], CompilerError> {
    v.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| CompilerError::syntax(site, format!("{what} must be an array")))
}

/// Decimal text to fixed point with six decimals.
pub fn parse_real(text: &str) -> Option<i128> {
    let (neg, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty()
        || frac_part.len() > 6
        || !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let whole: i128 = int_part.parse().ok()?;
    let frac: i128 = if frac_part.is_empty() {
        0
    } else {
        format!("{frac_part:0<6}").parse().ok()?
    };
    let v = whole.checked_mul(1_000_000)?.checked_add(frac)?;
    Some(if neg { -v } else { v })
}

struct Reader<'a> {
    module: &'a str,
}

impl Reader<'_> {
    fn site(&self, ptr: &str) -> Site {
        Site::new(self.module, ptr)
    }

    fn statement(&self, v: &Value, site: &Site) -> Result<Statement, CompilerError> {
        let obj = as_object(v, site, "statement")?;
        let kind = required_str(obj, site, "kind")?;
        let kind = match kind {
            "import" => {
                let module = required_str(obj, site, "module")?;
                validate::validate_module_name(module)
                    .map_err(|m| CompilerError::syntax(&site.child("module"), m))?;
                let names_site = site.child("names");
                let names = as_array(required(obj, site, "names")?, &names_site, "names")?
                    .iter()
                    .enumerate()
                    .map(|(i, n)| self.import_name(n, &names_site.child(i)))
                    .collect::<Result<Vec<_>, _>>()?;
                StatementKind::Import {
                    module: module.to_string(),
                    names,
                }
            }
            "const" => StatementKind::Const(self.const_decl(obj, site)?),
            "func" => StatementKind::Func(self.func_decl(obj, site)?),
            "struct" => {
                let name = self.type_name(obj, site)?;
                StatementKind::Struct(StructDecl {
                    name,
                    fields: self.fields(obj, site)?,
                    impl_members: self.impl_members(obj, site)?,
                })
            }
            "enum" => {
                let name = self.type_name(obj, site)?;
                let vsite = site.child("variants");
                let variants = as_array(required(obj, site, "variants")?, &vsite, "variants")?
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let vs = vsite.child(i);
                        let vobj = as_object(v, &vs, "variant")?;
                        Ok(VariantDecl {
                            name: self.type_name(vobj, &vs)?,
                            fields: self.fields(vobj, &vs)?,
                            site: vs,
                        })
                    })
                    .collect::<Result<Vec<_>, CompilerError>>()?;
                StatementKind::Enum(EnumDecl {
                    name,
                    variants,
                    impl_members: self.impl_members(obj, site)?,
                })
            }
            other => {
                return Err(CompilerError::syntax(
                    &site.child("kind"),
                    format!("unknown statement kind {other:?}"),
                ))
            }
        };
        Ok(Statement {
            kind,
            site: site.clone(),
        })
    }

    fn import_name(&self, v: &Value, site: &Site) -> Result<ImportName, CompilerError> {
        let (name, alias) = match v {
            Value::String(s) => (s.as_str(), None),
            Value::Object(obj) => (
                required_str(obj, site, "name")?,
                optional_str(obj, site, "as")?.map(str::to_string),
            ),
            _ => {
                return Err(CompilerError::syntax(
                    site,
                    "import name must be a string or {name, as}".to_string(),
                ))
            }
        };
        if let Some(a) = &alias {
            if a.starts_with(|c: char| c.is_ascii_uppercase()) {
                validate::validate_type_name(a)
            } else {
                validate::validate_value_name(a)
            }
            .map_err(|m| CompilerError::syntax(&site.child("as"), m))?;
        }
        Ok(ImportName {
            name: name.to_string(),
            alias,
            site: site.clone(),
        })
    }

    fn type_name(&self, obj: &Map<String, Value>, site: &Site) -> Result<String, CompilerError> {
        let name = required_str(obj, site, "name")?;
        validate::validate_type_name(name).map_err(|m| CompilerError::syntax(&site.child("name"), m))?;
        Ok(name.to_string())
    }

    fn value_name(&self, obj: &Map<String, Value>, site: &Site) -> Result<String, CompilerError> {
        let name = required_str(obj, site, "name")?;
        validate::validate_value_name(name).map_err(|m| CompilerError::syntax(&site.child("name"), m))?;
        Ok(name.to_string())
    }

    fn const_decl(&self, obj: &Map<String, Value>, site: &Site) -> Result<ConstDecl, CompilerError> {
        Ok(ConstDecl {
            name: self.value_name(obj, site)?,
            ty: match obj.get("type") {
                None | Some(Value::Null) => None,
                Some(t) => Some(self.type_expr(t, &site.child("type"))?),
            },
            value: self.expr(required(obj, site, "value")?, &site.child("value"))?,
            site: site.clone(),
        })
    }

    fn fields(&self, obj: &Map<String, Value>, site: &Site) -> Result<Vec<FieldDecl>, CompilerError> {
        let Some(v) = obj.get("fields") else {
            return Ok(Vec::new());
        };
        let fsite = site.child("fields");
        as_array(v, &fsite, "fields")?
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let s = fsite.child(i);
                let fobj = as_object(f, &s, "field")?;
                let tag = optional_str(fobj, &s, "tag")?;
                if let Some(tag) = tag {
                    validate::validate_field_tag(tag)
                        .map_err(|m| CompilerError::syntax(&s.child("tag"), m))?;
                }
                Ok(FieldDecl {
                    name: self.value_name(fobj, &s)?,
                    ty: self.type_expr(required(fobj, &s, "type")?, &s.child("type"))?,
                    tag: tag.map(str::to_string),
                    site: s,
                })
            })
            .collect()
    }

    fn impl_members(&self, obj: &Map<String, Value>, site: &Site) -> Result<Vec<ImplDecl>, CompilerError> {
        let Some(v) = obj.get("impl") else {
            return Ok(Vec::new());
        };
        let isite = site.child("impl");
        as_array(v, &isite, "impl")?
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let s = isite.child(i);
                let mobj = as_object(m, &s, "impl member")?;
                match required_str(mobj, &s, "kind")? {
                    "func" => Ok(ImplDecl::Func(self.func_decl(mobj, &s)?)),
                    "const" => Ok(ImplDecl::Const(self.const_decl(mobj, &s)?)),
                    other => Err(CompilerError::syntax(
                        &s.child("kind"),
                        format!("impl members are func or const, got {other:?}"),
                    )),
                }
            })
            .collect()
    }

    fn func_decl(&self, obj: &Map<String, Value>, site: &Site) -> Result<FuncDecl, CompilerError> {
        let name = self.value_name(obj, site)?;
        let type_params = match obj.get("type_params") {
            None => Vec::new(),
            Some(v) => {
                let tsite = site.child("type_params");
                as_array(v, &tsite, "type_params")?
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        let s = tsite.child(i);
                        let pobj = as_object(p, &s, "type parameter")?;
                        Ok(TypeParamDecl {
                            name: self.type_name(pobj, &s)?,
                            class: optional_str(pobj, &s, "class")?.map(str::to_string),
                            site: s,
                        })
                    })
                    .collect::<Result<Vec<_>, CompilerError>>()?
            }
        };
        let asite = site.child("args");
        let args = self.arg_decls(required(obj, site, "args")?, &asite)?;
        let returns = self.returns(required(obj, site, "returns")?, &site.child("returns"))?;
        let body = self.expr(required(obj, site, "body")?, &site.child("body"))?;
        Ok(FuncDecl {
            name,
            type_params,
            args,
            returns,
            body,
            site: site.clone(),
        })
    }

    fn arg_decls(&self, v: &Value, site: &Site) -> Result<Vec<ArgDecl>, CompilerError> {
        as_array(v, site, "args")?
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let s = site.child(i);
                let aobj = as_object(a, &s, "argument")?;
                Ok(ArgDecl {
                    name: self.value_name(aobj, &s)?,
                    ty: match aobj.get("type") {
                        None | Some(Value::Null) => None,
                        Some(t) => Some(self.type_expr(t, &s.child("type"))?),
                    },
                    default: match aobj.get("default") {
                        None => None,
                        Some(d) => Some(self.expr(d, &s.child("default"))?),
                    },
                    site: s,
                })
            })
            .collect()
    }

    /// `T` or `[T, …]`.
    fn returns(&self, v: &Value, site: &Site) -> Result<Vec<TypeExpr>, CompilerError> {
        if let Value::Array(items) = v {
            let head_is_type = items
                .first()
                .and_then(Value::as_str)
                .is_some_and(|h| TYPE_HEADS.contains(&h));
            if !head_is_type {
                if items.is_empty() {
                    return Err(CompilerError::syntax(site, "returns must not be empty".to_string()));
                }
                return items
                    .iter()
                    .enumerate()
                    .map(|(i, t)| self.type_expr(t, &site.child(i)))
                    .collect();
            }
        }
        Ok(vec![self.type_expr(v, site)?])
    }

    fn type_expr(&self, v: &Value, site: &Site) -> Result<TypeExpr, CompilerError> {
        let kind = match v {
            Value::String(s) => return self.type_from_str(s, site),
            Value::Array(items) => {
                let head = items.first().and_then(Value::as_str).ok_or_else(|| {
                    CompilerError::syntax(site, "type array must start with a head string".to_string())
                })?;
                let arg = |i: usize| -> Result<TypeExpr, CompilerError> {
                    let item = items.get(i).ok_or_else(|| {
                        CompilerError::syntax(site, format!("{head} type is missing argument {i}"))
                    })?;
                    self.type_expr(item, &site.child(i))
                };
                let expect_len = |n: usize| -> Result<(), CompilerError> {
                    if items.len() != n {
                        return Err(CompilerError::syntax(
                            site,
                            format!("{head} type takes {} argument(s)", n - 1),
                        ));
                    }
                    Ok(())
                };
                match head {
                    "List" => {
                        expect_len(2)?;
                        TypeExprKind::List(Box::new(arg(1)?))
                    }
                    "Option" => {
                        expect_len(2)?;
                        TypeExprKind::Option(Box::new(arg(1)?))
                    }
                    "Map" => {
                        expect_len(3)?;
                        TypeExprKind::Map(Box::new(arg(1)?), Box::new(arg(2)?))
                    }
                    "Fn" => {
                        expect_len(3)?;
                        let asite = site.child(1);
                        let args = as_array(&items[1], &asite, "function type arguments")?
                            .iter()
                            .enumerate()
                            .map(|(i, t)| self.type_expr(t, &asite.child(i)))
                            .collect::<Result<Vec<_>, _>>()?;
                        TypeExprKind::Func {
                            args,
                            returns: self.returns(&items[2], &site.child(2))?,
                        }
                    }
                    "::" => {
                        expect_len(3)?;
                        let name = items[2].as_str().ok_or_else(|| {
                            CompilerError::syntax(&site.child(2), "member name must be a string".to_string())
                        })?;
                        TypeExprKind::Member(Box::new(arg(1)?), name.to_string())
                    }
                    other => {
                        return Err(CompilerError::syntax(site, format!("unknown type head {other:?}")))
                    }
                }
            }
            _ => return Err(CompilerError::syntax(site, "invalid type expression".to_string())),
        };
        Ok(TypeExpr {
            kind,
            site: site.clone(),
        })
    }

    fn type_from_str(&self, s: &str, site: &Site) -> Result<TypeExpr, CompilerError> {
        let kind = match s.rsplit_once("::") {
            Some((base, member)) => {
                TypeExprKind::Member(Box::new(self.type_from_str(base, site)?), member.to_string())
            }
            None => {
                if s.is_empty() {
                    return Err(CompilerError::syntax(site, "empty type name".to_string()));
                }
                TypeExprKind::Named(s.to_string())
            }
        };
        Ok(TypeExpr {
            kind,
            site: site.clone(),
        })
    }

    fn expr(&self, v: &Value, site: &Site) -> Result<Expr, CompilerError> {
        let kind = match v {
            Value::Bool(b) => ExprKind::Bool(*b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => ExprKind::Int(i128::from(i)),
                (None, Some(u)) => ExprKind::Int(i128::from(u)),
                _ => {
                    return Err(CompilerError::syntax(
                        site,
                        format!("number {n} is not an integer; use [\"real\", \"…\"]"),
                    ))
                }
            },
            Value::String(s) => match s.rsplit_once("::") {
                Some((ty, name)) => ExprKind::TypeMember {
                    ty: self.type_from_str(ty, site)?,
                    name: name.to_string(),
                },
                None => ExprKind::Name(s.clone()),
            },
            Value::Array(items) => self.expr_array(items, site)?,
            _ => return Err(CompilerError::syntax(site, "invalid expression".to_string())),
        };
        Ok(Expr {
            kind,
            site: site.clone(),
        })
    }

    fn expr_array(&self, items: &[Value], site: &Site) -> Result<ExprKind, CompilerError> {
        let head = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| CompilerError::syntax(site, "expression array must start with a head string".to_string()))?;
        let arity = |n: usize| -> Result<(), CompilerError> {
            if items.len() != n + 1 {
                return Err(CompilerError::syntax(
                    site,
                    format!("{head} takes {n} operand(s), got {}", items.len() - 1),
                ));
            }
            Ok(())
        };
        let sub = |i: usize| -> Result<Box<Expr>, CompilerError> {
            let v = items
                .get(i)
                .ok_or_else(|| CompilerError::syntax(site, format!("{head} is missing operand {i}")))?;
            Ok(Box::new(self.expr(v, &site.child(i))?))
        };
        let text = |i: usize| -> Result<&str, CompilerError> {
            items
                .get(i)
                .and_then(Value::as_str)
                .ok_or_else(|| CompilerError::syntax(&site.child(i), format!("{head} expects a string operand")))
        };

        if let Some(op) = BinaryOp::parse(head) {
            arity(2)?;
            return Ok(ExprKind::Binary {
                op,
                lhs: sub(1)?,
                rhs: sub(2)?,
            });
        }

        Ok(match head {
            "int" => {
                arity(1)?;
                let t = text(1)?;
                ExprKind::Int(t.parse().map_err(|_| {
                    CompilerError::syntax(&site.child(1), format!("invalid integer literal {t:?}"))
                })?)
            }
            "real" => {
                arity(1)?;
                let t = text(1)?;
                ExprKind::Real(parse_real(t).ok_or_else(|| {
                    CompilerError::syntax(&site.child(1), format!("invalid real literal {t:?} (at most 6 decimals)"))
                })?)
            }
            "str" => {
                arity(1)?;
                ExprKind::Str(text(1)?.to_string())
            }
            "bytes" => {
                arity(1)?;
                let t = text(1)?;
                ExprKind::Bytes(hex::decode(t).map_err(|e| {
                    CompilerError::syntax(&site.child(1), format!("invalid hex literal {t:?}: {e}"))
                })?)
            }
            "!" | "neg" => {
                arity(1)?;
                ExprKind::Unary {
                    op: if head == "!" { UnaryOp::Not } else { UnaryOp::Neg },
                    operand: sub(1)?,
                }
            }
            "." => {
                arity(2)?;
                ExprKind::Member {
                    object: sub(1)?,
                    name: text(2)?.to_string(),
                }
            }
            "::" => {
                arity(2)?;
                ExprKind::TypeMember {
                    ty: self.type_expr(&items[1], &site.child(1))?,
                    name: text(2)?.to_string(),
                }
            }
            "call" => {
                if items.len() < 2 {
                    return Err(CompilerError::syntax(site, "call needs a callee".to_string()));
                }
                let args = items[2..]
                    .iter()
                    .enumerate()
                    .map(|(i, a)| {
                        let s = site.child(i + 2);
                        match a {
                            Value::Object(obj) => Ok(CallArgExpr {
                                name: Some(required_str(obj, &s, "name")?.to_string()),
                                value: self.expr(required(obj, &s, "value")?, &s.child("value"))?,
                            }),
                            other => Ok(CallArgExpr {
                                name: None,
                                value: self.expr(other, &s)?,
                            }),
                        }
                    })
                    .collect::<Result<Vec<_>, CompilerError>>()?;
                ExprKind::Call {
                    callee: sub(1)?,
                    args,
                }
            }
            "tapp" => {
                if items.len() < 3 {
                    return Err(CompilerError::syntax(site, "tapp needs a callee and type arguments".to_string()));
                }
                ExprKind::TypeApply {
                    callee: sub(1)?,
                    types: items[2..]
                        .iter()
                        .enumerate()
                        .map(|(i, t)| self.type_expr(t, &site.child(i + 2)))
                        .collect::<Result<Vec<_>, _>>()?,
                }
            }
            "if" => {
                arity(3)?;
                ExprKind::If {
                    cond: sub(1)?,
                    then: sub(2)?,
                    otherwise: sub(3)?,
                }
            }
            "let" => {
                arity(3)?;
                let bsite = site.child(1);
                let (bindings, destructure) = match &items[1] {
                    Value::Array(bs) => (
                        bs.iter()
                            .enumerate()
                            .map(|(i, b)| self.let_binding(b, &bsite.child(i)))
                            .collect::<Result<Vec<_>, _>>()?,
                        true,
                    ),
                    other => (vec![self.let_binding(other, &bsite)?], false),
                };
                ExprKind::Let {
                    bindings,
                    destructure,
                    value: sub(2)?,
                    body: sub(3)?,
                }
            }
            "new" => {
                if items.len() < 2 {
                    return Err(CompilerError::syntax(site, "new needs a type".to_string()));
                }
                let ty = self.type_expr(&items[1], &site.child(1))?;
                let fields = match &items[2..] {
                    [Value::Object(obj)] => {
                        let fsite = site.child(2);
                        NewFields::Named(
                            obj.iter()
                                .map(|(k, v)| Ok((k.clone(), self.expr(v, &fsite.child(k))?)))
                                .collect::<Result<Vec<_>, CompilerError>>()?,
                        )
                    }
                    rest => NewFields::Positional(
                        rest.iter()
                            .enumerate()
                            .map(|(i, v)| self.expr(v, &site.child(i + 2)))
                            .collect::<Result<Vec<_>, _>>()?,
                    ),
                };
                ExprKind::New { ty, fields }
            }
            "switch" => {
                if items.len() < 3 {
                    return Err(CompilerError::syntax(site, "switch needs a subject and cases".to_string()));
                }
                let mut cases = Vec::new();
                let mut default = None;
                for (i, c) in items[2..].iter().enumerate() {
                    let s = site.child(i + 2);
                    let cobj = as_object(c, &s, "switch case")?;
                    if let Some(e) = cobj.get("else") {
                        if default.is_some() || i + 3 != items.len() {
                            return Err(CompilerError::syntax(&s, "else must be the last switch case".to_string()));
                        }
                        default = Some(Box::new(self.expr(e, &s.child("else"))?));
                        continue;
                    }
                    let binding = optional_str(cobj, &s, "as")?;
                    if let Some(b) = binding {
                        validate::validate_value_name(b)
                            .map_err(|m| CompilerError::syntax(&s.child("as"), m))?;
                    }
                    cases.push(SwitchCase {
                        variant: required_str(cobj, &s, "case")?.to_string(),
                        binding: binding.map(str::to_string),
                        body: self.expr(required(cobj, &s, "body")?, &s.child("body"))?,
                        site: s,
                    });
                }
                ExprKind::Switch {
                    subject: sub(1)?,
                    cases,
                    default,
                }
            }
            "fn" => {
                arity(3)?;
                ExprKind::Lambda {
                    args: self.arg_decls(&items[1], &site.child(1))?,
                    returns: self.returns(&items[2], &site.child(2))?,
                    body: sub(3)?,
                }
            }
            "list" => {
                if items.len() < 2 {
                    return Err(CompilerError::syntax(site, "list needs an item type".to_string()));
                }
                ExprKind::List {
                    item: self.type_expr(&items[1], &site.child(1))?,
                    items: items[2..]
                        .iter()
                        .enumerate()
                        .map(|(i, v)| self.expr(v, &site.child(i + 2)))
                        .collect::<Result<Vec<_>, _>>()?,
                }
            }
            "map" => {
                if items.len() < 3 {
                    return Err(CompilerError::syntax(site, "map needs key and value types".to_string()));
                }
                let entries = items[3..]
                    .iter()
                    .enumerate()
                    .map(|(i, e)| {
                        let s = site.child(i + 3);
                        match e.as_array().map(Vec::as_slice) {
                            Some([k, v]) => Ok((self.expr(k, &s.child(0))?, self.expr(v, &s.child(1))?)),
                            _ => Err(CompilerError::syntax(&s, "map entry must be [key, value]".to_string())),
                        }
                    })
                    .collect::<Result<Vec<_>, CompilerError>>()?;
                ExprKind::Map {
                    key: self.type_expr(&items[1], &site.child(1))?,
                    value: self.type_expr(&items[2], &site.child(2))?,
                    entries,
                }
            }
            "error" => {
                arity(1)?;
                ExprKind::Error(text(1)?.to_string())
            }
            "print" => {
                arity(2)?;
                ExprKind::Print {
                    message: sub(1)?,
                    body: sub(2)?,
                }
            }
            "values" => {
                if items.len() < 3 {
                    return Err(CompilerError::syntax(site, "values needs at least two operands".to_string()));
                }
                ExprKind::Values(
                    items[1..]
                        .iter()
                        .enumerate()
                        .map(|(i, v)| self.expr(v, &site.child(i + 1)))
                        .collect::<Result<Vec<_>, _>>()?,
                )
            }
            other => {
                return Err(CompilerError::syntax(site, format!("unknown expression head {other:?}")))
            }
        })
    }

    fn let_binding(&self, v: &Value, site: &Site) -> Result<LetBinding, CompilerError> {
        let (name, ty) = match v {
            Value::String(s) => (s.as_str(), None),
            Value::Object(obj) => (
                required_str(obj, site, "name")?,
                match obj.get("type") {
                    None | Some(Value::Null) => None,
                    Some(t) => Some(self.type_expr(t, &site.child("type"))?),
                },
            ),
            _ => {
                return Err(CompilerError::syntax(
                    site,
                    "let binding must be a name or {name, type}".to_string(),
                ))
            }
        };
        validate::validate_value_name(name).map_err(|m| CompilerError::syntax(site, m))?;
        Ok(LetBinding {
            name: name.to_string(),
            ty,
            site: site.clone(),
        })
    }
}
