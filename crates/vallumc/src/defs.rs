//! Arena of user type definitions.
//!
//! `UserType` values carry a `DefId` into this table instead of a pointer back
//! to the declaring statement.

use crate::compile::Site;
use crate::instance::Instance;
use crate::types::{user_type_path, DefId, Type, UserKind, UserType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    /// CIP-68 map key; either every field of a struct has one or none does.
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VariantDef {
    pub name: String,
    pub index: usize,
    pub fields: Vec<Field>,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub enum TypeDefKind {
    Struct { fields: Vec<Field> },
    Enum { variants: Vec<VariantDef> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplKind {
    /// Instance member taking `self`.
    Method,
    /// Type-level function.
    Static,
    /// Type-level constant.
    Const,
}

#[derive(Debug, Clone)]
pub struct ImplMember {
    pub name: String,
    pub kind: ImplKind,
    pub inst: Instance,
    pub path: String,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub id: DefId,
    pub module: String,
    pub name: String,
    pub path: String,
    pub site: Site,
    pub kind: TypeDefKind,
    pub impl_members: Vec<ImplMember>,
}

impl TypeDef {
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeDefKind::Enum { .. })
    }

    pub fn variants(&self) -> &[VariantDef] {
        match &self.kind {
            TypeDefKind::Enum { variants } => variants,
            TypeDefKind::Struct { .. } => &[],
        }
    }

    pub fn impl_member(&self, name: &str) -> Option<&ImplMember> {
        self.impl_members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefTable {
    defs: Vec<TypeDef>,
}

impl DefTable {
    pub fn alloc_struct(&mut self, module: &str, name: &str, site: &Site) -> DefId {
        self.alloc(module, name, site, TypeDefKind::Struct { fields: Vec::new() })
    }

    pub fn alloc_enum(
        &mut self,
        module: &str,
        name: &str,
        site: &Site,
        variants: Vec<(String, Site)>,
    ) -> DefId {
        let variants = variants
            .into_iter()
            .enumerate()
            .map(|(index, (name, site))| VariantDef {
                name,
                index,
                fields: Vec::new(),
                site,
            })
            .collect();
        self.alloc(module, name, site, TypeDefKind::Enum { variants })
    }

    fn alloc(&mut self, module: &str, name: &str, site: &Site, kind: TypeDefKind) -> DefId {
        let id = DefId(self.defs.len());
        self.defs.push(TypeDef {
            id,
            module: module.to_string(),
            name: name.to_string(),
            path: user_type_path(module, name),
            site: site.clone(),
            kind,
            impl_members: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: DefId) -> &TypeDef {
        &self.defs[id.0]
    }

    pub fn get_mut(&mut self, id: DefId) -> &mut TypeDef {
        &mut self.defs[id.0]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn user_type(&self, id: DefId) -> UserType {
        let def = self.get(id);
        UserType {
            def: id,
            variant: None,
            kind: if def.is_enum() {
                UserKind::Enum
            } else {
                UserKind::Struct
            },
            name: def.name.as_str().into(),
            path: def.path.as_str().into(),
        }
    }

    pub fn variant_type(&self, id: DefId, index: usize) -> Option<UserType> {
        let def = self.get(id);
        let v = def.variants().get(index)?;
        Some(UserType {
            def: id,
            variant: Some(index),
            kind: UserKind::Variant,
            name: format!("{}::{}", def.name, v.name).into(),
            path: format!("{}__{}", def.path, v.name).into(),
        })
    }

    pub fn variant_by_name(&self, id: DefId, name: &str) -> Option<UserType> {
        let index = self.get(id).variants().iter().position(|v| v.name == name)?;
        self.variant_type(id, index)
    }

    /// Fields of a struct or of an enum variant; enums themselves have none.
    pub fn fields_of(&self, u: &UserType) -> &[Field] {
        let def = self.get(u.def);
        match (&def.kind, u.variant) {
            (TypeDefKind::Struct { fields }, _) => fields,
            (TypeDefKind::Enum { variants }, Some(i)) => {
                variants.get(i).map(|v| v.fields.as_slice()).unwrap_or(&[])
            }
            (TypeDefKind::Enum { .. }, None) => &[],
        }
    }

    pub fn is_cip68(&self, u: &UserType) -> bool {
        u.kind == UserKind::Struct && self.fields_of(u).iter().any(|f| f.tag.is_some())
    }
}
