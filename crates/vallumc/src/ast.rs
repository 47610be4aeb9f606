//! Front-end AST consumed by the checker.
//!
//! Every node carries the `Site` it was read from so diagnostics can point
//! back into the JSON document.

use vallum_purposes::ScriptPurpose;

use crate::compile::Site;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Script(ScriptPurpose),
    /// Importable module without an entry function.
    Library,
}

impl ModuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleKind::Script(p) => p.as_str(),
            ModuleKind::Library => "module",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleAst {
    pub name: String,
    pub kind: ModuleKind,
    pub statements: Vec<Statement>,
}

impl ModuleAst {
    pub fn is_library(&self) -> bool {
        self.kind == ModuleKind::Library
    }

    /// Index of the top-level `main` function, if any.
    pub fn main_index(&self) -> Option<usize> {
        self.statements.iter().position(|s| {
            matches!(&s.kind, StatementKind::Func(f) if f.name == crate::language::ENTRY_FUNCTION)
        })
    }

    /// Modules imported by a run of statements, with the import's site.
    pub fn imports_in(statements: &[Statement]) -> Vec<(&str, &Site)> {
        statements
            .iter()
            .filter_map(|s| match &s.kind {
                StatementKind::Import { module, .. } => Some((module.as_str(), &s.site)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub site: Site,
}

impl Statement {
    /// Declared name; imports have none.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            StatementKind::Import { .. } => None,
            StatementKind::Const(c) => Some(&c.name),
            StatementKind::Struct(s) => Some(&s.name),
            StatementKind::Enum(e) => Some(&e.name),
            StatementKind::Func(f) => Some(&f.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
    pub site: Site,
}

impl ImportName {
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Import {
        module: String,
        names: Vec<ImportName>,
    },
    Const(ConstDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Func(FuncDecl),
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub tag: Option<String>,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub enum ImplDecl {
    Func(FuncDecl),
    Const(ConstDecl),
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub impl_members: Vec<ImplDecl>,
}

#[derive(Debug, Clone)]
pub struct VariantDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<VariantDecl>,
    pub impl_members: Vec<ImplDecl>,
}

#[derive(Debug, Clone)]
pub struct TypeParamDecl {
    pub name: String,
    pub class: Option<String>,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub struct ArgDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub default: Option<Expr>,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub type_params: Vec<TypeParamDecl>,
    pub args: Vec<ArgDecl>,
    pub returns: Vec<TypeExpr>,
    pub body: Expr,
    pub site: Site,
}

impl FuncDecl {
    pub fn is_method(&self) -> bool {
        self.args.first().is_some_and(|a| a.name == "self")
    }
}

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    Named(String),
    List(Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Option(Box<TypeExpr>),
    Func {
        args: Vec<TypeExpr>,
        returns: Vec<TypeExpr>,
    },
    /// `T::Name`, a type-level member that is itself a type.
    Member(Box<TypeExpr>, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    And,
    Or,
}

impl BinaryOp {
    pub fn parse(s: &str) -> Option<BinaryOp> {
        Some(match s {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Neq,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Leq,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Geq,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    /// Member implementing the operator; `&&`/`||` have none.
    pub fn member(self) -> Option<&'static str> {
        Some(match self {
            BinaryOp::Add => "__add",
            BinaryOp::Sub => "__sub",
            BinaryOp::Mul => "__mul",
            BinaryOp::Div => "__div",
            BinaryOp::Mod => "__mod",
            BinaryOp::Eq => "__eq",
            BinaryOp::Neq => "__neq",
            BinaryOp::Lt => "__lt",
            BinaryOp::Leq => "__leq",
            BinaryOp::Gt => "__gt",
            BinaryOp::Geq => "__geq",
            BinaryOp::And | BinaryOp::Or => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Leq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Geq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn member(self) -> &'static str {
        match self {
            UnaryOp::Not => "__not",
            UnaryOp::Neg => "__neg",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallArgExpr {
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct LetBinding {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub enum NewFields {
    Positional(Vec<Expr>),
    Named(Vec<(String, Expr)>),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub variant: String,
    pub binding: Option<String>,
    pub body: Expr,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub site: Site,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i128),
    /// Fixed point with six decimals.
    Real(i128),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Name(String),
    TypeMember {
        ty: TypeExpr,
        name: String,
    },
    Member {
        object: Box<Expr>,
        name: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<CallArgExpr>,
    },
    TypeApply {
        callee: Box<Expr>,
        types: Vec<TypeExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Let {
        bindings: Vec<LetBinding>,
        /// True for `[a, b]` destructuring of a multi-valued expression.
        destructure: bool,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    New {
        ty: TypeExpr,
        fields: NewFields,
    },
    Switch {
        subject: Box<Expr>,
        cases: Vec<SwitchCase>,
        default: Option<Box<Expr>>,
    },
    Lambda {
        args: Vec<ArgDecl>,
        returns: Vec<TypeExpr>,
        body: Box<Expr>,
    },
    List {
        item: TypeExpr,
        items: Vec<Expr>,
    },
    Map {
        key: TypeExpr,
        value: TypeExpr,
        entries: Vec<(Expr, Expr)>,
    },
    Error(String),
    Print {
        message: Box<Expr>,
        body: Box<Expr>,
    },
    Values(Vec<Expr>),
}
