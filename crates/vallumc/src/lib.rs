pub mod ast;
pub mod ast_json;
pub mod check;
pub mod compile;
pub mod data;
pub mod definitions;
pub mod defs;
pub mod diagnostics;
pub mod entry;
pub mod instance;
pub mod ir;
pub mod ir_eval;
pub mod ir_parse;
pub mod language;
pub mod library;
pub mod members;
pub mod modules;
pub mod primitives;
pub mod program;
pub mod scope;
pub mod types;
pub mod validate;

mod func;
mod infer;
mod type_ir;
