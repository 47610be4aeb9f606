#![allow(dead_code)]

use serde_json::{json, Value};

use vallumc::compile::{compile_program, CompileOptions, CompilerError};
use vallumc::data::Data;
use vallumc::ir_eval::{apply_data, Constant};

pub fn module(kind: &str, name: &str, statements: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "schema_version": vallum_contracts::VALLUM_AST_SCHEMA_VERSION,
        "kind": kind,
        "name": name,
        "statements": statements,
    }))
    .expect("encode Vallum AST JSON")
}

pub fn testing(name: &str, statements: Vec<Value>) -> Vec<u8> {
    module("testing", name, statements)
}

pub fn library(name: &str, statements: Vec<Value>) -> Vec<u8> {
    module("module", name, statements)
}

pub fn import(module: &str, names: &[&str]) -> Value {
    json!({ "kind": "import", "module": module, "names": names })
}

pub fn func(name: &str, args: &[(&str, Value)], returns: Value, body: Value) -> Value {
    let args: Vec<Value> = args
        .iter()
        .map(|(name, ty)| json!({ "name": name, "type": ty }))
        .collect();
    json!({
        "kind": "func",
        "name": name,
        "args": args,
        "returns": returns,
        "body": body,
    })
}

pub fn generic(name: &str, params: &[&str], args: &[(&str, Value)], returns: Value, body: Value) -> Value {
    let mut f = func(name, args, returns, body);
    f["type_params"] = params.iter().map(|p| json!({ "name": p })).collect();
    f
}

pub fn constant(name: &str, ty: &str, value: Value) -> Value {
    json!({ "kind": "const", "name": name, "type": ty, "value": value })
}

pub fn structure(name: &str, fields: &[(&str, &str)]) -> Value {
    let fields: Vec<Value> = fields
        .iter()
        .map(|(name, ty)| json!({ "name": name, "type": ty }))
        .collect();
    json!({ "kind": "struct", "name": name, "fields": fields })
}

/// Struct whose fields carry CIP-68 tags equal to their names.
pub fn tagged_structure(name: &str, fields: &[(&str, &str)]) -> Value {
    let fields: Vec<Value> = fields
        .iter()
        .map(|(name, ty)| json!({ "name": name, "type": ty, "tag": name }))
        .collect();
    json!({ "kind": "struct", "name": name, "fields": fields })
}

pub fn compile(main: &[u8], modules: &[Vec<u8>]) -> Result<vallumc::compile::CompileOutput, CompilerError> {
    compile_program(main, modules, &CompileOptions::default())
}

/// Compiles and applies the program to `args`.
pub fn run(main: &[u8], modules: &[Vec<u8>], args: &[Data]) -> Result<Constant, String> {
    let out = compile(main, modules).map_err(|e| e.to_string())?;
    apply_data(&out.ir, args, 1_000_000).result
}

pub fn yes() -> Result<Constant, String> {
    Ok(Constant::Data(Data::bool(true)))
}

pub fn no() -> Result<Constant, String> {
    Ok(Constant::Data(Data::bool(false)))
}

pub fn key(tag: &str) -> Data {
    Data::bytes(tag.as_bytes().to_vec())
}

pub fn cip68(entries: &[(&str, i128)]) -> Data {
    Data::constr(
        0,
        vec![Data::Map(
            entries.iter().map(|(k, v)| (key(k), Data::Int(*v))).collect(),
        )],
    )
}
