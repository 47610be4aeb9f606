use serde_json::json;
use vallumc::compile::{compile_program, CompileErrorKind, CompileOptions};
use vallumc::data::Data;
use vallumc::ir_eval::{apply_data, Constant};
use vallumc::program::Program;
use vallumc::types::Type;

mod vallum_program;

use vallum_program::{constant, func, no, testing, yes};

fn limited() -> Vec<u8> {
    testing(
        "limited",
        vec![
            constant("LIMIT", "Int", json!(["+", 4, 6])),
            constant("GREETING", "String", json!(["str", "hi"])),
            func(
                "main",
                &[("x", json!("Int"))],
                json!("Bool"),
                json!(["&&", ["<", "x", "LIMIT"], ["==", "GREETING", "GREETING"]]),
            ),
            constant("LATE", "Int", json!(["*", "LIMIT", 2])),
        ],
    )
}

#[test]
fn undeclared_parameter_is_a_reference_error() {
    let mut program = Program::from_json(&limited(), &[]).expect("program");
    let err = program.parameter_value("MISSING_LIMIT").expect_err("undeclared");
    assert_eq!(err.kind, CompileErrorKind::Reference);
    assert!(err.message.contains("MISSING_LIMIT"), "{}", err.message);
}

#[test]
fn parameters_list_every_main_module_const() {
    let mut program = Program::from_json(&limited(), &[]).expect("program");
    assert_eq!(
        program.parameter_types(),
        vec![
            ("LIMIT".to_string(), Type::int()),
            ("GREETING".to_string(), Type::string()),
            ("LATE".to_string(), Type::int()),
        ]
    );
    assert_eq!(program.parameter_value("LIMIT").expect("LIMIT"), Data::Int(10));
    assert_eq!(program.parameter_value("GREETING").expect("GREETING"), Data::utf8("hi"));
    assert_eq!(program.parameter_value("LATE").expect("LATE"), Data::Int(20));
}

#[test]
fn set_parameter_changes_compiled_behaviour() {
    let mut program = Program::from_json(&limited(), &[]).expect("program");
    let before = program.to_ir().expect("ir");
    assert_eq!(apply_data(&before, &[Data::Int(5)], 1_000_000).result, yes());

    program.set_parameter("LIMIT", Data::Int(3)).expect("valid Int");
    let after = program.to_ir().expect("ir");
    assert_eq!(apply_data(&after, &[Data::Int(5)], 1_000_000).result, no());
    assert_eq!(program.parameter_value("LATE").expect("LATE"), Data::Int(6));

    let err = program
        .set_parameter("LIMIT", Data::bytes(vec![1, 2]))
        .expect_err("bytes are not an Int");
    assert_eq!(err.kind, CompileErrorKind::Type);
    assert_eq!(program.parameter_value("LIMIT").expect("LIMIT"), Data::Int(3));
}

#[test]
fn parametric_compile_fills_holes_later() {
    let options = CompileOptions {
        parametric: vec!["LIMIT".to_string()],
        ..CompileOptions::default()
    };
    let out = compile_program(&limited(), &[], &options).expect("parametric compile");
    assert_eq!(out.parameters, vec![("LIMIT".to_string(), Type::int())]);
    assert!(out.ir_text().contains("__PARAM_0"));

    let program = Program::from_json(&limited(), &[]).expect("program");
    let parametric = program
        .compile_parametric(&["LIMIT".to_string()])
        .expect("parametric");
    let ir = parametric.instantiate(&[Data::Int(100)]).expect("instantiate");
    assert_eq!(
        apply_data(&ir, &[Data::Int(50)], 1_000_000).result,
        Ok(Constant::Data(Data::bool(true)))
    );
    let ir = parametric.instantiate(&[Data::Int(1)]).expect("instantiate");
    assert_eq!(apply_data(&ir, &[Data::Int(50)], 1_000_000).result, no());
}

#[test]
fn post_main_consts_cannot_be_left_open() {
    let program = Program::from_json(&limited(), &[]).expect("program");
    let err = program
        .compile_parametric(&["LATE".to_string()])
        .expect_err("declared after main");
    assert_eq!(err.kind, CompileErrorKind::Syntax);
}
