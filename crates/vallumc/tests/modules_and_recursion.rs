use serde_json::json;
use vallumc::compile::CompileErrorKind;
use vallumc::data::Data;
use vallumc::ir_eval::Constant;

mod vallum_program;

use vallum_program::{compile, func, generic, import, library, no, run, testing, yes};

fn int_result(n: i128) -> Result<Constant, String> {
    Ok(Constant::Data(Data::Int(n)))
}

#[test]
fn imported_functions_resolve() {
    let util = library(
        "util",
        vec![func("double", &[("x", json!("Int"))], json!("Int"), json!(["*", "x", 2]))],
    );
    let main = testing(
        "calc",
        vec![
            import("util", &["double"]),
            func("main", &[("x", json!("Int"))], json!("Int"), json!(["call", "double", ["+", "x", 1]])),
        ],
    );
    assert_eq!(run(&main, &[util], &[Data::Int(4)]), int_result(10));
}

#[test]
fn transitive_imports_are_included_once() {
    let base = library(
        "base",
        vec![func("inc", &[("x", json!("Int"))], json!("Int"), json!(["+", "x", 1]))],
    );
    let mid = library(
        "mid",
        vec![
            import("base", &["inc"]),
            func("inc2", &[("x", json!("Int"))], json!("Int"), json!(["call", "inc", ["call", "inc", "x"]])),
        ],
    );
    let main = testing(
        "calc",
        vec![
            import("base", &["inc"]),
            import("mid", &["inc2"]),
            func("main", &[("x", json!("Int"))], json!("Int"), json!(["call", "inc2", ["call", "inc", "x"]])),
        ],
    );
    assert_eq!(run(&main, &[mid, base], &[Data::Int(0)]), int_result(3));
}

#[test]
fn import_cycles_are_fatal() {
    let a = library("a", vec![import("b", &[])]);
    let b = library("b", vec![import("a", &[])]);
    let main = testing(
        "t",
        vec![import("a", &[]), func("main", &[], json!("Int"), json!(1))],
    );
    let err = compile(&main, &[a, b]).expect_err("cycle");
    assert_eq!(err.kind, CompileErrorKind::Syntax);
    assert!(err.message.contains("import cycle: a -> b -> a"), "{}", err.message);

    let selfish = library("s", vec![import("s", &[])]);
    let main = testing(
        "t",
        vec![import("s", &[]), func("main", &[], json!("Int"), json!(1))],
    );
    let err = compile(&main, &[selfish]).expect_err("self import");
    assert!(err.message.contains("module s imports itself"), "{}", err.message);
}

#[test]
fn missing_modules_are_reference_errors() {
    let main = testing(
        "t",
        vec![import("nowhere", &[]), func("main", &[], json!("Int"), json!(1))],
    );
    let err = compile(&main, &[]).expect_err("missing module");
    assert_eq!(err.kind, CompileErrorKind::Reference);
}

#[test]
fn self_recursion() {
    let main = testing(
        "fact",
        vec![
            func(
                "fact",
                &[("n", json!("Int"))],
                json!("Int"),
                json!(["if", ["<=", "n", 1], 1, ["*", "n", ["call", "fact", ["-", "n", 1]]]]),
            ),
            func("main", &[("n", json!("Int"))], json!("Int"), json!(["call", "fact", "n"])),
        ],
    );
    assert_eq!(run(&main, &[], &[Data::Int(5)]), int_result(120));
}

#[test]
fn mutual_recursion() {
    let main = testing(
        "parity",
        vec![
            func(
                "is_even",
                &[("n", json!("Int"))],
                json!("Bool"),
                json!(["if", ["==", "n", 0], true, ["call", "is_odd", ["-", "n", 1]]]),
            ),
            func(
                "is_odd",
                &[("n", json!("Int"))],
                json!("Bool"),
                json!(["if", ["==", "n", 0], false, ["call", "is_even", ["-", "n", 1]]]),
            ),
            func("main", &[("n", json!("Int"))], json!("Bool"), json!(["call", "is_even", "n"])),
        ],
    );
    assert_eq!(run(&main, &[], &[Data::Int(10)]), yes());
    assert_eq!(run(&main, &[], &[Data::Int(7)]), no());
}

#[test]
fn generic_functions_specialize_per_type() {
    let main = testing(
        "generic",
        vec![
            generic(
                "same",
                &["T"],
                &[("a", json!("T")), ("b", json!("T"))],
                json!("Bool"),
                json!(["==", "a", "b"]),
            ),
            func(
                "main",
                &[("x", json!("Int")), ("y", json!("ByteArray"))],
                json!("Bool"),
                json!(["&&", ["call", "same", "x", 3], ["call", "same", "y", ["bytes", "beef"]]]),
            ),
        ],
    );
    let out = compile(&main, &[]).expect("compile");
    let text = out.ir_text();
    assert!(text.contains("__module__generic__same[__vallum__int]"), "{text}");
    assert!(text.contains("__module__generic__same[__vallum__bytearray]"), "{text}");
    assert!(!text.contains("$0"), "{text}");

    assert_eq!(run(&main, &[], &[Data::Int(3), Data::bytes(vec![0xbe, 0xef])]), yes());
    assert_eq!(run(&main, &[], &[Data::Int(3), Data::bytes(vec![0x00])]), no());
}

#[test]
fn compiling_twice_is_deterministic() {
    let main = testing(
        "fact",
        vec![
            func(
                "fact",
                &[("n", json!("Int"))],
                json!("Int"),
                json!(["if", ["<=", "n", 1], 1, ["*", "n", ["call", "fact", ["-", "n", 1]]]]),
            ),
            func("main", &[("n", json!("Int"))], json!("Int"), json!(["call", "fact", "n"])),
        ],
    );
    let a = compile(&main, &[]).expect("compile").ir_text();
    let b = compile(&main, &[]).expect("compile").ir_text();
    assert_eq!(a, b);
    let reparsed = vallumc::ir_parse::parse_ir(&a).expect("printed IR parses");
    assert_eq!(reparsed.to_string(), a);
}
