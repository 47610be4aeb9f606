use serde_json::{json, Value};
use vallumc::compile::CompileErrorKind;

mod vallum_program;

use vallum_program::{compile, func, generic, structure, testing};

fn enumeration(name: &str, variants: Vec<(&str, Vec<(&str, &str)>)>) -> Value {
    let variants: Vec<Value> = variants
        .into_iter()
        .map(|(name, fields)| {
            let fields: Vec<Value> = fields
                .iter()
                .map(|(name, ty)| json!({ "name": name, "type": ty }))
                .collect();
            json!({ "name": name, "fields": fields })
        })
        .collect();
    json!({ "kind": "enum", "name": name, "variants": variants })
}

#[test]
fn variants_convert_to_their_own_enum_only() {
    let statements = |returns: &str| {
        vec![
            structure("Act", &[("a", "Int")]),
            enumeration("Action", vec![("Claim", vec![("b", "ByteArray")])]),
            func("main", &[("x", json!("Action::Claim"))], json!(returns), json!("x")),
        ]
    };
    compile(&testing("widen", statements("Action")), &[]).expect("variant widens to its enum");

    let err = compile(&testing("sibling", statements("Act")), &[]).expect_err("unrelated struct");
    assert_eq!(err.kind, CompileErrorKind::Type);
}

#[test]
fn type_names_may_not_end_in_underscore() {
    let program = testing(
        "trailing",
        vec![
            structure("T", &[("a", "Int")]),
            enumeration("T_", vec![("V", vec![("b", "ByteArray")])]),
            func("main", &[("x", json!("T_::V"))], json!("T"), json!("x")),
        ],
    );
    let err = compile(&program, &[]).expect_err("T_ is not a valid type name");
    assert_eq!(err.kind, CompileErrorKind::Syntax);
}

#[test]
fn ir_keywords_are_rejected_as_names() {
    let field = testing(
        "keyword_field",
        vec![
            structure("S", &[("true", "Int"), ("b", "Int")]),
            func(
                "main",
                &[("x", json!("Int"))],
                json!("Int"),
                json!([".", ["new", "S", { "true": "x", "b": 2 }], "true"]),
            ),
        ],
    );
    let err = compile(&field, &[]).expect_err("true as a field name");
    assert_eq!(err.kind, CompileErrorKind::Syntax);
    assert!(err.message.contains("reserved word"), "{}", err.message);

    let local = testing(
        "keyword_local",
        vec![func(
            "main",
            &[("x", json!("Int"))],
            json!("Int"),
            json!(["let", "error", "x", "error"]),
        )],
    );
    let err = compile(&local, &[]).expect_err("error as a local name");
    assert_eq!(err.kind, CompileErrorKind::Syntax);
}

fn pair_program(call: Value) -> Vec<u8> {
    testing(
        "pairs",
        vec![
            enumeration("E", vec![("A", vec![]), ("B", vec![])]),
            generic(
                "f",
                &["T"],
                &[("_a", json!("T")), ("_b", json!("T"))],
                json!("Bool"),
                json!(true),
            ),
            func(
                "main",
                &[("x", json!("E")), ("y", json!("E::A"))],
                json!("Bool"),
                call,
            ),
        ],
    )
}

#[test]
fn inference_needs_identical_types_in_either_order() {
    for call in [json!(["call", "f", "x", "y"]), json!(["call", "f", "y", "x"])] {
        let err = compile(&pair_program(call.clone()), &[]).expect_err("enum and variant differ");
        assert_eq!(err.kind, CompileErrorKind::Type, "{call}");
        assert!(err.message.contains("supply explicit type arguments"), "{}", err.message);
    }

    compile(&pair_program(json!(["call", ["tapp", "f", "E"], "y", "x"])), &[])
        .expect("explicit type arguments");
}
