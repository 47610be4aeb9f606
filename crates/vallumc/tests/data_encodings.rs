use serde_json::json;
use vallumc::data::Data;
use vallumc::ir_eval::Constant;

mod vallum_program;

use vallum_program::{cip68, func, key, no, run, structure, tagged_structure, testing, yes};

fn validity_program(s: serde_json::Value) -> Vec<u8> {
    testing(
        "validity",
        vec![
            s,
            func("main", &[("d", json!("Data"))], json!("Bool"), json!(["call", "S::is_valid_data", "d"])),
        ],
    )
}

#[test]
fn single_field_struct_is_its_field() {
    let program = validity_program(structure("S", &[("a", "Int")]));
    assert_eq!(run(&program, &[], &[Data::Int(7)]), yes());
    for bad in [
        Data::bytes(vec![0x01]),
        Data::List(vec![Data::Int(7)]),
        Data::Map(vec![(Data::Int(1), Data::Int(7))]),
        Data::constr(0, vec![Data::Int(7)]),
    ] {
        assert_eq!(run(&program, &[], &[bad.clone()]), no(), "{bad:?}");
    }
}

#[test]
fn two_field_struct_is_a_list() {
    let program = validity_program(structure("S", &[("a", "Int"), ("b", "Int")]));
    assert_eq!(run(&program, &[], &[Data::List(vec![Data::Int(1), Data::Int(2)])]), yes());
    for bad in [
        Data::List(vec![Data::Int(1)]),
        Data::List(vec![Data::Int(1), Data::Int(2), Data::Int(3)]),
        Data::List(vec![Data::Int(1), Data::bytes(vec![2])]),
        Data::Int(1),
        Data::constr(0, vec![Data::Int(1), Data::Int(2)]),
    ] {
        assert_eq!(run(&program, &[], &[bad.clone()]), no(), "{bad:?}");
    }
}

#[test]
fn tagged_struct_is_a_keyed_map() {
    let program = validity_program(tagged_structure("S", &[("a", "Int"), ("b", "Int")]));
    assert_eq!(run(&program, &[], &[cip68(&[("a", 1), ("b", 2)])]), yes());
    assert_eq!(run(&program, &[], &[cip68(&[("b", 2), ("a", 1)])]), yes(), "key order");
    assert_eq!(
        run(&program, &[], &[cip68(&[("b", 2), ("extra", 9), ("a", 1)])]),
        yes(),
        "unknown keys"
    );
    assert_eq!(run(&program, &[], &[cip68(&[("a", 1)])]), no(), "missing b");
    assert_eq!(run(&program, &[], &[cip68(&[("b", 1)])]), no(), "missing a");
    let wrong_value = Data::constr(0, vec![Data::Map(vec![(key("a"), Data::Int(1)), (key("b"), key("x"))])]);
    assert_eq!(run(&program, &[], &[wrong_value]), no());
    assert_eq!(run(&program, &[], &[Data::List(vec![Data::Int(1), Data::Int(2)])]), no());
}

#[test]
fn tagged_struct_equality_ignores_order_and_extra_keys() {
    let program = testing(
        "equality",
        vec![
            tagged_structure("S", &[("a", "Int"), ("b", "Int")]),
            func(
                "main",
                &[("x", json!("Data")), ("y", json!("Data"))],
                json!("Bool"),
                json!(["==", ["call", "S::from_data", "x"], ["call", "S::from_data", "y"]]),
            ),
        ],
    );
    let lhs = cip68(&[("a", 1), ("b", 2)]);
    assert_eq!(
        run(&program, &[], &[lhs.clone(), cip68(&[("b", 2), ("c", 3), ("a", 1)])]),
        yes()
    );
    assert_eq!(run(&program, &[], &[lhs.clone(), cip68(&[("a", 1), ("b", 5)])]), no());

    let err = run(&program, &[], &[lhs, cip68(&[("a", 1)])]).expect_err("missing key raises");
    assert!(err.contains("key not found"), "{err}");
}

#[test]
fn constructed_records_round_trip() {
    let build = testing(
        "build",
        vec![
            structure("P", &[("owner", "ByteArray"), ("amount", "Int")]),
            func("main", &[("n", json!("Int"))], json!("P"), json!(["new", "P", ["bytes", "cafe"], "n"])),
        ],
    );
    let encoded = Data::List(vec![Data::bytes(vec![0xca, 0xfe]), Data::Int(3)]);
    assert_eq!(run(&build, &[], &[Data::Int(3)]), Ok(Constant::Data(encoded.clone())));

    let read = testing(
        "read",
        vec![
            structure("P", &[("owner", "ByteArray"), ("amount", "Int")]),
            func(
                "main",
                &[("d", json!("Data"))],
                json!("Int"),
                json!([".", ["call", "P::from_data", "d"], "amount"]),
            ),
        ],
    );
    assert_eq!(run(&read, &[], &[encoded]), Ok(Constant::Data(Data::Int(3))));
}
