//! IR for the automatic members of user types.
//!
//! A struct with one field is represented by that field's data, a struct with
//! tagged fields by `constrData(0, [map])` keyed by the tag bytes, and any
//! other struct by a data list. Enum variants are `constrData(index, fields)`.


use crate::compile::CompilerError;
use crate::defs::{DefTable, Field, TypeDefKind};
use crate::ir::IrExpr;
use crate::ir_parse::parse_definitions;
use crate::members;
use crate::types::{member_path, DefId, Type};

const AND: &str = "__vallum__common__and";
const NIL: &str = "__core__mkNilData(())";

/// `a && b && …` with short-circuiting thunks.
fn and_chain(conds: &[String]) -> String {
    match conds.split_last() {
        None => "true".to_string(),
        Some((last, init)) => init
            .iter()
            .rev()
            .fold(last.clone(), |rest, c| format!("{AND}({c}, () -> {{ {rest} }})")),
    }
}

fn data_list(items: &[String]) -> String {
    items
        .iter()
        .rev()
        .fold(NIL.to_string(), |rest, x| format!("__core__mkCons({x}, {rest})"))
}

fn bytes_lit(tag: &str) -> String {
    format!("#{}", hex::encode(tag.as_bytes()))
}

fn to_data(f: &Field, value: &str) -> String {
    format!("{}({value})", members::to_data_path(&f.ty))
}

fn from_data(f: &Field, value: &str) -> String {
    format!("{}({value})", members::from_data_path(&f.ty))
}

fn is_valid(f: &Field, value: &str) -> String {
    format!("{}({value})", members::is_valid_data_path(&f.ty))
}

enum Layout {
    Single,
    List,
    Tagged,
    Constr(usize),
}

struct Emitter {
    path: String,
    fields: Vec<Field>,
    layout: Layout,
    out: String,
}

impl Emitter {
    fn def(&mut self, member: &str, body: String) {
        self.out.push_str(&format!("{} = {body};\n", member_path(&self.path, member)));
    }

    fn arg_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    fn constructor(&mut self) {
        let args = self.arg_names().join(", ");
        let encoded: Vec<String> = self.fields.iter().map(|f| to_data(f, &f.name)).collect();
        let body = match &self.layout {
            Layout::Single => encoded.join(""),
            Layout::List => format!("__core__listData({})", data_list(&encoded)),
            Layout::Tagged => {
                let pairs = self
                    .fields
                    .iter()
                    .zip(&encoded)
                    .rev()
                    .fold("__core__mkNilPairData(())".to_string(), |rest, (f, v)| {
                        let tag = bytes_lit(f.tag.as_deref().unwrap_or_default());
                        format!("__core__mkCons(__core__mkPairData(__core__bData({tag}), {v}), {rest})")
                    });
                format!(
                    "__core__constrData(0, __core__mkCons(__core__mapData({pairs}), {NIL}))"
                )
            }
            Layout::Constr(index) => format!("__core__constrData({index}, {})", data_list(&encoded)),
        };
        self.def(members::NEW, format!("({args}) -> {{ {body} }}"));
    }

    fn field_data(&self, i: usize, f: &Field) -> String {
        match &self.layout {
            Layout::Single => "self".to_string(),
            Layout::List => format!("__vallum__common__list_get(__core__unListData(self), {i})"),
            Layout::Tagged => format!(
                "__vallum__common__cip68_get(self, {})",
                bytes_lit(f.tag.as_deref().unwrap_or_default())
            ),
            Layout::Constr(_) => format!("__vallum__common__field(self, {i})"),
        }
    }

    fn getters(&mut self) {
        let fields = self.fields.clone();
        for (i, f) in fields.iter().enumerate() {
            let body = from_data(f, &self.field_data(i, f));
            self.def(&f.name, format!("(self) -> {{ {body} }}"));
        }
    }

    fn validity(&mut self) {
        let n = self.fields.len();
        let body = match &self.layout {
            Layout::Single => match self.fields.first() {
                Some(f) => is_valid(f, "data"),
                None => "true".to_string(),
            },
            Layout::List => {
                let mut conds = vec![format!(
                    "__core__equalsInteger(__vallum__common__list_length(fields), {n})"
                )];
                conds.extend(self.fields.iter().enumerate().map(|(i, f)| {
                    is_valid(f, &format!("__vallum__common__list_get(fields, {i})"))
                }));
                format!(
                    "__core__ifThenElse(__vallum__common__is_list(data), () -> {{ (fields) -> {{ {} }}(__core__unListData(data)) }}, () -> {{ false }})()",
                    and_chain(&conds)
                )
            }
            Layout::Tagged => {
                let lookups: Vec<String> = self
                    .fields
                    .iter()
                    .map(|f| {
                        format!(
                            "__vallum__common__map_find_valid(entries, __core__bData({}), {})",
                            bytes_lit(f.tag.as_deref().unwrap_or_default()),
                            members::is_valid_data_path(&f.ty)
                        )
                    })
                    .collect();
                let in_map = format!(
                    "(entries) -> {{ {} }}(__core__unMapData(head))",
                    and_chain(&lookups)
                );
                let in_head = format!(
                    "(head) -> {{ {} }}(__core__headList(fields))",
                    and_chain(&["__vallum__common__is_map(head)".to_string(), in_map])
                );
                let in_fields = format!(
                    "(fields) -> {{ {} }}(__core__sndPair(pair))",
                    and_chain(&["__vallum__common__not(__core__nullList(fields))".to_string(), in_head])
                );
                let in_pair = format!(
                    "(pair) -> {{ {} }}(__core__unConstrData(data))",
                    and_chain(&["__core__equalsInteger(__core__fstPair(pair), 0)".to_string(), in_fields])
                );
                format!(
                    "__core__ifThenElse(__vallum__common__is_constr(data), () -> {{ {in_pair} }}, () -> {{ false }})()"
                )
            }
            Layout::Constr(index) => {
                let mut conds = vec![format!(
                    "__core__equalsInteger(__vallum__common__list_length(fields), {n})"
                )];
                conds.extend(self.fields.iter().enumerate().map(|(i, f)| {
                    is_valid(f, &format!("__vallum__common__list_get(fields, {i})"))
                }));
                let in_fields = format!("(fields) -> {{ {} }}(__core__sndPair(pair))", and_chain(&conds));
                let in_pair = format!(
                    "(pair) -> {{ {} }}(__core__unConstrData(data))",
                    and_chain(&[format!("__core__equalsInteger(__core__fstPair(pair), {index})"), in_fields])
                );
                format!(
                    "__core__ifThenElse(__vallum__common__is_constr(data), () -> {{ {in_pair} }}, () -> {{ false }})()"
                )
            }
        };
        self.def(members::IS_VALID_DATA, format!("(data) -> {{ {body} }}"));
    }

    fn equality(&mut self) {
        let body = match &self.layout {
            Layout::Tagged => {
                let names: Vec<String> = (0..self.fields.len()).map(|i| format!("__o{i}")).collect();
                let lookups: Vec<String> = self
                    .fields
                    .iter()
                    .map(|f| {
                        format!(
                            "__vallum__common__cip68_get(other, {})",
                            bytes_lit(f.tag.as_deref().unwrap_or_default())
                        )
                    })
                    .collect();
                let conds: Vec<String> = self
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(i, f)| format!("__core__equalsData({}, __o{i})", self.field_data(i, f)))
                    .collect();
                format!(
                    "({}) -> {{ {} }}({})",
                    names.join(", "),
                    and_chain(&conds),
                    lookups.join(", ")
                )
            }
            _ => "__core__equalsData(self, other)".to_string(),
        };
        self.def(members::EQ, format!("(self) -> {{ (other) -> {{ {body} }} }}"));
        let eq = member_path(&self.path, members::EQ);
        self.def(
            members::NEQ,
            format!("(self) -> {{ (other) -> {{ __vallum__common__not({eq}(self)(other)) }} }}"),
        );
    }

    fn conversions(&mut self) {
        self.def(members::TO_DATA, "(self) -> { self }".to_string());
        self.def(members::FROM_DATA, "(data) -> { data }".to_string());
        self.def(
            members::SERIALIZE,
            "(self) -> { () -> { __core__serialiseData(self) } }".to_string(),
        );
    }

    fn copy(&mut self) {
        let mut params = Vec::new();
        let mut values = Vec::new();
        for f in &self.fields {
            params.push(f.name.clone());
            params.push(format!("__useopt__{}", f.name));
            values.push(format!(
                "__core__ifThenElse(__useopt__{0}, () -> {{ {0} }}, () -> {{ {1}(__self) }})()",
                f.name,
                member_path(&self.path, &f.name)
            ));
        }
        let new = member_path(&self.path, members::NEW);
        self.def(
            members::COPY,
            format!(
                "(__self) -> {{ ({}) -> {{ {new}({}) }} }}",
                params.join(", "),
                values.join(", ")
            ),
        );
    }

    fn record(mut self) -> String {
        self.constructor();
        self.getters();
        self.conversions();
        self.validity();
        self.equality();
        self.copy();
        self.out
    }
}

fn parse(text: &str, path: &str) -> Result<Vec<(String, IrExpr)>, CompilerError> {
    parse_definitions(text)
        .map_err(|e| CompilerError::internal(format!("generated IR for {path} does not parse: {e}")))
}

/// Automatic member definitions of a struct or an enum and its variants, in
/// dependency order.
pub fn generate(defs: &DefTable, id: DefId) -> Result<Vec<(String, IrExpr)>, CompilerError> {
    let def = defs.get(id);
    let text = match &def.kind {
        TypeDefKind::Struct { fields } => {
            let u = defs.user_type(id);
            let layout = if defs.is_cip68(&u) {
                Layout::Tagged
            } else if fields.len() == 1 {
                Layout::Single
            } else {
                Layout::List
            };
            Emitter {
                path: def.path.clone(),
                fields: fields.clone(),
                layout,
                out: String::new(),
            }
            .record()
        }
        TypeDefKind::Enum { variants } => {
            let mut text = String::new();
            for v in variants {
                let vt = defs.variant_type(id, v.index).ok_or_else(|| {
                    CompilerError::internal(format!("{} has no variant {}", def.name, v.index))
                })?;
                text.push_str(
                    &Emitter {
                        path: Type::User(vt).path(),
                        fields: v.fields.clone(),
                        layout: Layout::Constr(v.index),
                        out: String::new(),
                    }
                    .record(),
                );
            }
            let mut e = Emitter {
                path: def.path.clone(),
                fields: Vec::new(),
                layout: Layout::Single,
                out: text,
            };
            let dispatch = variants.iter().rev().fold("false".to_string(), |rest, v| {
                let check = defs
                    .variant_type(id, v.index)
                    .map(|vt| members::is_valid_data_path(&Type::User(vt)))
                    .unwrap_or_default();
                format!(
                    "__core__ifThenElse(__core__equalsInteger(__tag, {}), () -> {{ {check}(data) }}, () -> {{ {rest} }})()",
                    v.index
                )
            });
            e.def(
                members::IS_VALID_DATA,
                format!(
                    "(data) -> {{ __core__ifThenElse(__vallum__common__is_constr(data), () -> {{ (__tag) -> {{ {dispatch} }}(__core__fstPair(__core__unConstrData(data))) }}, () -> {{ false }})() }}"
                ),
            );
            e.equality();
            e.conversions();
            e.out
        }
    };
    parse(&text, &def.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Site;
    use crate::data::Data;
    use crate::ir_eval::{evaluate, Constant};
    use crate::definitions::{self, BuildOptions};

    fn site() -> Site {
        Site::new("m", "")
    }

    fn int_field(name: &str, tag: Option<&str>) -> Field {
        Field {
            name: name.to_string(),
            ty: Type::int(),
            tag: tag.map(str::to_string),
        }
    }

    fn struct_def(fields: Vec<Field>) -> (DefTable, DefId) {
        let mut defs = DefTable::default();
        let id = defs.alloc_struct("m", "S", &site());
        if let TypeDefKind::Struct { fields: slot } = &mut defs.get_mut(id).kind {
            *slot = fields;
        }
        (defs, id)
    }

    /// Evaluates `expr` against the generated defs linked with the library.
    fn eval_with(generated: &[(String, IrExpr)], expr: &str) -> Result<Constant, String> {
        let root = crate::ir_parse::parse_ir(expr).expect("parse expr");
        let (graph, root) = definitions::link(generated.to_vec(), root, &BuildOptions::default())
            .map_err(|e| e.to_string())?;
        evaluate(&graph.wrap(root), 1_000_000).result
    }

    #[test]
    fn list_struct_round_trip() {
        let (defs, id) = struct_def(vec![int_field("a", None), int_field("b", None)]);
        let generated = generate(&defs, id).expect("generate");
        let keys: Vec<&str> = generated.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"__module__m__S____new"));
        assert!(keys.contains(&"__module__m__S__copy"));
        assert_eq!(
            eval_with(&generated, "__module__m__S____new(1, 2)"),
            Ok(Constant::Data(Data::List(vec![Data::Int(1), Data::Int(2)])))
        );
        assert_eq!(
            eval_with(&generated, "__module__m__S__b(__module__m__S____new(1, 2))"),
            Ok(Constant::Int(2))
        );
        assert_eq!(
            eval_with(
                &generated,
                "__module__m__S__b(__module__m__S__copy(__module__m__S____new(1, 2))((), false, 7, true))"
            ),
            Ok(Constant::Int(7))
        );
        assert_eq!(
            eval_with(&generated, "__module__m__S__is_valid_data(__core__listData(__core__mkCons(__core__iData(1), __core__mkNilData(()))))"),
            Ok(Constant::Bool(false))
        );
    }

    #[test]
    fn tagged_struct_is_a_constr_map() {
        let (defs, id) = struct_def(vec![int_field("a", Some("x")), int_field("b", Some("y"))]);
        let generated = generate(&defs, id).expect("generate");
        let expected = Data::constr(
            0,
            vec![Data::Map(vec![
                (Data::bytes(b"x".to_vec()), Data::Int(1)),
                (Data::bytes(b"y".to_vec()), Data::Int(2)),
            ])],
        );
        assert_eq!(
            eval_with(&generated, "__module__m__S____new(1, 2)"),
            Ok(Constant::Data(expected))
        );
        assert_eq!(
            eval_with(&generated, "__module__m__S__a(__module__m__S____new(1, 2))"),
            Ok(Constant::Int(1))
        );
        assert_eq!(
            eval_with(&generated, "__module__m__S__is_valid_data(__module__m__S____new(1, 2))"),
            Ok(Constant::Bool(true))
        );
        assert_eq!(
            eval_with(
                &generated,
                "__module__m__S____eq(__module__m__S____new(1, 2))(__module__m__S____new(1, 3))"
            ),
            Ok(Constant::Bool(false))
        );
    }

    #[test]
    fn enum_validity_dispatches_on_tag() {
        let mut defs = DefTable::default();
        let id = defs.alloc_enum("m", "E", &site(), vec![("A".into(), site()), ("B".into(), site())]);
        if let TypeDefKind::Enum { variants } = &mut defs.get_mut(id).kind {
            variants[1].fields = vec![int_field("n", None)];
        }
        let generated = generate(&defs, id).expect("generate");
        assert_eq!(
            eval_with(&generated, "__module__m__E__is_valid_data(__module__m__E__B____new(3))"),
            Ok(Constant::Bool(true))
        );
        assert_eq!(
            eval_with(&generated, "__module__m__E__is_valid_data(__core__constrData(2, __core__mkNilData(())))"),
            Ok(Constant::Bool(false))
        );
        assert_eq!(
            eval_with(&generated, "__module__m__E__B__n(__module__m__E__B____new(3))"),
            Ok(Constant::Int(3))
        );
    }
}
