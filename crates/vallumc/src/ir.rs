//! The untyped intermediate representation the compiler lowers to.
//!
//! An `IrExpr` is a tree of names, literals, multi-argument lambdas, calls and
//! `error` terms. All rewriting in the definition-graph builder is structural
//! over *free* name references; lambda-bound names are never touched.

use std::collections::BTreeSet;
use std::fmt::Display;

use crate::data::Data;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrLiteral {
    Int(i128),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Unit,
    Data(Data),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrExpr {
    Name(String),
    Literal(IrLiteral),
    Lambda { params: Vec<String>, body: Box<IrExpr> },
    Call { callee: Box<IrExpr>, args: Vec<IrExpr> },
    Error(String),
}

impl IrExpr {
    pub fn name(name: impl Into<String>) -> Self {
        IrExpr::Name(name.into())
    }

    pub fn int(i: i128) -> Self {
        IrExpr::Literal(IrLiteral::Int(i))
    }

    pub fn bool(b: bool) -> Self {
        IrExpr::Literal(IrLiteral::Bool(b))
    }

    pub fn str(s: impl Into<String>) -> Self {
        IrExpr::Literal(IrLiteral::Str(s.into()))
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        IrExpr::Literal(IrLiteral::Bytes(b.into()))
    }

    pub fn unit() -> Self {
        IrExpr::Literal(IrLiteral::Unit)
    }

    pub fn data(d: Data) -> Self {
        IrExpr::Literal(IrLiteral::Data(d))
    }

    pub fn error(msg: impl Into<String>) -> Self {
        IrExpr::Error(msg.into())
    }

    pub fn lambda<S: Into<String>>(params: impl IntoIterator<Item = S>, body: IrExpr) -> Self {
        IrExpr::Lambda {
            params: params.into_iter().map(Into::into).collect(),
            body: Box::new(body),
        }
    }

    pub fn call(callee: IrExpr, args: Vec<IrExpr>) -> Self {
        IrExpr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    /// `name(args…)`
    pub fn call_named(name: &str, args: Vec<IrExpr>) -> Self {
        IrExpr::call(IrExpr::name(name), args)
    }

    /// `() -> { body }`
    pub fn delay(body: IrExpr) -> Self {
        IrExpr::lambda(Vec::<String>::new(), body)
    }

    /// `e()`
    pub fn force(e: IrExpr) -> Self {
        IrExpr::call(e, Vec::new())
    }

    /// `__core__ifThenElse(cond, () -> { then }, () -> { otherwise })()`
    pub fn if_then_else(cond: IrExpr, then: IrExpr, otherwise: IrExpr) -> Self {
        IrExpr::force(IrExpr::call_named(
            "__core__ifThenElse",
            vec![cond, IrExpr::delay(then), IrExpr::delay(otherwise)],
        ))
    }

    /// `((name) -> { body })(value)`
    pub fn let_in(name: &str, value: IrExpr, body: IrExpr) -> Self {
        IrExpr::call(IrExpr::lambda([name], body), vec![value])
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            IrExpr::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Free names in first-occurrence order, each listed once.
    pub fn free_names(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut bound = Vec::new();
        self.collect_free(&mut bound, &mut seen, &mut out);
        out
    }

    pub fn free_name_set(&self) -> BTreeSet<String> {
        self.free_names().into_iter().collect()
    }

    fn collect_free<'a>(
        &'a self,
        bound: &mut Vec<&'a str>,
        seen: &mut BTreeSet<String>,
        out: &mut Vec<String>,
    ) {
        match self {
            IrExpr::Name(n) => {
                if !bound.iter().any(|b| *b == n.as_str()) && seen.insert(n.clone()) {
                    out.push(n.clone());
                }
            }
            IrExpr::Literal(_) | IrExpr::Error(_) => {}
            IrExpr::Lambda { params, body } => {
                let mark = bound.len();
                bound.extend(params.iter().map(String::as_str));
                body.collect_free(bound, seen, out);
                bound.truncate(mark);
            }
            IrExpr::Call { callee, args } => {
                callee.collect_free(bound, seen, out);
                for a in args {
                    a.collect_free(bound, seen, out);
                }
            }
        }
    }

    /// Replaces free name references for which `f` returns a replacement.
    pub fn replace_free(&self, f: &mut dyn FnMut(&str) -> Option<IrExpr>) -> IrExpr {
        let mut bound = Vec::new();
        self.replace_free_inner(&mut bound, f)
    }

    fn replace_free_inner<'a>(
        &'a self,
        bound: &mut Vec<&'a str>,
        f: &mut dyn FnMut(&str) -> Option<IrExpr>,
    ) -> IrExpr {
        match self {
            IrExpr::Name(n) => {
                if bound.iter().any(|b| *b == n.as_str()) {
                    return self.clone();
                }
                f(n).unwrap_or_else(|| self.clone())
            }
            IrExpr::Literal(_) | IrExpr::Error(_) => self.clone(),
            IrExpr::Lambda { params, body } => {
                let mark = bound.len();
                bound.extend(params.iter().map(String::as_str));
                let body = body.replace_free_inner(bound, f);
                bound.truncate(mark);
                IrExpr::Lambda {
                    params: params.clone(),
                    body: Box::new(body),
                }
            }
            IrExpr::Call { callee, args } => IrExpr::Call {
                callee: Box::new(callee.replace_free_inner(bound, f)),
                args: args.iter().map(|a| a.replace_free_inner(bound, f)).collect(),
            },
        }
    }

    /// Rewrites every name (bound or free) through `f`. Used to fill template
    /// holes, which only occur inside generated paths.
    pub fn map_names(&self, f: &dyn Fn(&str) -> String) -> IrExpr {
        match self {
            IrExpr::Name(n) => IrExpr::Name(f(n)),
            IrExpr::Literal(_) | IrExpr::Error(_) => self.clone(),
            IrExpr::Lambda { params, body } => IrExpr::Lambda {
                params: params.iter().map(|p| f(p)).collect(),
                body: Box::new(body.map_names(f)),
            },
            IrExpr::Call { callee, args } => IrExpr::Call {
                callee: Box::new(callee.map_names(f)),
                args: args.iter().map(|a| a.map_names(f)).collect(),
            },
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            IrExpr::Name(_) | IrExpr::Literal(_) | IrExpr::Error(_) => 1,
            IrExpr::Lambda { body, .. } => 1 + body.node_count(),
            IrExpr::Call { callee, args } => {
                1 + callee.node_count() + args.iter().map(IrExpr::node_count).sum::<usize>()
            }
        }
    }

    fn is_flat(&self) -> bool {
        match self {
            IrExpr::Lambda { .. } => false,
            IrExpr::Call { callee, args } => callee.is_flat() && args.iter().all(IrExpr::is_flat),
            IrExpr::Name(_) | IrExpr::Literal(_) | IrExpr::Error(_) => true,
        }
    }

    fn write_to(&self, out: &mut String, indent: usize) {
        match self {
            IrExpr::Name(n) => out.push_str(n),
            IrExpr::Literal(lit) => write_literal(out, lit),
            IrExpr::Error(msg) => {
                out.push_str("error(");
                write_str_literal(out, msg);
                out.push(')');
            }
            IrExpr::Lambda { params, body } => {
                out.push('(');
                out.push_str(&params.join(", "));
                out.push_str(") -> {\n");
                push_indent(out, indent + 1);
                body.write_to(out, indent + 1);
                out.push('\n');
                push_indent(out, indent);
                out.push('}');
            }
            IrExpr::Call { callee, args } => {
                callee.write_to(out, indent);
                if args.iter().all(IrExpr::is_flat) {
                    out.push('(');
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        a.write_to(out, indent);
                    }
                    out.push(')');
                } else {
                    out.push_str("(\n");
                    for (i, a) in args.iter().enumerate() {
                        push_indent(out, indent + 1);
                        a.write_to(out, indent + 1);
                        if i + 1 < args.len() {
                            out.push(',');
                        }
                        out.push('\n');
                    }
                    push_indent(out, indent);
                    out.push(')');
                }
            }
        }
    }
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str("    ");
    }
}

fn write_literal(out: &mut String, lit: &IrLiteral) {
    match lit {
        IrLiteral::Int(i) => {
            out.push_str(&i.to_string());
        }
        IrLiteral::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        IrLiteral::Str(s) => write_str_literal(out, s),
        IrLiteral::Bytes(b) => {
            out.push('#');
            out.push_str(&hex::encode(b));
        }
        IrLiteral::Unit => out.push_str("()"),
        IrLiteral::Data(d) => {
            out.push_str("##");
            out.push_str(&d.to_cbor_hex());
        }
    }
}

fn write_str_literal(out: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => {
            out.push_str(&format!("{s:?}"));
        }
    }
}

impl Display for IrExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out, 0);
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IrExpr {
        // (x) -> { add(x, y) }(f(z))
        IrExpr::call(
            IrExpr::lambda(
                ["x"],
                IrExpr::call_named("add", vec![IrExpr::name("x"), IrExpr::name("y")]),
            ),
            vec![IrExpr::call_named("f", vec![IrExpr::name("z")])],
        )
    }

    #[test]
    fn free_names_skip_bound_params() {
        assert_eq!(sample().free_names(), vec!["add", "y", "f", "z"]);
    }

    #[test]
    fn replace_free_respects_shadowing() {
        let e = sample().replace_free(&mut |n| match n {
            "x" | "y" => Some(IrExpr::int(1)),
            _ => None,
        });
        let text = e.to_string();
        assert!(text.contains("add(x, 1)"), "{text}");
    }

    #[test]
    fn printer_shapes() {
        let text = sample().to_string();
        assert_eq!(text, "(x) -> {\n    add(x, y)\n}(f(z))");

        let nested = IrExpr::if_then_else(IrExpr::bool(true), IrExpr::unit(), IrExpr::error("no"));
        assert_eq!(
            nested.to_string(),
            "__core__ifThenElse(\n    true,\n    () -> {\n        ()\n    },\n    () -> {\n        error(\"no\")\n    }\n)()"
        );
    }

    #[test]
    fn literals_print_in_source_form() {
        assert_eq!(IrExpr::bytes(vec![0xab, 0x01]).to_string(), "#ab01");
        assert_eq!(IrExpr::str("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(IrExpr::int(-3).to_string(), "-3");
        assert_eq!(IrExpr::data(Data::Int(1)).to_string(), "##01");
    }
}
