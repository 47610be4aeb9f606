//! Strict reference evaluator for closed IR.
//!
//! Used to compute parameter values at compile time, to validate data handed
//! to `set_parameter`, and by the `eval` CLI command. It follows the VM's
//! primitive semantics but makes no attempt to model its cost.

use std::fmt::Display;
use std::rc::Rc;

use sha2::{Digest, Sha256};

use crate::data::Data;
use crate::ir::{IrExpr, IrLiteral};
use crate::primitives::Primitive;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub message: String,
    pub logs: Vec<String>,
}

impl Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)?;
        if !self.logs.is_empty() {
            write!(f, " (trace: {})", self.logs.join(" | "))?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

/// A fully evaluated result, detached from the evaluated expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Int(i128),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Unit,
    Data(Data),
    List(Vec<Constant>),
    Pair(Box<Constant>, Box<Constant>),
    Function,
}

impl Constant {
    pub fn as_data(&self) -> Option<&Data> {
        match self {
            Constant::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub result: Result<Constant, String>,
    pub logs: Vec<String>,
    pub steps: u64,
}

impl EvalOutcome {
    pub fn into_result(self) -> Result<Constant, EvalError> {
        match self.result {
            Ok(c) => Ok(c),
            Err(message) => Err(EvalError {
                message,
                logs: self.logs,
            }),
        }
    }
}

#[derive(Clone)]
enum Value<'a> {
    Int(i128),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Unit,
    Data(Data),
    List(Rc<Vec<Value<'a>>>),
    Pair(Rc<(Value<'a>, Value<'a>)>),
    Closure(Rc<Closure<'a>>),
    Builtin { prim: Primitive, args: Vec<Value<'a>> },
}

struct Closure<'a> {
    params: &'a [String],
    body: &'a IrExpr,
    env: Env<'a>,
}

struct EnvNode<'a> {
    name: &'a str,
    value: Value<'a>,
    next: Env<'a>,
}

type Env<'a> = Option<Rc<EnvNode<'a>>>;

fn lookup<'a>(env: &Env<'a>, name: &str) -> Option<Value<'a>> {
    let mut cur = env.as_ref();
    while let Some(node) = cur {
        if node.name == name {
            return Some(node.value.clone());
        }
        cur = node.next.as_ref();
    }
    None
}

struct Machine {
    max_steps: u64,
    steps: u64,
    logs: Vec<String>,
}

type Step<'a> = Result<Value<'a>, String>;

impl Machine {
    fn eval<'a>(&mut self, e: &'a IrExpr, env: &Env<'a>) -> Step<'a> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(format!(
                "evaluation budget exhausted after {} steps",
                self.max_steps
            ));
        }
        match e {
            IrExpr::Name(n) => {
                if let Some(v) = lookup(env, n) {
                    return Ok(v);
                }
                match Primitive::lookup(n) {
                    Some(prim) => Ok(Value::Builtin {
                        prim,
                        args: Vec::new(),
                    }),
                    None => Err(format!("unbound name {n}")),
                }
            }
            IrExpr::Literal(lit) => Ok(match lit {
                IrLiteral::Int(i) => Value::Int(*i),
                IrLiteral::Bool(b) => Value::Bool(*b),
                IrLiteral::Str(s) => Value::Str(s.clone()),
                IrLiteral::Bytes(b) => Value::Bytes(b.clone()),
                IrLiteral::Unit => Value::Unit,
                IrLiteral::Data(d) => Value::Data(d.clone()),
            }),
            IrExpr::Lambda { params, body } => Ok(Value::Closure(Rc::new(Closure {
                params,
                body,
                env: env.clone(),
            }))),
            IrExpr::Call { callee, args } => {
                let f = self.eval(callee, env)?;
                let mut vals = Vec::with_capacity(args.len());
                for a in args {
                    vals.push(self.eval(a, env)?);
                }
                self.apply(f, vals)
            }
            IrExpr::Error(msg) => Err(msg.clone()),
        }
    }

    fn apply<'a>(&mut self, f: Value<'a>, args: Vec<Value<'a>>) -> Step<'a> {
        match f {
            Value::Closure(c) => {
                if c.params.len() != args.len() {
                    return Err(format!(
                        "function expects {} argument(s), got {}",
                        c.params.len(),
                        args.len()
                    ));
                }
                let mut env = c.env.clone();
                for (name, value) in c.params.iter().zip(args) {
                    env = Some(Rc::new(EnvNode {
                        name: name.as_str(),
                        value,
                        next: env,
                    }));
                }
                self.eval(c.body, &env)
            }
            Value::Builtin { prim, args: mut held } => {
                held.extend(args);
                let arity = prim.arity();
                if held.len() < arity {
                    Ok(Value::Builtin { prim, args: held })
                } else if held.len() > arity {
                    Err(format!(
                        "__core__{} expects {arity} argument(s), got {}",
                        prim.name(),
                        held.len()
                    ))
                } else {
                    self.run_primitive(prim, held)
                }
            }
            _ => Err("attempt to call a non-function value".to_string()),
        }
    }

    fn run_primitive<'a>(&mut self, prim: Primitive, args: Vec<Value<'a>>) -> Step<'a> {
        let name = prim.name();
        let mut it = args.into_iter();
        let mut arg = || it.next().ok_or_else(|| format!("__core__{name}: missing argument"));
        use Primitive as P;
        let v = match prim {
            P::AddInteger => {
                let (a, b) = (int(name, arg()?)?, int(name, arg()?)?);
                Value::Int(a.checked_add(b).ok_or_else(|| overflow(name))?)
            }
            P::SubtractInteger => {
                let (a, b) = (int(name, arg()?)?, int(name, arg()?)?);
                Value::Int(a.checked_sub(b).ok_or_else(|| overflow(name))?)
            }
            P::MultiplyInteger => {
                let (a, b) = (int(name, arg()?)?, int(name, arg()?)?);
                Value::Int(a.checked_mul(b).ok_or_else(|| overflow(name))?)
            }
            P::DivideInteger => {
                let (a, b) = (int(name, arg()?)?, nonzero(name, arg()?)?);
                Value::Int(floor_div(a, b).ok_or_else(|| overflow(name))?)
            }
            P::ModInteger => {
                let (a, b) = (int(name, arg()?)?, nonzero(name, arg()?)?);
                let q = floor_div(a, b).ok_or_else(|| overflow(name))?;
                Value::Int(a - b * q)
            }
            P::QuotientInteger => {
                let (a, b) = (int(name, arg()?)?, nonzero(name, arg()?)?);
                Value::Int(a.checked_div(b).ok_or_else(|| overflow(name))?)
            }
            P::RemainderInteger => {
                let (a, b) = (int(name, arg()?)?, nonzero(name, arg()?)?);
                Value::Int(a.checked_rem(b).ok_or_else(|| overflow(name))?)
            }
            P::EqualsInteger => Value::Bool(int(name, arg()?)? == int(name, arg()?)?),
            P::LessThanInteger => Value::Bool(int(name, arg()?)? < int(name, arg()?)?),
            P::LessThanEqualsInteger => Value::Bool(int(name, arg()?)? <= int(name, arg()?)?),
            P::AppendByteString => {
                let mut a = bytes(name, arg()?)?;
                a.extend(bytes(name, arg()?)?);
                Value::Bytes(a)
            }
            P::ConsByteString => {
                let i = int(name, arg()?)?;
                let b = u8::try_from(i).map_err(|_| format!("__core__{name}: byte {i} out of range"))?;
                let mut out = vec![b];
                out.extend(bytes(name, arg()?)?);
                Value::Bytes(out)
            }
            P::SliceByteString => {
                let start = int(name, arg()?)?;
                let n = int(name, arg()?)?;
                let bs = bytes(name, arg()?)?;
                let len = bs.len() as i128;
                let from = start.clamp(0, len);
                let to = start.saturating_add(n).clamp(from, len);
                Value::Bytes(bs[from as usize..to as usize].to_vec())
            }
            P::LengthOfByteString => Value::Int(bytes(name, arg()?)?.len() as i128),
            P::IndexByteString => {
                let bs = bytes(name, arg()?)?;
                let i = int(name, arg()?)?;
                let b = usize::try_from(i)
                    .ok()
                    .and_then(|i| bs.get(i).copied())
                    .ok_or_else(|| format!("__core__{name}: index {i} out of range"))?;
                Value::Int(i128::from(b))
            }
            P::EqualsByteString => Value::Bool(bytes(name, arg()?)? == bytes(name, arg()?)?),
            P::LessThanByteString => Value::Bool(bytes(name, arg()?)? < bytes(name, arg()?)?),
            P::LessThanEqualsByteString => {
                Value::Bool(bytes(name, arg()?)? <= bytes(name, arg()?)?)
            }
            P::Sha2_256 => Value::Bytes(Sha256::digest(bytes(name, arg()?)?).to_vec()),
            P::AppendString => {
                let mut a = string(name, arg()?)?;
                a.push_str(&string(name, arg()?)?);
                Value::Str(a)
            }
            P::EqualsString => Value::Bool(string(name, arg()?)? == string(name, arg()?)?),
            P::EncodeUtf8 => Value::Bytes(string(name, arg()?)?.into_bytes()),
            P::DecodeUtf8 => Value::Str(
                String::from_utf8(bytes(name, arg()?)?)
                    .map_err(|_| format!("__core__{name}: invalid utf-8"))?,
            ),
            P::IfThenElse => {
                let c = boolean(name, arg()?)?;
                let (a, b) = (arg()?, arg()?);
                if c {
                    a
                } else {
                    b
                }
            }
            P::ChooseUnit => {
                let _ = arg()?;
                arg()?
            }
            P::Trace => {
                let msg = string(name, arg()?)?;
                tracing::debug!(message = %msg, "ir trace");
                self.logs.push(msg);
                arg()?
            }
            P::FstPair => pair(name, arg()?)?.0.clone(),
            P::SndPair => pair(name, arg()?)?.1.clone(),
            P::ChooseList => {
                let l = list(name, arg()?)?;
                let (a, b) = (arg()?, arg()?);
                if l.is_empty() {
                    a
                } else {
                    b
                }
            }
            P::MkCons => {
                let x = arg()?;
                let l = list(name, arg()?)?;
                let mut out = Vec::with_capacity(l.len() + 1);
                out.push(x);
                out.extend(l.iter().cloned());
                Value::List(Rc::new(out))
            }
            P::HeadList => list(name, arg()?)?
                .first()
                .cloned()
                .ok_or_else(|| format!("__core__{name}: empty list"))?,
            P::TailList => {
                let l = list(name, arg()?)?;
                if l.is_empty() {
                    return Err(format!("__core__{name}: empty list"));
                }
                Value::List(Rc::new(l[1..].to_vec()))
            }
            P::NullList => Value::Bool(list(name, arg()?)?.is_empty()),
            P::ChooseData => {
                let d = data(name, arg()?)?;
                let branches: Vec<Value<'a>> = (0..5).map(|_| arg()).collect::<Result<_, _>>()?;
                let idx = match d {
                    Data::Constr { .. } => 0,
                    Data::Map(_) => 1,
                    Data::List(_) => 2,
                    Data::Int(_) => 3,
                    Data::Bytes(_) => 4,
                };
                branches
                    .into_iter()
                    .nth(idx)
                    .ok_or_else(|| format!("__core__{name}: missing branch"))?
            }
            P::ConstrData => {
                let tag = int(name, arg()?)?;
                let tag = u64::try_from(tag)
                    .map_err(|_| format!("__core__{name}: negative constructor tag"))?;
                let fields = list(name, arg()?)?
                    .iter()
                    .map(|v| data(name, v.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::Data(Data::Constr { tag, fields })
            }
            P::MapData => {
                let entries = list(name, arg()?)?
                    .iter()
                    .map(|v| {
                        let p = pair(name, v.clone())?;
                        Ok((data(name, p.0.clone())?, data(name, p.1.clone())?))
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                Value::Data(Data::Map(entries))
            }
            P::ListData => {
                let items = list(name, arg()?)?
                    .iter()
                    .map(|v| data(name, v.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::Data(Data::List(items))
            }
            P::IData => Value::Data(Data::Int(int(name, arg()?)?)),
            P::BData => Value::Data(Data::Bytes(bytes(name, arg()?)?)),
            P::UnConstrData => match data(name, arg()?)? {
                Data::Constr { tag, fields } => Value::Pair(Rc::new((
                    Value::Int(i128::from(tag)),
                    Value::List(Rc::new(fields.into_iter().map(Value::Data).collect())),
                ))),
                other => return Err(shape(name, &other)),
            },
            P::UnMapData => match data(name, arg()?)? {
                Data::Map(entries) => Value::List(Rc::new(
                    entries
                        .into_iter()
                        .map(|(k, v)| Value::Pair(Rc::new((Value::Data(k), Value::Data(v)))))
                        .collect(),
                )),
                other => return Err(shape(name, &other)),
            },
            P::UnListData => match data(name, arg()?)? {
                Data::List(items) => {
                    Value::List(Rc::new(items.into_iter().map(Value::Data).collect()))
                }
                other => return Err(shape(name, &other)),
            },
            P::UnIData => match data(name, arg()?)? {
                Data::Int(i) => Value::Int(i),
                other => return Err(shape(name, &other)),
            },
            P::UnBData => match data(name, arg()?)? {
                Data::Bytes(b) => Value::Bytes(b),
                other => return Err(shape(name, &other)),
            },
            P::EqualsData => Value::Bool(data(name, arg()?)? == data(name, arg()?)?),
            P::MkPairData => {
                let (a, b) = (data(name, arg()?)?, data(name, arg()?)?);
                Value::Pair(Rc::new((Value::Data(a), Value::Data(b))))
            }
            P::MkNilData | P::MkNilPairData => {
                let _ = arg()?;
                Value::List(Rc::new(Vec::new()))
            }
            P::SerialiseData => Value::Bytes(data(name, arg()?)?.to_cbor()),
        };
        Ok(v)
    }
}

fn overflow(name: &str) -> String {
    format!("__core__{name}: integer overflow")
}

fn shape(name: &str, d: &Data) -> String {
    let kind = match d {
        Data::Constr { .. } => "constr",
        Data::Map(_) => "map",
        Data::List(_) => "list",
        Data::Int(_) => "int",
        Data::Bytes(_) => "bytes",
    };
    format!("__core__{name}: unexpected {kind} data")
}

fn floor_div(a: i128, b: i128) -> Option<i128> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn int(name: &str, v: Value<'_>) -> Result<i128, String> {
    match v {
        Value::Int(i) => Ok(i),
        _ => Err(format!("__core__{name}: expected integer")),
    }
}

fn nonzero(name: &str, v: Value<'_>) -> Result<i128, String> {
    match int(name, v)? {
        0 => Err(format!("__core__{name}: division by zero")),
        i => Ok(i),
    }
}

fn boolean(name: &str, v: Value<'_>) -> Result<bool, String> {
    match v {
        Value::Bool(b) => Ok(b),
        _ => Err(format!("__core__{name}: expected bool")),
    }
}

fn bytes(name: &str, v: Value<'_>) -> Result<Vec<u8>, String> {
    match v {
        Value::Bytes(b) => Ok(b),
        _ => Err(format!("__core__{name}: expected bytestring")),
    }
}

fn string(name: &str, v: Value<'_>) -> Result<String, String> {
    match v {
        Value::Str(s) => Ok(s),
        _ => Err(format!("__core__{name}: expected string")),
    }
}

fn data(name: &str, v: Value<'_>) -> Result<Data, String> {
    match v {
        Value::Data(d) => Ok(d),
        _ => Err(format!("__core__{name}: expected data")),
    }
}

fn list<'a>(name: &str, v: Value<'a>) -> Result<Rc<Vec<Value<'a>>>, String> {
    match v {
        Value::List(l) => Ok(l),
        _ => Err(format!("__core__{name}: expected list")),
    }
}

fn pair<'a>(name: &str, v: Value<'a>) -> Result<Rc<(Value<'a>, Value<'a>)>, String> {
    match v {
        Value::Pair(p) => Ok(p),
        _ => Err(format!("__core__{name}: expected pair")),
    }
}

fn to_constant(v: &Value<'_>) -> Constant {
    match v {
        Value::Int(i) => Constant::Int(*i),
        Value::Bool(b) => Constant::Bool(*b),
        Value::Str(s) => Constant::Str(s.clone()),
        Value::Bytes(b) => Constant::Bytes(b.clone()),
        Value::Unit => Constant::Unit,
        Value::Data(d) => Constant::Data(d.clone()),
        Value::List(items) => Constant::List(items.iter().map(to_constant).collect()),
        Value::Pair(p) => Constant::Pair(Box::new(to_constant(&p.0)), Box::new(to_constant(&p.1))),
        Value::Closure(_) | Value::Builtin { .. } => Constant::Function,
    }
}

/// Evaluates a closed expression.
pub fn evaluate(expr: &IrExpr, max_steps: u64) -> EvalOutcome {
    apply_data(expr, &[], max_steps)
}

/// Evaluates `program` and, when `args` is non-empty, applies the result to the
/// given data arguments (the way the chain invokes a validator).
pub fn apply_data(program: &IrExpr, args: &[Data], max_steps: u64) -> EvalOutcome {
    let mut m = Machine {
        max_steps,
        steps: 0,
        logs: Vec::new(),
    };
    let result = m.eval(program, &None).and_then(|f| {
        if args.is_empty() {
            Ok(f)
        } else {
            m.apply(f, args.iter().cloned().map(Value::Data).collect())
        }
    });
    let result = result.map(|v| to_constant(&v));
    tracing::debug!(steps = m.steps, ok = result.is_ok(), "ir evaluation finished");
    EvalOutcome {
        result,
        logs: m.logs,
        steps: m.steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir_parse::parse_ir;

    fn run(src: &str) -> Result<Constant, String> {
        let e = parse_ir(src).expect("parse");
        evaluate(&e, 100_000).result
    }

    #[test]
    fn integer_division_floors() {
        assert_eq!(run("__core__divideInteger(-7, 2)"), Ok(Constant::Int(-4)));
        assert_eq!(run("__core__modInteger(-7, 2)"), Ok(Constant::Int(1)));
        assert_eq!(run("__core__quotientInteger(-7, 2)"), Ok(Constant::Int(-3)));
        assert_eq!(run("__core__remainderInteger(-7, 2)"), Ok(Constant::Int(-1)));
        let err = run("__core__divideInteger(1, 0)").expect_err("div by zero");
        assert!(err.contains("division by zero"), "{err}");
    }

    #[test]
    fn delayed_branches_and_closures() {
        let src = r#"((f) -> {
            __core__ifThenElse(f(2), () -> { "yes" }, () -> { error("no") })()
        })((x) -> { __core__lessThanInteger(1, x) })"#;
        assert_eq!(run(src), Ok(Constant::Str("yes".to_string())));
    }

    #[test]
    fn errors_and_traces() {
        let e = parse_ir(r#"__core__trace("checking", () -> { error("boom") })()"#).expect("parse");
        let out = evaluate(&e, 1_000);
        assert_eq!(out.result, Err("boom".to_string()));
        assert_eq!(out.logs, vec!["checking".to_string()]);
    }

    #[test]
    fn data_primitives() {
        let src = "__core__constrData(1, __core__mkCons(__core__iData(5), __core__mkNilData(())))";
        assert_eq!(
            run(src),
            Ok(Constant::Data(Data::constr(1, vec![Data::Int(5)])))
        );
        let src = "__core__fstPair(__core__unConstrData(__core__constrData(3, __core__mkNilData(()))))";
        assert_eq!(run(src), Ok(Constant::Int(3)));
        let err = run("__core__unIData(__core__bData(#00))").expect_err("wrong shape");
        assert!(err.contains("unexpected bytes"), "{err}");
    }

    #[test]
    fn partial_builtins_are_values() {
        assert_eq!(
            run("((f) -> { f(1, 2) })(__core__addInteger)"),
            Ok(Constant::Int(3))
        );
        assert_eq!(run("__core__sliceByteString(1, 2, #aabbccdd)"), Ok(Constant::Bytes(vec![0xbb, 0xcc])));
    }

    #[test]
    fn budget_is_enforced() {
        let src = "((f) -> { f(f) })((f) -> { f(f) })";
        let e = parse_ir(src).expect("parse");
        let out = evaluate(&e, 500);
        let err = out.result.expect_err("must run out of budget");
        assert!(err.contains("budget"), "{err}");
    }

    #[test]
    fn validator_application() {
        let e = parse_ir("(d) -> { __core__unIData(d) }").expect("parse");
        let out = apply_data(&e, &[Data::Int(9)], 1_000);
        assert_eq!(out.result, Ok(Constant::Int(9)));
    }
}
