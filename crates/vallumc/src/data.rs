//! Tagged data values exchanged with the chain.
//!
//! JSON uses the Cardano "detailed schema"; binary form is canonical CBOR as
//! produced by the VM's `serialiseData`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map as JsonMap, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Data {
    Constr { tag: u64, fields: Vec<Data> },
    Map(Vec<(Data, Data)>),
    List(Vec<Data>),
    Int(i128),
    Bytes(Vec<u8>),
}

const CHUNK_LEN: usize = 64;

impl Data {
    pub fn constr(tag: u64, fields: Vec<Data>) -> Self {
        Data::Constr { tag, fields }
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Data::Bytes(b.into())
    }

    pub fn utf8(s: &str) -> Self {
        Data::Bytes(s.as_bytes().to_vec())
    }

    pub fn bool(b: bool) -> Self {
        Data::constr(u64::from(b), Vec::new())
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Data::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Data::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Data::Constr { tag, fields } => json!({
                "constructor": tag,
                "fields": fields.iter().map(Data::to_json).collect::<Vec<_>>(),
            }),
            Data::Map(entries) => json!({
                "map": entries
                    .iter()
                    .map(|(k, v)| json!({ "k": k.to_json(), "v": v.to_json() }))
                    .collect::<Vec<_>>(),
            }),
            Data::List(items) => json!({
                "list": items.iter().map(Data::to_json).collect::<Vec<_>>(),
            }),
            Data::Int(i) => match i64::try_from(*i) {
                Ok(small) => json!({ "int": small }),
                Err(_) => json!({ "int": i.to_string() }),
            },
            Data::Bytes(b) => json!({ "bytes": hex::encode(b) }),
        }
    }

    pub fn from_json(v: &Value) -> Result<Self, String> {
        Self::from_json_at(v, "")
    }

    fn from_json_at(v: &Value, ptr: &str) -> Result<Self, String> {
        let obj = v
            .as_object()
            .ok_or_else(|| format!("data value must be an object at {}", show_ptr(ptr)))?;
        if let Some(tag) = obj.get("constructor") {
            let tag = tag
                .as_u64()
                .ok_or_else(|| format!("constructor must be a non-negative integer at {ptr}/constructor"))?;
            let fields = json_array(obj, "fields", ptr)?
                .iter()
                .enumerate()
                .map(|(i, f)| Self::from_json_at(f, &format!("{ptr}/fields/{i}")))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Data::Constr { tag, fields });
        }
        if obj.contains_key("map") {
            let mut entries = Vec::new();
            for (i, e) in json_array(obj, "map", ptr)?.iter().enumerate() {
                let eptr = format!("{ptr}/map/{i}");
                let k = e
                    .get("k")
                    .ok_or_else(|| format!("map entry is missing \"k\" at {eptr}"))?;
                let v = e
                    .get("v")
                    .ok_or_else(|| format!("map entry is missing \"v\" at {eptr}"))?;
                entries.push((
                    Self::from_json_at(k, &format!("{eptr}/k"))?,
                    Self::from_json_at(v, &format!("{eptr}/v"))?,
                ));
            }
            return Ok(Data::Map(entries));
        }
        if obj.contains_key("list") {
            let items = json_array(obj, "list", ptr)?
                .iter()
                .enumerate()
                .map(|(i, item)| Self::from_json_at(item, &format!("{ptr}/list/{i}")))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Data::List(items));
        }
        if let Some(i) = obj.get("int") {
            let parsed = match i {
                Value::Number(n) => n
                    .as_i64()
                    .map(i128::from)
                    .or_else(|| n.as_u64().map(i128::from)),
                Value::String(s) => s.parse::<i128>().ok(),
                _ => None,
            };
            return parsed
                .map(Data::Int)
                .ok_or_else(|| format!("invalid integer at {ptr}/int"));
        }
        if let Some(b) = obj.get("bytes") {
            let s = b
                .as_str()
                .ok_or_else(|| format!("bytes must be a hex string at {ptr}/bytes"))?;
            return hex::decode(s)
                .map(Data::Bytes)
                .map_err(|e| format!("invalid hex at {ptr}/bytes: {e}"));
        }
        Err(format!(
            "data value must have one of constructor|map|list|int|bytes at {}",
            show_ptr(ptr)
        ))
    }

    pub fn to_cbor(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_cbor(&mut out);
        out
    }

    pub fn to_cbor_hex(&self) -> String {
        hex::encode(self.to_cbor())
    }

    fn write_cbor(&self, out: &mut Vec<u8>) {
        match self {
            Data::Constr { tag, fields } => {
                if *tag < 7 {
                    write_head(out, 6, 121 + tag);
                    write_list(out, fields);
                } else if *tag < 128 {
                    write_head(out, 6, 1280 + (tag - 7));
                    write_list(out, fields);
                } else {
                    write_head(out, 6, 102);
                    write_head(out, 4, 2);
                    write_head(out, 0, *tag);
                    write_list(out, fields);
                }
            }
            Data::Map(entries) => {
                write_head(out, 5, entries.len() as u64);
                for (k, v) in entries {
                    k.write_cbor(out);
                    v.write_cbor(out);
                }
            }
            Data::List(items) => write_list(out, items),
            Data::Int(i) => write_int(out, *i),
            Data::Bytes(b) => write_bytes(out, b),
        }
    }
}

impl Serialize for Data {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Data {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        Data::from_json(&v).map_err(serde::de::Error::custom)
    }
}

fn show_ptr(ptr: &str) -> &str {
    if ptr.is_empty() {
        "/"
    } else {
        ptr
    }
}

fn json_array<'a>(
    obj: &'a JsonMap<String, Value>,
    key: &str,
    ptr: &str,
) -> Result<&'a Vec<Value>, String> {
    obj.get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| format!("{key} must be an array at {ptr}/{key}"))
}

fn write_head(out: &mut Vec<u8>, major: u8, n: u64) {
    let m = major << 5;
    if n < 24 {
        out.push(m | n as u8);
    } else if n <= u64::from(u8::MAX) {
        out.push(m | 24);
        out.push(n as u8);
    } else if n <= u64::from(u16::MAX) {
        out.push(m | 25);
        out.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= u64::from(u32::MAX) {
        out.push(m | 26);
        out.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        out.push(m | 27);
        out.extend_from_slice(&n.to_be_bytes());
    }
}

fn write_list(out: &mut Vec<u8>, items: &[Data]) {
    if items.is_empty() {
        out.push(0x80);
        return;
    }
    out.push(0x9f);
    for item in items {
        item.write_cbor(out);
    }
    out.push(0xff);
}

fn write_bytes(out: &mut Vec<u8>, b: &[u8]) {
    if b.len() <= CHUNK_LEN {
        write_head(out, 2, b.len() as u64);
        out.extend_from_slice(b);
        return;
    }
    out.push(0x5f);
    for chunk in b.chunks(CHUNK_LEN) {
        write_head(out, 2, chunk.len() as u64);
        out.extend_from_slice(chunk);
    }
    out.push(0xff);
}

fn write_int(out: &mut Vec<u8>, i: i128) {
    if i >= 0 {
        match u64::try_from(i) {
            Ok(n) => write_head(out, 0, n),
            Err(_) => {
                write_head(out, 6, 2);
                write_bytes(out, &bignum_bytes(i as u128));
            }
        }
    } else {
        // CBOR negative integers encode -1 - n.
        let n = (-1 - i) as u128;
        match u64::try_from(n) {
            Ok(n) => write_head(out, 1, n),
            Err(_) => {
                write_head(out, 6, 3);
                write_bytes(out, &bignum_bytes(n));
            }
        }
    }
}

fn bignum_bytes(n: u128) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}
