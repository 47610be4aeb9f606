//! Target-VM primitives reachable from IR as `__core__<name>`.

pub const CORE_PREFIX: &str = "__core__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    AddInteger,
    SubtractInteger,
    MultiplyInteger,
    DivideInteger,
    QuotientInteger,
    RemainderInteger,
    ModInteger,
    EqualsInteger,
    LessThanInteger,
    LessThanEqualsInteger,
    AppendByteString,
    ConsByteString,
    SliceByteString,
    LengthOfByteString,
    IndexByteString,
    EqualsByteString,
    LessThanByteString,
    LessThanEqualsByteString,
    Sha2_256,
    AppendString,
    EqualsString,
    EncodeUtf8,
    DecodeUtf8,
    IfThenElse,
    ChooseUnit,
    Trace,
    FstPair,
    SndPair,
    ChooseList,
    MkCons,
    HeadList,
    TailList,
    NullList,
    ChooseData,
    ConstrData,
    MapData,
    ListData,
    IData,
    BData,
    UnConstrData,
    UnMapData,
    UnListData,
    UnIData,
    UnBData,
    EqualsData,
    MkPairData,
    MkNilData,
    MkNilPairData,
    SerialiseData,
}

const TABLE: &[(Primitive, &str, usize)] = &[
    (Primitive::AddInteger, "addInteger", 2),
    (Primitive::SubtractInteger, "subtractInteger", 2),
    (Primitive::MultiplyInteger, "multiplyInteger", 2),
    (Primitive::DivideInteger, "divideInteger", 2),
    (Primitive::QuotientInteger, "quotientInteger", 2),
    (Primitive::RemainderInteger, "remainderInteger", 2),
    (Primitive::ModInteger, "modInteger", 2),
    (Primitive::EqualsInteger, "equalsInteger", 2),
    (Primitive::LessThanInteger, "lessThanInteger", 2),
    (Primitive::LessThanEqualsInteger, "lessThanEqualsInteger", 2),
    (Primitive::AppendByteString, "appendByteString", 2),
    (Primitive::ConsByteString, "consByteString", 2),
    (Primitive::SliceByteString, "sliceByteString", 3),
    (Primitive::LengthOfByteString, "lengthOfByteString", 1),
    (Primitive::IndexByteString, "indexByteString", 2),
    (Primitive::EqualsByteString, "equalsByteString", 2),
    (Primitive::LessThanByteString, "lessThanByteString", 2),
    (Primitive::LessThanEqualsByteString, "lessThanEqualsByteString", 2),
    (Primitive::Sha2_256, "sha2_256", 1),
    (Primitive::AppendString, "appendString", 2),
    (Primitive::EqualsString, "equalsString", 2),
    (Primitive::EncodeUtf8, "encodeUtf8", 1),
    (Primitive::DecodeUtf8, "decodeUtf8", 1),
    (Primitive::IfThenElse, "ifThenElse", 3),
    (Primitive::ChooseUnit, "chooseUnit", 2),
    (Primitive::Trace, "trace", 2),
    (Primitive::FstPair, "fstPair", 1),
    (Primitive::SndPair, "sndPair", 1),
    (Primitive::ChooseList, "chooseList", 3),
    (Primitive::MkCons, "mkCons", 2),
    (Primitive::HeadList, "headList", 1),
    (Primitive::TailList, "tailList", 1),
    (Primitive::NullList, "nullList", 1),
    (Primitive::ChooseData, "chooseData", 6),
    (Primitive::ConstrData, "constrData", 2),
    (Primitive::MapData, "mapData", 1),
    (Primitive::ListData, "listData", 1),
    (Primitive::IData, "iData", 1),
    (Primitive::BData, "bData", 1),
    (Primitive::UnConstrData, "unConstrData", 1),
    (Primitive::UnMapData, "unMapData", 1),
    (Primitive::UnListData, "unListData", 1),
    (Primitive::UnIData, "unIData", 1),
    (Primitive::UnBData, "unBData", 1),
    (Primitive::EqualsData, "equalsData", 2),
    (Primitive::MkPairData, "mkPairData", 2),
    (Primitive::MkNilData, "mkNilData", 1),
    (Primitive::MkNilPairData, "mkNilPairData", 1),
    (Primitive::SerialiseData, "serialiseData", 1),
];

impl Primitive {
    /// Resolves a full IR name such as `__core__addInteger`.
    pub fn lookup(ir_name: &str) -> Option<Self> {
        let short = ir_name.strip_prefix(CORE_PREFIX)?;
        TABLE
            .iter()
            .find(|(_, name, _)| *name == short)
            .map(|(p, _, _)| *p)
    }

    pub fn name(self) -> &'static str {
        TABLE
            .iter()
            .find(|(p, _, _)| *p == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("unknown")
    }

    pub fn arity(self) -> usize {
        TABLE
            .iter()
            .find(|(p, _, _)| *p == self)
            .map(|(_, _, arity)| *arity)
            .unwrap_or(0)
    }

    pub fn all() -> impl Iterator<Item = Primitive> {
        TABLE.iter().map(|(p, _, _)| *p)
    }
}

pub fn is_primitive(ir_name: &str) -> bool {
    Primitive::lookup(ir_name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_round_trips() {
        for p in Primitive::all() {
            let full = format!("{CORE_PREFIX}{}", p.name());
            assert_eq!(Primitive::lookup(&full), Some(p));
            assert!(p.arity() >= 1);
        }
        assert!(!is_primitive("__core__launchMissiles"));
        assert!(!is_primitive("addInteger"));
    }
}
