//! Script purposes and their entry-point contracts.
//!
//! Shared by the compiler and any tooling that needs to know how a validator is
//! invoked on chain: which arguments the entry function receives, in which order,
//! and what it must return.

use std::fmt::Display;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScriptPurpose {
    #[default]
    Testing,
    Spending,
    Minting,
    Staking,
}

/// One positional slot of an entry function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntrySlot {
    Datum,
    Redeemer,
    ScriptContext,
}

impl EntrySlot {
    /// The type name an entry argument must carry to fill this slot.
    pub fn keyword(self) -> &'static str {
        match self {
            EntrySlot::Datum => "Datum",
            EntrySlot::Redeemer => "Redeemer",
            EntrySlot::ScriptContext => "ScriptContext",
        }
    }

    /// Name of the raw data argument in the generated wrapper.
    pub fn wrapper_arg(self) -> &'static str {
        match self {
            EntrySlot::Datum => "__datum",
            EntrySlot::Redeemer => "__redeemer",
            EntrySlot::ScriptContext => "__context",
        }
    }

    pub fn parse_keyword(s: &str) -> Option<Self> {
        match s {
            "Datum" => Some(EntrySlot::Datum),
            "Redeemer" => Some(EntrySlot::Redeemer),
            "ScriptContext" => Some(EntrySlot::ScriptContext),
            _ => None,
        }
    }
}

impl ScriptPurpose {
    pub const ALL: [ScriptPurpose; 4] = [
        ScriptPurpose::Testing,
        ScriptPurpose::Spending,
        ScriptPurpose::Minting,
        ScriptPurpose::Staking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScriptPurpose::Testing => "testing",
            ScriptPurpose::Spending => "spending",
            ScriptPurpose::Minting => "minting",
            ScriptPurpose::Staking => "staking",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "testing" => Some(ScriptPurpose::Testing),
            "spending" => Some(ScriptPurpose::Spending),
            "minting" => Some(ScriptPurpose::Minting),
            "staking" => Some(ScriptPurpose::Staking),
            _ => None,
        }
    }

    /// Ordered slots the on-chain runtime passes to the entry function.
    ///
    /// Testing scripts have no fixed contract and return an empty slice.
    pub fn entry_slots(self) -> &'static [EntrySlot] {
        match self {
            ScriptPurpose::Testing => &[],
            ScriptPurpose::Spending => &[
                EntrySlot::Datum,
                EntrySlot::Redeemer,
                EntrySlot::ScriptContext,
            ],
            ScriptPurpose::Minting | ScriptPurpose::Staking => {
                &[EntrySlot::Redeemer, EntrySlot::ScriptContext]
            }
        }
    }

    pub fn arity(self) -> usize {
        self.entry_slots().len()
    }

    /// True if the entry function must return `Bool` and a `false` result
    /// rejects the transaction.
    pub fn is_validator(self) -> bool {
        !matches!(self, ScriptPurpose::Testing)
    }
}

impl Display for ScriptPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPurposeParseError {
    pub value: String,
}

impl Display for ScriptPurposeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown script purpose {:?} (expected testing|spending|minting|staking)",
            self.value
        )
    }
}

impl std::error::Error for ScriptPurposeParseError {}

impl FromStr for ScriptPurpose {
    type Err = ScriptPurposeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScriptPurpose::parse(s).ok_or_else(|| ScriptPurposeParseError {
            value: s.trim().to_string(),
        })
    }
}

#[cfg(feature = "clap")]
impl clap::ValueEnum for ScriptPurpose {
    fn value_variants<'a>() -> &'a [Self] {
        &ScriptPurpose::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_round_trips_through_parse() {
        for p in ScriptPurpose::ALL {
            assert_eq!(ScriptPurpose::parse(p.as_str()), Some(p));
            assert_eq!(p.as_str().parse::<ScriptPurpose>(), Ok(p));
        }
        assert!(ScriptPurpose::parse("module").is_none());
    }

    #[test]
    fn validator_purposes_have_fixed_slots() {
        assert_eq!(ScriptPurpose::Testing.arity(), 0);
        assert!(!ScriptPurpose::Testing.is_validator());

        assert_eq!(
            ScriptPurpose::Spending.entry_slots(),
            &[
                EntrySlot::Datum,
                EntrySlot::Redeemer,
                EntrySlot::ScriptContext
            ]
        );
        for p in [ScriptPurpose::Minting, ScriptPurpose::Staking] {
            assert_eq!(
                p.entry_slots(),
                &[EntrySlot::Redeemer, EntrySlot::ScriptContext]
            );
            assert!(p.is_validator());
        }
    }

    #[test]
    fn slot_keywords_are_case_sensitive() {
        assert_eq!(EntrySlot::parse_keyword("Datum"), Some(EntrySlot::Datum));
        assert_eq!(EntrySlot::parse_keyword("datum"), None);
        for slot in [
            EntrySlot::Datum,
            EntrySlot::Redeemer,
            EntrySlot::ScriptContext,
        ] {
            assert_eq!(EntrySlot::parse_keyword(slot.keyword()), Some(slot));
        }
    }
}
