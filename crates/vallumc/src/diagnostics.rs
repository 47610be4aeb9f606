use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vallum_contracts::VALLUM_DIAG_SCHEMA_VERSION;

use crate::compile::{CompileErrorKind, CompilerError, Site};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Parse,
    Resolve,
    Type,
    Assemble,
    Lower,
    Eval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub module: String,
    pub ptr: String,
}

impl From<&Site> for Location {
    fn from(site: &Site) -> Self {
        Self {
            module: site.module.clone(),
            ptr: site.ptr.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl Diagnostic {
    pub fn deprecation(site: &Site, message: String) -> Self {
        Self {
            code: "VAL-DEPRECATED-0001".to_string(),
            severity: Severity::Warning,
            stage: Stage::Assemble,
            message,
            loc: Some(site.into()),
            notes: Vec::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn from_error(err: &CompilerError) -> Self {
        let (code, stage) = match err.kind {
            CompileErrorKind::Syntax => ("VAL-SYNTAX-0001", Stage::Parse),
            CompileErrorKind::Reference => ("VAL-REF-0001", Stage::Type),
            CompileErrorKind::Type => ("VAL-TYPE-0001", Stage::Type),
            CompileErrorKind::Internal => ("VAL-INTERNAL-0001", Stage::Lower),
            CompileErrorKind::Budget => ("VAL-BUDGET-0001", Stage::Lower),
        };
        let mut data = BTreeMap::new();
        data.insert(
            "kind".to_string(),
            Value::String(err.kind.as_str().to_string()),
        );
        Self {
            code: code.to_string(),
            severity: Severity::Error,
            stage,
            message: err.message.clone(),
            loc: err.site.as_ref().map(Location::from),
            notes: Vec::new(),
            data,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub schema_version: String,
    pub ok: bool,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
}

impl Report {
    pub fn ok() -> Self {
        Self {
            schema_version: VALLUM_DIAG_SCHEMA_VERSION.to_string(),
            ok: true,
            diagnostics: Vec::new(),
            meta: BTreeMap::new(),
        }
    }

    pub fn with_diagnostics(mut self, mut diagnostics: Vec<Diagnostic>) -> Self {
        diagnostics.sort_by(|a, b| {
            let key = |d: &Diagnostic| {
                d.loc
                    .as_ref()
                    .map(|l| (l.module.clone(), l.ptr.clone()))
                    .unwrap_or_default()
            };
            key(a)
                .cmp(&key(b))
                .then_with(|| a.code.cmp(&b.code))
                .then_with(|| a.message.cmp(&b.message))
        });
        self.ok = diagnostics.iter().all(|d| d.severity != Severity::Error);
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.meta.insert(key.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_keep_report_ok() {
        let site = Site::new("vault", "/statements/2");
        let report = Report::ok().with_diagnostics(vec![Diagnostic::deprecation(
            &site,
            "legacy entry signature".to_string(),
        )]);
        assert!(report.ok);
        assert_eq!(report.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn errors_sort_by_location() {
        let late = CompilerError::type_error(&Site::new("m", "/statements/9"), "b".to_string());
        let early = CompilerError::syntax(&Site::new("m", "/statements/1"), "a".to_string());
        let report = Report::ok().with_diagnostics(vec![
            Diagnostic::from_error(&late),
            Diagnostic::from_error(&early),
        ]);
        assert!(!report.ok);
        assert_eq!(report.diagnostics[0].code, "VAL-SYNTAX-0001");
        let json = serde_json::to_value(&report).expect("serialize report");
        assert_eq!(json["diagnostics"][1]["loc"]["ptr"], "/statements/9");
        assert_eq!(json["schema_version"], VALLUM_DIAG_SCHEMA_VERSION);
    }
}
