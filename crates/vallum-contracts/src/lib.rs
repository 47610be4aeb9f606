//! Shared, version-pinned protocol identifiers.
//!
//! These constants are the single source of truth for schema/version strings that
//! appear in machine-readable I/O (AST documents, diagnostics, CLI reports).

pub const VALLUM_AST_SCHEMA_VERSION: &str = "vallum.ast@0.1.0";
pub const VALLUM_AST_SCHEMA_VERSIONS_SUPPORTED: &[&str] = &[VALLUM_AST_SCHEMA_VERSION];

pub const VALLUM_DIAG_SCHEMA_VERSION: &str = "vallum.diag@0.1.0";
pub const VALLUMC_REPORT_SCHEMA_VERSION: &str = "vallumc.report@0.1.0";
pub const VALLUM_PARAMS_SCHEMA_VERSION: &str = "vallum.params@0.1.0";
pub const VALLUM_EVAL_REPORT_SCHEMA_VERSION: &str = "vallum.eval.report@0.1.0";
