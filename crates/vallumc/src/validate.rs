//! Identifier rules shared by the AST reader and the checker.
//!
//! Names containing `__` are reserved: generated paths use `__` as their
//! separator, and letting user names contain it would make paths ambiguous.
//! For the same reason module and type names may not end in `_`. Value names
//! may not be one of the IR text keywords.

/// Words the IR text reader treats as literals or special forms.
pub const IR_KEYWORDS: &[&str] = &["true", "false", "error"];

pub fn validate_module_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("module name must not be empty".to_string());
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    if !(first.is_ascii_lowercase() || first == '_') {
        return Err(format!(
            "invalid module name start (must be [a-z_]): {name:?}"
        ));
    }
    for c in chars {
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(format!(
                "invalid module name char (allowed [a-z0-9_]): {name:?}"
            ));
        }
    }
    reject_trailing_underscore(name)?;
    reject_reserved(name)
}

pub fn validate_value_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name must be non-empty".to_string());
    }
    if name == "_" {
        return Ok(());
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(format!("invalid name start (must be [A-Za-z_]): {name:?}"));
    }
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!(
                "invalid name char (allowed [A-Za-z0-9_]): {name:?}"
            ));
        }
    }
    if IR_KEYWORDS.contains(&name) {
        return Err(format!("{name:?} is a reserved word"));
    }
    reject_reserved(name)
}

pub fn validate_type_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("type name must be non-empty".to_string());
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    if !first.is_ascii_uppercase() {
        return Err(format!(
            "invalid type name start (must be [A-Z]): {name:?}"
        ));
    }
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!(
                "invalid type name char (allowed [A-Za-z0-9_]): {name:?}"
            ));
        }
    }
    reject_trailing_underscore(name)?;
    reject_reserved(name)
}

/// CIP-68 field tags are arbitrary UTF-8 but must be non-empty.
pub fn validate_field_tag(tag: &str) -> Result<(), String> {
    if tag.is_empty() {
        return Err("field tag must not be empty".to_string());
    }
    Ok(())
}

fn reject_trailing_underscore(name: &str) -> Result<(), String> {
    if name.ends_with('_') {
        return Err(format!("name may not end in \"_\": {name:?}"));
    }
    Ok(())
}

fn reject_reserved(name: &str) -> Result<(), String> {
    if name.contains("__") {
        return Err(format!(
            "names may not contain \"__\" (reserved for generated code): {name:?}"
        ));
    }
    Ok(())
}

/// True for names that never trigger the unused-binding check.
pub fn is_discard_name(name: &str) -> bool {
    name.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_separator_is_rejected() {
        assert!(validate_value_name("a__b").is_err());
        assert!(validate_value_name("__x").is_err());
        assert!(validate_type_name("Foo__Bar").is_err());
        assert!(validate_module_name("my__lib").is_err());
    }

    #[test]
    fn ordinary_names_are_accepted() {
        assert!(validate_value_name("amount_1").is_ok());
        assert!(validate_value_name("_").is_ok());
        assert!(validate_value_name("_unused").is_ok());
        assert!(validate_type_name("Datum").is_ok());
        assert!(validate_module_name("vault_lib").is_ok());
    }

    #[test]
    fn ir_keywords_are_not_value_names() {
        for word in IR_KEYWORDS {
            assert!(validate_value_name(word).is_err(), "{word}");
        }
        assert!(validate_value_name("truth").is_ok());
        assert!(validate_value_name("errors").is_ok());
    }

    #[test]
    fn type_and_module_names_do_not_end_in_underscore() {
        assert!(validate_type_name("T_").is_err());
        assert!(validate_type_name("T_1").is_ok());
        assert!(validate_module_name("vault_").is_err());
    }

    #[test]
    fn case_rules() {
        assert!(validate_type_name("datum").is_err());
        assert!(validate_module_name("Vault").is_err());
        assert!(validate_value_name("1x").is_err());
    }
}
