//! Identifier validation, quoting, and naming conventions for generated DDL.
//!
//! SQL identifiers (table names, column names, schema names) cannot be passed
//! as parameters in prepared statements - only data values can. All dynamic
//! SQL built by this crate goes through the functions here: names are
//! validated against a conservative pattern, then bracket-quoted.

use crate::error::{RepoError, Result};

/// Maximum identifier length accepted by SQL Server.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier used in generated DDL.
///
/// Accepts a leading ASCII letter followed by letters, digits, or
/// underscores, up to 128 characters. Everything else is rejected.
///
/// # Errors
///
/// Returns `RepoError::Schema` with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RepoError::Schema("identifier cannot be empty".to_string()));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(RepoError::Schema(format!(
            "identifier exceeds maximum length of {} characters (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !first.is_ascii_alphabetic() {
        return Err(RepoError::Schema(format!(
            "identifier must start with a letter: {:?}",
            name
        )));
    }

    if let Some(bad) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(RepoError::Schema(format!(
            "identifier contains invalid character {:?}: {:?}",
            bad, name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// Escapes closing brackets by doubling them and wraps in brackets.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Qualify a table name with its schema, with proper quoting.
pub fn qualify(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Strip quoting and escape characters from a caller-supplied name.
///
/// Mirrors the normalization applied before names participate in
/// constraint-key generation: quotes and brackets are dropped, dashes
/// become underscores.
pub fn strip_escape_characters(text: &str) -> String {
    text.replace(['\'', '[', ']'], "").replace('-', "_")
}

/// Case-insensitive name comparison used throughout schema diffing.
pub fn is_same(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Strip the outermost parenthesis wrapper the catalog adds around a
/// default-value expression.
///
/// `object_definition` wraps an expression default as `(getdate())`; exactly
/// one wrapping pair is removed before comparison, so the doubly wrapped
/// constant form `((0))` still compares unequal to the bare text `0`.
pub fn normalize_default(text: Option<&str>) -> Option<String> {
    let text = text?;
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text);
    Some(inner.to_string())
}

/// Constraint name for a column default: `[DF_schema_table_column]`.
pub fn default_constraint_key(schema: &str, table: &str, column: &str) -> String {
    format!("[DF_{}_{}_{}]", schema, table, column)
}

/// Constraint name for a table primary key: `[PK_schema_table]`.
pub fn primary_key_key(schema: &str, table: &str) -> String {
    format!("[PK_{}_{}]", schema, table)
}

/// Constraint name for a unique group: `[IX_schema_table]` for the anonymous
/// group, `[IX_schema_table_group]` for a named one.
pub fn unique_key(schema: &str, table: &str, group: &str) -> String {
    if group.is_empty() {
        format!("[IX_{}_{}]", schema, table)
    } else {
        format!("[IX_{}_{}_{}]", schema, table, group)
    }
}

/// Default table name for a model type: common data-model suffixes stripped.
pub fn strip_model_suffix(type_name: &str) -> &str {
    const SUFFIXES: [&str; 6] = [
        "EntityModel",
        "DataModel",
        "TableModel",
        "Entity",
        "Model",
        "Table",
    ];

    for suffix in SUFFIXES {
        if type_name.len() > suffix.len() {
            let (head, tail) = type_name.split_at(type_name.len() - suffix.len());
            if tail.eq_ignore_ascii_case(suffix) {
                return head;
            }
        }
    }

    type_name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("Users").is_ok());
        assert!(validate_identifier("my_table").is_ok());
        assert!(validate_identifier("Table123").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_leading_digit() {
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("_table").is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_special_characters() {
        assert!(validate_identifier("table name").is_err());
        assert!(validate_identifier("table;drop").is_err());
        assert!(validate_identifier("table\0name").is_err());
    }

    #[test]
    fn test_validate_identifier_length_bounds() {
        let mut max_name = "a".to_string();
        max_name.push_str(&"b".repeat(MAX_IDENTIFIER_LENGTH - 1));
        assert!(validate_identifier(&max_name).is_ok());

        max_name.push('c');
        let result = validate_identifier(&max_name);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("maximum length"));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Users"), "[Users]");
        assert_eq!(quote_ident("table]name"), "[table]]name]");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("dbo", "Users"), "[dbo].[Users]");
    }

    #[test]
    fn test_strip_escape_characters() {
        assert_eq!(strip_escape_characters("[User's]"), "Users");
        assert_eq!(strip_escape_characters("my-table"), "my_table");
    }

    #[test]
    fn test_is_same_case_insensitive() {
        assert!(is_same(Some("dbo"), Some("DBO")));
        assert!(is_same(None, None));
        assert!(!is_same(Some("dbo"), None));
        assert!(!is_same(Some("dbo"), Some("sales")));
    }

    #[test]
    fn test_normalize_default_strips_one_wrapper() {
        assert_eq!(normalize_default(Some("(getdate())")).unwrap(), "getdate()");
        assert_eq!(normalize_default(Some("((0))")).unwrap(), "(0)");
        assert_eq!(normalize_default(Some("0")).unwrap(), "0");
        assert_eq!(normalize_default(None), None);
    }

    #[test]
    fn test_constraint_keys() {
        assert_eq!(
            default_constraint_key("dbo", "Users", "Age"),
            "[DF_dbo_Users_Age]"
        );
        assert_eq!(primary_key_key("dbo", "Users"), "[PK_dbo_Users]");
        assert_eq!(unique_key("dbo", "Users", ""), "[IX_dbo_Users]");
        assert_eq!(unique_key("dbo", "Users", "Email"), "[IX_dbo_Users_Email]");
    }

    #[test]
    fn test_strip_model_suffix() {
        assert_eq!(strip_model_suffix("CustomerModel"), "Customer");
        assert_eq!(strip_model_suffix("CustomerDataModel"), "Customer");
        assert_eq!(strip_model_suffix("CustomerEntity"), "Customer");
        assert_eq!(strip_model_suffix("customertable"), "customer");
        assert_eq!(strip_model_suffix("Customer"), "Customer");
        // The suffix alone is not stripped to an empty name
        assert_eq!(strip_model_suffix("Model"), "Model");
    }
}
