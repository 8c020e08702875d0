//! Identifier validation
//!
//! Table and attribute names end up inside generated SQL. They are always
//! quoted by the dialect, and on top of that they must look like plain
//! identifiers so that raw `find_by` conditions can refer to them unquoted.
//!
//! Conditions themselves are NOT validated: they are passed through to the
//! backend as written and are a known injection surface for untrusted input.

use crate::error::{EntityError, EntityResult};

/// Characters allowed in identifiers
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

/// Longest identifier accepted (PostgreSQL limit)
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Name of the primary key column every table carries
pub const PRIMARY_KEY_COLUMN: &str = "id";

/// SQL keywords rejected as identifiers
static SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "JOIN", "UNION", "DROP", "CREATE",
    "ALTER", "GRANT", "REVOKE", "TRUNCATE", "TABLE", "ORDER", "GROUP", "BY", "LIMIT", "OFFSET",
    "AND", "OR", "NOT", "NULL", "LIKE", "IN", "IS", "AS", "ON", "INTO", "VALUES", "SET",
];

/// Validate that an identifier is safe for use as a table or column name
pub fn validate_identifier(identifier: &str) -> EntityResult<()> {
    let Some(first) = identifier.chars().next() else {
        return Err(EntityError::Validation(
            "Identifier cannot be empty".to_string(),
        ));
    };

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(EntityError::Validation(format!(
            "Identifier '{}' is too long (max {} characters)",
            identifier, MAX_IDENTIFIER_LEN
        )));
    }

    if let Some(c) = identifier.chars().find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c)) {
        return Err(EntityError::Validation(format!(
            "Identifier '{}' contains invalid character '{}'",
            identifier, c
        )));
    }

    if first.is_ascii_digit() {
        return Err(EntityError::Validation(format!(
            "Identifier '{}' cannot start with a number",
            identifier
        )));
    }

    let upper_identifier = identifier.to_uppercase();
    if SQL_KEYWORDS.contains(&upper_identifier.as_str()) {
        return Err(EntityError::Validation(format!(
            "Identifier '{}' is a reserved SQL keyword",
            identifier
        )));
    }

    Ok(())
}

/// Validate an attribute name: a valid identifier that is not the primary key
pub fn validate_attribute_name(name: &str) -> EntityResult<()> {
    validate_identifier(name)?;
    if name.eq_ignore_ascii_case(PRIMARY_KEY_COLUMN) {
        return Err(EntityError::Validation(format!(
            "Attribute '{}' is reserved for the primary key",
            name
        )));
    }
    Ok(())
}

/// Key of an attribute or column. Names are case-insensitive and kept
/// lowercased, matching how SQLite and MySQL compare column names.
pub fn attribute_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Storage name of a table: the validated, lowercased entity name
pub fn table_name(name: &str) -> EntityResult<String> {
    let table = name.to_lowercase();
    validate_identifier(&table)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("test").is_ok());
        assert!(validate_identifier("value_2").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("CamelCase").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("with space").is_err());
        assert!(validate_identifier("'; DROP TABLE users; --").is_err());
        assert!(validate_identifier("select").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_primary_key_is_reserved_for_attributes() {
        assert!(validate_attribute_name("value1").is_ok());
        let err = validate_attribute_name("ID").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_attribute_key_is_lowercased() {
        assert_eq!(attribute_key("Title"), "title");
        assert_eq!(attribute_key("value_2"), "value_2");
    }

    #[test]
    fn test_table_name_is_lowercased() {
        assert_eq!(table_name("Test").unwrap(), "test");
        assert!(table_name("bad-name").is_err());
    }
}
