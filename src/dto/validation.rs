//! Validation helpers for DTOs.

use std::collections::HashSet;

use validator::ValidationError;

/// Longest identifier accepted for teams, matches, candidates, users and posts.
const MAX_ID_LEN: usize = 128;

/// Validates an identifier used as a storage key.
///
/// Identifiers must be non-empty, at most 128 characters and contain only
/// ASCII letters, digits, `-`, `_` or `.`.
///
/// # Examples
///
/// ```ignore
/// validate_identifier("leinster")     // Ok
/// validate_identifier("")             // Err - empty
/// validate_identifier("a b")          // Err - space
/// ```
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!(
                "Identifier must be between 1 and {MAX_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        let mut err = ValidationError::new("identifier_format");
        err.message =
            Some("Identifier may only contain ASCII letters, digits, '-', '_' or '.'".into());
        return Err(err);
    }

    Ok(())
}

/// Rejects blank strings (empty or whitespace only).
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Rejects a list of ids containing the same value twice.
pub fn validate_unique_ids<'a, I>(ids: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            let mut err = ValidationError::new("duplicate_id");
            err.message = Some(format!("Identifier `{id}` is listed more than once").into());
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("leinster").is_ok());
        assert!(validate_identifier("match-2024_05.01").is_ok());
        assert!(validate_identifier("A1").is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid_length() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_identifier_invalid_format() {
        assert!(validate_identifier("a b").is_err());
        assert!(validate_identifier("team/1").is_err());
        assert!(validate_identifier("équipe").is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Man of the Match").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }

    #[test]
    fn test_validate_unique_ids() {
        assert!(validate_unique_ids(["a", "b", "c"]).is_ok());
        assert!(validate_unique_ids(["a", "b", "a"]).is_err());
    }
}
