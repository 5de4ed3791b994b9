//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player name, counted in characters after trimming.
pub const MAX_PLAYER_NAME_CHARS: usize = 40;

/// Validates that a text field is not made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a player name: 1 to 40 characters once trimmed, no control characters.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("Ada")        // Ok
/// validate_player_name("   ")        // Err - blank
/// validate_player_name("Ada\nLove")  // Err - control character
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();
    if length == 0 || length > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!(
                "Player name must be 1 to {MAX_PLAYER_NAME_CHARS} characters (got {length})"
            )
            .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some("Player name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a custom avatar points to an http(s) URL.
pub fn validate_avatar_url(url: &str) -> Result<(), ValidationError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host_and_path) if !host_and_path.is_empty() && !url.contains(char::is_whitespace) => {
            Ok(())
        }
        _ => {
            let mut err = ValidationError::new("avatar_url");
            err.message = Some("Custom avatar must be an http(s) URL".into());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_name_valid() {
        assert!(validate_player_name("Ada").is_ok());
        assert!(validate_player_name("  Grace Hopper  ").is_ok());
        assert!(validate_player_name(&"é".repeat(40)).is_ok());
    }

    #[test]
    fn test_validate_player_name_invalid_length() {
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name("    ").is_err());
        assert!(validate_player_name(&"a".repeat(41)).is_err());
    }

    #[test]
    fn test_validate_player_name_invalid_format() {
        assert!(validate_player_name("Ada\nLovelace").is_err());
        assert!(validate_player_name("tab\there").is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Period 3").is_ok());
        assert!(validate_not_blank(" \t ").is_err());
    }

    #[test]
    fn test_validate_avatar_url() {
        assert!(validate_avatar_url("https://cdn.example.org/avatars/a.png").is_ok());
        assert!(validate_avatar_url("http://localhost:8080/play/avatar/a.png").is_ok());
        assert!(validate_avatar_url("https://").is_err());
        assert!(validate_avatar_url("ftp://example.org/a.png").is_err());
        assert!(validate_avatar_url("https://example.org/a b.png").is_err());
    }
}
