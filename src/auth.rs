//! Bearer token checks for the HTTP surface.

use crate::app::AppError;

/// Constant-time comparison; empty tokens never match.
pub fn validate_token(provided: &str, expected: &str) -> bool {
    let (provided, expected) = (provided.as_bytes(), expected.as_bytes());
    if provided.is_empty() || expected.is_empty() {
        return false;
    }

    let diff = provided
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));

    provided.len() == expected.len() && diff == 0
}

/// Token from an `Authorization: Bearer <token>` value (scheme is case-insensitive).
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let scheme = header.get(..7)?;
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return None;
    }

    Some(header[7..].trim()).filter(|token| !token.is_empty())
}

/// Check an `Authorization` header against the configured token.
/// Without a configured token every request is allowed.
pub fn authorize(header: Option<&str>, expected: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    match header.and_then(extract_bearer_token) {
        Some(token) if validate_token(token, expected) => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_token() {
        assert!(validate_token("secret123", "secret123"));
        assert!(!validate_token("secret123", "secret124"));
        assert!(!validate_token("secret123", "SECRET123"));
        assert!(!validate_token("short", "shorter"));
        assert!(!validate_token("", ""));
        assert!(!validate_token("", "secret"));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("  bearer   abc  "), Some("abc"));
        assert_eq!(extract_bearer_token("BEARER abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Bearerabc"), None);
        assert_eq!(extract_bearer_token(""), None);
    }

    #[test]
    fn test_authorize() {
        assert!(authorize(None, None).is_ok());
        assert!(authorize(Some("Bearer anything"), None).is_ok());
        assert!(authorize(Some("Bearer tok"), Some("tok")).is_ok());
        assert!(matches!(
            authorize(Some("Bearer nope"), Some("tok")),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            authorize(None, Some("tok")),
            Err(AppError::Unauthorized)
        ));
    }
}
