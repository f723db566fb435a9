//! HTTP handlers.

use regex::Regex;

pub mod expenses;
pub mod health;
pub mod login;
pub mod maintenance;
pub mod subscription;
pub mod superadmin;

/// Normalize an email the way the stores key it: trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Cheap shape check; deliverability is the mail system's problem.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn validates_email_shape() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a @b.com"));
        assert!(!is_valid_email("a@b"));
    }
}
