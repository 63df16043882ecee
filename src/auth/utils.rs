use regex::Regex;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;

/// Normalize email input for lookups and uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Usernames never contain `@` so a login identifier resolves to exactly one lookup.
#[must_use]
pub fn valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len)
        && !username.chars().any(|c| c == '@' || c.is_whitespace())
}

/// An identifier containing `@` is an email address.
#[must_use]
pub fn is_email_identifier(identifier: &str) -> bool {
    identifier.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn valid_username_bounds() {
        assert!(valid_username("bob"));
        assert!(valid_username(&"a".repeat(50)));
        assert!(!valid_username("ab"));
        assert!(!valid_username(&"a".repeat(51)));
        assert!(!valid_username("bob@home"));
        assert!(!valid_username("bob smith"));
    }

    #[test]
    fn identifier_kind() {
        assert!(is_email_identifier("alice@x.com"));
        assert!(!is_email_identifier("alice"));
    }
}
