//! Input validation for user accounts and settings.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Characters that count as "special" in a password.
pub const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$").expect("email pattern is a valid regex")
});

/// A rejected input value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Form field the message belongs to.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn validate_name(field: &'static str, label: &str, name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if !(1..=255).contains(&len) {
        return Err(ValidationError::new(
            field,
            format!("{label} must be between 1 and 255 characters"),
        ));
    }
    if !name.chars().all(char::is_alphabetic) {
        return Err(ValidationError::new(
            field,
            format!("{label} can only contain letters"),
        ));
    }
    Ok(())
}

pub fn validate_first_name(name: &str) -> Result<(), ValidationError> {
    validate_name("first_name", "first name", name)
}

pub fn validate_last_name(name: &str) -> Result<(), ValidationError> {
    validate_name("last_name", "last name", name)
}

/// Accept `local@domain.tld` or `local@[ip-address]`, ignoring case.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::new("email", "invalid email format");
    let email = email.trim().to_lowercase();

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    if let Some(ip) = domain.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        return ip.parse::<IpAddr>().map(|_| ()).map_err(|_| invalid());
    }

    if EMAIL.is_match(&email) {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// 8 to 72 ASCII characters without spaces, with at least one uppercase
/// letter, lowercase letter, digit and special character.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let err = |message: &str| Err(ValidationError::new("password", message));

    if password.len() < 8 {
        return err("password must be at least 8 characters");
    }
    if password.len() > 72 {
        return err("password must be at most 72 characters");
    }

    let (mut upper, mut lower, mut digit, mut special) = (false, false, false, false);
    for c in password.chars() {
        if c.is_whitespace() {
            return err("password cannot contain spaces");
        }
        if !c.is_ascii() {
            return err("password can only contain ASCII characters");
        }
        if c.is_ascii_uppercase() {
            upper = true;
        } else if c.is_ascii_lowercase() {
            lower = true;
        } else if c.is_ascii_digit() {
            digit = true;
        } else if PASSWORD_SPECIALS.contains(c) {
            special = true;
        }
    }

    if !upper {
        return err("password must contain at least one uppercase letter");
    }
    if !lower {
        return err("password must contain at least one lowercase letter");
    }
    if !digit {
        return err("password must contain at least one number");
    }
    if !special {
        return err("password must contain at least one special character");
    }
    Ok(())
}

/// Posts per page must be between 1 and 100.
pub fn validate_posts_per_page(value: i32) -> Result<(), ValidationError> {
    if (1..=100).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "posts_per_page",
            "posts per page must be between 1 and 100",
        ))
    }
}

/// Run all account checks, collecting every failure.
pub fn validate_account(
    first_name: &str,
    last_name: &str,
    email: &str,
    password: Option<&str>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let checks = [
        validate_first_name(first_name.trim()),
        validate_last_name(last_name.trim()),
        validate_email(email),
    ];
    errors.extend(checks.into_iter().filter_map(Result::err));
    if let Some(password) = password
        && let Err(e) = validate_password(password)
    {
        errors.push(e);
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert!(validate_first_name("Zoë").is_ok());
        assert!(validate_first_name("").is_err());
        assert!(validate_last_name("O'Brien").is_err());
        assert!(validate_last_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn emails() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("Ada.L+blog@Example.org").is_ok());
        assert!(validate_email("root@[127.0.0.1]").is_ok());
        assert!(validate_email("root@[::1]").is_ok());
        assert!(validate_email("root@[999.1.1.1]").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b@c.com").is_err());
        assert!(validate_email("a@localhost").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn passwords() {
        assert!(validate_password("Secr3t!pw").is_ok());
        assert_eq!(
            validate_password("short").unwrap_err().message,
            "password must be at least 8 characters"
        );
        assert!(validate_password(&format!("Aa1!{}", "x".repeat(70))).is_err());
        assert!(validate_password("Secr3t! pw").is_err());
        assert!(validate_password("Sécr3t!pw").is_err());
        assert!(validate_password("secr3t!pw").is_err());
        assert!(validate_password("SECR3T!PW").is_err());
        assert!(validate_password("Secret!pw").is_err());
        assert!(validate_password("Secr3tpw9").is_err());
    }

    #[test]
    fn account_collects_all_errors() {
        let errors = validate_account("", "Lovelace", "bad", Some("weak"));
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["first_name", "email", "password"]);
        assert!(validate_account("Ada", "Lovelace", "ada@example.com", None).is_empty());
    }

    #[test]
    fn posts_per_page_bounds() {
        assert!(validate_posts_per_page(1).is_ok());
        assert!(validate_posts_per_page(100).is_ok());
        assert!(validate_posts_per_page(0).is_err());
        assert!(validate_posts_per_page(101).is_err());
    }
}
