/// Input checks for login and registration payloads
///
/// Every check returns the normalized (trimmed) value on success so handlers
/// never store the raw input by accident.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const EMAIL_LENGTH: (usize, usize) = (5, 254);
const EMAIL_LOCAL_PART_MAX: usize = 64;
const FULL_NAME_MAX: usize = 256;
const FULL_NAME_SYMBOL_LIMIT: usize = 5;
const PASSWORD_LENGTH: (usize, usize) = (8, 128);

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    // Statement fragments that never appear in a real name
    static ref SQL_FRAGMENTS: Vec<Regex> = [
        r"(?i)\bUNION\s+SELECT\b",
        r"(--|;|/\*|\*/)",
        r"(?i)\b(SLEEP|WAITFOR|BENCHMARK)\s*\(",
        r#"(?i)\b(OR|AND)\b\s*['"]?\d*['"]?\s*=\s*['"]?\d*"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();
}

/// Returns the trimmed value of a required field, or `EmptyField` when it is
/// missing or blank
pub fn required_field(value: Option<&str>, field: &str) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ValidationError::EmptyField(field.to_string())),
    }
}

/// Validates an account email address
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    check_length("email", email.len(), EMAIL_LENGTH)?;

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    let local_part = email.split('@').next().unwrap_or_default();
    if local_part.len() > EMAIL_LOCAL_PART_MAX || email.contains('\0') {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(email.to_string())
}

/// Validates the display name stored with an account
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    check_length("full_name", name.len(), (1, FULL_NAME_MAX))?;

    let symbols = name
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && !"-._'".contains(*c))
        .count();
    if name.chars().any(char::is_control) || symbols > FULL_NAME_SYMBOL_LIMIT {
        return Err(ValidationError::SuspiciousContent("full_name".to_string()));
    }

    reject_sql_fragments(name)?;
    Ok(name.to_string())
}

/// Validates a new password. Only the length is bounded; the upper bound
/// keeps KDF input small.
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    check_length("password", password.chars().count(), PASSWORD_LENGTH)
}

fn check_length(field: &str, length: usize, (min, max): (usize, usize)) -> Result<(), ValidationError> {
    if length == 0 {
        Err(ValidationError::EmptyField(field.to_string()))
    } else if length < min {
        Err(ValidationError::TooShort(field.to_string(), min))
    } else if length > max {
        Err(ValidationError::TooLong(field.to_string(), max))
    } else {
        Ok(())
    }
}

fn reject_sql_fragments(input: &str) -> Result<(), ValidationError> {
    if SQL_FRAGMENTS.iter().any(|pattern| pattern.is_match(input)) {
        return Err(ValidationError::PossibleSQLInjection);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert_eq!(is_valid_email("  student@uni.edu ").unwrap(), "student@uni.edu");
        assert!(is_valid_email("first.last+counseling@dept.uni.ac.kr").is_ok());
        assert!(is_valid_email("a@u.edu").is_ok());
        // Punycode domains and doubled hyphens are ordinary addresses
        assert!(is_valid_email("user@xn--bcher-kva.example").is_ok());
        assert!(is_valid_email("first--last@u.edu").is_ok());
    }

    #[test]
    fn test_invalid_email() {
        for email in [
            "plainaddress",
            "user@",
            "@uni.edu",
            "user@@uni.edu",
            "a@b",
            "",
            "user' OR '1'='1@uni.edu",
        ] {
            assert!(is_valid_email(email).is_err(), "accepted {:?}", email);
        }

        let long_local = format!("{}@uni.edu", "a".repeat(65));
        assert!(matches!(
            is_valid_email(&long_local),
            Err(ValidationError::SuspiciousContent(_))
        ));
        assert!(is_valid_email(&format!("{}@uni.edu", "a".repeat(250))).is_err());
    }

    #[test]
    fn test_sql_fragments_rejected() {
        assert!(is_valid_name("Robert'); DROP TABLE users;--").is_err());
        assert!(is_valid_name("x UNION SELECT password").is_err());
    }

    #[test]
    fn test_valid_name() {
        for name in ["Ada Lovelace", "Jean-Pierre", "O'Brien", "Dr. Kim Min-ji", "김민지"] {
            assert!(is_valid_name(name).is_ok(), "rejected {:?}", name);
        }
        // Words that merely contain SQL keywords are fine
        assert!(is_valid_name("Orlando Anderson").is_ok());
    }

    #[test]
    fn test_invalid_name() {
        assert!(matches!(is_valid_name("   "), Err(ValidationError::EmptyField(_))));
        assert!(is_valid_name(&"a".repeat(257)).is_err());
        assert!(is_valid_name("Tab\tName").is_err());
        assert!(is_valid_name("!!!!!!@@@@").is_err());
    }

    #[test]
    fn test_required_field() {
        assert_eq!(required_field(Some("  a@u.edu "), "email").unwrap(), "a@u.edu");
        assert!(required_field(Some("   "), "email").is_err());
        assert!(required_field(None, "password").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(is_valid_password("correct-horse").is_ok());
        assert!(matches!(is_valid_password("short"), Err(ValidationError::TooShort(_, 8))));
        assert!(is_valid_password(&"a".repeat(129)).is_err());
        // Length counts characters, not bytes
        assert!(is_valid_password(&"비".repeat(100)).is_ok());
    }
}
