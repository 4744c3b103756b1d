//! CSRF tokens, input sanitizing and rule-based validation.

use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

use super::Session;

/// Session key holding the CSRF token.
pub const CSRF_SESSION_KEY: &str = "csrf_token";

#[allow(clippy::expect_used)]
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>?").expect("tag pattern is valid"));

#[allow(clippy::expect_used)]
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("email pattern is valid")
});

/// Field name to messages, in field order.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    super::hex(&buf)
}

/// Stateless security helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Security;

impl Security {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// 32 random bytes as 64 hex characters.
    #[must_use]
    pub fn generate_csrf_token(&self) -> String {
        random_hex(32)
    }

    /// The session's CSRF token, issuing one if it has none.
    pub fn csrf_token(&self, session: &mut Session) -> String {
        if let Some(token) = session.get_str(CSRF_SESSION_KEY) {
            return token.to_string();
        }
        let token = self.generate_csrf_token();
        session.set(CSRF_SESSION_KEY, token.clone());
        token
    }

    /// Constant-time comparison of `token` with the session token.
    ///
    /// Fails when either side is empty.
    #[must_use]
    pub fn verify_csrf_token(&self, token: &str, session: &Session) -> bool {
        let stored = session.get_str(CSRF_SESSION_KEY).unwrap_or_default();
        if stored.is_empty() || token.is_empty() {
            return false;
        }
        self.secrets_match(stored, token)
    }

    /// Constant-time comparison of a configured secret with a presented one.
    ///
    /// An empty secret never matches.
    #[must_use]
    pub fn secrets_match(&self, expected: &str, presented: &str) -> bool {
        !expected.is_empty() && constant_time_eq(expected.as_bytes(), presented.as_bytes())
    }

    /// Strip tags, escape HTML special characters, drop control characters
    /// and trim.
    #[must_use]
    pub fn sanitize(&self, input: &str) -> String {
        let stripped = TAGS.replace_all(input, "");
        let escaped = super::html_escape(&stripped);
        escaped
            .chars()
            .filter(|c| !c.is_ascii_control())
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Check `data` against `rules`, e.g. `("email", "required|email")`.
    ///
    /// Supported rules are `required`, `email`, `min:N` and `max:N` (lengths
    /// in characters). Unknown rules are ignored. A field with no errors is
    /// absent from the result.
    #[must_use]
    pub fn validate(&self, data: &HashMap<String, String>, rules: &[(&str, &str)]) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for (field, rule_set) in rules {
            let value = data.get(*field).map(String::as_str).unwrap_or_default();
            let len = value.chars().count();
            for rule in rule_set.split('|').map(str::trim) {
                let message = match rule.split_once(':') {
                    None if rule == "required" && value.trim().is_empty() => {
                        Some(format!("The {field} field is required."))
                    }
                    None if rule == "email" && !EMAIL.is_match(value) => {
                        Some(format!("The {field} must be a valid email address."))
                    }
                    Some(("min", n)) => n
                        .parse::<usize>()
                        .ok()
                        .filter(|min| len < *min)
                        .map(|min| format!("The {field} must be at least {min} characters.")),
                    Some(("max", n)) => n
                        .parse::<usize>()
                        .ok()
                        .filter(|max| len > *max)
                        .map(|max| {
                            format!("The {field} may not be greater than {max} characters.")
                        }),
                    _ => None,
                };
                if let Some(message) = message {
                    errors.entry((*field).to_string()).or_default().push(message);
                }
            }
        }
        errors
    }

    /// Random lowercase hex string of exactly `length` characters.
    #[must_use]
    pub fn generate_random_string(&self, length: usize) -> String {
        let mut s = random_hex(length.div_ceil(2));
        s.truncate(length);
        s
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_csrf_token_issue_and_verify() {
        let security = Security::new();
        let mut session = Session::new();
        let token = security.csrf_token(&mut session);
        assert_eq!(token.len(), 64);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(security.csrf_token(&mut session), token);

        assert!(security.verify_csrf_token(&token, &session));
        assert!(!security.verify_csrf_token("nope", &session));
        assert!(!security.verify_csrf_token("", &session));
        assert!(!security.verify_csrf_token("", &Session::new()));
    }

    #[test]
    fn test_sanitize() {
        let security = Security::new();
        assert_eq!(security.sanitize("  <b>Tom</b> & \"Jerry\"\u{7} "), "Tom &amp; &quot;Jerry&quot;");
        assert_eq!(security.sanitize("<script>alert(1)</script>"), "alert(1)");
    }

    #[test]
    fn test_validate_rules() {
        let security = Security::new();
        let input = data(&[("name", "Al"), ("email", "not-an-email"), ("bio", "abcdef")]);
        let errors = security.validate(
            &input,
            &[
                ("name", "required|min:3"),
                ("email", "required|email"),
                ("bio", "max:5"),
                ("missing", "required"),
            ],
        );
        assert_eq!(errors["name"], vec!["The name must be at least 3 characters."]);
        assert_eq!(errors["email"], vec!["The email must be a valid email address."]);
        assert_eq!(errors["bio"], vec!["The bio may not be greater than 5 characters."]);
        assert_eq!(errors["missing"], vec!["The missing field is required."]);
    }

    #[test]
    fn test_validate_passes() {
        let security = Security::new();
        let input = data(&[("email", "ada@example.com"), ("name", "Ada")]);
        let errors = security.validate(&input, &[("email", "required|email"), ("name", "min:3|max:10")]);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_random_string_length() {
        let security = Security::new();
        assert_eq!(security.generate_random_string(32).len(), 32);
        assert_eq!(security.generate_random_string(7).len(), 7);
        assert_eq!(security.generate_random_string(0), "");
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn test_secrets_match() {
        let security = Security::new();
        assert!(security.secrets_match("s3cret", "s3cret"));
        assert!(!security.secrets_match("s3cret", "s3cres"));
        assert!(!security.secrets_match("s3cret", ""));
        assert!(!security.secrets_match("", ""));
    }
}
