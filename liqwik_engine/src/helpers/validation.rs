use std::sync::OnceLock;

use regex::Regex;

pub const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$"))
        .as_ref()
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}
