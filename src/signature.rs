use lazy_static::lazy_static;
use regex::Regex;

/// Used whenever no plausible name can be found.
pub const FALLBACK_NAME: &str = "there";

/// Closing lines skipped when looking for a signature name.
pub const SIGN_OFFS: &[&str] = &["regards", "best", "thanks", "sincerely", "cheers"];

lazy_static! {
    static ref CAPITALIZED_WORD: Regex = Regex::new(r"^[A-Z][a-z]+$").unwrap();
}

/// Guess the sender's first name from the end of a message body.
///
/// Scans lines bottom-up, skipping blanks, bare sign-offs and anything
/// containing `@`; the first line whose first word is a single capitalized
/// word wins.
pub fn sender_name_from_body(body: &str) -> String {
    for line in body.lines().rev() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if SIGN_OFFS.contains(&line.to_lowercase().as_str()) {
            continue;
        }

        if line.contains('@') {
            continue;
        }

        if let Some(first_word) = line.split_whitespace().next() {
            if CAPITALIZED_WORD.is_match(first_word) {
                return first_word.to_string();
            }
        }
    }

    FALLBACK_NAME.to_string()
}

/// First name from an identity such as `steve.glick@example.com`.
pub fn first_name_from_identity(identity: &str) -> String {
    let local = identity.split('@').next().unwrap_or_default();
    let segment = local.split(['.', '_']).next().unwrap_or_default().trim();

    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => FALLBACK_NAME.to_string(),
    }
}
