//! Identifier-safety rule applied to mapping keys.
//!
//! # Design
//! A key survives `Node::from_raw` only if it reads as a plain identifier:
//! ASCII letters, digits and underscore, not starting with a digit, and not
//! one of `DISALLOWED_KEYS`. The rule throws away data the server sent (for
//! example `"first-name"` or `"class"`), which is almost certainly an
//! accident of reusing language identifier rules for JSON keys. It is kept
//! exactly as-is because callers of the mapped view rely on which keys are
//! present; use `ResponseType::Raw` when the full body matters.

/// Keyword names that never survive as mapping keys, even though they are
/// otherwise well-formed identifiers.
pub const DISALLOWED_KEYS: &[&str] = &[
    "and", "as", "assert", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "exec", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "not", "or",
    "pass", "print", "raise", "return", "try", "while", "with", "yield",
];

/// Returns `true` when `key` is kept by the mapper.
pub fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !DISALLOWED_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for key in ["a", "_", "_private", "contact_id", "Status2", "UPPER_case_9"] {
            assert!(is_identifier(key), "{key} should be accepted");
        }
    }

    #[test]
    fn rejects_leading_digit_and_punctuation() {
        for key in ["", "2bad", "has space", "first-name", "a.b", "$ref", "@id", "x!"] {
            assert!(!is_identifier(key), "{key} should be rejected");
        }
    }

    #[test]
    fn rejects_non_ascii_letters() {
        assert!(!is_identifier("café"));
        assert!(!is_identifier("ключ"));
    }

    #[test]
    fn rejects_disallowed_keywords() {
        for key in DISALLOWED_KEYS {
            assert!(!is_identifier(key), "{key} should be rejected");
        }
    }

    #[test]
    fn keyword_check_is_case_sensitive() {
        assert!(is_identifier("Class"));
        assert!(is_identifier("FROM"));
        assert!(is_identifier("type"));
    }
}
