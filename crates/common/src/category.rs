//! Notification category tags.
//!
//! Recipient rules subscribe to outcome categories by tag. Matching is an
//! exact, case-sensitive string comparison.

/// Tag attached to successful (and forced) renewals.
pub const RENEW: &str = "RENEW";

/// Tag attached to per-site renewal failures.
pub const ERROR: &str = "ERROR";

/// Tags the renewal workflow emits.
pub const KNOWN: [&str; 2] = [RENEW, ERROR];

/// Whether the workflow ever emits `tag`.
pub fn is_known(tag: &str) -> bool {
    KNOWN.contains(&tag)
}

/// Whether outcomes under `tag` are logged at error level.
pub fn is_error(tag: &str) -> bool {
    tag == ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags_are_case_sensitive() {
        assert!(is_known("RENEW"));
        assert!(is_known("ERROR"));
        assert!(!is_known("renew"));
        assert!(!is_known("HIGH"));
    }

    #[test]
    fn test_is_error() {
        assert!(is_error(ERROR));
        assert!(!is_error(RENEW));
    }
}
