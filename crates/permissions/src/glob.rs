//! Wildcard matching for permission strings
//!
//! `*` matches any run of characters, dots included, so `trademark.*` covers
//! `trademark.read` as well as `trademark.report.export`. Every other
//! character, `?` and brackets included, matches itself.

/// Whether `pattern` contains a wildcard
pub fn is_pattern(pattern: &str) -> bool {
    pattern.contains('*')
}

/// Match `text` against `pattern`
pub fn matches(pattern: &str, text: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !is_pattern(pattern) {
        return pattern == text;
    }

    let pattern = pattern.as_bytes();
    let text = text.as_bytes();
    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, tried)) = backtrack {
            p = star + 1;
            t = tried + 1;
            backtrack = Some((star, tried + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_wildcard() {
        assert!(matches("*", "anything"));
        assert!(matches("*", ""));
        assert!(matches("*", "a.b.c"));
    }

    #[test]
    fn test_suffix_wildcard_spans_segments() {
        assert!(matches("trademark.*", "trademark.read"));
        assert!(matches("trademark.*", "trademark.report.export"));
        assert!(matches("trademark.*", "trademark."));
        assert!(!matches("trademark.*", "trademark"));
        assert!(!matches("trademark.*", "search.basic"));
        assert!(!matches("trademark.*", "Trademark.read"));
    }

    #[test]
    fn test_inner_and_leading_wildcards() {
        assert!(matches("*.read", "trademark.read"));
        assert!(matches("analysis.*.export", "analysis.q3.export"));
        assert!(matches("analysis.*.export", "analysis.a.b.export"));
        assert!(!matches("analysis.*.export", "analysis.export"));
        assert!(matches("a*b*c", "aXXbYYc"));
        assert!(!matches("a*b*c", "aXXcYYb"));
    }

    #[test]
    fn test_no_other_metacharacters() {
        assert!(!matches("search.?", "search.x"));
        assert!(matches("search.?", "search.?"));
        assert!(!matches("search.[ab]", "search.a"));
    }

    #[test]
    fn test_literal_pattern_is_exact() {
        assert!(matches("user.profile", "user.profile"));
        assert!(!matches("user.profile", "user.profiles"));
    }

    proptest! {
        #[test]
        fn prop_prefix_star_matches_any_suffix(prefix in "[a-z.]{0,12}", suffix in "[a-z.]{0,12}") {
            let pattern = format!("{prefix}*");
            let text = format!("{prefix}{suffix}");
            prop_assert!(matches(&pattern, &text));
        }

        #[test]
        fn prop_literal_matches_only_itself(a in "[a-z.]{1,12}", b in "[a-z.]{1,12}") {
            prop_assert_eq!(matches(&a, &b), a == b);
        }
    }
}
