//! Qualifier-aware version ordering.
//!
//! Versions are tokenized into numeric and alphabetic segments and compared
//! pairwise. Known pre-release qualifiers sort before the plain release,
//! rebuild-style qualifiers (`sp`, `redhat`) after it, and unknown
//! qualifiers after those, lexicographically. Trailing zero segments are
//! insignificant, so `1.0` equals `1`.

use std::cmp::Ordering;

/// One parsed segment of a version string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(u64),
    Qualifier(String),
}

/// Relative rank of a qualifier against the plain release.
fn qualifier_rank(qualifier: &str) -> u8 {
    match qualifier {
        "alpha" | "a" => 0,
        "beta" | "b" => 1,
        "milestone" | "m" => 2,
        "rc" | "cr" => 3,
        "snapshot" => 4,
        "" | "ga" | "final" | "release" => 5,
        "sp" => 6,
        // anything else ranks after known rebuild qualifiers
        _ => 7,
    }
}

/// Splits a version string into numeric and lowercased alphabetic tokens.
fn tokenize(version: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut numeric = false;

    let mut flush = |current: &mut String, numeric: bool, tokens: &mut Vec<Token>| {
        if current.is_empty() {
            return;
        }
        if numeric {
            tokens.push(Token::Number(current.parse().unwrap_or(u64::MAX)));
        } else {
            tokens.push(Token::Qualifier(current.to_lowercase()));
        }
        current.clear();
    };

    for ch in version.chars() {
        if ch == '.' || ch == '-' || ch == '_' {
            flush(&mut current, numeric, &mut tokens);
        } else if ch.is_ascii_digit() {
            if !numeric {
                flush(&mut current, numeric, &mut tokens);
                numeric = true;
            }
            current.push(ch);
        } else {
            if numeric {
                flush(&mut current, numeric, &mut tokens);
                numeric = false;
            }
            current.push(ch);
        }
    }
    flush(&mut current, numeric, &mut tokens);

    tokens
}

/// Compares a token against padding (the other version ran out of tokens).
fn compare_to_padding(token: &Token) -> Ordering {
    match token {
        Token::Number(0) => Ordering::Equal,
        Token::Number(_) => Ordering::Greater,
        Token::Qualifier(q) => match qualifier_rank(q).cmp(&qualifier_rank("")) {
            Ordering::Equal => Ordering::Equal,
            other => other,
        },
    }
}

/// Compares two version strings.
///
/// Deterministic and total: any two strings compare, unparsable numeric
/// overflow collapses to a maximal segment rather than failing.
#[must_use]
pub fn compare(left: &str, right: &str) -> Ordering {
    let lhs = tokenize(left);
    let rhs = tokenize(right);
    let len = lhs.len().max(rhs.len());

    for i in 0..len {
        let ordering = match (lhs.get(i), rhs.get(i)) {
            (Some(Token::Number(l)), Some(Token::Number(r))) => l.cmp(r),
            (Some(Token::Qualifier(l)), Some(Token::Qualifier(r))) => {
                match qualifier_rank(l).cmp(&qualifier_rank(r)) {
                    Ordering::Equal => l.cmp(r),
                    other => other,
                }
            }
            // a number ranks above any qualifier in the same position
            (Some(Token::Number(_)), Some(Token::Qualifier(_))) => Ordering::Greater,
            (Some(Token::Qualifier(_)), Some(Token::Number(_))) => Ordering::Less,
            (Some(token), None) => compare_to_padding(token),
            (None, Some(token)) => compare_to_padding(token).reverse(),
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_ascending(versions: &[&str]) {
        for window in versions.windows(2) {
            assert_eq!(
                compare(window[0], window[1]),
                Ordering::Less,
                "{} < {}",
                window[0],
                window[1]
            );
            assert_eq!(
                compare(window[1], window[0]),
                Ordering::Greater,
                "{} > {}",
                window[1],
                window[0]
            );
        }
    }

    #[test]
    fn test_numeric_ordering() {
        assert_ascending(&["1.0", "1.0.1", "1.1", "2.0", "10.0"]);
    }

    #[test]
    fn test_rebuild_suffix_sorts_after_release() {
        assert_ascending(&["1.0", "1.0.0.redhat-1", "1.0.0.redhat-2", "2.0-redhat-1"]);
    }

    #[test]
    fn test_spec_ordering_example() {
        let mut versions = vec!["2.0-redhat-1", "1.0", "1.0.1"];
        versions.sort_by(|a, b| compare(a, b));
        assert_eq!(versions, vec!["1.0", "1.0.1", "2.0-redhat-1"]);
    }

    #[test]
    fn test_prerelease_sorts_before_release() {
        assert_ascending(&[
            "1.0-alpha-1",
            "1.0-beta-1",
            "1.0-rc-1",
            "1.0-snapshot",
            "1.0",
            "1.0-sp-1",
        ]);
    }

    #[test]
    fn test_trailing_zeros_insignificant() {
        assert_eq!(compare("1.0", "1"), Ordering::Equal);
        assert_eq!(compare("1.0.0", "1"), Ordering::Equal);
    }

    #[test]
    fn test_case_insensitive_qualifiers() {
        assert_eq!(compare("1.0.Final", "1.0"), Ordering::Equal);
        assert_eq!(compare("1.0.GA", "1.0.ga"), Ordering::Equal);
    }

    #[test]
    fn test_unknown_qualifiers_compare_lexically() {
        assert_eq!(compare("1.0-xstream", "1.0-zulu"), Ordering::Less);
        assert_eq!(compare("1.0-xstream", "1.0"), Ordering::Greater);
    }

    #[test]
    fn test_deterministic_sort_regardless_of_input_order() {
        let mut first = vec!["1.0.1", "2.0-redhat-1", "1.0"];
        let mut second = vec!["2.0-redhat-1", "1.0", "1.0.1"];
        first.sort_by(|a, b| compare(a, b));
        second.sort_by(|a, b| compare(a, b));
        assert_eq!(first, second);
    }
}
