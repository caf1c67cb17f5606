//! Wildcard pattern compilation
//!
//! A pattern is a literal URL (without scheme) in which `*` matches any
//! sequence of characters. `\*` stands for a literal star and `\\` for a
//! literal backslash; a backslash before anything else is itself literal.
//! Patterns match the whole URL unless they start or end with a wildcard.

use regex::Regex;

/// Escape character used inside patterns.
pub const ESCAPE: char = '\\';
/// The only wildcard.
pub const WILDCARD: char = '*';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(char),
    Wildcard,
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ESCAPE => match chars.peek() {
                Some(&next) if next == WILDCARD || next == ESCAPE => {
                    chars.next();
                    tokens.push(Token::Literal(next));
                }
                _ => tokens.push(Token::Literal(ESCAPE)),
            },
            WILDCARD => tokens.push(Token::Wildcard),
            other => tokens.push(Token::Literal(other)),
        }
    }

    tokens
}

/// Regex source equivalent to `pattern`.
pub fn pattern_to_regex_source(pattern: &str) -> String {
    let tokens = tokenize(pattern);
    let mut source = String::with_capacity(pattern.len() * 2 + 2);

    if tokens.first() != Some(&Token::Wildcard) {
        source.push('^');
    }

    let mut buf = [0u8; 4];
    for token in &tokens {
        match token {
            Token::Wildcard => source.push_str(".*"),
            Token::Literal(ch) => source.push_str(&regex::escape(ch.encode_utf8(&mut buf))),
        }
    }

    if tokens.last() != Some(&Token::Wildcard) {
        source.push('$');
    }

    source
}

/// Compile a wildcard pattern into an anchored regular expression.
pub fn pattern_to_regexp(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&pattern_to_regex_source(pattern))
}

/// Turn an arbitrary literal URL into a pattern that matches exactly it.
pub fn url_to_pattern(url: &str) -> String {
    let mut pattern = String::with_capacity(url.len());
    for ch in url.chars() {
        if ch == ESCAPE || ch == WILDCARD {
            pattern.push(ESCAPE);
        }
        pattern.push(ch);
    }
    pattern
}

/// Escape only the wildcard, leaving backslashes untouched.
///
/// Used when promoting legacy literal rules; a literal `\*` in such a value
/// therefore reads back as a backslash followed by a wildcard.
pub fn escape_wildcards(value: &str) -> String {
    value.replace(WILDCARD, "\\*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_pattern_is_exact() {
        for p in ["example.com", "example.com/path?q=1", "a.b+c(d)[e]{f}|g^h$", ""] {
            let re = pattern_to_regexp(p).unwrap();
            assert!(re.is_match(p), "{p} should match itself");
            assert!(!re.is_match(&format!("x{p}")));
            assert!(!re.is_match(&format!("{p}x")));
        }
        let re = pattern_to_regexp("example.com").unwrap();
        assert!(!re.is_match("exampleXcom"));
    }

    #[test]
    fn test_inner_wildcard() {
        let re = pattern_to_regexp("a*b").unwrap();
        assert!(re.is_match("axyzb"));
        assert!(re.is_match("ab"));
        assert!(!re.is_match("a b c"));
    }

    #[test]
    fn test_edge_wildcards_drop_anchors() {
        assert_eq!(pattern_to_regex_source("*youtube.com*"), ".*youtube\\.com.*");
        assert_eq!(pattern_to_regex_source("youtube.com*"), "^youtube\\.com.*");
        assert_eq!(pattern_to_regex_source("*youtube.com"), ".*youtube\\.com$");

        let re = pattern_to_regexp("*youtube.com*").unwrap();
        assert!(re.is_match("www.youtube.com/watch?v=1"));
        assert!(!re.is_match("vimeo.com"));
    }

    #[test]
    fn test_escaped_wildcard_is_literal() {
        let re = pattern_to_regexp("a\\*b").unwrap();
        assert!(re.is_match("a*b"));
        assert!(!re.is_match("axb"));

        // Escaped star at the end keeps the end anchor
        assert_eq!(pattern_to_regex_source("a\\*"), "^a\\*$");
    }

    #[test]
    fn test_backslashes() {
        let re = pattern_to_regexp("a\\\\b").unwrap();
        assert!(re.is_match("a\\b"));

        let re = pattern_to_regexp("a\\b").unwrap();
        assert!(re.is_match("a\\b"));
    }

    #[test]
    fn test_url_to_pattern_round_trip() {
        for s in ["a*b", "**", "x\\*y", "\\", "*\\*\\", "example.com/*/page", "plain"] {
            let pattern = url_to_pattern(s);
            let re = pattern_to_regexp(&pattern).unwrap();
            assert!(re.is_match(s), "{s} via {pattern}");
        }
        assert_eq!(url_to_pattern("a*b\\c"), "a\\*b\\\\c");
    }

    #[test]
    fn test_escape_wildcards_leaves_backslash() {
        assert_eq!(escape_wildcards("a*b"), "a\\*b");
        assert_eq!(escape_wildcards("a\\b"), "a\\b");
        assert_eq!(escape_wildcards("a\\*"), "a\\\\*");
    }
}
