//! Wildcard patterns over stored paths.
//!
//! A pattern is a path whose segments may be wildcards:
//!
//! - `+` matches exactly one non-empty segment.
//! - `#` matches the remainder of the path, zero or more segments. A trailing
//!   `/#` therefore also matches the parent itself (`home/#` matches `home`),
//!   as MQTT topic filters do. This is wider than a plain `home/.*` prefix
//!   match, which would miss the parent entry.
//!
//! A pattern without `+` or `#` segments is an exact path and is looked up
//! directly instead of scanning every entry.
//!
//! Every other segment is literal text. Patterns are never invalid; a pattern
//! that cannot be compiled simply matches nothing.

use std::fmt;

use regex::Regex;

const SINGLE_LEVEL: &str = "+";
const MULTI_LEVEL: &str = "#";

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Option<Regex>,
}

impl WildcardPattern {
    /// Compiles a pattern into an anchored whole-path matcher.
    #[must_use]
    pub fn compile(pattern: &str) -> Self {
        let expr = to_regex_source(pattern);
        let regex = match Regex::new(&expr) {
            Ok(regex) => Some(regex),
            Err(err) => {
                tracing::warn!(pattern, error = %err, "wildcard pattern did not compile; it matches nothing");
                None
            }
        };
        Self {
            source: pattern.to_string(),
            regex,
        }
    }

    /// The pattern text this matcher was compiled from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True if the pattern contains `+` or `#` segments.
    #[must_use]
    pub fn has_wildcards(&self) -> bool {
        self.source
            .split('/')
            .any(|seg| seg == SINGLE_LEVEL || seg == MULTI_LEVEL)
    }

    /// Tests a full path against the pattern.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(path))
    }
}

impl fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn to_regex_source(pattern: &str) -> String {
    let segments: Vec<&str> = pattern.split('/').collect();
    let last = segments.len() - 1;

    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    for (idx, segment) in segments.iter().enumerate() {
        let trailing_multi = idx == last && *segment == MULTI_LEVEL;
        if idx > 0 {
            if trailing_multi {
                out.push_str("(?:/.*)?");
                break;
            }
            out.push('/');
        }
        match *segment {
            SINGLE_LEVEL => out.push_str("[^/]+"),
            MULTI_LEVEL => out.push_str(".*"),
            literal => out.push_str(&regex::escape(literal)),
        }
    }
    out.push('$');
    out
}
