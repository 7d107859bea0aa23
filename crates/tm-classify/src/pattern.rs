//! Garbage/ignore patterns.
//!
//! Syntax:
//! - `^` prefix negates the pattern
//! - `*` alone matches everything
//! - `/…/` is a regular expression
//! - anything else is a glob: `?` is one character, `*` any run
//!
//! Patterns always have to match the whole string.

use std::fmt;

use regex::Regex;

use crate::error::{ClassifyError, ClassifyResult};

#[derive(Debug, Clone)]
pub struct Pattern {
    text: Option<String>,
    negate: bool,
    regex: Option<Regex>,
}

impl Pattern {
    /// The pattern used when no source filter is given.
    pub fn any() -> Self {
        Self {
            text: None,
            negate: false,
            regex: None,
        }
    }

    pub fn parse(text: &str) -> ClassifyResult<Self> {
        let invalid = |message: &str| ClassifyError::Pattern {
            pattern: text.to_string(),
            message: message.to_string(),
        };

        let (negate, body) = match text.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if body.is_empty() {
            return Err(invalid("empty pattern"));
        }

        let regex = if body == "*" {
            None
        } else {
            let source = match body
                .strip_prefix('/')
                .and_then(|rest| rest.strip_suffix('/'))
            {
                Some(re) => re.to_string(),
                None => glob_to_regex(body),
            };
            let anchored = format!("^(?:{source})$");
            Some(Regex::new(&anchored).map_err(|e| invalid(&e.to_string()))?)
        };

        Ok(Self {
            text: Some(text.to_string()),
            negate,
            regex,
        })
    }

    /// The pattern as written in the config, `None` for [`Pattern::any`].
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    /// True for `*`, `^*` and [`Pattern::any`]: no regex is involved.
    pub fn is_wildcard(&self) -> bool {
        self.regex.is_none()
    }

    /// The anchored regex this pattern compiles to.
    pub fn regex(&self) -> Option<&str> {
        self.regex.as_ref().map(Regex::as_str)
    }

    pub fn test(&self, value: &str) -> bool {
        let found = match &self.regex {
            Some(re) => re.is_match(value),
            None => true,
        };
        found ^ self.negate
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => f.write_str(text),
            None => f.write_str("(any)"),
        }
    }
}

fn glob_to_regex(glob: &str) -> String {
    regex::escape(glob).replace(r"\?", ".").replace(r"\*", ".*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_translation() {
        let cases = [
            ("?", "^(?:.)$"),
            ("foo", "^(?:foo)$"),
            ("bl*ah?", "^(?:bl.*ah.)$"),
            ("*foo+bar", r"^(?:.*foo\+bar)$"),
            ("/test*", "^(?:/test.*)$"),
        ];
        for (glob, regex) in cases {
            for negate in [false, true] {
                let text = if negate { format!("^{glob}") } else { glob.to_string() };
                let p = Pattern::parse(&text).unwrap();
                assert_eq!(p.regex(), Some(regex), "{text}");
                assert_eq!(p.is_negated(), negate);
                assert!(!p.is_wildcard());
            }
        }
    }

    #[test]
    fn regex_patterns_are_used_verbatim() {
        assert_eq!(Pattern::parse("/blah/").unwrap().regex(), Some("^(?:blah)$"));
        assert_eq!(Pattern::parse("/bl*ah?/").unwrap().regex(), Some("^(?:bl*ah?)$"));
    }

    #[test]
    fn wildcard() {
        let p = Pattern::parse("*").unwrap();
        assert!(p.is_wildcard());
        assert!(p.test("anything"));
        let n = Pattern::parse("^*").unwrap();
        assert!(n.is_wildcard());
        assert!(n.is_negated());
        assert!(!n.test("anything"));
        assert!(Pattern::any().test(""));
        assert_eq!(Pattern::any().text(), None);
    }

    #[test]
    fn matching() {
        let cases = [
            ("foo*", "foobar", true),
            ("^foo*", "foobar", false),
            ("/test1{3}/", "test111", true),
            ("^/test1{3}/", "test", true),
            ("/test1{3}/", "test111x", false),
            ("a?c", "abc", true),
            ("a?c", "abbc", false),
            ("a.c", "abc", false),
            ("/a|b/", "ab", false),
        ];
        for (pattern, value, expected) in cases {
            assert_eq!(
                Pattern::parse(pattern).unwrap().test(value),
                expected,
                "{pattern} vs {value}"
            );
        }
    }

    #[test]
    fn invalid_patterns() {
        assert!(Pattern::parse("").is_err());
        assert!(Pattern::parse("^").is_err());
        assert!(matches!(
            Pattern::parse("/(unclosed/"),
            Err(ClassifyError::Pattern { .. })
        ));
    }
}
