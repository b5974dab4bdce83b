//! Route path patterns.
//!
//! # Responsibilities
//! - Validate a pattern eagerly at registration
//! - Compile it to an anchored regular expression
//! - Extract named parameters from concrete request paths
//!
//! # Syntax
//! - `/users`          literal
//! - `/users/:id`      one segment, captured as `id`
//! - `/files/:path+`   one or more segments, captured as `path`
//! - `/assets/*`       optional rest of path, captured as `wildcard`
//!
//! # Design Decisions
//! - Repeated and trailing slashes in the pattern are collapsed
//! - A trailing slash in the request path always matches
//! - Captures are returned as received (no extra percent-decoding)

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

/// Parameters captured by a pattern match.
pub type PathParams = HashMap<String, String>;

/// Capture name for the first `*` in a pattern; later ones get `wildcard2`, `wildcard3`, ...
pub const WILDCARD_PARAM: &str = "wildcard";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("route path must start with '/': {0:?}")]
    MissingLeadingSlash(String),

    #[error("parameter at offset {offset} of {pattern:?} has no valid name")]
    InvalidParam { pattern: String, offset: usize },

    #[error("parameter {name:?} appears more than once in {pattern:?}")]
    DuplicateParam { pattern: String, name: String },

    #[error("route path {pattern:?} did not compile: {reason}")]
    Compile { pattern: String, reason: String },
}

/// A compiled route path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl PathPattern {
    /// Validate and compile `pattern`.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(pattern.to_owned()));
        }

        let normalized = collapse_slashes(pattern);
        let mut expr = String::with_capacity(normalized.len() * 2);
        expr.push('^');
        let mut names: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut wildcards = 0usize;

        let mut chars = normalized.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            match c {
                ':' => {
                    let mut name = String::new();
                    while let Some(&(_, next)) = chars.peek() {
                        if next.is_ascii_alphanumeric() || next == '_' {
                            name.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
                        return Err(PatternError::InvalidParam {
                            pattern: pattern.to_owned(),
                            offset,
                        });
                    }
                    if names.contains(&name) {
                        return Err(PatternError::DuplicateParam {
                            pattern: pattern.to_owned(),
                            name,
                        });
                    }
                    let greedy = chars.next_if(|&(_, next)| next == '+').is_some();

                    expr.push_str(&regex::escape(&literal));
                    literal.clear();
                    expr.push_str(if greedy {
                        "([^/]+(?:/[^/]+)*)"
                    } else {
                        "([^/]+)"
                    });
                    names.push(name);
                }
                '*' => {
                    let trailing = chars.peek().is_none();
                    // `/*` at the end also matches the bare prefix
                    if trailing && literal.ends_with('/') {
                        literal.pop();
                        expr.push_str(&regex::escape(&literal));
                        expr.push_str("(?:/(.*))?");
                    } else {
                        expr.push_str(&regex::escape(&literal));
                        expr.push_str("(.*)");
                    }
                    literal.clear();

                    wildcards += 1;
                    names.push(match wildcards {
                        1 => WILDCARD_PARAM.to_owned(),
                        n => format!("{WILDCARD_PARAM}{n}"),
                    });
                }
                other => literal.push(other),
            }
        }
        expr.push_str(&regex::escape(&literal));
        expr.push_str("/*$");

        let regex = Regex::new(&expr).map_err(|e| PatternError::Compile {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_owned(),
            regex,
            names,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the pattern has no parameters or wildcards.
    pub fn is_literal(&self) -> bool {
        self.names.is_empty()
    }

    /// Capture names in pattern order.
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path`, returning its captured parameters.
    ///
    /// An optional wildcard that matched nothing is left out of the map.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let captures = self.regex.captures(path)?;
        let params = self
            .names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                captures
                    .get(i + 1)
                    .map(|m| (name.clone(), m.as_str().to_owned()))
            })
            .collect();
        Some(params)
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// `//a///b/` → `/a/b`
fn collapse_slashes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> PathParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_named_params() {
        let pattern = PathPattern::compile("/users/:userId/posts/:postId").unwrap();
        assert_eq!(
            pattern.match_path("/users/123/posts/456"),
            Some(params(&[("userId", "123"), ("postId", "456")]))
        );
        assert!(pattern.match_path("/users/123/posts").is_none());
        assert!(pattern.match_path("/users/123/posts/456/extra").is_none());
    }

    #[test]
    fn test_greedy_param() {
        let pattern = PathPattern::compile("/files/:path+").unwrap();
        assert_eq!(
            pattern.match_path("/files/a/b/c.txt"),
            Some(params(&[("path", "a/b/c.txt")]))
        );
        assert_eq!(
            pattern.match_path("/files/a/b/"),
            Some(params(&[("path", "a/b")]))
        );
        assert!(pattern.match_path("/files").is_none());
        assert!(pattern.match_path("/files/").is_none());
    }

    #[test]
    fn test_trailing_wildcard_is_optional() {
        let pattern = PathPattern::compile("/assets/*").unwrap();
        assert_eq!(
            pattern.match_path("/assets/css/site.css"),
            Some(params(&[("wildcard", "css/site.css")]))
        );
        assert_eq!(pattern.match_path("/assets"), Some(PathParams::new()));
        assert!(pattern.is_match("/assets/"));
        assert!(!pattern.is_match("/assetsx"));
    }

    #[test]
    fn test_inner_wildcards_are_numbered() {
        let pattern = PathPattern::compile("/a/*/b/*").unwrap();
        assert_eq!(pattern.param_names(), ["wildcard", "wildcard2"]);
        let matched = pattern.match_path("/a/x/b/y/z").unwrap();
        assert_eq!(matched["wildcard"], "x");
        assert_eq!(matched["wildcard2"], "y/z");
    }

    #[test]
    fn test_literal_match_and_trailing_slash() {
        let pattern = PathPattern::compile("/health").unwrap();
        assert!(pattern.is_literal());
        assert!(pattern.is_match("/health"));
        assert!(pattern.is_match("/health/"));
        assert!(!pattern.is_match("/healthz"));
        assert!(!pattern.is_match("/api/health"));
    }

    #[test]
    fn test_dots_are_literal() {
        let pattern = PathPattern::compile("/feed.json").unwrap();
        assert!(pattern.is_match("/feed.json"));
        assert!(!pattern.is_match("/feedxjson"));

        let pattern = PathPattern::compile("/files/:name.:ext").unwrap();
        let matched = pattern.match_path("/files/report.pdf").unwrap();
        assert_eq!(matched["name"], "report");
        assert_eq!(matched["ext"], "pdf");
    }

    #[test]
    fn test_slashes_collapse() {
        let pattern = PathPattern::compile("//users///:id/").unwrap();
        assert_eq!(pattern.as_str(), "//users///:id/");
        assert_eq!(pattern.match_path("/users/7"), Some(params(&[("id", "7")])));
    }

    #[test]
    fn test_root_pattern() {
        let pattern = PathPattern::compile("/").unwrap();
        assert!(pattern.is_match("/"));
        assert!(!pattern.is_match("/x"));
    }

    #[test]
    fn test_invalid_patterns_fail_eagerly() {
        assert_eq!(
            PathPattern::compile("users").unwrap_err(),
            PatternError::MissingLeadingSlash("users".into())
        );
        assert!(matches!(
            PathPattern::compile("/users/:").unwrap_err(),
            PatternError::InvalidParam { offset: 7, .. }
        ));
        assert!(matches!(
            PathPattern::compile("/users/:1st").unwrap_err(),
            PatternError::InvalidParam { .. }
        ));
        assert!(matches!(
            PathPattern::compile("/a/:id/b/:id").unwrap_err(),
            PatternError::DuplicateParam { .. }
        ));
    }
}
