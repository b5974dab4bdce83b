//! Route specificity scoring.
//!
//! Higher scores are tried first. Per path segment:
//!
//! | segment      | weight |
//! |--------------|--------|
//! | literal      | 1000   |
//! | `:param`     | 10     |
//! | `*`          | 1      |
//!
//! The raw pattern length is added as a tie-breaker, and patterns with no
//! parameters or wildcards get a large bonus so exact paths always win.

pub const LITERAL_SEGMENT: u64 = 1000;
pub const PARAM_SEGMENT: u64 = 10;
pub const WILDCARD_SEGMENT: u64 = 1;
pub const EXACT_PATH_BONUS: u64 = 10_000;

/// Score a route pattern. Pure and deterministic.
pub fn score(pattern: &str) -> u64 {
    let segments: u64 = pattern
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if segment.contains('*') {
                WILDCARD_SEGMENT
            } else if segment.contains(':') {
                PARAM_SEGMENT
            } else {
                LITERAL_SEGMENT
            }
        })
        .sum();

    let exact = if pattern.contains(':') || pattern.contains('*') {
        0
    } else {
        EXACT_PATH_BONUS
    };

    segments + pattern.len() as u64 + exact
}
