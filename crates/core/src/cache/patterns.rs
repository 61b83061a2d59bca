//! Glob matching for cache key patterns.

/// Checks if a cache key matches a glob pattern.
///
/// `*` matches any run of characters, including none. There is no escaping
/// and no single-character wildcard.
///
/// ```
/// use strata_core::cache::pattern_matches;
///
/// assert!(pattern_matches("strata:snapshot:*", "strata:snapshot:version:all"));
/// assert!(pattern_matches("*:version:*", "strata:snapshot:version:active"));
/// assert!(!pattern_matches("strata:snapshot:*", "other:snapshot:all"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let pattern = pattern.as_bytes();
    let key = key.as_bytes();

    let (mut p, mut k) = (0, 0);
    // Position of the last `*` seen and the key position it is anchored to.
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, k));
            p += 1;
        } else if p < pattern.len() && pattern[p] == key[k] {
            p += 1;
            k += 1;
        } else if let Some((star, anchor)) = backtrack {
            p = star + 1;
            k = anchor + 1;
            backtrack = Some((star, anchor + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}
