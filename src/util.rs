//! Shared utility helpers.

/// Case-insensitive substring search without allocating an uppercase copy.
///
/// SQLite affinity detection matches substrings of declared type names
/// ("BIGINT" contains "INT"), so this runs on every column of every table.
#[inline]
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    let needle_bytes = needle.as_bytes();
    let haystack_bytes = haystack.as_bytes();
    if needle_bytes.len() > haystack_bytes.len() {
        return false;
    }
    haystack_bytes
        .windows(needle_bytes.len())
        .any(|window| window.eq_ignore_ascii_case(needle_bytes))
}

/// Case-insensitive equality for referential-action codes and keyword words.
#[inline]
pub fn eq_ci(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
