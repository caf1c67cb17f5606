//! URL helpers for the matching path
//!
//! These functions avoid allocations and work directly on string slices.

// =============================================================================
// Scheme Handling
// =============================================================================

/// Get the position after "://" (or after ":" for data URLs).
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    // Find ':'
    let colon_pos = bytes.iter().position(|&b| b == b':')?;

    // A scheme is letters, digits, '+', '-' or '.' and starts with a letter
    let scheme = &bytes[..colon_pos];
    if scheme.is_empty()
        || !scheme[0].is_ascii_alphabetic()
        || !scheme
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.')
    {
        return None;
    }

    // Check for "://"
    if bytes.len() > colon_pos + 2
        && bytes[colon_pos + 1] == b'/'
        && bytes[colon_pos + 2] == b'/'
    {
        return Some(colon_pos + 3);
    }

    // Data URLs use ":" not "://"
    if scheme.eq_ignore_ascii_case(b"data") {
        return Some(colon_pos + 1);
    }

    None
}

/// Remove a leading scheme so rules match against `host/path?query`.
#[inline]
pub fn strip_scheme(url: &str) -> &str {
    match get_scheme_end(url) {
        Some(end) => &url[end..],
        None => url,
    }
}
