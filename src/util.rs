//! Shared utility helpers.

#[inline]
fn fold(byte: u8) -> u8 {
    byte.to_ascii_lowercase()
}

/// Case-insensitive substring search without allocating a lowercase copy.
#[inline]
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    find_ci(haystack, needle).is_some()
}

/// Case-insensitive starts_with check without allocating.
#[inline]
pub fn starts_with_ci(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack
            .bytes()
            .zip(needle.bytes())
            .all(|(h, n)| fold(h) == fold(n))
}

/// Case-insensitive find — returns byte offset of first occurrence of `needle`
/// in `haystack`. Scans for the folded first byte, then verifies the rest.
pub fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    let haystack = haystack.as_bytes();
    let first = fold(*needle.first()?);
    let last_start = haystack.len().checked_sub(needle.len())?;
    'candidates: for start in 0..=last_start {
        if fold(haystack[start]) != first {
            continue;
        }
        for (offset, &expected) in needle.iter().enumerate().skip(1) {
            if fold(haystack[start + offset]) != fold(expected) {
                continue 'candidates;
            }
        }
        return Some(start);
    }
    None
}

/// Case-insensitive whole-string equality.
#[inline]
pub fn eq_ci(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Maximum length of a sanitized field value.
pub const MAX_FIELD_LEN: usize = 255;

/// Canonical string cleanup applied to every value that leaves the pipeline:
/// NULs stripped, whitespace trimmed, length capped at 255 characters.
pub fn clean_text(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| *c != '\0').collect();
    let trimmed = stripped.trim();
    if trimmed.chars().count() <= MAX_FIELD_LEN {
        trimmed.to_string()
    } else {
        trimmed.chars().take(MAX_FIELD_LEN).collect()
    }
}
