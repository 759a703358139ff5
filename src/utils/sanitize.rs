//! Filename sanitization utilities

/// Longest component we ever produce, in characters
pub const MAX_COMPONENT_LEN: usize = 255;

/// Characters rejected by at least one common filesystem
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Sanitize a single path component for safe filesystem usage
///
/// Drops control characters and `< > : " / \ | ? *`, collapses whitespace runs
/// into a single space, trims the ends and caps the result at
/// [`MAX_COMPONENT_LEN`] characters. Never fails; input made only of rejected
/// characters comes back empty.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize_filename("AC/DC"), "ACDC");
/// assert_eq!(sanitize_filename("  Back   in  Black "), "Back in Black");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;

    for c in name.chars() {
        if c.is_control() || FORBIDDEN.contains(&c) {
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    // Truncation may end on the separator space, so trim again afterwards
    match out.char_indices().nth(MAX_COMPONENT_LEN) {
        Some((cut, _)) => out[..cut].trim_end().to_string(),
        None => out,
    }
}
