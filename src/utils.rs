/// Characters that are not allowed in a file or directory name on at least one
/// of the platforms we write to.
const ILLEGAL_CHARS: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

/// Replaces filesystem-illegal characters in a single path segment with `_`.
///
/// Must be applied per segment, never to a joined path.
pub fn sanitize_segment(segment: &str) -> String {
    segment.replace(&ILLEGAL_CHARS[..], "_")
}

/// Splits a file name into `(stem, extension)` where the extension keeps its
/// leading dot. Leading dots belong to the stem, so `.js` has no extension.
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if filename[..idx].chars().any(|c| c != '.') => filename.split_at(idx),
        _ => (filename, ""),
    }
}
