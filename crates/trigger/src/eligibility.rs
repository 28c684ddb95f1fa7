//! Which uploads are processed at all.

use crate::ObjectName;

/// Object-name suffixes that are dispatched for processing.
///
/// Matching is case-sensitive and by exact suffix. `pptx` has no leading dot
/// and therefore also matches names such as `slidespptx`; it is kept as
/// deployed.
pub const ALLOWED_EXTENSIONS: [&str; 8] = [
    ".pdf", ".PDF", ".ppt", "pptx", ".doc", ".docx", ".txt", ".pptx",
];

/// Returns `true` if the object name ends in an allow-listed suffix.
pub fn is_eligible(name: &ObjectName) -> bool {
    let name = name.as_str();
    ALLOWED_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}
