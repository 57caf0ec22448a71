//! Canonical relative paths
//!
//! Paths handed to the core are relative to a backend's root, use `/` as the
//! separator and carry no leading or trailing separator. The empty string is
//! the root itself.

/// Strips leading and trailing separators from `path`
pub fn canonical(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Splits a canonical path into `(directory, leaf)`
///
/// The directory of a single-segment path is the root (`""`).
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Joins a canonical directory and a leaf
pub fn join(dir: &str, leaf: &str) -> String {
    match (dir.is_empty(), leaf.is_empty()) {
        (true, _) => leaf.to_string(),
        (false, true) => dir.to_string(),
        (false, false) => format!("{dir}/{leaf}"),
    }
}

/// Returns true if `path` is `dir` itself or lies below it
///
/// Every path lies under the root.
pub fn is_within(path: &str, dir: &str) -> bool {
    if dir.is_empty() || path == dir {
        return true;
    }
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}
