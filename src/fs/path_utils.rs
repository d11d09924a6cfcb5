//! Path utilities for slash separated media paths

/// Normalize a path: no leading/trailing slashes, no empty or `.` segments
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join two paths and normalize the result
pub fn join(base: &str, rest: &str) -> String {
    normalize(&format!("{}/{}", base, rest))
}

/// Split a normalized path into its directory and leaf
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, leaf)) => (dir, leaf),
        None => ("", path),
    }
}

/// Whether `path` is `ancestor` itself or lies below it
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == b'/')
}

/// Split a file name into base name and extension.
///
/// The extension is whatever follows the last dot; a leading dot or a
/// trailing dot does not start one.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}
