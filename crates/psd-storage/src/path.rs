//! ---
//! psd_section: "02-storage"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Storage backends and the priority-ordered union registry."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
//! Helpers for slash-separated relative paths.

use crate::{Result, StorageError};

/// Normalise a relative path: strip leading `/`, drop empty and `.` segments.
///
/// `..` segments are rejected so no path can escape a backend root.
pub fn normalize(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(StorageError::InvalidPath {
                    path: path.to_owned(),
                    reason: "parent segments are not allowed",
                })
            }
            other => parts.push(other),
        }
    }
    Ok(parts.join("/"))
}

/// Join two relative paths.
pub fn join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_owned(),
        (_, true) => base.to_owned(),
        _ => format!("{base}/{name}"),
    }
}

/// Final component of a path.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Everything before the final component, empty at the root.
pub fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Extension of the final component, without the dot.
pub fn extension(path: &str) -> Option<&str> {
    let name = basename(path);
    name.rfind('.')
        .filter(|idx| *idx + 1 < name.len())
        .map(|idx| &name[idx + 1..])
}
