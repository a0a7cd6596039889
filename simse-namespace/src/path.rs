use crate::error::NamespaceError;

// ── Constants ───────────────────────────────────────────────────────────────

pub const ROOT: &str = "/";
pub const SEPARATOR: char = '/';

// ── Limits ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceLimits {
    pub max_path_depth: usize,
    pub max_name_length: usize,
    pub max_path_length: usize,
}

impl Default for NamespaceLimits {
    fn default() -> Self {
        Self {
            max_path_depth: 32,
            max_name_length: 255,
            max_path_length: 1024,
        }
    }
}

// ── Path functions ──────────────────────────────────────────────────────────

/// Split a path into its name components.
///
/// Redundant and trailing separators collapse, and a missing leading `/` is
/// taken as rooted. `""` and `"/"` both resolve to no components (the root).
/// `.` and `..` are never interpreted; they are rejected.
pub fn resolve(path: &str) -> Result<Vec<String>, NamespaceError> {
    let mut components = Vec::new();
    for segment in path.split(SEPARATOR) {
        if segment.is_empty() {
            continue;
        }
        if let Some(err) = check_segment(segment) {
            return Err(NamespaceError::InvalidPath(format!("{}: {}", err, path)));
        }
        components.push(segment.to_string());
    }
    Ok(components)
}

fn check_segment(segment: &str) -> Option<&'static str> {
    if segment == "." || segment == ".." {
        return Some("Relative components are not supported");
    }
    if segment.bytes().any(|b| b <= 0x1f || b == 0x7f) {
        return Some("Path segment contains control characters");
    }
    None
}

/// Check resolved components against limits.
pub fn validate(components: &[String], limits: &NamespaceLimits) -> Result<(), NamespaceError> {
    if components.len() > limits.max_path_depth {
        return Err(NamespaceError::InvalidPath(format!(
            "Path exceeds max depth ({}): {}",
            limits.max_path_depth,
            join(components)
        )));
    }
    if let Some(long) = components.iter().find(|c| c.len() > limits.max_name_length) {
        return Err(NamespaceError::InvalidPath(format!(
            "Path segment exceeds max name length ({}): {}",
            limits.max_name_length, long
        )));
    }
    // Each component contributes itself plus one separator.
    let length: usize = components.iter().map(|c| c.len() + 1).sum();
    if length > limits.max_path_length {
        return Err(NamespaceError::InvalidPath(format!(
            "Path exceeds max length ({})",
            limits.max_path_length
        )));
    }
    Ok(())
}

/// Canonical display form of resolved components.
pub fn join(components: &[String]) -> String {
    if components.is_empty() {
        return ROOT.to_string();
    }
    let mut out = String::with_capacity(components.iter().map(|c| c.len() + 1).sum());
    for c in components {
        out.push(SEPARATOR);
        out.push_str(c);
    }
    out
}

/// Append one component to an already canonical path.
pub fn join_child(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("{}{}", ROOT, name)
    } else {
        format!("{}{}{}", parent, SEPARATOR, name)
    }
}

/// Base name of resolved components; `"/"` for the root.
pub fn base_name(components: &[String]) -> &str {
    components.last().map(String::as_str).unwrap_or(ROOT)
}

// ── Tests ───────────────────────────────────────────────────────────────────
