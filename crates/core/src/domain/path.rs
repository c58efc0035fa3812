// Hierarchical namespace paths
//
// Paths are absolute, '/'-separated, without trailing separator (except the
// root "/" itself) and without empty, "." or ".." segments.

use super::error::{DomainError, Result};

pub const SEPARATOR: char = '/';
pub const ROOT: &str = "/";

/// Validate a node path.
///
/// `is_sequential` allows a trailing separator, since the service appends
/// the sequence suffix to the last segment.
pub fn validate_path(path: &str, is_sequential: bool) -> Result<()> {
    let invalid = |reason: &str| DomainError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.is_empty() {
        return Err(invalid("path length must be > 0"));
    }
    if !path.starts_with(SEPARATOR) {
        return Err(invalid("path must start with / character"));
    }
    if path.len() == 1 {
        return Ok(());
    }
    if path.ends_with(SEPARATOR) && !is_sequential {
        return Err(invalid("path must not end with / character"));
    }

    let body = if is_sequential {
        path.strip_suffix(SEPARATOR).unwrap_or(path)
    } else {
        path
    };

    for segment in body[1..].split(SEPARATOR) {
        match segment {
            "" => return Err(invalid("empty node name specified")),
            "." | ".." => return Err(invalid("relative paths not allowed")),
            _ => {}
        }
        if let Some(c) = segment.chars().find(|c| is_forbidden_char(*c)) {
            return Err(invalid(&format!("invalid character {:?}", c)));
        }
    }

    Ok(())
}

pub fn is_valid_path(path: &str, is_sequential: bool) -> bool {
    validate_path(path, is_sequential).is_ok()
}

fn is_forbidden_char(c: char) -> bool {
    matches!(c,
        '\u{0000}'..='\u{001f}'
        | '\u{007f}'..='\u{009f}'
        | '\u{e000}'..='\u{f8ff}'
        | '\u{fff0}'..='\u{ffff}')
}

/// Last segment of a path. The root path is its own end.
pub fn path_end(path: &str) -> &str {
    if path == ROOT {
        return path;
    }
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}

/// Parent of an absolute path, `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind(SEPARATOR) {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

pub fn join(parent: &str, child: &str) -> String {
    if parent == ROOT {
        format!("{}{}", ROOT, child)
    } else {
        format!("{}{}{}", parent, SEPARATOR, child)
    }
}

/// Every proper ancestor of `path`, shallowest first, excluding "/".
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = parent(path);
    while let Some(p) = current {
        if p == ROOT {
            break;
        }
        out.push(p);
        current = parent(p);
    }
    out.reverse();
    out
}
