//! Lexical path handling.
//!
//! Everything in this module works on strings without touching the
//! filesystem: no symlink resolution, no existence checks. Paths are
//! rendered with forward slashes regardless of platform.

/// Why a path could not be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    ContainsNul,
    AbsoluteNotAllowed,
    EscapesRoot,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            PathError::ContainsNul => "path contains NUL byte",
            PathError::AbsoluteNotAllowed => "absolute path not allowed",
            PathError::EscapesRoot => "path escapes root",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for PathError {}

/// Convert backslashes to forward slashes.
pub fn to_portable_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Check whether a path is absolute (POSIX leading `/`, Windows drive
/// letter, or Windows backslash root).
pub fn is_absolute_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    if bytes.first() == Some(&b'/') || bytes.first() == Some(&b'\\') {
        return true;
    }
    // Windows drive letter: "C:" optionally followed by a separator
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return true;
    }
    false
}

/// Split a path into its absolute prefix (`"/"`, `"C:/"`, or `""` for a
/// relative path) and lexically-normalized components. `.` segments are
/// dropped and `..` pops where possible.
fn lexical_components(path: &str) -> (String, Vec<String>) {
    let portable = to_portable_path(path);

    let (prefix, rest) = if let Some(stripped) = portable.strip_prefix('/') {
        ("/".to_string(), stripped.to_string())
    } else if portable.len() >= 2
        && portable.as_bytes()[0].is_ascii_alphabetic()
        && portable.as_bytes()[1] == b':'
    {
        let drive = format!("{}/", &portable[..2]);
        (drive, portable[2..].trim_start_matches('/').to_string())
    } else {
        (String::new(), portable)
    };

    let mut components: Vec<String> = Vec::new();
    for part in rest.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            if components.last().map(|c| c != "..").unwrap_or(false) {
                components.pop();
            } else if prefix.is_empty() {
                // Relative path climbing above its own start; keep the
                // segment so containment checks can reject it.
                components.push(part.to_string());
            }
            // ".." at the root of an absolute path is a no-op.
            continue;
        }
        components.push(part.to_string());
    }

    (prefix, components)
}

fn render(prefix: &str, components: &[String]) -> String {
    if components.is_empty() {
        if prefix.is_empty() {
            return ".".to_string();
        }
        return prefix.trim_end_matches('/').to_string() + "/";
    }
    format!("{}{}", prefix, components.join("/"))
}

/// Resolve `candidate` against `root` without filesystem access.
///
/// Rejects NUL bytes anywhere, absolute candidates unless `allow_absolute`
/// (in which case the candidate is re-rooted under `root`), and any `..`
/// sequence that would climb above `root`.
pub fn normalize_under_root(
    root: &str,
    candidate: &str,
    allow_absolute: bool,
) -> Result<String, PathError> {
    if root.contains('\0') || candidate.contains('\0') {
        return Err(PathError::ContainsNul);
    }

    let candidate = if is_absolute_path(candidate) {
        if !allow_absolute {
            return Err(PathError::AbsoluteNotAllowed);
        }
        // Strip the absolute prefix and treat the remainder as relative.
        let portable = to_portable_path(candidate);
        let trimmed = portable.trim_start_matches(['/']);
        let trimmed = if trimmed.len() >= 2
            && trimmed.as_bytes()[0].is_ascii_alphabetic()
            && trimmed.as_bytes()[1] == b':'
        {
            trimmed[2..].trim_start_matches('/')
        } else {
            trimmed
        };
        trimmed.to_string()
    } else {
        candidate.to_string()
    };

    let mut segments: Vec<String> = Vec::new();
    for part in to_portable_path(&candidate).split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            if segments.pop().is_none() {
                return Err(PathError::EscapesRoot);
            }
            continue;
        }
        segments.push(part.to_string());
    }

    let (prefix, mut components) = lexical_components(root);
    components.extend(segments);
    let out = render(&prefix, &components);

    if !is_path_under_root(root, &out) {
        return Err(PathError::EscapesRoot);
    }

    Ok(out)
}

/// Lexical containment: `path` is under `root` when the normalized
/// components of `root` are a prefix of those of `path` (equality counts).
pub fn is_path_under_root(root: &str, path: &str) -> bool {
    let (root_prefix, root_components) = lexical_components(root);
    let (path_prefix, path_components) = lexical_components(path);

    if root_prefix != path_prefix {
        return false;
    }
    if root_components.len() > path_components.len() {
        return false;
    }
    root_components
        .iter()
        .zip(path_components.iter())
        .all(|(a, b)| a == b)
}
