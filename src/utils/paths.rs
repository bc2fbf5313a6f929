use std::io;
use std::path::{Component, Path, PathBuf};

/// `true` if `name` can be used as a single file or directory name.
pub fn is_valid_file_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    if name.contains('/') || name.contains('\0') {
        return false;
    }
    #[cfg(windows)]
    if name.contains(['\\', ':', '*', '?', '"', '<', '>', '|']) {
        return false;
    }
    true
}

/// Path of `path` relative to `root`, or just its file name when it is not below `root`.
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rest) => rest.to_path_buf(),
        Err(_) => path.file_name().map(PathBuf::from).unwrap_or_default(),
    }
}

/// Absolute form of `path` with symlinks and `..` resolved for the part that
/// exists. Missing trailing components are appended lexically.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for component in missing.iter().rev() {
                    match component {
                        Component::ParentDir => {
                            resolved.pop();
                        }
                        Component::CurDir => {}
                        other => resolved.push(other),
                    }
                }
                return Ok(resolved);
            }
            Err(e) => match (existing.parent(), existing.components().next_back()) {
                (Some(parent), Some(last)) => {
                    missing.push(last);
                    existing = parent;
                }
                _ => return Err(e),
            },
        }
    }
}

/// `other` spelled below `root` when its resolved form lies inside the resolved root.
pub fn nested_in(root: &Path, resolved_root: &Path, resolved_other: &Path) -> Option<PathBuf> {
    resolved_other
        .strip_prefix(resolved_root)
        .ok()
        .map(|rest| root.join(rest))
}
