//! Path-safety validation shared by the daemon (reads) and client (writes).

use crate::error::Error;
use std::path::{Component, Path, PathBuf};

/// Screen a requested path down to a plain relative path: no NULs, no `..`,
/// no absolute or prefixed components, `.` segments dropped. This is the
/// cheap half of [`resolve_under_root`]; it does not touch the filesystem.
pub fn safe_relative(requested: &Path) -> Result<PathBuf, Error> {
    use Component::{CurDir, Normal, ParentDir, Prefix, RootDir};

    if requested.to_string_lossy().contains('\0') {
        return Err(Error::PathRejected("path contains NUL byte".into()));
    }

    let mut relative = PathBuf::new();
    for component in requested.components() {
        match component {
            CurDir => {}
            Normal(part) => relative.push(part),
            ParentDir => {
                return Err(Error::PathRejected(
                    "path contains parent-directory component".into(),
                ))
            }
            RootDir | Prefix(_) => {
                return Err(Error::PathRejected("path is absolute".into()));
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(Error::PathRejected("path is empty".into()));
    }
    Ok(relative)
}

/// Resolve a requested name to a path safely under `root`.
///
/// Rejects NUL bytes, parent-directory components, and absolute/prefixed
/// paths, then canonicalizes (following symlinks) and verifies the result
/// still lies under the canonical root. For a path that does not exist yet
/// the parent is canonicalized instead, so a new file can be created but a
/// symlinked escape route cannot.
pub fn resolve_under_root(root: &Path, requested: &Path) -> Result<PathBuf, Error> {
    let relative = safe_relative(requested)?;

    let canon_root = root
        .canonicalize()
        .map_err(|e| Error::PathRejected(format!("root {:?} not resolvable: {e}", root)))?;
    let joined = canon_root.join(&relative);

    // Existing target: canonicalize the whole path to chase symlinks.
    if let Ok(canon) = joined.canonicalize() {
        if !canon.starts_with(&canon_root) {
            return Err(Error::PathRejected(format!(
                "{:?} escapes the root via symlink",
                requested
            )));
        }
        return Ok(canon);
    }

    // New target: the parent must exist and resolve under the root.
    let parent = joined
        .parent()
        .ok_or_else(|| Error::PathRejected("path has no parent".into()))?;
    let canon_parent = parent
        .canonicalize()
        .map_err(|e| Error::PathRejected(format!("parent of {:?} not resolvable: {e}", requested)))?;
    if !canon_parent.starts_with(&canon_root) {
        return Err(Error::PathRejected(format!(
            "parent of {:?} escapes the root via symlink",
            requested
        )));
    }
    match joined.file_name() {
        Some(name) => Ok(canon_parent.join(name)),
        None => Err(Error::PathRejected("path has no file name".into())),
    }
}

/// Resolve a write destination under `root` for a path whose parent
/// directories may not exist yet.
///
/// Every ancestor component that already exists is canonicalized (chasing
/// symlinks) and checked against the root, so a symlinked directory inside
/// the destination cannot redirect the write outside it. Components that do
/// not exist yet cannot hide a symlink; the caller may create them after
/// this returns. A leaf that is itself a symlink is refused rather than
/// followed.
///
/// No directory is created here; this only validates and resolves.
pub fn resolve_for_write(root: &Path, requested: &Path) -> Result<PathBuf, Error> {
    let relative = safe_relative(requested)?;

    let canon_root = root
        .canonicalize()
        .map_err(|e| Error::PathRejected(format!("root {:?} not resolvable: {e}", root)))?;

    let mut resolved = canon_root.clone();
    let mut creating = false;
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            if creating {
                resolved.push(component.as_os_str());
                continue;
            }
            let next = resolved.join(component.as_os_str());
            match next.canonicalize() {
                Ok(canon) => {
                    if !canon.starts_with(&canon_root) {
                        return Err(Error::PathRejected(format!(
                            "{:?} escapes the root via symlink",
                            requested
                        )));
                    }
                    resolved = canon;
                }
                // First missing component: nothing below it exists, so the
                // rest of the path needs no symlink checks.
                Err(_) => {
                    creating = true;
                    resolved = next;
                }
            }
        }
    }

    let name = relative
        .file_name()
        .ok_or_else(|| Error::PathRejected("path has no file name".into()))?;
    let leaf = resolved.join(name);
    if let Ok(meta) = leaf.symlink_metadata() {
        if meta.file_type().is_symlink() {
            return Err(Error::PathRejected(format!(
                "{:?} is a symlink, refusing to follow it",
                requested
            )));
        }
    }
    Ok(leaf)
}
