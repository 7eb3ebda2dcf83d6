//! Local-to-remote path mapping.
//!
//! Remote paths always use `/` separators (even on Windows) to match the
//! destination server's convention.

use std::path::Path;

use oxfer_store::RemoteFileStore;

use crate::EngineError;

/// Maps an entry under `source_root` to its remote destination path.
///
/// Fails with [`EngineError::Path`] if `entry` is not under `source_root`.
pub fn map_entry(
    source_root: &Path,
    dest_root: &str,
    entry: &Path,
) -> Result<String, EngineError> {
    let rel = entry.strip_prefix(source_root).map_err(|_| {
        EngineError::Path(format!(
            "'{}' is not under source root '{}'",
            entry.display(),
            source_root.display()
        ))
    })?;
    let rel_str = rel.to_string_lossy().replace('\\', "/");
    Ok(join_remote(dest_root, &rel_str))
}

/// Joins a remote base path and a relative path with `/`.
pub fn join_remote(base: &str, rel: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if rel.is_empty() {
        return if trimmed.is_empty() && base.starts_with('/') {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
    }
    if trimmed.is_empty() {
        if base.starts_with('/') {
            format!("/{rel}")
        } else {
            rel.to_string()
        }
    } else {
        format!("{trimmed}/{rel}")
    }
}

/// Returns the parent of a remote path, if it has one.
pub fn remote_parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let (head, tail) = trimmed.rsplit_once('/')?;
    if tail.is_empty() {
        return None;
    }
    if head.is_empty() { Some("/") } else { Some(head) }
}

/// Resolves the remote path for a single-file source.
///
/// The directory-vs-file ambiguity is settled by asking the store, not by
/// guessing from the path string: if `dest_root` stats as a directory, the
/// source's base name is placed inside it; otherwise `dest_root` is the
/// literal remote file path. A trailing `/` is only consulted when the
/// destination does not exist yet. Blocking; call off the async runtime.
pub fn resolve_single_file(
    store: &dyn RemoteFileStore,
    source: &Path,
    dest_root: &str,
) -> Result<String, EngineError> {
    let name = source
        .file_name()
        .ok_or_else(|| {
            EngineError::Path(format!("'{}' has no file name", source.display()))
        })?
        .to_string_lossy()
        .replace('\\', "/");

    let dest_is_dir = match store.stat(dest_root) {
        Ok(stat) => stat.is_dir,
        Err(_) => dest_root.ends_with('/'),
    };

    if dest_is_dir {
        Ok(join_remote(dest_root, &name))
    } else {
        Ok(dest_root.trim_end_matches('/').to_string())
    }
}
