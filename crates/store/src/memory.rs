//! In-memory store implementation.
//!
//! Used by engine tests and by the CLI's dry-run mode. Unlike a plain
//! hash map of paths, `create` insists that the parent directory was
//! materialized first, so ordering bugs in callers surface as errors.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use crate::{RemoteError, RemoteFileStore, RemoteStat};

/// Thread-safe in-memory [`RemoteFileStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    files: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a file's contents, if present.
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.files.get(&normalize(path)).cloned()
    }

    /// Returns `true` if the directory was materialized.
    pub fn dir_exists(&self, path: &str) -> bool {
        let path = normalize(path);
        if is_root(&path) {
            return true;
        }
        let inner = self.inner.lock().unwrap();
        inner.dirs.contains(&path)
    }

    /// Number of files stored.
    pub fn file_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.files.len()
    }
}

impl RemoteFileStore for MemoryStore {
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>, RemoteError> {
        let path = normalize(path);
        let inner = self.inner.lock().unwrap();
        let data = inner
            .files
            .get(&path)
            .cloned()
            .ok_or(RemoteError::NotFound(path))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn create(&self, path: &str) -> Result<Box<dyn Write + Send>, RemoteError> {
        let path = normalize(path);
        let mut inner = self.inner.lock().unwrap();
        if let Some(parent) = parent_of(&path)
            && !is_root(parent)
            && !inner.dirs.contains(parent)
        {
            return Err(RemoteError::NotFound(format!(
                "parent directory of '{path}' does not exist"
            )));
        }
        // Truncate semantics: the file exists (empty) as soon as create returns.
        inner.files.insert(path.clone(), Vec::new());
        Ok(Box::new(MemoryWriter {
            path,
            inner: Arc::clone(&self.inner),
        }))
    }

    fn mkdir_all(&self, path: &str) -> Result<(), RemoteError> {
        let path = normalize(path);
        if is_root(&path) {
            return Ok(());
        }
        let mut inner = self.inner.lock().unwrap();
        let mut acc = String::new();
        let absolute = path.starts_with('/');
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if acc.is_empty() {
                if absolute {
                    acc.push('/');
                }
            } else if !acc.ends_with('/') {
                acc.push('/');
            }
            acc.push_str(part);
            inner.dirs.insert(acc.clone());
        }
        Ok(())
    }

    fn stat(&self, path: &str) -> Result<RemoteStat, RemoteError> {
        let path = normalize(path);
        if is_root(&path) {
            return Ok(RemoteStat {
                size: 0,
                is_dir: true,
            });
        }
        let inner = self.inner.lock().unwrap();
        if let Some(data) = inner.files.get(&path) {
            return Ok(RemoteStat {
                size: data.len() as u64,
                is_dir: false,
            });
        }
        if inner.dirs.contains(&path) {
            return Ok(RemoteStat {
                size: 0,
                is_dir: true,
            });
        }
        Err(RemoteError::NotFound(path))
    }
}

struct MemoryWriter {
    path: String,
    inner: Arc<Mutex<Inner>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.files.entry(self.path.clone()).or_default();
        entry.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Strips trailing slashes; `/` and the empty path both denote the root.
fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        if path.starts_with('/') { "/" } else { "" }.to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_root(path: &str) -> bool {
    path.is_empty() || path == "/"
}

fn parent_of(path: &str) -> Option<&str> {
    let (head, _) = path.rsplit_once('/')?;
    if head.is_empty() { Some("/") } else { Some(head) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkdir_then_create_then_open() {
        let store = MemoryStore::new();
        store.mkdir_all("/data/sub").unwrap();
        assert!(store.dir_exists("/data"));
        assert!(store.dir_exists("/data/sub"));

        let mut w = store.create("/data/sub/file.bin").unwrap();
        w.write_all(b"hello").unwrap();
        drop(w);

        assert_eq!(store.contents("/data/sub/file.bin").unwrap(), b"hello");

        let mut r = store.open("/data/sub/file.bin").unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn create_without_parent_fails() {
        let store = MemoryStore::new();
        let result = store.create("/missing/file.bin");
        assert!(matches!(result, Err(RemoteError::NotFound(_))));
    }

    #[test]
    fn create_in_store_root_is_allowed() {
        let store = MemoryStore::new();
        store.create("top.bin").unwrap();
        store.create("/top.bin").unwrap();
    }

    #[test]
    fn create_truncates_existing_file() {
        let store = MemoryStore::new();
        let mut w = store.create("f").unwrap();
        w.write_all(b"old contents").unwrap();
        drop(w);

        let w = store.create("f").unwrap();
        drop(w);
        assert_eq!(store.contents("f").unwrap(), b"");
    }

    #[test]
    fn mkdir_all_is_idempotent() {
        let store = MemoryStore::new();
        store.mkdir_all("/a/b/c").unwrap();
        store.mkdir_all("/a/b/c").unwrap();
        store.mkdir_all("/a/b").unwrap();
        assert!(store.dir_exists("/a/b/c"));
    }

    #[test]
    fn stat_distinguishes_files_and_dirs() {
        let store = MemoryStore::new();
        store.mkdir_all("/d").unwrap();
        let mut w = store.create("/d/f").unwrap();
        w.write_all(b"xyz").unwrap();
        drop(w);

        let dir = store.stat("/d").unwrap();
        assert!(dir.is_dir);

        let file = store.stat("/d/f").unwrap();
        assert!(!file.is_dir);
        assert_eq!(file.size, 3);

        assert!(matches!(
            store.stat("/nope"),
            Err(RemoteError::NotFound(_))
        ));
    }

    #[test]
    fn root_always_exists() {
        let store = MemoryStore::new();
        assert!(store.stat("/").unwrap().is_dir);
        store.mkdir_all("/").unwrap();
        store.mkdir_all("").unwrap();
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let store = MemoryStore::new();
        store.mkdir_all("/data/").unwrap();
        assert!(store.dir_exists("/data"));
        assert!(store.stat("/data/").unwrap().is_dir);
    }

    #[test]
    fn open_missing_file_fails() {
        let store = MemoryStore::new();
        assert!(matches!(store.open("/gone"), Err(RemoteError::NotFound(_))));
    }
}
