//! Filesystem seam for the voucher walker.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Sockets, fifos, dangling links and the like. Never a voucher.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Directory listing as the voucher walker sees it.
#[async_trait]
pub trait VoucherFs: Send + Sync {
    /// List the direct children of `dir`. Symlinks are resolved, so a link
    /// to a directory reports [`EntryKind::Dir`].
    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;
}

/// The real filesystem, through `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

#[async_trait]
impl VoucherFs for RealFs {
    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let mut reader = tokio::fs::read_dir(dir).await?;
        let mut entries = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            let kind = match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => EntryKind::Dir,
                Ok(meta) if meta.is_file() => EntryKind::File,
                Ok(_) => EntryKind::Other,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    // Removed between listing and stat, or a dangling link.
                    debug!(path = %path.display(), "voucher entry vanished");
                    EntryKind::Other
                }
                Err(err) => return Err(err),
            };
            entries.push(DirEntry { path, kind });
        }

        Ok(entries)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Dir,
    File,
}

/// Voucher tree held in memory, for tests.
///
/// Paths are compared literally. Adding a path creates its missing parents.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFs {
    nodes: BTreeMap<PathBuf, Node>,
    denied: BTreeSet<PathBuf>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.add_parents(&path);
        self.nodes.insert(path, Node::Dir);
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.add_parents(&path);
        self.nodes.insert(path, Node::File);
    }

    /// Remove a path and everything below it.
    pub fn remove(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.nodes.retain(|node, _| !node.starts_with(path));
    }

    /// Make listing `path` fail with `PermissionDenied`.
    pub fn deny_read(&mut self, path: impl Into<PathBuf>) {
        self.denied.insert(path.into());
    }

    pub fn allow_read(&mut self, path: impl AsRef<Path>) {
        self.denied.remove(path.as_ref());
    }

    fn add_parents(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
        }
    }
}

#[async_trait]
impl VoucherFs for InMemoryFs {
    async fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        if self.denied.contains(dir) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is not readable", dir.display()),
            ));
        }
        match self.nodes.get(dir) {
            Some(Node::Dir) => {}
            Some(Node::File) => {
                return Err(io::Error::other(format!(
                    "{} is not a directory",
                    dir.display()
                )));
            }
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", dir.display()),
                ));
            }
        }

        Ok(self
            .nodes
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, node)| DirEntry {
                path: path.clone(),
                kind: match node {
                    Node::Dir => EntryKind::Dir,
                    Node::File => EntryKind::File,
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_only_direct_children() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/v/a");
        fs.add_file("/v/sub/b");

        let entries = fs.list_dir(Path::new("/v")).await.unwrap();

        assert_eq!(
            entries,
            vec![
                DirEntry {
                    path: PathBuf::from("/v/a"),
                    kind: EntryKind::File,
                },
                DirEntry {
                    path: PathBuf::from("/v/sub"),
                    kind: EntryKind::Dir,
                },
            ]
        );
    }

    #[tokio::test]
    async fn denied_and_missing_directories_fail() {
        let mut fs = InMemoryFs::new();
        fs.add_dir("/v");
        fs.deny_read("/v");

        let denied = fs.list_dir(Path::new("/v")).await.unwrap_err();
        assert_eq!(denied.kind(), io::ErrorKind::PermissionDenied);

        let missing = fs.list_dir(Path::new("/w")).await.unwrap_err();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn real_fs_reports_kinds() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("abc123"), b"v").unwrap();
        std::fs::create_dir(dir.path().join("batch")).unwrap();

        let mut entries = RealFs.list_dir(dir.path()).await.unwrap();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let kinds: Vec<_> = entries.iter().map(|entry| entry.kind).collect();
        assert_eq!(kinds, vec![EntryKind::File, EntryKind::Dir]);
    }
}
