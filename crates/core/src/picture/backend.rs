//! Storage backends for picture evidence.
//!
//! [`PictureBackend`] is the small set of filesystem primitives the evidence
//! store needs. Paths are full paths as produced by
//! [`PictureLayout`](super::layout::PictureLayout); backends never decide
//! where things live.
//!
//! - [`FsBackend`] talks to the real filesystem through `tokio::fs`.
//! - [`MemoryBackend`] keeps a directory tree in memory for tests.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::RwLock;

use crate::types::Timestamp;

/// Byte stream over a stored picture.
pub type PictureReader = Box<dyn AsyncRead + Send + Unpin>;

/// Metadata of an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub is_file: bool,
    pub size: u64,
    /// Creation time where the platform records it, else modification time.
    pub created: Timestamp,
}

/// Filesystem primitives used by the evidence store.
///
/// Listing a directory that does not exist yields an empty list; every other
/// failure is returned as-is for the caller to classify.
#[async_trait]
pub trait PictureBackend: Send + Sync {
    /// Create `dir` and any missing parents. Returns `true` when `dir` did not
    /// exist before the call.
    async fn create_dir_all(&self, dir: &Path) -> io::Result<bool>;

    /// Whether `path` exists and is a directory.
    async fn is_dir(&self, path: &Path) -> io::Result<bool>;

    /// Names of immediate subdirectories of `dir`, sorted.
    async fn list_dirs(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Names of regular files directly inside `dir`, sorted.
    async fn list_files(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Create `path` with `data`, failing with `AlreadyExists` if anything is
    /// already there. Existing files are never touched.
    async fn create_new(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Metadata for `path`, or `None` if nothing exists there.
    async fn metadata(&self, path: &Path) -> io::Result<Option<EntryMeta>>;

    /// Open a file for reading.
    async fn open(&self, path: &Path) -> io::Result<PictureReader>;

    /// Remove a single file. Fails with `NotFound` when absent.
    async fn remove_file(&self, path: &Path) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// Filesystem backend
// ---------------------------------------------------------------------------

/// Backend over the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBackend;

impl FsBackend {
    pub fn new() -> Self {
        Self
    }

    async fn list_children(dir: &Path, want_dirs: bool) -> io::Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if is_absent(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            // Follow symlinks; dangling ones are skipped.
            let meta = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(e) if is_absent(&e) => continue,
                Err(e) => return Err(e),
            };
            let wanted = if want_dirs { meta.is_dir() } else { meta.is_file() };
            if !wanted {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::debug!(dir = %dir.display(), name = ?raw, "Skipping non UTF-8 entry");
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl PictureBackend for FsBackend {
    async fn create_dir_all(&self, dir: &Path) -> io::Result<bool> {
        let existed = tokio::fs::try_exists(dir).await?;
        tokio::fs::create_dir_all(dir).await?;
        Ok(!existed)
    }

    async fn is_dir(&self, path: &Path) -> io::Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if is_absent(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_dirs(&self, dir: &Path) -> io::Result<Vec<String>> {
        Self::list_children(dir, true).await
    }

    async fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        Self::list_children(dir, false).await
    }

    async fn create_new(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;

        let written = async {
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial picture file");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn metadata(&self, path: &Path) -> io::Result<Option<EntryMeta>> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if is_absent(&e) => return Ok(None),
            Err(e) => return Err(e),
        };
        let created = meta.created().or_else(|_| meta.modified())?;
        Ok(Some(EntryMeta {
            is_file: meta.is_file(),
            size: meta.len(),
            created: Timestamp::from(created),
        }))
    }

    async fn open(&self, path: &Path) -> io::Result<PictureReader> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Err(e) if is_absent(&e) => Err(io::Error::new(io::ErrorKind::NotFound, e)),
            other => other,
        }
    }
}

/// Nothing exists at the path, including when a parent component is a file.
fn is_absent(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File { data: Vec<u8>, created: Timestamp },
}

/// In-memory directory tree with the same semantics as [`FsBackend`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes of a stored file, for assertions.
    pub async fn read(&self, path: &Path) -> Option<Vec<u8>> {
        match self.nodes.read().await.get(path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    async fn list_children(&self, dir: &Path, want_dirs: bool) -> Vec<String> {
        let nodes = self.nodes.read().await;
        let mut names: Vec<String> = nodes
            .iter()
            .filter(|(path, node)| {
                path.parent() == Some(dir) && matches!(node, Node::Dir) == want_dirs
            })
            .filter_map(|(path, _)| path.file_name()?.to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

fn not_a_directory(path: &Path) -> io::Error {
    io::Error::other(format!("{} is not a directory", path.display()))
}

#[async_trait]
impl PictureBackend for MemoryBackend {
    async fn create_dir_all(&self, dir: &Path) -> io::Result<bool> {
        let mut nodes = self.nodes.write().await;
        let created = !nodes.contains_key(dir);
        for ancestor in dir.ancestors().filter(|a| !a.as_os_str().is_empty()) {
            match nodes.get(ancestor) {
                Some(Node::Dir) => {}
                Some(Node::File { .. }) => return Err(not_a_directory(ancestor)),
                None => {
                    nodes.insert(ancestor.to_path_buf(), Node::Dir);
                }
            }
        }
        Ok(created)
    }

    async fn is_dir(&self, path: &Path) -> io::Result<bool> {
        Ok(matches!(self.nodes.read().await.get(path), Some(Node::Dir)))
    }

    async fn list_dirs(&self, dir: &Path) -> io::Result<Vec<String>> {
        Ok(self.list_children(dir, true).await)
    }

    async fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        Ok(self.list_children(dir, false).await)
    }

    async fn create_new(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        match path.parent().map(|p| nodes.get(p)) {
            Some(Some(Node::Dir)) => {}
            Some(Some(Node::File { .. })) => {
                return Err(not_a_directory(path.parent().unwrap_or(path)))
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("parent of {} does not exist", path.display()),
                ))
            }
        }
        nodes.insert(
            path.to_path_buf(),
            Node::File {
                data: data.to_vec(),
                created: Utc::now(),
            },
        );
        Ok(())
    }

    async fn metadata(&self, path: &Path) -> io::Result<Option<EntryMeta>> {
        Ok(self.nodes.read().await.get(path).map(|node| match node {
            Node::Dir => EntryMeta {
                is_file: false,
                size: 0,
                created: Timestamp::default(),
            },
            Node::File { data, created } => EntryMeta {
                is_file: true,
                size: data.len() as u64,
                created: *created,
            },
        }))
    }

    async fn open(&self, path: &Path) -> io::Result<PictureReader> {
        match self.nodes.read().await.get(path) {
            Some(Node::File { data, .. }) => Ok(Box::new(io::Cursor::new(data.clone()))),
            Some(Node::Dir) => Err(io::Error::other(format!(
                "{} is a directory",
                path.display()
            ))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )),
        }
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.write().await;
        match nodes.get(path) {
            Some(Node::File { .. }) => {
                nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(io::Error::other(format!(
                "{} is a directory",
                path.display()
            ))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
