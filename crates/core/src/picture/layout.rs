//! Directory layout of the picture store.
//!
//! `{root}/{TYPE}/{YYYY-MM-DD}/` is the only place pictures of a given type
//! and date are read from or written to.

use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;

use super::backend::PictureBackend;
use super::{format_date, PictureType};
use crate::error::CoreError;

/// Whether `name` looks like a date directory (`DDDD-DD-DD`).
///
/// Only the shape is checked; `2025-13-45` passes.
pub fn is_date_directory_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Maps `(picture_type, date)` to directories under a configured root.
#[derive(Debug, Clone)]
pub struct PictureLayout {
    root: PathBuf,
}

impl PictureLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{TYPE}`
    pub fn type_directory(&self, picture_type: PictureType) -> PathBuf {
        self.root.join(picture_type.code())
    }

    /// `{root}/{TYPE}/{YYYY-MM-DD}`. Does not touch the filesystem.
    pub fn directory_for(&self, picture_type: PictureType, date: NaiveDate) -> PathBuf {
        self.type_directory(picture_type).join(format_date(date))
    }

    /// Full stored path of a picture file.
    pub fn stored_path(&self, picture_type: PictureType, date: NaiveDate, filename: &str) -> PathBuf {
        self.directory_for(picture_type, date).join(filename)
    }

    /// Create the directory for `(picture_type, date)` if needed.
    ///
    /// Returns the directory and whether it was created by this call.
    pub async fn ensure_directory(
        &self,
        backend: &dyn PictureBackend,
        picture_type: PictureType,
        date: NaiveDate,
    ) -> Result<(PathBuf, bool), CoreError> {
        let dir = self.directory_for(picture_type, date);
        let created = backend.create_dir_all(&dir).await.map_err(|e| {
            CoreError::Storage(format!("Cannot create directory {}: {e}", dir.display()))
        })?;
        if created {
            tracing::info!(dir = %dir.display(), "Created picture directory");
        }
        Ok((dir, created))
    }

    /// Recognized type directories present under the root, in type order.
    pub async fn list_type_directories(
        &self,
        backend: &dyn PictureBackend,
    ) -> Result<Vec<PictureType>, CoreError> {
        let names = backend
            .list_dirs(&self.root)
            .await
            .map_err(|e| storage_error(&self.root, e))?;
        Ok(PictureType::ALL
            .into_iter()
            .filter(|t| names.iter().any(|n| n == t.code()))
            .collect())
    }

    /// Date-shaped subdirectory names of a type directory, sorted ascending.
    pub async fn list_date_directories(
        &self,
        backend: &dyn PictureBackend,
        picture_type: PictureType,
    ) -> Result<Vec<String>, CoreError> {
        let dir = self.type_directory(picture_type);
        let mut names = backend
            .list_dirs(&dir)
            .await
            .map_err(|e| storage_error(&dir, e))?;
        names.retain(|n| is_date_directory_name(n));
        names.sort();
        Ok(names)
    }

    /// Check that `candidate` lies lexically under the root.
    ///
    /// The part after the root must consist of plain names only: no `..`,
    /// no `.`, and not the root itself. Nothing is resolved on disk.
    pub fn contain(&self, candidate: &Path) -> Result<PathBuf, CoreError> {
        let invalid = || {
            CoreError::InvalidPath(format!(
                "{} is not inside the picture directory",
                candidate.display()
            ))
        };
        let relative = candidate.strip_prefix(&self.root).map_err(|_| invalid())?;
        let mut components = relative.components().peekable();
        if components.peek().is_none() {
            return Err(invalid());
        }
        if !components.all(|c| matches!(c, Component::Normal(_))) {
            return Err(invalid());
        }
        Ok(candidate.to_path_buf())
    }
}

pub(crate) fn storage_error(path: &Path, err: std::io::Error) -> CoreError {
    CoreError::Storage(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::picture::backend::MemoryBackend;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn date_directory_shape() {
        assert!(is_date_directory_name("2025-08-17"));
        assert!(is_date_directory_name("2025-13-45"));
        assert!(!is_date_directory_name("2025-8-17"));
        assert!(!is_date_directory_name("2025-08-17-old"));
        assert!(!is_date_directory_name("2025_08_17"));
        assert!(!is_date_directory_name("２０２５-08-17"));
    }

    #[test]
    fn directory_for_joins_type_and_date() {
        let layout = PictureLayout::new("/data/Picture");
        assert_eq!(
            layout.directory_for(PictureType::Import, date("2025-08-17")),
            PathBuf::from("/data/Picture/NK/2025-08-17")
        );
        assert_eq!(
            layout.stored_path(PictureType::Export, date("2025-01-02"), "5-CMR1_1.png"),
            PathBuf::from("/data/Picture/XK/2025-01-02/5-CMR1_1.png")
        );
    }

    #[tokio::test]
    async fn ensure_directory_reports_creation() {
        let backend = MemoryBackend::new();
        let layout = PictureLayout::new("/data/Picture");

        let (dir, created) = layout
            .ensure_directory(&backend, PictureType::Import, date("2025-08-17"))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(dir, PathBuf::from("/data/Picture/NK/2025-08-17"));

        let (_, created) = layout
            .ensure_directory(&backend, PictureType::Import, date("2025-08-17"))
            .await
            .unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn listing_filters_unrecognized_names() {
        let backend = MemoryBackend::new();
        let layout = PictureLayout::new("/p");
        for dir in ["/p/NK/2025-08-17", "/p/NK/2025-08-16", "/p/NK/misc", "/p/ZZ/2025-08-17", "/p/XK"] {
            backend.create_dir_all(Path::new(dir)).await.unwrap();
        }

        assert_eq!(
            layout.list_type_directories(&backend).await.unwrap(),
            vec![PictureType::Import, PictureType::Export]
        );
        assert_eq!(
            layout.list_date_directories(&backend, PictureType::Import).await.unwrap(),
            vec!["2025-08-16".to_string(), "2025-08-17".to_string()]
        );
        assert!(layout
            .list_date_directories(&backend, PictureType::ShipImport)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn contain_accepts_paths_under_root() {
        let layout = PictureLayout::new("/data/Picture");
        assert!(layout.contain(Path::new("/data/Picture/NK/2025-08-17/5-CMR1_1.png")).is_ok());
    }

    #[test]
    fn contain_rejects_escapes() {
        let layout = PictureLayout::new("/data/Picture");
        for bad in [
            "../../etc/passwd",
            "/etc/passwd",
            "/data/Picture/../secret.txt",
            "/data/Picture/NK/../../secret.txt",
            "/data/PictureX/NK/a.png",
            "/data/Picture",
            "/data/Picture/",
            "relative/NK/a.png",
        ] {
            assert_matches!(
                layout.contain(Path::new(bad)),
                Err(CoreError::InvalidPath(_)),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn contain_works_with_relative_root() {
        let layout = PictureLayout::new("pictures");
        assert!(layout.contain(Path::new("pictures/CT/2025-08-17/a-CMR1_1.jpg")).is_ok());
        assert_matches!(
            layout.contain(Path::new("pictures/../Cargo.toml")),
            Err(CoreError::InvalidPath(_))
        );
    }
}
