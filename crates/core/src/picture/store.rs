//! The evidence store: upload, lookup, listing and deletion of pictures.
//!
//! Every operation walks the *candidate search space*, the type directories
//! (all four unless one is pinned) crossed with their date directories (all
//! present unless one is pinned). Types are visited in [`PictureType::ALL`]
//! order; dates and filenames in lexical order. Filenames are decoded with
//! [`naming::decode`] and filtered in memory. Nothing is cached between calls.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use super::backend::{PictureBackend, PictureReader};
use super::layout::{storage_error, PictureLayout};
use super::{
    image_url, naming, validate_extension, validate_filename,
    validate_ticket_number, EvidenceRecord, PictureKey, PictureType,
};
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Where pictures live. Threaded into [`EvidenceStore::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureConfig {
    pub base_path: PathBuf,
}

impl PictureConfig {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// A picture to store. `date` defaults to today on the local clock.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub ticket_number: String,
    pub picture_type: PictureType,
    pub camera_number: u32,
    pub sequence: u32,
    pub date: Option<NaiveDate>,
    /// `""` or `.`-prefixed, appended to the encoded stem as-is.
    pub extension: String,
    pub payload: Vec<u8>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub filename: String,
    pub file_path: String,
    pub picture_type: PictureType,
    pub date: NaiveDate,
    /// Whether the date directory was created by this upload.
    pub folder_created: bool,
}

/// Exact-match filters for [`EvidenceStore::list`]. `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub ticket_number: Option<String>,
    pub date: Option<NaiveDate>,
    pub picture_type: Option<PictureType>,
    pub camera_number: Option<u32>,
    pub sequence: Option<u32>,
}

impl ListFilter {
    fn matches(&self, key: &PictureKey) -> bool {
        self.ticket_number
            .as_deref()
            .is_none_or(|t| t == key.ticket_number)
            && self.camera_number.is_none_or(|c| c == key.camera_number)
            && self.sequence.is_none_or(|s| s == key.sequence)
    }
}

/// Per-type entry of [`FolderReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeFolder {
    pub full_name: &'static str,
    pub path: String,
    pub exists: bool,
    /// Date directory names, newest first.
    pub dates: Vec<String>,
}

/// Snapshot of the directory tree, as returned by
/// [`EvidenceStore::describe_folders`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderReport {
    pub base_path: String,
    pub folders: BTreeMap<PictureType, TypeFolder>,
}

/// An opened picture ready to be streamed.
pub struct EvidenceContent {
    pub filename: String,
    pub size: u64,
    pub reader: PictureReader,
}

impl fmt::Debug for EvidenceContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidenceContent")
            .field("filename", &self.filename)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Picture evidence store over an injectable [`PictureBackend`].
///
/// Cheap to clone; holds no mutable state of its own.
#[derive(Clone)]
pub struct EvidenceStore {
    layout: PictureLayout,
    backend: Arc<dyn PictureBackend>,
}

impl fmt::Debug for EvidenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidenceStore")
            .field("root", &self.layout.root())
            .finish_non_exhaustive()
    }
}

impl EvidenceStore {
    pub fn new(config: &PictureConfig, backend: Arc<dyn PictureBackend>) -> Self {
        Self {
            layout: PictureLayout::new(config.base_path.clone()),
            backend,
        }
    }

    pub fn layout(&self) -> &PictureLayout {
        &self.layout
    }

    /// Whether the configured root exists as a directory.
    pub async fn is_available(&self) -> bool {
        matches!(self.backend.is_dir(self.layout.root()).await, Ok(true))
    }

    // -- Upload ------------------------------------------------------------

    /// Store a new picture. Never overwrites: an existing file with the same
    /// name yields [`CoreError::DuplicateEvidence`].
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome, CoreError> {
        validate_ticket_number(&request.ticket_number)?;
        if request.camera_number < 1 {
            return Err(CoreError::Validation("camera_number must be >= 1".into()));
        }
        if request.sequence < 1 {
            return Err(CoreError::Validation("sequence must be >= 1".into()));
        }
        validate_extension(&request.extension)?;

        let key = PictureKey::new(
            request.ticket_number.clone(),
            request.camera_number,
            request.sequence,
        );
        let filename = naming::filename_for(&key, &request.extension);
        // A name that does not decode back to its key would be stored but
        // never found again.
        if naming::decode(&filename).as_ref() != Some(&key) {
            return Err(CoreError::Validation(format!(
                "ticket_number '{}' cannot be stored with extension '{}'",
                request.ticket_number, request.extension
            )));
        }

        let date = request
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let (dir, folder_created) = self
            .layout
            .ensure_directory(self.backend.as_ref(), request.picture_type, date)
            .await?;
        let path = dir.join(&filename);

        match self.backend.create_new(&path, &request.payload).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::info!(
                    picture_type = %request.picture_type,
                    date = %date,
                    filename = %filename,
                    "Rejected duplicate picture upload",
                );
                return Err(CoreError::DuplicateEvidence { filename });
            }
            Err(e) => return Err(storage_error(&path, e)),
        }

        tracing::info!(
            picture_type = %request.picture_type,
            date = %date,
            filename = %filename,
            size = request.payload.len(),
            folder_created,
            "Picture stored",
        );

        Ok(UploadOutcome {
            filename,
            file_path: path.display().to_string(),
            picture_type: request.picture_type,
            date,
            folder_created,
        })
    }

    // -- Lookup ------------------------------------------------------------

    /// First picture with exactly this key, or `None`.
    ///
    /// If the same key exists under several dates or types, the first one in
    /// enumeration order wins.
    pub async fn find_one(
        &self,
        key: &PictureKey,
        date: Option<NaiveDate>,
        picture_type: Option<PictureType>,
    ) -> Result<Option<EvidenceRecord>, CoreError> {
        let filter = ListFilter {
            ticket_number: Some(key.ticket_number.clone()),
            date,
            picture_type,
            camera_number: Some(key.camera_number),
            sequence: Some(key.sequence),
        };
        let mut found = self.scan(&filter, Some(1)).await?;
        Ok(found.pop())
    }

    /// All pictures matching `filter`, sorted by `(date, filename)`.
    ///
    /// With a `limit`, the walk stops after that many matches in enumeration
    /// order; sorting happens afterwards.
    pub async fn list(
        &self,
        filter: &ListFilter,
        limit: Option<usize>,
    ) -> Result<Vec<EvidenceRecord>, CoreError> {
        let mut records = self.scan(filter, limit).await?;
        records.sort_by(|a, b| (a.date, &a.filename).cmp(&(b.date, &b.filename)));
        tracing::debug!(count = records.len(), ?filter, ?limit, "Listed pictures");
        Ok(records)
    }

    // -- Delete ------------------------------------------------------------

    /// Remove the file at `stored_path`. The path must lie under the
    /// configured root; directories are left in place.
    pub async fn delete(&self, stored_path: &str) -> Result<(), CoreError> {
        let path = self.layout.contain(Path::new(stored_path))?;

        match self.backend.metadata(&path).await {
            Ok(Some(meta)) if meta.is_file => {}
            Ok(Some(_)) => {
                return Err(CoreError::Validation(format!(
                    "{stored_path} is not a file"
                )))
            }
            Ok(None) => return Err(CoreError::NotFound(format!("File {stored_path}"))),
            Err(e) => return Err(storage_error(&path, e)),
        }

        match self.backend.remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CoreError::NotFound(format!("File {stored_path}")));
            }
            Err(e) => return Err(storage_error(&path, e)),
        }

        tracing::info!(path = %path.display(), "Picture deleted");
        Ok(())
    }

    // -- Folder report -----------------------------------------------------

    /// Existence and date directories (newest first) of every type.
    pub async fn describe_folders(&self) -> Result<FolderReport, CoreError> {
        let mut folders = BTreeMap::new();
        for picture_type in PictureType::ALL {
            let path = self.layout.type_directory(picture_type);
            let exists = self
                .backend
                .is_dir(&path)
                .await
                .map_err(|e| storage_error(&path, e))?;
            let mut dates = if exists {
                self.layout
                    .list_date_directories(self.backend.as_ref(), picture_type)
                    .await?
            } else {
                Vec::new()
            };
            dates.reverse();
            folders.insert(
                picture_type,
                TypeFolder {
                    full_name: picture_type.full_name(),
                    path: path.display().to_string(),
                    exists,
                    dates,
                },
            );
        }
        Ok(FolderReport {
            base_path: self.layout.root().display().to_string(),
            folders,
        })
    }

    // -- Content -----------------------------------------------------------

    /// Open a picture by its exact location.
    ///
    /// Names that do not follow the filename convention are treated as
    /// absent.
    pub async fn open_by_path(
        &self,
        picture_type: PictureType,
        date: NaiveDate,
        filename: &str,
    ) -> Result<EvidenceContent, CoreError> {
        validate_filename(filename)?;
        if naming::decode(filename).is_none() {
            return Err(CoreError::NotFound(format!("File {filename}")));
        }
        let path = self.layout.stored_path(picture_type, date, filename);
        self.open(&path, filename).await
    }

    /// Open the first picture with exactly this key.
    pub async fn open_by_key(
        &self,
        key: &PictureKey,
        date: Option<NaiveDate>,
        picture_type: Option<PictureType>,
    ) -> Result<EvidenceContent, CoreError> {
        let record = self
            .find_one(key, date, picture_type)
            .await?
            .ok_or_else(|| not_found_for_key(key))?;
        self.open(Path::new(&record.file_path), &record.filename).await
    }

    async fn open(&self, path: &Path, filename: &str) -> Result<EvidenceContent, CoreError> {
        let meta = self
            .backend
            .metadata(path)
            .await
            .map_err(|e| storage_error(path, e))?
            .ok_or_else(|| CoreError::NotFound(format!("File {filename}")))?;
        if !meta.is_file {
            return Err(CoreError::Validation(format!("{filename} is not a file")));
        }
        let reader = match self.backend.open(path).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CoreError::NotFound(format!("File {filename}")));
            }
            Err(e) => return Err(storage_error(path, e)),
        };
        Ok(EvidenceContent {
            filename: filename.to_string(),
            size: meta.size,
            reader,
        })
    }

    // -- Scan --------------------------------------------------------------

    /// Walk the candidate search space collecting matches, stopping at
    /// `limit`.
    async fn scan(
        &self,
        filter: &ListFilter,
        limit: Option<usize>,
    ) -> Result<Vec<EvidenceRecord>, CoreError> {
        let mut records = Vec::new();
        if limit == Some(0) {
            return Ok(records);
        }

        let types = match filter.picture_type {
            Some(t) => vec![t],
            None => PictureType::ALL.to_vec(),
        };

        for picture_type in types {
            for date in self.candidate_dates(picture_type, filter.date).await? {
                let dir = self.layout.directory_for(picture_type, date);
                let filenames = self
                    .backend
                    .list_files(&dir)
                    .await
                    .map_err(|e| storage_error(&dir, e))?;

                for filename in filenames {
                    let Some(key) = naming::decode(&filename) else {
                        continue;
                    };
                    if !filter.matches(&key) {
                        continue;
                    }
                    let Some(record) = self.record(picture_type, date, &dir, filename, key).await?
                    else {
                        continue;
                    };
                    records.push(record);
                    if limit.is_some_and(|l| records.len() >= l) {
                        return Ok(records);
                    }
                }
            }
        }
        Ok(records)
    }

    /// Date directories to visit for one type.
    async fn candidate_dates(
        &self,
        picture_type: PictureType,
        pinned: Option<NaiveDate>,
    ) -> Result<Vec<NaiveDate>, CoreError> {
        if let Some(date) = pinned {
            let dir = self.layout.directory_for(picture_type, date);
            let present = self
                .backend
                .is_dir(&dir)
                .await
                .map_err(|e| storage_error(&dir, e))?;
            return Ok(if present { vec![date] } else { Vec::new() });
        }

        let names = self
            .layout
            .list_date_directories(self.backend.as_ref(), picture_type)
            .await?;
        Ok(names
            .into_iter()
            .filter_map(|name| match NaiveDate::parse_from_str(&name, super::DATE_FORMAT) {
                Ok(date) => Some(date),
                Err(_) => {
                    tracing::warn!(picture_type = %picture_type, dir = %name, "Skipping date directory that is not a calendar date");
                    None
                }
            })
            .collect())
    }

    /// Build a record for a decoded file. `None` if the file vanished
    /// between listing and stat.
    async fn record(
        &self,
        picture_type: PictureType,
        date: NaiveDate,
        dir: &Path,
        filename: String,
        key: PictureKey,
    ) -> Result<Option<EvidenceRecord>, CoreError> {
        let path = dir.join(&filename);
        let meta = match self.backend.metadata(&path).await {
            Ok(Some(meta)) if meta.is_file => meta,
            Ok(_) => return Ok(None),
            Err(e) => return Err(storage_error(&path, e)),
        };
        Ok(Some(EvidenceRecord {
            image_url: image_url(picture_type, date, &filename),
            file_path: path.display().to_string(),
            filename,
            ticket_number: key.ticket_number,
            picture_type,
            camera_number: key.camera_number,
            sequence: key.sequence,
            date,
            file_size: meta.size,
            created_time: meta.created,
        }))
    }
}

/// The `NotFound` error reported when no picture matches `key`.
pub fn not_found_for_key(key: &PictureKey) -> CoreError {
    CoreError::NotFound(format!(
        "Picture for ticket {}, camera {}, sequence {}",
        key.ticket_number, key.camera_number, key.sequence
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
