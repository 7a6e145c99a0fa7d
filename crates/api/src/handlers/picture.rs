//! Handlers for the `/picture` resource.
//!
//! Pictures are addressed by `(ticket_number, camera_number, sequence)` and
//! optionally pinned to a type and date, or by their exact
//! `{picture_type}/{date}/{filename}` location.

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use weighbridge_core::error::CoreError;
use weighbridge_core::picture::naming;
use weighbridge_core::picture::store::{
    self, EvidenceContent, FolderReport, ListFilter, UploadOutcome, UploadRequest,
};
use weighbridge_core::picture::{self, EvidenceRecord, PictureKey};

use crate::error::{AppError, AppResult};
use crate::query;
use crate::response::DataResponse;
use crate::state::AppState;

/// Browsers may cache evidence for a day; stored pictures never change.
const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=86400";

// ---------------------------------------------------------------------------
// Query / path types
// ---------------------------------------------------------------------------

/// Query parameters for `POST /picture/upload`.
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub ticket_number: Option<String>,
    pub picture_type: Option<String>,
    pub camera_number: Option<String>,
    /// Defaults to `1`.
    pub sequence: Option<String>,
    /// Defaults to today.
    pub date: Option<String>,
}

/// Query parameters for `GET /picture/list`. Every field is an exact filter.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub ticket_number: Option<String>,
    pub date: Option<String>,
    pub picture_type: Option<String>,
    pub camera_number: Option<String>,
    pub sequence: Option<String>,
    pub limit: Option<String>,
}

/// Query parameters identifying one picture by key
/// (`GET /picture/get`, `GET /picture/image`).
#[derive(Debug, Deserialize)]
pub struct KeyParams {
    pub ticket_number: Option<String>,
    pub camera_number: Option<String>,
    pub sequence: Option<String>,
    pub date: Option<String>,
    pub picture_type: Option<String>,
}

/// Query parameters for `DELETE /picture/delete`.
#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub file_path: Option<String>,
}

/// A key lookup after validation.
struct KeyLookup {
    key: PictureKey,
    date: Option<chrono::NaiveDate>,
    picture_type: Option<picture::PictureType>,
}

impl KeyParams {
    fn parse(&self) -> Result<KeyLookup, CoreError> {
        let ticket_number = query::required_text("ticket_number", self.ticket_number.as_deref())?;
        let camera_number =
            query::required_positive("camera_number", self.camera_number.as_deref())?;
        let sequence = query::required_positive("sequence", self.sequence.as_deref())?;
        Ok(KeyLookup {
            key: PictureKey::new(ticket_number, camera_number, sequence),
            date: query::optional_date(self.date.as_deref())?,
            picture_type: query::optional_picture_type(self.picture_type.as_deref())?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a filename extension to its MIME type.
pub fn content_type_for_extension(filename: &str) -> &'static str {
    let ext = naming::split_extension(filename)
        .1
        .trim_start_matches('.')
        .to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// `inline; filename="..."` with quotes, backslashes and control characters
/// neutralized.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("inline; filename=\"{safe}\"")
}

/// Stream an opened picture to the client.
fn stream_content(content: EvidenceContent) -> AppResult<Response> {
    let content_type = content_type_for_extension(&content.filename);
    let stream = ReaderStream::new(content.reader);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content.size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&content.filename),
        )
        .header(header::CACHE_CONTROL, CACHE_CONTROL_IMMUTABLE)
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// POST /picture/upload
///
/// Accepts a multipart form with a required `file` field. The stored
/// extension is taken from the client's filename; everything else comes
/// from the query string.
pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadOutcome>>)> {
    // Validate the query before reading the body.
    let ticket_number = query::required_text("ticket_number", params.ticket_number.as_deref())?;
    let picture_type = query::required_picture_type(params.picture_type.as_deref())?;
    let camera_number = query::required_positive("camera_number", params.camera_number.as_deref())?;
    let sequence = query::optional_positive("sequence", params.sequence.as_deref())?.unwrap_or(1);
    let date = query::optional_date(params.date.as_deref())?;

    let mut file_data: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let data = field.bytes().await?;
        file_data = Some((filename, data.to_vec()));
    }

    let (client_filename, payload) =
        file_data.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;

    let outcome = state
        .store
        .upload(UploadRequest {
            ticket_number,
            picture_type,
            camera_number,
            sequence,
            date,
            extension: naming::extension_of(&client_filename).to_string(),
            payload,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /picture/list
///
/// Filtered listing sorted by `(date, filename)`. With `limit`, the first
/// `limit` matches in directory order are kept before sorting.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<DataResponse<Vec<EvidenceRecord>>>> {
    let filter = ListFilter {
        ticket_number: query::optional_text(params.ticket_number.as_deref()),
        date: query::optional_date(params.date.as_deref())?,
        picture_type: query::optional_picture_type(params.picture_type.as_deref())?,
        camera_number: query::optional_positive("camera_number", params.camera_number.as_deref())?,
        sequence: query::optional_positive("sequence", params.sequence.as_deref())?,
    };
    let limit = query::optional_positive("limit", params.limit.as_deref())?.map(|l| l as usize);

    let records = state.store.list(&filter, limit).await?;
    Ok(Json(DataResponse { data: records }))
}

/// GET /picture/get
pub async fn get_one(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
) -> AppResult<Json<DataResponse<EvidenceRecord>>> {
    let lookup = params.parse()?;
    let record = state
        .store
        .find_one(&lookup.key, lookup.date, lookup.picture_type)
        .await?
        .ok_or_else(|| store::not_found_for_key(&lookup.key))?;
    Ok(Json(DataResponse { data: record }))
}

/// GET /picture/folders
pub async fn folders(State(state): State<AppState>) -> AppResult<Json<DataResponse<FolderReport>>> {
    let report = state.store.describe_folders().await?;
    Ok(Json(DataResponse { data: report }))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /picture/delete?file_path=
///
/// Removes exactly the file at `file_path`, which must lie under the
/// picture root.
pub async fn delete(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> AppResult<StatusCode> {
    let file_path = query::required_text("file_path", params.file_path.as_deref())?;
    state.store.delete(&file_path).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// GET /picture/view/{picture_type}/{date}/{filename}
pub async fn view(
    State(state): State<AppState>,
    Path((picture_type, date, filename)): Path<(String, String, String)>,
) -> AppResult<Response> {
    let picture_type = picture_type.parse::<picture::PictureType>()?;
    let date = picture::parse_date(&date)?;
    let content = state
        .store
        .open_by_path(picture_type, date, &filename)
        .await?;
    stream_content(content)
}

/// GET /picture/image
///
/// Streams the first picture matching the key.
pub async fn image(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
) -> AppResult<Response> {
    let lookup = params.parse()?;
    let content = state
        .store
        .open_by_key(&lookup.key, lookup.date, lookup.picture_type)
        .await?;
    stream_content(content)
}
