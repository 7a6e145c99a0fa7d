pub mod health;
pub mod picture;

use axum::Router;

use crate::state::AppState;

/// Build the API route tree.
///
/// Route hierarchy:
///
/// ```text
/// /picture/upload                                  upload (POST, multipart)
/// /picture/list                                    filtered listing
/// /picture/get                                     point lookup by key
/// /picture/delete                                  delete by stored path (DELETE)
/// /picture/folders                                 directory report
/// /picture/view/{picture_type}/{date}/{filename}   stream by exact path
/// /picture/image                                   stream by key
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/picture", picture::router())
}
