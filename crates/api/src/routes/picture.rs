//! Route definitions for picture evidence.
//!
//! Mounted at `/picture`.
//!
//! ```text
//! POST   /upload                                  upload
//! GET    /list                                    list
//! GET    /get                                     get_one
//! DELETE /delete                                  delete
//! GET    /folders                                 folders
//! GET    /view/{picture_type}/{date}/{filename}   view
//! GET    /image                                   image
//! ```

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::picture;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(picture::upload))
        .route("/list", get(picture::list))
        .route("/get", get(picture::get_one))
        .route("/delete", delete(picture::delete))
        .route("/folders", get(picture::folders))
        .route(
            "/view/{picture_type}/{date}/{filename}",
            get(picture::view),
        )
        .route("/image", get(picture::image))
}
