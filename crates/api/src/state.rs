use std::sync::Arc;

use weighbridge_core::picture::store::EvidenceStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the config is behind an `Arc` and the store is a
/// handle over a shared backend.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Picture evidence store rooted at `PICTURE_BASE_PATH`.
    pub store: EvidenceStore,
}
