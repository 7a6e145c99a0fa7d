//! Domain logic for the weighbridge picture-evidence service.
//!
//! Everything here is transport-agnostic: the HTTP layer lives in
//! `weighbridge-api` and only translates requests into calls on
//! [`picture::store::EvidenceStore`].

pub mod error;
pub mod picture;
pub mod types;
