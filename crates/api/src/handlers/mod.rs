//! Request handlers.
//!
//! Handlers parse and validate request input, delegate to the picture
//! evidence store in `weighbridge_core` and map errors via [`AppError`].
//!
//! [`AppError`]: crate::error::AppError

pub mod picture;
