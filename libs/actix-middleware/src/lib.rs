//! Shared actix-web middleware
//!
//! Request-id propagation, request logging, and JWT bearer authentication.
//! Handlers read the authenticated user from the `UserId` request extension.

pub mod auth;
pub mod logging;
pub mod request_id;

pub use auth::{decode_token, Claims, JwtAuth, UserId};
pub use logging::Logging;
pub use request_id::RequestId;
