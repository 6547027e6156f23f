//! Request middleware: authentication, authorization and error rendering.
//!
//! Ordering (outermost first): `Logger` and then `ErrorEnvelope` on the app,
//! then `Protect` on the scope, then `RequireAdmin` or per-resource
//! `RequireOwnership`. actix runs the last `.wrap()` first, so `Protect` is
//! wrapped last. Rejections are returned as error responses, not `Err`, so
//! `ErrorEnvelope` renders them.

pub mod auth;
pub mod errors;
pub mod ownership;

pub use auth::{authenticate, bearer_token, CurrentAccount, Protect, RequireAdmin};
pub use errors::ErrorEnvelope;
pub use ownership::{Loaded, Owned, RequireOwnership};
