//! Error types for the snapvault core.
//!
//! Each module defines its own error enum next to the code that raises it;
//! this module re-exports them all in one place.

pub use crate::auth::controller::AuthError;
pub use crate::auth::pin::PinError;
pub use crate::pipeline::export::ExportError;
pub use crate::pipeline::hydrate::HydrateError;
pub use crate::store::StoreError;
pub use crate::transfer::TransferError;
pub use crate::vault::service::ServiceError;
