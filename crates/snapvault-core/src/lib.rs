//! Core library for snapvault: a registration-free, PIN-gated vault for
//! arbitrary binary assets.
//!
//! A user claims a username plus a short numeric PIN and receives a vault.
//! Asset bytes are never stored by this crate; they are pushed to a bot-style
//! remote object store that hands back an opaque, durable handle per asset.
//! URLs derived from a handle rotate and expire, so every read goes through a
//! resolve-before-use step (see [`pipeline`]).
//!
//! The crate is organised around five components:
//!
//! - [`auth::PinHasher`] — salted, intentionally slow PIN digests
//! - [`store::VaultStore`] — the metadata row-store boundary
//! - [`transfer::AssetTransfer`] — the remote blob-store boundary
//! - [`auth::AccessController`] — the authentication/lockout state machine
//! - [`pipeline`] — asset hydration and bulk export
//!
//! [`vault::VaultService`] composes them behind the caller-facing operations.

pub mod auth;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod transfer;
pub mod vault;

pub use auth::{AccessController, PinHasher, LOCK_THRESHOLD};
pub use vault::{Asset, AssetId, ExpiryPolicy, Vault, VaultId, VaultService};
