//! Asset hydration and bulk export.
//!
//! Everything that touches asset bytes lives here. Hydration turns a stored
//! asset back into fetchable bytes, honouring the resolve-before-use
//! contract of the rotating remote URLs; export fans that out over an
//! ordered asset list with bounded concurrency and assembles the survivors
//! into one archive.

pub mod export;
pub mod hydrate;

pub use export::{
    CancelHandle, ExportError, ExportJob, ExportOutcome, ExportPhase, ExportProgress, FailedItem,
    DEFAULT_CONCURRENCY,
};
pub use hydrate::{HydrateError, Hydrator};
