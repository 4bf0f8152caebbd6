//! PIN hashing and the authentication/lockout state machine.

pub mod controller;
pub mod pin;

pub use controller::{AccessController, AuthError, LOCK_THRESHOLD};
pub use pin::{validate_pin, PinError, PinHasher, ScryptParams};
