//! intake-core: shared protocol library for the intake relay.
//!
//! Provides the JSON message envelope exchanged over relay connections
//! and the error taxonomy shared across the relay server.

pub mod envelope;
pub mod error;

// Re-export commonly used items at crate root.
pub use envelope::{Envelope, SUBMISSION_TAG};
pub use error::{RelayError, RelayResult};
