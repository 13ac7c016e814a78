//! Streamgate Simulation - Offline stand-ins for the storage backend
//!
//! [`InMemoryBackend`] serves objects from memory with the same
//! whole-object download semantics as the Telegram backend. Pieces can be
//! delayed, downloads can be made to fail, stall or break off mid-stream,
//! and live transfers are counted so tests can assert that abandoned
//! responses release their backend streams.
//!
//! [`seed_directory`] loads a local directory into the backend and the
//! metadata store for development mode.

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]

pub mod backend;
pub mod library;

pub use backend::{InMemoryBackend, SimulatedFault};
pub use library::seed_directory;
