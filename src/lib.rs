//! Gesture classification from detected body, hand and face landmarks.
//!
//! Landmarks arrive as [`types::ObservationFrame`] values from an external
//! detector. [`gesture`] turns them into boolean gesture states and
//! [`pipeline`] runs that classification on a worker thread.

pub mod config;
pub mod error;
pub mod gesture;
pub mod pipeline;
pub mod types;

pub use error::{Error, Result};
