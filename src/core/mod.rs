//! Core domain models for the training pipeline
//!
//! Configuration, stage artifacts, run state and the shared error type.

pub mod artifact;
pub mod config;
pub mod error;
pub mod state;

pub use artifact::*;
pub use config::*;
pub use error::*;
pub use state::*;
