//! Domain layer: core types, errors, and port traits.

pub mod error;
pub mod models;
pub mod ports;

pub use error::PipelineError;
