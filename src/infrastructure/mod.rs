//! Infrastructure layer: concrete adapters behind the domain ports.

pub mod agents;
pub mod config;
pub mod database;
pub mod knowledge;
pub mod state;
pub mod status;
