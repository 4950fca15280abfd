//! Pipeline services: the stages between a claimed queue entry and its
//! terminal outcome.

pub mod dispatcher;
pub mod extractor;
pub mod mission_builder;
pub mod patcher;
pub mod scorer;
pub mod worker;

pub use dispatcher::VisionDispatcher;
pub use extractor::ClaimExtractor;
pub use mission_builder::MissionBuilder;
pub use patcher::{PatchReport, Patcher};
pub use scorer::Scorer;
pub use worker::Worker;
