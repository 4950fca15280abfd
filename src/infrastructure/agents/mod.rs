//! HTTP adapters for the reasoning and vision agents.

pub mod reasoning;
pub mod retry;
pub mod vision;

pub use reasoning::ChatReasoningAgent;
pub use retry::RetryPolicy;
pub use vision::GenerateContentVisionAgent;
