pub mod providers;
mod gateway;
mod reply;

pub use gateway::AiGateway;
pub use providers::AiProvider;
pub use reply::{extract_json_span, FromReply};
