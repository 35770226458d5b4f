mod orchestrator;

pub use orchestrator::{FeedReport, Pipeline, RunSummary};
