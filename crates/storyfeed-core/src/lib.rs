pub mod ai;
pub mod config;
pub mod content;
pub mod error;
pub mod feed;
pub mod pipeline;
pub mod storage;
pub mod synth;
pub mod text;

pub use config::{AppConfig, CategoryConfig};
pub use error::{Error, FetchError, Result};
pub use pipeline::{FeedReport, Pipeline, RunSummary};
