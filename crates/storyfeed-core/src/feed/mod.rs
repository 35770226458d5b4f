mod fetcher;
mod models;
mod parser;

pub use fetcher::FeedFetcher;
pub use models::{FeedConfig, Item};
pub use parser::{parse_date, parse_items};
