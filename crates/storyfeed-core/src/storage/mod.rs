mod ledger;
mod models;
mod persist;
mod post_store;

pub use ledger::InvalidFeedLedger;
pub use models::{post_id, LedgerEntry, Post, PromoBanner};
pub use post_store::PostStore;
