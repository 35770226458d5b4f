//! Post synthesis: pre-filter, essence, reactions, quality gate and fallbacks.

pub mod fallback;
mod quality;
mod replies;
mod synthesizer;

pub use quality::QualityPolicy;
pub use replies::{Perspectives, Selection};
pub use synthesizer::{CategoryContext, PostSynthesizer};
