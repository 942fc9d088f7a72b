//! Pipeline stages, leaves first:
//!
//! - `parse`: M3U text → candidate entries
//! - `dedup`: collapse entries across sources by normalized URL
//! - `classify`: category/resolution enrichment
//! - `rank`: stable multi-key ordering
//! - `run`: end-to-end orchestration

pub mod classify;
pub mod dedup;
pub mod parse;
pub mod rank;
pub mod run;

pub use classify::{classify, classify_all};
pub use dedup::dedupe;
pub use parse::parse_playlist;
pub use rank::rank;
pub use run::run_pipeline;
