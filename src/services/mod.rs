//! Service layer for the aggregation pipeline.
//!
//! - Source fetching (`SourceFetcher`)
//! - Stream quality probing (`QualityProbe`)

mod fetcher;
mod probe;

pub use fetcher::{FetchOutcome, SourceFetcher};
pub use probe::{ProbeOutcome, ProbeSummary, QualityProbe};
