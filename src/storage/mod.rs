//! On-disk persistence: the response cache and the output artifacts.

pub mod cache;
pub mod writer;

pub use cache::ResponseCache;
pub use writer::ArtifactWriter;
