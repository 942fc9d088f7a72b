// src/lib.rs

//! streamrank: playlist aggregation and quality ranking.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
