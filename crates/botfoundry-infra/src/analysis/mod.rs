//! HTTP client for the external PR analysis service.

mod client;
mod types;

pub use client::PrAnalysisClient;
