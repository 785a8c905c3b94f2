//! HTTP client for the external knowledge store.

mod client;

pub use client::KnowledgeClient;
