//! Shared domain types for Botfoundry.
//!
//! This crate is IO-free: plain data types, status enums, and error
//! definitions shared by `botfoundry-core` and `botfoundry-infra`. It
//! depends only on serde, uuid, chrono, and thiserror.

pub mod analysis;
pub mod bot;
pub mod config;
pub mod error;
pub mod event;
pub mod governance;
pub mod review;
pub mod state;
