//! Infrastructure implementations for Botfoundry.
//!
//! SQLite-backed stores for bot state, governance records, and the XP
//! ledger; the TOML configuration loader; and HTTP clients for the two
//! external services (PR analysis and the knowledge store). Everything
//! here implements a port trait defined in `botfoundry-core`.

pub mod analysis;
pub mod config;
pub mod knowledge;
pub mod sqlite;
