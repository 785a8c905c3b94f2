//! Business logic and port trait definitions for Botfoundry.
//!
//! This crate defines the "ports" (store and service traits) that the
//! infrastructure layer implements, plus the in-process machinery: the
//! event bus, bot lifecycle runtime, governance services, and the PR
//! review bot. It depends only on `botfoundry-types` -- never on
//! `botfoundry-infra` or any database/HTTP crate.

pub mod bot;
pub mod event;
pub mod factory;
pub mod governance;
pub mod knowledge;
pub mod review;
pub mod state;
