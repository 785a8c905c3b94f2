//! Observability setup for Botfoundry.

pub mod tracing_setup;
