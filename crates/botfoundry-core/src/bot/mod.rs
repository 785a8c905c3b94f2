//! Bot lifecycle: behavior trait, per-bot runtime, and the orchestrator.

mod behavior;
mod monitor;
mod orchestrator;
mod runtime;

pub use behavior::{BotBehavior, BotContext, ExecuteError};
pub use monitor::MonitorBot;
pub use orchestrator::BotOrchestrator;
pub use runtime::BotRuntime;
