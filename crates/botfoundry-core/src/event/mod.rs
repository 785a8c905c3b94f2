//! Event bus with retained history and per-subscriber dispatch queues.

mod bus;

pub use bus::{ErrorCounter, EventBus, EventHandler};
