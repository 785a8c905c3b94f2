//! SQLite-backed stores.

mod governance;
mod pool;
mod state;
mod xp;

pub use governance::SqliteGovernanceRepo;
pub use pool::{default_database_url, DatabasePool};
pub use state::SqliteStateStore;
pub use xp::SqliteXpLedger;
