//! PR review automation: the analysis service port, the decision policy,
//! retry backoff, the XP ledger, and the bot that ties them together.

mod backoff;
mod bot;
mod decision;
mod service;
mod xp;

pub use backoff::Backoff;
pub use bot::PrReviewBot;
pub use decision::{decide, ReviewAction};
pub use service::PrAnalysisService;
pub use xp::{MemoryXpLedger, XpLedger};
