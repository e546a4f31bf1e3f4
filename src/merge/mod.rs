//! Merge Module
//!
//! Combines same-named shard containers from independent batch runs.
//!
//! ## Responsibilities
//! - Stream N sorted containers into one (`merger`)
//! - Report liveness while a long merge runs (`liveness`)
//! - Discover and group candidate containers, run shard merges in
//!   parallel (`orchestrator`)

mod liveness;
mod merger;
mod orchestrator;

pub use liveness::LivenessWatcher;
pub use merger::{recover_output, MapFileMerger, MergeStats};
pub use orchestrator::MergeOrchestrator;
