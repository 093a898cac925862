//! muni-core
//!
//! The budget ledger engine: hierarchy resolution, rollup aggregation,
//! version-guarded mutations, snapshot queries, and import reconciliation.
//! Depends on muni-domain. No CLI, no terminal I/O, no storage backend;
//! stores plug in through [`store::NodeStore`].

pub mod cancel;
pub mod error;
pub mod hierarchy;
pub mod import;
pub mod mutation;
pub mod query;
pub mod rollup;
pub mod store;

#[cfg(test)]
mod tests;

pub use cancel::CancelToken;
pub use error::{ConcurrencyConflict, CoreError};
pub use hierarchy::AccountTree;
pub use import::{ImportService, RowOutcome, RowStatus};
pub use mutation::{MutationService, NodeDraft, RetryPolicy};
pub use query::{BudgetTree, FlatRow, PeriodSummary, QueryService, TreeNode};
pub use rollup::{rollup, RollupReport, RollupTotals};
pub use store::{CasOutcome, NodeChanges, NodeStore};
