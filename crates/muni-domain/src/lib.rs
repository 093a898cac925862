//! muni-domain
//!
//! Pure domain models for the municipal budget ledger (account nodes,
//! account numbers, fund types, budget periods, import rows).
//! No I/O, no storage. Only data types and core enums.

pub mod account;
pub mod common;
pub mod fund;
pub mod import;
pub mod number;
pub mod period;

pub use account::*;
pub use common::*;
pub use fund::*;
pub use import::*;
pub use number::*;
pub use period::*;
