use thiserror::Error;
use uuid::Uuid;

use muni_domain::{AccountNode, AccountNumber, AccountNumberError};

use crate::store::NodeChanges;

/// Unified error type for the ledger engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Account node not found: {0}")]
    NotFound(Uuid),
    #[error("Node {node} references parent {parent} absent from the period")]
    UnknownParent { node: Uuid, parent: Uuid },
    #[error("Duplicate node id: {0}")]
    DuplicateNode(Uuid),
    #[error("Duplicate account number: {0}")]
    DuplicateNumber(AccountNumber),
    #[error("Cycle detected in parent chain at node {0}")]
    CycleDetected(Uuid),
    #[error("Node {node} number `{number}` does not extend parent number `{expected_prefix}` by one segment")]
    HierarchyMismatch {
        node: Uuid,
        number: AccountNumber,
        expected_prefix: AccountNumber,
    },
    #[error("Stale version for node {}: expected {}, current {}",
        .0.node_id, .0.expected_version, .0.current.version)]
    Conflict(Box<ConcurrencyConflict>),
    #[error("Transient store failure: {0}")]
    Transient(String),
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Storage error: {0}")]
    Storage(String),
}

/// A rejected write: someone else advanced the node since the caller read
/// it. Carries both sides so the caller can present a merge choice; the
/// engine never auto-resolves one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyConflict {
    pub node_id: Uuid,
    pub expected_version: u64,
    /// Field changes the caller tried to apply. Empty for delete attempts.
    pub attempted: NodeChanges,
    /// The committed state the store holds now.
    pub current: AccountNode,
}

impl From<AccountNumberError> for CoreError {
    fn from(err: AccountNumberError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Storage(err.to_string())
    }
}
