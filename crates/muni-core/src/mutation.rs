//! Single-node mutations guarded by optimistic version checks.
//!
//! Every attempt moves through one of four terminal states: committed,
//! conflict (stale version), rejected (validation), or exhausted (transient
//! store failures outlasted the retry budget). Conflicts and rejections are
//! never retried; they need a caller decision or corrected input.

use std::{sync::Arc, thread, time::Duration};

use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use muni_domain::{AccountNode, AccountNumber, FundType};

use crate::{
    error::{ConcurrencyConflict, CoreError},
    store::{CasOutcome, NodeChanges, NodeStore},
};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 25;

/// Bounded exponential backoff applied to transient store failures only.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_backoff: Duration::from_millis(BASE_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry (1-based), doubling per attempt.
    fn backoff_for(&self, retry: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}

/// Input for creating an account node.
#[derive(Debug, Clone)]
pub struct NodeDraft {
    pub account_number: AccountNumber,
    pub name: String,
    pub fund_type: FundType,
    pub budgeted_amount: Decimal,
    pub actual_amount: Decimal,
}

/// Applies one mutation to one node at a time against the shared store.
/// Safe to call from many sessions concurrently; the store's commit-time
/// version guard decides winners, this service never queues or merges.
#[derive(Clone)]
pub struct MutationService {
    store: Arc<dyn NodeStore>,
    retry: RetryPolicy,
}

impl MutationService {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self::with_retry(store, RetryPolicy::default())
    }

    pub fn with_retry(store: Arc<dyn NodeStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Creates a node under `parent_id` (or as a root) with `version = 0`.
    ///
    /// Rejected before any store write when amounts are negative, the
    /// parent is missing or in another period, or the draft's number does
    /// not extend the parent's number by one segment.
    pub fn create_node(
        &self,
        period_id: Uuid,
        parent_id: Option<Uuid>,
        draft: NodeDraft,
    ) -> Result<AccountNode, CoreError> {
        validate_amounts(draft.budgeted_amount, draft.actual_amount)?;

        if let Some(parent_id) = parent_id {
            let parent = self
                .run_with_retry("fetch parent", || self.store.fetch(parent_id))?
                .ok_or(CoreError::NotFound(parent_id))?;
            if parent.period_id != period_id {
                return Err(CoreError::Validation(format!(
                    "parent {} belongs to a different period",
                    parent_id
                )));
            }
            if !draft.account_number.is_child_of(&parent.account_number) {
                return Err(CoreError::HierarchyMismatch {
                    node: parent_id,
                    number: draft.account_number,
                    expected_prefix: parent.account_number,
                });
            }
        }

        let node = AccountNode::new(
            period_id,
            parent_id,
            draft.account_number,
            draft.name,
            draft.fund_type,
            draft.budgeted_amount,
            draft.actual_amount,
        );
        let committed = self.run_with_retry("insert", || self.store.insert(node.clone()))?;
        debug!(node = %committed.id, number = %committed.account_number, "node created");
        Ok(committed)
    }

    /// Applies field changes if the store still holds `expected_version`.
    ///
    /// On a version mismatch returns [`CoreError::Conflict`] carrying both
    /// the attempted changes and the current committed state so the caller
    /// can offer a merge choice. The committed state is never overwritten
    /// silently.
    pub fn update_node(
        &self,
        id: Uuid,
        expected_version: u64,
        changes: NodeChanges,
    ) -> Result<AccountNode, CoreError> {
        if changes.is_empty() {
            return Err(CoreError::Validation("no field changes supplied".into()));
        }
        if let Some(amount) = changes.budgeted_amount {
            validate_amounts(amount, Decimal::ZERO)?;
        }
        if let Some(amount) = changes.actual_amount {
            validate_amounts(Decimal::ZERO, amount)?;
        }
        if let Some(number) = &changes.account_number {
            self.validate_renumbering(id, number)?;
        }

        let outcome = self.run_with_retry("update", || {
            self.store.compare_and_update(id, expected_version, &changes)
        })?;
        match outcome {
            CasOutcome::Committed(node) => {
                debug!(node = %id, version = node.version, "update committed");
                Ok(node)
            }
            CasOutcome::Stale(current) => {
                warn!(
                    node = %id,
                    expected = expected_version,
                    current = current.version,
                    "update rejected: stale version"
                );
                Err(CoreError::Conflict(Box::new(ConcurrencyConflict {
                    node_id: id,
                    expected_version,
                    attempted: changes,
                    current,
                })))
            }
        }
    }

    /// Removes a leaf under the version guard. Interior nodes are refused;
    /// cascading or re-parenting descendants is the caller's decision.
    pub fn delete_leaf(&self, id: Uuid, expected_version: u64) -> Result<(), CoreError> {
        let outcome = self.run_with_retry("delete", || {
            self.store.compare_and_delete(id, expected_version)
        })?;
        match outcome {
            CasOutcome::Committed(node) => {
                debug!(node = %id, number = %node.account_number, "leaf deleted");
                Ok(())
            }
            CasOutcome::Stale(current) => {
                warn!(
                    node = %id,
                    expected = expected_version,
                    current = current.version,
                    "delete rejected: stale version"
                );
                Err(CoreError::Conflict(Box::new(ConcurrencyConflict {
                    node_id: id,
                    expected_version,
                    attempted: NodeChanges::default(),
                    current,
                })))
            }
        }
    }

    /// A renumbered node must still extend its parent's number by one
    /// segment. Checked against the latest committed parent before the
    /// store is touched.
    fn validate_renumbering(&self, id: Uuid, number: &AccountNumber) -> Result<(), CoreError> {
        let node = self
            .run_with_retry("fetch node", || self.store.fetch(id))?
            .ok_or(CoreError::NotFound(id))?;
        let Some(parent_id) = node.parent_id else {
            return Ok(());
        };
        let parent = self
            .run_with_retry("fetch parent", || self.store.fetch(parent_id))?
            .ok_or(CoreError::NotFound(parent_id))?;
        if !number.is_child_of(&parent.account_number) {
            return Err(CoreError::HierarchyMismatch {
                node: id,
                number: number.clone(),
                expected_prefix: parent.account_number,
            });
        }
        Ok(())
    }

    /// Runs `op`, retrying only transient failures with exponential
    /// backoff up to the policy's attempt cap.
    fn run_with_retry<T>(
        &self,
        label: &str,
        op: impl Fn() -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut last = None;
        for attempt in 1..=self.retry.max_attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(CoreError::Transient(message)) => {
                    debug!(%label, attempt, %message, "transient store failure");
                    last = Some(message);
                    if attempt < self.retry.max_attempts {
                        thread::sleep(self.retry.backoff_for(attempt));
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(CoreError::Exhausted {
            attempts: self.retry.max_attempts,
            last: last.unwrap_or_else(|| "unknown transient failure".into()),
        })
    }
}

fn validate_amounts(budgeted: Decimal, actual: Decimal) -> Result<(), CoreError> {
    if budgeted < Decimal::ZERO {
        return Err(CoreError::Validation(
            "budgeted amount must not be negative".into(),
        ));
    }
    if actual < Decimal::ZERO {
        return Err(CoreError::Validation(
            "actual amount must not be negative".into(),
        ));
    }
    Ok(())
}
