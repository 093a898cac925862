//! Storage abstraction with version-guarded write paths.

use rust_decimal::Decimal;
use uuid::Uuid;

use muni_domain::{AccountNode, AccountNumber, FundType};

use crate::error::CoreError;

/// Field edits proposed against one node. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeChanges {
    pub name: Option<String>,
    pub fund_type: Option<FundType>,
    pub account_number: Option<AccountNumber>,
    pub budgeted_amount: Option<Decimal>,
    pub actual_amount: Option<Decimal>,
}

impl NodeChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_fund_type(mut self, fund_type: FundType) -> Self {
        self.fund_type = Some(fund_type);
        self
    }

    pub fn with_account_number(mut self, number: AccountNumber) -> Self {
        self.account_number = Some(number);
        self
    }

    pub fn with_budgeted(mut self, amount: Decimal) -> Self {
        self.budgeted_amount = Some(amount);
        self
    }

    pub fn with_actual(mut self, amount: Decimal) -> Self {
        self.actual_amount = Some(amount);
        self
    }

    /// Writes the populated fields onto `node`. Version bookkeeping is the
    /// store's job, not done here.
    pub fn apply_to(&self, node: &mut AccountNode) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(fund_type) = self.fund_type {
            node.fund_type = fund_type;
        }
        if let Some(number) = &self.account_number {
            node.account_number = number.clone();
        }
        if let Some(amount) = self.budgeted_amount {
            node.budgeted_amount = amount;
        }
        if let Some(amount) = self.actual_amount {
            node.actual_amount = amount;
        }
    }
}

/// Result of a compare-and-swap write.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The expected version matched; the returned node is the new
    /// committed state (version advanced by one).
    Committed(AccountNode),
    /// The expected version was stale; carries the current committed
    /// state untouched.
    Stale(AccountNode),
}

/// The single authoritative, shared-mutable resource. Implementations must
/// run the version guard at commit time under their own write exclusion so
/// that only one writer can advance a node from version V to V + 1.
///
/// Infrastructure hiccups surface as [`CoreError::Transient`] (retryable);
/// unrecoverable I/O or corruption as [`CoreError::Storage`].
pub trait NodeStore: Send + Sync {
    /// Consistent point-in-time copy of every node in the period.
    fn snapshot(&self, period_id: Uuid) -> Result<Vec<AccountNode>, CoreError>;

    fn fetch(&self, id: Uuid) -> Result<Option<AccountNode>, CoreError>;

    /// Adds a new node, rejecting duplicate ids and duplicate account
    /// numbers within the node's period.
    fn insert(&self, node: AccountNode) -> Result<AccountNode, CoreError>;

    /// Applies `changes` only if the stored version equals
    /// `expected_version`, bumping the version on commit.
    fn compare_and_update(
        &self,
        id: Uuid,
        expected_version: u64,
        changes: &NodeChanges,
    ) -> Result<CasOutcome, CoreError>;

    /// Removes the node under the same version guard. Nodes that still
    /// have children are refused with a validation error.
    fn compare_and_delete(&self, id: Uuid, expected_version: u64)
        -> Result<CasOutcome, CoreError>;
}
