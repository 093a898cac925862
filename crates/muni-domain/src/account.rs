//! Account nodes and their derived budget metrics.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::Identifiable, fund::FundType, number::AccountNumber};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One entry in a period's chart of accounts. `parent_id` is a non-owning
/// lookup reference; the resolved tree owns the parent → children edges.
pub struct AccountNode {
    pub id: Uuid,
    pub period_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub account_number: AccountNumber,
    pub name: String,
    pub fund_type: FundType,
    pub budgeted_amount: Decimal,
    pub actual_amount: Decimal,
    /// Optimistic-concurrency token. Advanced by exactly one on every
    /// committed mutation, never reused, never consulted by business logic.
    pub version: u64,
}

impl AccountNode {
    /// Creates a fresh node at `version = 0`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        period_id: Uuid,
        parent_id: Option<Uuid>,
        account_number: AccountNumber,
        name: impl Into<String>,
        fund_type: FundType,
        budgeted_amount: Decimal,
        actual_amount: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            period_id,
            parent_id,
            account_number,
            name: name.into(),
            fund_type,
            budgeted_amount,
            actual_amount,
            version: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Metrics derived from the node's own stored amounts. For interior
    /// nodes the reporting layer recomputes these from rollup totals.
    pub fn metrics(&self) -> BudgetMetrics {
        BudgetMetrics::from_amounts(self.budgeted_amount, self.actual_amount)
    }
}

impl Identifiable for AccountNode {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Derived budget figures. Never stored; recomputed on read.
pub struct BudgetMetrics {
    pub variance: Decimal,
    /// `None` when the budgeted amount is zero (the ratio is undefined,
    /// never divided through).
    pub percent_used: Option<Decimal>,
    pub over_budget: bool,
}

impl BudgetMetrics {
    pub fn from_amounts(budgeted: Decimal, actual: Decimal) -> Self {
        let percent_used = if budgeted.is_zero() {
            None
        } else {
            Some(actual / budgeted * Decimal::ONE_HUNDRED)
        };
        Self {
            variance: budgeted - actual,
            percent_used,
            over_budget: actual > budgeted,
        }
    }
}
