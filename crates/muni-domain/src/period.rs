//! Budget periods scoping a chart of accounts to one fiscal year.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::Identifiable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A fiscal-year container. Every account node carries the `period_id` of
/// exactly one period.
pub struct BudgetPeriod {
    pub id: Uuid,
    pub fiscal_year: i32,
    pub status: PeriodStatus,
}

impl BudgetPeriod {
    pub fn new(fiscal_year: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            fiscal_year,
            status: PeriodStatus::Draft,
        }
    }
}

impl Identifiable for BudgetPeriod {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
/// Workflow state of a budget period.
pub enum PeriodStatus {
    #[default]
    Draft,
    Active,
    Closed,
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PeriodStatus::Draft => "Draft",
            PeriodStatus::Active => "Active",
            PeriodStatus::Closed => "Closed",
        };
        f.write_str(label)
    }
}
