//! External tabular rows merged into a period by the import reconciler.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{fund::FundType, number::AccountNumber};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One spreadsheet row in the ordered external column format:
/// `account_number, name, fund_type, budgeted_amount, actual_amount`.
/// The account number is the join key when matching existing nodes.
pub struct ImportRow {
    pub account_number: AccountNumber,
    pub name: String,
    pub fund_type: FundType,
    pub budgeted_amount: Decimal,
    pub actual_amount: Decimal,
}
