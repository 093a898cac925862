//! Bottom-up rollup aggregation over a resolved account tree.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use muni_domain::BudgetMetrics;

use crate::{cancel::CancelToken, error::CoreError, hierarchy::AccountTree};

/// Rollup figures for one node. Leaves carry their stored amounts;
/// interior nodes carry the exact sum of their children's rollups, with
/// stored interior amounts discarded for reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollupTotals {
    pub budgeted: Decimal,
    pub actual: Decimal,
    pub metrics: BudgetMetrics,
}

impl RollupTotals {
    fn from_amounts(budgeted: Decimal, actual: Decimal) -> Self {
        Self {
            budgeted,
            actual,
            metrics: BudgetMetrics::from_amounts(budgeted, actual),
        }
    }
}

/// Per-node rollups plus period-level totals for one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RollupReport {
    totals: HashMap<Uuid, RollupTotals>,
    pub total_budgeted: Decimal,
    pub total_actual: Decimal,
    pub node_count: usize,
    pub leaf_count: usize,
    pub over_budget_count: usize,
}

impl RollupReport {
    pub fn totals_for(&self, id: Uuid) -> Option<&RollupTotals> {
        self.totals.get(&id)
    }

    pub fn period_metrics(&self) -> BudgetMetrics {
        BudgetMetrics::from_amounts(self.total_budgeted, self.total_actual)
    }
}

/// Computes rollup totals for every node in a single post-order pass.
///
/// Decimal addition is exact and commutative, so the result is independent
/// of child ordering. The cancellation token is polled at every interior
/// subtree boundary, so even a single-root pass stops promptly; a
/// cancelled pass returns [`CoreError::Cancelled`] and publishes nothing.
pub fn rollup(tree: &AccountTree, cancel: &CancelToken) -> Result<RollupReport, CoreError> {
    let mut totals: HashMap<Uuid, RollupTotals> = HashMap::with_capacity(tree.len());
    let mut leaf_count = 0usize;

    for root in tree.roots() {
        // Reversed preorder visits every child before its parent, which
        // gives post-order accumulation without recursion.
        let order = subtree_preorder(tree, *root);
        for id in order.iter().rev() {
            let node = tree
                .node(*id)
                .ok_or_else(|| CoreError::NotFound(*id))?;
            let entry = if tree.is_leaf(*id) {
                leaf_count += 1;
                RollupTotals::from_amounts(node.budgeted_amount, node.actual_amount)
            } else {
                if cancel.is_cancelled() {
                    debug!(period = %tree.period_id(), "rollup pass cancelled");
                    return Err(CoreError::Cancelled);
                }
                let mut budgeted = Decimal::ZERO;
                let mut actual = Decimal::ZERO;
                for child in tree.children_of(*id) {
                    let child_totals = totals
                        .get(child)
                        .ok_or_else(|| CoreError::NotFound(*child))?;
                    budgeted += child_totals.budgeted;
                    actual += child_totals.actual;
                }
                RollupTotals::from_amounts(budgeted, actual)
            };
            totals.insert(*id, entry);
        }
    }

    let mut total_budgeted = Decimal::ZERO;
    let mut total_actual = Decimal::ZERO;
    for root in tree.roots() {
        let root_totals = totals
            .get(root)
            .ok_or_else(|| CoreError::NotFound(*root))?;
        total_budgeted += root_totals.budgeted;
        total_actual += root_totals.actual;
    }
    let over_budget_count = totals
        .values()
        .filter(|entry| entry.metrics.over_budget)
        .count();

    debug!(
        period = %tree.period_id(),
        nodes = tree.len(),
        %total_budgeted,
        %total_actual,
        "rollup pass complete"
    );

    Ok(RollupReport {
        totals,
        total_budgeted,
        total_actual,
        node_count: tree.len(),
        leaf_count,
        over_budget_count,
    })
}

fn subtree_preorder(tree: &AccountTree, root: Uuid) -> Vec<Uuid> {
    let mut order = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        order.push(id);
        for child in tree.children_of(id).iter().rev() {
            stack.push(*child);
        }
    }
    order
}
