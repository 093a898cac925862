//! Read shapes over a period: full tree, flat projection, summary.
//!
//! Each call takes exactly one store snapshot and computes everything from
//! it, so no shape ever observes a partially applied mutation from another
//! session. Reads hold no write lock.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use muni_domain::{AccountNode, AccountNumber, BudgetMetrics, FundType};

use crate::{
    cancel::CancelToken,
    error::CoreError,
    hierarchy::AccountTree,
    rollup::{rollup, RollupReport, RollupTotals},
    store::NodeStore,
};

/// A node with its rollup totals and owned children, in account-number
/// order. Drives detail and editing views.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub node: AccountNode,
    pub totals: RollupTotals,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The full resolved hierarchy for one period, totals attached.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetTree {
    pub period_id: Uuid,
    pub roots: Vec<TreeNode>,
}

/// Slim listing row: the fixed field set reporting views need, without
/// full node payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub id: Uuid,
    pub account_number: AccountNumber,
    pub name: String,
    pub fund_type: FundType,
    pub depth: usize,
    pub budgeted: Decimal,
    pub actual: Decimal,
    pub variance: Decimal,
}

/// Period-level totals with no per-node detail.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSummary {
    pub period_id: Uuid,
    pub total_budgeted: Decimal,
    pub total_actual: Decimal,
    pub metrics: BudgetMetrics,
    pub node_count: usize,
    pub leaf_count: usize,
    pub over_budget_count: usize,
}

/// Serves the three read shapes from consistent snapshots.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn NodeStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Resolved hierarchy with rolled-up totals on every node.
    pub fn tree(&self, period_id: Uuid) -> Result<BudgetTree, CoreError> {
        self.tree_with_cancel(period_id, &CancelToken::new())
    }

    pub fn tree_with_cancel(
        &self,
        period_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<BudgetTree, CoreError> {
        let (tree, report) = self.evaluate(period_id, cancel)?;
        let roots = tree
            .roots()
            .iter()
            .map(|root| build_tree_node(&tree, &report, *root))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BudgetTree { period_id, roots })
    }

    /// Flat projection in account-number order, rolled-up amounts per row.
    pub fn flat(&self, period_id: Uuid) -> Result<Vec<FlatRow>, CoreError> {
        let (tree, report) = self.evaluate(period_id, &CancelToken::new())?;
        let mut rows = Vec::with_capacity(tree.len());
        for id in tree.preorder() {
            let node = tree.node(id).ok_or(CoreError::NotFound(id))?;
            let totals = report.totals_for(id).ok_or(CoreError::NotFound(id))?;
            rows.push(FlatRow {
                id,
                account_number: node.account_number.clone(),
                name: node.name.clone(),
                fund_type: node.fund_type,
                depth: node.account_number.depth(),
                budgeted: totals.budgeted,
                actual: totals.actual,
                variance: totals.metrics.variance,
            });
        }
        Ok(rows)
    }

    /// Period totals only; per-node detail never reaches the caller.
    pub fn summary(&self, period_id: Uuid) -> Result<PeriodSummary, CoreError> {
        self.summary_with_cancel(period_id, &CancelToken::new())
    }

    pub fn summary_with_cancel(
        &self,
        period_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<PeriodSummary, CoreError> {
        let (_, report) = self.evaluate(period_id, cancel)?;
        Ok(PeriodSummary {
            period_id,
            total_budgeted: report.total_budgeted,
            total_actual: report.total_actual,
            metrics: report.period_metrics(),
            node_count: report.node_count,
            leaf_count: report.leaf_count,
            over_budget_count: report.over_budget_count,
        })
    }

    /// One snapshot, one resolution, one rollup pass; every read shape in
    /// the same call derives from this pair.
    fn evaluate(
        &self,
        period_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<(AccountTree, RollupReport), CoreError> {
        let nodes = self.store.snapshot(period_id)?;
        let tree = AccountTree::resolve(nodes)?;
        let report = rollup(&tree, cancel)?;
        Ok((tree, report))
    }
}

fn build_tree_node(
    tree: &AccountTree,
    report: &RollupReport,
    id: Uuid,
) -> Result<TreeNode, CoreError> {
    let node = tree.node(id).ok_or(CoreError::NotFound(id))?.clone();
    let totals = *report.totals_for(id).ok_or(CoreError::NotFound(id))?;
    let children = tree
        .children_of(id)
        .iter()
        .map(|child| build_tree_node(tree, report, *child))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TreeNode {
        node,
        totals,
        children,
    })
}
