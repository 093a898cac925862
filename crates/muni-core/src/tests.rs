use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    },
};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use muni_domain::{AccountNode, AccountNumber, FundType, ImportRow};

use crate::{
    cancel::CancelToken,
    error::CoreError,
    hierarchy::AccountTree,
    import::{ImportService, RowStatus},
    mutation::{MutationService, NodeDraft, RetryPolicy},
    query::QueryService,
    rollup::rollup,
    store::{CasOutcome, NodeChanges, NodeStore},
};

fn number(raw: &str) -> AccountNumber {
    AccountNumber::parse(raw).expect("valid number")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("muni_core=debug")
        .with_test_writer()
        .try_init();
}

fn node(
    period: Uuid,
    parent: Option<Uuid>,
    raw_number: &str,
    budgeted: Decimal,
    actual: Decimal,
) -> AccountNode {
    AccountNode::new(
        period,
        parent,
        number(raw_number),
        format!("Account {}", raw_number),
        FundType::General,
        budgeted,
        actual,
    )
}

/// In-memory store double with an injectable transient-failure counter.
#[derive(Default)]
struct MemoryStore {
    nodes: Mutex<HashMap<Uuid, AccountNode>>,
    fail_next: AtomicU32,
}

impl MemoryStore {
    fn with_nodes(nodes: Vec<AccountNode>) -> Self {
        let store = Self::default();
        {
            let mut guard = store.nodes.lock().expect("lock");
            for node in nodes {
                guard.insert(node.id, node);
            }
        }
        store
    }

    /// Makes the next `count` guarded writes fail transiently.
    fn fail_writes(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl NodeStore for MemoryStore {
    fn snapshot(&self, period_id: Uuid) -> Result<Vec<AccountNode>, CoreError> {
        let guard = self.nodes.lock().expect("lock");
        let mut nodes: Vec<AccountNode> = guard
            .values()
            .filter(|node| node.period_id == period_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        Ok(nodes)
    }

    fn fetch(&self, id: Uuid) -> Result<Option<AccountNode>, CoreError> {
        Ok(self.nodes.lock().expect("lock").get(&id).cloned())
    }

    fn insert(&self, node: AccountNode) -> Result<AccountNode, CoreError> {
        let mut guard = self.nodes.lock().expect("lock");
        if guard.contains_key(&node.id) {
            return Err(CoreError::DuplicateNode(node.id));
        }
        if guard.values().any(|existing| {
            existing.period_id == node.period_id
                && existing.account_number == node.account_number
        }) {
            return Err(CoreError::DuplicateNumber(node.account_number));
        }
        guard.insert(node.id, node.clone());
        Ok(node)
    }

    fn compare_and_update(
        &self,
        id: Uuid,
        expected_version: u64,
        changes: &NodeChanges,
    ) -> Result<CasOutcome, CoreError> {
        if self.take_failure() {
            return Err(CoreError::Transient("injected failure".into()));
        }
        let mut guard = self.nodes.lock().expect("lock");
        let node = guard.get_mut(&id).ok_or(CoreError::NotFound(id))?;
        if node.version != expected_version {
            return Ok(CasOutcome::Stale(node.clone()));
        }
        changes.apply_to(node);
        node.version += 1;
        Ok(CasOutcome::Committed(node.clone()))
    }

    fn compare_and_delete(
        &self,
        id: Uuid,
        expected_version: u64,
    ) -> Result<CasOutcome, CoreError> {
        if self.take_failure() {
            return Err(CoreError::Transient("injected failure".into()));
        }
        let mut guard = self.nodes.lock().expect("lock");
        if guard.values().any(|node| node.parent_id == Some(id)) {
            return Err(CoreError::Validation(
                "cannot delete a node that still has children".into(),
            ));
        }
        let node = guard.get(&id).ok_or(CoreError::NotFound(id))?;
        if node.version != expected_version {
            return Ok(CasOutcome::Stale(node.clone()));
        }
        let removed = guard.remove(&id).ok_or(CoreError::NotFound(id))?;
        Ok(CasOutcome::Committed(removed))
    }
}

/// Water-revenue example: root 410 with leaves 410.1 and 410.2.
fn water_revenue(period: Uuid) -> Vec<AccountNode> {
    let root = node(period, None, "410", dec!(500000), dec!(0));
    let child_a = node(period, Some(root.id), "410.1", dec!(350000), dec!(120000));
    let child_b = node(period, Some(root.id), "410.2", dec!(150000), dec!(80000));
    vec![root, child_a, child_b]
}

#[test]
fn resolve_builds_forest_with_sorted_children() {
    let period = Uuid::new_v4();
    let root = node(period, None, "410", dec!(0), dec!(0));
    let late = node(period, Some(root.id), "410.10", dec!(1), dec!(0));
    let early = node(period, Some(root.id), "410.2", dec!(1), dec!(0));
    let root_id = root.id;

    let tree = AccountTree::resolve(vec![late, root, early]).expect("resolve");

    assert_eq!(tree.roots(), &[root_id]);
    let children: Vec<&str> = tree
        .children_of(root_id)
        .iter()
        .map(|id| tree.node(*id).expect("child").account_number.as_str())
        .collect();
    assert_eq!(children, vec!["410.2", "410.10"]);
    assert!(tree.is_leaf(children_id(&tree, root_id, 0)));
}

fn children_id(tree: &AccountTree, parent: Uuid, index: usize) -> Uuid {
    tree.children_of(parent)[index]
}

#[test]
fn resolve_rejects_unknown_parent() {
    let period = Uuid::new_v4();
    let orphan = node(period, Some(Uuid::new_v4()), "410.1", dec!(0), dec!(0));
    let err = AccountTree::resolve(vec![orphan]).expect_err("must fail");
    assert!(matches!(err, CoreError::UnknownParent { .. }));
}

#[test]
fn resolve_detects_parent_cycles() {
    let period = Uuid::new_v4();
    let mut a = node(period, None, "410", dec!(0), dec!(0));
    let mut b = node(period, None, "420", dec!(0), dec!(0));
    a.parent_id = Some(b.id);
    b.parent_id = Some(a.id);
    let err = AccountTree::resolve(vec![a, b]).expect_err("must fail");
    assert!(matches!(err, CoreError::CycleDetected(_)));
}

#[test]
fn resolve_rejects_number_prefix_mismatch() {
    let period = Uuid::new_v4();
    let root = node(period, None, "410", dec!(0), dec!(0));
    let stray = node(period, Some(root.id), "999.1", dec!(0), dec!(0));
    let stray_id = stray.id;
    let err = AccountTree::resolve(vec![root, stray]).expect_err("must fail");
    match err {
        CoreError::HierarchyMismatch {
            node,
            expected_prefix,
            ..
        } => {
            assert_eq!(node, stray_id);
            assert_eq!(expected_prefix, number("410"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn resolve_flatten_round_trips() {
    let period = Uuid::new_v4();
    let tree = AccountTree::resolve(water_revenue(period)).expect("resolve");
    let again = AccountTree::resolve(tree.flatten()).expect("re-resolve");
    assert_eq!(tree, again);
}

#[test]
fn rollup_discards_stored_interior_amounts() {
    let period = Uuid::new_v4();
    let mut nodes = water_revenue(period);
    // Drifted stored total on the interior node must not leak into reports.
    nodes[0].budgeted_amount = dec!(999999);
    let root_id = nodes[0].id;

    let tree = AccountTree::resolve(nodes).expect("resolve");
    let report = rollup(&tree, &CancelToken::new()).expect("rollup");

    let root_totals = report.totals_for(root_id).expect("root totals");
    assert_eq!(root_totals.budgeted, dec!(500000));
    assert_eq!(root_totals.actual, dec!(200000));
    assert_eq!(report.total_budgeted, dec!(500000));
    assert_eq!(report.leaf_count, 2);
}

#[test]
fn rollup_is_idempotent() {
    let period = Uuid::new_v4();
    let tree = AccountTree::resolve(water_revenue(period)).expect("resolve");
    let first = rollup(&tree, &CancelToken::new()).expect("first pass");
    let second = rollup(&tree, &CancelToken::new()).expect("second pass");
    assert_eq!(first, second);
}

#[test]
fn rollup_guards_percent_when_budget_is_zero() {
    let period = Uuid::new_v4();
    let leaf = node(period, None, "500", dec!(0), dec!(10));
    let leaf_id = leaf.id;
    let tree = AccountTree::resolve(vec![leaf]).expect("resolve");
    let report = rollup(&tree, &CancelToken::new()).expect("rollup");
    let totals = report.totals_for(leaf_id).expect("totals");
    assert_eq!(totals.metrics.percent_used, None);
    assert!(totals.metrics.over_budget);
}

#[test]
fn rollup_honours_cancellation_without_partial_totals() {
    let period = Uuid::new_v4();
    let tree = AccountTree::resolve(water_revenue(period)).expect("resolve");
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = rollup(&tree, &cancel).expect_err("must cancel");
    assert!(matches!(err, CoreError::Cancelled));
}

#[test]
fn rollup_cancellation_fires_inside_a_single_root() {
    // A lone root with nested interior levels: the token must be polled
    // within the walk, not just once per root.
    let period = Uuid::new_v4();
    let root = node(period, None, "600", dec!(0), dec!(0));
    let mid = node(period, Some(root.id), "600.1", dec!(0), dec!(0));
    let leaf_a = node(period, Some(mid.id), "600.1.1", dec!(200), dec!(50));
    let leaf_b = node(period, Some(mid.id), "600.1.2", dec!(300), dec!(75));
    let tree =
        AccountTree::resolve(vec![root, mid, leaf_a, leaf_b]).expect("resolve");
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = rollup(&tree, &cancel).expect_err("must cancel mid-walk");
    assert!(matches!(err, CoreError::Cancelled));
}

#[test]
fn rollup_over_leaf_only_forest_has_no_subtree_boundaries() {
    // With no interior nodes there is nothing to interrupt between, so
    // the pass completes even under a cancelled token.
    let period = Uuid::new_v4();
    let leaf_a = node(period, None, "700", dec!(100), dec!(40));
    let leaf_b = node(period, None, "710", dec!(200), dec!(60));
    let tree = AccountTree::resolve(vec![leaf_a, leaf_b]).expect("resolve");
    let cancel = CancelToken::new();
    cancel.cancel();
    let report = rollup(&tree, &cancel).expect("rollup");
    assert_eq!(report.total_budgeted, dec!(300));
    assert_eq!(report.total_actual, dec!(100));
}

/// Tiny deterministic generator; keeps the randomized property test
/// reproducible without a property-testing dependency.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound.max(1)
    }
}

#[test]
fn rollup_matches_leaf_sums_on_random_trees() {
    for seed in 0..20u64 {
        let mut rng = Lcg(seed.wrapping_mul(0x9e3779b97f4a7c15) + 1);
        let period = Uuid::new_v4();
        let mut nodes = vec![node(period, None, "100", dec!(0), dec!(0))];
        let mut frontier = vec![(nodes[0].id, number("100"), 1usize)];

        while let Some((parent_id, parent_number, depth)) = frontier.pop() {
            if depth >= 5 {
                continue;
            }
            let branching = rng.next(7) as usize;
            for child_idx in 0..branching {
                let child_number = parent_number
                    .child(&format!("{}", child_idx + 1))
                    .expect("child number");
                let budgeted = Decimal::from(rng.next(100000));
                let actual = Decimal::from(rng.next(100000));
                let child = node(
                    period,
                    Some(parent_id),
                    child_number.as_str(),
                    budgeted,
                    actual,
                );
                frontier.push((child.id, child_number, depth + 1));
                nodes.push(child);
            }
        }

        let tree = AccountTree::resolve(nodes.clone()).expect("resolve");
        let report = rollup(&tree, &CancelToken::new()).expect("rollup");

        for interior in nodes.iter().filter(|n| !tree.is_leaf(n.id)) {
            let mut leaf_budget = Decimal::ZERO;
            let mut stack = vec![interior.id];
            while let Some(id) = stack.pop() {
                if tree.is_leaf(id) {
                    leaf_budget += tree.node(id).expect("node").budgeted_amount;
                } else {
                    stack.extend(tree.children_of(id).iter().copied());
                }
            }
            let totals = report.totals_for(interior.id).expect("totals");
            assert_eq!(totals.budgeted, leaf_budget, "seed {} drifted", seed);
        }
    }
}

#[test]
fn create_node_validates_before_store() {
    let period = Uuid::new_v4();
    let store = Arc::new(MemoryStore::default());
    let mutations = MutationService::new(store.clone());

    let err = mutations
        .create_node(
            period,
            None,
            NodeDraft {
                account_number: number("410"),
                name: "Water Revenue".into(),
                fund_type: FundType::Enterprise,
                budgeted_amount: dec!(-1),
                actual_amount: dec!(0),
            },
        )
        .expect_err("negative budget must be rejected");
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(store.snapshot(period).expect("snapshot").is_empty());
}

#[test]
fn create_node_checks_parent_number_prefix() {
    let period = Uuid::new_v4();
    let root = node(period, None, "410", dec!(0), dec!(0));
    let root_id = root.id;
    let store = Arc::new(MemoryStore::with_nodes(vec![root]));
    let mutations = MutationService::new(store);

    let err = mutations
        .create_node(
            period,
            Some(root_id),
            NodeDraft {
                account_number: number("999.1"),
                name: "Stray".into(),
                fund_type: FundType::General,
                budgeted_amount: dec!(0),
                actual_amount: dec!(0),
            },
        )
        .expect_err("prefix mismatch must be rejected");
    assert!(matches!(err, CoreError::HierarchyMismatch { .. }));
}

#[test]
fn update_node_advances_version_by_one_per_commit() {
    let period = Uuid::new_v4();
    let leaf = node(period, None, "410", dec!(100), dec!(0));
    let id = leaf.id;
    let store = Arc::new(MemoryStore::with_nodes(vec![leaf]));
    let mutations = MutationService::new(store.clone());

    for expected in 0..5u64 {
        let updated = mutations
            .update_node(
                id,
                expected,
                NodeChanges::default().with_actual(Decimal::from(expected + 1)),
            )
            .expect("update");
        assert_eq!(updated.version, expected + 1);
    }
    // A burst of stale attempts must not advance the version.
    for _ in 0..3 {
        let err = mutations
            .update_node(id, 0, NodeChanges::default().with_actual(dec!(9)))
            .expect_err("stale update");
        assert!(matches!(err, CoreError::Conflict(_)));
    }
    let current = store.fetch(id).expect("fetch").expect("node");
    assert_eq!(current.version, 5);
}

#[test]
fn stale_update_reports_both_sides_of_the_conflict() {
    let period = Uuid::new_v4();
    let leaf = node(period, None, "410", dec!(100), dec!(0));
    let id = leaf.id;
    let store = Arc::new(MemoryStore::with_nodes(vec![leaf]));
    let mutations = MutationService::new(store);

    mutations
        .update_node(id, 0, NodeChanges::default().with_actual(dec!(40)))
        .expect("first update");

    let attempted = NodeChanges::default().with_actual(dec!(55));
    let err = mutations
        .update_node(id, 0, attempted.clone())
        .expect_err("stale update");
    match err {
        CoreError::Conflict(conflict) => {
            assert_eq!(conflict.node_id, id);
            assert_eq!(conflict.expected_version, 0);
            assert_eq!(conflict.attempted, attempted);
            assert_eq!(conflict.current.version, 1);
            assert_eq!(conflict.current.actual_amount, dec!(40));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn transient_failures_retry_then_commit() {
    init_tracing();
    let period = Uuid::new_v4();
    let leaf = node(period, None, "410", dec!(100), dec!(0));
    let id = leaf.id;
    let store = Arc::new(MemoryStore::with_nodes(vec![leaf]));
    let mutations = MutationService::with_retry(
        store.clone(),
        RetryPolicy {
            max_attempts: 3,
            base_backoff: std::time::Duration::from_millis(1),
        },
    );

    store.fail_writes(2);
    let updated = mutations
        .update_node(id, 0, NodeChanges::default().with_actual(dec!(10)))
        .expect("update after retries");
    assert_eq!(updated.version, 1);
}

#[test]
fn transient_failures_exhaust_after_bounded_attempts() {
    init_tracing();
    let period = Uuid::new_v4();
    let leaf = node(period, None, "410", dec!(100), dec!(0));
    let id = leaf.id;
    let store = Arc::new(MemoryStore::with_nodes(vec![leaf]));
    let mutations = MutationService::with_retry(
        store.clone(),
        RetryPolicy {
            max_attempts: 3,
            base_backoff: std::time::Duration::from_millis(1),
        },
    );

    store.fail_writes(u32::MAX);
    let err = mutations
        .update_node(id, 0, NodeChanges::default().with_actual(dec!(10)))
        .expect_err("must exhaust");
    assert!(matches!(err, CoreError::Exhausted { attempts: 3, .. }));
    store.fail_writes(0);
    let current = store.fetch(id).expect("fetch").expect("node");
    assert_eq!(current.version, 0, "no partial writes");
}

#[test]
fn delete_leaf_refuses_interior_nodes() {
    let period = Uuid::new_v4();
    let nodes = water_revenue(period);
    let root_id = nodes[0].id;
    let store = Arc::new(MemoryStore::with_nodes(nodes));
    let mutations = MutationService::new(store);

    let err = mutations
        .delete_leaf(root_id, 0)
        .expect_err("interior delete must fail");
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
fn query_shapes_agree_on_totals() {
    let period = Uuid::new_v4();
    let store = Arc::new(MemoryStore::with_nodes(water_revenue(period)));
    let queries = QueryService::new(store);

    let summary = queries.summary(period).expect("summary");
    assert_eq!(summary.total_budgeted, dec!(500000));
    assert_eq!(summary.total_actual, dec!(200000));
    assert_eq!(summary.node_count, 3);

    let tree = queries.tree(period).expect("tree");
    assert_eq!(tree.roots.len(), 1);
    assert_eq!(tree.roots[0].totals.budgeted, summary.total_budgeted);

    let rows = queries.flat(period).expect("flat");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].account_number, number("410"));
    assert_eq!(rows[0].budgeted, dec!(500000));
}

#[test]
fn example_scenario_update_flows_into_rollup() {
    let period = Uuid::new_v4();
    let nodes = water_revenue(period);
    let child_a = nodes[1].clone();
    let store = Arc::new(MemoryStore::with_nodes(nodes));
    let mutations = MutationService::new(store.clone());
    let queries = QueryService::new(store);

    mutations
        .update_node(
            child_a.id,
            child_a.version,
            NodeChanges::default().with_actual(dec!(340000)),
        )
        .expect("update actual");

    let tree = queries.tree(period).expect("tree");
    assert_eq!(tree.roots[0].totals.actual, dec!(340000) + dec!(80000));
}

#[test]
fn import_creates_placeholder_ancestors_and_is_idempotent() {
    let period = Uuid::new_v4();
    let store = Arc::new(MemoryStore::default());
    let import = ImportService::new(store.clone());

    let rows = vec![ImportRow {
        account_number: number("410.1.1"),
        name: "Metered Sales".into(),
        fund_type: FundType::Enterprise,
        budgeted_amount: dec!(250000),
        actual_amount: dec!(60000),
    }];

    let outcomes = import.reconcile(period, &rows).expect("first pass");
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, RowStatus::Created);

    let snapshot = store.snapshot(period).expect("snapshot");
    assert_eq!(snapshot.len(), 3, "two placeholder ancestors plus the leaf");
    let placeholder = snapshot
        .iter()
        .find(|node| node.account_number == number("410"))
        .expect("root placeholder");
    assert_eq!(placeholder.budgeted_amount, Decimal::ZERO);
    assert_eq!(placeholder.fund_type, FundType::Enterprise);

    let again = import.reconcile(period, &rows).expect("second pass");
    assert_eq!(again[0].status, RowStatus::Updated);
    assert_eq!(store.snapshot(period).expect("snapshot").len(), 3);
}

#[test]
fn import_reader_reports_bad_rows_without_aborting() {
    let period = Uuid::new_v4();
    let store = Arc::new(MemoryStore::default());
    let import = ImportService::new(store.clone());

    let csv_data = "\
account_number,name,fund_type,budgeted_amount,actual_amount
410,Water Revenue,Enterprise,\"$500,000\",0
410.1,Metered Sales,Enterprise,350000,120000
410.2,,Enterprise,150000,80000
420,Sewer Revenue,No Such Fund,100,0
";
    let outcomes = import
        .reconcile_reader(period, csv_data.as_bytes())
        .expect("reconcile");

    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[0].status, RowStatus::Created);
    assert_eq!(outcomes[1].status, RowStatus::Created);
    assert!(matches!(outcomes[2].status, RowStatus::Invalid(_)));
    assert!(matches!(outcomes[3].status, RowStatus::Invalid(_)));
    assert_eq!(store.snapshot(period).expect("snapshot").len(), 2);

    let root = store
        .snapshot(period)
        .expect("snapshot")
        .into_iter()
        .find(|node| node.account_number == number("410"))
        .expect("root");
    assert_eq!(root.budgeted_amount, dec!(500000));
}

/// Store double that commits a rival update to one node right after the
/// first snapshot is taken, so the snapshot's cached version goes stale.
struct RivalSessionStore {
    inner: MemoryStore,
    target: Uuid,
    fired: AtomicBool,
}

impl NodeStore for RivalSessionStore {
    fn snapshot(&self, period_id: Uuid) -> Result<Vec<AccountNode>, CoreError> {
        let snapshot = self.inner.snapshot(period_id)?;
        if !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(current) = self.inner.fetch(self.target)? {
                let changes =
                    NodeChanges::default().with_actual(current.actual_amount + dec!(1));
                self.inner
                    .compare_and_update(self.target, current.version, &changes)?;
            }
        }
        Ok(snapshot)
    }

    fn fetch(&self, id: Uuid) -> Result<Option<AccountNode>, CoreError> {
        self.inner.fetch(id)
    }

    fn insert(&self, node: AccountNode) -> Result<AccountNode, CoreError> {
        self.inner.insert(node)
    }

    fn compare_and_update(
        &self,
        id: Uuid,
        expected_version: u64,
        changes: &NodeChanges,
    ) -> Result<CasOutcome, CoreError> {
        self.inner.compare_and_update(id, expected_version, changes)
    }

    fn compare_and_delete(
        &self,
        id: Uuid,
        expected_version: u64,
    ) -> Result<CasOutcome, CoreError> {
        self.inner.compare_and_delete(id, expected_version)
    }
}

#[test]
fn import_isolates_a_conflicting_row_from_its_siblings() {
    let period = Uuid::new_v4();
    let water = node(period, None, "410", dec!(100), dec!(10));
    let sewer = node(period, None, "420", dec!(200), dec!(20));
    let water_id = water.id;
    let sewer_id = sewer.id;
    let store = Arc::new(RivalSessionStore {
        inner: MemoryStore::with_nodes(vec![water, sewer]),
        target: water_id,
        fired: AtomicBool::new(false),
    });
    let import = ImportService::new(store.clone());

    let rows = vec![
        ImportRow {
            account_number: number("410"),
            name: "Water Revenue".into(),
            fund_type: FundType::General,
            budgeted_amount: dec!(150),
            actual_amount: dec!(15),
        },
        ImportRow {
            account_number: number("420"),
            name: "Sewer Revenue".into(),
            fund_type: FundType::General,
            budgeted_amount: dec!(250),
            actual_amount: dec!(25),
        },
    ];
    let outcomes = import.reconcile(period, &rows).expect("reconcile");

    assert_eq!(outcomes[0].status, RowStatus::Conflict);
    assert_eq!(outcomes[1].status, RowStatus::Updated);

    // The rival's commit survives untouched; the sibling row landed.
    let water = store.fetch(water_id).expect("fetch").expect("water");
    assert_eq!(water.version, 1);
    assert_eq!(water.actual_amount, dec!(11));
    let sewer = store.fetch(sewer_id).expect("fetch").expect("sewer");
    assert_eq!(sewer.version, 1);
    assert_eq!(sewer.budgeted_amount, dec!(250));
}
