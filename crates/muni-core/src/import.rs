//! Merges external tabular rows into an existing period.
//!
//! Every row is routed through the mutation service individually, so
//! import shares the engine's conflict semantics. A batch is not a
//! transaction: some rows commit while others conflict, and each row gets
//! its own outcome.

use std::{collections::HashMap, io::Read, str::FromStr, sync::Arc};

use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use muni_domain::{AccountNode, AccountNumber, FundType, ImportRow};

use crate::{
    error::CoreError,
    mutation::{MutationService, NodeDraft},
    store::{NodeChanges, NodeStore},
};

/// Terminal state of one import row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowStatus {
    Created,
    Updated,
    /// Another session advanced the matched node mid-import.
    Conflict,
    /// The row was malformed or failed validation; carries the reason.
    Invalid(String),
}

/// Per-row report; a failing row never aborts its siblings.
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome {
    /// 1-based input line of the row.
    pub line: usize,
    pub account_number: String,
    pub status: RowStatus,
}

/// Reconciles spreadsheet rows against a period's chart of accounts,
/// matching on account number.
#[derive(Clone)]
pub struct ImportService {
    store: Arc<dyn NodeStore>,
    mutations: MutationService,
}

impl ImportService {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        let mutations = MutationService::new(Arc::clone(&store));
        Self { store, mutations }
    }

    /// Merges typed rows into the period. Rows match existing nodes by
    /// identical account number and become updates carrying the matched
    /// node's current version; unmatched rows become new nodes parented
    /// under the longest existing prefix of their number, with placeholder
    /// ancestors created for gaps in the prefix chain.
    pub fn reconcile(
        &self,
        period_id: Uuid,
        rows: &[ImportRow],
    ) -> Result<Vec<RowOutcome>, CoreError> {
        let numbered: Vec<(usize, ImportRow)> = rows
            .iter()
            .cloned()
            .enumerate()
            .map(|(idx, row)| (idx + 1, row))
            .collect();
        self.reconcile_numbered(period_id, numbered, Vec::new())
    }

    /// Reads the ordered CSV column format
    /// (`account_number, name, fund_type, budgeted_amount, actual_amount`),
    /// tolerating one header line, then reconciles. Rows that fail to
    /// parse become `Invalid` outcomes rather than batch errors.
    pub fn reconcile_reader<R: Read>(
        &self,
        period_id: Uuid,
        reader: R,
    ) -> Result<Vec<RowOutcome>, CoreError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        let mut failures = Vec::new();
        for (idx, result) in csv_reader.records().enumerate() {
            let line = idx + 1;
            let record = result.map_err(|err| CoreError::Storage(err.to_string()))?;
            if line == 1 && looks_like_header(&record) {
                continue;
            }
            let raw_number = record.get(0).unwrap_or("").trim().to_string();
            match parse_record(&record) {
                Ok(row) => rows.push((line, row)),
                Err(reason) => failures.push(RowOutcome {
                    line,
                    account_number: raw_number,
                    status: RowStatus::Invalid(reason),
                }),
            }
        }
        self.reconcile_numbered(period_id, rows, failures)
    }

    fn reconcile_numbered(
        &self,
        period_id: Uuid,
        rows: Vec<(usize, ImportRow)>,
        mut outcomes: Vec<RowOutcome>,
    ) -> Result<Vec<RowOutcome>, CoreError> {
        let snapshot = self.store.snapshot(period_id)?;
        let mut by_number: HashMap<AccountNumber, AccountNode> = snapshot
            .into_iter()
            .map(|node| (node.account_number.clone(), node))
            .collect();

        for (line, row) in rows {
            let status = self.reconcile_row(period_id, &row, &mut by_number);
            outcomes.push(RowOutcome {
                line,
                account_number: row.account_number.to_string(),
                status,
            });
        }
        outcomes.sort_by_key(|outcome| outcome.line);
        debug!(period = %period_id, rows = outcomes.len(), "import reconciled");
        Ok(outcomes)
    }

    fn reconcile_row(
        &self,
        period_id: Uuid,
        row: &ImportRow,
        by_number: &mut HashMap<AccountNumber, AccountNode>,
    ) -> RowStatus {
        if let Some(existing) = by_number.get(&row.account_number) {
            let changes = NodeChanges::default()
                .with_name(row.name.clone())
                .with_fund_type(row.fund_type)
                .with_budgeted(row.budgeted_amount)
                .with_actual(row.actual_amount);
            return match self
                .mutations
                .update_node(existing.id, existing.version, changes)
            {
                Ok(updated) => {
                    by_number.insert(updated.account_number.clone(), updated);
                    RowStatus::Updated
                }
                Err(err) => status_from_error(err),
            };
        }

        let parent_id = match self.ensure_ancestors(period_id, row, by_number) {
            Ok(parent_id) => parent_id,
            Err(status) => return status,
        };
        let draft = NodeDraft {
            account_number: row.account_number.clone(),
            name: row.name.clone(),
            fund_type: row.fund_type,
            budgeted_amount: row.budgeted_amount,
            actual_amount: row.actual_amount,
        };
        match self.mutations.create_node(period_id, parent_id, draft) {
            Ok(created) => {
                by_number.insert(created.account_number.clone(), created);
                RowStatus::Created
            }
            Err(err) => status_from_error(err),
        }
    }

    /// Walks the row's prefix chain, creating placeholder nodes for any
    /// gap between the longest existing prefix and the row's parent.
    /// Placeholders carry zero amounts and inherit the fund type of the
    /// nearest existing ancestor (the row's own fund type when the whole
    /// chain is new). Returns the parent id for the row's node.
    fn ensure_ancestors(
        &self,
        period_id: Uuid,
        row: &ImportRow,
        by_number: &mut HashMap<AccountNumber, AccountNode>,
    ) -> Result<Option<Uuid>, RowStatus> {
        let mut parent: Option<(Uuid, FundType)> = None;
        for ancestor in row.account_number.ancestors() {
            if let Some(existing) = by_number.get(&ancestor) {
                parent = Some((existing.id, existing.fund_type));
                continue;
            }
            let fund_type = parent.map(|(_, fund)| fund).unwrap_or(row.fund_type);
            let draft = NodeDraft {
                account_number: ancestor.clone(),
                name: format!("{} (placeholder)", ancestor),
                fund_type,
                budgeted_amount: Decimal::ZERO,
                actual_amount: Decimal::ZERO,
            };
            let parent_id = parent.map(|(id, _)| id);
            match self.mutations.create_node(period_id, parent_id, draft) {
                Ok(created) => {
                    parent = Some((created.id, created.fund_type));
                    by_number.insert(created.account_number.clone(), created);
                }
                Err(err) => return Err(status_from_error(err)),
            }
        }
        Ok(parent.map(|(id, _)| id))
    }
}

fn status_from_error(err: CoreError) -> RowStatus {
    match err {
        CoreError::Conflict(_) | CoreError::DuplicateNumber(_) | CoreError::DuplicateNode(_) => {
            RowStatus::Conflict
        }
        other => RowStatus::Invalid(other.to_string()),
    }
}

/// Parses one CSV record in the ordered external column format.
pub fn parse_record(record: &csv::StringRecord) -> Result<ImportRow, String> {
    if record.len() < 5 {
        return Err(format!("expected 5 columns, found {}", record.len()));
    }
    let account_number = AccountNumber::parse(record[0].trim()).map_err(|err| err.to_string())?;
    let name = record[1].trim().to_string();
    if name.is_empty() {
        return Err("name column is empty".into());
    }
    let fund_type = FundType::parse(record[2].trim())
        .ok_or_else(|| format!("unknown fund type `{}`", record[2].trim()))?;
    let budgeted_amount = parse_amount(&record[3])?;
    let actual_amount = parse_amount(&record[4])?;
    Ok(ImportRow {
        account_number,
        name,
        fund_type,
        budgeted_amount,
        actual_amount,
    })
}

fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let cleaned = raw.replace(['$', ','], "");
    Decimal::from_str(cleaned.trim()).map_err(|_| format!("invalid amount `{}`", raw.trim()))
}

/// A header line is one whose amount columns do not parse as numbers.
fn looks_like_header(record: &csv::StringRecord) -> bool {
    record.len() >= 5
        && parse_amount(&record[3]).is_err()
        && parse_amount(&record[4]).is_err()
}
