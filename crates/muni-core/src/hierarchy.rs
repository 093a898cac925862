//! Resolves a flat node set into a validated account tree.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use muni_domain::AccountNode;

use crate::error::CoreError;

/// A validated chart-of-accounts forest for one period.
///
/// Ownership model: the tree exclusively owns the parent → children edges
/// as sorted id lists; the `parent_id` on each node stays a non-owning
/// lookup field. No bidirectional references, so no reference cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountTree {
    period_id: Uuid,
    nodes: HashMap<Uuid, AccountNode>,
    children: HashMap<Uuid, Vec<Uuid>>,
    roots: Vec<Uuid>,
}

impl AccountTree {
    /// Builds the tree from a period snapshot, or fails on the first
    /// structural violation. Pure function over its input; the store is
    /// never consulted.
    pub fn resolve(nodes: Vec<AccountNode>) -> Result<Self, CoreError> {
        let mut by_id: HashMap<Uuid, AccountNode> = HashMap::with_capacity(nodes.len());
        let mut numbers: HashSet<String> = HashSet::with_capacity(nodes.len());
        let mut period_id = None;

        for node in nodes {
            match period_id {
                None => period_id = Some(node.period_id),
                Some(expected) if expected != node.period_id => {
                    return Err(CoreError::Validation(format!(
                        "node {} belongs to period {}, expected {}",
                        node.id, node.period_id, expected
                    )));
                }
                Some(_) => {}
            }
            if !numbers.insert(node.account_number.as_str().to_string()) {
                return Err(CoreError::DuplicateNumber(node.account_number));
            }
            let id = node.id;
            if by_id.insert(id, node).is_some() {
                return Err(CoreError::DuplicateNode(id));
            }
        }
        // An empty input resolves to an empty forest under the nil period.
        let period_id = period_id.unwrap_or_else(Uuid::nil);

        Self::check_parent_links(&by_id)?;
        Self::check_cycles(&by_id)?;
        Self::check_numbering(&by_id)?;

        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut roots = Vec::new();
        for node in by_id.values() {
            match node.parent_id {
                Some(parent) => children.entry(parent).or_default().push(node.id),
                None => roots.push(node.id),
            }
        }
        let by_number =
            |a: &Uuid, b: &Uuid| by_id[a].account_number.cmp(&by_id[b].account_number);
        for list in children.values_mut() {
            list.sort_by(&by_number);
        }
        roots.sort_by(&by_number);

        Ok(Self {
            period_id,
            nodes: by_id,
            children,
            roots,
        })
    }

    fn check_parent_links(nodes: &HashMap<Uuid, AccountNode>) -> Result<(), CoreError> {
        for node in nodes.values() {
            if let Some(parent) = node.parent_id {
                if !nodes.contains_key(&parent) {
                    return Err(CoreError::UnknownParent {
                        node: node.id,
                        parent,
                    });
                }
            }
        }
        Ok(())
    }

    /// Visited/in-progress marking walk over parent chains. The first node
    /// seen twice on the active path names the cycle.
    fn check_cycles(nodes: &HashMap<Uuid, AccountNode>) -> Result<(), CoreError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }
        let mut marks: HashMap<Uuid, Mark> = HashMap::with_capacity(nodes.len());

        for start in nodes.keys() {
            if marks.contains_key(start) {
                continue;
            }
            let mut path = Vec::new();
            let mut current = Some(*start);
            while let Some(id) = current {
                match marks.get(&id) {
                    Some(Mark::Done) => break,
                    Some(Mark::InProgress) => return Err(CoreError::CycleDetected(id)),
                    None => {
                        marks.insert(id, Mark::InProgress);
                        path.push(id);
                        current = nodes.get(&id).and_then(|node| node.parent_id);
                    }
                }
            }
            for id in path {
                marks.insert(id, Mark::Done);
            }
        }
        Ok(())
    }

    /// Cross-validates account numbers against the resolved parent chain:
    /// a child's number must extend its parent's by exactly one segment.
    fn check_numbering(nodes: &HashMap<Uuid, AccountNode>) -> Result<(), CoreError> {
        for node in nodes.values() {
            let Some(parent_id) = node.parent_id else {
                continue;
            };
            let parent = &nodes[&parent_id];
            if !node.account_number.is_child_of(&parent.account_number) {
                return Err(CoreError::HierarchyMismatch {
                    node: node.id,
                    number: node.account_number.clone(),
                    expected_prefix: parent.account_number.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn period_id(&self) -> Uuid {
        self.period_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: Uuid) -> Option<&AccountNode> {
        self.nodes.get(&id)
    }

    /// Root ids in account-number order.
    pub fn roots(&self) -> &[Uuid] {
        &self.roots
    }

    /// Child ids in account-number order; empty for leaves.
    pub fn children_of(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_leaf(&self, id: Uuid) -> bool {
        self.children_of(id).is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountNode> {
        self.nodes.values()
    }

    /// Node ids in depth-first preorder (roots and siblings in
    /// account-number order). Every parent precedes its descendants.
    pub fn preorder(&self) -> Vec<Uuid> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<Uuid> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.children_of(id).iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    /// Flattens back to the node set in preorder. Resolving the output
    /// reproduces a structurally equal tree.
    pub fn flatten(&self) -> Vec<AccountNode> {
        self.preorder()
            .into_iter()
            .map(|id| self.nodes[&id].clone())
            .collect()
    }
}
