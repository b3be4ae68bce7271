//! Graph algorithms: traversal, shortest path, components, subgraphs.
//!
//! All results are deterministic. Neighbours are visited in relationship
//! insertion order, so BFS ties are broken by the order edges were added.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use super::{GraphStore, NodeId};
use crate::error::{ArchitectumError, Result};

/// Which edges a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

impl GraphStore {
    /// Neighbours of `id` in relationship insertion order (may repeat).
    pub fn neighbors(&self, id: &NodeId, direction: Direction) -> Vec<&NodeId> {
        let mut seqs: Vec<(u64, &NodeId)> = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            if let Some(out) = self.outgoing.get(id) {
                for seq in out {
                    if let Some(rel) = self.relationships.get(seq) {
                        seqs.push((*seq, &rel.target_id));
                    }
                }
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            if let Some(inc) = self.incoming.get(id) {
                for seq in inc {
                    if let Some(rel) = self.relationships.get(seq) {
                        seqs.push((*seq, &rel.source_id));
                    }
                }
            }
        }
        seqs.sort_by_key(|(seq, _)| *seq);
        seqs.into_iter().map(|(_, id)| id).collect()
    }

    /// Breadth-first traversal from `start`.
    ///
    /// Returns visited ids in visit order, `start` first. `max_depth = None`
    /// is unlimited; `Some(0)` returns only `start`.
    pub fn traverse(
        &self,
        start: &NodeId,
        direction: Direction,
        max_depth: Option<usize>,
    ) -> Result<Vec<NodeId>> {
        if !self.contains_node(start) {
            return Err(ArchitectumError::not_found("node", start.as_str()));
        }

        let mut visited: HashSet<&NodeId> = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<(&NodeId, usize)> = VecDeque::new();

        visited.insert(start);
        queue.push_back((start, 0));

        while let Some((current, depth)) = queue.pop_front() {
            order.push(current.clone());
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for next in self.neighbors(current, direction) {
                if visited.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }
        Ok(order)
    }

    /// Shortest directed path from `from` to `to`, both inclusive.
    ///
    /// `Ok(None)` when `to` is unreachable.
    pub fn shortest_path(&self, from: &NodeId, to: &NodeId) -> Result<Option<Vec<NodeId>>> {
        for id in [from, to] {
            if !self.contains_node(id) {
                return Err(ArchitectumError::not_found("node", id.as_str()));
            }
        }
        if from == to {
            return Ok(Some(vec![from.clone()]));
        }

        let mut previous: HashMap<&NodeId, &NodeId> = HashMap::new();
        let mut visited: HashSet<&NodeId> = HashSet::from([from]);
        let mut queue: VecDeque<&NodeId> = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(current, Direction::Outgoing) {
                if !visited.insert(next) {
                    continue;
                }
                previous.insert(next, current);
                if next == to {
                    let mut path = vec![to.clone()];
                    let mut cursor = to;
                    while let Some(prev) = previous.get(cursor) {
                        path.push((*prev).clone());
                        cursor = *prev;
                    }
                    path.reverse();
                    return Ok(Some(path));
                }
                queue.push_back(next);
            }
        }
        Ok(None)
    }

    /// Weakly connected components.
    ///
    /// Components are ordered by their earliest-inserted member; members are
    /// listed in node insertion order.
    pub fn connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut assigned: HashSet<&NodeId> = HashSet::new();
        let mut components = Vec::new();

        for id in self.node_order.values() {
            if assigned.contains(id) {
                continue;
            }
            let mut members: Vec<&NodeId> = Vec::new();
            let mut queue: VecDeque<&NodeId> = VecDeque::from([id]);
            assigned.insert(id);
            while let Some(current) = queue.pop_front() {
                members.push(current);
                for next in self.neighbors(current, Direction::Both) {
                    if assigned.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            members.sort_by_key(|member| self.node_seq(member).unwrap_or(u64::MAX));
            components.push(members.into_iter().cloned().collect());
        }
        components
    }

    /// Induced subgraph over `ids`.
    ///
    /// Keeps the nodes in `ids` that exist and every relationship whose
    /// endpoints are both kept, preserving insertion order and the active
    /// detail level. Pending relationships are not carried over.
    pub fn subgraph<'a, I>(&self, ids: I) -> GraphStore
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let wanted: HashSet<&NodeId> = ids.into_iter().collect();
        let mut sub = GraphStore::with_detail_level(self.detail_level);

        for node in self.nodes() {
            if wanted.contains(&node.id) {
                let _ = sub.add_node(node.clone());
            }
        }
        for rel in self.relationships() {
            if sub.contains_node(&rel.source_id) && sub.contains_node(&rel.target_id) {
                let _ = sub.add_relationship(rel.clone());
            }
        }
        sub
    }
}
