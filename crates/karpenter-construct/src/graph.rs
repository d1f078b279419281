//! Declarative ordering edges between declared resources
//!
//! Edges are metadata: they record that one resource must be realized after
//! another, nothing here enforces it. The graph is keyed by resource id and
//! kept in ordered maps so every traversal is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use karpenter_common::{Error, Result};

use crate::engine::ResourceRef;

/// Dependency graph over [`ResourceRef`]s
///
/// An edge `a -> b` means "`a` depends on `b`" (`b` must exist first).
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    vertices: BTreeSet<ResourceRef>,
    /// resource -> what it depends on
    edges_out: BTreeMap<ResourceRef, BTreeSet<ResourceRef>>,
    /// resource -> what depends on it
    edges_in: BTreeMap<ResourceRef, BTreeSet<ResourceRef>>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource with no edges; no-op if already present
    pub fn add_node(&mut self, node: &ResourceRef) {
        self.vertices.insert(node.clone());
    }

    /// Record that `dependent` must be realized after `dependency`
    ///
    /// Both ends are added as vertices if missing.
    pub fn add_edge(&mut self, dependent: &ResourceRef, dependency: &ResourceRef) {
        self.add_node(dependent);
        self.add_node(dependency);
        self.edges_out
            .entry(dependent.clone())
            .or_default()
            .insert(dependency.clone());
        self.edges_in
            .entry(dependency.clone())
            .or_default()
            .insert(dependent.clone());
    }

    /// Check whether a resource is known
    pub fn contains(&self, node: &ResourceRef) -> bool {
        self.vertices.contains(node)
    }

    /// Direct dependencies of a resource, sorted by id
    pub fn dependencies_of(&self, node: &ResourceRef) -> Vec<ResourceRef> {
        self.edges_out
            .get(node)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Resources that directly depend on `node`, sorted by id
    pub fn dependents_of(&self, node: &ResourceRef) -> Vec<ResourceRef> {
        self.edges_in
            .get(node)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of resources in the graph
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Check if the graph has no resources
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Every resource ordered so dependencies come before their dependents
    ///
    /// Kahn's algorithm with an ordered ready set: among resources whose
    /// dependencies are all placed, the smallest id goes first.
    pub fn topological_order(&self) -> Result<Vec<ResourceRef>> {
        let mut remaining: BTreeMap<&ResourceRef, usize> = self
            .vertices
            .iter()
            .map(|v| (v, self.edges_out.get(v).map_or(0, BTreeSet::len)))
            .collect();

        let mut ready: BTreeSet<&ResourceRef> = remaining
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&v, _)| v)
            .collect();

        let mut order = Vec::with_capacity(self.vertices.len());
        while let Some(next) = ready.pop_first() {
            remaining.remove(next);
            order.push(next.clone());

            for dependent in self.edges_in.get(next).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if !remaining.is_empty() {
            let stuck: Vec<&str> = remaining.keys().map(|r| r.id()).collect();
            return Err(Error::validation(format!(
                "dependency cycle between: {}",
                stuck.join(", ")
            )));
        }

        Ok(order)
    }
}
