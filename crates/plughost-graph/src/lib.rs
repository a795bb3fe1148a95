// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dependency graph with deterministic load ordering.
//!
//! Edges read "parent depends on child": a child must be ready before its
//! parent. [`DependencyGraph::compute_load_order`] peels the graph in layers,
//! emitting every node whose dependencies were already emitted, in insertion
//! order, until the graph is empty. A layer that emits nothing means the rest
//! of the graph is cyclic and the whole computation fails.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use thiserror::Error;

/// Errors raised while building a graph.
#[derive(Debug, Error)]
pub enum GraphError<T: fmt::Debug> {
    /// A node cannot depend on itself.
    #[error("node {0:?} cannot depend on itself")]
    SelfLoop(T),
}

/// The graph contains a cycle. Carries the unresolved remainder of the graph:
/// every node that could not be ordered with its still-unresolved dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle among {} unresolved node(s): {}", .remaining.len(), describe(.remaining))]
pub struct CycleError<T: fmt::Debug> {
    pub remaining: Vec<(T, Vec<T>)>,
}

impl<T: fmt::Debug> CycleError<T> {
    /// Nodes left unresolved, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.remaining.iter().map(|(node, _)| node)
    }
}

fn describe<T: fmt::Debug>(remaining: &[(T, Vec<T>)]) -> String {
    remaining
        .iter()
        .map(|(node, deps)| format!("{node:?} -> {deps:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Directed graph over nodes of type `T`.
#[derive(Debug, Clone)]
pub struct DependencyGraph<T> {
    nodes: Vec<T>,
    index: HashMap<T, usize>,
    deps: Vec<Vec<usize>>,
}

impl<T> Default for DependencyGraph<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            deps: Vec::new(),
        }
    }
}

impl<T: Clone + Eq + Hash + fmt::Debug> DependencyGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `node` if absent. Returns true when it was inserted.
    pub fn add_node(&mut self, node: T) -> bool {
        if self.index.contains_key(&node) {
            return false;
        }
        self.intern(node);
        true
    }

    /// Records that `parent` depends on `child`, adding either node if absent.
    pub fn add_dependency(&mut self, parent: T, child: T) -> Result<(), GraphError<T>> {
        if parent == child {
            return Err(GraphError::SelfLoop(parent));
        }
        let p = self.intern(parent);
        let c = self.intern(child);
        if !self.deps[p].contains(&c) {
            self.deps[p].push(c);
        }
        Ok(())
    }

    pub fn contains(&self, node: &T) -> bool {
        self.index.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of `node`, in the order they were added.
    pub fn dependencies_of(&self, node: &T) -> Vec<&T> {
        self.index
            .get(node)
            .map(|&i| self.deps[i].iter().map(|&d| &self.nodes[d]).collect())
            .unwrap_or_default()
    }

    /// Linearizes the graph so that every node follows all of its dependencies.
    ///
    /// Works on a copy of the remaining-dependency counts; `self` is untouched.
    pub fn compute_load_order(&self) -> Result<Vec<T>, CycleError<T>> {
        let n = self.nodes.len();
        let mut emitted = vec![false; n];
        let mut order = Vec::with_capacity(n);

        while order.len() < n {
            let layer: Vec<usize> = (0..n)
                .filter(|&i| !emitted[i] && self.deps[i].iter().all(|&d| emitted[d]))
                .collect();

            if layer.is_empty() {
                let remaining = (0..n)
                    .filter(|&i| !emitted[i])
                    .map(|i| {
                        let pending = self.deps[i]
                            .iter()
                            .filter(|&&d| !emitted[d])
                            .map(|&d| self.nodes[d].clone())
                            .collect();
                        (self.nodes[i].clone(), pending)
                    })
                    .collect();
                return Err(CycleError { remaining });
            }

            for i in layer {
                emitted[i] = true;
                order.push(self.nodes[i].clone());
            }
        }

        Ok(order)
    }

    fn intern(&mut self, node: T) -> usize {
        if let Some(&i) = self.index.get(&node) {
            return i;
        }
        let i = self.nodes.len();
        self.index.insert(node.clone(), i);
        self.nodes.push(node);
        self.deps.push(Vec::new());
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_has_empty_order() {
        let g: DependencyGraph<&str> = DependencyGraph::new();
        assert_eq!(g.compute_load_order().unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn children_come_before_parents() {
        let mut g = DependencyGraph::new();
        g.add_dependency("app", "lib").unwrap();
        g.add_dependency("lib", "core").unwrap();
        assert_eq!(g.compute_load_order().unwrap(), vec!["core", "lib", "app"]);
    }

    #[test]
    fn independent_nodes_keep_insertion_order() {
        let mut g = DependencyGraph::new();
        g.add_node("zeta");
        g.add_node("alpha");
        g.add_node("mid");
        assert_eq!(g.compute_load_order().unwrap(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn layers_are_emitted_in_insertion_order() {
        let mut g = DependencyGraph::new();
        g.add_node("b");
        g.add_node("a");
        g.add_dependency("c", "a").unwrap();
        g.add_dependency("d", "b").unwrap();
        // Layer 1: b, a. Layer 2: c, d.
        assert_eq!(g.compute_load_order().unwrap(), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut g = DependencyGraph::new();
        let err = g.add_dependency("a", "a").unwrap_err();
        assert!(matches!(err, GraphError::SelfLoop("a")));
        assert!(g.is_empty());
    }

    #[test]
    fn cycle_reports_unresolved_remainder() {
        let mut g = DependencyGraph::new();
        g.add_node("free");
        g.add_dependency("a", "b").unwrap();
        g.add_dependency("b", "c").unwrap();
        g.add_dependency("c", "a").unwrap();
        g.add_dependency("top", "a").unwrap();

        let err = g.compute_load_order().unwrap_err();
        let nodes: Vec<_> = err.nodes().copied().collect();
        assert_eq!(nodes, vec!["a", "b", "c", "top"]);
        assert!(err.to_string().contains("4 unresolved"));
    }

    #[test]
    fn computing_order_does_not_mutate_graph() {
        let mut g = DependencyGraph::new();
        g.add_dependency("x", "y").unwrap();
        let first = g.compute_load_order().unwrap();
        let second = g.compute_load_order().unwrap();
        assert_eq!(first, second);
        assert_eq!(g.len(), 2);
        assert_eq!(g.dependencies_of(&"x"), vec![&"y"]);
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        let mut g = DependencyGraph::new();
        g.add_dependency("x", "y").unwrap();
        g.add_dependency("x", "y").unwrap();
        assert_eq!(g.dependencies_of(&"x").len(), 1);
    }
}
