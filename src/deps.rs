//! Task dependency graph and cycle detection.
//!
//! Edges point from a task to a task it depends on. Dependencies and parent
//! links are both checked when written, so a stored graph never contains a
//! cycle.

use crate::error::{LedgerError, LedgerResult};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Whether adding `task -> depends_on` would close a cycle.
///
/// Breadth-first search from `depends_on` over existing edges; reaching
/// `task` means `depends_on` already (transitively) depends on it.
/// `edges_of` returns the outgoing edges of a node.
pub fn would_create_cycle<F, E>(task: &str, depends_on: &str, mut edges_of: F) -> Result<bool, E>
where
    F: FnMut(&str) -> Result<Vec<String>, E>,
{
    if task == depends_on {
        return Ok(true);
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(depends_on.to_string());

    while let Some(current) = queue.pop_front() {
        if current == task {
            return Ok(true);
        }
        if !visited.insert(current.clone()) {
            continue;
        }
        for next in edges_of(&current)? {
            if !visited.contains(&next) {
                queue.push_back(next);
            }
        }
    }

    Ok(false)
}

/// In-memory dependency graph for a set of tasks.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `task -> depends_on`, rejecting edges that would form a cycle.
    pub fn add(&mut self, task: &str, depends_on: &str) -> LedgerResult<()> {
        let cycle = would_create_cycle::<_, LedgerError>(task, depends_on, |node| {
            Ok(self
                .edges
                .get(node)
                .map(|deps| deps.iter().cloned().collect())
                .unwrap_or_default())
        })?;
        if cycle {
            return Err(LedgerError::dependency_cycle(task, depends_on));
        }
        self.edges
            .entry(task.to_string())
            .or_default()
            .insert(depends_on.to_string());
        Ok(())
    }

    pub fn remove(&mut self, task: &str, depends_on: &str) -> bool {
        self.edges
            .get_mut(task)
            .is_some_and(|deps| deps.remove(depends_on))
    }

    pub fn dependencies_of(&self, task: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(task)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Dependencies of `task` that are not in `completed`.
    pub fn unmet<'a>(&'a self, task: &str, completed: &BTreeSet<String>) -> Vec<&'a str> {
        self.edges
            .get(task)
            .into_iter()
            .flat_map(|deps| deps.iter())
            .filter(|dep| !completed.contains(*dep))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        let err = graph.add("a", "a").unwrap_err();
        assert!(matches!(err, LedgerError::DependencyCycle { .. }));
    }

    #[test]
    fn direct_and_transitive_cycles_are_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add("a", "b").unwrap();
        graph.add("b", "c").unwrap();
        assert!(graph.add("b", "a").is_err());
        assert!(graph.add("c", "a").is_err());
        // Diamond is fine.
        graph.add("a", "c").unwrap();
        graph.add("d", "a").unwrap();
    }

    #[test]
    fn removing_an_edge_allows_the_reverse() {
        let mut graph = DependencyGraph::new();
        graph.add("a", "b").unwrap();
        assert!(graph.remove("a", "b"));
        graph.add("b", "a").unwrap();
        assert!(!graph.remove("a", "b"));
    }

    #[test]
    fn unmet_lists_incomplete_dependencies() {
        let mut graph = DependencyGraph::new();
        graph.add("a", "b").unwrap();
        graph.add("a", "c").unwrap();
        let completed: BTreeSet<String> = ["b".to_string()].into_iter().collect();
        assert_eq!(graph.unmet("a", &completed), vec!["c"]);
        assert_eq!(graph.dependencies_of("a").count(), 2);
    }

    #[test]
    fn edge_lookup_errors_propagate() {
        let result = would_create_cycle("a", "b", |_| Err::<Vec<String>, _>("boom"));
        assert_eq!(result, Err("boom"));
    }
}
