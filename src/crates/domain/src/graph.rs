//! Task graph: the DAG of CAD operations produced by the Planner (spec §3, §4.5).

use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A scalar or vector parameter value passed to a task node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Vector(Vec<f64>),
}

/// One operation in the task graph (e.g. `create_sketch`, `pad`, `pocket`, `fillet`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: String,
    pub operation: String,
    pub parameters: HashMap<String, ParamValue>,
    pub dependencies: HashSet<String>,
}

impl TaskNode {
    pub fn new(id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operation: operation.into(),
            parameters: HashMap::new(),
            dependencies: HashSet::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_dependency(mut self, node_id: impl Into<String>) -> Self {
        self.dependencies.insert(node_id.into());
        self
    }
}

/// Directed acyclic graph of task nodes, as emitted by the Planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskGraph {
    pub nodes: Vec<TaskNode>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Gray,
    Black,
}

impl TaskGraph {
    pub fn new(nodes: Vec<TaskNode>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Verify that every dependency id refers to a node that is present
    /// in the graph (spec §4.5 step 5). Does not check ordering; a
    /// dependency may point at a node that appears later in `nodes` — the
    /// cycle check in `topological_sort` is what enforces DAG-ness.
    pub fn check_dependencies_resolve(&self) -> Result<()> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for node in &self.nodes {
            for dep in &node.dependencies {
                if !ids.contains(dep.as_str()) {
                    return Err(DomainError::DanglingDependency(
                        node.id.clone(),
                        dep.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Topologically sort the graph, detecting cycles with a gray/black
    /// depth-first marking (spec §4.5 step 4). Ties are broken by the
    /// node's position in `nodes`, so two calls on the same graph produce
    /// the same order (spec §8 idempotence law).
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        if self.nodes.is_empty() {
            return Err(DomainError::EmptyGraph);
        }
        self.check_dependencies_resolve()?;

        let index_of: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut order: Vec<String> = Vec::with_capacity(self.nodes.len());

        fn visit<'a>(
            id: &'a str,
            nodes: &'a [TaskNode],
            index_of: &HashMap<&'a str, usize>,
            marks: &mut HashMap<&'a str, Mark>,
            order: &mut Vec<String>,
        ) -> Result<()> {
            match marks.get(id) {
                Some(Mark::Black) => return Ok(()),
                Some(Mark::Gray) => return Err(DomainError::CyclicGraph),
                None => {}
            }
            marks.insert(id, Mark::Gray);
            let idx = index_of[id];
            let node = &nodes[idx];

            let mut deps: Vec<&str> = node.dependencies.iter().map(|s| s.as_str()).collect();
            deps.sort_by_key(|d| index_of[d]);
            for dep in deps {
                visit(dep, nodes, index_of, marks, order)?;
            }

            marks.insert(id, Mark::Black);
            order.push(id.to_string());
            Ok(())
        }

        for node in &self.nodes {
            visit(&node.id, &self.nodes, &index_of, &mut marks, &mut order)?;
        }

        Ok(order)
    }

    /// Operation histogram used in the `plan_generated` audit event payload.
    pub fn operation_histogram(&self) -> HashMap<String, usize> {
        let mut hist = HashMap::new();
        for node in &self.nodes {
            *hist.entry(node.operation.clone()).or_insert(0) += 1;
        }
        hist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, deps: &[&str]) -> TaskNode {
        let mut n = TaskNode::new(id, "op");
        for d in deps {
            n = n.with_dependency(*d);
        }
        n
    }

    #[test]
    fn single_node_sorts_trivially() {
        let g = TaskGraph::new(vec![node("a", &[])]);
        assert_eq!(g.topological_sort().unwrap(), vec!["a"]);
    }

    #[test]
    fn linear_chain_sorts_in_dependency_order() {
        let g = TaskGraph::new(vec![node("c", &["b"]), node("b", &["a"]), node("a", &[])]);
        assert_eq!(g.topological_sort().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_is_detected() {
        let g = TaskGraph::new(vec![node("a", &["b"]), node("b", &["a"])]);
        assert!(matches!(
            g.topological_sort(),
            Err(DomainError::CyclicGraph)
        ));
    }

    #[test]
    fn dangling_dependency_is_detected() {
        let g = TaskGraph::new(vec![node("a", &["missing"])]);
        assert!(matches!(
            g.topological_sort(),
            Err(DomainError::DanglingDependency(_, _))
        ));
    }

    #[test]
    fn empty_graph_is_invalid() {
        let g = TaskGraph::new(vec![]);
        assert!(matches!(g.topological_sort(), Err(DomainError::EmptyGraph)));
    }

    #[test]
    fn sort_is_deterministic_across_calls() {
        let g = TaskGraph::new(vec![
            node("d", &["b", "c"]),
            node("c", &["a"]),
            node("b", &["a"]),
            node("a", &[]),
        ]);
        let first = g.topological_sort().unwrap();
        let second = g.topological_sort().unwrap();
        assert_eq!(first, second);
    }
}
