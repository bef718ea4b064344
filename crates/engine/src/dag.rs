//! DAG batch planning — run this before executing a workflow.
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the workflow.
//! 2. Every `depends_on` entry must name a node of the same workflow.
//! 3. The graph must be acyclic.
//!
//! Returns the nodes grouped into batches: batch *n* holds every node whose
//! dependencies all sit in batches *0..n*.  Nodes inside a batch keep their
//! declaration order but carry no ordering guarantee at execution time.

use std::collections::HashSet;

use crate::{models::WorkflowNode, EngineError};

/// Plan the execution batches for `nodes`.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownDependency`] if a node depends on a missing ID.
/// - [`EngineError::CycleDetected`] if some nodes can never become eligible.
pub fn plan_batches(nodes: &[WorkflowNode]) -> Result<Vec<Vec<String>>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Ensure node IDs are unique
    // -----------------------------------------------------------------------
    let mut ids: HashSet<&str> = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Validate dependency references
    // -----------------------------------------------------------------------
    for node in nodes {
        if let Some(missing) = node.depends_on.iter().find(|d| !ids.contains(d.as_str())) {
            return Err(EngineError::UnknownDependency {
                node_id: node.id.clone(),
                dependency: missing.clone(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3. Peel off eligible subsets until nothing is left
    // -----------------------------------------------------------------------
    let mut completed: HashSet<&str> = HashSet::with_capacity(nodes.len());
    let mut remaining: Vec<&WorkflowNode> = nodes.iter().collect();
    let mut batches = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&WorkflowNode>, Vec<&WorkflowNode>) = remaining
            .into_iter()
            .partition(|n| n.depends_on.iter().all(|d| completed.contains(d.as_str())));

        if ready.is_empty() {
            return Err(EngineError::CycleDetected {
                remaining: blocked.iter().map(|n| n.id.clone()).collect(),
            });
        }

        completed.extend(ready.iter().map(|&n| n.id.as_str()));
        batches.push(ready.iter().map(|n| n.id.clone()).collect());
        remaining = blocked;
    }

    Ok(batches)
}
