// Copyright 2025 Irreducible Inc.
use arckit_core::{CircuitError, Signal};
use arckit_equivalence::EquivalenceError;

use crate::dag::NodeId;

#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, thiserror::Error)]
pub enum StructuralError {
	#[error("constraint {constraint} is assigned to {count} parts")]
	NotAPartition { constraint: usize, count: usize },
	#[error("{0} is not a live node")]
	DeadNode(NodeId),
	#[error("merging {a} and {b} would create a cycle")]
	MergeCreatesCycle { a: NodeId, b: NodeId },
	#[error("the node graph has a cycle through {0}")]
	Cyclic(NodeId),
	#[error("signal {signal} is shared by {from} and {to} but not passed along the edge")]
	Boundary {
		signal: Signal,
		from: NodeId,
		to: NodeId,
	},
	#[error("sub-circuit extraction failed: {0}")]
	Circuit(#[from] CircuitError),
	#[error("equivalence check failed: {0}")]
	Equivalence(#[from] EquivalenceError),
}
