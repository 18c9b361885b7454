// Copyright 2025 Irreducible Inc.
//! Post-processing passes that merge DAG nodes while keeping the graph acyclic.

use std::collections::BTreeSet;

use crate::dag::{Dag, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
	/// Merge nodes that pass a signal from a predecessor straight on to a successor.
	pub passthrough: bool,
	/// Merge nodes made only of nonlinear constraints into a mixed neighbour.
	pub only_nonlinear: bool,
	/// Absorb nodes holding a single linear constraint into a neighbour.
	pub single_linear: bool,
}

impl Default for MergeOptions {
	fn default() -> Self {
		Self {
			passthrough: true,
			only_nonlinear: false,
			single_linear: false,
		}
	}
}

/// Merges every node accepted by `select` into its best scoring neighbour.
///
/// `child_score(dag, node, successor)` and `parent_score(dag, node, predecessor)` rate a
/// neighbour, `None` ruling it out. Candidates are tried from the highest score down, successors
/// before predecessors on ties, skipping those that would close a cycle. A node with no usable
/// candidate is fenced and not selected again. Returns the number of merges.
pub fn merge_under_property(
	dag: &mut Dag,
	select: impl Fn(&Dag, NodeId) -> bool,
	child_score: impl Fn(&Dag, NodeId, NodeId) -> Option<usize>,
	parent_score: impl Fn(&Dag, NodeId, NodeId) -> Option<usize>,
) -> usize {
	let mut fenced = BTreeSet::new();
	let mut merges = 0;
	while let Some(node) = next_selected(dag, &fenced, &select) {
		let target = best_candidate(dag, node, &child_score, &parent_score);
		match target.map(|id| dag.merge(node, id)) {
			Some(Ok(_)) => merges += 1,
			_ => {
				fenced.insert(node);
			}
		}
	}
	merges
}

fn next_selected(
	dag: &Dag,
	fenced: &BTreeSet<NodeId>,
	select: &impl Fn(&Dag, NodeId) -> bool,
) -> Option<NodeId> {
	dag.node_ids()
		.find(|&id| !fenced.contains(&id) && select(dag, id))
}

fn best_candidate(
	dag: &Dag,
	node: NodeId,
	child_score: &impl Fn(&Dag, NodeId, NodeId) -> Option<usize>,
	parent_score: &impl Fn(&Dag, NodeId, NodeId) -> Option<usize>,
) -> Option<NodeId> {
	let children = dag
		.successors(node)
		.into_iter()
		.filter_map(|child| Some((child_score(dag, node, child)?, 1, child)));
	let parents = dag
		.predecessors(node)
		.into_iter()
		.filter_map(|parent| Some((parent_score(dag, node, parent)?, 0, parent)));
	let mut candidates = children.chain(parents).collect::<Vec<_>>();
	// best score first, then successors, then lowest id
	candidates.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
	candidates
		.into_iter()
		.map(|(_, _, id)| id)
		.find(|&id| !dag.would_create_cycle(node, id))
}

/// Merges nodes with a passthrough signal into the neighbour holding most of those signals.
pub fn merge_passthrough(dag: &mut Dag) -> usize {
	let captured = |dag: &Dag, node: NodeId, other: NodeId| {
		let signals = dag.node(other).signals();
		let n = dag
			.node(node)
			.passthrough()
			.filter(|s| signals.contains(s))
			.count();
		(n > 0).then_some(n)
	};
	merge_under_property(
		dag,
		|dag, node| dag.node(node).passthrough().next().is_some(),
		captured,
		captured,
	)
}

/// Merges nodes made only of nonlinear constraints into a neighbour that is not.
pub fn merge_only_nonlinear(dag: &mut Dag) -> usize {
	let mixed = |dag: &Dag, node: NodeId, other: NodeId| {
		(!dag.is_only_nonlinear(other)).then(|| dag.shared_signals(node, other))
	};
	merge_under_property(dag, |dag, node| dag.is_only_nonlinear(node), mixed, mixed)
}

/// Absorbs nodes holding a single linear constraint into the neighbour sharing most signals.
pub fn merge_single_linear(dag: &mut Dag) -> usize {
	let shared = |dag: &Dag, node: NodeId, other: NodeId| Some(dag.shared_signals(node, other));
	merge_under_property(
		dag,
		|dag, node| match dag.node(node).constraints() {
			&[c] => !dag.circuit().constraint(c).is_nonlinear(),
			_ => false,
		},
		shared,
		shared,
	)
}

/// Runs the enabled passes in order: passthrough, only-nonlinear, single-linear.
pub fn run_merges(dag: &mut Dag, options: &MergeOptions) -> usize {
	let _span = tracing::debug_span!("merge", nodes = dag.len()).entered();
	let mut total = 0;
	if options.passthrough {
		let merges = merge_passthrough(dag);
		tracing::debug!(merges, "passthrough merge");
		total += merges;
	}
	if options.only_nonlinear {
		let merges = merge_only_nonlinear(dag);
		tracing::debug!(merges, "only-nonlinear merge");
		total += merges;
	}
	if options.single_linear {
		let merges = merge_single_linear(dag);
		tracing::debug!(merges, "single-linear merge");
		total += merges;
	}
	total
}
