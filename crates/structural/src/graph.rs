// Copyright 2025 Irreducible Inc.
//! The constraint adjacency graph: constraints are vertices, and two constraints are adjacent
//! when they share a non-constant signal.

use std::collections::BTreeMap;

use arckit_core::Circuit;
use petgraph::{
	graph::{NodeIndex, UnGraph},
	visit::{Bfs, EdgeRef, NodeFiltered},
};

/// Weighted undirected graph over constraint indices.
///
/// The weight of an edge is the number of signals the two constraints share. Vertex `i` is
/// constraint `i`.
#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
	graph: UnGraph<(), usize>,
}

impl ConstraintGraph {
	pub fn new(circuit: &Circuit) -> Self {
		Self::restricted(circuit, |_| true)
	}

	/// The subgraph induced by the constraints `keep` accepts; the others become isolated.
	pub fn restricted(circuit: &Circuit, keep: impl Fn(usize) -> bool) -> Self {
		let mut weights = BTreeMap::<(usize, usize), usize>::new();
		for users in circuit.signal_to_constraints() {
			let users = users.into_iter().filter(|&c| keep(c)).collect::<Vec<_>>();
			for (i, &a) in users.iter().enumerate() {
				for &b in &users[i + 1..] {
					*weights.entry((a.min(b), a.max(b))).or_insert(0) += 1;
				}
			}
		}
		let mut graph = UnGraph::with_capacity(circuit.n_constraints(), weights.len());
		for _ in 0..circuit.n_constraints() {
			graph.add_node(());
		}
		graph.extend_with_edges(
			weights
				.into_iter()
				.map(|((a, b), w)| (NodeIndex::new(a), NodeIndex::new(b), w)),
		);
		Self { graph }
	}

	pub fn len(&self) -> usize {
		self.graph.node_count()
	}

	pub fn is_empty(&self) -> bool {
		self.graph.node_count() == 0
	}

	/// Neighbours of `vertex` with edge weights, in index order.
	pub fn neighbours(&self, vertex: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
		let mut edges = self
			.graph
			.edges(NodeIndex::new(vertex))
			.map(|edge| {
				let other = if edge.source().index() == vertex {
					edge.target()
				} else {
					edge.source()
				};
				(other.index(), *edge.weight())
			})
			.collect::<Vec<_>>();
		edges.sort_unstable();
		edges.into_iter()
	}

	pub fn degree(&self, vertex: usize) -> usize {
		self.graph
			.edges(NodeIndex::new(vertex))
			.map(|edge| *edge.weight())
			.sum()
	}

	/// Sum of all edge weights.
	pub fn total_weight(&self) -> usize {
		self.graph.edge_weights().sum()
	}

	/// Connected components among the vertices `keep` accepts, each sorted, ordered by their
	/// smallest vertex.
	pub fn components(&self, keep: impl Fn(usize) -> bool) -> Vec<Vec<usize>> {
		let kept = NodeFiltered::from_fn(&self.graph, |v: NodeIndex| keep(v.index()));
		let mut seen = vec![false; self.len()];
		let mut components = Vec::new();
		for start in self.graph.node_indices() {
			if seen[start.index()] || !keep(start.index()) {
				continue;
			}
			let mut component = Vec::new();
			let mut bfs = Bfs::new(&kept, start);
			while let Some(vertex) = bfs.next(&kept) {
				seen[vertex.index()] = true;
				component.push(vertex.index());
			}
			component.sort_unstable();
			components.push(component);
		}
		components
	}
}
