// Copyright 2025 Irreducible Inc.
//! The DAG of constraint clusters.
//!
//! A partition is turned into a DAG by measuring every part's distance to the input side and to
//! the output side of the circuit, merging adjacent parts that cannot be told apart by those
//! distances, and orienting the remaining adjacencies from the input side towards the output
//! side. Nodes are addressed by [`NodeId`]; merging retires both nodes and pushes a new one, so
//! ids are never reused.

use std::{
	cell::OnceCell,
	cmp::Reverse,
	collections::{BTreeMap, BTreeSet},
};

use arckit_core::{Circuit, CircuitError, Signal};
use arckit_utils::UnionFind;
use cranelift_entity::{EntityRef, PrimaryMap, entity_impl};
use petgraph::{
	Direction,
	algo::{has_path_connecting, toposort},
	graph::{NodeIndex, UnGraph},
	graphmap::DiGraphMap,
	visit::{Bfs, EdgeRef, VisitMap},
};

use crate::{cluster::Partition, error::StructuralError, subcircuit::SubCircuit};

/// Node handle, stable across merges.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);
entity_impl!(NodeId, "node");

/// A group of constraints with the signals it exchanges with its neighbours.
#[derive(Debug, Clone)]
pub struct DagNode {
	constraints: Vec<usize>,
	signals: BTreeSet<Signal>,
	input_signals: BTreeSet<Signal>,
	output_signals: BTreeSet<Signal>,
	subcircuit: OnceCell<SubCircuit>,
}

impl DagNode {
	fn new(constraints: Vec<usize>, signals: BTreeSet<Signal>) -> Self {
		Self {
			constraints,
			signals,
			input_signals: BTreeSet::new(),
			output_signals: BTreeSet::new(),
			subcircuit: OnceCell::new(),
		}
	}

	/// Sorted constraint indices.
	pub fn constraints(&self) -> &[usize] {
		&self.constraints
	}

	/// Non-constant signals referenced by the constraints.
	pub fn signals(&self) -> &BTreeSet<Signal> {
		&self.signals
	}

	/// Signals shared with predecessors, and declared circuit inputs.
	pub fn input_signals(&self) -> &BTreeSet<Signal> {
		&self.input_signals
	}

	/// Signals shared with successors, and declared circuit outputs.
	pub fn output_signals(&self) -> &BTreeSet<Signal> {
		&self.output_signals
	}

	/// Signals that are both an input and an output of the node.
	pub fn passthrough(&self) -> impl Iterator<Item = Signal> + '_ {
		self.input_signals
			.intersection(&self.output_signals)
			.copied()
	}
}

/// Parts of a partition, adjacent when they share a signal, weighted by their signals.
struct Quotient {
	graph: UnGraph<BTreeSet<Signal>, ()>,
}

impl Quotient {
	fn new(circuit: &Circuit, parts: &[Vec<usize>]) -> Self {
		let mut part_of = vec![0; circuit.n_constraints()];
		let mut graph = UnGraph::<BTreeSet<Signal>, ()>::with_capacity(parts.len(), parts.len());
		for (p, part) in parts.iter().enumerate() {
			for &c in part {
				part_of[c] = p;
			}
			graph.add_node(
				part.iter()
					.flat_map(|&c| circuit.constraint(c).signals())
					.collect(),
			);
		}
		let mut adjacent = BTreeSet::new();
		for users in circuit.signal_to_constraints() {
			let touching = users
				.iter()
				.map(|&c| part_of[c])
				.collect::<BTreeSet<_>>()
				.into_iter()
				.collect::<Vec<_>>();
			for (i, &p) in touching.iter().enumerate() {
				for &q in &touching[i + 1..] {
					adjacent.insert((p, q));
				}
			}
		}
		graph.extend_with_edges(
			adjacent
				.into_iter()
				.map(|(p, q)| (NodeIndex::new(p), NodeIndex::new(q))),
		);
		Self { graph }
	}

	/// Breadth-first distance in parts from the nearest part touching `targets`.
	///
	/// Unreachable parts get `usize::MAX`.
	fn distances(&self, targets: &BTreeSet<Signal>) -> Vec<usize> {
		let graph = &self.graph;
		let mut distance = vec![usize::MAX; graph.node_count()];
		let sources = graph
			.node_indices()
			.filter(|&p| !graph[p].is_disjoint(targets))
			.collect::<Vec<_>>();
		let Some(&first) = sources.first() else {
			return distance;
		};
		let mut bfs = Bfs::new(graph, first);
		for &p in &sources {
			distance[p.index()] = 0;
			if bfs.discovered.visit(p) {
				bfs.stack.push_back(p);
			}
		}
		// a part is reached from a neighbour one step closer, which the search has already left
		while let Some(p) = bfs.next(graph) {
			if distance[p.index()] == 0 {
				continue;
			}
			if let Some(nearest) = graph.neighbors(p).map(|q| distance[q.index()]).min() {
				distance[p.index()] = nearest + 1;
			}
		}
		distance
	}
}

/// Clusters of one circuit arranged as a DAG.
#[derive(Debug)]
pub struct Dag<'a> {
	circuit: &'a Circuit,
	nodes: PrimaryMap<NodeId, DagNode>,
	edges: DiGraphMap<NodeId, ()>,
	live: BTreeSet<NodeId>,
}

impl<'a> Dag<'a> {
	pub fn from_partition(circuit: &'a Circuit, partition: &Partition) -> Self {
		let _span = tracing::debug_span!("build_dag", parts = partition.len()).entered();
		let mut parts = partition.parts().to_vec();
		let mut rounds = 0;
		let (quotient, keys) = loop {
			let quotient = Quotient::new(circuit, &parts);
			let d_in = quotient.distances(circuit.inputs());
			let d_out = quotient.distances(circuit.outputs());
			let keys = d_in.into_iter().zip(d_out).collect::<Vec<_>>();

			let mut uf = UnionFind::new();
			let mut merged = false;
			for edge in quotient.graph.edge_references() {
				let (p, q) = (edge.source().index(), edge.target().index());
				if keys[p] == keys[q] {
					uf.union(&p, &q);
					merged = true;
				}
			}
			if !merged {
				break (quotient, keys);
			}
			rounds += 1;
			let mut groups = BTreeMap::<usize, Vec<usize>>::new();
			for (p, part) in parts.iter().enumerate() {
				groups.entry(uf.find(&p)).or_default().extend(part);
			}
			parts = groups
				.into_values()
				.map(|mut group| {
					group.sort_unstable();
					group
				})
				.collect();
			parts.sort_unstable_by_key(|part| part[0]);
		};
		tracing::debug!(rounds, nodes = parts.len(), "equal distance parts merged");

		let (parts_graph, adjacencies) = quotient.graph.into_nodes_edges();
		let mut nodes = PrimaryMap::with_capacity(parts.len());
		let mut edges = DiGraphMap::with_capacity(parts.len(), adjacencies.len());
		for (part, node) in parts.into_iter().zip(parts_graph) {
			edges.add_node(nodes.push(DagNode::new(part, node.weight)));
		}
		let order = |p: usize| (keys[p].0, Reverse(keys[p].1));
		for adjacency in &adjacencies {
			let (mut p, mut q) = (adjacency.source().index(), adjacency.target().index());
			if order(q) < order(p) {
				(p, q) = (q, p);
			}
			edges.add_edge(NodeId::new(p), NodeId::new(q), ());
		}
		let live = nodes.keys().collect::<BTreeSet<_>>();
		let mut dag = Self {
			circuit,
			nodes,
			edges,
			live,
		};
		for id in dag.live.clone() {
			dag.refresh_boundaries(id);
		}
		dag
	}

	pub fn circuit(&self) -> &'a Circuit {
		self.circuit
	}

	/// Number of live nodes.
	pub fn len(&self) -> usize {
		self.live.len()
	}

	pub fn is_empty(&self) -> bool {
		self.live.is_empty()
	}

	pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
		self.live.iter().copied()
	}

	pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DagNode)> + '_ {
		self.live.iter().map(|&id| (id, &self.nodes[id]))
	}

	pub fn node(&self, id: NodeId) -> &DagNode {
		&self.nodes[id]
	}

	pub fn is_live(&self, id: NodeId) -> bool {
		self.live.contains(&id)
	}

	pub fn predecessors(&self, id: NodeId) -> BTreeSet<NodeId> {
		self.edges
			.neighbors_directed(id, Direction::Incoming)
			.collect()
	}

	pub fn successors(&self, id: NodeId) -> BTreeSet<NodeId> {
		self.edges
			.neighbors_directed(id, Direction::Outgoing)
			.collect()
	}

	/// Whether an edge leads from `from` to `to`.
	pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
		self.edges.contains_edge(from, to)
	}

	/// Whether every constraint of the node is nonlinear.
	pub fn is_only_nonlinear(&self, id: NodeId) -> bool {
		self.nodes[id]
			.constraints
			.iter()
			.all(|&c| self.circuit.constraint(c).is_nonlinear())
	}

	pub fn shared_signals(&self, a: NodeId, b: NodeId) -> usize {
		self.nodes[a]
			.signals
			.intersection(&self.nodes[b].signals)
			.count()
	}

	/// The node as a standalone circuit, built on first use.
	pub fn subcircuit(&self, id: NodeId) -> Result<&SubCircuit, CircuitError> {
		let node = &self.nodes[id];
		if let Some(sub) = node.subcircuit.get() {
			return Ok(sub);
		}
		let sub = SubCircuit::extract(
			self.circuit,
			&node.constraints,
			&node.input_signals,
			&node.output_signals,
		)?;
		Ok(node.subcircuit.get_or_init(|| sub))
	}

	fn refresh_boundaries(&mut self, id: NodeId) {
		let node = &self.nodes[id];
		let shared_with = |others: &BTreeSet<NodeId>| {
			others
				.iter()
				.flat_map(|&other| self.nodes[other].signals.intersection(&node.signals))
				.copied()
				.collect::<BTreeSet<_>>()
		};
		let mut inputs = shared_with(&self.predecessors(id));
		inputs.extend(node.signals.intersection(self.circuit.inputs()));
		let mut outputs = shared_with(&self.successors(id));
		outputs.extend(node.signals.intersection(self.circuit.outputs()));

		let node = &mut self.nodes[id];
		node.input_signals = inputs;
		node.output_signals = outputs;
	}

	fn check_live(&self, id: NodeId) -> Result<(), StructuralError> {
		if self.is_live(id) {
			Ok(())
		} else {
			Err(StructuralError::DeadNode(id))
		}
	}

	/// Whether replacing `a` and `b` by their union would close a cycle.
	///
	/// That happens exactly when one of them reaches the other through a third node.
	pub fn would_create_cycle(&self, a: NodeId, b: NodeId) -> bool {
		let detour = |from: NodeId, to: NodeId| {
			self.edges
				.neighbors_directed(from, Direction::Outgoing)
				.filter(|&next| next != to)
				.any(|next| has_path_connecting(&self.edges, next, to, None))
		};
		detour(a, b) || detour(b, a)
	}

	/// Replaces `a` and `b` by a single node and returns its id.
	pub fn merge(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, StructuralError> {
		self.check_live(a)?;
		self.check_live(b)?;
		if a == b {
			return Ok(a);
		}
		if self.would_create_cycle(a, b) {
			return Err(StructuralError::MergeCreatesCycle { a, b });
		}
		let kept = |id: &NodeId| *id != a && *id != b;
		let predecessors = self
			.predecessors(a)
			.into_iter()
			.chain(self.predecessors(b))
			.filter(kept)
			.collect::<BTreeSet<_>>();
		let successors = self
			.successors(a)
			.into_iter()
			.chain(self.successors(b))
			.filter(kept)
			.collect::<BTreeSet<_>>();
		let (na, nb) = (&self.nodes[a], &self.nodes[b]);
		let mut constraints = na
			.constraints
			.iter()
			.chain(&nb.constraints)
			.copied()
			.collect::<Vec<_>>();
		constraints.sort_unstable();
		let signals = na.signals.union(&nb.signals).copied().collect();

		let id = self.nodes.push(DagNode::new(constraints, signals));
		self.edges.remove_node(a);
		self.edges.remove_node(b);
		self.edges.add_node(id);
		for &p in &predecessors {
			self.edges.add_edge(p, id, ());
		}
		for &s in &successors {
			self.edges.add_edge(id, s, ());
		}
		self.live.remove(&a);
		self.live.remove(&b);
		self.live.insert(id);
		self.refresh_boundaries(id);
		for neighbour in predecessors.into_iter().chain(successors) {
			self.refresh_boundaries(neighbour);
		}
		tracing::trace!(%a, %b, %id, "merged");
		Ok(id)
	}

	/// Live nodes in an order where every edge points forward.
	pub fn topological_order(&self) -> Result<Vec<NodeId>, StructuralError> {
		toposort(&self.edges, None).map_err(|cycle| StructuralError::Cyclic(cycle.node_id()))
	}

	/// Checks that the graph is acyclic and that every signal shared by two nodes leaves the
	/// earlier one as an output and enters the later one as an input.
	pub fn validate(&self) -> Result<(), StructuralError> {
		self.topological_order()?;
		let mut holders = BTreeMap::<Signal, Vec<NodeId>>::new();
		for (id, node) in self.nodes() {
			for &signal in &node.signals {
				holders.entry(signal).or_default().push(id);
			}
		}
		for (signal, ids) in holders {
			for (i, &u) in ids.iter().enumerate() {
				for &v in &ids[i + 1..] {
					let (from, to) = if self.has_edge(u, v) { (u, v) } else { (v, u) };
					let passed = self.has_edge(from, to)
						&& self.nodes[from].output_signals.contains(&signal)
						&& self.nodes[to].input_signals.contains(&signal);
					if !passed {
						return Err(StructuralError::Boundary { signal, from, to });
					}
				}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use arckit_core::{CircuitBuilder, Dialect, PrimeField, R1csConstraint};
	use num_bigint::BigUint;

	use super::*;

	/// `x1 -> x2 -> x3 -> x4 -> x5` through squarings.
	fn squaring_chain() -> Circuit {
		let f = PrimeField::new(BigUint::from(101u32));
		let square = |x, y| R1csConstraint::from_i64(&f, &[(x, 1)], &[(x, 1)], &[(y, 1)]);
		CircuitBuilder::new(f.clone(), Dialect::R1cs)
			.inputs([1])
			.outputs([5])
			.constraints((1..=4).map(|x| square(x, x + 1)))
			.build()
			.unwrap()
	}

	fn singletons(n: usize) -> Partition {
		Partition::from_labels(&(0..n).collect::<Vec<_>>())
	}

	#[test]
	fn test_chain_is_oriented_from_inputs_to_outputs() {
		let circuit = squaring_chain();
		let dag = Dag::from_partition(&circuit, &singletons(4));
		assert_eq!(dag.len(), 4);
		let order = dag.topological_order().unwrap();
		assert_eq!(order, (0..4).map(NodeId::new).collect::<Vec<_>>());
		let first = dag.node(NodeId::new(0));
		assert_eq!(first.input_signals(), &BTreeSet::from([1]));
		assert_eq!(first.output_signals(), &BTreeSet::from([2]));
		let last = dag.node(NodeId::new(3));
		assert_eq!(last.input_signals(), &BTreeSet::from([4]));
		assert_eq!(last.output_signals(), &BTreeSet::from([5]));
		dag.validate().unwrap();
	}

	#[test]
	fn test_merge_rejects_cycles_and_rewires_neighbours() {
		let circuit = squaring_chain();
		let mut dag = Dag::from_partition(&circuit, &singletons(4));
		let [n0, n1, n2, n3] = [0, 1, 2, 3].map(NodeId::new);
		assert!(dag.would_create_cycle(n0, n2));
		assert!(matches!(
			dag.merge(n0, n2),
			Err(StructuralError::MergeCreatesCycle { .. })
		));

		let merged = dag.merge(n0, n1).unwrap();
		assert_eq!(merged, NodeId::new(4));
		assert!(!dag.is_live(n0));
		assert!(matches!(dag.merge(n0, n3), Err(StructuralError::DeadNode(_))));
		assert_eq!(dag.node(merged).constraints(), &[0, 1]);
		assert_eq!(dag.node(merged).output_signals(), &BTreeSet::from([3]));
		assert_eq!(dag.predecessors(n2), BTreeSet::from([merged]));
		assert_eq!(dag.topological_order().unwrap(), vec![merged, n2, n3]);
		dag.validate().unwrap();
	}

	#[test]
	fn test_equal_distance_neighbours_are_merged() {
		// two constraints feeding the same output from the same input
		let f = PrimeField::new(BigUint::from(101u32));
		let circuit = CircuitBuilder::new(f.clone(), Dialect::R1cs)
			.inputs([1])
			.outputs([3])
			.constraint(R1csConstraint::from_i64(&f, &[(1, 1)], &[(1, 1)], &[(3, 1)]))
			.constraint(R1csConstraint::from_i64(&f, &[(1, 1)], &[(0, 1)], &[(3, 2)]))
			.build()
			.unwrap();
		let dag = Dag::from_partition(&circuit, &singletons(2));
		assert_eq!(dag.len(), 1);
		let (_, node) = dag.nodes().next().unwrap();
		assert_eq!(node.constraints(), &[0, 1]);
		assert_eq!(node.passthrough().count(), 0);
	}

	#[test]
	fn test_node_ids_print_with_prefix() {
		let id = NodeId::new(3);
		assert_eq!(format!("{id} {id:?}"), "node3 node3");
	}

	#[test]
	fn test_distances_from_both_ends() {
		// the last constraint touches neither the chain nor the declared signals
		let f = PrimeField::new(BigUint::from(101u32));
		let square = |x, y| R1csConstraint::from_i64(&f, &[(x, 1)], &[(x, 1)], &[(y, 1)]);
		let circuit = CircuitBuilder::new(f.clone(), Dialect::R1cs)
			.inputs([1])
			.outputs([4])
			.constraints([square(1, 2), square(2, 3), square(3, 4), square(6, 7)])
			.build()
			.unwrap();
		let parts = (0..4).map(|c| vec![c]).collect::<Vec<_>>();
		let quotient = Quotient::new(&circuit, &parts);
		assert_eq!(quotient.distances(circuit.inputs()), vec![0, 1, 2, usize::MAX]);
		assert_eq!(quotient.distances(circuit.outputs()), vec![2, 1, 0, usize::MAX]);
		assert_eq!(quotient.distances(&BTreeSet::new()), vec![usize::MAX; 4]);
	}

	#[test]
	fn test_detours_through_a_diamond_close_cycles() {
		// x1 feeds x2 and x3, both feed x4
		let f = PrimeField::new(BigUint::from(101u32));
		let mul = |x, y, z| R1csConstraint::from_i64(&f, &[(x, 1)], &[(y, 1)], &[(z, 1)]);
		let circuit = CircuitBuilder::new(f.clone(), Dialect::R1cs)
			.inputs([1])
			.outputs([5])
			.constraints([mul(1, 1, 2), mul(2, 2, 3), mul(2, 3, 4), mul(4, 4, 5)])
			.build()
			.unwrap();
		let dag = Dag::from_partition(&circuit, &singletons(4));
		dag.validate().unwrap();
		let [n0, n1, n2, n3] = [0, 1, 2, 3].map(NodeId::new);
		assert_eq!(dag.successors(n0), BTreeSet::from([n1, n2]));
		assert_eq!(dag.successors(n1), BTreeSet::from([n2]));
		assert_eq!(dag.topological_order().unwrap(), vec![n0, n1, n2, n3]);
		// n0 reaches n2 through n1, and n3 through n2
		assert!(dag.would_create_cycle(n0, n2));
		assert!(dag.would_create_cycle(n0, n3));
		assert!(!dag.would_create_cycle(n0, n1));
		assert!(!dag.would_create_cycle(n1, n2));
	}

	#[test]
	fn test_subcircuit_is_cached_per_node() {
		let circuit = squaring_chain();
		let dag = Dag::from_partition(&circuit, &singletons(4));
		let sub = dag.subcircuit(NodeId::new(1)).unwrap();
		assert_eq!(sub.signals, vec![0, 3, 2]);
		assert!(std::ptr::eq(sub, dag.subcircuit(NodeId::new(1)).unwrap()));
	}
}
