// Copyright 2025 Irreducible Inc.
//! Modularity optimisation over the constraint graph.
//!
//! Each pass runs Louvain local moving in a shuffled order, refines every community into its
//! connected pieces and aggregates the pieces into the nodes of the next level, until a level
//! can no longer be coarsened. Later passes start from the communities of the previous one.

use std::collections::{BTreeMap, VecDeque};

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::Partition;
use crate::graph::ConstraintGraph;

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct LeidenOptions {
	/// Defaults to the square root of the number of constraints.
	pub resolution: Option<f64>,
	pub iterations: usize,
	pub seed: u64,
}

impl Default for LeidenOptions {
	fn default() -> Self {
		Self {
			resolution: None,
			iterations: 2,
			seed: 0,
		}
	}
}

pub fn leiden(graph: &ConstraintGraph, options: &LeidenOptions) -> Partition {
	let resolution = options
		.resolution
		.unwrap_or_else(|| (graph.len() as f64).sqrt());
	let mut rng = StdRng::seed_from_u64(options.seed);
	let base = Level::new(graph);
	let mut membership = (0..graph.len()).collect::<Vec<_>>();
	for iteration in 0..options.iterations.max(1) {
		let _span = tracing::debug_span!("leiden pass", iteration).entered();
		let (next, moved) = optimise(&base, membership, resolution, &mut rng);
		membership = next;
		if !moved {
			break;
		}
	}
	Partition::from_labels(&membership)
}

fn optimise(
	base: &Level,
	mut membership: Vec<usize>,
	resolution: f64,
	rng: &mut StdRng,
) -> (Vec<usize>, bool) {
	let mut level = base.clone();
	let mut node_of = (0..base.len()).collect::<Vec<_>>();
	let mut community = membership.clone();
	let mut moved = false;
	loop {
		relabel(&mut community);
		moved |= level.move_nodes(&mut community, resolution, rng);
		for (vertex, node) in node_of.iter().enumerate() {
			membership[vertex] = community[*node];
		}

		let (refined, n_refined) = level.refine(&community);
		tracing::debug!(nodes = level.len(), refined = n_refined, "leiden level");
		if n_refined == level.len() {
			break;
		}
		let mut next_community = vec![0; n_refined];
		for (node, &piece) in refined.iter().enumerate() {
			next_community[piece] = community[node];
		}
		for node in &mut node_of {
			*node = refined[*node];
		}
		level = level.aggregate(&refined, n_refined);
		community = next_community;
	}
	(membership, moved)
}

/// Renumbers community ids densely in order of first appearance.
fn relabel(community: &mut [usize]) {
	let mut dense = BTreeMap::new();
	for c in community.iter_mut() {
		let next = dense.len();
		*c = *dense.entry(*c).or_insert(next);
	}
}

/// One level of the aggregation hierarchy.
#[derive(Debug, Clone)]
struct Level {
	adjacency: Vec<BTreeMap<usize, f64>>,
	self_loops: Vec<f64>,
	degree: Vec<f64>,
}

impl Level {
	fn new(graph: &ConstraintGraph) -> Self {
		let adjacency = (0..graph.len())
			.map(|v| {
				graph
					.neighbours(v)
					.map(|(u, w)| (u, w as f64))
					.collect::<BTreeMap<_, _>>()
			})
			.collect::<Vec<_>>();
		let degree = (0..graph.len()).map(|v| graph.degree(v) as f64).collect();
		Self {
			adjacency,
			self_loops: vec![0.0; graph.len()],
			degree,
		}
	}

	fn len(&self) -> usize {
		self.adjacency.len()
	}

	/// Greedy local moving until no node improves. Returns whether any node moved.
	fn move_nodes(&self, community: &mut [usize], resolution: f64, rng: &mut StdRng) -> bool {
		let two_m = self.degree.iter().sum::<f64>();
		if two_m == 0.0 {
			return false;
		}
		let mut totals = vec![0.0; self.len()];
		for (node, &c) in community.iter().enumerate() {
			totals[c] += self.degree[node];
		}
		let mut order = (0..self.len()).collect::<Vec<_>>();
		order.shuffle(rng);

		let mut moved_any = false;
		loop {
			let mut moved = false;
			for &node in &order {
				let current = community[node];
				let k = self.degree[node];
				totals[current] -= k;
				let mut links = BTreeMap::<usize, f64>::new();
				for (&neighbour, &w) in &self.adjacency[node] {
					*links.entry(community[neighbour]).or_insert(0.0) += w;
				}
				let gain = |c: usize, link: f64| link - resolution * k * totals[c] / two_m;
				let mut best = current;
				let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
				for (&c, &link) in &links {
					let g = gain(c, link);
					if g > best_gain + MIN_GAIN {
						best = c;
						best_gain = g;
					}
				}
				totals[best] += k;
				if best != current {
					community[node] = best;
					moved = true;
				}
			}
			if !moved {
				break;
			}
			moved_any = true;
		}
		moved_any
	}

	/// Splits every community into its connected pieces; returns a dense piece id per node.
	fn refine(&self, community: &[usize]) -> (Vec<usize>, usize) {
		let mut piece = vec![usize::MAX; self.len()];
		let mut n_pieces = 0;
		for start in 0..self.len() {
			if piece[start] != usize::MAX {
				continue;
			}
			piece[start] = n_pieces;
			let mut queue = VecDeque::from([start]);
			while let Some(node) = queue.pop_front() {
				for &next in self.adjacency[node].keys() {
					if piece[next] == usize::MAX && community[next] == community[start] {
						piece[next] = n_pieces;
						queue.push_back(next);
					}
				}
			}
			n_pieces += 1;
		}
		(piece, n_pieces)
	}

	fn aggregate(&self, piece: &[usize], n_pieces: usize) -> Self {
		let mut adjacency = vec![BTreeMap::new(); n_pieces];
		let mut self_loops = vec![0.0; n_pieces];
		let mut degree = vec![0.0; n_pieces];
		for node in 0..self.len() {
			let p = piece[node];
			self_loops[p] += self.self_loops[node];
			degree[p] += self.degree[node];
			for (&neighbour, &w) in &self.adjacency[node] {
				let q = piece[neighbour];
				if p == q {
					// seen once from each endpoint
					self_loops[p] += w / 2.0;
				} else {
					*adjacency[p].entry(q).or_insert(0.0) += w;
				}
			}
		}
		Self {
			adjacency,
			self_loops,
			degree,
		}
	}
}

#[cfg(test)]
mod tests {
	use arckit_core::{CircuitBuilder, Dialect, PrimeField, R1csConstraint};
	use num_bigint::BigUint;

	use super::*;

	/// Two triangles of constraints joined by a single shared signal.
	fn two_triangles() -> ConstraintGraph {
		let f = PrimeField::new(BigUint::from(101u32));
		let linear = |signals: &[usize]| {
			let terms = signals.iter().map(|&s| (s, 1)).collect::<Vec<_>>();
			R1csConstraint::from_i64(&f, &[], &[], &terms)
		};
		let circuit = CircuitBuilder::new(f.clone(), Dialect::R1cs)
			.constraint(linear(&[1, 2]))
			.constraint(linear(&[2, 3]))
			.constraint(linear(&[3, 1, 7]))
			.constraint(linear(&[7, 4, 6]))
			.constraint(linear(&[4, 5]))
			.constraint(linear(&[5, 6]))
			.build()
			.unwrap();
		ConstraintGraph::new(&circuit)
	}

	#[test]
	fn test_two_triangles_are_found_for_any_seed() {
		let graph = two_triangles();
		for seed in 0..8 {
			let options = LeidenOptions {
				resolution: Some(1.0),
				iterations: 2,
				seed,
			};
			let partition = leiden(&graph, &options);
			assert_eq!(partition.parts(), &[vec![0, 1, 2], vec![3, 4, 5]], "seed {seed}");
		}
	}

	#[test]
	fn test_huge_resolution_keeps_singletons() {
		let graph = two_triangles();
		let options = LeidenOptions {
			resolution: Some(100.0),
			..LeidenOptions::default()
		};
		assert_eq!(leiden(&graph, &options).len(), 6);
	}

	#[test]
	fn test_relabel_is_dense_in_first_appearance_order() {
		let mut community = vec![5, 2, 5, 9];
		relabel(&mut community);
		assert_eq!(community, vec![0, 1, 0, 2]);
	}
}
