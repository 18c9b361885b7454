// Copyright 2025 Irreducible Inc.
use std::collections::BTreeSet;

use arckit_core::Circuit;

use super::Partition;
use crate::graph::ConstraintGraph;

/// Seeds clusters with the components of nonlinear constraints, then lets every unassigned
/// constraint adjacent to exactly one cluster join it until nothing moves.
///
/// Joins within one round are decided against the clusters as they were at the start of the
/// round. Constraints that never join stay on their own.
pub fn nonlinear_attract(circuit: &Circuit) -> Partition {
	let nonlinear = |c: usize| circuit.constraint(c).is_nonlinear();
	let graph = ConstraintGraph::new(circuit);
	let mut cluster_of = vec![None; circuit.n_constraints()];
	let seeds = graph.components(nonlinear);
	for (cluster, component) in seeds.iter().enumerate() {
		for &constraint in component {
			cluster_of[constraint] = Some(cluster);
		}
	}

	let mut rounds = 0;
	loop {
		let joins = (0..circuit.n_constraints())
			.filter(|&c| cluster_of[c].is_none())
			.filter_map(|c| {
				let adjacent = graph
					.neighbours(c)
					.filter_map(|(n, _)| cluster_of[n])
					.collect::<BTreeSet<_>>();
				match adjacent.len() {
					1 => adjacent.first().map(|&cluster| (c, cluster)),
					_ => None,
				}
			})
			.collect::<Vec<_>>();
		if joins.is_empty() {
			break;
		}
		rounds += 1;
		for (constraint, cluster) in joins {
			cluster_of[constraint] = Some(cluster);
		}
	}
	tracing::debug!(seeds = seeds.len(), rounds, "nonlinear clusters grown");

	let mut next = seeds.len();
	let labels = cluster_of
		.into_iter()
		.map(|cluster| {
			cluster.unwrap_or_else(|| {
				next += 1;
				next - 1
			})
		})
		.collect::<Vec<_>>();
	Partition::from_labels(&labels)
}

#[cfg(test)]
mod tests {
	use arckit_core::{CircuitBuilder, Dialect, PrimeField, R1csConstraint};
	use num_bigint::BigUint;

	use super::*;

	#[test]
	fn test_linear_constraints_join_their_only_neighbour() {
		let f = PrimeField::new(BigUint::from(101u32));
		let mul = |x, y, z| R1csConstraint::from_i64(&f, &[(x, 1)], &[(y, 1)], &[(z, 1)]);
		let eq = |x, y| R1csConstraint::from_i64(&f, &[], &[], &[(x, 1), (y, -1)]);
		let circuit = CircuitBuilder::new(f.clone(), Dialect::R1cs)
			// block one
			.constraint(mul(1, 2, 3))
			.constraint(mul(3, 2, 4))
			// block two
			.constraint(mul(5, 6, 7))
			// bridge between the blocks, adjacent to both
			.constraint(eq(4, 5))
			// tail hanging off block two, joins in the second round
			.constraint(eq(7, 8))
			.constraint(eq(8, 9))
			// isolated
			.constraint(eq(10, 11))
			.build()
			.unwrap();
		let partition = nonlinear_attract(&circuit);
		assert_eq!(
			partition.parts(),
			&[vec![0, 1], vec![2, 4, 5], vec![3], vec![6]]
		);
	}
}
