// Copyright 2025 Irreducible Inc.
use std::collections::BTreeSet;

use arckit_core::{Circuit, CircuitBuilder, Dialect, PrimeField, R1csConstraint, Signal};
use arckit_structural::{
	ClassOptions, ClusterOptions, ClusteringStrategy, Dag, EquivalenceDepth, LeidenOptions,
	MergeOptions, NodeId, cluster, cluster_circuit, run_merges,
};
use cranelift_entity::EntityRef;
use num_bigint::BigUint;
use proptest::prelude::*;

type Terms = Vec<(Signal, i64)>;

fn gf() -> PrimeField {
	PrimeField::new(BigUint::from(101u32))
}

/// Three nonlinear blocks `a -> e`, each feeding the next through a copy `e = a'`, and a final
/// copy onto the circuit output.
fn three_blocks() -> Circuit {
	let f = gf();
	let mul = |x, y, z| R1csConstraint::from_i64(&f, &[(x, 1)], &[(y, 1)], &[(z, 1)]);
	let copy = |x, y| R1csConstraint::from_i64(&f, &[], &[], &[(x, 1), (y, -1)]);
	let mut builder = CircuitBuilder::new(f.clone(), Dialect::R1cs)
		.inputs([1])
		.outputs([13]);
	for k in 0..3 {
		let [a, b, d, e] = [1, 2, 3, 4].map(|s| s + 4 * k);
		builder = builder
			.constraint(mul(a, a, b))
			.constraint(mul(b, a, d))
			.constraint(mul(d, b, e))
			.constraint(copy(e, e + 1));
	}
	builder.build().unwrap()
}

#[test]
fn test_signal_equivalence_clustering_of_three_blocks() {
	let circuit = three_blocks();
	let options = ClusterOptions {
		strategy: ClusteringStrategy::SignalEquivalence,
		..ClusterOptions::default()
	};
	let clustering = cluster_circuit(&circuit, &options).unwrap();
	let dag = &clustering.dag;

	let parts = dag
		.nodes()
		.map(|(_, node)| node.constraints().to_vec())
		.collect::<Vec<_>>();
	assert_eq!(
		parts,
		vec![
			vec![0, 1, 2],
			vec![3],
			vec![4, 5, 6],
			vec![7],
			vec![8, 9, 10],
			vec![11]
		]
	);

	// a single chain from the input block to the output copy
	let order = dag.topological_order().unwrap();
	assert_eq!(order, (0..6).map(NodeId::new).collect::<Vec<_>>());
	for pair in order.windows(2) {
		assert_eq!(dag.successors(pair[0]), BTreeSet::from([pair[1]]));
	}
	assert_eq!(dag.node(order[0]).input_signals(), &BTreeSet::from([1]));
	assert_eq!(dag.node(order[5]).output_signals(), &BTreeSet::from([13]));
	dag.validate().unwrap();

	let local = clustering
		.classes
		.local
		.iter()
		.map(|class| class.members().map(|id| id.index()).collect::<Vec<_>>())
		.collect::<Vec<_>>();
	assert_eq!(local, vec![vec![0, 2, 4], vec![1, 3, 5]]);
}

#[test]
fn test_nonlinear_attract_keeps_copies_between_blocks() {
	let circuit = three_blocks();
	let options = ClusterOptions {
		classes: ClassOptions {
			depth: EquivalenceDepth::None,
			..ClassOptions::default()
		},
		..ClusterOptions::default()
	};
	let clustering = cluster_circuit(&circuit, &options).unwrap();
	// the inner copies touch two blocks; the last one only touches the third
	let parts = clustering
		.dag
		.nodes()
		.map(|(_, node)| node.constraints().to_vec())
		.collect::<Vec<_>>();
	assert_eq!(
		parts,
		vec![vec![0, 1, 2], vec![3], vec![4, 5, 6], vec![7], vec![8, 9, 10, 11]]
	);
	assert!(clustering.classes.local.is_empty());
	clustering.dag.validate().unwrap();
}

fn arb_terms(min: usize) -> impl Strategy<Value = Terms> {
	prop::collection::btree_map(0usize..=10, 1i64..=5, min..=2)
		.prop_map(|terms| terms.into_iter().collect())
}

fn arb_circuit() -> impl Strategy<Value = Circuit> {
	prop::collection::vec((arb_terms(0), arb_terms(0), arb_terms(1)), 1..=12).prop_map(
		|constraints| {
			let f = gf();
			CircuitBuilder::new(f.clone(), Dialect::R1cs)
				.n_signals(11)
				.inputs([1, 2])
				.outputs([10])
				.constraints(
					constraints
						.iter()
						.map(|(a, b, c)| R1csConstraint::from_i64(&f, a, b, c)),
				)
				.build()
				.unwrap()
		},
	)
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(48))]

	#[test]
	fn test_dags_stay_acyclic_through_merges(
		circuit in arb_circuit(),
		strategy in prop::sample::select(ClusteringStrategy::ALL.to_vec()),
		seed in any::<u64>(),
	) {
		let leiden = LeidenOptions { seed, ..LeidenOptions::default() };
		let partition = cluster(&circuit, strategy, &leiden);
		let mut dag = Dag::from_partition(&circuit, &partition);
		prop_assert!(dag.validate().is_ok());

		let everything = MergeOptions { passthrough: true, only_nonlinear: true, single_linear: true };
		run_merges(&mut dag, &everything);
		prop_assert!(dag.validate().is_ok());

		let mut covered = dag
			.nodes()
			.flat_map(|(_, node)| node.constraints().to_vec())
			.collect::<Vec<_>>();
		covered.sort_unstable();
		prop_assert_eq!(covered, (0..circuit.n_constraints()).collect::<Vec<_>>());
	}
}
