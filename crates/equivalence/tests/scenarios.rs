// Copyright 2025 Irreducible Inc.
use std::collections::BTreeMap;

use arckit_core::{Circuit, CircuitBuilder, Dialect, PrimeField, R1csConstraint, Signal};
use arckit_equivalence::{
	EquivalenceOptions, MaxEquivOptions, NotEquivalentReason, Outcome, Policy, compare,
	maximal_equivalence, sanity_check,
};
use num_bigint::BigUint;
use proptest::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

type Terms = Vec<(Signal, i64)>;

fn gf(p: u32) -> PrimeField {
	PrimeField::new(BigUint::from(p))
}

fn r1cs(
	f: &PrimeField,
	n_signals: usize,
	inputs: &[Signal],
	outputs: &[Signal],
	constraints: &[(Terms, Terms, Terms)],
) -> Circuit {
	CircuitBuilder::new(f.clone(), Dialect::R1cs)
		.n_signals(n_signals)
		.inputs(inputs.iter().copied())
		.outputs(outputs.iter().copied())
		.constraints(
			constraints
				.iter()
				.map(|(a, b, c)| R1csConstraint::from_i64(f, a, b, c)),
		)
		.build()
		.unwrap()
}

fn expect_equivalent(left: &Circuit, right: &Circuit) -> arckit_equivalence::Mapping {
	let options = EquivalenceOptions {
		sanity_check: true,
		..EquivalenceOptions::default()
	};
	let comparison = compare(left, right, &options).unwrap();
	match comparison.outcome {
		Outcome::Equivalent(mapping) => {
			assert_eq!(sanity_check(left, right, &mapping), Ok(()));
			mapping
		}
		other => panic!("expected equivalence, got {other:?}"),
	}
}

#[test]
fn test_swapped_factors_are_equivalent() {
	let f = gf(23);
	let left = r1cs(&f, 4, &[], &[], &[(vec![(1, 1)], vec![(2, 1)], vec![(3, 1)])]);
	let right = r1cs(&f, 4, &[], &[], &[(vec![(2, 1)], vec![(1, 1)], vec![(3, 1)])]);
	let mapping = expect_equivalent(&left, &right);
	assert_eq!(mapping.signals[&3], 3);
	assert!([1, 2].contains(&mapping.signals[&1]));
	assert_eq!(mapping.constraints, BTreeMap::from([(0, 0)]));
}

#[test]
fn test_scaled_parts_normalize_alike() {
	let f = gf(23);
	let left = r1cs(&f, 4, &[], &[], &[(vec![(1, 1)], vec![(2, 1)], vec![(3, 1)])]);
	let right = r1cs(&f, 4, &[], &[], &[(vec![(1, 2)], vec![(2, 3)], vec![(3, 6)])]);
	let mapping = expect_equivalent(&left, &right);
	assert_eq!(mapping.signals[&3], 3);
	assert_eq!(mapping.constraints, BTreeMap::from([(0, 0)]));
}

#[test]
fn test_renamed_and_scaled_chain() {
	let f = gf(23);
	let left = r1cs(
		&f,
		14,
		&[1, 2],
		&[4],
		&[
			(vec![(1, 1)], vec![(2, 1)], vec![(3, 1)]),
			(vec![(3, 1)], vec![(2, 1)], vec![(4, 1)]),
		],
	);
	let right = r1cs(
		&f,
		14,
		&[10, 11],
		&[13],
		&[
			(vec![(10, 2)], vec![(11, 1)], vec![(12, 2)]),
			(vec![(12, 5)], vec![(11, 1)], vec![(13, 5)]),
		],
	);
	let mapping = expect_equivalent(&left, &right);
	for (l, r) in [(0, 0), (1, 10), (2, 11), (3, 12), (4, 13)] {
		assert_eq!(mapping.signals[&l], r);
	}
	assert_eq!(mapping.constraints, BTreeMap::from([(0, 0), (1, 1)]));

	let back = expect_equivalent(&right, &left);
	assert_eq!(back.signals[&12], 3);
}

#[test]
fn test_different_output_scale_is_not_equivalent() {
	let f = gf(23);
	let left = r1cs(&f, 4, &[], &[], &[(vec![(1, 1)], vec![(2, 1)], vec![(3, 1)])]);
	let right = r1cs(&f, 4, &[], &[], &[(vec![(1, 1)], vec![(2, 1)], vec![(3, 2)])]);
	let comparison = compare(&left, &right, &EquivalenceOptions::default()).unwrap();
	assert!(matches!(comparison.outcome, Outcome::NotEquivalent(_)));
	assert_eq!(comparison.outcome.exit_code(), 1);
}

/// `(x + y)(z + w) = o` against `(x + z)(y + w) = o`, with `x, y, z, w` pinned to distinct constants.
///
/// The unordered product fingerprint lists the factor terms without saying which factor holds
/// them, so refinement cannot tell the two apart; the pair check must.
#[test]
fn test_regrouped_factors_are_told_apart() {
	let f = gf(101);
	let pins = [(1usize, 3i64), (2, 5), (3, 7), (4, 11)]
		.map(|(s, k)| (vec![(s, 1)], vec![(0, 1)], vec![(0, k)]));
	let circuit = |a: [Signal; 2], b: [Signal; 2]| {
		let mut constraints = pins.to_vec();
		constraints.push((
			a.iter().map(|&s| (s, 1)).collect(),
			b.iter().map(|&s| (s, 1)).collect(),
			vec![(5, 1)],
		));
		r1cs(&f, 6, &[1, 2, 3, 4], &[5], &constraints)
	};
	let left = circuit([1, 2], [3, 4]);
	let right = circuit([1, 3], [2, 4]);
	for policy in Policy::ALL {
		let options = EquivalenceOptions {
			policy,
			..EquivalenceOptions::default()
		};
		let comparison = compare(&left, &right, &options).unwrap();
		assert!(
			matches!(comparison.outcome, Outcome::NotEquivalent(_)),
			"{policy}: {:?}",
			comparison.outcome
		);
	}

	let same = circuit([3, 4], [2, 1]);
	expect_equivalent(&left, &same);
}

#[test]
fn test_maximal_equivalence_leaves_extra_constraint() {
	let f = gf(101);
	let mut constraints = (1..=10)
		.map(|i| (vec![(i, 1)], vec![(i + 1, 1)], vec![(i + 2, 1)]))
		.collect::<Vec<_>>();
	let left = r1cs(&f, 14, &[1, 2], &[12], &constraints);
	constraints.push((vec![(13, 1)], vec![(13, 1)], vec![]));
	let right = r1cs(&f, 14, &[1, 2], &[12], &constraints);

	let options = MaxEquivOptions {
		tolerance: 0.9,
		..MaxEquivOptions::default()
	};
	let result = maximal_equivalence(&left, &right, &options).unwrap();
	assert_eq!(result.matched, 10);
	assert_eq!(result.mapping.constraints.len(), 10);
	assert!(result.mapping.constraints.values().all(|&r| r < 10));

	let comparison = compare(&left, &right, &EquivalenceOptions::default()).unwrap();
	assert!(matches!(
		comparison.outcome,
		Outcome::NotEquivalent(NotEquivalentReason::CountMismatch {
			what: "constraints",
			..
		})
	));
}

#[test]
fn test_cnf_dump_is_written() {
	// a ring of products leaves the whole problem to the solver
	let f = gf(101);
	let ring = |offset: usize| {
		let constraints = (0..4)
			.map(|i| {
				let x = |k: usize| 1 + (i + k + offset) % 4;
				(vec![(x(0), 1)], vec![(x(1), 1)], vec![(x(2), 1)])
			})
			.collect::<Vec<_>>();
		r1cs(&f, 5, &[], &[], &constraints)
	};
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("residual.cnf");
	let options = EquivalenceOptions {
		dump_cnf: Some(path.clone()),
		sanity_check: true,
		..EquivalenceOptions::default()
	};
	let comparison = compare(&ring(0), &ring(1), &options).unwrap();
	assert!(matches!(comparison.outcome, Outcome::Equivalent(_)));
	let text = std::fs::read_to_string(&path).unwrap();
	assert!(text.starts_with("p cnf "));
	assert!(text.lines().skip(1).all(|line| line.ends_with(" 0") || line == "0"));
}

#[test]
fn test_seeded_shuffles_of_a_chain() {
	let f = gf(101);
	for seed in 0..4 {
		let mut rng = StdRng::seed_from_u64(seed);
		let constraints = (1..=19)
			.map(|i| {
				let c = rng.random_range(1..=100);
				let d = rng.random_range(1..=100);
				(vec![(i, 1)], vec![(i + 1, 1), (1, c)], vec![(i + 2, d)])
			})
			.collect::<Vec<_>>();

		// keep the inputs 1, 2 and the output 21 in place
		let mut internal = (3..=20).collect::<Vec<Signal>>();
		internal.shuffle(&mut rng);
		let rename = |s: Signal| if (3..=20).contains(&s) { internal[s - 3] } else { s };
		let mut moved = constraints
			.iter()
			.map(|(a, b, c)| {
				let scale = rng.random_range(1..=100);
				let part = |terms: &Terms, k: i64| {
					terms.iter().map(|&(s, v)| (rename(s), v * k)).collect::<Terms>()
				};
				(part(a, scale), part(b, 1), part(c, scale))
			})
			.collect::<Vec<_>>();
		moved.shuffle(&mut rng);

		let left = r1cs(&f, 22, &[1, 2], &[21], &constraints);
		let right = r1cs(&f, 22, &[1, 2], &[21], &moved);
		let mapping = expect_equivalent(&left, &right);
		for s in 1..=21 {
			assert_eq!(mapping.signals[&s], rename(s), "seed {seed}");
		}
	}
}

fn arb_coefficient() -> impl Strategy<Value = i64> {
	prop_oneof![-5i64..=-1, 1i64..=5]
}

fn arb_scale() -> impl Strategy<Value = i64> {
	prop_oneof![-100i64..=-1, 1i64..=100]
}

/// Terms with coefficients summing to zero, the last one cancelling the others.
fn arb_cancelling_terms() -> impl Strategy<Value = Terms> {
	(
		prop::collection::btree_set(1usize..=6, 2..=3),
		prop::collection::vec(1i64..=5, 2),
		any::<bool>(),
	)
		.prop_map(|(signals, values, negate)| {
			let sign = if negate { -1 } else { 1 };
			let mut terms = signals
				.into_iter()
				.zip(values.iter().copied().chain([0]))
				.map(|(s, k)| (s, sign * k))
				.collect::<Terms>();
			let total = terms.iter().map(|&(_, k)| k).sum::<i64>();
			if let Some(last) = terms.last_mut() {
				last.1 -= total;
			}
			terms
		})
}

fn arb_terms() -> impl Strategy<Value = Terms> {
	prop_oneof![
		3 => prop::collection::btree_map(1usize..=6, arb_coefficient(), 1..=2)
			.prop_map(|terms| terms.into_iter().collect()),
		1 => arb_cancelling_terms(),
	]
}

fn arb_constraint() -> impl Strategy<Value = (Terms, Terms, Terms)> {
	prop_oneof![
		4 => (arb_terms(), arb_terms(), arb_terms()),
		1 => arb_terms().prop_map(|c| (Vec::new(), Vec::new(), c)),
	]
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(48))]

	#[test]
	fn test_renaming_and_scaling_preserve_equivalence(
		constraints in prop::collection::vec(arb_constraint(), 1..=5),
		perm in Just((1..=6).collect::<Vec<Signal>>()).prop_shuffle(),
		scales in prop::collection::vec((arb_scale(), arb_scale()), 5),
		order in Just((0..5).collect::<Vec<usize>>()).prop_shuffle(),
		policy in prop::sample::select(Policy::ALL[..4].to_vec()),
	) {
		let f = gf(101);
		let rename = |terms: &Terms, scale: i64| {
			terms.iter().map(|&(s, k)| (perm[s - 1], k * scale)).collect::<Terms>()
		};
		// A and B scale independently, C by the product of both factors
		let moved = order
			.iter()
			.filter(|&&i| i < constraints.len())
			.map(|&i| {
				let (a, b, c) = &constraints[i];
				let (ka, kb) = scales[i];
				(rename(a, ka), rename(b, kb), rename(c, ka * kb))
			})
			.collect::<Vec<_>>();
		let left = r1cs(&f, 7, &[], &[], &constraints);
		let right = r1cs(&f, 7, &[], &[], &moved);
		let options = EquivalenceOptions {
			policy,
			sanity_check: true,
			..EquivalenceOptions::default()
		};
		let comparison = compare(&left, &right, &options).unwrap();
		prop_assert!(
			matches!(comparison.outcome, Outcome::Equivalent(_)),
			"{:?}",
			comparison.outcome
		);
	}
}
