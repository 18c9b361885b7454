// Copyright 2025 Irreducible Inc.
//! Choice of the scalar divisors that bring a constraint into canonical form.
//!
//! A constraint is only defined up to a nonzero scalar factor. To compare constraints we divide
//! each part by a divisor chosen from the part's own coefficients, so that any rescaled copy of the
//! part picks the correspondingly rescaled divisor and both end up identical.
//!
//! When the coefficients do not sum to zero the choice is unique: the divisor `v` minimizing the
//! canonical representative of `sum / v`. A rescaling multiplies both `sum` and `v` by the same
//! factor, so the minimizer is preserved.
//!
//! When the sum is zero that quotient is useless and we fall back to the ratio structure of the
//! distinct values. Values whose pairwise ratios are the rarest are the least ambiguous; the
//! reduction keeps those and repeats until the set stabilises. The surviving set can hold more
//! than one value, in which case every survivor is a candidate and the caller enumerates all of
//! them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::field::PrimeField;

/// Returns the candidate divisors for a multiset of nonzero field values.
///
/// The result is sorted and free of duplicates. An empty multiset yields `[1]`.
pub fn divisor_candidates<'a>(
	field: &PrimeField,
	values: impl IntoIterator<Item = &'a BigUint>,
) -> Vec<BigUint> {
	let values = values.into_iter().collect::<Vec<_>>();
	if values.is_empty() {
		return vec![BigUint::one()];
	}
	debug_assert!(values.iter().all(|value| !value.is_zero()));

	let total = field.sum(values.iter().copied());
	if !total.is_zero() {
		let divisor = values
			.iter()
			.copied()
			.min_by_key(|value| field.div(&total, value))
			.cloned()
			.unwrap_or_else(BigUint::one);
		return vec![divisor];
	}

	zero_sum_candidates(field, values.into_iter().cloned().collect())
}

fn zero_sum_candidates(field: &PrimeField, distinct: BTreeSet<BigUint>) -> Vec<BigUint> {
	let mut current = distinct.into_iter().collect::<Vec<_>>();
	while current.len() > 1 {
		let Some(inverses) = current
			.iter()
			.map(|value| field.inv(value))
			.collect::<Option<Vec<_>>>()
		else {
			break;
		};

		let mut ratio_count = HashMap::<BigUint, usize>::new();
		let mut ratios = Vec::with_capacity(current.len() * (current.len() - 1));
		for (i, numerator) in current.iter().enumerate() {
			for (j, inverse) in inverses.iter().enumerate() {
				if i == j {
					continue;
				}
				let ratio = field.mul(numerator, inverse);
				*ratio_count.entry(ratio.clone()).or_default() += 1;
				ratios.push((i, ratio));
			}
		}

		let Some(&rarest) = ratio_count.values().min() else {
			break;
		};
		let survivors = ratios
			.iter()
			.filter(|(_, ratio)| ratio_count[ratio] == rarest)
			.map(|&(i, _)| i)
			.collect::<BTreeSet<_>>();

		if survivors.len() == current.len() {
			break;
		}
		current = survivors
			.into_iter()
			.map(|i| current[i].clone())
			.collect();
	}
	current
}

/// Divides every coefficient of a linear combination by `divisor`, `None` when it is zero.
pub fn divide_all<K: Ord + Clone>(
	field: &PrimeField,
	coefficients: &BTreeMap<K, BigUint>,
	divisor: &BigUint,
) -> Option<BTreeMap<K, BigUint>> {
	let inverse = field.inv(divisor)?;
	Some(
		coefficients
			.iter()
			.map(|(key, value)| (key.clone(), field.mul(value, &inverse)))
			.collect(),
	)
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	fn gf(p: u32) -> PrimeField {
		PrimeField::new(BigUint::from(p))
	}

	fn values(raw: &[u64]) -> Vec<BigUint> {
		raw.iter().copied().map(BigUint::from).collect()
	}

	#[test]
	fn test_empty_multiset_divides_by_one() {
		assert_eq!(divisor_candidates(&gf(23), std::iter::empty()), vec![BigUint::one()]);
	}

	#[test]
	fn test_nonzero_sum_has_a_single_divisor() {
		let f = gf(23);
		// sum = 6, 6/1 = 6, 6/2 = 3, 6/3 = 2
		assert_eq!(divisor_candidates(&f, &values(&[1, 2, 3])), values(&[3]));
		assert_eq!(divisor_candidates(&f, &values(&[5])), values(&[5]));
	}

	#[test]
	fn test_zero_sum_keeps_all_symmetric_values() {
		let f = gf(23);
		// x - y: both ratios are -1, nothing can be told apart.
		assert_eq!(divisor_candidates(&f, &values(&[1, 22])), values(&[1, 22]));
	}

	#[test]
	fn test_zero_sum_candidates_follow_rescaling() {
		let f = gf(101);
		// 1 + 2 + 4 + 94 = 101. Every value has at least one ratio that occurs once.
		let candidates = divisor_candidates(&f, &values(&[1, 2, 4, 94]));
		assert_eq!(candidates, values(&[1, 2, 4, 94]));
		let rescaled = divisor_candidates(&f, &values(&[3, 6, 12, 80]));
		let expected = candidates
			.iter()
			.map(|c| f.mul(c, &BigUint::from(3u32)))
			.collect::<BTreeSet<_>>();
		assert_eq!(rescaled.into_iter().collect::<BTreeSet<_>>(), expected);
	}

	proptest! {
		#[test]
		fn prop_candidates_follow_rescaling(
			raw in prop::collection::vec(1u64..1000, 1..6),
			zero_sum in any::<bool>(),
			factor in 2u64..1000,
		) {
			let f = gf(1009);
			let mut vals = values(&raw);
			if zero_sum {
				let total = f.sum(&vals);
				if total.is_zero() {
					return Ok(());
				}
				vals.push(f.neg(&total));
			}
			let factor = BigUint::from(factor);
			let scaled = vals.iter().map(|v| f.mul(v, &factor)).collect::<Vec<_>>();

			let expected = divisor_candidates(&f, &vals)
				.iter()
				.map(|c| f.mul(c, &factor))
				.collect::<BTreeSet<_>>();
			let actual = divisor_candidates(&f, &scaled).into_iter().collect::<BTreeSet<_>>();
			prop_assert_eq!(actual, expected);
		}
	}
}
