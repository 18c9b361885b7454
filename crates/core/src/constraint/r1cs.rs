// Copyright 2025 Irreducible Inc.
use std::{
	cmp::Ordering,
	collections::{BTreeMap, BTreeSet},
};

use itertools::Itertools;
use num_bigint::BigUint;
use num_traits::Zero;

use super::{LinearCombination, Signal, evaluate, labelled_terms, linear_combination};
use crate::{
	consts::CONSTANT_SIGNAL,
	field::PrimeField,
	fingerprint::{ClassLabel, NormFingerprint, SignalCharacteristic},
	normalize::{divide_all, divisor_candidates},
};

/// A rank-one constraint `<A, x> * <B, x> = <C, x>`.
///
/// The parts never store zero coefficients.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct R1csConstraint {
	pub a: LinearCombination,
	pub b: LinearCombination,
	pub c: LinearCombination,
}

/// One way of dividing the three parts of an R1CS constraint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct R1csDivisors {
	pub a: BigUint,
	pub b: BigUint,
	pub c: BigUint,
}

impl R1csConstraint {
	pub fn new(a: LinearCombination, b: LinearCombination, c: LinearCombination) -> Self {
		let strip = |lc: LinearCombination| -> LinearCombination {
			lc.into_iter()
				.filter(|(_, value)| !value.is_zero())
				.collect()
		};
		Self {
			a: strip(a),
			b: strip(b),
			c: strip(c),
		}
	}

	/// Builds a constraint from small signed coefficients reduced into `field`.
	pub fn from_i64(
		field: &PrimeField,
		a: &[(Signal, i64)],
		b: &[(Signal, i64)],
		c: &[(Signal, i64)],
	) -> Self {
		let lc = |terms: &[(Signal, i64)]| {
			linear_combination(
				terms
					.iter()
					.map(|&(signal, value)| (signal, field.from_i64(value))),
			)
		};
		Self::new(lc(a), lc(b), lc(c))
	}

	/// A constraint is linear when the product side vanishes.
	pub fn is_linear(&self) -> bool {
		self.a.is_empty() || self.b.is_empty()
	}

	pub fn signals(&self) -> BTreeSet<Signal> {
		self.a
			.keys()
			.chain(self.b.keys())
			.chain(self.c.keys())
			.copied()
			.filter(|&signal| signal != CONSTANT_SIGNAL)
			.collect()
	}

	/// Whether `A` and `B` have the same coefficient multiset and can therefore be swapped.
	pub fn is_ab_unordered(&self) -> bool {
		!self.a.is_empty() && sorted_values(&self.a) == sorted_values(&self.b)
	}

	pub fn normalization_choices(&self, field: &PrimeField) -> Vec<R1csDivisors> {
		let a_choices = part_choices(field, &self.a);
		let b_choices = part_choices(field, &self.b);
		if self.is_linear() {
			let c_choices = part_choices(field, &self.c);
			return itertools::iproduct!(a_choices, b_choices, c_choices)
				.map(|(a, b, c)| R1csDivisors { a, b, c })
				.collect();
		}
		a_choices
			.into_iter()
			.cartesian_product(b_choices)
			.map(|(a, b)| {
				let c = field.mul(&a, &b);
				R1csDivisors { a, b, c }
			})
			.collect()
	}

	/// Divides the parts and puts `A` and `B` into canonical order. `None` for a zero divisor.
	pub fn divide(&self, field: &PrimeField, divisors: &R1csDivisors) -> Option<Self> {
		let a = divide_all(field, &self.a, &divisors.a)?;
		let b = divide_all(field, &self.b, &divisors.b)?;
		let c = divide_all(field, &self.c, &divisors.c)?;
		let (a, b) = canonical_sides(a, b);
		Some(Self { a, b, c })
	}

	pub fn normalize(&self, field: &PrimeField) -> Vec<Self> {
		self.normalization_choices(field)
			.iter()
			.filter_map(|divisors| self.divide(field, divisors))
			.sorted()
			.dedup()
			.collect()
	}

	pub fn fingerprint(&self, labels: impl Fn(Signal) -> ClassLabel) -> NormFingerprint {
		if !self.is_ab_unordered() {
			return NormFingerprint::Ordered {
				a: labelled_terms(&self.a, &labels),
				b: labelled_terms(&self.b, &labels),
				c: labelled_terms(&self.c, &labels),
			};
		}

		let mut both = Vec::new();
		let mut single = Vec::new();
		for (signal, a_value) in &self.a {
			match self.b.get(signal) {
				Some(b_value) => {
					let pair = sorted_pair(a_value.clone(), b_value.clone());
					both.push((labels(*signal), pair));
				}
				None => single.push((labels(*signal), a_value.clone())),
			}
		}
		for (signal, b_value) in &self.b {
			if !self.a.contains_key(signal) {
				single.push((labels(*signal), b_value.clone()));
			}
		}
		both.sort();
		single.sort();
		NormFingerprint::Unordered {
			both,
			single,
			c: labelled_terms(&self.c, &labels),
		}
	}

	pub fn characteristic(&self, signal: Signal) -> SignalCharacteristic {
		let value = |lc: &LinearCombination| lc.get(&signal).cloned().unwrap_or_default();
		let (a, b, c) = (value(&self.a), value(&self.b), value(&self.c));
		if !self.is_ab_unordered() {
			return SignalCharacteristic::R1cs {
				ab: (a, BigUint::zero()),
				side: b,
				c,
			};
		}
		if !a.is_zero() && !b.is_zero() {
			SignalCharacteristic::R1cs {
				ab: sorted_pair(a, b),
				side: BigUint::zero(),
				c,
			}
		} else {
			SignalCharacteristic::R1cs {
				ab: (BigUint::zero(), BigUint::zero()),
				side: a + b,
				c,
			}
		}
	}

	pub fn is_satisfied(&self, field: &PrimeField, values: &[BigUint]) -> bool {
		let (Some(a), Some(b), Some(c)) = (
			evaluate(field, &self.a, values),
			evaluate(field, &self.b, values),
			evaluate(field, &self.c, values),
		) else {
			return false;
		};
		field.mul(&a, &b) == c
	}

	pub(crate) fn map_signals(&self, map: &BTreeMap<Signal, Signal>) -> Self {
		let rename = |lc: &LinearCombination| -> LinearCombination {
			lc.iter()
				.map(|(signal, value)| (map[signal], value.clone()))
				.collect()
		};
		Self {
			a: rename(&self.a),
			b: rename(&self.b),
			c: rename(&self.c),
		}
	}
}

/// A part holding the constant signal is divided by its constant coefficient.
fn part_choices(field: &PrimeField, lc: &LinearCombination) -> Vec<BigUint> {
	match lc.get(&CONSTANT_SIGNAL) {
		Some(constant) => vec![constant.clone()],
		None => divisor_candidates(field, lc.values()),
	}
}

fn sorted_values(lc: &LinearCombination) -> Vec<&BigUint> {
	lc.values().sorted().collect()
}

fn sorted_pair(x: BigUint, y: BigUint) -> (BigUint, BigUint) {
	if x <= y { (x, y) } else { (y, x) }
}

fn canonical_sides(
	a: LinearCombination,
	b: LinearCombination,
) -> (LinearCombination, LinearCombination) {
	match sorted_values(&a)
		.cmp(&sorted_values(&b))
		.then_with(|| a.cmp(&b))
	{
		Ordering::Greater => (b, a),
		Ordering::Less | Ordering::Equal => (a, b),
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	fn gf23() -> PrimeField {
		PrimeField::new(BigUint::from(23u32))
	}

	#[test]
	fn test_scalar_factors_commute_out() {
		let f = gf23();
		let plain = R1csConstraint::from_i64(&f, &[(1, 1)], &[(2, 1)], &[(3, 1)]);
		let scaled = R1csConstraint::from_i64(&f, &[(1, 2)], &[(2, 3)], &[(3, 6)]);
		assert_eq!(plain.normalize(&f), scaled.normalize(&f));
		assert_eq!(plain.normalize(&f).len(), 1);
	}

	#[test]
	fn test_different_output_scale_is_detected() {
		let f = gf23();
		let plain = R1csConstraint::from_i64(&f, &[(1, 1)], &[(2, 1)], &[(3, 1)]);
		let doubled = R1csConstraint::from_i64(&f, &[(1, 1)], &[(2, 1)], &[(3, 2)]);
		assert_ne!(plain.normalize(&f), doubled.normalize(&f));
	}

	#[test]
	fn test_swapped_sides_normalize_identically() {
		let f = gf23();
		let ab = R1csConstraint::from_i64(&f, &[(1, 4)], &[(2, 5), (0, 1)], &[(3, 1)]);
		let ba = R1csConstraint::from_i64(&f, &[(2, 5), (0, 1)], &[(1, 4)], &[(3, 1)]);
		assert_eq!(ab.normalize(&f), ba.normalize(&f));
	}

	#[test]
	fn test_constant_signal_fixes_the_divisor() {
		let f = gf23();
		// (x - 1) * y = 0, the A part sums to zero but holds the constant.
		let c = R1csConstraint::from_i64(&f, &[(0, -1), (1, 1)], &[(2, 1)], &[]);
		let choices = c.normalization_choices(&f);
		assert_eq!(choices.len(), 1);
		assert_eq!(choices[0].a, f.from_i64(-1));
	}

	#[test]
	fn test_linear_constraint_enumerates_zero_sum_ties() {
		let f = gf23();
		// x - y = 0 has two equally good divisors; both normal forms coincide up to sign.
		let c = R1csConstraint::from_i64(&f, &[], &[], &[(1, 1), (2, -1)]);
		let norms = c.normalize(&f);
		assert_eq!(norms.len(), 2);
		assert!(norms.iter().all(|norm| norm.is_linear()));
	}

	#[test]
	fn test_unordered_fingerprint_is_symmetric() {
		let f = gf23();
		let c = R1csConstraint::from_i64(&f, &[(1, 1)], &[(2, 1)], &[(3, 1)]);
		let norm = &c.normalize(&f)[0];
		assert!(norm.is_ab_unordered());
		let label = |s: Signal| ClassLabel::initial(usize::from(s == 3));
		let NormFingerprint::Unordered { both, single, c } = norm.fingerprint(label) else {
			panic!("expected an unordered fingerprint");
		};
		assert!(both.is_empty());
		assert_eq!(single.len(), 2);
		assert_eq!(c, vec![(ClassLabel::initial(1), BigUint::from(1u32))]);
		assert_eq!(norm.characteristic(1), norm.characteristic(2));
	}

	#[test]
	fn test_is_satisfied() {
		let f = gf23();
		let c = R1csConstraint::from_i64(&f, &[(1, 1)], &[(2, 1)], &[(3, 1)]);
		let values = [1u32, 3, 5, 15].map(BigUint::from);
		assert!(c.is_satisfied(&f, &values));
		let values = [1u32, 3, 5, 14].map(BigUint::from);
		assert!(!c.is_satisfied(&f, &values));
	}

	fn arb_lc(max_len: usize) -> impl Strategy<Value = Vec<(Signal, i64)>> {
		prop::collection::vec((0usize..6, -30i64..30), 0..=max_len)
	}

	proptest! {
		#[test]
		fn prop_normalization_ignores_rescaling(
			a in arb_lc(3),
			b in arb_lc(3),
			c in arb_lc(3),
			ka in 1i64..1000,
			kb in 1i64..1000,
			kc in 1i64..1000,
		) {
			let f = PrimeField::new(BigUint::from(1009u32));
			let original = R1csConstraint::from_i64(&f, &a, &b, &c);
			let scale = |terms: &[(Signal, i64)], k: i64| {
				terms.iter().map(|&(s, v)| (s, v * k)).collect::<Vec<_>>()
			};
			let rescaled = if original.is_linear() {
				R1csConstraint::from_i64(&f, &scale(&a, ka), &scale(&b, kb), &scale(&c, kc))
			} else {
				R1csConstraint::from_i64(&f, &scale(&a, ka), &scale(&b, kb), &scale(&c, ka * kb))
			};
			prop_assert_eq!(original.normalize(&f), rescaled.normalize(&f));
		}
	}
}
