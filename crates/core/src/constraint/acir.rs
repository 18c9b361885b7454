// Copyright 2025 Irreducible Inc.
use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use num_bigint::BigUint;
use num_traits::Zero;

use super::{LinearCombination, Signal};
use crate::{
	consts::CONSTANT_SIGNAL,
	field::PrimeField,
	fingerprint::{ClassLabel, LabelledTerms, NormFingerprint, SignalCharacteristic},
	normalize::{divide_all, divisor_candidates},
};

/// Quadratic terms keyed by the signal pair stored as `(min, max)`.
pub type QuadraticTerms = BTreeMap<(Signal, Signal), BigUint>;

/// An ACIR arithmetic opcode `sum(q_ij * x_i * x_j) + sum(l_i * x_i) + k = 0`.
///
/// Terms touching the constant signal are folded into lower-degree terms on construction, so
/// `mult` and `linear` only mention non-constant signals.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AcirConstraint {
	pub mult: QuadraticTerms,
	pub linear: LinearCombination,
	pub constant: BigUint,
}

impl AcirConstraint {
	pub fn new(
		field: &PrimeField,
		mult: impl IntoIterator<Item = ((Signal, Signal), BigUint)>,
		linear: impl IntoIterator<Item = (Signal, BigUint)>,
		constant: BigUint,
	) -> Self {
		let mut quadratic = QuadraticTerms::new();
		let mut lin = LinearCombination::new();
		let mut constant = field.element(constant);
		let accumulate = |map: &mut LinearCombination, signal: Signal, value: &BigUint| {
			let entry = map.entry(signal).or_default();
			*entry = field.add(entry, value);
		};

		for ((x, y), value) in mult {
			match (x.min(y), x.max(y)) {
				(CONSTANT_SIGNAL, CONSTANT_SIGNAL) => constant = field.add(&constant, &value),
				(CONSTANT_SIGNAL, other) => accumulate(&mut lin, other, &value),
				key => {
					let entry = quadratic.entry(key).or_default();
					*entry = field.add(entry, &value);
				}
			}
		}
		for (signal, value) in linear {
			if signal == CONSTANT_SIGNAL {
				constant = field.add(&constant, &value);
			} else {
				accumulate(&mut lin, signal, &value);
			}
		}

		quadratic.retain(|_, value| !value.is_zero());
		lin.retain(|_, value| !value.is_zero());
		Self {
			mult: quadratic,
			linear: lin,
			constant,
		}
	}

	/// Builds a constraint from small signed coefficients reduced into `field`.
	pub fn from_i64(
		field: &PrimeField,
		mult: &[((Signal, Signal), i64)],
		linear: &[(Signal, i64)],
		constant: i64,
	) -> Self {
		Self::new(
			field,
			mult.iter().map(|&(key, value)| (key, field.from_i64(value))),
			linear
				.iter()
				.map(|&(signal, value)| (signal, field.from_i64(value))),
			field.from_i64(constant),
		)
	}

	pub fn signals(&self) -> BTreeSet<Signal> {
		self.mult
			.keys()
			.flat_map(|&(x, y)| [x, y])
			.chain(self.linear.keys().copied())
			.collect()
	}

	pub fn is_nonlinear(&self) -> bool {
		!self.mult.is_empty()
	}

	/// A nonzero constant fixes the divisor, otherwise the highest-degree terms present decide.
	pub fn normalization_choices(&self, field: &PrimeField) -> Vec<BigUint> {
		if !self.constant.is_zero() {
			vec![self.constant.clone()]
		} else if !self.mult.is_empty() {
			divisor_candidates(field, self.mult.values())
		} else {
			divisor_candidates(field, self.linear.values())
		}
	}

	pub fn divide(&self, field: &PrimeField, divisor: &BigUint) -> Option<Self> {
		Some(Self {
			mult: divide_all(field, &self.mult, divisor)?,
			linear: divide_all(field, &self.linear, divisor)?,
			constant: field.div(&self.constant, divisor)?,
		})
	}

	pub fn normalize(&self, field: &PrimeField) -> Vec<Self> {
		self.normalization_choices(field)
			.iter()
			.filter_map(|divisor| self.divide(field, divisor))
			.sorted()
			.dedup()
			.collect()
	}

	pub fn fingerprint(&self, labels: impl Fn(Signal) -> ClassLabel) -> NormFingerprint {
		let mut mult = BTreeMap::<(ClassLabel, ClassLabel), Vec<BigUint>>::new();
		for (&(x, y), value) in &self.mult {
			let (lx, ly) = (labels(x), labels(y));
			let key = if lx <= ly { (lx, ly) } else { (ly, lx) };
			mult.entry(key).or_default().push(value.clone());
		}
		let mut linear = BTreeMap::<ClassLabel, Vec<BigUint>>::new();
		for (&signal, value) in &self.linear {
			linear.entry(labels(signal)).or_default().push(value.clone());
		}
		NormFingerprint::Acir {
			mult: mult
				.into_iter()
				.map(|(key, mut values)| {
					values.sort();
					(key, values)
				})
				.collect(),
			linear: linear
				.into_iter()
				.map(|(key, mut values)| {
					values.sort();
					(key, values)
				})
				.collect(),
			constant: self.constant.clone(),
		}
	}

	pub fn characteristic(
		&self,
		signal: Signal,
		labels: impl Fn(Signal) -> ClassLabel,
	) -> SignalCharacteristic {
		let mult: LabelledTerms = self
			.mult
			.iter()
			.filter_map(|(&(x, y), value)| {
				let partner = if x == signal {
					y
				} else if y == signal {
					x
				} else {
					return None;
				};
				Some((labels(partner), value.clone()))
			})
			.sorted()
			.collect();
		SignalCharacteristic::Acir {
			mult,
			linear: self.linear.get(&signal).cloned().unwrap_or_default(),
		}
	}

	pub fn is_satisfied(&self, field: &PrimeField, values: &[BigUint]) -> bool {
		let value_of = |signal: Signal| values.get(signal);
		let mut total = self.constant.clone();
		for (&(x, y), coefficient) in &self.mult {
			let (Some(vx), Some(vy)) = (value_of(x), value_of(y)) else {
				return false;
			};
			total = field.add(&total, &field.mul(coefficient, &field.mul(vx, vy)));
		}
		for (&signal, coefficient) in &self.linear {
			let Some(value) = value_of(signal) else {
				return false;
			};
			total = field.add(&total, &field.mul(coefficient, value));
		}
		total.is_zero()
	}

	pub(crate) fn map_signals(&self, map: &BTreeMap<Signal, Signal>) -> Self {
		Self {
			mult: self
				.mult
				.iter()
				.map(|(&(x, y), value)| {
					let (x, y) = (map[&x], map[&y]);
					((x.min(y), x.max(y)), value.clone())
				})
				.collect(),
			linear: self
				.linear
				.iter()
				.map(|(signal, value)| (map[signal], value.clone()))
				.collect(),
			constant: self.constant.clone(),
		}
	}
}
