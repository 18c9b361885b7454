// Copyright 2025 Irreducible Inc.
//! Constraint representation for the two supported dialects.
//!
//! [`Constraint`] wraps an R1CS or an ACIR constraint and exposes the dialect-agnostic operations
//! that normalization, fingerprinting and clustering need.

mod acir;
mod r1cs;

use std::{
	collections::{BTreeMap, BTreeSet},
	fmt,
};

pub use acir::{AcirConstraint, QuadraticTerms};
use itertools::Itertools;
use num_bigint::BigUint;
use num_traits::Zero;
pub use r1cs::{R1csConstraint, R1csDivisors};

use crate::{
	consts::CONSTANT_SIGNAL,
	error::CircuitError,
	field::PrimeField,
	fingerprint::{ClassLabel, LabelledTerms, NormFingerprint, SignalCharacteristic},
};

/// Index of a wire. Signal 0 is the constant one.
pub type Signal = usize;

/// Sparse map from signal to nonzero coefficient.
pub type LinearCombination = BTreeMap<Signal, BigUint>;

/// Collects terms into a linear combination, dropping zero coefficients.
pub fn linear_combination(terms: impl IntoIterator<Item = (Signal, BigUint)>) -> LinearCombination {
	terms
		.into_iter()
		.filter(|(_, value)| !value.is_zero())
		.collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dialect {
	R1cs,
	Acir,
}

impl Dialect {
	pub fn name(self) -> &'static str {
		match self {
			Dialect::R1cs => "R1CS",
			Dialect::Acir => "ACIR",
		}
	}
}

impl fmt::Display for Dialect {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// The divisors applied to a constraint to obtain one of its normal forms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NormalizationChoice {
	R1cs(R1csDivisors),
	Acir(BigUint),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constraint {
	R1cs(R1csConstraint),
	Acir(AcirConstraint),
}

impl Constraint {
	pub fn dialect(&self) -> Dialect {
		match self {
			Constraint::R1cs(_) => Dialect::R1cs,
			Constraint::Acir(_) => Dialect::Acir,
		}
	}

	/// All non-constant signals referenced by the constraint.
	pub fn signals(&self) -> BTreeSet<Signal> {
		match self {
			Constraint::R1cs(c) => c.signals(),
			Constraint::Acir(c) => c.signals(),
		}
	}

	pub fn is_nonlinear(&self) -> bool {
		match self {
			Constraint::R1cs(c) => !c.is_linear(),
			Constraint::Acir(c) => c.is_nonlinear(),
		}
	}

	/// Renames the signals of the constraint.
	///
	/// The constant signal is kept in place. The renaming must be injective on the referenced
	/// signals and must not send any of them onto the constant signal.
	pub fn signal_map(&self, f: impl Fn(Signal) -> Signal) -> Result<Self, CircuitError> {
		let mut map = BTreeMap::from([(CONSTANT_SIGNAL, CONSTANT_SIGNAL)]);
		let mut preimage = BTreeMap::new();
		for signal in self.signals() {
			let image = f(signal);
			if image == CONSTANT_SIGNAL {
				return Err(CircuitError::SignalMappedToConstant { signal });
			}
			if let Some(&first) = preimage.get(&image) {
				return Err(CircuitError::NonInjectiveSignalMap {
					first,
					second: signal,
					image,
				});
			}
			preimage.insert(image, signal);
			map.insert(signal, image);
		}
		Ok(match self {
			Constraint::R1cs(c) => Constraint::R1cs(c.map_signals(&map)),
			Constraint::Acir(c) => Constraint::Acir(c.map_signals(&map)),
		})
	}

	pub fn normalization_choices(&self, field: &PrimeField) -> Vec<NormalizationChoice> {
		match self {
			Constraint::R1cs(c) => c
				.normalization_choices(field)
				.into_iter()
				.map(NormalizationChoice::R1cs)
				.collect(),
			Constraint::Acir(c) => c
				.normalization_choices(field)
				.into_iter()
				.map(NormalizationChoice::Acir)
				.collect(),
		}
	}

	/// The sorted, duplicate-free list of normal forms.
	///
	/// Two constraints over the same signals differ by a nonzero scalar exactly when their lists
	/// intersect.
	pub fn normalize(&self, field: &PrimeField) -> Vec<Constraint> {
		match self {
			Constraint::R1cs(c) => c
				.normalize(field)
				.into_iter()
				.map(Constraint::R1cs)
				.collect(),
			Constraint::Acir(c) => c
				.normalize(field)
				.into_iter()
				.map(Constraint::Acir)
				.collect(),
		}
	}

	/// Whether the normal forms of `self` and `other` intersect.
	pub fn is_scalar_multiple_of(&self, other: &Constraint, field: &PrimeField) -> bool {
		let ours = self.normalize(field);
		other
			.normalize(field)
			.iter()
			.any(|norm| ours.binary_search(norm).is_ok())
	}

	pub fn fingerprint(&self, labels: impl Fn(Signal) -> ClassLabel) -> NormFingerprint {
		match self {
			Constraint::R1cs(c) => c.fingerprint(labels),
			Constraint::Acir(c) => c.fingerprint(labels),
		}
	}

	/// How `signal` takes part in this constraint, for use in the signal's own fingerprint.
	pub fn characteristic(
		&self,
		signal: Signal,
		labels: impl Fn(Signal) -> ClassLabel,
	) -> SignalCharacteristic {
		match self {
			Constraint::R1cs(c) => c.characteristic(signal),
			Constraint::Acir(c) => c.characteristic(signal, labels),
		}
	}

	/// Evaluates the constraint on a full assignment where `values[0]` is one.
	pub fn is_satisfied(&self, field: &PrimeField, values: &[BigUint]) -> bool {
		match self {
			Constraint::R1cs(c) => c.is_satisfied(field, values),
			Constraint::Acir(c) => c.is_satisfied(field, values),
		}
	}

	pub fn as_r1cs(&self) -> Option<&R1csConstraint> {
		match self {
			Constraint::R1cs(c) => Some(c),
			Constraint::Acir(_) => None,
		}
	}

	pub fn as_acir(&self) -> Option<&AcirConstraint> {
		match self {
			Constraint::R1cs(_) => None,
			Constraint::Acir(c) => Some(c),
		}
	}

	/// A constraint of the form `x - y = 0` or, when `relaxed`, `x - y = c`.
	///
	/// Returns the two signals when it matches.
	pub fn signal_equivalence(&self, field: &PrimeField, relaxed: bool) -> Option<(Signal, Signal)> {
		let (terms, constant) = match self {
			Constraint::R1cs(c) => {
				if !c.is_linear() {
					return None;
				}
				let mut terms = c.c.clone();
				let constant = terms.remove(&CONSTANT_SIGNAL);
				(terms, constant)
			}
			Constraint::Acir(c) => {
				if c.is_nonlinear() {
					return None;
				}
				let constant = (!c.constant.is_zero()).then(|| c.constant.clone());
				(c.linear.clone(), constant)
			}
		};
		if constant.is_some() && !relaxed {
			return None;
		}
		let ((x, vx), (y, vy)) = terms.into_iter().collect_tuple()?;
		(field.add(&vx, &vy).is_zero()).then_some((x, y))
	}
}

impl From<R1csConstraint> for Constraint {
	fn from(c: R1csConstraint) -> Self {
		Constraint::R1cs(c)
	}
}

impl From<AcirConstraint> for Constraint {
	fn from(c: AcirConstraint) -> Self {
		Constraint::Acir(c)
	}
}

fn labelled_terms(lc: &LinearCombination, labels: &impl Fn(Signal) -> ClassLabel) -> LabelledTerms {
	lc.iter()
		.map(|(&signal, value)| (labels(signal), value.clone()))
		.sorted()
		.collect()
}

/// `<lc, values>`, or `None` when a signal has no value.
fn evaluate(field: &PrimeField, lc: &LinearCombination, values: &[BigUint]) -> Option<BigUint> {
	let mut total = BigUint::zero();
	for (&signal, coefficient) in lc {
		let value = values.get(signal)?;
		total = field.add(&total, &field.mul(coefficient, value));
	}
	Some(total)
}
