// Copyright 2025 Irreducible Inc.
//! Witness mappings between two circuits and their verification.

use std::collections::{BTreeMap, BTreeSet};

use arckit_core::{CONSTANT_SIGNAL, Circuit, Norm, Signal};
use arckit_utils::Assignment;

use crate::{encoder::PairVar, fingerprinter::Refinement, solver::Model};

/// Left-to-right maps of signals and of constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
	pub signals: BTreeMap<Signal, Signal>,
	pub constraints: BTreeMap<usize, usize>,
}

impl Mapping {
	/// Reads the mapping off a refinement in which every class is a singleton on both sides.
	///
	/// Returns `None` if the refinement is not discrete or if the norms of one left constraint are
	/// spread over several right constraints.
	pub fn from_refinement(refinement: &Refinement, norms: [&[Norm]; 2]) -> Option<Self> {
		let mut mapping = Mapping::default();
		for members in refinement.signal_classes.values() {
			let [left, right] = members.as_slice() else {
				return None;
			};
			let (&[l], &[r]) = (left.as_slice(), right.as_slice()) else {
				return None;
			};
			mapping.signals.insert(l, r);
		}
		for members in refinement.norm_classes.values() {
			let [left, right] = members.as_slice() else {
				return None;
			};
			let (&[l], &[r]) = (left.as_slice(), right.as_slice()) else {
				return None;
			};
			if !mapping.insert_constraint(norms[0][l].origin, norms[1][r].origin) {
				return None;
			}
		}
		Some(mapping)
	}

	/// Collects the true pair variables of `model`.
	pub fn decode(vars: &Assignment<PairVar>, model: &Model, norms: [&[Norm]; 2]) -> Self {
		let mut mapping = Mapping {
			signals: BTreeMap::from([(CONSTANT_SIGNAL, CONSTANT_SIGNAL)]),
			constraints: BTreeMap::new(),
		};
		for (var, pair) in vars.iter() {
			if !model.is_true(var) {
				continue;
			}
			match *pair {
				PairVar::Signal(l, r) => {
					mapping.signals.insert(l, r);
				}
				PairVar::Norm(l, r) => {
					mapping.insert_constraint(norms[0][l].origin, norms[1][r].origin);
				}
			}
		}
		mapping
	}

	/// Records a constraint pair; `false` if `left` is already mapped elsewhere.
	fn insert_constraint(&mut self, left: usize, right: usize) -> bool {
		*self.constraints.entry(left).or_insert(right) == right
	}

	/// Keeps the signals that occur in a mapped left constraint, plus the constant.
	pub fn restrict_to_constraints(&mut self, left: &Circuit) {
		let mut used = BTreeSet::from([CONSTANT_SIGNAL]);
		for &c in self.constraints.keys() {
			used.extend(left.constraint(c).signals());
		}
		self.signals.retain(|signal, _| used.contains(signal));
	}

	/// The right-to-left mapping.
	pub fn inverse(&self) -> Self {
		Self {
			signals: self.signals.iter().map(|(&l, &r)| (r, l)).collect(),
			constraints: self.constraints.iter().map(|(&l, &r)| (r, l)).collect(),
		}
	}

	/// Applies `self`, then `next`. Entries whose image `next` does not map are dropped.
	pub fn then(&self, next: &Mapping) -> Self {
		Self {
			signals: self
				.signals
				.iter()
				.filter_map(|(&l, m)| Some((l, *next.signals.get(m)?)))
				.collect(),
			constraints: self
				.constraints
				.iter()
				.filter_map(|(&l, m)| Some((l, *next.constraints.get(m)?)))
				.collect(),
		}
	}
}

/// A defect found while checking a mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
	#[error("left signal {0} is not mapped")]
	UnmappedSignal(Signal),
	#[error("right signal {0} is the image of several left signals")]
	SignalCollision(Signal),
	#[error("left signal {left} is mapped to right signal {right} of a different role")]
	RoleMismatch { left: Signal, right: Signal },
	#[error("left constraint {0} is not mapped")]
	UnmappedConstraint(usize),
	#[error("right constraint {0} is the image of several left constraints")]
	ConstraintCollision(usize),
	#[error("constraint index {0} is out of range")]
	OutOfRange(usize),
	#[error("left constraint {left} is not a multiple of right constraint {right} under the mapping")]
	ConstraintMismatch { left: usize, right: usize },
}

/// Checks that `mapping` is a full equivalence between `left` and `right`.
///
/// Every signal and constraint must be mapped injectively, roles must be kept and each constraint
/// must become a nonzero multiple of its image once its signals are renamed.
pub fn sanity_check(
	left: &Circuit,
	right: &Circuit,
	mapping: &Mapping,
) -> Result<(), MappingError> {
	for signal in 0..left.n_signals() {
		let image = *mapping
			.signals
			.get(&signal)
			.ok_or(MappingError::UnmappedSignal(signal))?;
		if image >= right.n_signals() || left.signal_role(signal) != right.signal_role(image) {
			return Err(MappingError::RoleMismatch {
				left: signal,
				right: image,
			});
		}
	}
	for constraint in 0..left.n_constraints() {
		if !mapping.constraints.contains_key(&constraint) {
			return Err(MappingError::UnmappedConstraint(constraint));
		}
	}
	check_matched_constraints(left, right, mapping)
}

/// Checks the mapped constraints only, as produced by a maximal equivalence search.
pub fn check_matched_constraints(
	left: &Circuit,
	right: &Circuit,
	mapping: &Mapping,
) -> Result<(), MappingError> {
	let mut images = BTreeSet::new();
	for &image in mapping.signals.values() {
		if !images.insert(image) {
			return Err(MappingError::SignalCollision(image));
		}
	}
	let mut images = BTreeSet::new();
	for (&l, &r) in &mapping.constraints {
		if !images.insert(r) {
			return Err(MappingError::ConstraintCollision(r));
		}
		if l >= left.n_constraints() {
			return Err(MappingError::OutOfRange(l));
		}
		if r >= right.n_constraints() {
			return Err(MappingError::OutOfRange(r));
		}
		let original = left.constraint(l);
		if let Some(&signal) = original
			.signals()
			.iter()
			.find(|signal| !mapping.signals.contains_key(signal))
		{
			return Err(MappingError::UnmappedSignal(signal));
		}
		let renamed = original
			.signal_map(|signal| mapping.signals[&signal])
			.map_err(|_| MappingError::ConstraintMismatch { left: l, right: r })?;
		if !renamed.is_scalar_multiple_of(right.constraint(r), left.field()) {
			return Err(MappingError::ConstraintMismatch { left: l, right: r });
		}
	}
	Ok(())
}
