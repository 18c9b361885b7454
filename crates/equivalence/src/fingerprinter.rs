// Copyright 2025 Irreducible Inc.
//! Back-and-forth color refinement over signals and normalized constraints.
//!
//! The bipartite graph has a vertex per norm and per signal, with an edge whenever a signal occurs
//! in a norm. Starting from a coarse partition (norms all alike, signals by role) the refinement
//! alternates between modes. In a norm round every norm of a class on the frontier is keyed by its
//! [`NormFingerprint`] under the current signal labels; in a signal round every signal is keyed by
//! the sorted list of `(norm label, characteristic)` over the norms holding it. Classes whose
//! members disagree on the key are split.
//!
//! When two circuits are refined in lockstep both sides share one label space, and a class whose
//! sizes differ between the sides proves the circuits are not equivalent. A single circuit can be
//! refined on its own; the hashed sequence of round keys then serves as a fingerprint of the
//! circuit that is invariant under renumbering and rescaling.
//!
//! Classes with one member per side are singular: they receive a label from a monotone singular
//! counter and are never recomputed. Only classes adjacent to something that split in the
//! previous round are recomputed, and always as a whole on both sides.

use std::{
	collections::{BTreeMap, BTreeSet},
	hash::{DefaultHasher, Hash, Hasher},
};

use arckit_core::{
	Circuit, ClassLabel, Norm, Round, Signal, SignalCharacteristic, SignalRole,
};
use arckit_utils::Assignment;
use itertools::Itertools;

use crate::error::{EquivalenceError, ItemKind, NotEquivalentReason};

/// Members of one class: a sorted index list per side.
pub type Members = Vec<Vec<usize>>;

/// Key of a signal within one round.
pub type SignalFingerprint = Vec<(ClassLabel, SignalCharacteristic)>;

/// Stable labelling produced by a refinement run.
#[derive(Debug, Clone)]
pub struct Refinement {
	/// `norm_labels[side][norm]`.
	pub norm_labels: Vec<Vec<ClassLabel>>,
	/// `signal_labels[side][signal]`; the constant signal carries a singular label.
	pub signal_labels: Vec<Vec<ClassLabel>>,
	pub norm_classes: BTreeMap<ClassLabel, Members>,
	pub signal_classes: BTreeMap<ClassLabel, Members>,
	/// Number of refinement rounds that were run.
	pub rounds: u32,
	/// Digest of every round's sorted keys and class sizes.
	pub trace: u64,
}

impl Refinement {
	/// Whether every class is singular, so the mapping can be read off the labels.
	pub fn is_discrete(&self) -> bool {
		self.norm_classes.keys().all(ClassLabel::is_singular)
			&& self.signal_classes.keys().all(ClassLabel::is_singular)
	}

	pub fn residual_norm_classes(&self) -> impl Iterator<Item = (&ClassLabel, &Members)> {
		self.norm_classes
			.iter()
			.filter(|(label, _)| !label.is_singular())
	}

	pub fn residual_signal_classes(&self) -> impl Iterator<Item = (&ClassLabel, &Members)> {
		self.signal_classes
			.iter()
			.filter(|(label, _)| !label.is_singular())
	}
}

/// Refines two circuits in lockstep, failing early when they are told apart.
pub fn refine_pair(
	left: (&Circuit, &[Norm]),
	right: (&Circuit, &[Norm]),
) -> Result<Refinement, EquivalenceError> {
	let _span = tracing::debug_span!("refine_pair").entered();
	let sides = vec![SideGraph::new(left.0, left.1), SideGraph::new(right.0, right.1)];
	Fingerprinter::new(sides)?.run()
}

/// Refines a single circuit.
pub fn refine_single(circuit: &Circuit, norms: &[Norm]) -> Refinement {
	let sides = vec![SideGraph::new(circuit, norms)];
	Fingerprinter::new(sides)
		.and_then(Fingerprinter::run)
		.expect("a single side cannot disagree with itself")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	NormRound,
	SignalRound,
	/// The last signal round split nothing; stop unless this norm round splits.
	BreakOnNextNorm,
	/// The last norm round split nothing; stop unless this signal round splits.
	BreakOnNextSignal,
}

struct SideGraph<'a> {
	norms: &'a [Norm],
	roles: Vec<SignalRole>,
	signal_norms: Vec<Vec<usize>>,
	norm_signals: Vec<Vec<Signal>>,
}

impl<'a> SideGraph<'a> {
	fn new(circuit: &Circuit, norms: &'a [Norm]) -> Self {
		let mut signal_norms = vec![Vec::new(); circuit.n_signals()];
		let norm_signals = norms
			.iter()
			.enumerate()
			.map(|(index, norm)| {
				let signals = norm.constraint.signals();
				for &signal in &signals {
					signal_norms[signal].push(index);
				}
				signals.into_iter().collect()
			})
			.collect();
		Self {
			norms,
			roles: (0..circuit.n_signals())
				.map(|signal| circuit.signal_role(signal))
				.collect(),
			signal_norms,
			norm_signals,
		}
	}
}

struct Fingerprinter<'a> {
	sides: Vec<SideGraph<'a>>,
	norm_labels: Vec<Vec<ClassLabel>>,
	signal_labels: Vec<Vec<ClassLabel>>,
	norm_classes: BTreeMap<ClassLabel, Members>,
	signal_classes: BTreeMap<ClassLabel, Members>,
	norm_frontier: BTreeSet<ClassLabel>,
	signal_frontier: BTreeSet<ClassLabel>,
	num_singular: usize,
	round: u32,
	trace: DefaultHasher,
}

impl<'a> Fingerprinter<'a> {
	fn new(sides: Vec<SideGraph<'a>>) -> Result<Self, EquivalenceError> {
		let n_sides = sides.len();
		let placeholder = ClassLabel::initial(0);
		let mut this = Self {
			norm_labels: sides
				.iter()
				.map(|side| vec![placeholder; side.norms.len()])
				.collect(),
			signal_labels: sides
				.iter()
				.map(|side| vec![placeholder; side.roles.len()])
				.collect(),
			sides,
			norm_classes: BTreeMap::new(),
			signal_classes: BTreeMap::new(),
			norm_frontier: BTreeSet::new(),
			signal_frontier: BTreeSet::new(),
			num_singular: 0,
			round: 0,
			trace: DefaultHasher::new(),
		};

		let mut by_role = BTreeMap::<SignalRole, Members>::new();
		for (side_index, side) in this.sides.iter().enumerate() {
			for (signal, &role) in side.roles.iter().enumerate() {
				by_role
					.entry(role)
					.or_insert_with(|| vec![Vec::new(); n_sides])[side_index]
					.push(signal);
			}
		}
		this.seed(ItemKind::Signal, by_role)?;

		let all_norms = this
			.sides
			.iter()
			.map(|side| (0..side.norms.len()).collect::<Vec<_>>())
			.collect::<Members>();
		let norm_seed = if all_norms.iter().all(Vec::is_empty) {
			BTreeMap::new()
		} else {
			BTreeMap::from([((), all_norms)])
		};
		this.seed(ItemKind::Norm, norm_seed)?;

		Ok(this)
	}

	/// Installs the initial partition of one mode.
	///
	/// Every seeded class is recomputed once, singular ones included, so that a lone pair is
	/// still compared before it is frozen.
	fn seed<K: Ord + Hash>(
		&mut self,
		kind: ItemKind,
		groups: BTreeMap<K, Members>,
	) -> Result<(), EquivalenceError> {
		for (rank, (key, members)) in groups.into_iter().enumerate() {
			let label = if is_singular(&members) {
				self.next_singular()
			} else {
				ClassLabel::initial(rank)
			};
			check_sizes(kind, label, self.round, &members)?;
			(kind, &key, member_counts(&members)).hash(&mut self.trace);

			let (labels, classes, frontier) = self.mode_mut(kind);
			for (side, items) in members.iter().enumerate() {
				for &item in items {
					labels[side][item] = label;
				}
			}
			frontier.insert(label);
			classes.insert(label, members);
		}
		Ok(())
	}

	fn run(mut self) -> Result<Refinement, EquivalenceError> {
		let mut state = State::NormRound;
		while !(self.norm_frontier.is_empty() && self.signal_frontier.is_empty()) {
			state = match state {
				State::NormRound | State::BreakOnNextNorm => {
					let split = self.norm_round()?;
					match (split, state) {
						(true, _) => State::SignalRound,
						(false, State::BreakOnNextNorm) => break,
						(false, _) => State::BreakOnNextSignal,
					}
				}
				State::SignalRound | State::BreakOnNextSignal => {
					let split = self.signal_round()?;
					match (split, state) {
						(true, _) => State::NormRound,
						(false, State::BreakOnNextSignal) => break,
						(false, _) => State::BreakOnNextNorm,
					}
				}
			};
		}
		tracing::debug!(
			rounds = self.round,
			norm_classes = self.norm_classes.len(),
			signal_classes = self.signal_classes.len(),
			"refinement saturated"
		);

		Ok(Refinement {
			norm_labels: self.norm_labels,
			signal_labels: self.signal_labels,
			norm_classes: self.norm_classes,
			signal_classes: self.signal_classes,
			rounds: self.round,
			trace: self.trace.finish(),
		})
	}

	fn norm_round(&mut self) -> Result<bool, EquivalenceError> {
		self.round += 1;
		let frontier = std::mem::take(&mut self.norm_frontier);
		let n_sides = self.sides.len();

		let mut groups = BTreeMap::new();
		for label in frontier {
			let Some(members) = self.norm_classes.get(&label) else {
				continue;
			};
			for (side_index, items) in members.iter().enumerate() {
				let side = &self.sides[side_index];
				let signal_labels = &self.signal_labels[side_index];
				for &norm in items {
					let key = side.norms[norm]
						.constraint
						.fingerprint(|signal| signal_labels[signal]);
					groups
						.entry((label, key))
						.or_insert_with(|| vec![Vec::new(); n_sides])[side_index]
						.push(norm);
				}
			}
		}

		let changed = self.apply_split(ItemKind::Norm, groups)?;
		for &(side_index, norm) in &changed {
			for &signal in &self.sides[side_index].norm_signals[norm] {
				let label = self.signal_labels[side_index][signal];
				if !label.is_singular() {
					self.signal_frontier.insert(label);
				}
			}
		}
		Ok(!changed.is_empty())
	}

	fn signal_round(&mut self) -> Result<bool, EquivalenceError> {
		self.round += 1;
		let frontier = std::mem::take(&mut self.signal_frontier);
		let n_sides = self.sides.len();

		let mut groups = BTreeMap::new();
		for label in frontier {
			let Some(members) = self.signal_classes.get(&label) else {
				continue;
			};
			for (side_index, items) in members.iter().enumerate() {
				let side = &self.sides[side_index];
				let norm_labels = &self.norm_labels[side_index];
				let signal_labels = &self.signal_labels[side_index];
				for &signal in items {
					let key: SignalFingerprint = side.signal_norms[signal]
						.iter()
						.map(|&norm| {
							let characteristic = side.norms[norm]
								.constraint
								.characteristic(signal, |other| signal_labels[other]);
							(norm_labels[norm], characteristic)
						})
						.sorted()
						.collect();
					groups
						.entry((label, key))
						.or_insert_with(|| vec![Vec::new(); n_sides])[side_index]
						.push(signal);
				}
			}
		}

		let changed = self.apply_split(ItemKind::Signal, groups)?;
		for &(side_index, signal) in &changed {
			for &norm in &self.sides[side_index].signal_norms[signal] {
				let label = self.norm_labels[side_index][norm];
				if !label.is_singular() {
					self.norm_frontier.insert(label);
				}
			}
		}
		Ok(!changed.is_empty())
	}

	/// Splits the recomputed classes and relabels their members.
	///
	/// Returns every `(side, item)` whose label changed.
	fn apply_split<K: Ord + Clone + Hash>(
		&mut self,
		kind: ItemKind,
		groups: BTreeMap<(ClassLabel, K), Members>,
	) -> Result<Vec<(usize, usize)>, EquivalenceError> {
		for ((old, key), members) in &groups {
			check_sizes(kind, *old, self.round, members)?;
			(kind, self.round, old, key, member_counts(members)).hash(&mut self.trace);
		}

		let round = self.round;
		let splits = split_classes(groups, round, &mut self.num_singular);
		let (labels, classes, _) = self.mode_mut(kind);
		let mut changed = Vec::new();
		for split in splits {
			classes.remove(&split.old);
			for (label, members) in split.parts {
				for (side, items) in members.iter().enumerate() {
					for &item in items {
						labels[side][item] = label;
						changed.push((side, item));
					}
				}
				classes.insert(label, members);
			}
		}
		Ok(changed)
	}

	fn mode_mut(
		&mut self,
		kind: ItemKind,
	) -> (
		&mut Vec<Vec<ClassLabel>>,
		&mut BTreeMap<ClassLabel, Members>,
		&mut BTreeSet<ClassLabel>,
	) {
		match kind {
			ItemKind::Norm => (
				&mut self.norm_labels,
				&mut self.norm_classes,
				&mut self.norm_frontier,
			),
			ItemKind::Signal => (
				&mut self.signal_labels,
				&mut self.signal_classes,
				&mut self.signal_frontier,
			),
		}
	}

	fn next_singular(&mut self) -> ClassLabel {
		let label = ClassLabel::singular(self.num_singular);
		self.num_singular += 1;
		label
	}
}

/// A class that fell apart into several parts.
pub(crate) struct Split {
	pub old: ClassLabel,
	pub parts: Vec<(ClassLabel, Members)>,
}

/// Turns the groups of one round into new classes.
///
/// Groups are keyed by `(old label, key)`. A class whose members all share one key keeps its
/// label and is not reported. Otherwise every part gets a fresh label: singular parts draw from
/// `num_singular`, the others get dense ids within `round`, issued in key order so that the
/// labelling does not depend on item numbering.
pub(crate) fn split_classes<K: Ord + Clone + Hash>(
	groups: BTreeMap<(ClassLabel, K), Members>,
	round: u32,
	num_singular: &mut usize,
) -> Vec<Split> {
	let mut fresh = Assignment::new();
	let mut splits = Vec::new();
	let chunks = groups.into_iter().chunk_by(|((old, _), _)| *old);
	for (old, parts) in &chunks {
		let parts = parts.collect::<Vec<_>>();
		if parts.len() == 1 {
			continue;
		}
		let parts = parts
			.into_iter()
			.map(|(key, members)| {
				let label = if is_singular(&members) {
					let id = *num_singular;
					*num_singular += 1;
					ClassLabel::singular(id)
				} else {
					ClassLabel::new(Round::At(round), fresh.assign(key))
				};
				(label, members)
			})
			.collect();
		splits.push(Split { old, parts });
	}
	splits
}

fn is_singular(members: &Members) -> bool {
	members.iter().all(|items| items.len() == 1)
}

fn member_counts(members: &Members) -> Vec<usize> {
	members.iter().map(Vec::len).collect()
}

fn check_sizes(
	kind: ItemKind,
	label: ClassLabel,
	round: u32,
	members: &Members,
) -> Result<(), EquivalenceError> {
	if let [left, right] = members.as_slice()
		&& left.len() != right.len()
	{
		return Err(EquivalenceError::not_equivalent(
			NotEquivalentReason::ClassSizeMismatch {
				kind,
				label,
				round,
				left: left.len(),
				right: right.len(),
			},
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use arckit_core::{CircuitBuilder, Dialect, PrimeField, R1csConstraint};
	use num_bigint::BigUint;

	use super::*;

	fn gf(p: u32) -> PrimeField {
		PrimeField::new(BigUint::from(p))
	}

	fn mul(f: &PrimeField, x: Signal, y: Signal, z: Signal, k: i64) -> R1csConstraint {
		R1csConstraint::from_i64(f, &[(x, 1)], &[(y, 1)], &[(z, k)])
	}

	/// `x * y = z, z * y = w` with the signals placed according to `perm`.
	fn chain(f: &PrimeField, perm: [Signal; 4], scale: i64) -> Circuit {
		let [x, y, z, w] = perm;
		CircuitBuilder::new(f.clone(), Dialect::R1cs)
			.n_signals(5)
			.inputs([x, y])
			.outputs([w])
			.constraint(R1csConstraint::from_i64(
				f,
				&[(x, scale)],
				&[(y, 1)],
				&[(z, scale)],
			))
			.constraint(mul(f, z, y, w, 1))
			.build()
			.unwrap()
	}

	#[test]
	fn test_chain_refines_to_singletons() {
		let f = gf(101);
		let circuit = chain(&f, [1, 2, 3, 4], 1);
		let norms = circuit.normalize();
		let refinement = refine_single(&circuit, &norms);
		assert!(refinement.is_discrete());
		let labels = &refinement.signal_labels[0];
		assert!(labels.iter().all(ClassLabel::is_singular));
		assert_eq!(labels.iter().collect::<BTreeSet<_>>().len(), 5);
	}

	#[test]
	fn test_lockstep_labels_follow_the_renaming() {
		let f = gf(101);
		let perm = [3, 4, 1, 2];
		let left = chain(&f, [1, 2, 3, 4], 1);
		let right = chain(&f, perm, 7);
		let (ln, rn) = (left.normalize(), right.normalize());
		let refinement = refine_pair((&left, &ln), (&right, &rn)).unwrap();
		for signal in 1..=4 {
			assert_eq!(
				refinement.signal_labels[0][signal],
				refinement.signal_labels[1][perm[signal - 1]]
			);
		}
		assert_eq!(refinement.norm_labels[0], refinement.norm_labels[1]);
	}

	#[test]
	fn test_lockstep_detects_scaled_output() {
		let f = gf(23);
		let build = |k: i64| {
			CircuitBuilder::new(f.clone(), Dialect::R1cs)
				.inputs([1, 2])
				.outputs([3])
				.constraint(mul(&f, 1, 2, 3, k))
				.build()
				.unwrap()
		};
		let (left, right) = (build(1), build(2));
		let (ln, rn) = (left.normalize(), right.normalize());
		let err = refine_pair((&left, &ln), (&right, &rn)).unwrap_err();
		assert!(matches!(
			err,
			EquivalenceError::NotEquivalent {
				reason: NotEquivalentReason::ClassSizeMismatch {
					kind: ItemKind::Norm,
					..
				}
			}
		));
	}

	#[test]
	fn test_role_mismatch_is_detected_at_seeding() {
		let f = gf(23);
		let left = CircuitBuilder::new(f.clone(), Dialect::R1cs)
			.inputs([1, 2])
			.outputs([3])
			.constraint(mul(&f, 1, 2, 3, 1))
			.build()
			.unwrap();
		let right = CircuitBuilder::new(f.clone(), Dialect::R1cs)
			.inputs([1])
			.outputs([3])
			.constraint(mul(&f, 1, 2, 3, 1))
			.build()
			.unwrap();
		let (ln, rn) = (left.normalize(), right.normalize());
		let err = refine_pair((&left, &ln), (&right, &rn)).unwrap_err();
		assert!(matches!(
			err,
			EquivalenceError::NotEquivalent {
				reason: NotEquivalentReason::ClassSizeMismatch {
					kind: ItemKind::Signal,
					round: 0,
					..
				}
			}
		));
	}

	#[test]
	fn test_trace_ignores_numbering_and_scale() {
		let f = gf(101);
		let a = chain(&f, [1, 2, 3, 4], 1);
		let b = chain(&f, [4, 1, 3, 2], 9);
		let (an, bn) = (a.normalize(), b.normalize());
		assert_eq!(refine_single(&a, &an).trace, refine_single(&b, &bn).trace);
	}

	#[test]
	fn test_symmetric_signals_stay_together() {
		let f = gf(23);
		// x * y = z with x and y interchangeable.
		let circuit = CircuitBuilder::new(f.clone(), Dialect::R1cs)
			.inputs([1, 2])
			.outputs([3])
			.constraint(mul(&f, 1, 2, 3, 1))
			.build()
			.unwrap();
		let norms = circuit.normalize();
		let refinement = refine_single(&circuit, &norms);
		let labels = &refinement.signal_labels[0];
		assert_eq!(labels[1], labels[2]);
		assert!(!labels[1].is_singular());
		assert!(labels[3].is_singular());
		assert_eq!(refinement.residual_signal_classes().count(), 1);
	}
}
