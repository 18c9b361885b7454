// Copyright 2025 Irreducible Inc.
//! Per-signal candidate partners and their internal-consistency propagation.

use std::collections::{BTreeMap, BTreeSet};

use arckit_core::{CONSTANT_SIGNAL, Signal};

use crate::{
	error::{EquivalenceError, NotEquivalentReason},
	fingerprinter::Members,
	side::Side,
};

/// State of one candidate partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
	Live,
	/// Ruled out; kept so the pair can be passed to the solver as a negative assumption.
	Removed,
}

/// Candidate partners of every non-constant signal on both sides.
///
/// The constant signal always maps to itself and has no entry.
#[derive(Debug, Clone, Default)]
pub struct SignalInfo {
	entries: BTreeMap<(Side, Signal), BTreeMap<Signal, Candidate>>,
}

impl SignalInfo {
	/// Every left member of a class is a candidate for every right member.
	pub fn from_classes<'a>(classes: impl IntoIterator<Item = &'a Members>) -> Self {
		let mut entries = BTreeMap::<_, BTreeMap<_, _>>::new();
		for members in classes {
			let [left, right] = members.as_slice() else {
				continue;
			};
			for &l in left.iter().filter(|&&l| l != CONSTANT_SIGNAL) {
				for &r in right.iter().filter(|&&r| r != CONSTANT_SIGNAL) {
					entries
						.entry((Side::Left, l))
						.or_default()
						.insert(r, Candidate::Live);
					entries
						.entry((Side::Right, r))
						.or_default()
						.insert(l, Candidate::Live);
				}
			}
		}
		Self { entries }
	}

	/// Whether left signal `l` may still map to right signal `r`.
	pub fn is_live(&self, l: Signal, r: Signal) -> bool {
		self.status(Side::Left, l, r) == Some(Candidate::Live)
	}

	fn status(&self, side: Side, signal: Signal, partner: Signal) -> Option<Candidate> {
		self.entries.get(&(side, signal))?.get(&partner).copied()
	}

	/// Live partners of `signal`.
	pub fn live(&self, side: Side, signal: Signal) -> impl Iterator<Item = Signal> + '_ {
		self.entries
			.get(&(side, signal))
			.into_iter()
			.flatten()
			.filter(|(_, candidate)| **candidate == Candidate::Live)
			.map(|(&partner, _)| partner)
	}

	/// Signals of `side` that have an entry.
	pub fn signals(&self, side: Side) -> impl Iterator<Item = Signal> + '_ {
		self.entries
			.keys()
			.filter(move |(entry_side, _)| *entry_side == side)
			.map(|&(_, signal)| signal)
	}

	/// Removes every live partner of `signal` outside `allowed`. Returns whether anything changed.
	pub fn restrict(&mut self, side: Side, signal: Signal, allowed: &BTreeSet<Signal>) -> bool {
		let Some(partners) = self.entries.get_mut(&(side, signal)) else {
			return false;
		};
		let mut changed = false;
		for (partner, candidate) in partners.iter_mut() {
			if *candidate == Candidate::Live && !allowed.contains(partner) {
				*candidate = Candidate::Removed;
				changed = true;
			}
		}
		changed
	}

	fn remove(&mut self, side: Side, signal: Signal, partner: Signal) -> bool {
		match self
			.entries
			.get_mut(&(side, signal))
			.and_then(|partners| partners.get_mut(&partner))
		{
			Some(candidate) if *candidate == Candidate::Live => {
				*candidate = Candidate::Removed;
				true
			}
			_ => false,
		}
	}

	/// Runs both consistency rules to a fixpoint.
	///
	/// A candidate that the partner does not reciprocate is removed, and a signal left with a
	/// single candidate claims that partner exclusively.
	pub fn propagate(&mut self) -> Result<(), EquivalenceError> {
		loop {
			let mut removals = Vec::new();
			for (&(side, signal), partners) in &self.entries {
				let live = partners
					.iter()
					.filter(|(_, candidate)| **candidate == Candidate::Live)
					.map(|(&partner, _)| partner)
					.collect::<Vec<_>>();
				for &partner in &live {
					if self.status(side.other(), partner, signal) != Some(Candidate::Live) {
						removals.push((side, signal, partner));
					}
				}
				if let &[partner] = live.as_slice() {
					for other in self.live(side.other(), partner) {
						if other != signal {
							removals.push((side.other(), partner, other));
						}
					}
				}
			}

			let mut changed = false;
			for (side, signal, partner) in removals {
				changed |= self.remove(side, signal, partner);
			}
			if let Some(&(side, signal)) = self
				.entries
				.iter()
				.find(|(_, partners)| !partners.values().any(|c| *c == Candidate::Live))
				.map(|(key, _)| key)
			{
				return Err(EquivalenceError::not_equivalent(
					NotEquivalentReason::NoCandidate { side, signal },
				));
			}
			if !changed {
				return Ok(());
			}
		}
	}

	/// `(left, right)` pairs that were ruled out.
	pub fn removed_pairs(&self) -> impl Iterator<Item = (Signal, Signal)> + '_ {
		self.entries
			.range((Side::Left, 0)..=(Side::Left, Signal::MAX))
			.flat_map(|(&(_, l), partners)| {
				partners
					.iter()
					.filter(|(_, candidate)| **candidate == Candidate::Removed)
					.map(move |(&r, _)| (l, r))
			})
	}

	/// Number of live `(left, right)` pairs.
	pub fn n_live_pairs(&self) -> usize {
		self.signals(Side::Left)
			.map(|l| self.live(Side::Left, l).count())
			.sum()
	}
}
