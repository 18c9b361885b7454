// Copyright 2025 Irreducible Inc.
//! Cardinality constraints over literals.
//!
//! Auxiliary variables are drawn from an [`IdIssuer`], normally a child assignment linked to the
//! pair variables, so they never collide with them.

use std::collections::VecDeque;

use arckit_utils::IdIssuer;
use itertools::Itertools;

use crate::cnf::{Cnf, Lit};

/// How an at-most-one constraint is spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmoEncoding {
	/// One binary clause per pair. Quadratic, no auxiliary variables.
	Pairwise,
	/// Sinz's sequential counter. Linear, `n - 1` auxiliary variables.
	Sequential,
}

impl AmoEncoding {
	/// Pairwise up to `threshold` literals, sequential above.
	pub fn by_size(len: usize, threshold: usize) -> Self {
		if len <= threshold {
			AmoEncoding::Pairwise
		} else {
			AmoEncoding::Sequential
		}
	}
}

pub fn at_most_one(cnf: &mut Cnf, lits: &[Lit], encoding: AmoEncoding, issuer: &mut impl IdIssuer) {
	if lits.len() <= 1 {
		return;
	}
	match encoding {
		AmoEncoding::Pairwise => {
			for (&a, &b) in lits.iter().tuple_combinations() {
				cnf.add_clause([!a, !b]);
			}
		}
		AmoEncoding::Sequential => {
			let n = lits.len();
			let counters = (0..n - 1)
				.map(|_| Lit::positive(issuer.fresh()))
				.collect::<Vec<_>>();
			cnf.add_clause([!lits[0], counters[0]]);
			for i in 1..n - 1 {
				cnf.add_clause([!lits[i], counters[i]]);
				cnf.add_clause([!counters[i - 1], counters[i]]);
				cnf.add_clause([!lits[i], !counters[i - 1]]);
			}
			cnf.add_clause([!lits[n - 1], !counters[n - 2]]);
		}
	}
}

pub fn exactly_one(cnf: &mut Cnf, lits: &[Lit], encoding: AmoEncoding, issuer: &mut impl IdIssuer) {
	cnf.add_clause(lits.iter().copied());
	at_most_one(cnf, lits, encoding, issuer);
}

/// A totalizer: unary counter outputs over a list of input literals.
///
/// Output `k` (1-based) holds exactly when at least `k` inputs hold; both directions are encoded,
/// so the outputs can be assumed true or false.
#[derive(Debug, Clone)]
pub struct Totalizer {
	outputs: Vec<Lit>,
}

impl Totalizer {
	pub fn new(cnf: &mut Cnf, inputs: &[Lit], issuer: &mut impl IdIssuer) -> Self {
		let mut queue = inputs.iter().map(|&lit| vec![lit]).collect::<VecDeque<_>>();
		while queue.len() > 1 {
			let (Some(a), Some(b)) = (queue.pop_front(), queue.pop_front()) else {
				break;
			};
			queue.push_back(merge(cnf, &a, &b, issuer));
		}
		Self {
			outputs: queue.pop_front().unwrap_or_default(),
		}
	}

	/// The literal stating that at least `k` inputs hold, for `1 <= k <= n`.
	pub fn at_least(&self, k: usize) -> Option<Lit> {
		k.checked_sub(1)
			.and_then(|index| self.outputs.get(index))
			.copied()
	}

	pub fn len(&self) -> usize {
		self.outputs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.outputs.is_empty()
	}
}

fn merge(cnf: &mut Cnf, a: &[Lit], b: &[Lit], issuer: &mut impl IdIssuer) -> Vec<Lit> {
	let n = a.len() + b.len();
	let out = (0..n)
		.map(|_| Lit::positive(issuer.fresh()))
		.collect::<Vec<_>>();
	for i in 0..=a.len() {
		for j in 0..=b.len() {
			// at least i in a and at least j in b => at least i + j
			if i + j > 0 {
				let mut clause = Vec::with_capacity(3);
				if i > 0 {
					clause.push(!a[i - 1]);
				}
				if j > 0 {
					clause.push(!b[j - 1]);
				}
				clause.push(out[i + j - 1]);
				cnf.add_clause(clause);
			}
			// at most i in a and at most j in b => at most i + j
			if i + j < n {
				let mut clause = Vec::with_capacity(3);
				if i < a.len() {
					clause.push(a[i]);
				}
				if j < b.len() {
					clause.push(b[j]);
				}
				clause.push(!out[i + j]);
				cnf.add_clause(clause);
			}
		}
	}
	out
}
