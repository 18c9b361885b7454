// Copyright 2025 Irreducible Inc.
//! Labels and the label-keyed shapes that color refinement compares.
//!
//! A [`ClassLabel`] names an equivalence class of signals or of normalized constraints. The shapes
//! below are built purely from labels and coefficients, with every list sorted, so that two
//! equivalent configurations produce equal values regardless of signal numbering or term order.

use std::fmt;

use num_bigint::BigUint;

/// The refinement round a label was created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Round {
	At(u32),
	/// The class has a single member and is never refined again.
	Singular,
}

/// Opaque name of an equivalence class.
///
/// Ids are dense within a round and monotone within the singular space, so labels created in
/// different rounds never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassLabel {
	pub round: Round,
	pub id: usize,
}

impl ClassLabel {
	pub const fn new(round: Round, id: usize) -> Self {
		Self { round, id }
	}

	/// The label every item starts from before the first round.
	pub const fn initial(id: usize) -> Self {
		Self::new(Round::At(0), id)
	}

	pub const fn singular(id: usize) -> Self {
		Self::new(Round::Singular, id)
	}

	pub fn is_singular(&self) -> bool {
		self.round == Round::Singular
	}
}

impl fmt::Display for ClassLabel {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.round {
			Round::At(round) => write!(f, "r{round}:{}", self.id),
			Round::Singular => write!(f, "s:{}", self.id),
		}
	}
}

/// Sorted `(label, coefficient)` terms of one linear combination.
pub type LabelledTerms = Vec<(ClassLabel, BigUint)>;

/// The shape of a normalized constraint as seen through the current signal labels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NormFingerprint {
	/// R1CS norm whose `A` and `B` have different coefficient multisets.
	Ordered {
		a: LabelledTerms,
		b: LabelledTerms,
		c: LabelledTerms,
	},
	/// R1CS norm whose `A` and `B` are interchangeable.
	///
	/// Signals in both parts carry the sorted coefficient pair; signals in exactly one part are
	/// listed together, without recording which part they came from.
	Unordered {
		both: Vec<(ClassLabel, (BigUint, BigUint))>,
		single: LabelledTerms,
		c: LabelledTerms,
	},
	/// ACIR norm: quadratic terms grouped by the unordered label pair, linear terms grouped by
	/// label, each group holding the sorted coefficients.
	Acir {
		mult: Vec<((ClassLabel, ClassLabel), Vec<BigUint>)>,
		linear: Vec<(ClassLabel, Vec<BigUint>)>,
		constant: BigUint,
	},
}

/// How a single signal takes part in a normalized constraint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalCharacteristic {
	/// For an ordered norm `ab = (A coefficient, 0)` and `side` is the `B` coefficient. For an
	/// unordered norm either `ab` is the sorted coefficient pair of a signal in both parts and
	/// `side` is zero, or `ab = (0, 0)` and `side` is the coefficient in the one part holding it.
	/// Missing parts contribute zero.
	R1cs {
		ab: (BigUint, BigUint),
		side: BigUint,
		c: BigUint,
	},
	Acir {
		/// Sorted `(label of the partner signal, coefficient)` over quadratic terms holding the
		/// signal. A square term names the signal itself as its partner.
		mult: LabelledTerms,
		linear: BigUint,
	},
}
