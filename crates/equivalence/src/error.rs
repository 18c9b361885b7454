// Copyright 2025 Irreducible Inc.
use std::{fmt, path::PathBuf};

use arckit_core::{CircuitError, ClassLabel, Dialect, Signal};

use crate::{
	mapping::{Mapping, MappingError},
	side::Side,
};

/// Which kind of item a class holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemKind {
	Norm,
	Signal,
}

impl fmt::Display for ItemKind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			ItemKind::Norm => f.write_str("norm"),
			ItemKind::Signal => f.write_str("signal"),
		}
	}
}

/// Pipeline phase, used to report where time went and where a budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
	Normalization,
	Fingerprinting,
	Encoding,
	Solving,
	MaximalEquivalence,
}

impl Phase {
	pub fn name(self) -> &'static str {
		match self {
			Phase::Normalization => "normalization",
			Phase::Fingerprinting => "fingerprinting",
			Phase::Encoding => "encoding",
			Phase::Solving => "solving",
			Phase::MaximalEquivalence => "maximal_equivalence",
		}
	}
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Why two circuits were found not to be equivalent.
#[derive(Debug, Clone, PartialEq)]
pub enum NotEquivalentReason {
	DialectMismatch { left: Dialect, right: Dialect },
	FieldMismatch,
	CountMismatch {
		what: &'static str,
		left: usize,
		right: usize,
	},
	/// Color refinement produced a class whose sizes differ between the sides.
	ClassSizeMismatch {
		kind: ItemKind,
		label: ClassLabel,
		round: u32,
		left: usize,
		right: usize,
	},
	/// Consistency propagation left a signal without any possible partner.
	NoCandidate { side: Side, signal: Signal },
	/// A norm has no partner in its class that is compatible with the signal candidates.
	NoFeasiblePartner { side: Side, norm: usize },
	Unsatisfiable,
	BelowTolerance {
		matched: usize,
		total: usize,
		tolerance: f64,
	},
}

impl fmt::Display for NotEquivalentReason {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			NotEquivalentReason::DialectMismatch { left, right } => {
				write!(f, "dialects differ ({left} vs {right})")
			}
			NotEquivalentReason::FieldMismatch => f.write_str("circuits are over different fields"),
			NotEquivalentReason::CountMismatch { what, left, right } => {
				write!(f, "number of {what} differs ({left} vs {right})")
			}
			NotEquivalentReason::ClassSizeMismatch {
				kind,
				label,
				round,
				left,
				right,
			} => write!(
				f,
				"{kind} class {label} has {left} members on the left and {right} on the right after round {round}"
			),
			NotEquivalentReason::NoCandidate { side, signal } => {
				write!(f, "{side} signal {signal} has no consistent partner")
			}
			NotEquivalentReason::NoFeasiblePartner { side, norm } => {
				write!(f, "{side} norm {norm} has no feasible partner")
			}
			NotEquivalentReason::Unsatisfiable => f.write_str("residual matching is unsatisfiable"),
			NotEquivalentReason::BelowTolerance {
				matched,
				total,
				tolerance,
			} => write!(
				f,
				"only {matched} of {total} constraints could be matched (tolerance {tolerance})"
			),
		}
	}
}

#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, thiserror::Error)]
pub enum EquivalenceError {
	#[error("circuits are not equivalent: {reason}")]
	NotEquivalent { reason: NotEquivalentReason },
	#[error("malformed input: {0}")]
	Malformed(#[from] CircuitError),
	#[error("time budget exhausted during {phase}")]
	Timeout {
		phase: Phase,
		partial: Option<Box<Mapping>>,
	},
	#[error("SAT backend failure: {detail}")]
	Solver { detail: String },
	#[error("mapping failed the sanity check: {0}")]
	Sanity(#[from] MappingError),
	#[error("failed to dump CNF to {path}: {source}")]
	Dump {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

impl EquivalenceError {
	pub(crate) fn not_equivalent(reason: NotEquivalentReason) -> Self {
		EquivalenceError::NotEquivalent { reason }
	}
}
