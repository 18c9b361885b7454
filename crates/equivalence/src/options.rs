// Copyright 2025 Irreducible Inc.
use std::{
	fmt,
	path::PathBuf,
	str::FromStr,
	time::{Duration, Instant},
};

use crate::error::{EquivalenceError, Phase};

/// How residual classes are turned into clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Policy {
	/// Narrow by singleton norm classes once, then encode every class with pairwise cardinality
	/// constraints.
	ReducedNatural,
	/// As [`Policy::ReducedNatural`], with sequential counters for large cardinality constraints.
	ReducedPseudoBoolean,
	/// Narrow signal candidates and propagate after every class, smallest class first.
	#[default]
	OnlineInfoPassing,
	/// As [`Policy::OnlineInfoPassing`], propagating once per group of equally sized classes.
	BatchedInfoPassing,
	/// Weighted formula solved by linear SAT-UNSAT search; equivalent when every constraint is
	/// matched.
	MaxSat,
}

impl Policy {
	pub const ALL: [Policy; 5] = [
		Policy::ReducedNatural,
		Policy::ReducedPseudoBoolean,
		Policy::OnlineInfoPassing,
		Policy::BatchedInfoPassing,
		Policy::MaxSat,
	];

	pub fn name(self) -> &'static str {
		match self {
			Policy::ReducedNatural => "reduced_natural",
			Policy::ReducedPseudoBoolean => "reduced_pseudoboolean",
			Policy::OnlineInfoPassing => "online_info_passing",
			Policy::BatchedInfoPassing => "batched_info_passing",
			Policy::MaxSat => "maxsat",
		}
	}
}

impl fmt::Display for Policy {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Debug, thiserror::Error)]
#[error("unknown policy {0:?}, expected one of reduced_natural, reduced_pseudoboolean, online_info_passing, batched_info_passing, maxsat")]
pub struct UnknownPolicy(String);

impl FromStr for Policy {
	type Err = UnknownPolicy;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Policy::ALL
			.into_iter()
			.find(|policy| policy.name() == s)
			.ok_or_else(|| UnknownPolicy(s.to_string()))
	}
}

/// Knobs of an equivalence check.
#[derive(Debug, Clone)]
pub struct EquivalenceOptions {
	pub policy: Policy,
	/// Wall-clock budget for the whole check.
	pub timeout: Option<Duration>,
	/// Largest at-most-one constraint spelled out pairwise by the pseudo-Boolean policies.
	pub pairwise_threshold: usize,
	/// Check the decoded mapping against both circuits before reporting it.
	pub sanity_check: bool,
	/// Where to write the formula handed to the SAT backend.
	pub dump_cnf: Option<PathBuf>,
}

impl Default for EquivalenceOptions {
	fn default() -> Self {
		Self {
			policy: Policy::default(),
			timeout: None,
			pairwise_threshold: 6,
			sanity_check: false,
			dump_cnf: None,
		}
	}
}

impl EquivalenceOptions {
	/// Defaults, with `ARCKIT_DUMP_CNF` naming the dump file when set.
	pub fn from_env() -> Self {
		Self {
			dump_cnf: std::env::var_os("ARCKIT_DUMP_CNF").map(PathBuf::from),
			..Self::default()
		}
	}
}

/// Knobs of the maximal equivalence search.
#[derive(Debug, Clone)]
pub struct MaxEquivOptions {
	pub timeout: Option<Duration>,
	/// Smallest fraction of matched constraints that still counts as a match.
	pub tolerance: f64,
	pub pairwise_threshold: usize,
	pub dump_cnf: Option<PathBuf>,
}

impl Default for MaxEquivOptions {
	fn default() -> Self {
		Self {
			timeout: None,
			tolerance: 0.8,
			pairwise_threshold: 6,
			dump_cnf: None,
		}
	}
}

impl MaxEquivOptions {
	pub fn from_env() -> Self {
		Self {
			dump_cnf: std::env::var_os("ARCKIT_DUMP_CNF").map(PathBuf::from),
			..Self::default()
		}
	}
}

/// A wall-clock budget checked between phases and solver calls.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
	pub fn after(timeout: Option<Duration>) -> Self {
		Self(timeout.map(|timeout| Instant::now() + timeout))
	}

	pub fn never() -> Self {
		Self(None)
	}

	pub fn is_expired(&self) -> bool {
		self.0.is_some_and(|deadline| Instant::now() >= deadline)
	}

	pub fn check(&self, phase: Phase) -> Result<(), EquivalenceError> {
		if self.is_expired() {
			return Err(EquivalenceError::Timeout {
				phase,
				partial: None,
			});
		}
		Ok(())
	}
}
