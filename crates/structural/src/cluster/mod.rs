// Copyright 2025 Irreducible Inc.
//! Partitioning the constraints of a circuit into clusters.

mod leiden;
mod nonlinear;
mod signal_equivalence;

use std::{collections::BTreeMap, fmt, str::FromStr};

use arckit_core::Circuit;
pub use leiden::{LeidenOptions, leiden};
pub use nonlinear::nonlinear_attract;
pub use signal_equivalence::signal_equivalence_removal;

use crate::{error::StructuralError, graph::ConstraintGraph};

/// How constraints are grouped before the DAG is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusteringStrategy {
	/// Components of nonlinear constraints, grown by constraints adjacent to exactly one of them.
	#[default]
	NonlinearAttract,
	/// Components after removing `x - y = 0` constraints.
	SignalEquivalence,
	/// Components after removing `x - y = c` constraints.
	RelaxedSignalEquivalence,
	/// One pass of modularity optimisation.
	Louvain,
	/// Repeated modularity optimisation passes, each refined into connected communities.
	IteratedLouvain,
}

impl ClusteringStrategy {
	pub const ALL: [ClusteringStrategy; 5] = [
		ClusteringStrategy::NonlinearAttract,
		ClusteringStrategy::SignalEquivalence,
		ClusteringStrategy::RelaxedSignalEquivalence,
		ClusteringStrategy::Louvain,
		ClusteringStrategy::IteratedLouvain,
	];

	pub fn name(self) -> &'static str {
		match self {
			ClusteringStrategy::NonlinearAttract => "nonlinear_attract",
			ClusteringStrategy::SignalEquivalence => "signal_equivalence",
			ClusteringStrategy::RelaxedSignalEquivalence => "relaxed_signal_equivalence",
			ClusteringStrategy::Louvain => "louvain",
			ClusteringStrategy::IteratedLouvain => "iterated_louvain",
		}
	}
}

impl fmt::Display for ClusteringStrategy {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Debug, thiserror::Error)]
#[error("unknown clustering strategy {0:?}")]
pub struct UnknownStrategy(String);

impl FromStr for ClusteringStrategy {
	type Err = UnknownStrategy;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ClusteringStrategy::ALL
			.into_iter()
			.find(|strategy| strategy.name() == s)
			.ok_or_else(|| UnknownStrategy(s.to_string()))
	}
}

/// A partition of the constraint indices of a circuit.
///
/// Parts are sorted and ordered by their smallest constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
	parts: Vec<Vec<usize>>,
}

impl Partition {
	/// Validates that `parts` covers `0..n_constraints` exactly once.
	pub fn new(mut parts: Vec<Vec<usize>>, n_constraints: usize) -> Result<Self, StructuralError> {
		let mut count = vec![0; n_constraints];
		for part in &mut parts {
			part.sort_unstable();
			for &constraint in part.iter() {
				match count.get_mut(constraint) {
					Some(count) => *count += 1,
					None => {
						return Err(StructuralError::NotAPartition {
							constraint,
							count: 0,
						});
					}
				}
			}
		}
		if let Some((constraint, &count)) = count.iter().enumerate().find(|&(_, &n)| n != 1) {
			return Err(StructuralError::NotAPartition { constraint, count });
		}
		parts.retain(|part| !part.is_empty());
		parts.sort_unstable_by_key(|part| part[0]);
		Ok(Self { parts })
	}

	/// Groups constraints by a community id per constraint.
	pub fn from_labels(labels: &[usize]) -> Self {
		let mut by_label = BTreeMap::<usize, Vec<usize>>::new();
		for (constraint, &label) in labels.iter().enumerate() {
			by_label.entry(label).or_default().push(constraint);
		}
		let mut parts = by_label.into_values().collect::<Vec<_>>();
		parts.sort_unstable_by_key(|part| part[0]);
		Self { parts }
	}

	pub fn parts(&self) -> &[Vec<usize>] {
		&self.parts
	}

	pub fn len(&self) -> usize {
		self.parts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.parts.is_empty()
	}

	pub fn into_parts(self) -> Vec<Vec<usize>> {
		self.parts
	}
}

/// Runs `strategy` on `circuit`.
pub fn cluster(
	circuit: &Circuit,
	strategy: ClusteringStrategy,
	leiden_options: &LeidenOptions,
) -> Partition {
	let _span = tracing::debug_span!("cluster", %strategy, n_constraints = circuit.n_constraints())
		.entered();
	let partition = match strategy {
		ClusteringStrategy::NonlinearAttract => nonlinear_attract(circuit),
		ClusteringStrategy::SignalEquivalence => signal_equivalence_removal(circuit, false),
		ClusteringStrategy::RelaxedSignalEquivalence => signal_equivalence_removal(circuit, true),
		ClusteringStrategy::Louvain => {
			let options = LeidenOptions {
				iterations: 1,
				..leiden_options.clone()
			};
			leiden(&ConstraintGraph::new(circuit), &options)
		}
		ClusteringStrategy::IteratedLouvain => leiden(&ConstraintGraph::new(circuit), leiden_options),
	};
	tracing::debug!(parts = partition.len(), "clustered");
	partition
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_partition_validation() {
		let partition = Partition::new(vec![vec![2, 0], vec![], vec![1]], 3).unwrap();
		assert_eq!(partition.parts(), &[vec![0, 2], vec![1]]);
		assert!(matches!(
			Partition::new(vec![vec![0, 1], vec![1]], 3),
			Err(StructuralError::NotAPartition {
				constraint: 1,
				count: 2
			})
		));
		assert!(matches!(
			Partition::new(vec![vec![0, 3]], 3),
			Err(StructuralError::NotAPartition { constraint: 3, .. })
		));
	}

	#[test]
	fn test_strategy_names_round_trip() {
		for strategy in ClusteringStrategy::ALL {
			assert_eq!(strategy.name().parse::<ClusteringStrategy>().unwrap(), strategy);
		}
	}

	#[test]
	fn test_from_labels() {
		let partition = Partition::from_labels(&[7, 3, 7, 1]);
		assert_eq!(partition.parts(), &[vec![0, 2], vec![1], vec![3]]);
	}
}
