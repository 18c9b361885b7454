// Copyright 2025 Irreducible Inc.
//! Clustering a circuit end to end: partition, DAG, merges, node classes.

use std::{
	collections::BTreeMap,
	fmt,
	time::{Duration, Instant},
};

use arckit_core::Circuit;

use crate::{
	classes::{ClassOptions, Classes, equivalence_classes},
	cluster::{ClusteringStrategy, LeidenOptions, cluster},
	dag::Dag,
	error::StructuralError,
	merge::{MergeOptions, run_merges},
};

#[derive(Debug, Clone, Default)]
pub struct ClusterOptions {
	pub strategy: ClusteringStrategy,
	pub leiden: LeidenOptions,
	pub merge: MergeOptions,
	pub classes: ClassOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
	Clustering,
	Dag,
	Merge,
	Equivalence,
}

impl Stage {
	pub fn name(self) -> &'static str {
		match self {
			Stage::Clustering => "clustering",
			Stage::Dag => "dag",
			Stage::Merge => "merge",
			Stage::Equivalence => "equivalence",
		}
	}
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// The clustered circuit.
#[derive(Debug)]
pub struct Clustering<'a> {
	pub dag: Dag<'a>,
	pub classes: Classes,
	pub timing: BTreeMap<Stage, Duration>,
	/// Seed of the modularity optimiser.
	pub seed: u64,
}

fn timed<T>(timing: &mut BTreeMap<Stage, Duration>, stage: Stage, f: impl FnOnce() -> T) -> T {
	let _span = tracing::debug_span!("stage", %stage).entered();
	let start = Instant::now();
	let result = f();
	timing.insert(stage, start.elapsed());
	result
}

pub fn cluster_circuit<'a>(
	circuit: &'a Circuit,
	options: &ClusterOptions,
) -> Result<Clustering<'a>, StructuralError> {
	let _span = tracing::info_span!(
		"cluster_circuit",
		strategy = %options.strategy,
		n_constraints = circuit.n_constraints()
	)
	.entered();
	let mut timing = BTreeMap::new();
	let partition = timed(&mut timing, Stage::Clustering, || {
		cluster(circuit, options.strategy, &options.leiden)
	});
	let mut dag = timed(&mut timing, Stage::Dag, || Dag::from_partition(circuit, &partition));
	let merges = timed(&mut timing, Stage::Merge, || run_merges(&mut dag, &options.merge));
	let classes = timed(&mut timing, Stage::Equivalence, || {
		equivalence_classes(&dag, &options.classes)
	})?;
	tracing::info!(
		parts = partition.len(),
		nodes = dag.len(),
		merges,
		local_classes = classes.local.len(),
		"clustered"
	);
	Ok(Clustering {
		dag,
		classes,
		timing,
		seed: options.leiden.seed,
	})
}
