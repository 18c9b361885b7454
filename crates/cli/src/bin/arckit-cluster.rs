// Copyright 2025 Irreducible Inc.
use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use arckit_cli::{DialectArgs, exit_code, load_circuit, parse_args, parse_fraction, parse_seconds};
use arckit_equivalence::{EquivalenceOptions, MaxEquivOptions, Policy};
use arckit_io::{ClusterReport, write_cluster_report};
use arckit_structural::{
	ClassOptions, ClusterOptions, ClusteringStrategy, EquivalenceDepth, LeidenOptions,
	MergeOptions, cluster_circuit,
};
use clap::Parser;

/// Split a circuit into a DAG of sub-circuits and group the equivalent ones.
#[derive(Debug, Parser)]
#[command(name = "arckit-cluster")]
struct Args {
	/// The circuit to cluster
	input: PathBuf,

	/// Directory the JSON output is written to
	#[arg(short, long, default_value = ".")]
	output: PathBuf,

	/// Clustering strategy
	#[arg(short = 'c', long = "clustering", default_value_t = ClusteringStrategy::default())]
	strategy: ClusteringStrategy,

	/// How far node classes are computed
	#[arg(short = 'e', long = "equivalence", default_value_t = EquivalenceDepth::default())]
	depth: EquivalenceDepth,

	/// Time budget of each pairwise equivalence check in seconds
	#[arg(long, value_parser = parse_seconds)]
	timeout: Option<Duration>,

	/// Seed of the modularity optimiser
	#[arg(long, default_value_t = 0)]
	seed: u64,

	/// Nodes with fewer constraints are never grouped with others
	#[arg(long, default_value_t = 1)]
	minimum_circuit_size: usize,

	/// Passes of the iterated modularity optimiser
	#[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
	leiden_iterations: u32,

	/// Modularity resolution; defaults to the square root of the number of constraints
	#[arg(long)]
	resolution: Option<f64>,

	/// How pairwise checks encode residual ambiguity
	#[arg(long, default_value_t = Policy::default())]
	policy: Policy,

	/// Merge adjacent nodes that are both purely nonlinear
	#[arg(long)]
	automerge_only_nonlinear: bool,

	/// Keep nodes whose signals only pass through
	#[arg(long)]
	dont_automerge_passthrough: bool,

	/// Merge nodes holding a single linear constraint into a neighbour
	#[arg(long)]
	automerge_single_linear: bool,

	#[command(flatten)]
	dialect: DialectArgs,

	/// Write the mappings between class members
	#[arg(long)]
	include_mappings: bool,

	/// Report mappings in sub-circuit numbering instead of circuit signals
	#[arg(long)]
	dont_undo_mapping: bool,

	/// Check every mapping against both sub-circuits
	#[arg(long)]
	sanity_check: bool,

	/// Write one JSON file instead of separate node and class files
	#[arg(long)]
	single_json: bool,

	/// Look for large common parts between non-equivalent classes
	#[arg(long)]
	maximal_equivalence: bool,

	/// Time budget of each maximal equivalence search in seconds
	#[arg(long, value_parser = parse_seconds)]
	maxequiv_timeout: Option<Duration>,

	/// Smallest fraction of matched constraints that counts as a near match
	#[arg(long, default_value_t = 0.8, value_parser = parse_fraction)]
	maxequiv_tolerance: f64,

	/// Fold classes joined by a near match into one class
	#[arg(long, requires = "maximal_equivalence")]
	maxequiv_merge: bool,

	/// Print statistics of the circuit
	#[arg(long)]
	stat: bool,
}

impl Args {
	fn options(&self) -> ClusterOptions {
		ClusterOptions {
			strategy: self.strategy,
			leiden: LeidenOptions {
				resolution: self.resolution,
				iterations: self.leiden_iterations as usize,
				seed: self.seed,
			},
			merge: MergeOptions {
				passthrough: !self.dont_automerge_passthrough,
				only_nonlinear: self.automerge_only_nonlinear,
				single_linear: self.automerge_single_linear,
			},
			classes: ClassOptions {
				depth: self.depth,
				equivalence: EquivalenceOptions {
					policy: self.policy,
					timeout: self.timeout,
					sanity_check: self.sanity_check,
					..EquivalenceOptions::from_env()
				},
				minimum_circuit_size: self.minimum_circuit_size,
				undo_mapping: !self.dont_undo_mapping,
				maximal: self.maximal_equivalence.then(|| MaxEquivOptions {
					timeout: self.maxequiv_timeout,
					tolerance: self.maxequiv_tolerance,
					..MaxEquivOptions::from_env()
				}),
				maximal_merge: self.maxequiv_merge,
			},
		}
	}
}

fn run(args: &Args) -> Result<u8> {
	let circuit = load_circuit(&args.input, &args.dialect)?;
	if args.stat {
		println!("{}", circuit.stat());
	}
	let clustering = cluster_circuit(&circuit, &args.options()).context("Clustering failed")?;
	let report = ClusterReport::new(&clustering, args.include_mappings);

	let stem = args
		.input
		.file_stem()
		.map(|stem| stem.to_string_lossy().into_owned())
		.unwrap_or_else(|| "circuit".to_string());
	let written = write_cluster_report(&report, &args.output, &stem, args.single_json)
		.with_context(|| format!("Failed to write the report to {}", args.output.display()))?;

	println!(
		"{} nodes, {} local classes, {} structural classes",
		report.nodes.len(),
		report.classes.equivalency_local.len(),
		report.classes.equivalency_structural.len()
	);
	for path in written {
		println!("wrote {}", path.display());
	}
	Ok(0)
}

fn main() -> ExitCode {
	let _tracing_guard = tracing_profile::init_tracing().ok();
	let args = match parse_args::<Args>() {
		Ok(args) => args,
		Err(code) => return code,
	};
	exit_code(run(&args))
}
