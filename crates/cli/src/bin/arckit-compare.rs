// Copyright 2025 Irreducible Inc.
use std::{
	collections::BTreeMap,
	path::PathBuf,
	process::ExitCode,
	time::{Duration, Instant},
};

use anyhow::{Context, Result};
use arckit_cli::{DialectArgs, exit_code, load_circuit, parse_args, parse_fraction, parse_seconds};
use arckit_equivalence::{
	EquivalenceOptions, MaxEquivOptions, Outcome, Phase, Policy, compare, maximal_equivalence,
};
use arckit_io::{EquivalenceRecord, write_json};
use clap::Parser;

/// Decide whether two circuits are equal up to renaming signals, reordering constraints and
/// scaling each constraint.
#[derive(Debug, Parser)]
#[command(name = "arckit-compare")]
struct Args {
	/// The left circuit
	left: PathBuf,

	/// The right circuit
	right: PathBuf,

	#[command(flatten)]
	dialect: DialectArgs,

	/// How residual ambiguity is encoded for the SAT solver
	#[arg(long, default_value_t = Policy::default())]
	policy: Policy,

	/// Time budget in seconds
	#[arg(long, value_parser = parse_seconds)]
	timeout: Option<Duration>,

	/// Search for the largest common part instead of a full equivalence
	#[arg(long)]
	maximal_equivalence: bool,

	/// Time budget of the maximal equivalence search in seconds
	#[arg(long, value_parser = parse_seconds)]
	maxequiv_timeout: Option<Duration>,

	/// Smallest fraction of matched constraints accepted by the maximal equivalence search
	#[arg(long, default_value_t = 0.8, value_parser = parse_fraction)]
	maxequiv_tolerance: f64,

	/// Check the mapping against both circuits before reporting it
	#[arg(long)]
	sanity_check: bool,

	/// Where to write the JSON record
	#[arg(short, long)]
	output: Option<PathBuf>,

	/// Print statistics of both circuits
	#[arg(long)]
	stat: bool,
}

fn run(args: &Args) -> Result<u8> {
	let left = load_circuit(&args.left, &args.dialect)?;
	let right = load_circuit(&args.right, &args.dialect)?;
	if args.stat {
		println!("{}:\n{}", args.left.display(), left.stat());
		println!("{}:\n{}", args.right.display(), right.stat());
	}

	let (outcome, record) = if args.maximal_equivalence {
		let options = MaxEquivOptions {
			timeout: args.maxequiv_timeout,
			tolerance: args.maxequiv_tolerance,
			..MaxEquivOptions::from_env()
		};
		let start = Instant::now();
		match maximal_equivalence(&left, &right, &options) {
			Ok(found) => {
				let record = EquivalenceRecord::from_maximal(&found, start.elapsed());
				(Outcome::Equivalent(found.mapping), record)
			}
			Err(err) => {
				let outcome =
					Outcome::from_result(Err(err)).context("Maximal equivalence search failed")?;
				let timing = BTreeMap::from([(Phase::MaximalEquivalence, start.elapsed())]);
				let record = EquivalenceRecord::new(&outcome, &timing);
				(outcome, record)
			}
		}
	} else {
		let options = EquivalenceOptions {
			policy: args.policy,
			timeout: args.timeout,
			sanity_check: args.sanity_check,
			..EquivalenceOptions::from_env()
		};
		let comparison = compare(&left, &right, &options).context("Equivalence check failed")?;
		let record = EquivalenceRecord::from_comparison(&comparison);
		(comparison.outcome, record)
	};

	println!("{}: {}", record.result, record.result_explanation);
	if let Some(path) = &args.output {
		write_json(path, &record)
			.with_context(|| format!("Failed to write the record to {}", path.display()))?;
	}
	Ok(outcome.exit_code() as u8)
}

fn main() -> ExitCode {
	let _tracing_guard = tracing_profile::init_tracing().ok();
	let args = match parse_args::<Args>() {
		Ok(args) => args,
		Err(code) => return code,
	};
	exit_code(run(&args))
}
