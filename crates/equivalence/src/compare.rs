// Copyright 2025 Irreducible Inc.
//! The full equivalence check of two circuits.

use std::{
	collections::{BTreeMap, BTreeSet},
	time::{Duration, Instant},
};

use arckit_core::{Circuit, Norm, SignalRole};

use crate::{
	cnf::dump_to,
	encoder::{EncodingContext, encode},
	error::{EquivalenceError, NotEquivalentReason, Phase},
	fingerprinter::refine_pair,
	mapping::{Mapping, sanity_check},
	maxsat::maximal_equivalence,
	options::{Deadline, EquivalenceOptions, MaxEquivOptions, Policy},
	solver::{SatBackend, VarisatBackend},
};

/// Verdict of an equivalence check.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
	Equivalent(Mapping),
	NotEquivalent(NotEquivalentReason),
	/// The budget ran out; `partial` holds the best mapping found so far, if any.
	Timeout {
		phase: Phase,
		partial: Option<Mapping>,
	},
}

impl Outcome {
	/// Process exit code reported by the command line tools.
	pub fn exit_code(&self) -> i32 {
		match self {
			Outcome::Equivalent(_) => 0,
			Outcome::NotEquivalent(_) => 1,
			Outcome::Timeout { .. } => 2,
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			Outcome::Equivalent(_) => "equivalent",
			Outcome::NotEquivalent(_) => "not_equivalent",
			Outcome::Timeout { .. } => "timeout",
		}
	}

	pub fn explanation(&self) -> String {
		match self {
			Outcome::Equivalent(mapping) => format!(
				"{} signals and {} constraints mapped",
				mapping.signals.len(),
				mapping.constraints.len()
			),
			Outcome::NotEquivalent(reason) => reason.to_string(),
			Outcome::Timeout { phase, partial } => match partial {
				Some(mapping) => format!(
					"time budget exhausted during {phase} with {} constraints mapped",
					mapping.constraints.len()
				),
				None => format!("time budget exhausted during {phase}"),
			},
		}
	}

	/// Turns the verdict-like errors into outcomes and passes the others through.
	pub fn from_result(result: Result<Mapping, EquivalenceError>) -> Result<Self, EquivalenceError> {
		match result {
			Ok(mapping) => Ok(Outcome::Equivalent(mapping)),
			Err(EquivalenceError::NotEquivalent { reason }) => Ok(Outcome::NotEquivalent(reason)),
			Err(EquivalenceError::Timeout { phase, partial }) => Ok(Outcome::Timeout {
				phase,
				partial: partial.map(|mapping| *mapping),
			}),
			Err(err) => Err(err),
		}
	}

	pub fn mapping(&self) -> Option<&Mapping> {
		match self {
			Outcome::Equivalent(mapping) => Some(mapping),
			Outcome::Timeout { partial, .. } => partial.as_ref(),
			Outcome::NotEquivalent(_) => None,
		}
	}
}

/// An outcome together with where the time went.
#[derive(Debug, Clone)]
pub struct Comparison {
	pub outcome: Outcome,
	pub timing: BTreeMap<Phase, Duration>,
}

#[derive(Default)]
struct Stopwatch {
	timing: BTreeMap<Phase, Duration>,
}

impl Stopwatch {
	fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
		let start = Instant::now();
		let result = f();
		*self.timing.entry(phase).or_default() += start.elapsed();
		result
	}
}

/// Decides whether `right` is `left` up to renaming signals, reordering constraints and scaling
/// each constraint.
///
/// Non-equivalence and timeouts are verdicts, not errors; the error path is left for malformed
/// input, backend failures, dump failures and failed sanity checks.
pub fn compare(
	left: &Circuit,
	right: &Circuit,
	options: &EquivalenceOptions,
) -> Result<Comparison, EquivalenceError> {
	let _span = tracing::info_span!("compare", policy = %options.policy).entered();
	let mut stopwatch = Stopwatch::default();
	let outcome = Outcome::from_result(run(left, right, options, &mut stopwatch))?;
	tracing::info!(outcome = outcome.name(), "comparison finished");
	Ok(Comparison {
		outcome,
		timing: stopwatch.timing,
	})
}

fn run(
	left: &Circuit,
	right: &Circuit,
	options: &EquivalenceOptions,
	stopwatch: &mut Stopwatch,
) -> Result<Mapping, EquivalenceError> {
	let deadline = Deadline::after(options.timeout);
	check_shapes(left, right)?;

	if options.policy == Policy::MaxSat {
		let max_options = MaxEquivOptions {
			timeout: options.timeout,
			tolerance: 1.0,
			pairwise_threshold: options.pairwise_threshold,
			dump_cnf: options.dump_cnf.clone(),
		};
		let result = stopwatch.time(Phase::MaximalEquivalence, || {
			maximal_equivalence(left, right, &max_options)
		})?;
		let mut mapping = result.mapping;
		pair_unused_signals(left, right, &mut mapping);
		if options.sanity_check {
			sanity_check(left, right, &mapping)?;
		}
		return Ok(mapping);
	}

	let norms = stopwatch.time(Phase::Normalization, || [left.normalize(), right.normalize()]);
	if norms[0].len() != norms[1].len() {
		return Err(count_mismatch("norms", norms[0].len(), norms[1].len()));
	}
	let norms: [&[Norm]; 2] = [&norms[0], &norms[1]];
	deadline.check(Phase::Normalization)?;

	let refinement = stopwatch.time(Phase::Fingerprinting, || {
		refine_pair((left, norms[0]), (right, norms[1]))
	})?;
	deadline.check(Phase::Fingerprinting)?;

	if refinement.is_discrete()
		&& let Some(mapping) = Mapping::from_refinement(&refinement, norms)
	{
		match sanity_check(left, right, &mapping) {
			Ok(()) => return Ok(mapping),
			Err(err) => tracing::debug!(%err, "discrete refinement does not yield a mapping"),
		}
	}

	let ctx = EncodingContext {
		norms,
		refinement: &refinement,
	};
	let encoding = stopwatch.time(Phase::Encoding, || encode(ctx, options, &deadline))?;
	if let Some(path) = &options.dump_cnf {
		dump_to(path, |w| encoding.cnf.write_dimacs(w, &encoding.assumptions))?;
	}
	deadline.check(Phase::Encoding)?;

	let model = stopwatch.time(Phase::Solving, || {
		let mut backend = VarisatBackend::new();
		backend.add_cnf(&encoding.cnf);
		backend.solve(&encoding.assumptions)
	})?;
	let Some(model) = model else {
		return Err(EquivalenceError::not_equivalent(NotEquivalentReason::Unsatisfiable));
	};
	let mapping = Mapping::decode(&encoding.vars, &model, norms);
	if options.sanity_check {
		sanity_check(left, right, &mapping)?;
	}
	Ok(mapping)
}

fn count_mismatch(what: &'static str, left: usize, right: usize) -> EquivalenceError {
	EquivalenceError::not_equivalent(NotEquivalentReason::CountMismatch { what, left, right })
}

/// Cheap checks that rule out equivalence before any refinement.
fn check_shapes(left: &Circuit, right: &Circuit) -> Result<(), EquivalenceError> {
	if left.dialect() != right.dialect() {
		return Err(EquivalenceError::not_equivalent(
			NotEquivalentReason::DialectMismatch {
				left: left.dialect(),
				right: right.dialect(),
			},
		));
	}
	if left.field() != right.field() {
		return Err(EquivalenceError::not_equivalent(NotEquivalentReason::FieldMismatch));
	}
	let counts = [
		("constraints", left.n_constraints(), right.n_constraints()),
		("signals", left.n_signals(), right.n_signals()),
		("inputs", left.inputs().len(), right.inputs().len()),
		("outputs", left.outputs().len(), right.outputs().len()),
	];
	for (what, l, r) in counts {
		if l != r {
			return Err(count_mismatch(what, l, r));
		}
	}
	Ok(())
}

/// Pairs the signals no constraint mentions, role by role in index order.
fn pair_unused_signals(left: &Circuit, right: &Circuit, mapping: &mut Mapping) {
	let unused = |circuit: &Circuit, mapped: &dyn Fn(usize) -> bool| {
		let mut by_role = BTreeMap::<SignalRole, Vec<usize>>::new();
		for signal in (0..circuit.n_signals()).filter(|&signal| !mapped(signal)) {
			by_role
				.entry(circuit.signal_role(signal))
				.or_default()
				.push(signal);
		}
		by_role
	};
	let images = mapping.signals.values().copied().collect::<BTreeSet<_>>();
	let left_unused = unused(left, &|signal| mapping.signals.contains_key(&signal));
	let right_unused = unused(right, &|signal| images.contains(&signal));
	for (role, signals) in left_unused {
		let partners = right_unused.get(&role).into_iter().flatten();
		mapping.signals.extend(signals.into_iter().zip(partners.copied()));
	}
}
