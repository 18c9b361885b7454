// Copyright 2025 Irreducible Inc.
//! Maximal equivalence: the largest set of constraints two circuits have in common.
//!
//! Classes are kept coarse (signals by role, norms by their fingerprint under role labels) and no
//! early exit is taken, since the circuits are expected to differ. Every left constraint gets a
//! soft unit stating it is matched; the hard part allows each norm and each signal at most one
//! partner. The optimum is found by linear SAT-UNSAT search over a totalizer on the soft units.

use std::collections::BTreeMap;

use arckit_core::{Circuit, ClassLabel, Norm, NormFingerprint, Signal, SignalRole};
use arckit_utils::Assignment;
use itertools::Itertools;

use crate::{
	cardinality::{AmoEncoding, Totalizer, at_most_one},
	cnf::{Cnf, Lit, Wcnf, dump_to},
	encoder::{AuxVar, PairVar, emit_pair, emit_siblings},
	error::{EquivalenceError, NotEquivalentReason, Phase},
	mapping::Mapping,
	options::{Deadline, MaxEquivOptions},
	pairing::pair_shape,
	solver::{Model, SatBackend, VarisatBackend},
};

/// Result of a maximal equivalence search that met the tolerance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaximalMatch {
	pub mapping: Mapping,
	/// Number of matched constraints.
	pub matched: usize,
	/// Number of constraints of the larger circuit.
	pub total: usize,
}

impl MaximalMatch {
	pub fn ratio(&self) -> f64 {
		ratio(self.matched, self.total)
	}
}

fn ratio(matched: usize, total: usize) -> f64 {
	if total == 0 {
		1.0
	} else {
		matched as f64 / total as f64
	}
}

pub fn maximal_equivalence(
	left: &Circuit,
	right: &Circuit,
	options: &MaxEquivOptions,
) -> Result<MaximalMatch, EquivalenceError> {
	let _span = tracing::info_span!("maximal_equivalence").entered();
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

	let deadline = Deadline::after(options.timeout);
	let norms = [left.normalize(), right.normalize()];
	let norms = [norms[0].as_slice(), norms[1].as_slice()];
	let formula = build_formula([left, right], norms, options.pairwise_threshold);
	if let Some(path) = &options.dump_cnf {
		dump_to(path, |w| formula.wcnf.write_dimacs(w))?;
	}

	let mut backend = VarisatBackend::new();
	backend.add_cnf(&formula.wcnf.hard);
	backend.add_cnf(&formula.bound_clauses);

	let total = left.n_constraints().max(right.n_constraints());
	let mut best: Option<(Mapping, usize)> = None;
	let mut assumptions = Vec::new();
	loop {
		if deadline.is_expired() {
			tracing::warn!(
				matched = best.as_ref().map(|(_, matched)| *matched),
				"maximal equivalence ran out of time"
			);
			return Err(EquivalenceError::Timeout {
				phase: Phase::MaximalEquivalence,
				partial: best.map(|(mapping, _)| Box::new(mapping)),
			});
		}
		let Some(model) = backend.solve(&assumptions)? else {
			break;
		};
		let mapping = decode(&formula, &model, norms, left);
		let matched = mapping.constraints.len();
		tracing::debug!(matched, "improved maximal equivalence");
		best = Some((mapping, matched));
		match formula.totalizer.at_least(matched + 1) {
			Some(bound) => assumptions = vec![bound],
			None => break,
		}
	}

	let (mapping, matched) = best.unwrap_or_default();
	if ratio(matched, total) < options.tolerance {
		return Err(EquivalenceError::not_equivalent(
			NotEquivalentReason::BelowTolerance {
				matched,
				total,
				tolerance: options.tolerance,
			},
		));
	}
	Ok(MaximalMatch {
		mapping,
		matched,
		total,
	})
}

struct Formula {
	wcnf: Wcnf,
	/// Totalizer clauses, handed to the solver but not part of the dumped formula.
	bound_clauses: Cnf,
	totalizer: Totalizer,
	/// Soft literal of every left constraint.
	matched: Vec<Lit>,
	vars: Assignment<PairVar>,
}

fn role_rank(role: SignalRole) -> usize {
	match role {
		SignalRole::Constant => 0,
		SignalRole::Output => 1,
		SignalRole::Input => 2,
		SignalRole::Internal => 3,
	}
}

fn build_formula(circuits: [&Circuit; 2], norms: [&[Norm]; 2], threshold: usize) -> Formula {
	let classes = coarse_classes(circuits, norms);
	let [left, right] = circuits;
	let same_role = |s: Signal, t: Signal| {
		t < right.n_signals() && left.signal_role(s) == right.signal_role(t)
	};

	let mut vars = Assignment::with_offset(1);
	let mut hard = Cnf::new();
	let mut bound_clauses = Cnf::new();
	let mut aux = vars.link::<AuxVar>();
	let mut by_norm = [BTreeMap::<usize, Vec<Lit>>::new(), BTreeMap::new()];
	for members in classes.values() {
		for (&l, &r) in members[0].iter().cartesian_product(&members[1]) {
			let Some(shape) = pair_shape(&norms[0][l].constraint, &norms[1][r].constraint, same_role)
			else {
				continue;
			};
			let lit = emit_pair(&mut hard, &mut aux, l, r, &shape);
			by_norm[0].entry(l).or_default().push(lit);
			by_norm[1].entry(r).or_default().push(lit);
		}
	}
	for lits in by_norm.iter().flat_map(BTreeMap::values) {
		let encoding = AmoEncoding::by_size(lits.len(), threshold);
		at_most_one(&mut hard, lits, encoding, &mut aux);
	}

	let mut by_signal = [BTreeMap::<Signal, Vec<Lit>>::new(), BTreeMap::new()];
	for (var, pair) in aux.parent().iter() {
		if let PairVar::Signal(s, t) = *pair {
			by_signal[0].entry(s).or_default().push(Lit::positive(var));
			by_signal[1].entry(t).or_default().push(Lit::positive(var));
		}
	}
	for lits in by_signal.iter().flat_map(BTreeMap::values) {
		let encoding = AmoEncoding::by_size(lits.len(), threshold);
		at_most_one(&mut hard, lits, encoding, &mut aux);
	}

	let mut by_origin = BTreeMap::<usize, Vec<usize>>::new();
	for (index, norm) in norms[0].iter().enumerate() {
		by_origin.entry(norm.origin).or_default().push(index);
	}
	let mut matched = Vec::with_capacity(left.n_constraints());
	for constraint in 0..left.n_constraints() {
		let lit = Lit::positive(aux.assign(AuxVar::Matched(constraint)));
		for norm in by_origin.get(&constraint).into_iter().flatten() {
			let options = by_norm[0].get(norm).into_iter().flatten().copied();
			hard.add_clause(std::iter::once(!lit).chain(options));
		}
		matched.push(lit);
	}
	let totalizer = Totalizer::new(&mut bound_clauses, &matched, &mut aux);
	drop(aux);
	emit_siblings(&mut hard, &vars, norms);

	let soft = matched.iter().map(|&lit| (vec![lit], 1)).collect();
	Formula {
		wcnf: Wcnf { hard, soft },
		bound_clauses,
		totalizer,
		matched,
		vars,
	}
}

/// Norms of both sides grouped by their fingerprint with signals labelled by role only.
fn coarse_classes(
	circuits: [&Circuit; 2],
	norms: [&[Norm]; 2],
) -> BTreeMap<NormFingerprint, Vec<Vec<usize>>> {
	let mut classes = BTreeMap::<_, Vec<Vec<usize>>>::new();
	for (side, (circuit, norms)) in circuits.into_iter().zip(norms).enumerate() {
		let label = |signal: Signal| ClassLabel::initial(role_rank(circuit.signal_role(signal)));
		for (index, norm) in norms.iter().enumerate() {
			classes
				.entry(norm.constraint.fingerprint(label))
				.or_insert_with(|| vec![Vec::new(); 2])[side]
				.push(index);
		}
	}
	classes
}

/// The mapping of a model, restricted to the constraints whose matched literal holds.
fn decode(formula: &Formula, model: &Model, norms: [&[Norm]; 2], left: &Circuit) -> Mapping {
	let mut mapping = Mapping::decode(&formula.vars, model, norms);
	mapping
		.constraints
		.retain(|&constraint, _| model.value(formula.matched[constraint]));
	mapping.restrict_to_constraints(left);
	mapping
}
