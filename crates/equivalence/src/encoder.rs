// Copyright 2025 Irreducible Inc.
//! Encodes the residual matching problem left by color refinement as CNF.
//!
//! There is one variable per candidate norm pair and per candidate signal pair, issued by a shared
//! [`Assignment`]. Auxiliary variables (choice selectors and cardinality counters) come from a
//! child assignment linked to it. A norm pair variable implies the signal pairs its
//! [`PairShape`] demands; every norm and every signal is matched exactly once; the norms derived
//! from one constraint move together. Singletons become assumptions, and so do the candidates that
//! propagation ruled out.

use std::collections::{BTreeMap, BTreeSet};

use arckit_core::{Norm, Signal};
use arckit_utils::{Assignment, LinkedAssignment};
use itertools::Itertools;

use crate::{
	cardinality::{AmoEncoding, exactly_one},
	cnf::{Cnf, Lit},
	error::{EquivalenceError, NotEquivalentReason, Phase},
	fingerprinter::{Members, Refinement},
	options::{Deadline, EquivalenceOptions, Policy},
	pairing::{Disjunction, PairShape, pair_shape},
	side::Side,
	signal_info::SignalInfo,
};

/// A primary variable: `left` is matched to `right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PairVar {
	Norm(usize, usize),
	Signal(Signal, Signal),
}

/// An auxiliary variable with a meaning worth keeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuxVar {
	/// Alternative `alternative` of choice `choice` in the shape of norm pair `(left, right)`.
	Choice {
		left: usize,
		right: usize,
		choice: usize,
		alternative: usize,
	},
	/// The left constraint is matched, in the maximal equivalence formula.
	Matched(usize),
}

/// Everything needed to solve and decode.
#[derive(Debug)]
pub struct Encoding {
	pub cnf: Cnf,
	pub assumptions: Vec<Lit>,
	pub vars: Assignment<PairVar>,
}

/// The two sides of a residual problem.
#[derive(Debug, Clone, Copy)]
pub struct EncodingContext<'a> {
	pub norms: [&'a [Norm]; 2],
	pub refinement: &'a Refinement,
}

pub fn encode(
	ctx: EncodingContext<'_>,
	options: &EquivalenceOptions,
	deadline: &Deadline,
) -> Result<Encoding, EquivalenceError> {
	let _span = tracing::debug_span!("encode", policy = %options.policy).entered();

	let mut encoder = Encoder {
		ctx,
		policy: options.policy,
		pairwise_threshold: options.pairwise_threshold,
		info: SignalInfo::from_classes(ctx.refinement.signal_classes.values()),
		vars: Assignment::with_offset(1),
		cnf: Cnf::new(),
		assumptions: Vec::new(),
	};
	encoder.info.propagate()?;

	let classes = ctx
		.refinement
		.norm_classes
		.iter()
		.sorted_by_key(|(label, members)| (members[0].len(), **label))
		.map(|(_, members)| members)
		.collect::<Vec<_>>();

	match options.policy {
		// The maximal equivalence driver builds its own formula; its hard part is this one.
		Policy::ReducedNatural | Policy::ReducedPseudoBoolean | Policy::MaxSat => {
			for members in classes.iter().filter(|members| members[0].len() == 1) {
				encoder.narrow(members)?;
			}
			encoder.info.propagate()?;
			for members in &classes {
				deadline.check(Phase::Encoding)?;
				encoder.encode_class(members)?;
			}
		}
		Policy::OnlineInfoPassing => {
			for members in &classes {
				deadline.check(Phase::Encoding)?;
				if encoder.narrow(members)? {
					encoder.info.propagate()?;
				}
				encoder.encode_class(members)?;
			}
		}
		Policy::BatchedInfoPassing => {
			for (_, batch) in &classes.iter().chunk_by(|members| members[0].len()) {
				deadline.check(Phase::Encoding)?;
				let batch = batch.collect::<Vec<_>>();
				let mut changed = false;
				for members in &batch {
					changed |= encoder.narrow(members)?;
				}
				if changed {
					encoder.info.propagate()?;
				}
				for members in batch {
					encoder.encode_class(members)?;
				}
			}
		}
	}

	encoder.encode_siblings();
	encoder.encode_signals();
	tracing::debug!(
		vars = encoder.vars.len(),
		clauses = encoder.cnf.len(),
		assumptions = encoder.assumptions.len(),
		live_signal_pairs = encoder.info.n_live_pairs(),
		"residual encoded"
	);
	Ok(Encoding {
		cnf: encoder.cnf,
		assumptions: encoder.assumptions,
		vars: encoder.vars,
	})
}

struct Encoder<'a> {
	ctx: EncodingContext<'a>,
	policy: Policy,
	pairwise_threshold: usize,
	info: SignalInfo,
	vars: Assignment<PairVar>,
	cnf: Cnf,
	assumptions: Vec<Lit>,
}

impl Encoder<'_> {
	/// Feasible pairs of a norm class under the current signal candidates.
	fn class_shapes(
		&self,
		members: &Members,
	) -> Result<BTreeMap<(usize, usize), PairShape>, EquivalenceError> {
		let [left, right] = members.as_slice() else {
			return Ok(BTreeMap::new());
		};
		let shapes = left
			.iter()
			.cartesian_product(right)
			.filter_map(|(&l, &r)| {
				pair_shape(
					&self.ctx.norms[0][l].constraint,
					&self.ctx.norms[1][r].constraint,
					|s, t| self.info.is_live(s, t),
				)
				.map(|shape| ((l, r), shape))
			})
			.collect::<BTreeMap<_, _>>();

		for &l in left {
			if !shapes.keys().any(|&(pl, _)| pl == l) {
				return Err(no_feasible_partner(Side::Left, l));
			}
		}
		for &r in right {
			if !shapes.keys().any(|&(_, pr)| pr == r) {
				return Err(no_feasible_partner(Side::Right, r));
			}
		}
		Ok(shapes)
	}

	/// Restricts the candidates of every signal of the class's left norms to what some feasible
	/// partner allows. Returns whether any candidate was removed.
	fn narrow(&mut self, members: &Members) -> Result<bool, EquivalenceError> {
		let shapes = self.class_shapes(members)?;
		let mut changed = false;
		for (l, partners) in &shapes.iter().chunk_by(|((l, _), _)| *l) {
			let partners = partners.map(|(_, shape)| shape).collect::<Vec<_>>();
			for signal in self.ctx.norms[0][l].constraint.signals() {
				let mut allowed = BTreeSet::new();
				let mut unrestricted = false;
				for shape in &partners {
					match shape.allowed(signal) {
						Some(set) => allowed.extend(set),
						None => {
							unrestricted = true;
							break;
						}
					}
				}
				if !unrestricted {
					changed |= self.info.restrict(Side::Left, signal, &allowed);
				}
			}
		}
		Ok(changed)
	}

	fn encode_class(&mut self, members: &Members) -> Result<(), EquivalenceError> {
		let shapes = self.class_shapes(members)?;
		let singleton = members.iter().all(|items| items.len() == 1);
		let (policy, threshold) = (self.policy, self.pairwise_threshold);

		let mut aux = self.vars.link::<AuxVar>();
		let mut by_left = BTreeMap::<usize, Vec<Lit>>::new();
		let mut by_right = BTreeMap::<usize, Vec<Lit>>::new();
		for (&(l, r), shape) in &shapes {
			let lit = emit_pair(&mut self.cnf, &mut aux, l, r, shape);
			by_left.entry(l).or_default().push(lit);
			by_right.entry(r).or_default().push(lit);
		}

		if singleton {
			self.assumptions.extend(by_left.into_values().flatten());
			return Ok(());
		}
		for lits in by_left.values().chain(by_right.values()) {
			let encoding = amo_encoding(policy, threshold, lits.len());
			exactly_one(&mut self.cnf, lits, encoding, &mut aux);
		}
		Ok(())
	}

	fn encode_siblings(&mut self) {
		emit_siblings(&mut self.cnf, &self.vars, self.ctx.norms);
	}

	/// Exactly one partner per signal, singletons and removed candidates as assumptions.
	fn encode_signals(&mut self) {
		let mut constraints = Vec::new();
		for side in Side::BOTH {
			for signal in self.info.signals(side).collect::<Vec<_>>() {
				let pairs = self
					.info
					.live(side, signal)
					.map(|partner| match side {
						Side::Left => PairVar::Signal(signal, partner),
						Side::Right => PairVar::Signal(partner, signal),
					})
					.collect::<Vec<_>>();
				constraints.push(pairs);
			}
		}
		let removed = self.info.removed_pairs().collect::<Vec<_>>();

		let (policy, threshold) = (self.policy, self.pairwise_threshold);
		let mut aux = self.vars.link::<AuxVar>();
		for pairs in constraints {
			let lits = pairs
				.into_iter()
				.map(|pair| pair_lit(aux.parent(), pair))
				.collect::<Vec<_>>();
			match lits.as_slice() {
				&[lit] => self.assumptions.push(lit),
				_ => {
					let encoding = amo_encoding(policy, threshold, lits.len());
					exactly_one(&mut self.cnf, &lits, encoding, &mut aux);
				}
			}
		}
		for (l, r) in removed {
			if let Some(var) = aux.parent().get(&PairVar::Signal(l, r)) {
				self.assumptions.push(Lit::negative(var));
			}
		}
		self.assumptions.sort();
		self.assumptions.dedup();
	}
}

pub(crate) fn amo_encoding(policy: Policy, threshold: usize, len: usize) -> AmoEncoding {
	match policy {
		Policy::ReducedNatural => AmoEncoding::Pairwise,
		_ => AmoEncoding::by_size(len, threshold),
	}
}

fn no_feasible_partner(side: Side, norm: usize) -> EquivalenceError {
	EquivalenceError::not_equivalent(NotEquivalentReason::NoFeasiblePartner { side, norm })
}

pub(crate) fn pair_lit(vars: &mut Assignment<PairVar>, pair: PairVar) -> Lit {
	Lit::positive(vars.assign(pair))
}

fn disjunction_clause(
	vars: &mut Assignment<PairVar>,
	guard: Lit,
	disjunction: &Disjunction,
) -> Vec<Lit> {
	std::iter::once(!guard)
		.chain(
			disjunction
				.iter()
				.map(|&(s, t)| pair_lit(vars, PairVar::Signal(s, t))),
		)
		.collect()
}

/// Emits the clauses of one feasible norm pair and returns its literal.
pub(crate) fn emit_pair(
	cnf: &mut Cnf,
	aux: &mut LinkedAssignment<'_, PairVar, AuxVar>,
	l: usize,
	r: usize,
	shape: &PairShape,
) -> Lit {
	let lit = pair_lit(aux.parent(), PairVar::Norm(l, r));
	for disjunction in &shape.common {
		cnf.add_clause(disjunction_clause(aux.parent(), lit, disjunction));
	}
	for (choice, alternatives) in shape.choices.iter().enumerate() {
		let selectors = (0..alternatives.len())
			.map(|alternative| {
				Lit::positive(aux.assign(AuxVar::Choice {
					left: l,
					right: r,
					choice,
					alternative,
				}))
			})
			.collect::<Vec<_>>();
		cnf.add_clause(std::iter::once(!lit).chain(selectors.iter().copied()));
		for (&selector, alternative) in selectors.iter().zip(alternatives) {
			for disjunction in alternative {
				cnf.add_clause(disjunction_clause(aux.parent(), selector, disjunction));
			}
		}
	}
	lit
}

/// Norms derived from one constraint move together: if `l` goes to `r`, every sibling of `l` goes
/// to some sibling of `r`.
pub(crate) fn emit_siblings(cnf: &mut Cnf, vars: &Assignment<PairVar>, norms: [&[Norm]; 2]) {
	let siblings = norms.map(|norms| {
		let mut by_origin = BTreeMap::<usize, Vec<usize>>::new();
		for (index, norm) in norms.iter().enumerate() {
			by_origin.entry(norm.origin).or_default().push(index);
		}
		by_origin
	});
	let pairs = vars
		.iter()
		.filter_map(|(var, pair)| match *pair {
			PairVar::Norm(l, r) => Some((var, l, r)),
			PairVar::Signal(..) => None,
		})
		.collect::<Vec<_>>();
	for (var, l, r) in pairs {
		let right_siblings = &siblings[1][&norms[1][r].origin];
		for &l2 in &siblings[0][&norms[0][l].origin] {
			if l2 == l {
				continue;
			}
			let options = right_siblings
				.iter()
				.filter(|&&r2| r2 != r)
				.filter_map(|&r2| vars.get(&PairVar::Norm(l2, r2)))
				.map(Lit::positive);
			cnf.add_clause(std::iter::once(Lit::negative(var)).chain(options));
		}
	}
}
