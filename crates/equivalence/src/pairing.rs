// Copyright 2025 Irreducible Inc.
//! What matching one norm onto another demands of the signal mapping.
//!
//! Pairing a left norm with a right norm is only possible when every term of the left norm finds
//! a term with the same coefficient in the corresponding part of the right norm. Each left term
//! therefore yields a disjunction over the signal pairs that would realise it. Where the parts can
//! be matched in more than one way (the two factors of a symmetric R1CS product, the two
//! orientations of an ACIR product) the alternatives are kept apart as a choice.
//!
//! Since the signal mapping is injective and matched parts have the same number of terms, a
//! mapping satisfying the disjunctions of a pair maps the left norm exactly onto the right norm.

use std::collections::BTreeSet;

use arckit_core::{
	AcirConstraint, CONSTANT_SIGNAL, Constraint, LinearCombination, R1csConstraint, Signal,
};

/// Signal pairs `(left, right)` of which at least one must hold.
pub type Disjunction = Vec<(Signal, Signal)>;

/// Conditions under which a left norm can be matched onto a right norm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairShape {
	/// Must all hold.
	pub common: Vec<Disjunction>,
	/// Each choice needs one of its alternatives, and an alternative needs all its disjunctions.
	pub choices: Vec<Vec<Vec<Disjunction>>>,
}

impl PairShape {
	/// The right signals `signal` can map to when the pair holds, or `None` when the pair does
	/// not pin it down.
	pub fn allowed(&self, signal: Signal) -> Option<BTreeSet<Signal>> {
		let mut allowed = intersect_all(&self.common, signal);
		for choice in &self.choices {
			let mut union = BTreeSet::new();
			let mut unrestricted = false;
			for alternative in choice {
				match intersect_all(alternative, signal) {
					Some(set) => union.extend(set),
					None => {
						unrestricted = true;
						break;
					}
				}
			}
			if !unrestricted {
				allowed = Some(match allowed {
					Some(set) => set.intersection(&union).copied().collect(),
					None => union,
				});
			}
		}
		allowed
	}
}

fn intersect_all(disjunctions: &[Disjunction], signal: Signal) -> Option<BTreeSet<Signal>> {
	let mut allowed: Option<BTreeSet<Signal>> = None;
	for disjunction in disjunctions {
		if !disjunction.iter().all(|&(l, _)| l == signal) || disjunction.is_empty() {
			continue;
		}
		let set = disjunction.iter().map(|&(_, r)| r).collect::<BTreeSet<_>>();
		allowed = Some(match allowed {
			Some(prev) => prev.intersection(&set).copied().collect(),
			None => set,
		});
	}
	allowed
}

/// Computes the shape of matching `left` onto `right`, or `None` when no signal mapping allowed by
/// `is_candidate` can do it.
pub fn pair_shape(
	left: &Constraint,
	right: &Constraint,
	is_candidate: impl Fn(Signal, Signal) -> bool,
) -> Option<PairShape> {
	match (left, right) {
		(Constraint::R1cs(l), Constraint::R1cs(r)) => r1cs_shape(l, r, &is_candidate),
		(Constraint::Acir(l), Constraint::Acir(r)) => acir_shape(l, r, &is_candidate),
		_ => None,
	}
}

fn r1cs_shape(
	l: &R1csConstraint,
	r: &R1csConstraint,
	is_candidate: &impl Fn(Signal, Signal) -> bool,
) -> Option<PairShape> {
	if l.is_ab_unordered() != r.is_ab_unordered() {
		return None;
	}
	let mut common = part_terms(&l.c, &r.c, is_candidate)?;
	let mut choices = Vec::new();
	if l.is_ab_unordered() {
		let alternatives = [(&r.a, &r.b), (&r.b, &r.a)]
			.into_iter()
			.filter_map(|(ra, rb)| {
				let mut clauses = part_terms(&l.a, ra, is_candidate)?;
				clauses.extend(part_terms(&l.b, rb, is_candidate)?);
				Some(clauses)
			})
			.collect::<Vec<_>>();
		push_choice(&mut common, &mut choices, alternatives)?;
	} else {
		common.extend(part_terms(&l.a, &r.a, is_candidate)?);
		common.extend(part_terms(&l.b, &r.b, is_candidate)?);
	}
	Some(PairShape { common, choices })
}

fn acir_shape(
	l: &AcirConstraint,
	r: &AcirConstraint,
	is_candidate: &impl Fn(Signal, Signal) -> bool,
) -> Option<PairShape> {
	if l.constant != r.constant || l.mult.len() != r.mult.len() {
		return None;
	}
	let mut common = part_terms(&l.linear, &r.linear, is_candidate)?;
	let mut choices = Vec::new();
	for (&(x, y), value) in &l.mult {
		let mut alternatives = Vec::new();
		for (&(u, v), _) in r.mult.iter().filter(|(_, other)| *other == value) {
			let orientations = match (x == y, u == v) {
				(true, true) => vec![[(x, u), (y, v)]],
				(false, false) => vec![[(x, u), (y, v)], [(x, v), (y, u)]],
				_ => Vec::new(),
			};
			for pairs in &orientations {
				if pairs.iter().all(|&(s, t)| is_candidate(s, t)) {
					let mut clauses = pairs.iter().map(|&pair| vec![pair]).collect::<Vec<_>>();
					clauses.dedup();
					alternatives.push(clauses);
				}
			}
		}
		push_choice(&mut common, &mut choices, alternatives)?;
	}
	Some(PairShape { common, choices })
}

/// Records a choice, folding it into `common` when only one alternative is left.
fn push_choice(
	common: &mut Vec<Disjunction>,
	choices: &mut Vec<Vec<Vec<Disjunction>>>,
	mut alternatives: Vec<Vec<Disjunction>>,
) -> Option<()> {
	alternatives.dedup();
	match alternatives.len() {
		0 => None,
		1 => {
			common.extend(alternatives.into_iter().flatten());
			Some(())
		}
		_ => {
			choices.push(alternatives);
			Some(())
		}
	}
}

/// One disjunction per non-constant term of `p`, matching it into `q`.
fn part_terms(
	p: &LinearCombination,
	q: &LinearCombination,
	is_candidate: &impl Fn(Signal, Signal) -> bool,
) -> Option<Vec<Disjunction>> {
	if p.len() != q.len() || p.get(&CONSTANT_SIGNAL) != q.get(&CONSTANT_SIGNAL) {
		return None;
	}
	let mut disjunctions = Vec::with_capacity(p.len());
	for (&s, value) in p.iter().filter(|&(&s, _)| s != CONSTANT_SIGNAL) {
		let options = q
			.iter()
			.filter(|&(&t, other)| t != CONSTANT_SIGNAL && other == value && is_candidate(s, t))
			.map(|(&t, _)| (s, t))
			.collect::<Disjunction>();
		if options.is_empty() {
			return None;
		}
		disjunctions.push(options);
	}
	Some(disjunctions)
}
