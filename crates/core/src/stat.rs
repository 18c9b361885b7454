// Copyright 2025 Irreducible Inc.

//! Circuit statistics module for summarizing the shape of a circuit.

use std::fmt;

use crate::{circuit::Circuit, constraint::Dialect};

/// Various stats of a circuit that affect the cost of equivalence checking.
pub struct CircuitStat {
	pub dialect: Dialect,
	/// Number of constraints in the circuit.
	pub n_constraints: usize,
	/// Number of constraints with a quadratic term.
	pub n_nonlinear: usize,
	/// Number of normalized constraints.
	///
	/// Exceeds `n_constraints` when some constraint has several equally canonical forms. Every
	/// extra norm widens the residual matching problem.
	pub n_norms: usize,
	/// Largest number of norms produced by a single constraint.
	pub max_norms_per_constraint: usize,
	/// Number of signals, the constant signal included.
	pub n_signals: usize,
	/// Number of signals not referenced by any constraint.
	pub n_unused: usize,
	pub n_inputs: usize,
	pub n_outputs: usize,
}

impl CircuitStat {
	/// Creates a new `CircuitStat` instance by collecting statistics from the given circuit.
	pub fn collect(circuit: &Circuit) -> Self {
		let mut n_norms = 0;
		let mut max_norms_per_constraint = 0;
		for constraint in circuit.constraints() {
			let count = constraint.normalize(circuit.field()).len();
			n_norms += count;
			max_norms_per_constraint = max_norms_per_constraint.max(count);
		}
		let used = circuit.used_signals().len();

		Self {
			dialect: circuit.dialect(),
			n_constraints: circuit.n_constraints(),
			n_nonlinear: circuit
				.constraints()
				.iter()
				.filter(|constraint| constraint.is_nonlinear())
				.count(),
			n_norms,
			max_norms_per_constraint,
			n_signals: circuit.n_signals(),
			n_unused: circuit.n_signals().saturating_sub(used + 1),
			n_inputs: circuit.inputs().len(),
			n_outputs: circuit.outputs().len(),
		}
	}
}

impl fmt::Display for CircuitStat {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		// Helper to format numbers with commas
		fn fmt_num(n: usize) -> String {
			let s = n.to_string();
			let mut result = String::new();
			for (i, c) in s.chars().rev().enumerate() {
				if i > 0 && i % 3 == 0 {
					result.push(',');
				}
				result.push(c);
			}
			result.chars().rev().collect()
		}

		let n_linear = self.n_constraints - self.n_nonlinear;

		writeln!(f, "Constraints ({})", self.dialect)?;
		writeln!(f, "├─ Total: {}", fmt_num(self.n_constraints))?;
		writeln!(f, "│  ├─ Nonlinear: {}", fmt_num(self.n_nonlinear))?;
		writeln!(f, "│  └─ Linear: {}", fmt_num(n_linear))?;
		writeln!(
			f,
			"└─ Norms: {} (at most {} per constraint)",
			fmt_num(self.n_norms),
			self.max_norms_per_constraint
		)?;
		writeln!(f)?;

		let n_internal = self
			.n_signals
			.saturating_sub(1 + self.n_inputs + self.n_outputs);
		writeln!(f, "Signals")?;
		writeln!(f, "├─ Total (with constant): {}", fmt_num(self.n_signals))?;
		writeln!(f, "│  ├─ Inputs: {}", fmt_num(self.n_inputs))?;
		writeln!(f, "│  ├─ Outputs: {}", fmt_num(self.n_outputs))?;
		writeln!(f, "│  └─ Internal: {}", fmt_num(n_internal))?;
		writeln!(f, "└─ Unused: {}", fmt_num(self.n_unused))?;

		Ok(())
	}
}
