// Copyright 2025 Irreducible Inc.
//! Validated circuits.

use std::collections::BTreeSet;

use num_bigint::BigUint;

use crate::{
	consts::CONSTANT_SIGNAL,
	constraint::{Constraint, Dialect, Signal},
	error::CircuitError,
	field::PrimeField,
	stat::CircuitStat,
};

/// The role a signal plays in its circuit.
///
/// The order is the order in which sub-circuits number their signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalRole {
	Constant,
	Output,
	Input,
	Internal,
}

/// A normalized constraint together with the index of the constraint it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Norm {
	pub constraint: Constraint,
	pub origin: usize,
}

/// An ordered list of constraints of one dialect over signals `0..n_signals`.
///
/// Construct through [`CircuitBuilder`], which enforces the structural invariants:
/// - the constant signal is neither an input nor an output,
/// - inputs and outputs are disjoint,
/// - every declared or referenced signal is below `n_signals`,
/// - all constraints share the circuit's dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
	field: PrimeField,
	dialect: Dialect,
	n_signals: usize,
	constraints: Vec<Constraint>,
	inputs: BTreeSet<Signal>,
	outputs: BTreeSet<Signal>,
}

impl Circuit {
	pub fn field(&self) -> &PrimeField {
		&self.field
	}

	pub fn dialect(&self) -> Dialect {
		self.dialect
	}

	/// Number of signals including the constant signal.
	pub fn n_signals(&self) -> usize {
		self.n_signals
	}

	pub fn n_constraints(&self) -> usize {
		self.constraints.len()
	}

	pub fn constraints(&self) -> &[Constraint] {
		&self.constraints
	}

	pub fn constraint(&self, index: usize) -> &Constraint {
		&self.constraints[index]
	}

	pub fn inputs(&self) -> &BTreeSet<Signal> {
		&self.inputs
	}

	pub fn outputs(&self) -> &BTreeSet<Signal> {
		&self.outputs
	}

	pub fn signal_role(&self, signal: Signal) -> SignalRole {
		if signal == CONSTANT_SIGNAL {
			SignalRole::Constant
		} else if self.outputs.contains(&signal) {
			SignalRole::Output
		} else if self.inputs.contains(&signal) {
			SignalRole::Input
		} else {
			SignalRole::Internal
		}
	}

	/// For every signal, the sorted indices of the constraints referencing it.
	///
	/// The constant signal is never listed.
	pub fn signal_to_constraints(&self) -> Vec<Vec<usize>> {
		let mut map = vec![Vec::new(); self.n_signals];
		for (index, constraint) in self.constraints.iter().enumerate() {
			for signal in constraint.signals() {
				map[signal].push(index);
			}
		}
		map
	}

	/// Signals referenced by at least one constraint, the constant signal excluded.
	pub fn used_signals(&self) -> BTreeSet<Signal> {
		self.constraints
			.iter()
			.flat_map(|constraint| constraint.signals())
			.collect()
	}

	/// Normalizes every constraint; norms of one constraint are adjacent and sorted.
	pub fn normalize(&self) -> Vec<Norm> {
		let _span = tracing::debug_span!("normalize", n_constraints = self.constraints.len()).entered();
		self.constraints
			.iter()
			.enumerate()
			.flat_map(|(origin, constraint)| {
				constraint
					.normalize(&self.field)
					.into_iter()
					.map(move |constraint| Norm { constraint, origin })
			})
			.collect()
	}

	/// Checks every constraint against a full assignment where `values[0]` is one.
	pub fn is_satisfied(&self, values: &[BigUint]) -> bool {
		self.constraints
			.iter()
			.all(|constraint| constraint.is_satisfied(&self.field, values))
	}

	pub fn stat(&self) -> CircuitStat {
		CircuitStat::collect(self)
	}
}

/// Incrementally assembles a [`Circuit`].
#[derive(Debug, Clone)]
pub struct CircuitBuilder {
	field: PrimeField,
	dialect: Dialect,
	n_signals: Option<usize>,
	constraints: Vec<Constraint>,
	inputs: Vec<Signal>,
	outputs: Vec<Signal>,
}

impl CircuitBuilder {
	pub fn new(field: PrimeField, dialect: Dialect) -> Self {
		Self {
			field,
			dialect,
			n_signals: None,
			constraints: Vec::new(),
			inputs: Vec::new(),
			outputs: Vec::new(),
		}
	}

	/// Fixes the signal count. Without it the count is one past the largest signal seen.
	pub fn n_signals(mut self, n_signals: usize) -> Self {
		self.n_signals = Some(n_signals);
		self
	}

	pub fn inputs(mut self, inputs: impl IntoIterator<Item = Signal>) -> Self {
		self.inputs.extend(inputs);
		self
	}

	pub fn outputs(mut self, outputs: impl IntoIterator<Item = Signal>) -> Self {
		self.outputs.extend(outputs);
		self
	}

	pub fn constraint(mut self, constraint: impl Into<Constraint>) -> Self {
		self.constraints.push(constraint.into());
		self
	}

	pub fn constraints<C: Into<Constraint>>(
		mut self,
		constraints: impl IntoIterator<Item = C>,
	) -> Self {
		self.constraints
			.extend(constraints.into_iter().map(Into::into));
		self
	}

	pub fn build(self) -> Result<Circuit, CircuitError> {
		let Self {
			field,
			dialect,
			n_signals,
			constraints,
			inputs,
			outputs,
		} = self;

		let largest = constraints
			.iter()
			.filter_map(|constraint| constraint.signals().last().copied())
			.chain(inputs.iter().copied())
			.chain(outputs.iter().copied())
			.max()
			.unwrap_or(CONSTANT_SIGNAL);
		let n_signals = n_signals.unwrap_or(largest + 1).max(1);

		let inputs = check_declared(&inputs, "input", n_signals)?;
		let outputs = check_declared(&outputs, "output", n_signals)?;
		if let Some(&signal) = inputs.intersection(&outputs).next() {
			return Err(CircuitError::InputOutputOverlap { signal });
		}

		for (constraint_index, constraint) in constraints.iter().enumerate() {
			if constraint.dialect() != dialect {
				return Err(CircuitError::MixedDialects {
					constraint_index,
					expected: dialect.name(),
					found: constraint.dialect().name(),
				});
			}
			if let Some(&signal) = constraint.signals().last()
				&& signal >= n_signals
			{
				return Err(CircuitError::OutOfRangeSignal {
					constraint_index,
					signal,
					n_signals,
				});
			}
		}

		Ok(Circuit {
			field,
			dialect,
			n_signals,
			constraints,
			inputs,
			outputs,
		})
	}
}

fn check_declared(
	signals: &[Signal],
	role: &'static str,
	n_signals: usize,
) -> Result<BTreeSet<Signal>, CircuitError> {
	for &signal in signals {
		if signal == CONSTANT_SIGNAL {
			return Err(CircuitError::ConstantSignalDeclared { role });
		}
		if signal >= n_signals {
			return Err(CircuitError::OutOfRangeDeclared {
				role,
				signal,
				n_signals,
			});
		}
	}
	Ok(signals.iter().copied().collect())
}
