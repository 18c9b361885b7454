// Copyright 2025 Irreducible Inc.
//! Extraction of a group of constraints as a standalone circuit.

use std::collections::{BTreeMap, BTreeSet};

use arckit_core::{CONSTANT_SIGNAL, Circuit, CircuitBuilder, CircuitError, Signal};
use arckit_equivalence::Mapping;

/// A circuit cut out of a larger one, with the way back to the original numbering.
///
/// Signals are renumbered as the constant first, then outputs, then inputs, then internal
/// signals, each group in original order. A signal that is both an input and an output of the
/// group is an output of the sub-circuit.
#[derive(Debug, Clone)]
pub struct SubCircuit {
	pub circuit: Circuit,
	/// Original signal of each sub-circuit signal.
	pub signals: Vec<Signal>,
	/// Original constraint of each sub-circuit constraint.
	pub constraints: Vec<usize>,
}

impl SubCircuit {
	pub fn extract(
		circuit: &Circuit,
		constraints: &[usize],
		inputs: &BTreeSet<Signal>,
		outputs: &BTreeSet<Signal>,
	) -> Result<Self, CircuitError> {
		let used = constraints
			.iter()
			.flat_map(|&c| circuit.constraint(c).signals())
			.collect::<BTreeSet<_>>();
		let mut signals = vec![CONSTANT_SIGNAL];
		signals.extend(outputs.iter().copied());
		signals.extend(inputs.difference(outputs).copied());
		signals.extend(
			used.iter()
				.filter(|s| !inputs.contains(s) && !outputs.contains(s)),
		);
		let renaming = signals
			.iter()
			.enumerate()
			.map(|(new, &old)| (old, new))
			.collect::<BTreeMap<_, _>>();
		let rename = |s: Signal| renaming.get(&s).copied().unwrap_or(usize::MAX);

		let n_outputs = outputs.len();
		let n_inputs = inputs.difference(outputs).count();
		let mapped = constraints
			.iter()
			.map(|&c| circuit.constraint(c).signal_map(rename))
			.collect::<Result<Vec<_>, _>>()?;
		let sub = CircuitBuilder::new(circuit.field().clone(), circuit.dialect())
			.n_signals(signals.len())
			.outputs(1..=n_outputs)
			.inputs(n_outputs + 1..=n_outputs + n_inputs)
			.constraints(mapped)
			.build()?;
		Ok(Self {
			circuit: sub,
			signals,
			constraints: constraints.to_vec(),
		})
	}

	pub fn original_signal(&self, signal: Signal) -> Signal {
		self.signals[signal]
	}

	pub fn original_constraint(&self, constraint: usize) -> usize {
		self.constraints[constraint]
	}

	/// Translates a mapping from this sub-circuit to `target` into original numbering.
	pub fn undo_mapping(&self, target: &SubCircuit, mapping: &Mapping) -> Mapping {
		Mapping {
			signals: mapping
				.signals
				.iter()
				.map(|(&l, &r)| (self.original_signal(l), target.original_signal(r)))
				.collect(),
			constraints: mapping
				.constraints
				.iter()
				.map(|(&l, &r)| (self.original_constraint(l), target.original_constraint(r)))
				.collect(),
		}
	}
}
