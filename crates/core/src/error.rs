// Copyright 2025 Irreducible Inc.
//! Hosts error definitions for the core crate.

use crate::constraint::Signal;

/// A circuit or constraint violates one of its structural invariants.
#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CircuitError {
	#[error("signal 0 is the constant signal and cannot be declared as {role}")]
	ConstantSignalDeclared { role: &'static str },
	#[error("signal {signal} is declared both as an input and as an output")]
	InputOutputOverlap { signal: Signal },
	#[error("declared {role} signal {signal} is out of range (the circuit has {n_signals} signals)")]
	OutOfRangeDeclared {
		role: &'static str,
		signal: Signal,
		n_signals: usize,
	},
	#[error(
		"constraint #{constraint_index} refers to signal {signal} but the circuit has {n_signals} signals"
	)]
	OutOfRangeSignal {
		constraint_index: usize,
		signal: Signal,
		n_signals: usize,
	},
	#[error("constraint #{constraint_index} is {found} but the circuit is {expected}")]
	MixedDialects {
		constraint_index: usize,
		expected: &'static str,
		found: &'static str,
	},
	#[error("signal map is not injective: {first} and {second} are both mapped to {image}")]
	NonInjectiveSignalMap {
		first: Signal,
		second: Signal,
		image: Signal,
	},
	#[error("signal map sends signal {signal} onto the constant signal")]
	SignalMappedToConstant { signal: Signal },
	#[error("malformed {location}: {detail}")]
	Malformed { location: String, detail: String },
}
