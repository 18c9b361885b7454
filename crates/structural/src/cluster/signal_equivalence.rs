// Copyright 2025 Irreducible Inc.
use arckit_core::Circuit;

use super::Partition;
use crate::graph::ConstraintGraph;

/// Removes every constraint equating two signals and clusters the rest by connected components.
///
/// With `relaxed`, constraints of the form `x = y + c` count as equating too. Removed constraints
/// end up as singleton parts.
pub fn signal_equivalence_removal(circuit: &Circuit, relaxed: bool) -> Partition {
	let field = circuit.field();
	let removed = circuit
		.constraints()
		.iter()
		.map(|c| c.signal_equivalence(field, relaxed).is_some())
		.collect::<Vec<_>>();
	let graph = ConstraintGraph::restricted(circuit, |c| !removed[c]);
	let mut parts = graph.components(|c| !removed[c]);
	let n_removed = removed.iter().filter(|&&r| r).count();
	tracing::debug!(removed = n_removed, components = parts.len(), "signal equivalences removed");
	parts.extend(
		removed
			.iter()
			.enumerate()
			.filter(|&(_, &r)| r)
			.map(|(c, _)| vec![c]),
	);
	parts.sort_unstable_by_key(|part| part[0]);
	Partition { parts }
}
