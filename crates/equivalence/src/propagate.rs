// Copyright 2025 Irreducible Inc.
//! Iterated label propagation over a directed graph.
//!
//! Vertices start from caller-provided labels and are repeatedly split by the sorted labels of
//! their successors and of their predecessors, until a round splits nothing. Two vertices that end
//! with the same label cannot be told apart by their neighbourhoods at any depth.

use std::collections::BTreeMap;

use arckit_core::ClassLabel;
use itertools::Itertools;

use crate::fingerprinter::{Members, split_classes};

/// Key of a vertex within one round: sorted successor labels, then sorted predecessor labels.
type NeighbourKey = (Vec<ClassLabel>, Vec<ClassLabel>);

/// Refines `initial` until stable. All three slices are indexed by vertex.
///
/// The result labels vertices so that equal labels imply equal initial labels and equal multisets
/// of neighbour labels in both directions.
pub fn iterated_label_propagation<L: Ord>(
	initial: &[L],
	successors: &[Vec<usize>],
	predecessors: &[Vec<usize>],
) -> Vec<ClassLabel> {
	assert_eq!(initial.len(), successors.len());
	assert_eq!(initial.len(), predecessors.len());
	let _span = tracing::debug_span!("label_propagation", vertices = initial.len()).entered();

	let mut num_singular = 0;
	let mut labels = vec![ClassLabel::initial(0); initial.len()];
	let mut classes = BTreeMap::<ClassLabel, Members>::new();
	let mut by_initial = BTreeMap::<&L, Vec<usize>>::new();
	for (vertex, label) in initial.iter().enumerate() {
		by_initial.entry(label).or_default().push(vertex);
	}
	for (rank, vertices) in by_initial.into_values().enumerate() {
		let label = if vertices.len() == 1 {
			num_singular += 1;
			ClassLabel::singular(num_singular - 1)
		} else {
			ClassLabel::initial(rank)
		};
		for &vertex in &vertices {
			labels[vertex] = label;
		}
		classes.insert(label, vec![vertices]);
	}

	let mut round = 0;
	loop {
		round += 1;
		let mut groups = BTreeMap::<(ClassLabel, NeighbourKey), Members>::new();
		for (&label, members) in classes.iter().filter(|(label, _)| !label.is_singular()) {
			for &vertex in &members[0] {
				let key = (
					neighbour_labels(&labels, &successors[vertex]),
					neighbour_labels(&labels, &predecessors[vertex]),
				);
				groups
					.entry((label, key))
					.or_insert_with(|| vec![Vec::new()])[0]
					.push(vertex);
			}
		}
		let splits = split_classes(groups, round, &mut num_singular);
		if splits.is_empty() {
			break;
		}
		for split in splits {
			classes.remove(&split.old);
			for (label, members) in split.parts {
				for &vertex in &members[0] {
					labels[vertex] = label;
				}
				classes.insert(label, members);
			}
		}
	}
	tracing::debug!(rounds = round, classes = classes.len(), "labels propagated");
	labels
}

fn neighbour_labels(labels: &[ClassLabel], neighbours: &[usize]) -> Vec<ClassLabel> {
	neighbours.iter().map(|&v| labels[v]).sorted().collect()
}

/// Groups vertices by label, in label order.
pub fn label_classes(labels: &[ClassLabel]) -> Vec<Vec<usize>> {
	(0..labels.len())
		.into_group_map_by(|&vertex| labels[vertex])
		.into_iter()
		.sorted()
		.map(|(_, vertices)| vertices)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn predecessors(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
		let mut predecessors = vec![Vec::new(); successors.len()];
		for (vertex, succ) in successors.iter().enumerate() {
			for &s in succ {
				predecessors[s].push(vertex);
			}
		}
		predecessors
	}

	#[test]
	fn test_position_on_a_path_is_recovered() {
		// 0 -> 1 -> 2 -> 3, all alike to start with
		let successors = vec![vec![1], vec![2], vec![3], vec![]];
		let labels = iterated_label_propagation(&[0; 4], &successors, &predecessors(&successors));
		assert!(labels.iter().all_unique());
	}

	#[test]
	fn test_symmetric_branches_stay_together() {
		// 0 -> {1, 2} -> 3
		let successors = vec![vec![1, 2], vec![3], vec![3], vec![]];
		let labels = iterated_label_propagation(&[0; 4], &successors, &predecessors(&successors));
		assert_eq!(labels[1], labels[2]);
		assert_ne!(labels[0], labels[3]);
		assert_eq!(label_classes(&labels).len(), 3);
	}

	#[test]
	fn test_initial_labels_are_respected() {
		let successors = vec![vec![1, 2], vec![3], vec![3], vec![]];
		let labels = iterated_label_propagation(
			&["a", "b", "c", "d"],
			&successors,
			&predecessors(&successors),
		);
		assert!(labels.iter().all(ClassLabel::is_singular));
	}

	#[test]
	fn test_labels_do_not_depend_on_numbering() {
		// two isomorphic graphs: a fork with a tail, numbered differently
		let a = vec![vec![1, 2], vec![], vec![3], vec![]];
		let b = vec![vec![], vec![0, 3], vec![], vec![2]];
		let la = iterated_label_propagation(&[0; 4], &a, &predecessors(&a));
		let lb = iterated_label_propagation(&[0; 4], &b, &predecessors(&b));
		assert_eq!(la.iter().sorted().collect_vec(), lb.iter().sorted().collect_vec());
		assert_eq!(la[0], lb[1]);
		assert_eq!(la[3], lb[2]);
	}
}
