// Copyright 2025 Irreducible Inc.
//! Classes of structurally equivalent DAG nodes.
//!
//! Nodes are first grouped by a local fingerprint of their sub-circuit: its sizes and the trace of
//! a single-sided refinement. Depending on [`EquivalenceDepth`] the groups are then verified by a
//! pairwise check against each class representative, and refined by label propagation over the
//! DAG so that members of a structural class also sit in equivalent surroundings.

use std::{
	collections::{BTreeMap, BTreeSet},
	fmt,
	str::FromStr,
};

use arckit_core::CircuitError;
use arckit_equivalence::{
	EquivalenceError, EquivalenceOptions, Mapping, MaxEquivOptions, Outcome, compare,
	iterated_label_propagation, label_classes, maximal_equivalence, refine_single,
};
use arckit_utils::UnionFind;

use crate::{
	dag::{Dag, NodeId},
	error::StructuralError,
};

/// How far node equivalence is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EquivalenceDepth {
	/// No classes.
	None,
	/// Local fingerprint groups, unverified.
	Naive,
	/// Local fingerprint groups split by pairwise checks.
	#[default]
	Local,
	/// Local classes, plus label propagation over the DAG from the local fingerprints.
	Structural,
	/// Local classes, plus label propagation over the DAG from the verified local classes.
	Total,
}

impl EquivalenceDepth {
	pub const ALL: [EquivalenceDepth; 5] = [
		EquivalenceDepth::None,
		EquivalenceDepth::Naive,
		EquivalenceDepth::Local,
		EquivalenceDepth::Structural,
		EquivalenceDepth::Total,
	];

	pub fn name(self) -> &'static str {
		match self {
			EquivalenceDepth::None => "none",
			EquivalenceDepth::Naive => "naive",
			EquivalenceDepth::Local => "local",
			EquivalenceDepth::Structural => "structural",
			EquivalenceDepth::Total => "total",
		}
	}

	fn verifies(self) -> bool {
		!matches!(self, EquivalenceDepth::None | EquivalenceDepth::Naive)
	}
}

impl fmt::Display for EquivalenceDepth {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Debug, thiserror::Error)]
#[error("unknown equivalence depth {0:?}")]
pub struct UnknownDepth(String);

impl FromStr for EquivalenceDepth {
	type Err = UnknownDepth;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		EquivalenceDepth::ALL
			.into_iter()
			.find(|depth| depth.name() == s)
			.ok_or_else(|| UnknownDepth(s.to_string()))
	}
}

#[derive(Debug, Clone)]
pub struct ClassOptions {
	pub depth: EquivalenceDepth,
	/// Options of every pairwise check; the timeout applies per pair.
	pub equivalence: EquivalenceOptions,
	/// Nodes with fewer constraints are kept out of every class.
	pub minimum_circuit_size: usize,
	/// Report mappings in the numbering of the clustered circuit rather than of the sub-circuits.
	pub undo_mapping: bool,
	/// Look for large common parts between the representatives of different local classes.
	pub maximal: Option<MaxEquivOptions>,
	/// Fold local classes joined by a maximal match into one class.
	pub maximal_merge: bool,
}

impl Default for ClassOptions {
	fn default() -> Self {
		Self {
			depth: EquivalenceDepth::default(),
			equivalence: EquivalenceOptions::default(),
			minimum_circuit_size: 1,
			undo_mapping: true,
			maximal: None,
			maximal_merge: false,
		}
	}
}

/// A class of nodes with the mapping from the representative onto every other member.
///
/// Mappings are absent for unverified classes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeClass {
	pub representative: NodeId,
	pub others: Vec<(NodeId, Option<Mapping>)>,
}

impl NodeClass {
	fn singleton(representative: NodeId) -> Self {
		Self {
			representative,
			others: Vec::new(),
		}
	}

	pub fn members(&self) -> impl Iterator<Item = NodeId> + '_ {
		std::iter::once(self.representative).chain(self.others.iter().map(|(id, _)| *id))
	}
}

/// A maximal match between the representatives of two local classes.
#[derive(Debug, Clone, PartialEq)]
pub struct NearMatch {
	pub left: NodeId,
	pub right: NodeId,
	pub matched: usize,
	pub total: usize,
	pub mapping: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classes {
	pub local: Vec<NodeClass>,
	pub structural: Vec<NodeClass>,
	pub near: Vec<NearMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum LocalKey {
	/// Below the size threshold; never grouped.
	Small(NodeId),
	Fingerprint {
		n_signals: usize,
		n_constraints: usize,
		n_inputs: usize,
		n_outputs: usize,
		trace: u64,
	},
}

fn local_key(dag: &Dag, id: NodeId, minimum_size: usize) -> Result<LocalKey, CircuitError> {
	if dag.node(id).constraints().len() < minimum_size {
		return Ok(LocalKey::Small(id));
	}
	let sub = &dag.subcircuit(id)?.circuit;
	let refinement = refine_single(sub, &sub.normalize());
	Ok(LocalKey::Fingerprint {
		n_signals: sub.n_signals(),
		n_constraints: sub.n_constraints(),
		n_inputs: sub.inputs().len(),
		n_outputs: sub.outputs().len(),
		trace: refinement.trace,
	})
}

/// Groups `nodes` by `key`, in key order.
fn group_by<K: Ord>(
	nodes: impl IntoIterator<Item = NodeId>,
	key: impl Fn(NodeId) -> K,
) -> Vec<Vec<NodeId>> {
	let mut groups = BTreeMap::<K, Vec<NodeId>>::new();
	for id in nodes {
		groups.entry(key(id)).or_default().push(id);
	}
	groups.into_values().collect()
}

/// Classes of the DAG's nodes as far as `options.depth` asks.
pub fn equivalence_classes(dag: &Dag, options: &ClassOptions) -> Result<Classes, StructuralError> {
	let _span = tracing::info_span!("classes", depth = %options.depth, nodes = dag.len()).entered();
	let mut classes = Classes::default();
	if options.depth == EquivalenceDepth::None {
		return Ok(classes);
	}
	let keys = dag
		.node_ids()
		.map(|id| Ok((id, local_key(dag, id, options.minimum_circuit_size)?)))
		.collect::<Result<BTreeMap<_, _>, CircuitError>>()?;
	let groups = group_by(dag.node_ids(), |id| keys[&id].clone());

	if !options.depth.verifies() {
		classes.local = groups.into_iter().filter_map(unverified).collect();
		sort_classes(&mut classes.local);
		return Ok(classes);
	}
	for group in &groups {
		classes.local.extend(verify(dag, group, options)?);
	}
	sort_classes(&mut classes.local);
	tracing::info!(groups = groups.len(), classes = classes.local.len(), "local classes");

	if let Some(maximal) = &options.maximal {
		classes.near = near_matches(dag, &classes.local, maximal, options)?;
		if options.maximal_merge {
			classes.local = fold_near_matches(&classes.local, &classes.near);
		}
	}

	let structural_groups = match options.depth {
		EquivalenceDepth::Structural => propagate(dag, |id| keys[&id].clone()),
		EquivalenceDepth::Total => {
			let class_of = classes
				.local
				.iter()
				.enumerate()
				.flat_map(|(i, class)| class.members().map(move |id| (id, i)))
				.collect::<BTreeMap<_, _>>();
			propagate(dag, |id| class_of[&id])
		}
		_ => Vec::new(),
	};
	for group in &structural_groups {
		classes.structural.extend(verify(dag, group, options)?);
	}
	sort_classes(&mut classes.structural);
	Ok(classes)
}

fn unverified(group: Vec<NodeId>) -> Option<NodeClass> {
	let mut members = group.into_iter();
	let mut class = NodeClass::singleton(members.next()?);
	class.others = members.map(|id| (id, None)).collect();
	Some(class)
}

fn sort_classes(classes: &mut [NodeClass]) {
	classes.sort_by_key(|class| class.representative);
}

/// Splits a candidate group into classes by checking every node against each representative.
fn verify(
	dag: &Dag,
	group: &[NodeId],
	options: &ClassOptions,
) -> Result<Vec<NodeClass>, StructuralError> {
	let mut classes = Vec::<NodeClass>::new();
	for &node in group {
		let mut placed = false;
		for class in &mut classes {
			if let Some(mapping) = check_pair(dag, class.representative, node, options)? {
				class.others.push((node, Some(mapping)));
				placed = true;
				break;
			}
		}
		if !placed {
			classes.push(NodeClass::singleton(node));
		}
	}
	Ok(classes)
}

/// The mapping from `left` onto `right`, if their sub-circuits are equivalent.
fn check_pair(
	dag: &Dag,
	left: NodeId,
	right: NodeId,
	options: &ClassOptions,
) -> Result<Option<Mapping>, StructuralError> {
	let (l, r) = (dag.subcircuit(left)?, dag.subcircuit(right)?);
	let comparison = compare(&l.circuit, &r.circuit, &options.equivalence)?;
	Ok(match comparison.outcome {
		Outcome::Equivalent(mapping) if options.undo_mapping => Some(l.undo_mapping(r, &mapping)),
		Outcome::Equivalent(mapping) => Some(mapping),
		Outcome::NotEquivalent(_) => None,
		Outcome::Timeout { phase, .. } => {
			tracing::warn!(%left, %right, %phase, "pairwise check timed out, taken as not equivalent");
			None
		}
	})
}

/// Iterated label propagation over the live nodes, starting from `initial`.
fn propagate<L: Ord>(dag: &Dag, initial: impl Fn(NodeId) -> L) -> Vec<Vec<NodeId>> {
	let ids = dag.node_ids().collect::<Vec<_>>();
	let index = ids
		.iter()
		.enumerate()
		.map(|(i, &id)| (id, i))
		.collect::<BTreeMap<_, _>>();
	let adjacency = |edges: &BTreeSet<NodeId>| edges.iter().map(|id| index[id]).collect::<Vec<_>>();
	let successors = ids
		.iter()
		.map(|&id| adjacency(&dag.successors(id)))
		.collect::<Vec<_>>();
	let predecessors = ids
		.iter()
		.map(|&id| adjacency(&dag.predecessors(id)))
		.collect::<Vec<_>>();
	let initial = ids.iter().map(|&id| initial(id)).collect::<Vec<_>>();
	let labels = iterated_label_propagation(&initial, &successors, &predecessors);
	label_classes(&labels)
		.into_iter()
		.map(|class| class.into_iter().map(|i| ids[i]).collect())
		.collect()
}

/// Maximal matches between the representatives of local classes.
///
/// Pairs whose constraint counts already rule out the tolerance are skipped.
fn near_matches(
	dag: &Dag,
	local: &[NodeClass],
	maximal: &MaxEquivOptions,
	options: &ClassOptions,
) -> Result<Vec<NearMatch>, StructuralError> {
	let _span = tracing::debug_span!("near_matches", classes = local.len()).entered();
	let mut near = Vec::new();
	for (i, a) in local.iter().enumerate() {
		for b in &local[i + 1..] {
			let (left, right) = (a.representative, b.representative);
			let (na, nb) = (
				dag.node(left).constraints().len(),
				dag.node(right).constraints().len(),
			);
			if (na.min(nb) as f64) < maximal.tolerance * na.max(nb) as f64 {
				continue;
			}
			let (l, r) = (dag.subcircuit(left)?, dag.subcircuit(right)?);
			match maximal_equivalence(&l.circuit, &r.circuit, maximal) {
				Ok(found) => {
					let mapping = if options.undo_mapping {
						l.undo_mapping(r, &found.mapping)
					} else {
						found.mapping
					};
					near.push(NearMatch {
						left,
						right,
						matched: found.matched,
						total: found.total,
						mapping,
					});
				}
				Err(EquivalenceError::NotEquivalent { .. }) => {}
				Err(EquivalenceError::Timeout { phase, .. }) => {
					tracing::warn!(%left, %right, %phase, "maximal match timed out");
				}
				Err(err) => return Err(err.into()),
			}
		}
	}
	tracing::debug!(found = near.len(), "maximal matches");
	Ok(near)
}

/// Joins local classes connected by maximal matches.
///
/// Members of an absorbed class are mapped through the match between the representatives.
fn fold_near_matches(local: &[NodeClass], near: &[NearMatch]) -> Vec<NodeClass> {
	let mut uf = UnionFind::new();
	let by_representative = local
		.iter()
		.map(|class| (class.representative, class))
		.collect::<BTreeMap<_, _>>();
	for id in by_representative.keys() {
		uf.find(id);
	}
	let mut link = BTreeMap::new();
	for m in near {
		if !uf.same(&m.left, &m.right) {
			uf.union(&m.left, &m.right);
			link.insert((m.left, m.right), &m.mapping);
		}
	}

	let mut folded = Vec::new();
	for group in uf.groups().into_values() {
		// the smallest representative leads; the others hang off it through a chain of matches
		let lead = group[0];
		let mut reach = BTreeMap::from([(lead, Mapping::default())]);
		let mut frontier = vec![lead];
		while let Some(from) = frontier.pop() {
			let via = reach[&from].clone();
			for (&(l, r), &mapping) in &link {
				let (next, step) = match (l == from, r == from) {
					(true, _) => (r, mapping.clone()),
					(_, true) => (l, mapping.inverse()),
					_ => continue,
				};
				if reach.contains_key(&next) {
					continue;
				}
				let path = if from == lead { step } else { via.then(&step) };
				reach.insert(next, path);
				frontier.push(next);
			}
		}

		let mut class = by_representative[&lead].clone();
		for &other in &group[1..] {
			let to_other = &reach[&other];
			class.others.push((other, Some(to_other.clone())));
			for (member, mapping) in &by_representative[&other].others {
				let composed = mapping.as_ref().map(|m| to_other.then(m));
				class.others.push((*member, composed));
			}
		}
		folded.push(class);
	}
	sort_classes(&mut folded);
	folded
}

#[cfg(test)]
mod tests {
	use arckit_core::{Circuit, CircuitBuilder, Dialect, PrimeField, R1csConstraint};
	use cranelift_entity::EntityRef;
	use num_bigint::BigUint;

	use super::*;
	use crate::cluster::Partition;

	/// Two independent squaring chains `1 -> 3 -> 4` and `2 -> 5 -> 6`.
	fn two_chains() -> Circuit {
		let f = PrimeField::new(BigUint::from(101u32));
		let square = |x, y| R1csConstraint::from_i64(&f, &[(x, 1)], &[(x, 1)], &[(y, 1)]);
		CircuitBuilder::new(f.clone(), Dialect::R1cs)
			.inputs([1, 2])
			.outputs([4, 6])
			.constraint(square(1, 3))
			.constraint(square(2, 5))
			.constraint(square(3, 4))
			.constraint(square(5, 6))
			.build()
			.unwrap()
	}

	fn members(classes: &[NodeClass]) -> Vec<Vec<usize>> {
		classes
			.iter()
			.map(|class| class.members().map(|id| id.index()).collect())
			.collect()
	}

	#[test]
	fn test_depths() {
		let circuit = two_chains();
		let dag = Dag::from_partition(&circuit, &Partition::from_labels(&[0, 1, 2, 3]));
		let classes_at = |depth| {
			let options = ClassOptions {
				depth,
				..ClassOptions::default()
			};
			equivalence_classes(&dag, &options).unwrap()
		};

		assert_eq!(classes_at(EquivalenceDepth::None), Classes::default());

		let naive = classes_at(EquivalenceDepth::Naive);
		assert_eq!(members(&naive.local), vec![vec![0, 1, 2, 3]]);
		assert!(naive.local[0].others.iter().all(|(_, m)| m.is_none()));

		let local = classes_at(EquivalenceDepth::Local);
		assert_eq!(members(&local.local), vec![vec![0, 1, 2, 3]]);
		assert!(local.structural.is_empty());
		let (other, mapping) = &local.local[0].others[1];
		assert_eq!(other.index(), 2);
		let mapping = mapping.as_ref().unwrap();
		assert_eq!(mapping.signals[&1], 3);
		assert_eq!(mapping.signals[&3], 4);
		assert_eq!(mapping.constraints, BTreeMap::from([(0, 2)]));

		for depth in [EquivalenceDepth::Structural, EquivalenceDepth::Total] {
			let classes = classes_at(depth);
			assert_eq!(members(&classes.structural), vec![vec![0, 1], vec![2, 3]], "{depth}");
		}
	}

	#[test]
	fn test_small_nodes_stay_alone() {
		let circuit = two_chains();
		let dag = Dag::from_partition(&circuit, &Partition::from_labels(&[0, 1, 2, 3]));
		let options = ClassOptions {
			minimum_circuit_size: 2,
			..ClassOptions::default()
		};
		let classes = equivalence_classes(&dag, &options).unwrap();
		assert_eq!(classes.local.len(), 4);
	}

	#[test]
	fn test_near_matches_fold_classes_through_chains() {
		let [n0, n1, n2, n3] = [0, 1, 2, 3].map(NodeId::new);
		let single = |l: usize, r: usize| Mapping {
			signals: BTreeMap::from([(l, r)]),
			constraints: BTreeMap::new(),
		};
		let near = |left, right, mapping| NearMatch {
			left,
			right,
			matched: 1,
			total: 1,
			mapping,
		};
		let local = vec![
			NodeClass {
				representative: n0,
				others: vec![(n3, Some(single(1, 7)))],
			},
			NodeClass::singleton(n1),
			NodeClass::singleton(n2),
		];
		let folded =
			fold_near_matches(&local, &[near(n0, n1, single(1, 2)), near(n1, n2, single(2, 3))]);
		assert_eq!(folded.len(), 1);
		assert_eq!(folded[0].members().collect::<Vec<_>>(), vec![n0, n3, n1, n2]);
		assert_eq!(folded[0].others[2].1, Some(single(1, 3)));
	}

	#[test]
	fn test_depth_names_round_trip() {
		for depth in EquivalenceDepth::ALL {
			assert_eq!(depth.name().parse::<EquivalenceDepth>().unwrap(), depth);
		}
		assert!("deep".parse::<EquivalenceDepth>().is_err());
	}
}
