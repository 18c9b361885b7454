// Copyright 2025 Irreducible Inc.
//! JSON reports of clusterings and equivalence checks.

use std::{
	collections::BTreeMap,
	fs,
	io::{BufWriter, Write},
	path::{Path, PathBuf},
	time::Duration,
};

use arckit_core::Signal;
use arckit_equivalence::{Comparison, Mapping, MaximalMatch, Outcome, Phase};
use arckit_structural::{Clustering, Dag, NearMatch, NodeClass, NodeId};
use cranelift_entity::EntityRef;
use serde::Serialize;

use crate::error::WriteError;

/// A signal and constraint mapping as written to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingRecord {
	pub coni: BTreeMap<usize, usize>,
	pub sig: BTreeMap<Signal, Signal>,
}

impl From<&Mapping> for MappingRecord {
	fn from(mapping: &Mapping) -> Self {
		Self {
			coni: mapping.constraints.clone(),
			sig: mapping.signals.clone(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
	pub node_id: usize,
	pub constraints: Vec<usize>,
	pub input_signals: Vec<Signal>,
	pub output_signals: Vec<Signal>,
	pub successors: Vec<usize>,
	pub signals: Vec<Signal>,
}

impl NodeRecord {
	pub fn new(dag: &Dag, id: NodeId) -> Self {
		let node = dag.node(id);
		Self {
			node_id: id.index(),
			constraints: node.constraints().to_vec(),
			input_signals: node.input_signals().iter().copied().collect(),
			output_signals: node.output_signals().iter().copied().collect(),
			successors: dag.successors(id).iter().map(|id| id.index()).collect(),
			signals: node.signals().iter().copied().collect(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearMatchRecord {
	pub left: usize,
	pub right: usize,
	pub matched: usize,
	pub total: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mapping: Option<MappingRecord>,
}

/// The equivalence half of a clustering report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassReport {
	pub equivalency_local: Vec<Vec<usize>>,
	pub equivalency_structural: Vec<Vec<usize>>,
	/// Per class, the mapping from the representative onto each further member, in member order.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub equiv_mapping_local: Option<Vec<Vec<Option<MappingRecord>>>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub equiv_mapping_structural: Option<Vec<Vec<Option<MappingRecord>>>>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub maximal_equivalence: Vec<NearMatchRecord>,
}

fn members(classes: &[NodeClass]) -> Vec<Vec<usize>> {
	classes
		.iter()
		.map(|class| class.members().map(|id| id.index()).collect())
		.collect()
}

fn mappings(classes: &[NodeClass]) -> Vec<Vec<Option<MappingRecord>>> {
	classes
		.iter()
		.map(|class| {
			class
				.others
				.iter()
				.map(|(_, mapping)| mapping.as_ref().map(MappingRecord::from))
				.collect()
		})
		.collect()
}

fn near_match(near: &NearMatch, include_mappings: bool) -> NearMatchRecord {
	NearMatchRecord {
		left: near.left.index(),
		right: near.right.index(),
		matched: near.matched,
		total: near.total,
		mapping: include_mappings.then(|| MappingRecord::from(&near.mapping)),
	}
}

fn seconds<K: Ord>(timing: impl IntoIterator<Item = (K, Duration)>) -> BTreeMap<K, f64> {
	timing
		.into_iter()
		.map(|(key, elapsed)| (key, elapsed.as_secs_f64()))
		.collect()
}

/// Everything `arckit-cluster` writes about one circuit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
	pub nodes: Vec<NodeRecord>,
	#[serde(flatten)]
	pub classes: ClassReport,
	/// Seconds spent per stage.
	pub timing: BTreeMap<&'static str, f64>,
	pub seed: u64,
}

impl ClusterReport {
	pub fn new(clustering: &Clustering, include_mappings: bool) -> Self {
		let classes = &clustering.classes;
		Self {
			nodes: clustering
				.dag
				.node_ids()
				.map(|id| NodeRecord::new(&clustering.dag, id))
				.collect(),
			classes: ClassReport {
				equivalency_local: members(&classes.local),
				equivalency_structural: members(&classes.structural),
				equiv_mapping_local: include_mappings.then(|| mappings(&classes.local)),
				equiv_mapping_structural: include_mappings.then(|| mappings(&classes.structural)),
				maximal_equivalence: classes
					.near
					.iter()
					.map(|near| near_match(near, include_mappings))
					.collect(),
			},
			timing: seconds(
				clustering
					.timing
					.iter()
					.map(|(stage, elapsed)| (stage.name(), *elapsed)),
			),
			seed: clustering.seed,
		}
	}
}

#[derive(Serialize)]
struct NodesFile<'a> {
	nodes: &'a [NodeRecord],
	timing: &'a BTreeMap<&'static str, f64>,
	seed: u64,
}

/// Writes `value` as pretty JSON.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<(), WriteError> {
	let io_error = |source: std::io::Error| WriteError::Io {
		path: path.to_path_buf(),
		source,
	};
	let file = fs::File::create(path).map_err(io_error)?;
	let mut writer = BufWriter::new(file);
	serde_json::to_writer_pretty(&mut writer, value)?;
	writer.write_all(b"\n").map_err(io_error)?;
	writer.flush().map_err(io_error)
}

/// Writes the report under `dir` and returns the files written.
///
/// With `single` everything goes to `<stem>.json`; otherwise the nodes go to `<stem>_nodes.json`
/// and the classes to `<stem>_equivalence.json`.
pub fn write_cluster_report(
	report: &ClusterReport,
	dir: &Path,
	stem: &str,
	single: bool,
) -> Result<Vec<PathBuf>, WriteError> {
	fs::create_dir_all(dir).map_err(|source| WriteError::Io {
		path: dir.to_path_buf(),
		source,
	})?;
	if single {
		let path = dir.join(format!("{stem}.json"));
		write_json(&path, report)?;
		return Ok(vec![path]);
	}
	let nodes_path = dir.join(format!("{stem}_nodes.json"));
	write_json(
		&nodes_path,
		&NodesFile {
			nodes: &report.nodes,
			timing: &report.timing,
			seed: report.seed,
		},
	)?;
	let classes_path = dir.join(format!("{stem}_equivalence.json"));
	write_json(&classes_path, &report.classes)?;
	tracing::debug!(nodes = %nodes_path.display(), classes = %classes_path.display(), "wrote report");
	Ok(vec![nodes_path, classes_path])
}

/// The record `arckit-compare` writes for one pair of circuits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquivalenceRecord {
	pub result: &'static str,
	pub result_explanation: String,
	/// Seconds spent per phase.
	pub timing: BTreeMap<&'static str, f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub matched: Option<usize>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub total: Option<usize>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mapping: Option<MappingRecord>,
}

impl EquivalenceRecord {
	pub fn new(outcome: &Outcome, timing: &BTreeMap<Phase, Duration>) -> Self {
		Self {
			result: outcome.name(),
			result_explanation: outcome.explanation(),
			timing: seconds(timing.iter().map(|(phase, elapsed)| (phase.name(), *elapsed))),
			matched: None,
			total: None,
			mapping: outcome.mapping().map(MappingRecord::from),
		}
	}

	pub fn from_comparison(comparison: &Comparison) -> Self {
		Self::new(&comparison.outcome, &comparison.timing)
	}

	/// A record for a maximal equivalence search that met its tolerance.
	pub fn from_maximal(found: &MaximalMatch, elapsed: Duration) -> Self {
		Self {
			result: "equivalent",
			result_explanation: format!(
				"{} of {} constraints matched",
				found.matched, found.total
			),
			timing: BTreeMap::from([(Phase::MaximalEquivalence.name(), elapsed.as_secs_f64())]),
			matched: Some(found.matched),
			total: Some(found.total),
			mapping: Some(MappingRecord::from(&found.mapping)),
		}
	}
}
