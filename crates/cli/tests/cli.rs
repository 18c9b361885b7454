// Copyright 2025 Irreducible Inc.
use std::{fs, path::Path, process::Command};

use serde_json::{Value, json};

fn compare_bin() -> Command {
	let mut command = Command::new(env!("CARGO_BIN_EXE_arckit-compare"));
	command.env_remove("ARCKIT_DUMP_CNF");
	command
}

fn cluster_bin() -> Command {
	let mut command = Command::new(env!("CARGO_BIN_EXE_arckit-cluster"));
	command.env_remove("ARCKIT_DUMP_CNF");
	command
}

fn read_json(path: &Path) -> Value {
	serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// `x^2 = y`, `2y - z + constant = 0` with input `x` and output `z`.
fn square(constant: i64) -> Value {
	json!({
		"prime": "101",
		"number_of_signals": 3,
		"inputs": [0],
		"outputs": [2],
		"constraints": [
			{
				"mul": [{"witness1": 0, "witness2": 0, "coeff": 1}],
				"linear": [{"witness": 1, "coeff": -1}]
			},
			{
				"linear": [{"witness": 1, "coeff": 2}, {"witness": 2, "coeff": -1}],
				"constant": constant
			}
		]
	})
}

/// [`square`] with the output and internal witnesses swapped, each constraint scaled and the
/// constraints reordered.
fn square_renamed() -> Value {
	json!({
		"prime": "0x65",
		"number_of_signals": 3,
		"inputs": [0],
		"outputs": [1],
		"constraints": [
			{
				"linear": [{"witness": 2, "coeff": 6}, {"witness": 1, "coeff": -3}],
				"constant": 9
			},
			{
				"mul": [{"witness1": 0, "witness2": 0, "coeff": "5"}],
				"linear": [{"witness": 2, "coeff": "-5"}]
			}
		]
	})
}

fn write_fixture(dir: &Path, name: &str, value: &Value) -> String {
	let path = dir.join(name);
	fs::write(&path, value.to_string()).unwrap();
	path.to_string_lossy().into_owned()
}

#[test]
fn test_compare_equivalent() {
	let dir = tempfile::tempdir().unwrap();
	let left = write_fixture(dir.path(), "left.json", &square(3));
	let right = write_fixture(dir.path(), "right.json", &square_renamed());
	let record = dir.path().join("record.json");

	let status = compare_bin()
		.args([left.as_str(), right.as_str(), "--sanity-check", "-o"])
		.arg(&record)
		.status()
		.unwrap();
	assert_eq!(status.code(), Some(0));
	let record = read_json(&record);
	assert_eq!(record["result"], "equivalent");
	assert_eq!(record["mapping"]["sig"], json!({"0": 0, "1": 1, "2": 3, "3": 2}));
	assert_eq!(record["mapping"]["coni"], json!({"0": 1, "1": 0}));
}

#[test]
fn test_compare_not_equivalent() {
	let dir = tempfile::tempdir().unwrap();
	let left = write_fixture(dir.path(), "left.json", &square(3));
	let right = write_fixture(dir.path(), "right.json", &square(4));
	let record = dir.path().join("record.json");

	let status = compare_bin()
		.args([left.as_str(), right.as_str(), "--acir", "-o"])
		.arg(&record)
		.status()
		.unwrap();
	assert_eq!(status.code(), Some(1));
	let record = read_json(&record);
	assert_eq!(record["result"], "not_equivalent");
	assert!(record.get("mapping").is_none());
}

#[test]
fn test_compare_errors() {
	let dir = tempfile::tempdir().unwrap();
	let left = write_fixture(dir.path(), "left.json", &square(3));
	let missing = dir.path().join("missing.json");

	let status = compare_bin().arg(&left).arg(&missing).status().unwrap();
	assert_eq!(status.code(), Some(3));

	let status = compare_bin()
		.args([left.as_str(), left.as_str(), "--policy", "cadical"])
		.status()
		.unwrap();
	assert_eq!(status.code(), Some(3));

	let status = compare_bin()
		.args([left.as_str(), left.as_str(), "--r1cs", "--acir"])
		.status()
		.unwrap();
	assert_eq!(status.code(), Some(3));

	let mut composite = square(3);
	composite["prime"] = json!("4");
	let composite = write_fixture(dir.path(), "composite.json", &composite);
	let status = compare_bin()
		.args(["--acir", composite.as_str(), composite.as_str()])
		.status()
		.unwrap();
	assert_eq!(status.code(), Some(3));
}

#[test]
fn test_compare_maximal() {
	let dir = tempfile::tempdir().unwrap();
	let left = write_fixture(dir.path(), "left.json", &square(3));
	let right = write_fixture(dir.path(), "right.json", &square_renamed());
	let record = dir.path().join("record.json");

	let status = compare_bin()
		.args([left.as_str(), right.as_str(), "--maximal-equivalence"])
		.args(["--maxequiv-tolerance", "1.0", "-o"])
		.arg(&record)
		.status()
		.unwrap();
	assert_eq!(status.code(), Some(0));
	let record = read_json(&record);
	assert_eq!(record["matched"], 2);
	assert_eq!(record["total"], 2);
}

/// Three nonlinear blocks chained by copies.
fn three_blocks() -> Value {
	let mut constraints = Vec::new();
	for k in 0..3 {
		let [a, b, d, e] = [0, 1, 2, 3].map(|w| w + 4 * k);
		for (x, y, z) in [(a, a, b), (b, a, d), (d, b, e)] {
			constraints.push(json!({
				"mul": [{"witness1": x, "witness2": y, "coeff": 1}],
				"linear": [{"witness": z, "coeff": -1}]
			}));
		}
		constraints.push(json!({
			"linear": [{"witness": e, "coeff": 1}, {"witness": e + 1, "coeff": -1}]
		}));
	}
	json!({
		"prime": "101",
		"number_of_signals": 13,
		"inputs": [0],
		"outputs": [12],
		"constraints": constraints
	})
}

#[test]
fn test_cluster_writes_reports() {
	let dir = tempfile::tempdir().unwrap();
	let input = write_fixture(dir.path(), "blocks.json", &three_blocks());
	let out = dir.path().join("out");

	let status = cluster_bin()
		.args([input.as_str(), "-c", "signal_equivalence", "-e", "local"])
		.args(["--include-mappings", "-o"])
		.arg(&out)
		.status()
		.unwrap();
	assert_eq!(status.code(), Some(0));

	let nodes = read_json(&out.join("blocks_nodes.json"));
	assert_eq!(nodes["nodes"].as_array().unwrap().len(), 6);
	assert_eq!(nodes["seed"], 0);
	let classes = read_json(&out.join("blocks_equivalence.json"));
	assert_eq!(classes["equivalency_local"], json!([[0, 2, 4], [1, 3, 5]]));
	assert_eq!(classes["equiv_mapping_local"].as_array().unwrap().len(), 2);

	let status = cluster_bin()
		.args([input.as_str(), "--single-json", "--stat", "-e", "none", "--seed", "5", "-o"])
		.arg(&out)
		.status()
		.unwrap();
	assert_eq!(status.code(), Some(0));
	let single = read_json(&out.join("blocks.json"));
	assert_eq!(single["seed"], 5);
	assert_eq!(single["equivalency_local"], json!([]));
	assert!(single.get("equiv_mapping_local").is_none());
}

#[test]
fn test_cluster_rejects_unknown_strategy() {
	let dir = tempfile::tempdir().unwrap();
	let input = write_fixture(dir.path(), "blocks.json", &three_blocks());
	let status = cluster_bin()
		.args([input.as_str(), "-c", "spectral"])
		.status()
		.unwrap();
	assert_eq!(status.code(), Some(3));
}
