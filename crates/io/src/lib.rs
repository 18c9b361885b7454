// Copyright 2025 Irreducible Inc.
//! Reading circuits from `.r1cs` and ACIR JSON files and writing JSON reports.

pub mod acir;
pub mod error;
pub mod r1cs;
pub mod report;

use std::path::Path;

pub use acir::{read_acir_file, read_acir_json};
use arckit_core::{Circuit, Dialect};
pub use error::{ReadError, WriteError};
pub use r1cs::{read_r1cs, read_r1cs_file};
pub use report::{
	ClassReport, ClusterReport, EquivalenceRecord, MappingRecord, NodeRecord, write_cluster_report,
	write_json,
};

/// Reads a circuit of the given dialect from `path`.
pub fn read_circuit(path: impl AsRef<Path>, dialect: Dialect) -> Result<Circuit, ReadError> {
	match dialect {
		Dialect::R1cs => read_r1cs_file(path),
		Dialect::Acir => read_acir_file(path),
	}
}
