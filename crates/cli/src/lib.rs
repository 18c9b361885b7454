// Copyright 2025 Irreducible Inc.
//! Pieces shared by the `arckit-compare` and `arckit-cluster` binaries.

use std::{path::Path, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use arckit_core::{Circuit, Dialect};
use clap::{Args, Parser};

/// Exit code for malformed input and internal failures.
pub const EXIT_ERROR: u8 = 3;

/// Input dialect flags. Without either, `.json` files are read as ACIR and anything else as R1CS.
#[derive(Debug, Clone, Copy, Default, Args)]
#[group(multiple = false)]
pub struct DialectArgs {
	/// Read circom `.r1cs` files
	#[arg(long)]
	pub r1cs: bool,

	/// Read ACIR JSON files
	#[arg(long)]
	pub acir: bool,
}

impl DialectArgs {
	pub fn dialect(&self, path: &Path) -> Dialect {
		if self.acir {
			Dialect::Acir
		} else if self.r1cs {
			Dialect::R1cs
		} else if path.extension().is_some_and(|ext| ext == "json") {
			Dialect::Acir
		} else {
			Dialect::R1cs
		}
	}
}

pub fn load_circuit(path: &Path, dialects: &DialectArgs) -> Result<Circuit> {
	let dialect = dialects.dialect(path);
	let circuit = arckit_io::read_circuit(path, dialect)
		.with_context(|| format!("Failed to read {dialect} circuit from {}", path.display()))?;
	tracing::info!(
		path = %path.display(),
		n_signals = circuit.n_signals(),
		n_constraints = circuit.n_constraints(),
		"loaded circuit"
	);
	Ok(circuit)
}

/// Parses a non-negative number of seconds.
pub fn parse_seconds(s: &str) -> Result<Duration, String> {
	let seconds = s
		.parse::<f64>()
		.map_err(|err| format!("invalid number of seconds: {err}"))?;
	Duration::try_from_secs_f64(seconds).map_err(|err| format!("invalid number of seconds: {err}"))
}

/// Parses a fraction in `[0, 1]`.
pub fn parse_fraction(s: &str) -> Result<f64, String> {
	let value = s
		.parse::<f64>()
		.map_err(|err| format!("invalid fraction: {err}"))?;
	if (0.0..=1.0).contains(&value) {
		Ok(value)
	} else {
		Err(format!("{value} is not between 0 and 1"))
	}
}

/// Parses the command line, keeping argument errors on the error exit code.
pub fn parse_args<A: Parser>() -> Result<A, ExitCode> {
	A::try_parse().map_err(|err| {
		let _ = err.print();
		if err.use_stderr() {
			ExitCode::from(EXIT_ERROR)
		} else {
			ExitCode::SUCCESS
		}
	})
}

/// Maps the result of a run onto the process exit code, printing the error chain on failure.
pub fn exit_code(result: Result<u8>) -> ExitCode {
	match result {
		Ok(code) => ExitCode::from(code),
		Err(err) => {
			tracing::error!("{err:#}");
			eprintln!("Error: {err:?}");
			ExitCode::from(EXIT_ERROR)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_dialect_selection() {
		let auto = DialectArgs::default();
		assert_eq!(auto.dialect(Path::new("a/b.r1cs")), Dialect::R1cs);
		assert_eq!(auto.dialect(Path::new("a/b.json")), Dialect::Acir);
		let acir = DialectArgs {
			acir: true,
			..DialectArgs::default()
		};
		assert_eq!(acir.dialect(Path::new("b.r1cs")), Dialect::Acir);
		let r1cs = DialectArgs {
			r1cs: true,
			..DialectArgs::default()
		};
		assert_eq!(r1cs.dialect(Path::new("b.json")), Dialect::R1cs);
	}

	#[test]
	fn test_value_parsers() {
		assert_eq!(parse_seconds("1.5"), Ok(Duration::from_millis(1500)));
		assert!(parse_seconds("-1").is_err());
		assert!(parse_seconds("soon").is_err());
		assert_eq!(parse_fraction("0.8"), Ok(0.8));
		assert!(parse_fraction("1.2").is_err());
	}
}
