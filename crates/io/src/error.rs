// Copyright 2025 Irreducible Inc.
use std::path::PathBuf;

use arckit_core::CircuitError;
use arckit_utils::SerializationError;

/// A circuit file could not be turned into a [`arckit_core::Circuit`].
#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error(transparent)]
	Serialization(#[from] SerializationError),
	#[error(transparent)]
	Circuit(#[from] CircuitError),
	#[error("r1cs section {section_type} appears twice")]
	DuplicateSection { section_type: u32 },
	#[error("r1cs {name} section is missing")]
	MissingSection { name: &'static str },
	#[error("r1cs {name} section has {remaining} trailing bytes")]
	TrailingBytes { name: &'static str, remaining: usize },
	#[error("field element size {0} is not a positive multiple of 8")]
	InvalidFieldSize(u32),
	#[error("{0} is not a field modulus")]
	InvalidPrime(String),
	#[error("cannot parse coefficient {0:?}")]
	InvalidCoefficient(String),
}

/// A report could not be written.
#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
	#[error("failed to write {path}: {source}")]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error(transparent)]
	Json(#[from] serde_json::Error),
}
