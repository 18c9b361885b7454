// Copyright 2025 Irreducible Inc.
//! Reader for ACIR arithmetic opcodes exported as JSON.
//!
//! ACIR witnesses are numbered from 0, so witness `w` becomes signal `w + 1` and signal 0 stays
//! the constant.

use std::{fs, path::Path};

use arckit_core::{AcirConstraint, Circuit, CircuitBuilder, Dialect, PrimeField, Signal};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Num;
use serde::Deserialize;

use crate::error::ReadError;

/// A coefficient written as a JSON integer or as a decimal or `0x` hex string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Coefficient {
	Signed(i64),
	Unsigned(u64),
	Text(String),
}

impl Default for Coefficient {
	fn default() -> Self {
		Coefficient::Signed(0)
	}
}

impl Coefficient {
	pub fn to_bigint(&self) -> Result<BigInt, ReadError> {
		match self {
			Coefficient::Signed(value) => Ok(BigInt::from(*value)),
			Coefficient::Unsigned(value) => Ok(BigInt::from(*value)),
			Coefficient::Text(text) => parse_integer(text),
		}
	}

	/// The coefficient reduced into `field`, negative values wrapping around the modulus.
	pub fn reduce(&self, field: &PrimeField) -> Result<BigUint, ReadError> {
		let value = self.to_bigint()?;
		let modulus = BigInt::from_biguint(Sign::Plus, field.modulus().clone());
		let reduced = ((value % &modulus) + &modulus) % &modulus;
		reduced
			.to_biguint()
			.ok_or_else(|| ReadError::InvalidCoefficient(self.to_string()))
	}
}

impl std::fmt::Display for Coefficient {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Coefficient::Signed(value) => write!(f, "{value}"),
			Coefficient::Unsigned(value) => write!(f, "{value}"),
			Coefficient::Text(text) => f.write_str(text),
		}
	}
}

fn parse_integer(text: &str) -> Result<BigInt, ReadError> {
	let invalid = || ReadError::InvalidCoefficient(text.to_string());
	let trimmed = text.trim();
	let (negative, digits) = match trimmed.strip_prefix('-') {
		Some(rest) => (true, rest.trim_start()),
		None => (false, trimmed),
	};
	let (digits, radix) = match digits
		.strip_prefix("0x")
		.or_else(|| digits.strip_prefix("0X"))
	{
		Some(hex) => (hex, 16),
		None => (digits, 10),
	};
	if digits.is_empty() || digits.starts_with(['+', '-']) {
		return Err(invalid());
	}
	let magnitude = BigInt::from_str_radix(digits, radix).map_err(|_| invalid())?;
	Ok(if negative { -magnitude } else { magnitude })
}

#[derive(Debug, Deserialize)]
struct MulTerm {
	witness1: usize,
	witness2: usize,
	coeff: Coefficient,
}

#[derive(Debug, Deserialize)]
struct LinearTerm {
	witness: usize,
	coeff: Coefficient,
}

#[derive(Debug, Deserialize)]
struct Opcode {
	#[serde(default)]
	mul: Vec<MulTerm>,
	#[serde(default)]
	linear: Vec<LinearTerm>,
	#[serde(default)]
	constant: Coefficient,
}

#[derive(Debug, Deserialize)]
struct AcirFile {
	#[serde(default)]
	prime: Option<Coefficient>,
	number_of_signals: usize,
	#[serde(default)]
	inputs: Vec<usize>,
	#[serde(default)]
	outputs: Vec<usize>,
	#[serde(default)]
	constraints: Vec<Opcode>,
}

fn signal(witness: usize) -> Signal {
	witness + 1
}

fn read_field(prime: Option<&Coefficient>) -> Result<PrimeField, ReadError> {
	let Some(prime) = prime else {
		return Ok(PrimeField::bn254());
	};
	prime
		.to_bigint()?
		.to_biguint()
		.and_then(PrimeField::try_new)
		.ok_or_else(|| ReadError::InvalidPrime(prime.to_string()))
}

fn read_opcode(field: &PrimeField, opcode: &Opcode) -> Result<AcirConstraint, ReadError> {
	let mult = opcode
		.mul
		.iter()
		.map(|term| {
			let key = (signal(term.witness1), signal(term.witness2));
			Ok((key, term.coeff.reduce(field)?))
		})
		.collect::<Result<Vec<_>, ReadError>>()?;
	let linear = opcode
		.linear
		.iter()
		.map(|term| Ok((signal(term.witness), term.coeff.reduce(field)?)))
		.collect::<Result<Vec<_>, ReadError>>()?;
	Ok(AcirConstraint::new(field, mult, linear, opcode.constant.reduce(field)?))
}

/// Parses an ACIR circuit from its JSON text. A missing `prime` means the BN254 scalar field.
pub fn read_acir_json(text: &str) -> Result<Circuit, ReadError> {
	let _span = tracing::debug_span!("read_acir_json", n_bytes = text.len()).entered();
	let file: AcirFile = serde_json::from_str(text)?;
	let field = read_field(file.prime.as_ref())?;
	let constraints = file
		.constraints
		.iter()
		.map(|opcode| read_opcode(&field, opcode))
		.collect::<Result<Vec<_>, _>>()?;
	let circuit = CircuitBuilder::new(field, Dialect::Acir)
		.n_signals(file.number_of_signals + 1)
		.inputs(file.inputs.iter().copied().map(signal))
		.outputs(file.outputs.iter().copied().map(signal))
		.constraints(constraints)
		.build()?;
	tracing::debug!(
		n_signals = circuit.n_signals(),
		n_constraints = circuit.n_constraints(),
		"read acir"
	);
	Ok(circuit)
}

pub fn read_acir_file(path: impl AsRef<Path>) -> Result<Circuit, ReadError> {
	let path = path.as_ref();
	let text = fs::read_to_string(path).map_err(|source| ReadError::Io {
		path: path.to_path_buf(),
		source,
	})?;
	read_acir_json(&text)
}
