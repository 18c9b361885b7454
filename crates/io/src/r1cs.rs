// Copyright 2025 Irreducible Inc.
//! Reader for the binary `.r1cs` format written by circom.
//!
//! The file is the magic `r1cs`, a `u32` version, a `u32` section count and the sections, each a
//! `u32` type and a `u64` byte length followed by the body. Sections may come in any order; only
//! the header and the constraints are read.

use std::{collections::BTreeMap, fs, path::Path};

use arckit_core::{Circuit, CircuitBuilder, Dialect, LinearCombination, PrimeField, R1csConstraint};
use arckit_utils::{
	DeserializeBytes, SerializationError,
	serialization::{assert_enough_data_for, deserialize_biguint_le, deserialize_len, expect_magic},
};
use bytes::{Buf, Bytes};

use crate::error::ReadError;

pub const MAGIC: [u8; 4] = *b"r1cs";
pub const VERSION: u32 = 1;

pub const HEADER_SECTION: u32 = 1;
pub const CONSTRAINTS_SECTION: u32 = 2;

/// Three empty linear combinations, one term count each.
const MIN_CONSTRAINT_SIZE: usize = 3 * std::mem::size_of::<u32>();

#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
	field_size: usize,
	field: PrimeField,
	n_wires: usize,
	n_pub_out: usize,
	n_pub_in: usize,
	n_prv_in: usize,
	n_constraints: usize,
}

impl Header {
	fn read(mut buf: impl Buf) -> Result<Self, ReadError> {
		let field_size = u32::deserialize(&mut buf)?;
		if field_size == 0 || field_size % 8 != 0 {
			return Err(ReadError::InvalidFieldSize(field_size));
		}
		let field_size = field_size as usize;
		let prime = deserialize_biguint_le(&mut buf, field_size)?;
		let field = PrimeField::try_new(prime.clone())
			.ok_or_else(|| ReadError::InvalidPrime(prime.to_string()))?;
		let n_wires = u32::deserialize(&mut buf)? as usize;
		let n_pub_out = u32::deserialize(&mut buf)? as usize;
		let n_pub_in = u32::deserialize(&mut buf)? as usize;
		let n_prv_in = u32::deserialize(&mut buf)? as usize;
		let _n_labels = u64::deserialize(&mut buf)?;
		let n_constraints = u32::deserialize(&mut buf)? as usize;
		Ok(Self {
			field_size,
			field,
			n_wires,
			n_pub_out,
			n_pub_in,
			n_prv_in,
			n_constraints,
		})
	}
}

fn read_linear_combination(
	mut buf: impl Buf,
	field: &PrimeField,
	field_size: usize,
) -> Result<LinearCombination, ReadError> {
	let n_terms = u32::deserialize(&mut buf)?;
	let mut lc = LinearCombination::new();
	for _ in 0..n_terms {
		let wire = u32::deserialize(&mut buf)? as usize;
		let value = field.element(deserialize_biguint_le(&mut buf, field_size)?);
		let entry = lc.entry(wire).or_default();
		*entry = field.add(entry, &value);
	}
	Ok(lc)
}

fn ensure_consumed(buf: &Bytes, name: &'static str) -> Result<(), ReadError> {
	if buf.has_remaining() {
		return Err(ReadError::TrailingBytes {
			name,
			remaining: buf.remaining(),
		});
	}
	Ok(())
}

/// Reads a circuit from the bytes of an `.r1cs` file.
///
/// Wire 0 is the constant, outputs are wires `1..=n_pub_out` and inputs are the public then the
/// private inputs that follow them.
pub fn read_r1cs(mut buf: impl Buf) -> Result<Circuit, ReadError> {
	let _span = tracing::debug_span!("read_r1cs", n_bytes = buf.remaining()).entered();

	expect_magic(&mut buf, MAGIC)?;
	let version = u32::deserialize(&mut buf)?;
	if version != VERSION {
		return Err(SerializationError::UnsupportedVersion {
			name: "r1cs",
			version,
		}
		.into());
	}

	let n_sections = u32::deserialize(&mut buf)?;
	let mut sections = BTreeMap::<u32, Bytes>::new();
	for _ in 0..n_sections {
		let section_type = u32::deserialize(&mut buf)?;
		let size = deserialize_len(&mut buf)?;
		assert_enough_data_for(&buf, size)?;
		let body = buf.copy_to_bytes(size);
		if sections.insert(section_type, body).is_some() {
			return Err(ReadError::DuplicateSection { section_type });
		}
	}

	let mut header_bytes = sections
		.remove(&HEADER_SECTION)
		.ok_or(ReadError::MissingSection { name: "header" })?;
	let header = Header::read(&mut header_bytes)?;
	ensure_consumed(&header_bytes, "header")?;

	let mut constraint_bytes = sections
		.remove(&CONSTRAINTS_SECTION)
		.ok_or(ReadError::MissingSection {
			name: "constraints",
		})?;
	for section_type in sections.keys() {
		tracing::debug!(section_type, "skipping r1cs section");
	}

	let field = header.field;
	// the count is untrusted, the section length bounds it
	let capacity = header
		.n_constraints
		.min(constraint_bytes.remaining() / MIN_CONSTRAINT_SIZE);
	let mut constraints = Vec::with_capacity(capacity);
	for _ in 0..header.n_constraints {
		let a = read_linear_combination(&mut constraint_bytes, &field, header.field_size)?;
		let b = read_linear_combination(&mut constraint_bytes, &field, header.field_size)?;
		let c = read_linear_combination(&mut constraint_bytes, &field, header.field_size)?;
		constraints.push(R1csConstraint::new(a, b, c));
	}
	ensure_consumed(&constraint_bytes, "constraints")?;

	let first_input = header.n_pub_out + 1;
	let circuit = CircuitBuilder::new(field, Dialect::R1cs)
		.n_signals(header.n_wires)
		.outputs(1..first_input)
		.inputs(first_input..first_input + header.n_pub_in + header.n_prv_in)
		.constraints(constraints)
		.build()?;
	tracing::debug!(
		n_signals = circuit.n_signals(),
		n_constraints = circuit.n_constraints(),
		"read r1cs"
	);
	Ok(circuit)
}

pub fn read_r1cs_file(path: impl AsRef<Path>) -> Result<Circuit, ReadError> {
	let path = path.as_ref();
	let bytes = fs::read(path).map_err(|source| ReadError::Io {
		path: path.to_path_buf(),
		source,
	})?;
	read_r1cs(bytes.as_slice())
}

#[cfg(test)]
mod tests {
	use arckit_core::{CircuitError, Constraint};
	use arckit_utils::{SerializeBytes, serialization::serialize_biguint_le};
	use num_bigint::BigUint;

	use super::*;

	type Terms = Vec<(u32, BigUint)>;

	/// Encodes a circuit in the circom layout over the BN254 scalar field.
	struct R1csFile {
		n_wires: u32,
		n_pub_out: u32,
		n_pub_in: u32,
		n_prv_in: u32,
		constraints: Vec<[Terms; 3]>,
		prime: BigUint,
		/// Constraint count written to the header, when it should lie.
		declared_constraints: Option<u32>,
		/// Extra raw sections appended after the required ones.
		extra_sections: Vec<(u32, Vec<u8>)>,
		constraints_first: bool,
	}

	impl R1csFile {
		fn new(n_wires: u32, n_pub_out: u32, n_pub_in: u32, n_prv_in: u32) -> Self {
			Self {
				n_wires,
				n_pub_out,
				n_pub_in,
				n_prv_in,
				constraints: Vec::new(),
				prime: PrimeField::bn254().modulus().clone(),
				declared_constraints: None,
				extra_sections: Vec::new(),
				constraints_first: false,
			}
		}

		fn constraint(mut self, a: &[(u32, i64)], b: &[(u32, i64)], c: &[(u32, i64)]) -> Self {
			let f = PrimeField::bn254();
			let terms = |lc: &[(u32, i64)]| -> Terms {
				lc.iter()
					.map(|&(wire, value)| (wire, f.from_i64(value)))
					.collect()
			};
			self.constraints.push([terms(a), terms(b), terms(c)]);
			self
		}

		fn encode(&self) -> Vec<u8> {
			let mut header = Vec::new();
			32u32.serialize(&mut header).unwrap();
			serialize_biguint_le(&self.prime, 32, &mut header).unwrap();
			for count in [self.n_wires, self.n_pub_out, self.n_pub_in, self.n_prv_in] {
				count.serialize(&mut header).unwrap();
			}
			u64::from(self.n_wires).serialize(&mut header).unwrap();
			self.declared_constraints
				.unwrap_or(self.constraints.len() as u32)
				.serialize(&mut header)
				.unwrap();

			let mut body = Vec::new();
			for lcs in &self.constraints {
				for lc in lcs {
					(lc.len() as u32).serialize(&mut body).unwrap();
					for (wire, value) in lc {
						wire.serialize(&mut body).unwrap();
						serialize_biguint_le(value, 32, &mut body).unwrap();
					}
				}
			}

			let mut sections = vec![(HEADER_SECTION, header), (CONSTRAINTS_SECTION, body)];
			if self.constraints_first {
				sections.reverse();
			}
			sections.extend(self.extra_sections.iter().cloned());

			let mut out = Vec::new();
			MAGIC.serialize(&mut out).unwrap();
			VERSION.serialize(&mut out).unwrap();
			(sections.len() as u32).serialize(&mut out).unwrap();
			for (section_type, content) in sections {
				section_type.serialize(&mut out).unwrap();
				(content.len() as u64).serialize(&mut out).unwrap();
				out.extend_from_slice(&content);
			}
			out
		}
	}

	/// `out = x * y`, `x + 2 * y - 1 = w` over wires `[1, out, x, y, w]`.
	fn product_file() -> R1csFile {
		R1csFile::new(5, 1, 1, 1)
			.constraint(&[(2, 1)], &[(3, 1)], &[(1, 1)])
			.constraint(&[], &[], &[(2, 1), (3, 2), (0, -1), (4, -1)])
	}

	#[test]
	fn test_read_product() {
		let circuit = read_r1cs(product_file().encode().as_slice()).unwrap();
		let f = PrimeField::bn254();
		assert_eq!(circuit.field(), &f);
		assert_eq!(circuit.dialect(), Dialect::R1cs);
		assert_eq!(circuit.n_signals(), 5);
		assert_eq!(circuit.outputs().iter().copied().collect::<Vec<_>>(), vec![1]);
		assert_eq!(circuit.inputs().iter().copied().collect::<Vec<_>>(), vec![2, 3]);
		assert_eq!(
			circuit.constraint(0),
			&Constraint::from(R1csConstraint::from_i64(&f, &[(2, 1)], &[(3, 1)], &[(1, 1)]))
		);
		assert_eq!(
			circuit.constraint(1),
			&Constraint::from(R1csConstraint::from_i64(
				&f,
				&[],
				&[],
				&[(0, -1), (2, 1), (3, 2), (4, -1)]
			))
		);
	}

	#[test]
	fn test_section_order_and_unknown_sections() {
		let mut file = product_file();
		file.constraints_first = true;
		file.extra_sections.push((3, vec![0; 40]));
		let reordered = read_r1cs(file.encode().as_slice()).unwrap();
		let plain = read_r1cs(product_file().encode().as_slice()).unwrap();
		assert_eq!(reordered, plain);
	}

	#[test]
	fn test_repeated_wires_accumulate() {
		let file = R1csFile::new(3, 1, 0, 0).constraint(&[], &[], &[(1, 2), (2, 3), (1, -2)]);
		let circuit = read_r1cs(file.encode().as_slice()).unwrap();
		let f = PrimeField::bn254();
		assert_eq!(
			circuit.constraint(0),
			&Constraint::from(R1csConstraint::from_i64(&f, &[], &[], &[(2, 3)]))
		);
	}

	#[test]
	fn test_malformed_files() {
		let mut bytes = product_file().encode();
		bytes[0] = b'x';
		assert!(matches!(
			read_r1cs(bytes.as_slice()),
			Err(ReadError::Serialization(SerializationError::InvalidMagic { .. }))
		));

		let bytes = product_file().encode();
		assert!(matches!(
			read_r1cs(&bytes[..bytes.len() - 3]),
			Err(ReadError::Serialization(SerializationError::NotEnoughBytes))
		));

		let mut bytes = product_file().encode();
		bytes[4] = 2;
		assert!(matches!(
			read_r1cs(bytes.as_slice()),
			Err(ReadError::Serialization(SerializationError::UnsupportedVersion {
				version: 2,
				..
			}))
		));

		let mut file = product_file();
		file.extra_sections.push((HEADER_SECTION, Vec::new()));
		assert!(matches!(
			read_r1cs(file.encode().as_slice()),
			Err(ReadError::DuplicateSection { section_type: 1 })
		));

		let out_of_range = R1csFile::new(3, 1, 0, 0).constraint(&[], &[], &[(1, 1), (7, 1)]);
		assert!(matches!(
			read_r1cs(out_of_range.encode().as_slice()),
			Err(ReadError::Circuit(CircuitError::OutOfRangeSignal { signal: 7, .. }))
		));
	}

	#[test]
	fn test_composite_prime_is_rejected() {
		for prime in [0u32, 1, 4, 561] {
			let mut file = product_file();
			file.prime = BigUint::from(prime);
			assert!(
				matches!(read_r1cs(file.encode().as_slice()), Err(ReadError::InvalidPrime(_))),
				"{prime} accepted"
			);
		}
	}

	#[test]
	fn test_huge_constraint_count_with_short_body() {
		let mut file = product_file();
		file.declared_constraints = Some(u32::MAX);
		assert!(matches!(
			read_r1cs(file.encode().as_slice()),
			Err(ReadError::Serialization(SerializationError::NotEnoughBytes))
		));

		let mut file = R1csFile::new(2, 1, 0, 0);
		file.declared_constraints = Some(u32::MAX);
		assert!(matches!(
			read_r1cs(file.encode().as_slice()),
			Err(ReadError::Serialization(SerializationError::NotEnoughBytes))
		));
	}

	#[test]
	fn test_read_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("product.r1cs");
		fs::write(&path, product_file().encode()).unwrap();
		assert_eq!(read_r1cs_file(&path).unwrap().n_constraints(), 2);
		assert!(matches!(
			read_r1cs_file(dir.path().join("missing.r1cs")),
			Err(ReadError::Io { .. })
		));
	}
}
