// Copyright 2025 Irreducible Inc.
//! Circuit-level constants.

use crate::constraint::Signal;

/// The signal that always carries the value one.
///
/// Every dialect reserves index 0 for it; it never appears among the declared inputs or outputs.
pub const CONSTANT_SIGNAL: Signal = 0;

/// Decimal representation of the BN254 scalar field modulus.
pub const BN254_SCALAR_MODULUS: &str =
	"21888242871839275222246405745257275088548364400416034343698204186575808495617";
