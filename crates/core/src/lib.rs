// Copyright 2025 Irreducible Inc.
//! Core datatypes shared by the equivalence checker and the clustering pipeline.
//!
//! Most importantly it hosts the [`Constraint`] representation for R1CS and ACIR, their
//! normalization modulo a scalar factor, and the validated [`Circuit`].

pub mod circuit;
pub mod consts;
pub mod constraint;
pub mod error;
pub mod field;
pub mod fingerprint;
pub mod normalize;
pub mod stat;

pub use circuit::{Circuit, CircuitBuilder, Norm, SignalRole};
pub use consts::CONSTANT_SIGNAL;
pub use constraint::{
	AcirConstraint, Constraint, Dialect, LinearCombination, R1csConstraint, Signal,
};
pub use error::CircuitError;
pub use field::PrimeField;
pub use fingerprint::{ClassLabel, NormFingerprint, Round, SignalCharacteristic};
pub use stat::CircuitStat;
