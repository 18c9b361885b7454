// Copyright 2025 Irreducible Inc.
//! Arithmetic modulo a prime.
//!
//! Field elements are plain [`BigUint`] values in `[0, p)`. The [`PrimeField`] carries the modulus
//! and performs the reductions, so elements of different fields are never mixed implicitly.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_integer::{ExtendedGcd, Integer};
use num_traits::{One, Zero};

use crate::consts::BN254_SCALAR_MODULUS;

/// A prime field `GF(p)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrimeField {
	modulus: BigUint,
}

/// Miller-Rabin bases; together they are deterministic below `3.3 * 10^24` and leave a
/// composite through with probability at most `4^-20` above that.
const WITNESSES: [u32; 20] = [
	2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
];

/// Whether `n` is prime, by trial division for small `n` and Miller-Rabin otherwise.
pub fn is_prime(n: &BigUint) -> bool {
	let two = BigUint::from(2u32);
	if *n < two {
		return false;
	}
	for &witness in &WITNESSES {
		let witness = BigUint::from(witness);
		if *n == witness {
			return true;
		}
		if (n % &witness).is_zero() {
			return false;
		}
	}
	let n_minus_one = n - 1u32;
	let rounds = n_minus_one.trailing_zeros().unwrap_or(0);
	let odd = &n_minus_one >> rounds;
	'witness: for witness in WITNESSES {
		let mut x = BigUint::from(witness).modpow(&odd, n);
		if x.is_one() || x == n_minus_one {
			continue;
		}
		for _ in 1..rounds {
			x = x.modpow(&two, n);
			if x == n_minus_one {
				continue 'witness;
			}
		}
		return false;
	}
	true
}

impl PrimeField {
	/// Creates the field with the given modulus.
	///
	/// # Panics
	/// Panics if the modulus is not prime.
	pub fn new(modulus: BigUint) -> Self {
		assert!(is_prime(&modulus), "field modulus must be prime");
		Self { modulus }
	}

	/// Creates the field, or `None` when the modulus is not prime.
	pub fn try_new(modulus: BigUint) -> Option<Self> {
		is_prime(&modulus).then_some(Self { modulus })
	}

	/// The scalar field of the BN254 curve, the default field of circom circuits.
	pub fn bn254() -> Self {
		Self::new(
			BN254_SCALAR_MODULUS
				.parse()
				.expect("BN254_SCALAR_MODULUS is a valid decimal literal"),
		)
	}

	pub fn modulus(&self) -> &BigUint {
		&self.modulus
	}

	/// Reduces an arbitrary unsigned integer into the field.
	pub fn element(&self, value: impl Into<BigUint>) -> BigUint {
		value.into() % &self.modulus
	}

	/// Maps a signed integer into the field, negative values wrapping around `p`.
	pub fn from_i64(&self, value: i64) -> BigUint {
		let magnitude = self.element(value.unsigned_abs());
		if value < 0 {
			self.neg(&magnitude)
		} else {
			magnitude
		}
	}

	pub fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
		(a + b) % &self.modulus
	}

	pub fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
		(a + &self.modulus - (b % &self.modulus)) % &self.modulus
	}

	pub fn neg(&self, a: &BigUint) -> BigUint {
		let a = a % &self.modulus;
		if a.is_zero() { a } else { &self.modulus - a }
	}

	pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
		(a * b) % &self.modulus
	}

	/// Multiplicative inverse through the extended Euclidean algorithm, `None` for zero.
	pub fn inv(&self, a: &BigUint) -> Option<BigUint> {
		let a = a % &self.modulus;
		if a.is_zero() {
			return None;
		}
		let modulus = BigInt::from(self.modulus.clone());
		let ExtendedGcd { gcd, x, .. } = BigInt::from(a).extended_gcd(&modulus);
		if !gcd.is_one() {
			return None;
		}
		let (_, magnitude) = x.mod_floor(&modulus).into_parts();
		Some(magnitude)
	}

	/// `a / b`, i.e. `a * inv(b)`, `None` when `b` is zero.
	pub fn div(&self, a: &BigUint, b: &BigUint) -> Option<BigUint> {
		Some(self.mul(a, &self.inv(b)?))
	}

	pub fn sum<'a>(&self, values: impl IntoIterator<Item = &'a BigUint>) -> BigUint {
		values
			.into_iter()
			.fold(BigUint::zero(), |acc, value| self.add(&acc, value))
	}
}

impl Default for PrimeField {
	fn default() -> Self {
		Self::bn254()
	}
}

impl fmt::Display for PrimeField {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "GF({})", self.modulus)
	}
}
