// Copyright 2025 Irreducible Inc.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
	Left,
	Right,
}

impl Side {
	pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

	pub fn index(self) -> usize {
		match self {
			Side::Left => 0,
			Side::Right => 1,
		}
	}

	pub fn other(self) -> Side {
		match self {
			Side::Left => Side::Right,
			Side::Right => Side::Left,
		}
	}
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Side::Left => f.write_str("left"),
			Side::Right => f.write_str("right"),
		}
	}
}
