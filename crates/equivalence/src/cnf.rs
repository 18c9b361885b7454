// Copyright 2025 Irreducible Inc.
//! Clause containers and their DIMACS text form.

use std::{
	fmt,
	fs::File,
	io::{self, BufWriter, Write},
	ops::Not,
	path::Path,
};

use crate::error::EquivalenceError;

/// A propositional variable. Variables are numbered from 1, as in DIMACS.
pub type Var = usize;

/// A signed literal in DIMACS convention: `v` or `-v`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lit(i64);

impl Lit {
	pub fn positive(var: Var) -> Self {
		assert!(var > 0, "variable 0 has no literal");
		Self(var as i64)
	}

	pub fn negative(var: Var) -> Self {
		!Self::positive(var)
	}

	/// # Panics
	///
	/// Panics if `value` is zero.
	pub fn from_dimacs(value: i64) -> Self {
		assert_ne!(value, 0, "0 terminates a DIMACS clause and is not a literal");
		Self(value)
	}

	pub fn var(self) -> Var {
		self.0.unsigned_abs() as Var
	}

	pub fn is_positive(self) -> bool {
		self.0 > 0
	}

	pub fn to_dimacs(self) -> i64 {
		self.0
	}
}

impl Not for Lit {
	type Output = Lit;

	fn not(self) -> Lit {
		Lit(-self.0)
	}
}

impl fmt::Debug for Lit {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl fmt::Display for Lit {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A formula in conjunctive normal form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cnf {
	n_vars: usize,
	clauses: Vec<Vec<Lit>>,
}

impl Cnf {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_clause(&mut self, clause: impl IntoIterator<Item = Lit>) {
		let clause = clause.into_iter().collect::<Vec<_>>();
		for lit in &clause {
			self.n_vars = self.n_vars.max(lit.var());
		}
		self.clauses.push(clause);
	}

	/// Largest variable mentioned by any clause.
	pub fn n_vars(&self) -> usize {
		self.n_vars
	}

	pub fn clauses(&self) -> &[Vec<Lit>] {
		&self.clauses
	}

	pub fn len(&self) -> usize {
		self.clauses.len()
	}

	pub fn is_empty(&self) -> bool {
		self.clauses.is_empty()
	}

	/// Writes the formula in DIMACS CNF.
	///
	/// Assumptions are appended as unit clauses so the file stands on its own.
	pub fn write_dimacs(&self, mut w: impl io::Write, assumptions: &[Lit]) -> io::Result<()> {
		let n_vars = assumptions
			.iter()
			.map(|lit| lit.var())
			.fold(self.n_vars, usize::max);
		writeln!(w, "p cnf {} {}", n_vars, self.clauses.len() + assumptions.len())?;
		for clause in &self.clauses {
			write_clause(&mut w, None, clause)?;
		}
		for &lit in assumptions {
			write_clause(&mut w, None, &[lit])?;
		}
		Ok(())
	}
}

/// A weighted formula: hard clauses that must hold and soft clauses to satisfy as many as possible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wcnf {
	pub hard: Cnf,
	pub soft: Vec<(Vec<Lit>, u64)>,
}

impl Wcnf {
	/// Weight that marks a clause as hard: one more than all soft weights together.
	pub fn top(&self) -> u64 {
		self.soft.iter().map(|(_, weight)| weight).sum::<u64>() + 1
	}

	pub fn n_vars(&self) -> usize {
		self.soft
			.iter()
			.flat_map(|(clause, _)| clause)
			.map(|lit| lit.var())
			.fold(self.hard.n_vars(), usize::max)
	}

	/// Writes the formula in the classic `p wcnf` DIMACS dialect.
	pub fn write_dimacs(&self, mut w: impl io::Write) -> io::Result<()> {
		let top = self.top();
		writeln!(
			w,
			"p wcnf {} {} {}",
			self.n_vars(),
			self.hard.len() + self.soft.len(),
			top
		)?;
		for clause in self.hard.clauses() {
			write_clause(&mut w, Some(top), clause)?;
		}
		for (clause, weight) in &self.soft {
			write_clause(&mut w, Some(*weight), clause)?;
		}
		Ok(())
	}
}

/// Creates `path` and writes a formula into it.
pub(crate) fn dump_to(
	path: &Path,
	write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> Result<(), EquivalenceError> {
	let _span = tracing::debug_span!("dump", path = %path.display()).entered();
	File::create(path)
		.map(BufWriter::new)
		.and_then(|mut w| {
			write(&mut w)?;
			w.flush()
		})
		.map_err(|source| EquivalenceError::Dump {
			path: path.to_path_buf(),
			source,
		})
}

fn write_clause(w: &mut impl io::Write, weight: Option<u64>, clause: &[Lit]) -> io::Result<()> {
	if let Some(weight) = weight {
		write!(w, "{weight} ")?;
	}
	for lit in clause {
		write!(w, "{lit} ")?;
	}
	writeln!(w, "0")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_literal_sign() {
		let lit = Lit::positive(7);
		assert!(lit.is_positive());
		assert_eq!((!lit).to_dimacs(), -7);
		assert_eq!((!lit).var(), 7);
		assert_eq!(Lit::negative(7), !lit);
		assert_eq!(Lit::from_dimacs(-3), Lit::negative(3));
	}

	#[test]
	fn test_cnf_dimacs_includes_assumptions() {
		let mut cnf = Cnf::new();
		cnf.add_clause([Lit::positive(1), Lit::negative(2)]);
		cnf.add_clause([Lit::positive(2)]);
		let mut out = Vec::new();
		cnf.write_dimacs(&mut out, &[Lit::negative(4)]).unwrap();
		assert_eq!(
			String::from_utf8(out).unwrap(),
			"p cnf 4 3\n1 -2 0\n2 0\n-4 0\n"
		);
	}

	#[test]
	fn test_wcnf_dimacs() {
		let mut hard = Cnf::new();
		hard.add_clause([Lit::positive(1), Lit::positive(2)]);
		let wcnf = Wcnf {
			hard,
			soft: vec![(vec![Lit::negative(1)], 1), (vec![Lit::negative(3)], 1)],
		};
		assert_eq!(wcnf.top(), 3);
		let mut out = Vec::new();
		wcnf.write_dimacs(&mut out).unwrap();
		assert_eq!(
			String::from_utf8(out).unwrap(),
			"p wcnf 3 3 3\n3 1 2 0\n1 -1 0\n1 -3 0\n"
		);
	}
}
