// Copyright 2025 Irreducible Inc.
//! SAT backends.

use varisat::{ExtendFormula, Solver};

use crate::{
	cnf::{Cnf, Lit, Var},
	error::EquivalenceError,
};

/// A satisfying assignment. Variables the backend never saw are false.
#[derive(Debug, Clone, Default)]
pub struct Model {
	values: Vec<bool>,
}

impl Model {
	pub fn from_true_vars(vars: impl IntoIterator<Item = Var>) -> Self {
		let mut values = Vec::new();
		for var in vars {
			if values.len() <= var {
				values.resize(var + 1, false);
			}
			values[var] = true;
		}
		Self { values }
	}

	pub fn is_true(&self, var: Var) -> bool {
		self.values.get(var).copied().unwrap_or(false)
	}

	pub fn value(&self, lit: Lit) -> bool {
		self.is_true(lit.var()) == lit.is_positive()
	}
}

/// An incremental SAT solver fed with DIMACS-style literals.
pub trait SatBackend {
	fn add_clause(&mut self, clause: &[Lit]);

	/// Solves under `assumptions`; `None` means unsatisfiable.
	fn solve(&mut self, assumptions: &[Lit]) -> Result<Option<Model>, EquivalenceError>;

	fn add_cnf(&mut self, cnf: &Cnf) {
		for clause in cnf.clauses() {
			self.add_clause(clause);
		}
	}
}

/// In-process backend on top of `varisat`.
pub struct VarisatBackend {
	solver: Solver<'static>,
}

impl VarisatBackend {
	pub fn new() -> Self {
		Self {
			solver: Solver::new(),
		}
	}
}

impl Default for VarisatBackend {
	fn default() -> Self {
		Self::new()
	}
}

fn to_varisat(lit: Lit) -> varisat::Lit {
	varisat::Lit::from_dimacs(lit.to_dimacs() as isize)
}

impl SatBackend for VarisatBackend {
	fn add_clause(&mut self, clause: &[Lit]) {
		let clause = clause.iter().copied().map(to_varisat).collect::<Vec<_>>();
		self.solver.add_clause(&clause);
	}

	fn solve(&mut self, assumptions: &[Lit]) -> Result<Option<Model>, EquivalenceError> {
		let assumptions = assumptions
			.iter()
			.copied()
			.map(to_varisat)
			.collect::<Vec<_>>();
		self.solver.assume(&assumptions);
		let satisfiable = self
			.solver
			.solve()
			.map_err(|err| EquivalenceError::Solver {
				detail: format!("{err:?}"),
			})?;
		if !satisfiable {
			return Ok(None);
		}
		let model = self.solver.model().ok_or_else(|| EquivalenceError::Solver {
			detail: "satisfiable formula without a model".into(),
		})?;
		Ok(Some(Model::from_true_vars(
			model
				.into_iter()
				.filter(|lit| lit.is_positive())
				.map(|lit| lit.var().to_dimacs() as Var),
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_solve_under_assumptions() {
		let mut cnf = Cnf::new();
		cnf.add_clause([Lit::positive(1), Lit::positive(2)]);
		cnf.add_clause([Lit::negative(1), Lit::positive(3)]);

		let mut backend = VarisatBackend::new();
		backend.add_cnf(&cnf);
		let model = backend.solve(&[Lit::positive(1)]).unwrap().unwrap();
		assert!(model.is_true(1));
		assert!(model.is_true(3));

		let model = backend
			.solve(&[Lit::negative(1)])
			.unwrap()
			.unwrap();
		assert!(model.is_true(2));

		assert!(
			backend
				.solve(&[Lit::negative(2), Lit::negative(3)])
				.unwrap()
				.is_none()
		);
		// assumptions do not persist between calls
		assert!(backend.solve(&[]).unwrap().is_some());
	}

	#[test]
	fn test_model_defaults_to_false() {
		let model = Model::from_true_vars([2, 5]);
		assert!(model.is_true(5));
		assert!(!model.is_true(3));
		assert!(!model.is_true(100));
		assert!(model.value(Lit::negative(100)));
	}
}
