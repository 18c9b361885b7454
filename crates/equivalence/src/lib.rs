// Copyright 2025 Irreducible Inc.
//! Structural equivalence of arithmetic circuits.
//!
//! Two circuits are equivalent when one is obtained from the other by renaming signals,
//! reordering constraints and scaling every constraint by its own nonzero factor. The check
//! normalizes every constraint, runs back-and-forth color refinement over signals and norms, and
//! hands whatever ambiguity is left to a SAT solver. See [`compare`] for the entry point and
//! [`maximal_equivalence`] for the largest common part of two circuits that differ.

pub mod cardinality;
pub mod cnf;
pub mod compare;
pub mod encoder;
pub mod error;
pub mod fingerprinter;
pub mod mapping;
pub mod maxsat;
pub mod options;
pub mod pairing;
pub mod propagate;
pub mod side;
pub mod signal_info;
pub mod solver;

pub use compare::{Comparison, Outcome, compare};
pub use error::{EquivalenceError, ItemKind, NotEquivalentReason, Phase};
pub use fingerprinter::{Members, Refinement, refine_pair, refine_single};
pub use mapping::{Mapping, MappingError, check_matched_constraints, sanity_check};
pub use maxsat::{MaximalMatch, maximal_equivalence};
pub use options::{EquivalenceOptions, MaxEquivOptions, Policy, UnknownPolicy};
pub use propagate::{iterated_label_propagation, label_classes};
pub use side::Side;
