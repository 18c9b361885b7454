// Copyright 2025 Irreducible Inc.
//! Splitting a circuit into a DAG of sub-circuits and grouping equivalent ones.
//!
//! [`cluster_circuit`] runs the whole pipeline: a clustering strategy partitions the constraints,
//! the partition becomes an acyclic [`Dag`], merge passes tidy it up and [`equivalence_classes`]
//! groups nodes whose sub-circuits are equivalent.

pub mod classes;
pub mod cluster;
pub mod dag;
pub mod error;
pub mod graph;
pub mod merge;
pub mod pipeline;
pub mod subcircuit;

pub use classes::{
	ClassOptions, Classes, EquivalenceDepth, NearMatch, NodeClass, UnknownDepth,
	equivalence_classes,
};
pub use cluster::{ClusteringStrategy, LeidenOptions, Partition, UnknownStrategy, cluster};
pub use dag::{Dag, DagNode, NodeId};
pub use error::StructuralError;
pub use graph::ConstraintGraph;
pub use merge::{MergeOptions, merge_under_property, run_merges};
pub use pipeline::{ClusterOptions, Clustering, Stage, cluster_circuit};
pub use subcircuit::SubCircuit;
