// Copyright 2025 Irreducible Inc.

//! Utility modules shared by the arckit crates.

pub mod assignment;
pub mod serialization;
pub mod union_find;

pub use assignment::{Assignment, IdIssuer, LinkedAssignment, LinkedValue};
pub use bytes;
pub use serialization::{DeserializeBytes, SerializationError, SerializeBytes};
pub use union_find::UnionFind;
