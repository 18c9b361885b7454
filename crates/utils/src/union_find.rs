// Copyright 2025 Irreducible Inc.
//! Disjoint-set forest with path compression and union by size.

use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	hash::Hash,
};

/// A union-find structure over arbitrary keys.
///
/// Keys are inserted lazily by [`Self::find`] and [`Self::union`]. Representative tracking is
/// opt-in through [`Self::with_representatives`]; when enabled, the current set of roots is kept
/// up to date on every union.
#[derive(Debug, Clone)]
pub struct UnionFind<T> {
	parent: HashMap<T, T>,
	size: HashMap<T, usize>,
	representatives: Option<BTreeSet<T>>,
}

impl<T: Clone + Eq + Hash + Ord> UnionFind<T> {
	pub fn new() -> Self {
		Self {
			parent: HashMap::new(),
			size: HashMap::new(),
			representatives: None,
		}
	}

	/// Creates a union-find that maintains the set of its representatives.
	pub fn with_representatives() -> Self {
		Self {
			representatives: Some(BTreeSet::new()),
			..Self::new()
		}
	}

	fn insert(&mut self, key: &T) {
		if !self.parent.contains_key(key) {
			self.parent.insert(key.clone(), key.clone());
			self.size.insert(key.clone(), 1);
			if let Some(reps) = self.representatives.as_mut() {
				reps.insert(key.clone());
			}
		}
	}

	/// Returns the representative of `key`, inserting it as a singleton if unknown.
	pub fn find(&mut self, key: &T) -> T {
		self.insert(key);
		let mut root = key.clone();
		while self.parent[&root] != root {
			root = self.parent[&root].clone();
		}
		let mut current = key.clone();
		while current != root {
			let next = self.parent[&current].clone();
			self.parent.insert(current, root.clone());
			current = next;
		}
		root
	}

	/// Merges the sets of `a` and `b` and returns the new representative.
	pub fn union(&mut self, a: &T, b: &T) -> T {
		let ra = self.find(a);
		let rb = self.find(b);
		if ra == rb {
			return ra;
		}
		let (big, small) = if self.size[&ra] >= self.size[&rb] {
			(ra, rb)
		} else {
			(rb, ra)
		};
		let merged = self.size[&big] + self.size[&small];
		self.parent.insert(small.clone(), big.clone());
		self.size.insert(big.clone(), merged);
		if let Some(reps) = self.representatives.as_mut() {
			reps.remove(&small);
		}
		big
	}

	/// Merges every key of `keys` into one set.
	pub fn union_all<'a>(&mut self, keys: impl IntoIterator<Item = &'a T>) -> Option<T>
	where
		T: 'a,
	{
		let mut keys = keys.into_iter();
		let first = keys.next()?;
		let mut root = self.find(first);
		for key in keys {
			root = self.union(&root, key);
		}
		Some(root)
	}

	pub fn same(&mut self, a: &T, b: &T) -> bool {
		self.find(a) == self.find(b)
	}

	/// The current representatives, if tracking was requested on construction.
	pub fn representatives(&self) -> Option<&BTreeSet<T>> {
		self.representatives.as_ref()
	}

	/// Groups every known key by its representative.
	pub fn groups(&mut self) -> BTreeMap<T, Vec<T>> {
		let mut keys: Vec<T> = self.parent.keys().cloned().collect();
		keys.sort();
		let mut groups: BTreeMap<T, Vec<T>> = BTreeMap::new();
		for key in keys {
			let root = self.find(&key);
			groups.entry(root).or_default().push(key);
		}
		groups
	}
}

impl<T: Clone + Eq + Hash + Ord> Default for UnionFind<T> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn test_union_and_groups() {
		let mut uf = UnionFind::with_representatives();
		uf.union(&1, &2);
		uf.union(&3, &4);
		uf.union(&2, &4);
		uf.find(&7);
		assert!(uf.same(&1, &3));
		assert!(!uf.same(&1, &7));
		assert_eq!(uf.representatives().unwrap().len(), 2);
		let groups: Vec<Vec<i32>> = uf.groups().into_values().collect();
		assert!(groups.contains(&vec![1, 2, 3, 4]));
		assert!(groups.contains(&vec![7]));
	}

	#[test]
	fn test_representatives_not_tracked_by_default() {
		let mut uf = UnionFind::new();
		uf.union(&"a", &"b");
		assert!(uf.representatives().is_none());
	}

	proptest! {
		#[test]
		fn prop_representatives_match_groups(edges in prop::collection::vec((0u8..32, 0u8..32), 0..64)) {
			let mut uf = UnionFind::with_representatives();
			for (a, b) in &edges {
				uf.union(a, b);
			}
			let reps = uf.representatives().unwrap().clone();
			let groups = uf.groups();
			prop_assert_eq!(reps, groups.keys().cloned().collect::<BTreeSet<_>>());
		}
	}
}
