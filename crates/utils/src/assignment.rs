// Copyright 2025 Irreducible Inc.
//! Bidirectional `value <-> id` issuers.
//!
//! An [`Assignment`] hands out consecutive integer ids starting at its offset. The first time a
//! value is seen it receives the next free id; afterwards the same id is returned. The reverse
//! direction is kept so that ids can be decoded back to values.
//!
//! Two assignments can share one id space by [linking](Assignment::link) them: the linked child
//! draws its ids from the parent's counter, so the ids of the child never shadow the ids of the
//! parent. This is used to keep auxiliary SAT variables apart from the primary pair variables.

use std::{collections::HashMap, hash::Hash};

/// Something that can issue fresh, never before used ids.
pub trait IdIssuer {
	/// Returns an id that has not been issued before and is not bound to any value.
	fn fresh(&mut self) -> usize;
}

/// Issues dense ids for values.
#[derive(Debug, Clone)]
pub struct Assignment<T> {
	offset: usize,
	ids: HashMap<T, usize>,
	/// Reverse map. `None` marks an id that was issued anonymously or through a linked child.
	values: Vec<Option<T>>,
}

impl<T: Clone + Eq + Hash> Assignment<T> {
	/// Creates an assignment whose first id is 0.
	pub fn new() -> Self {
		Self::with_offset(0)
	}

	/// Creates an assignment whose first id is `offset`.
	pub fn with_offset(offset: usize) -> Self {
		Self {
			offset,
			ids: HashMap::new(),
			values: Vec::new(),
		}
	}

	/// Returns the id of `value`, issuing a new one if the value was not seen before.
	pub fn assign(&mut self, value: T) -> usize {
		if let Some(&id) = self.ids.get(&value) {
			return id;
		}
		let id = self.next_id();
		self.values.push(Some(value.clone()));
		self.ids.insert(value, id);
		id
	}

	/// Returns the id of `value` without issuing one.
	pub fn get(&self, value: &T) -> Option<usize> {
		self.ids.get(value).copied()
	}

	/// Returns the value bound to `id`, if any.
	pub fn value(&self, id: usize) -> Option<&T> {
		let index = id.checked_sub(self.offset)?;
		self.values.get(index)?.as_ref()
	}

	/// The id that the next call to [`Self::assign`] or [`IdIssuer::fresh`] returns.
	pub fn next_id(&self) -> usize {
		self.offset + self.values.len()
	}

	/// The first id of this assignment.
	pub fn offset(&self) -> usize {
		self.offset
	}

	/// Number of ids issued so far, including anonymous ones.
	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Iterates over all `(id, value)` pairs in id order.
	pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
		self.values
			.iter()
			.enumerate()
			.filter_map(|(index, value)| value.as_ref().map(|value| (self.offset + index, value)))
	}

	/// Creates a child assignment that issues its ids from this assignment's counter.
	pub fn link<U: Clone + Eq + Hash>(&mut self) -> LinkedAssignment<'_, T, U> {
		LinkedAssignment {
			parent: self,
			ids: HashMap::new(),
			values: HashMap::new(),
		}
	}
}

impl<T: Clone + Eq + Hash> Default for Assignment<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Clone + Eq + Hash> IdIssuer for Assignment<T> {
	fn fresh(&mut self) -> usize {
		let id = self.next_id();
		self.values.push(None);
		id
	}
}

/// A value found through a [`LinkedAssignment`] lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedValue<'a, T, U> {
	/// The id belongs to the parent.
	Parent(&'a T),
	/// The id belongs to the child.
	Own(&'a U),
}

/// An assignment that shares the id space of a parent [`Assignment`].
///
/// The child borrows its parent mutably for its whole lifetime; use [`Self::parent`] to keep
/// issuing parent ids while the child is alive.
#[derive(Debug)]
pub struct LinkedAssignment<'p, T, U> {
	parent: &'p mut Assignment<T>,
	ids: HashMap<U, usize>,
	values: HashMap<usize, U>,
}

impl<T: Clone + Eq + Hash, U: Clone + Eq + Hash> LinkedAssignment<'_, T, U> {
	/// Returns the id of `value`, issuing one from the parent's counter when needed.
	pub fn assign(&mut self, value: U) -> usize {
		if let Some(&id) = self.ids.get(&value) {
			return id;
		}
		let id = self.parent.fresh();
		self.values.insert(id, value.clone());
		self.ids.insert(value, id);
		id
	}

	/// Returns the id of `value` without issuing one.
	pub fn get(&self, value: &U) -> Option<usize> {
		self.ids.get(value).copied()
	}

	/// Resolves an id against this child first, then against the parent.
	pub fn lookup(&self, id: usize) -> Option<LinkedValue<'_, T, U>> {
		if let Some(value) = self.values.get(&id) {
			return Some(LinkedValue::Own(value));
		}
		self.parent.value(id).map(LinkedValue::Parent)
	}

	/// Mutable access to the parent assignment.
	pub fn parent(&mut self) -> &mut Assignment<T> {
		&mut *self.parent
	}
}

impl<T: Clone + Eq + Hash, U: Clone + Eq + Hash> IdIssuer for LinkedAssignment<'_, T, U> {
	fn fresh(&mut self) -> usize {
		self.parent.fresh()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_assign_is_idempotent() {
		let mut assignment = Assignment::with_offset(1);
		let a = assignment.assign("a");
		let b = assignment.assign("b");
		assert_eq!(a, 1);
		assert_eq!(b, 2);
		assert_eq!(assignment.assign("a"), 1);
		assert_eq!(assignment.value(2), Some(&"b"));
		assert_eq!(assignment.value(0), None);
		assert_eq!(assignment.len(), 2);
	}

	#[test]
	fn test_linked_ids_do_not_collide() {
		let mut parent: Assignment<(usize, usize)> = Assignment::with_offset(1);
		let p0 = parent.assign((0, 0));
		let (c0, c1, p1) = {
			let mut child = parent.link::<&str>();
			let c0 = child.assign("aux0");
			let p1 = child.parent().assign((1, 1));
			let c1 = child.fresh();
			assert_eq!(child.lookup(c0), Some(LinkedValue::Own(&"aux0")));
			assert_eq!(child.lookup(p1), Some(LinkedValue::Parent(&(1, 1))));
			assert_eq!(child.lookup(c1), None);
			(c0, c1, p1)
		};
		let mut all = vec![p0, c0, p1, c1];
		all.sort();
		all.dedup();
		assert_eq!(all.len(), 4);
		assert_eq!(parent.next_id(), 5);
		// Ids issued through the child are not bound on the parent.
		assert_eq!(parent.value(c0), None);
		assert_eq!(parent.iter().count(), 2);
	}
}
