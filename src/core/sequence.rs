//! Dense, 1-based ordering shared by steps and terminal rules
//!
//! Position is carried only by an `order` field on each item. A
//! [`Sequence`] keeps its items sorted and numbered `1..=N` after every
//! operation, so callers never see gaps or duplicates.

use thiserror::Error;

/// Items that carry their own 1-based position
pub trait Sequenced {
    fn order(&self) -> u32;
    fn set_order(&mut self, order: u32);
}

/// Ways a list of orders can fail to be `1..=N`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("order 0 is not allowed, orders start at 1")]
    ZeroOrder,

    #[error("order {order} appears more than once")]
    Duplicate { order: u32 },

    #[error("orders are not dense: expected {expected}, found {found}")]
    Gap { expected: u32, found: u32 },
}

/// Check that `items` carry exactly the orders `1..=N`, in any arrangement
pub fn check_dense<T: Sequenced>(items: &[T]) -> Result<(), SequenceError> {
    let mut orders: Vec<u32> = items.iter().map(Sequenced::order).collect();
    orders.sort_unstable();

    if orders.first() == Some(&0) {
        return Err(SequenceError::ZeroOrder);
    }
    if let Some(pair) = orders.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(SequenceError::Duplicate { order: pair[0] });
    }
    for (index, order) in orders.iter().enumerate() {
        let expected = index as u32 + 1;
        if *order != expected {
            return Err(SequenceError::Gap {
                expected,
                found: *order,
            });
        }
    }

    Ok(())
}

/// An owned list kept sorted and densely numbered from 1
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence<T> {
    items: Vec<T>,
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Sequenced> Sequence<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from items carrying any permutation of `1..=N`
    pub fn from_vec(mut items: Vec<T>) -> Result<Self, SequenceError> {
        check_dense(&items)?;
        items.sort_by_key(Sequenced::order);
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    /// Append an item built for the next free order; returns that order
    pub fn push_with<F>(&mut self, build: F) -> u32
    where
        F: FnOnce(u32) -> T,
    {
        let order = self.items.len() as u32 + 1;
        let mut item = build(order);
        item.set_order(order);
        self.items.push(item);
        order
    }

    pub fn get(&self, order: u32) -> Option<&T> {
        self.index_of(order).map(|index| &self.items[index])
    }

    /// Mutable access to the item at `order`.
    ///
    /// Callers must not change the item's order through this reference;
    /// use [`Sequence::move_item`] for that.
    pub fn get_mut(&mut self, order: u32) -> Option<&mut T> {
        self.index_of(order).map(move |index| &mut self.items[index])
    }

    /// Remove the item at `order`, shifting every later item down by one
    pub fn remove(&mut self, order: u32) -> Option<T> {
        let index = self.index_of(order)?;
        let removed = self.items.remove(index);
        self.renumber();
        Some(removed)
    }

    /// Move the item at `from` so that it ends up at position `to`.
    ///
    /// Returns `false` and leaves the sequence untouched when either
    /// position does not exist.
    pub fn move_item(&mut self, from: u32, to: u32) -> bool {
        let (Some(from_index), Some(to_index)) = (self.index_of(from), self.index_of(to)) else {
            return false;
        };

        let item = self.items.remove(from_index);
        self.items.insert(to_index, item);
        self.renumber();
        true
    }

    fn index_of(&self, order: u32) -> Option<usize> {
        self.items.iter().position(|item| item.order() == order)
    }

    fn renumber(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.set_order(index as u32 + 1);
        }
    }
}

impl<'a, T> IntoIterator for &'a Sequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
