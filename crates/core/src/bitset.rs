use fixedbitset::FixedBitSet;

use crate::vertex::VertexId;

/// A dense bitset over target vertices, used to represent `Dom(pv)` and the
/// various derived neighbourhood sets the reducers compute.
///
/// Thin wrapper over [`FixedBitSet`] exposing exactly the contract the
/// design notes call for: `count`, `first_set`, `next_set`, `set`, `clear`,
/// `test`, `intersect_assign`, `subtract_assign`, `swap`, iteration over set
/// bits, and a `singleton` check cheaper than `count() == 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitset(FixedBitSet);

impl Bitset {
    /// An all-zero bitset able to hold vertex ids `0..len`.
    pub fn with_capacity(len: usize) -> Self {
        Bitset(FixedBitSet::with_capacity(len))
    }

    /// A bitset with every bit in `0..len` set.
    pub fn all_ones(len: usize) -> Self {
        let mut b = FixedBitSet::with_capacity(len);
        b.set_range(.., true);
        Bitset(b)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Number of set bits. `O(words)`.
    pub fn count(&self) -> usize {
        self.0.count_ones(..)
    }

    pub fn test(&self, v: VertexId) -> bool {
        self.0.contains(v.index())
    }

    pub fn set(&mut self, v: VertexId, value: bool) {
        self.0.set(v.index(), value);
    }

    pub fn insert(&mut self, v: VertexId) {
        self.0.insert(v.index());
    }

    pub fn remove(&mut self, v: VertexId) {
        self.0.set(v.index(), false);
    }

    /// The lowest set bit, if any.
    pub fn first_set(&self) -> Option<VertexId> {
        self.0.ones().next().map(VertexId::from)
    }

    /// The lowest set bit strictly after `after`, if any.
    pub fn next_set(&self, after: VertexId) -> Option<VertexId> {
        self.0.ones().find(|&i| i > after.index()).map(VertexId::from)
    }

    /// If exactly one bit is set, that vertex; cheaper than `count() == 1`
    /// because it can stop scanning after finding a second bit.
    pub fn singleton(&self) -> Option<VertexId> {
        let mut iter = self.0.ones();
        let first = iter.next()?;
        if iter.next().is_some() {
            None
        } else {
            Some(VertexId::from(first))
        }
    }

    pub fn intersect_assign(&mut self, other: &Bitset) {
        self.0.intersect_with(&other.0);
    }

    pub fn union_assign(&mut self, other: &Bitset) {
        self.0.union_with(&other.0);
    }

    pub fn subtract_assign(&mut self, other: &Bitset) {
        self.0.difference_with(&other.0);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn swap(&mut self, other: &mut Bitset) {
        core::mem::swap(&mut self.0, &mut other.0);
    }

    /// Iterate over the set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.0.ones().map(VertexId::from)
    }

    pub fn is_subset_of(&self, other: &Bitset) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_disjoint(&self, other: &Bitset) -> bool {
        self.0.is_disjoint(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_detects_exactly_one_bit() {
        let mut b = Bitset::with_capacity(8);
        assert_eq!(b.singleton(), None);
        b.insert(VertexId(3));
        assert_eq!(b.singleton(), Some(VertexId(3)));
        b.insert(VertexId(5));
        assert_eq!(b.singleton(), None);
    }

    #[test]
    fn intersect_and_subtract() {
        let mut a = Bitset::with_capacity(8);
        a.insert(VertexId(1));
        a.insert(VertexId(2));
        a.insert(VertexId(3));
        let mut b = Bitset::with_capacity(8);
        b.insert(VertexId(2));
        b.insert(VertexId(3));
        b.insert(VertexId(4));

        let mut c = a.clone();
        c.intersect_assign(&b);
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![VertexId(2), VertexId(3)]);

        let mut d = a.clone();
        d.subtract_assign(&b);
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![VertexId(1)]);
    }

    #[test]
    fn swap_exchanges_contents_in_place() {
        let mut a = Bitset::with_capacity(4);
        a.insert(VertexId(0));
        let mut b = Bitset::with_capacity(4);
        b.insert(VertexId(1));
        a.swap(&mut b);
        assert_eq!(a.first_set(), Some(VertexId(1)));
        assert_eq!(b.first_set(), Some(VertexId(0)));
    }
}
