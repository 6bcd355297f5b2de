use std::{
    collections::HashMap,
    fmt,
    io::{BufRead, Write},
    iter::FusedIterator,
    str::FromStr,
};

use log::warn;

use crate::{ds::SlotPool, Error, Result};

use super::Feature;

/// Order in which a [`FeatureList`] keeps its active entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Entries stay in the order they were first inserted
    #[default]
    Insertion,
    /// Entries are kept sorted by factor, largest first
    Factor,
    /// Entries are kept sorted by the magnitude of their factor, largest first
    AbsFactor,
}

impl SortMode {
    fn key(self, factor: f64) -> f64 {
        match self {
            SortMode::AbsFactor => factor.abs(),
            _ => factor,
        }
    }
}

/// A sparse vector of [features](Feature)
///
/// Absent indices have an implicit factor of `0.0`. Each feature index appears at most once; adding
/// to an index that is already present merges into the existing entry.
///
/// The active entries live in a [`SlotPool`] and are addressed two ways: an ordered sequence of slot
/// ids (insertion order, or sorted according to the list's [`SortMode`]) and a map from feature
/// index to slot id for constant-time lookup. Removing an entry hands its slot back to the pool,
/// and [`clear`](FeatureList::clear) recycles every slot, so lists that are refilled every step stop
/// allocating once they reach their working size.
///
/// Sorted insertion scans linearly from the front. Active sets are expected to hold tens of entries
/// and sorted lists are mostly touched near the front, where the largest factors sit.
///
/// ### Example
/// ```
/// use rltrace::feature::FeatureList;
///
/// let mut list = FeatureList::new();
/// list.update(3, 2.0);
/// list.update(5, -1.0);
/// list.mult_factor(2.0);
///
/// assert_eq!(list.factor(3), 4.0);
/// assert_eq!(list.factor(5), -2.0);
/// assert_eq!(list.factor(7), 0.0);
/// assert_eq!(list.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FeatureList {
    pool: SlotPool<Feature>,
    order: Vec<usize>,
    lookup: HashMap<usize, usize>,
    mode: SortMode,
}

impl FeatureList {
    /// Constructs an empty, insertion-ordered list
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs an insertion-ordered list with `capacity` entries pre-allocated in its pool
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_mode(capacity, SortMode::Insertion)
    }

    /// Constructs an empty list with `capacity` entries pre-allocated in its pool, ordered by `mode`
    pub fn with_mode(capacity: usize, mode: SortMode) -> Self {
        Self {
            pool: SlotPool::with_slots(capacity),
            order: Vec::with_capacity(capacity),
            lookup: HashMap::with_capacity(capacity),
            mode,
        }
    }

    pub fn mode(&self) -> SortMode {
        self.mode
    }

    /// Number of active entries
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of pool entries ever created by this list
    ///
    /// Stays constant while the list is cleared and refilled up to its previous size.
    pub fn allocations(&self) -> usize {
        self.pool.allocations()
    }

    /// Get the entry stored for `index`, if any
    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.lookup.get(&index).map(|&slot| &self.pool[slot])
    }

    /// Get the factor stored for `index`, or `0.0` if the index is absent
    pub fn factor(&self, index: usize) -> f64 {
        self.get(index).map_or(0.0, |feature| feature.factor)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.lookup.contains_key(&index)
    }

    /// The first entry of the active sequence (the largest one in a sorted list)
    pub fn front(&self) -> Option<&Feature> {
        self.order.first().map(|&slot| &self.pool[slot])
    }

    /// The last entry of the active sequence (the smallest one in a sorted list)
    pub fn back(&self) -> Option<&Feature> {
        self.order.last().map(|&slot| &self.pool[slot])
    }

    /// Overwrite the factor for `index`, creating the entry if it is absent
    pub fn set(&mut self, index: usize, factor: f64) {
        match self.lookup.get(&index).copied() {
            Some(slot) => {
                self.pool[slot].factor = factor;
                self.reposition(slot);
            }
            None => self.insert(Feature::new(index, factor)),
        }
    }

    /// Add `factor` to the factor stored for `index`, creating the entry if it is absent
    ///
    /// Adding `0.0` to an absent index is a no-op and does not materialize an entry.
    pub fn update(&mut self, index: usize, factor: f64) {
        match self.lookup.get(&index).copied() {
            Some(slot) => {
                self.pool[slot].factor += factor;
                self.reposition(slot);
            }
            None if factor != 0.0 => self.insert(Feature::new(index, factor)),
            None => {}
        }
    }

    /// Merge-add a single feature, see [`update`](FeatureList::update)
    pub fn add_feature(&mut self, feature: &Feature) {
        self.update(feature.index, feature.factor);
    }

    /// Merge-add every entry of `other`, scaled by `factor`
    pub fn add_list(&mut self, other: &FeatureList, factor: f64) {
        for feature in other {
            self.update(feature.index, factor * feature.factor);
        }
    }

    /// Remove the entry for `index` and hand its slot back to the pool
    ///
    /// **Returns** the removed entry, or `None` if the index was absent
    pub fn remove(&mut self, index: usize) -> Option<Feature> {
        let slot = self.lookup.remove(&index)?;
        let pos = self.position(slot);
        self.order.remove(pos);
        let feature = self.pool[slot];
        self.pool.release(slot);
        Some(feature)
    }

    /// Remove and return the first entry of the active sequence
    pub fn pop_front(&mut self) -> Option<Feature> {
        let index = self.front()?.index;
        self.remove(index)
    }

    /// Remove and return the last entry of the active sequence
    pub fn pop_back(&mut self) -> Option<Feature> {
        let slot = self.order.pop()?;
        let feature = self.pool[slot];
        self.lookup.remove(&feature.index);
        self.pool.release(slot);
        Some(feature)
    }

    /// Scale every factor by `scalar`
    pub fn mult_factor(&mut self, scalar: f64) {
        for &slot in &self.order {
            self.pool[slot].factor *= scalar;
        }
        // magnitudes keep their order, signed factors flip it
        if self.mode == SortMode::Factor && scalar < 0.0 {
            self.order.reverse();
        }
    }

    /// Shift every stored feature index by `offset`
    ///
    /// Used to place a feature set inside one block of a larger index space, e.g. one weight block
    /// per action.
    pub fn add_index_offset(&mut self, offset: usize) {
        self.lookup.clear();
        for &slot in &self.order {
            let feature = &mut self.pool[slot];
            feature.index += offset;
            self.lookup.insert(feature.index, slot);
        }
    }

    /// Sum of all factors
    pub fn sum(&self) -> f64 {
        self.iter().map(|feature| feature.factor).sum()
    }

    /// Euclidean norm of the factor vector
    pub fn length(&self) -> f64 {
        self.iter()
            .map(|feature| feature.factor * feature.factor)
            .sum::<f64>()
            .sqrt()
    }

    /// Scale the factors so that they sum to one
    ///
    /// A list whose factors cancel out, i.e. whose sum vanishes relative to the sum of magnitudes,
    /// cannot be normalized and is left unchanged.
    pub fn normalize(&mut self) {
        let sum = self.sum();
        let magnitude = self.iter().map(|feature| feature.factor.abs()).sum::<f64>();
        if sum.abs() <= f64::EPSILON * magnitude {
            warn!(
                "Cannot normalize a feature list whose factors sum to {sum} ({} entries)",
                self.len()
            );
            return;
        }
        self.mult_factor(1.0 / sum);
    }

    /// Sparse dot product with `other`
    ///
    /// Iterates `other` and looks each index up in `self`.
    pub fn dot(&self, other: &FeatureList) -> f64 {
        other
            .iter()
            .map(|feature| self.factor(feature.index) * feature.factor)
            .sum()
    }

    /// Remove every entry, keeping the pool's memory for reuse
    pub fn clear(&mut self) {
        self.pool.release_all(self.order.drain(..));
        self.lookup.clear();
    }

    /// Remove every entry and release all backing memory, including the pool
    pub fn clear_and_delete(&mut self) {
        self.order = Vec::new();
        self.lookup = HashMap::new();
        self.pool.clear_and_delete();
    }

    /// Iterate over the active entries in list order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            slots: self.order.iter(),
            pool: &self.pool,
        }
    }

    /// Write the list as `[(<index>,<factor>)...]` with three decimals per factor
    pub fn save_ascii<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        write!(writer, "{self}")?;
        Ok(())
    }

    /// Clear the list and read entries in the format written by [`save_ascii`](FeatureList::save_ascii)
    ///
    /// Reads up to and including the closing `]`.
    pub fn load_ascii<R: BufRead + ?Sized>(&mut self, reader: &mut R) -> Result<()> {
        self.clear();
        let mut buf = Vec::new();
        reader.read_until(b']', &mut buf)?;
        let text = String::from_utf8(buf).map_err(|e| Error::Parse {
            position: e.utf8_error().valid_up_to(),
            message: "invalid UTF-8".into(),
        })?;
        let mut cursor = Cursor::new(&text);
        let parsed = self.parse_entries(&mut cursor);
        if parsed.is_err() {
            self.clear();
        }
        parsed
    }

    fn parse_entries(&mut self, cursor: &mut Cursor<'_>) -> Result<()> {
        cursor.expect('[')?;
        loop {
            match cursor.peek() {
                Some(']') => {
                    cursor.bump();
                    return Ok(());
                }
                Some('(') => {
                    cursor.bump();
                    let index = cursor.parse_until::<usize>(',', "feature index")?;
                    let factor = cursor.parse_until::<f64>(')', "feature factor")?;
                    self.set(index, factor);
                }
                Some(c) => return Err(cursor.error(format!("expected `(` or `]`, found `{c}`"))),
                None => return Err(cursor.error("unterminated feature list")),
            }
        }
    }

    fn insert(&mut self, feature: Feature) {
        let slot = self.pool.acquire(feature);
        self.lookup.insert(feature.index, slot);
        self.place(slot);
    }

    /// Put `slot` into the active sequence at the position its factor calls for
    fn place(&mut self, slot: usize) {
        if self.mode == SortMode::Insertion {
            self.order.push(slot);
            return;
        }
        let key = self.key(slot);
        let pos = self
            .order
            .iter()
            .position(|&s| self.key(s) < key)
            .unwrap_or(self.order.len());
        self.order.insert(pos, slot);
    }

    /// Restore the sort order after the factor stored in `slot` changed
    fn reposition(&mut self, slot: usize) {
        if self.mode == SortMode::Insertion {
            return;
        }
        let pos = self.position(slot);
        let key = self.key(slot);
        let before_ok = pos == 0 || self.key(self.order[pos - 1]) >= key;
        let after_ok = pos + 1 == self.order.len() || self.key(self.order[pos + 1]) <= key;
        if before_ok && after_ok {
            return;
        }
        self.order.remove(pos);
        self.place(slot);
    }

    fn key(&self, slot: usize) -> f64 {
        self.mode.key(self.pool[slot].factor)
    }

    fn position(&self, slot: usize) -> usize {
        self.order
            .iter()
            .position(|&s| s == slot)
            .expect("every indexed slot is in the active sequence")
    }
}

impl PartialEq for FeatureList {
    /// Two lists are equal when they hold the same index set with the same factors, in any order
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|feature| other.get(feature.index) == Some(feature))
    }
}

impl fmt::Display for FeatureList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for feature in self {
            write!(f, "({},{:.3})", feature.index, feature.factor)?;
        }
        write!(f, "]")
    }
}

impl FromStr for FeatureList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut list = FeatureList::new();
        let mut cursor = Cursor::new(s);
        list.parse_entries(&mut cursor)?;
        cursor.skip_whitespace();
        match cursor.peek() {
            None => Ok(list),
            Some(c) => Err(cursor.error(format!("unexpected `{c}` after feature list"))),
        }
    }
}

impl Extend<Feature> for FeatureList {
    /// Merge-adds each feature, keeping explicit zero factors as entries
    fn extend<I: IntoIterator<Item = Feature>>(&mut self, iter: I) {
        for feature in iter {
            if self.contains(feature.index) {
                self.update(feature.index, feature.factor);
            } else {
                self.set(feature.index, feature.factor);
            }
        }
    }
}

impl FromIterator<Feature> for FeatureList {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        let mut list = FeatureList::new();
        list.extend(iter);
        list
    }
}

impl<'a> IntoIterator for &'a FeatureList {
    type Item = &'a Feature;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the active entries of a [`FeatureList`], see [`FeatureList::iter`]
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    slots: std::slice::Iter<'a, usize>,
    pool: &'a SlotPool<Feature>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Feature;

    fn next(&mut self) -> Option<Self::Item> {
        self.slots.next().map(|&slot| &self.pool[slot])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.slots.next_back().map(|&slot| &self.pool[slot])
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}

/// Position-tracking reader over the ASCII format
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.text[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected `{expected}`, found `{c}`"))),
            None => Err(self.error(format!("expected `{expected}`, found end of input"))),
        }
    }

    /// Parse the text up to `delimiter` and step past the delimiter
    fn parse_until<T: FromStr>(&mut self, delimiter: char, what: &str) -> Result<T> {
        let start = self.pos;
        let rest = &self.text[start..];
        let len = rest
            .find(delimiter)
            .ok_or_else(|| self.error(format!("missing `{delimiter}` after {what}")))?;
        let value = rest[..len]
            .trim()
            .parse()
            .map_err(|_| self.error(format!("invalid {what} `{}`", rest[..len].trim())))?;
        self.pos = start + len + delimiter.len_utf8();
        Ok(value)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use approx::assert_relative_eq;
    use proptest::prelude::*;

    use super::*;

    fn factors(list: &FeatureList) -> Vec<f64> {
        list.iter().map(|f| f.factor).collect()
    }

    fn assert_sorted(list: &FeatureList) {
        let keys = list
            .iter()
            .map(|f| list.mode().key(f.factor))
            .collect::<Vec<_>>();
        assert!(
            keys.windows(2).all(|w| w[0] >= w[1]),
            "list is sorted: {keys:?}"
        );
    }

    #[test]
    fn update_scale_scenario() {
        let mut list = FeatureList::with_mode(0, SortMode::Insertion);
        list.update(3, 2.0);
        list.update(5, -1.0);
        list.mult_factor(2.0);

        assert_eq!(list.factor(3), 4.0, "index 3 scaled");
        assert_eq!(list.factor(5), -2.0, "index 5 scaled");
        assert_eq!(list.len(), 2, "no extra entries");
    }

    #[test]
    fn absent_index_is_zero() {
        let mut list = FeatureList::new();
        list.set(1, 0.5);
        assert_eq!(list.factor(2), 0.0, "absent index reads as zero");
        assert!(list.get(2).is_none(), "absent index has no entry");
        assert!(!list.contains(2), "absent index not contained");
    }

    #[test]
    fn update_merges_set_overwrites() {
        let mut list = FeatureList::new();
        list.add_feature(&Feature::new(4, 1.0));
        list.add_feature(&Feature::new(4, 0.5));
        assert_eq!(list.factor(4), 1.5, "add merges into the existing entry");
        assert_eq!(list.len(), 1, "indices stay unique");

        list.set(4, -2.0);
        assert_eq!(list.factor(4), -2.0, "set overwrites");
        assert_eq!(list.len(), 1, "set does not duplicate");
    }

    #[test]
    fn zero_update_is_noop() {
        let mut list = FeatureList::new();
        list.update(9, 0.0);
        assert_eq!(list.len(), 0, "no entry materialized for a zero update");

        list.update(2, 1.0);
        list.update(2, 0.0);
        assert_eq!(list.factor(2), 1.0, "zero update keeps the factor");
        assert_eq!(list.len(), 1, "zero update keeps the size");
    }

    #[test]
    fn add_list_scaled() {
        let mut a = FeatureList::new();
        a.set(0, 1.0);
        a.set(1, 2.0);
        let mut b = FeatureList::new();
        b.set(1, 1.0);
        b.set(2, 4.0);

        a.add_list(&b, 0.5);
        assert_eq!(factors(&a), [1.0, 2.5, 2.0], "union of indices, scaled merge");
    }

    #[test]
    fn remove_recycles_slot() {
        let mut list = FeatureList::new();
        list.set(1, 1.0);
        list.set(2, 2.0);
        list.set(3, 3.0);

        assert_eq!(list.remove(2), Some(Feature::new(2, 2.0)), "removed entry returned");
        assert_eq!(list.remove(2), None, "second remove finds nothing");
        assert_eq!(
            list.iter().map(|f| f.index).collect::<Vec<_>>(),
            [1, 3],
            "order kept"
        );

        let allocations = list.allocations();
        list.set(4, 4.0);
        assert_eq!(list.allocations(), allocations, "freed slot reused");
        assert_eq!(list.factor(4), 4.0, "reused slot holds the new entry");
    }

    #[test]
    fn clear_reuses_pool() {
        let mut list = FeatureList::new();
        for i in 0..16 {
            list.set(i, i as f64);
        }
        let allocations = list.allocations();

        list.clear();
        assert!(list.is_empty(), "clear empties the list");
        assert_eq!(list.factor(3), 0.0, "cleared entries read as zero");
        for i in 0..16 {
            list.set(i + 100, 1.0);
        }
        assert_eq!(list.allocations(), allocations, "refill after clear does not allocate");

        list.clear_and_delete();
        for i in 0..16 {
            list.set(i, 1.0);
        }
        assert_eq!(
            list.allocations(),
            allocations + 16,
            "refill after clear_and_delete allocates"
        );
    }

    #[test]
    fn preallocated_capacity() {
        let mut list = FeatureList::with_capacity(8);
        let allocations = list.allocations();
        for i in 0..8 {
            list.set(i, 1.0);
        }
        assert_eq!(list.allocations(), allocations, "pre-allocated slots used first");
    }

    #[test]
    fn dot_product_symmetric() {
        let a = [(0, 1.5), (3, -2.0), (7, 0.25), (9, 4.0)]
            .into_iter()
            .map(|(i, f)| Feature::new(i, f))
            .collect::<FeatureList>();
        let b = [(3, 0.5), (7, 8.0), (11, 3.0)]
            .into_iter()
            .map(|(i, f)| Feature::new(i, f))
            .collect::<FeatureList>();

        assert_relative_eq!(a.dot(&b), 1.0);
        assert_relative_eq!(a.dot(&b), b.dot(&a));
        assert_eq!(a.dot(&FeatureList::new()), 0.0, "empty operand gives zero");
    }

    #[test]
    fn norm_and_normalize() {
        let mut list = FeatureList::new();
        list.set(0, 3.0);
        list.set(1, 4.0);
        assert_relative_eq!(list.length(), 5.0);

        list.normalize();
        assert_relative_eq!(list.sum(), 1.0);
        assert_relative_eq!(list.factor(0), 3.0 / 7.0);
    }

    #[test]
    fn normalize_tiny_factors() {
        let mut list = FeatureList::new();
        list.set(0, 1e-17);
        list.set(1, 3e-17);
        list.normalize();
        assert_relative_eq!(list.sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(list.factor(1), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn normalize_zero_sum_unchanged() {
        let mut list = FeatureList::new();
        list.set(0, 1.0);
        list.set(1, -1.0);
        list.normalize();
        assert_eq!(factors(&list), [1.0, -1.0], "degenerate list left unchanged");
    }

    #[test]
    fn index_offset_rebuilds_lookup() {
        let mut list = FeatureList::new();
        list.set(0, 1.0);
        list.set(2, 2.0);
        list.add_index_offset(10);

        assert_eq!(list.factor(10), 1.0, "index 0 moved to 10");
        assert_eq!(list.factor(12), 2.0, "index 2 moved to 12");
        assert_eq!(list.factor(0), 0.0, "old index gone");

        list.update(12, 1.0);
        assert_eq!(list.factor(12), 3.0, "lookup points at the moved entry");
        assert_eq!(list.len(), 2, "no duplicate after offset");
    }

    #[test]
    fn sorted_by_factor() {
        let mut list = FeatureList::with_mode(4, SortMode::Factor);
        list.set(0, 0.5);
        list.set(1, 2.0);
        list.set(2, -1.0);
        list.set(3, 1.0);
        assert_eq!(factors(&list), [2.0, 1.0, 0.5, -1.0], "inserted in order");

        list.update(2, 5.0);
        assert_sorted(&list);
        assert_eq!(list.front().map(|f| f.index), Some(2), "updated entry moved to front");

        list.set(1, -3.0);
        assert_sorted(&list);
        assert_eq!(list.back().map(|f| f.index), Some(1), "lowered entry moved to back");

        list.mult_factor(-1.0);
        assert_sorted(&list);

        list.remove(0);
        list.add_feature(&Feature::new(8, 0.0001));
        assert_sorted(&list);
    }

    #[test]
    fn sorted_by_magnitude() {
        let mut list = FeatureList::with_mode(0, SortMode::AbsFactor);
        list.set(0, 0.1);
        list.set(1, -3.0);
        list.set(2, 2.0);
        list.set(3, -0.5);
        assert_eq!(factors(&list), [-3.0, 2.0, -0.5, 0.1], "ordered by magnitude");

        list.mult_factor(-0.5);
        assert_sorted(&list);

        assert_eq!(list.pop_back(), Some(Feature::new(0, -0.05)), "smallest magnitude last");
        assert_eq!(list.pop_front(), Some(Feature::new(1, 1.5)), "largest magnitude first");
        assert_eq!(list.len(), 2, "two entries left");
        assert!(!list.contains(1), "popped entry unindexed");
    }

    #[test]
    fn reverse_iteration() {
        let list = (0..4)
            .map(|i| Feature::new(i, i as f64))
            .collect::<FeatureList>();
        let reversed = list.iter().rev().map(|f| f.index).collect::<Vec<_>>();
        assert_eq!(reversed, [3, 2, 1, 0], "reverse iteration");
        assert_eq!(list.iter().len(), 4, "exact size");
    }

    #[test]
    fn collect_keeps_zero_factors() {
        let list = "[(0,0.000)]".parse::<FeatureList>().unwrap();
        let copy = list.iter().copied().collect::<FeatureList>();
        assert_eq!(copy.len(), 1, "explicit zero entry kept");
        assert!(copy.contains(0), "zero entry indexed");

        let mut merged = copy.clone();
        merged.extend([Feature::new(0, 1.5), Feature::new(0, 0.5)]);
        assert_eq!(merged.factor(0), 2.0, "present entries still merge");
    }

    #[test]
    fn ascii_format() {
        let mut list = FeatureList::new();
        list.set(3, 2.0);
        list.set(12, -0.125);
        assert_eq!(list.to_string(), "[(3,2.000)(12,-0.125)]", "ascii layout");

        let mut buf = Vec::new();
        list.save_ascii(&mut buf).unwrap();
        assert_eq!(buf, b"[(3,2.000)(12,-0.125)]", "save_ascii writes display form");
    }

    #[test]
    fn ascii_round_trip() {
        let mut list = FeatureList::new();
        list.set(0, 0.5);
        list.set(42, -1.25);
        list.set(7, 3.0);

        let mut buf = Vec::new();
        list.save_ascii(&mut buf).unwrap();
        let mut loaded = FeatureList::new();
        loaded.set(99, 1.0);
        loaded.load_ascii(&mut BufReader::new(buf.as_slice())).unwrap();

        assert_eq!(loaded, list, "round trip reproduces the list");
        assert!(!loaded.contains(99), "load clears previous entries");
    }

    #[test]
    fn ascii_stream_stops_at_list_end() {
        let mut reader = BufReader::new("[(1,1.000)] [(2,2.000)]".as_bytes());
        let mut first = FeatureList::new();
        let mut second = FeatureList::new();
        first.load_ascii(&mut reader).unwrap();
        second.load_ascii(&mut reader).unwrap();
        assert_eq!(first.factor(1), 1.0, "first list read");
        assert_eq!(second.factor(2), 2.0, "second list read");
    }

    #[test]
    fn failed_load_leaves_list_empty() {
        let mut list = FeatureList::new();
        list.set(5, 1.0);
        let mut reader = BufReader::new("[(1,1.000)(2,oops)]".as_bytes());
        assert!(list.load_ascii(&mut reader).is_err(), "malformed entry rejected");
        assert!(list.is_empty(), "no partial result kept");
    }

    #[test]
    fn ascii_rejects_malformed() {
        assert!("(1,1.0)]".parse::<FeatureList>().is_err(), "missing opening bracket");
        assert!("[(1,1.0)".parse::<FeatureList>().is_err(), "missing closing bracket");
        assert!("[(x,1.0)]".parse::<FeatureList>().is_err(), "bad index");
        assert!("[(1;1.0)]".parse::<FeatureList>().is_err(), "bad separator");
        assert!("[(1,1.0)] x".parse::<FeatureList>().is_err(), "trailing input");
        assert!(
            matches!("[(1,abc)]".parse::<FeatureList>(), Err(Error::Parse { .. })),
            "parse error variant"
        );
        assert_eq!(
            "[]".parse::<FeatureList>().unwrap().len(),
            0,
            "empty list parses"
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(usize, f64),
        Update(usize, f64),
        Remove(usize),
        Mult(f64),
        AddList(Vec<(usize, f64)>, f64),
        Normalize,
        Offset(usize),
        PopFront,
        PopBack,
        Clear,
    }

    fn entry() -> impl Strategy<Value = (usize, f64)> {
        (0usize..24, -10.0f64..10.0)
    }

    fn scalar() -> impl Strategy<Value = f64> {
        prop::sample::select(vec![-2.0, -0.5, 0.0, 0.5, 2.0])
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => entry().prop_map(|(i, f)| Op::Set(i, f)),
            4 => entry().prop_map(|(i, f)| Op::Update(i, f)),
            2 => (0usize..24).prop_map(Op::Remove),
            1 => scalar().prop_map(Op::Mult),
            2 => (prop::collection::vec(entry(), 0..6), scalar())
                .prop_map(|(entries, f)| Op::AddList(entries, f)),
            1 => Just(Op::Normalize),
            1 => (0usize..4).prop_map(Op::Offset),
            1 => Just(Op::PopFront),
            1 => Just(Op::PopBack),
            1 => Just(Op::Clear),
        ]
    }

    fn apply(list: &mut FeatureList, op: &Op) {
        match op {
            Op::Set(i, f) => list.set(*i, *f),
            Op::Update(i, f) => list.update(*i, *f),
            Op::Remove(i) => {
                list.remove(*i);
            }
            Op::Mult(f) => list.mult_factor(*f),
            Op::AddList(entries, f) => {
                let other = entries
                    .iter()
                    .map(|&(i, v)| Feature::new(i, v))
                    .collect::<FeatureList>();
                list.add_list(&other, *f);
            }
            Op::Normalize => list.normalize(),
            Op::Offset(offset) => list.add_index_offset(*offset),
            Op::PopFront => {
                list.pop_front();
            }
            Op::PopBack => {
                list.pop_back();
            }
            Op::Clear => list.clear(),
        }
    }

    fn sparse() -> impl Strategy<Value = FeatureList> {
        prop::collection::vec(entry(), 0..16)
            .prop_map(|entries| entries.into_iter().map(|(i, f)| Feature::new(i, f)).collect())
    }

    proptest! {
        #[test]
        fn sorted_after_every_mutation(
            abs in any::<bool>(),
            ops in prop::collection::vec(op(), 0..40),
        ) {
            let mode = if abs { SortMode::AbsFactor } else { SortMode::Factor };
            let mut list = FeatureList::with_mode(4, mode);
            for op in &ops {
                apply(&mut list, op);

                let keys = list.iter().map(|f| mode.key(f.factor)).collect::<Vec<_>>();
                prop_assert!(keys.windows(2).all(|w| w[0] >= w[1]), "unsorted after {:?}: {:?}", op, keys);
                prop_assert_eq!(list.iter().len(), list.len());
                for feature in &list {
                    prop_assert_eq!(list.get(feature.index), Some(feature), "lookup out of sync");
                }
            }
        }

        #[test]
        fn dot_product_is_symmetric(a in sparse(), b in sparse()) {
            let scale = a.iter().map(|f| f.factor.abs() * b.factor(f.index).abs()).sum::<f64>();
            prop_assert!((a.dot(&b) - b.dot(&a)).abs() <= 1e-12 * (1.0 + scale));
        }

        #[test]
        fn ascii_round_trip_any_list(
            abs in any::<bool>(),
            entries in prop::collection::vec((0usize..1000, -100_000i32..100_000), 0..20),
        ) {
            let mode = if abs { SortMode::AbsFactor } else { SortMode::Factor };
            let mut list = FeatureList::with_mode(0, mode);
            for (i, thousandths) in entries {
                list.set(i, f64::from(thousandths) / 1000.0);
            }

            let mut buf = Vec::new();
            list.save_ascii(&mut buf).unwrap();
            let mut loaded = FeatureList::new();
            loaded.load_ascii(&mut BufReader::new(buf.as_slice())).unwrap();
            prop_assert_eq!(loaded, list);
        }
    }
}
