use crate::memory::MemoryError;

/// A half-open byte interval `[begin, end)` occupied by one allocation inside a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub begin: u32,
    pub end: u32,
}

impl Range {
    pub fn len(&self) -> u32 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// One backing allocation and the ranges currently live inside it.
///
/// `size == 0` marks an empty slot with no storage. Ranges are sorted by `begin`,
/// never overlap, and never extend past `size`. Free space is the implicit gaps
/// between them; nothing is coalesced.
pub(crate) struct Chunk<S> {
    pub(crate) storage: Option<S>,
    pub(crate) size: u32,
    pub(crate) ranges: Vec<Range>,
}

impl<S> Default for Chunk<S> {
    fn default() -> Self {
        Self {
            storage: None,
            size: 0,
            ranges: Vec::new(),
        }
    }
}

impl<S> Chunk<S> {
    pub(crate) fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Turns an empty slot into an active chunk of `size` bytes backed by `storage`.
    pub(crate) fn activate(&mut self, storage: S, size: u32) {
        debug_assert!(self.is_empty() && self.ranges.is_empty());
        self.storage = Some(storage);
        self.size = size;
    }

    /// Whether a live range begins at `begin`.
    pub(crate) fn contains(&self, begin: u32) -> bool {
        self.ranges
            .binary_search_by_key(&begin, |range| range.begin)
            .is_ok()
    }

    fn index_of(&self, begin: u32) -> usize {
        match self.ranges.binary_search_by_key(&begin, |range| range.begin) {
            Ok(index) => index,
            Err(_) => panic!("no live range begins at offset {begin}"),
        }
    }

    /// Reserves `size` bytes in the first gap that holds them.
    ///
    /// Gaps are probed in address order: before the first range, between neighbors,
    /// then after the last range. The leading and trailing gaps must be strictly
    /// larger than the request; an interior gap may be filled exactly. An empty
    /// chunk accepts any request up to its full capacity.
    ///
    /// Returns the begin offset of the new range, or `None` if no gap is large enough.
    pub(crate) fn allocate(&mut self, size: u32) -> Option<u32> {
        let Some(first_begin) = self.ranges.first().map(|range| range.begin) else {
            if size <= self.size {
                self.ranges.push(Range {
                    begin: 0,
                    end: size,
                });
                return Some(0);
            }
            return None;
        };

        if size < first_begin {
            self.ranges.insert(
                0,
                Range {
                    begin: 0,
                    end: size,
                },
            );
            return Some(0);
        }

        for index in 1..self.ranges.len() {
            let begin = self.ranges[index - 1].end;
            if let Some(end) = begin.checked_add(size)
                && end <= self.ranges[index].begin
            {
                self.ranges.insert(index, Range { begin, end });
                return Some(begin);
            }
        }

        let begin = self.ranges[self.ranges.len() - 1].end;
        if let Some(end) = begin.checked_add(size)
            && end < self.size
        {
            self.ranges.push(Range { begin, end });
            return Some(begin);
        }
        None
    }

    /// Removes the range starting at `begin` and returns its width.
    ///
    /// Removing the last range resets the chunk to an empty slot, releasing its storage.
    ///
    /// # Panics
    /// Panics if no range starts at `begin`.
    pub(crate) fn remove_range(&mut self, begin: u32) -> u32 {
        let index = self.index_of(begin);
        let removed = self.ranges.remove(index);
        if self.ranges.is_empty() {
            *self = Self::default();
        }
        removed.len()
    }

    /// Moves the end of the range starting at `begin` so that it is `size` bytes wide.
    ///
    /// The range may grow up to the next range's begin, or up to the chunk capacity
    /// if it is the last one. Returns the previous width.
    ///
    /// # Panics
    /// Panics if no range starts at `begin`.
    pub(crate) fn resize_range(&mut self, begin: u32, size: u32) -> Result<u32, MemoryError> {
        if size == 0 {
            return Err(MemoryError::ZeroSized);
        }
        let index = self.index_of(begin);
        let limit = self
            .ranges
            .get(index + 1)
            .map_or(self.size, |next| next.begin);
        let end = begin as u64 + size as u64;
        if end > limit as u64 {
            return Err(MemoryError::RangeOverflow { begin, end, limit });
        }
        let range = &mut self.ranges[index];
        let previous = range.len();
        range.end = end as u32;
        Ok(previous)
    }

    /// Returns the range starting at `begin`.
    ///
    /// # Panics
    /// Panics if no range starts at `begin`.
    pub(crate) fn range(&self, begin: u32) -> Range {
        self.ranges[self.index_of(begin)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(size: u32, ranges: &[(u32, u32)]) -> Chunk<()> {
        Chunk {
            storage: Some(()),
            size,
            ranges: ranges
                .iter()
                .map(|&(begin, end)| Range { begin, end })
                .collect(),
        }
    }

    fn spans(chunk: &Chunk<()>) -> Vec<(u32, u32)> {
        chunk.ranges.iter().map(|r| (r.begin, r.end)).collect()
    }

    #[test]
    fn empty_chunk_accepts_full_capacity() {
        let mut c = chunk(100, &[]);
        assert_eq!(c.allocate(100), Some(0));
        assert_eq!(spans(&c), [(0, 100)]);
        assert_eq!(c.allocate(1), None);
    }

    #[test]
    fn empty_slot_rejects_everything() {
        let mut c = Chunk::<()>::default();
        assert!(c.is_empty());
        assert_eq!(c.allocate(1), None);
        assert!(c.ranges.is_empty());
    }

    #[test]
    fn first_fit_takes_earliest_interior_gap() {
        // Interior gaps of widths 10, 3 and 20, in that order.
        let mut c = chunk(100, &[(0, 5), (15, 20), (23, 30), (50, 100)]);
        assert_eq!(c.allocate(5), Some(5), "must land in the width-10 gap");
        assert_eq!(
            spans(&c),
            [(0, 5), (5, 10), (15, 20), (23, 30), (50, 100)]
        );
        assert_eq!(c.allocate(5), Some(10), "rest of the width-10 gap is still first");
        assert_eq!(c.allocate(4), Some(30), "width-3 gap is skipped");
    }

    #[test]
    fn first_fit_takes_leading_gap() {
        // Leading gap 10, interior gap 3, interior gap 20.
        let mut c = chunk(100, &[(10, 20), (23, 40), (60, 100)]);
        assert_eq!(c.allocate(5), Some(0));
        assert_eq!(spans(&c)[0], (0, 5));
    }

    #[test]
    fn interior_gap_can_be_filled_exactly() {
        let mut c = chunk(100, &[(0, 10), (20, 30)]);
        assert_eq!(c.allocate(10), Some(10));
        assert_eq!(spans(&c), [(0, 10), (10, 20), (20, 30)]);
    }

    #[test]
    fn leading_gap_must_be_strictly_larger() {
        let mut c = chunk(30, &[(10, 20)]);
        assert_eq!(c.allocate(10), None, "exact fit before the first range is rejected");
        assert_eq!(c.allocate(9), Some(0));
    }

    #[test]
    fn tail_gap_must_be_strictly_larger() {
        let mut c = chunk(100, &[(0, 90)]);
        assert_eq!(c.allocate(10), None, "exact fit of the tail is rejected");
        assert_eq!(spans(&c), [(0, 90)]);
        assert_eq!(c.allocate(9), Some(90));
        assert_eq!(spans(&c), [(0, 90), (90, 99)]);
    }

    #[test]
    fn oversized_request_does_not_overflow() {
        let mut c = chunk(100, &[(0, 10), (20, 30)]);
        assert_eq!(c.allocate(u32::MAX), None);
        assert_eq!(spans(&c), [(0, 10), (20, 30)]);
    }

    #[test]
    fn remove_range_keeps_order() {
        let mut c = chunk(100, &[(0, 10), (10, 25), (40, 50)]);
        assert_eq!(c.remove_range(10), 15);
        assert_eq!(spans(&c), [(0, 10), (40, 50)]);
        assert_eq!(c.size, 100);
        assert!(c.storage.is_some());
    }

    #[test]
    fn removing_last_range_empties_the_chunk() {
        let mut c = chunk(100, &[(40, 50)]);
        assert_eq!(c.remove_range(40), 10);
        assert!(c.is_empty());
        assert!(c.storage.is_none(), "storage is released eagerly");
        assert!(c.ranges.is_empty());
    }

    #[test]
    #[should_panic(expected = "no live range begins at offset 5")]
    fn remove_unknown_range_panics() {
        let mut c = chunk(100, &[(0, 10)]);
        c.remove_range(5);
    }

    #[test]
    fn resize_within_gap() {
        let mut c = chunk(100, &[(0, 10), (20, 30)]);
        assert_eq!(c.resize_range(0, 20), Ok(10));
        assert_eq!(spans(&c), [(0, 20), (20, 30)]);
        assert_eq!(c.resize_range(0, 4), Ok(20));
        assert_eq!(spans(&c), [(0, 4), (20, 30)]);
    }

    #[test]
    fn resize_into_neighbor_is_rejected() {
        let mut c = chunk(100, &[(0, 10), (20, 30)]);
        assert_eq!(
            c.resize_range(0, 21),
            Err(MemoryError::RangeOverflow {
                begin: 0,
                end: 21,
                limit: 20
            })
        );
        assert_eq!(spans(&c), [(0, 10), (20, 30)], "failed resize changes nothing");
    }

    #[test]
    fn resize_last_range_up_to_capacity() {
        let mut c = chunk(100, &[(0, 10), (20, 30)]);
        assert_eq!(c.resize_range(20, 80), Ok(10));
        assert_eq!(c.range(20), Range { begin: 20, end: 100 });
        assert!(matches!(
            c.resize_range(20, 81),
            Err(MemoryError::RangeOverflow { limit: 100, .. })
        ));
        assert_eq!(c.resize_range(20, 0), Err(MemoryError::ZeroSized));
    }

    #[test]
    fn range_lookup() {
        let c = chunk(100, &[(0, 10), (20, 30)]);
        assert!(c.contains(20));
        assert!(!c.contains(25), "only begin offsets name ranges");
        assert_eq!(c.range(20), Range { begin: 20, end: 30 });
        assert_eq!(c.range(20).len(), 10);
    }

    #[test]
    #[should_panic]
    fn range_lookup_requires_exact_begin() {
        let c = chunk(100, &[(0, 10), (20, 30)]);
        c.range(25);
    }
}
