//! Depth-sorted child storage shared by every group layer variant.
//!
//! Children are kept in ascending depth order. Among equal depths, children keep their
//! insertion order: a new child is placed after every existing child of the same depth.
//! Each entry caches the depth it was inserted with so lookups never have to consult the
//! child itself; callers report depth changes through [`GroupLayerCore::depth_changed`].

/// One entry in a [`GroupLayerCore`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Child<T> {
    pub depth: f32,
    pub item: T,
}

/// Sorted child sequence with binary-search insertion, lookup and repositioning.
#[derive(Debug, Clone)]
pub struct GroupLayerCore<T> {
    children: Vec<Child<T>>,
}

impl<T> Default for GroupLayerCore<T> {
    fn default() -> Self {
        Self {
            children: Vec::new(),
        }
    }
}

impl<T: Copy + PartialEq> GroupLayerCore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.children.get(index).map(|c| c.item)
    }

    pub fn depth_at(&self, index: usize) -> Option<f32> {
        self.children.get(index).map(|c| c.depth)
    }

    /// Children in paint order (lowest depth first).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = T> + '_ {
        self.children.iter().map(|c| c.item)
    }

    /// Insert `item` at its sorted position and return the index it landed at.
    ///
    /// Appending (depth ≥ the last child's depth) skips the search entirely.
    pub fn add(&mut self, item: T, depth: f32) -> usize {
        let index = match self.children.last() {
            None => 0,
            Some(last) if last.depth <= depth => self.children.len(),
            Some(_) => self.find_insertion(depth),
        };
        self.children.insert(index, Child { depth, item });
        index
    }

    /// Index at which a child of `depth` would be inserted: just past the last child whose
    /// depth is ≤ `depth`.
    pub fn find_insertion(&self, depth: f32) -> usize {
        let (mut low, mut high) = (0, self.children.len());
        while low < high {
            let mid = (low + high) / 2;
            if self.children[mid].depth <= depth {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low
    }

    /// Locate `item`, which must have been stored with `depth`.
    ///
    /// Binary-searches to the end of the run of children sharing `depth`, then scans only
    /// that run.
    pub fn find_child(&self, item: T, depth: f32) -> Option<usize> {
        let end = self.find_insertion(depth);
        (0..end)
            .rev()
            .take_while(|&ii| self.children[ii].depth == depth)
            .find(|&ii| self.children[ii].item == item)
    }

    /// Remove `item` (stored with `depth`), returning the index it occupied.
    pub fn remove(&mut self, item: T, depth: f32) -> Option<usize> {
        let index = self.find_child(item, depth)?;
        self.children.remove(index);
        Some(index)
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove_at(&mut self, index: usize) -> Child<T> {
        self.children.remove(index)
    }

    /// Reposition `item` after its depth changed from `old_depth` to `new_depth`.
    ///
    /// If the neighbours still bracket the new depth the child stays put; otherwise it is
    /// removed and re-inserted. Returns the child's index afterwards, or `None` if the child
    /// was not found under `old_depth`.
    pub fn depth_changed(&mut self, item: T, old_depth: f32, new_depth: f32) -> Option<usize> {
        let old_index = self.find_child(item, old_depth)?;
        let last = self.children.len() - 1;
        let left_ok = old_index == 0 || self.children[old_index - 1].depth <= new_depth;
        let right_ok = old_index == last || self.children[old_index + 1].depth >= new_depth;
        if left_ok && right_ok {
            self.children[old_index].depth = new_depth;
            return Some(old_index);
        }
        self.children.remove(old_index);
        Some(self.add(item, new_depth))
    }

    /// Remove every child, returning them in paint order.
    pub fn take_all(&mut self) -> Vec<T> {
        self.children.drain(..).map(|c| c.item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depths<T: Copy + PartialEq>(core: &GroupLayerCore<T>) -> Vec<f32> {
        (0..core.len()).filter_map(|ii| core.depth_at(ii)).collect()
    }

    fn is_sorted(values: &[f32]) -> bool {
        values.windows(2).all(|w| w[0] <= w[1])
    }

    /// Small deterministic generator so the randomized tests are reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn below(&mut self, n: u64) -> u64 {
            self.next() % n
        }
    }

    #[test]
    fn test_depth_ordering() {
        let mut core = GroupLayerCore::new();
        for (id, depth) in [0.0, -1.0, 1.0, 3.0, 2.0].into_iter().enumerate() {
            core.add(id, depth);
        }
        assert_eq!(depths(&core), vec![-1.0, 0.0, 1.0, 2.0, 3.0]);
        assert_eq!(core.iter().collect::<Vec<_>>(), vec![1, 0, 2, 4, 3]);
        assert_eq!(core.iter().rev().next(), Some(3));
    }

    #[test]
    fn test_equal_depths_keep_insertion_order() {
        let mut core = GroupLayerCore::new();
        core.add('a', 1.0);
        core.add('z', 5.0);
        core.add('b', 1.0);
        core.add('c', 1.0);
        core.add('_', 0.0);
        assert_eq!(core.iter().collect::<String>(), "_abcz");
    }

    #[test]
    fn test_append_fast_path_index() {
        let mut core = GroupLayerCore::new();
        assert_eq!(core.add(1, 0.0), 0);
        assert_eq!(core.add(2, 0.0), 1);
        assert_eq!(core.add(3, 4.0), 2);
        assert_eq!(core.add(4, 2.0), 2);
    }

    #[test]
    fn test_find_and_remove() {
        let mut core = GroupLayerCore::new();
        for id in 0..6 {
            core.add(id, (id % 2) as f32);
        }
        assert_eq!(core.find_child(3, 1.0), Some(4));
        assert_eq!(core.find_child(3, 0.0), None);
        assert_eq!(core.remove(2, 0.0), Some(1));
        assert_eq!(core.len(), 5);
        assert_eq!(core.remove(2, 0.0), None);
        assert_eq!(core.remove_at(0).item, 0);
    }

    #[test]
    fn test_depth_changed_fast_path_keeps_index() {
        let mut core = GroupLayerCore::new();
        core.add(10, 0.0);
        core.add(11, 5.0);
        core.add(12, 10.0);
        assert_eq!(core.depth_changed(11, 5.0, 7.0), Some(1));
        assert_eq!(depths(&core), vec![0.0, 7.0, 10.0]);
    }

    #[test]
    fn test_depth_changed_moves_child() {
        let mut core = GroupLayerCore::new();
        core.add(10, 0.0);
        core.add(11, 5.0);
        core.add(12, 10.0);
        assert_eq!(core.depth_changed(10, 0.0, 20.0), Some(2));
        assert_eq!(core.iter().collect::<Vec<_>>(), vec![11, 12, 10]);
        assert_eq!(core.depth_changed(12, 10.0, -3.0), Some(0));
        assert_eq!(core.iter().collect::<Vec<_>>(), vec![12, 11, 10]);
        assert_eq!(core.depth_changed(99, 1.0, 2.0), None);
    }

    #[test]
    fn test_random_ops_stay_sorted_and_searchable() {
        let mut rng = Lcg(0x5eed);
        let mut core = GroupLayerCore::new();
        let mut live: Vec<(u32, f32)> = Vec::new();
        let mut next_id = 0u32;

        for _ in 0..2000 {
            match rng.below(3) {
                0 => {
                    let depth = rng.below(8) as f32 - 4.0;
                    core.add(next_id, depth);
                    live.push((next_id, depth));
                    next_id += 1;
                }
                1 if !live.is_empty() => {
                    let (id, depth) = live.swap_remove(rng.below(live.len() as u64) as usize);
                    assert!(core.remove(id, depth).is_some());
                }
                2 if !live.is_empty() => {
                    let slot = rng.below(live.len() as u64) as usize;
                    let (id, old) = live[slot];
                    let new = rng.below(8) as f32 - 4.0;
                    core.depth_changed(id, old, new);
                    live[slot].1 = new;
                }
                _ => {}
            }

            assert!(is_sorted(&depths(&core)));
            assert_eq!(core.len(), live.len());
            for &(id, depth) in &live {
                let linear = core.iter().position(|c| c == id);
                assert_eq!(core.find_child(id, depth), linear);
            }
        }
    }

    #[test]
    fn test_take_all() {
        let mut core = GroupLayerCore::new();
        core.add(1, 1.0);
        core.add(0, 0.0);
        assert_eq!(core.take_all(), vec![0, 1]);
        assert!(core.is_empty());
    }
}
