//! Arena-based layer storage.
//!
//! Layers live in a sparse-set arena addressed by generational [`LayerId`]s:
//!
//! - **Generational indices**: a `LayerId` carries the generation of the slot it was issued
//!   for, so a stale id held after its layer was disposed never resolves to a newer layer
//!   that reuses the slot.
//! - **Dense storage**: values are stored contiguously; removal swap-removes and patches the
//!   moved entry's sparse slot.

/// Handle to a layer stored in a [`Scene`](crate::scene::Scene).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LayerId {
    index: u32,
    generation: u32,
}

impl LayerId {
    fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Combine generation (high bits) and index (low bits) into one value for logging.
    pub fn as_u64(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }
}

struct SparseEntry {
    dense_index: usize,
    generation: u32,
}

struct Slot<T> {
    value: T,
    /// Back-pointer to the sparse entry, used to fix it up after a swap-remove.
    sparse_index: u32,
}

pub struct Arena<T> {
    dense: Vec<Slot<T>>,
    sparse: Vec<Option<SparseEntry>>,
    /// Sparse slots free for reuse, with the generation they last held.
    free: Vec<(u32, u32)>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            dense: Vec::new(),
            sparse: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> LayerId {
        let (sparse_index, generation) = match self.free.pop() {
            Some((idx, old_gen)) => (idx, old_gen.wrapping_add(1)),
            None => {
                let idx = self.sparse.len() as u32;
                self.sparse.push(None);
                (idx, 0)
            }
        };

        let dense_index = self.dense.len();
        self.dense.push(Slot {
            value,
            sparse_index,
        });
        self.sparse[sparse_index as usize] = Some(SparseEntry {
            dense_index,
            generation,
        });

        LayerId::new(sparse_index, generation)
    }

    /// Remove a value, returning it. Stale or unknown ids return `None`.
    pub fn remove(&mut self, id: LayerId) -> Option<T> {
        let dense_index = self.dense_index(id)?;
        let last = self.dense.len() - 1;
        let removed = self.dense.swap_remove(dense_index);

        if dense_index != last {
            let moved = self.dense[dense_index].sparse_index;
            if let Some(entry) = self.sparse[moved as usize].as_mut() {
                entry.dense_index = dense_index;
            }
        }

        self.sparse[id.index as usize] = None;
        self.free.push((id.index, id.generation));
        Some(removed.value)
    }

    fn dense_index(&self, id: LayerId) -> Option<usize> {
        self.sparse
            .get(id.index as usize)
            .and_then(|e| e.as_ref())
            .filter(|e| e.generation == id.generation)
            .map(|e| e.dense_index)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.dense_index(id).is_some()
    }

    pub fn get(&self, id: LayerId) -> Option<&T> {
        self.dense_index(id).map(|idx| &self.dense[idx].value)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut T> {
        self.dense_index(id).map(|idx| &mut self.dense[idx].value)
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }
}

impl<T> std::ops::Index<LayerId> for Arena<T> {
    type Output = T;

    fn index(&self, id: LayerId) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("stale layer id {id:?}"),
        }
    }
}

impl<T> std::ops::IndexMut<LayerId> for Arena<T> {
    fn index_mut(&mut self, id: LayerId) -> &mut T {
        match self.get_mut(id) {
            Some(value) => value,
            None => panic!("stale layer id {id:?}"),
        }
    }
}
