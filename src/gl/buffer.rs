use super::BufferHandle;

/// CPU staging for one GPU buffer: a write position that never passes the capacity the
/// GPU-side allocation was made with.
#[derive(Debug)]
pub(crate) struct GrowableBuffer<T> {
    handle: BufferHandle,
    data: Vec<T>,
    capacity: usize,
}

impl<T: Copy> GrowableBuffer<T> {
    pub(crate) fn new(handle: BufferHandle, capacity: usize) -> Self {
        Self {
            handle,
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of elements written since the last reset.
    pub(crate) fn position(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// # Panics
    ///
    /// Panics if the buffer is full.
    pub(crate) fn push(&mut self, value: T) {
        assert!(
            self.data.len() < self.capacity,
            "buffer overflow (capacity {})",
            self.capacity
        );
        self.data.push(value);
    }

    pub(crate) fn reset(&mut self) {
        self.data.clear();
    }

    /// Change the capacity. Only legal between primitives, with nothing pending.
    ///
    /// # Panics
    ///
    /// Panics if the buffer holds unflushed data.
    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        assert!(
            self.data.is_empty(),
            "cannot resize a buffer holding {} unflushed elements",
            self.data.len()
        );
        self.capacity = capacity;
        self.data.reserve(capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_tracks_writes() {
        let mut buf = GrowableBuffer::<u16>::new(BufferHandle(1), 3);
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.position(), 2);
        assert_eq!(buf.remaining(), 1);
        assert_eq!(buf.as_slice(), &[1, 2]);
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 3);
    }

    #[test]
    #[should_panic(expected = "buffer overflow")]
    fn test_push_past_capacity_panics() {
        let mut buf = GrowableBuffer::<u16>::new(BufferHandle(1), 1);
        buf.push(1);
        buf.push(2);
    }

    #[test]
    #[should_panic(expected = "unflushed")]
    fn test_resize_with_pending_data_panics() {
        let mut buf = GrowableBuffer::<u16>::new(BufferHandle(1), 4);
        buf.push(1);
        buf.set_capacity(8);
    }

    #[test]
    fn test_resize_when_empty() {
        let mut buf = GrowableBuffer::<u16>::new(BufferHandle(1), 4);
        buf.set_capacity(8);
        assert_eq!(buf.capacity(), 8);
    }
}
