use std::sync::{Mutex, PoisonError};

use super::{FramebufferHandle, TextureHandle};

/// GPU resources whose last handle was dropped, waiting for the GPU thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingDestroy {
    pub texture: TextureHandle,
    pub framebuffer: Option<FramebufferHandle>,
}

/// Thread-safe queue of pending destroys.
///
/// Textures can be dropped on any thread; the GPU objects behind them are only deleted
/// when the owning [`GlContext`](super::GlContext) drains this queue once per frame.
#[derive(Debug, Default)]
pub struct DestroyQueue {
    pending: Mutex<Vec<PendingDestroy>>,
}

impl DestroyQueue {
    pub fn push(&self, destroy: PendingDestroy) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(destroy);
    }

    /// Take every pending request. The lock is released before the caller touches the GPU.
    pub fn drain(&self) -> Vec<PendingDestroy> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_push_from_other_threads() {
        let queue = Arc::new(DestroyQueue::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    queue.push(PendingDestroy {
                        texture: TextureHandle(i),
                        framebuffer: None,
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 4);
        let mut drained: Vec<u32> = queue.drain().iter().map(|d| d.texture.0).collect();
        drained.sort();
        assert_eq!(drained, vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }
}
