use leafview_common::{Aabb, LeafIndex, RenderHandle};
use parking_lot::Mutex;

/// Leaf placement computed off the owning thread, applied later in `order`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInsert {
    /// Position in the dirty batch; draining sorts by it.
    pub order: usize,
    pub handle: RenderHandle,
    pub bloated: Aabb,
    /// Leaves overlapping `bloated`; `None` when the bloated bounds did not change.
    pub leaves: Option<Vec<LeafIndex>>,
}

/// Lock-protected queue filled by workers and drained once on the owning thread.
#[derive(Debug, Default)]
pub struct DeferredInserts {
    queue: Mutex<Vec<PendingInsert>>,
}

impl DeferredInserts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn push(&self, item: PendingInsert) {
        self.queue.lock().push(item);
    }

    pub fn extend(&self, items: impl IntoIterator<Item = PendingInsert>) {
        self.queue.lock().extend(items);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Takes every queued item in batch order.
    pub fn drain_sorted(&self) -> Vec<PendingInsert> {
        let mut items = std::mem::take(&mut *self.queue.lock());
        items.sort_by_key(|item| item.order);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn drain_restores_batch_order_across_threads() {
        let mut keys: SlotMap<RenderHandle, ()> = SlotMap::with_key();
        let handles: Vec<RenderHandle> = (0..64).map(|_| keys.insert(())).collect();
        let queue = DeferredInserts::new();

        std::thread::scope(|scope| {
            for chunk in handles.chunks(16).enumerate().collect::<Vec<_>>().into_iter().rev() {
                let queue = &queue;
                scope.spawn(move || {
                    let (chunk_index, chunk) = chunk;
                    for (i, &handle) in chunk.iter().enumerate() {
                        queue.push(PendingInsert {
                            order: chunk_index * 16 + i,
                            handle,
                            bloated: Aabb::default(),
                            leaves: None,
                        });
                    }
                });
            }
        });

        assert_eq!(queue.len(), 64);
        let drained = queue.drain_sorted();
        assert!(queue.is_empty());
        let order: Vec<RenderHandle> = drained.iter().map(|p| p.handle).collect();
        assert_eq!(order, handles);
    }
}
