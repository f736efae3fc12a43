mod types;

pub use types::SlotIndex;

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::driver::DriverHandle;
use crate::error::SqlHandlesError;
use types::Slot;

/// Fixed-capacity table of in-flight query handles.
///
/// Slots are numbered `1..=capacity`. Allocation always takes the lowest free index, using a
/// min-heap of free indices rather than a linear scan.
#[derive(Debug)]
pub struct HandlePool {
    capacity: usize,
    inner: Mutex<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    slots: Vec<Option<Slot>>,
    free: BinaryHeap<Reverse<usize>>,
}

impl HandlePool {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let slots = std::iter::repeat_with(|| None).take(capacity).collect();
        let free = (1..=capacity).map(Reverse).collect();
        Self {
            capacity,
            inner: Mutex::new(PoolInner { slots, free }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            // Slot bookkeeping stays consistent across a panicking holder.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.capacity - self.lock().free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    /// Occupy the lowest free slot with `handle`.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::PoolExhausted` when every slot is taken. The handle is freed
    /// before returning; the statement it belongs to has already been sent to the server.
    pub fn allocate(
        &self,
        handle: Arc<dyn DriverHandle>,
        query: impl Into<String>,
    ) -> Result<SlotIndex, SqlHandlesError> {
        let query = query.into();
        let mut inner = self.lock();
        let Some(Reverse(index)) = inner.free.pop() else {
            drop(inner);
            handle.free();
            warn!(capacity = self.capacity, %query, "query handle pool exhausted, result discarded");
            return Err(SqlHandlesError::PoolExhausted {
                capacity: self.capacity,
            });
        };
        inner.slots[index - 1] = Some(Slot { handle, query });
        debug!(slot = index, "query handle allocated");
        Ok(SlotIndex::new(index))
    }

    fn take(&self, index: SlotIndex) -> Result<Slot, SqlHandlesError> {
        let mut inner = self.lock();
        let slot = index
            .get()
            .checked_sub(1)
            .and_then(|pos| inner.slots.get_mut(pos))
            .and_then(Option::take)
            .ok_or(SqlHandlesError::UnknownSlot(index.get()))?;
        inner.free.push(Reverse(index.get()));
        Ok(slot)
    }

    /// Free the slot's driver handle and clear the slot.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::UnknownSlot` if the slot is empty or out of range.
    pub fn release(&self, index: SlotIndex) -> Result<(), SqlHandlesError> {
        let slot = self.take(index)?;
        slot.handle.free();
        debug!(slot = index.get(), "query handle released");
        Ok(())
    }

    /// Clear the slot without freeing its handle, for handles the driver already freed.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::UnknownSlot` if the slot is empty or out of range.
    pub fn forget(&self, index: SlotIndex) -> Result<(), SqlHandlesError> {
        self.take(index)?;
        debug!(slot = index.get(), "query handle forgotten");
        Ok(())
    }

    /// Shared reference to the handle in `index`, for polling.
    ///
    /// # Errors
    /// Returns `SqlHandlesError::UnknownSlot` if the slot is empty or out of range.
    pub fn handle(&self, index: SlotIndex) -> Result<Arc<dyn DriverHandle>, SqlHandlesError> {
        self.lock()
            .slots
            .get(index.get().wrapping_sub(1))
            .and_then(Option::as_ref)
            .map(|slot| Arc::clone(&slot.handle))
            .ok_or(SqlHandlesError::UnknownSlot(index.get()))
    }

    /// Statement text recorded for `index`.
    #[must_use]
    pub fn query_text(&self, index: SlotIndex) -> Option<String> {
        self.lock()
            .slots
            .get(index.get().wrapping_sub(1))
            .and_then(Option::as_ref)
            .map(|slot| slot.query.clone())
    }

    /// Free every occupied slot. Returns how many handles were freed.
    pub fn drain_all(&self) -> usize {
        let drained: Vec<Slot> = {
            let mut inner = self.lock();
            let drained: Vec<Slot> = inner.slots.iter_mut().filter_map(Option::take).collect();
            inner.free = (1..=self.capacity).map(Reverse).collect();
            drained
        };
        for slot in &drained {
            slot.handle.free();
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "drained outstanding query handles");
        }
        drained.len()
    }
}

impl Drop for HandlePool {
    fn drop(&mut self) {
        self.drain_all();
    }
}
