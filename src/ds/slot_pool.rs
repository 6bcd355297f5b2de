#![allow(clippy::len_without_is_empty)]
use std::ops::{Index, IndexMut};

/// An arena of reusable slots
///
/// Released slots go onto a free stack and are handed out again by [`acquire`](SlotPool::acquire)
/// before any new backing storage is requested, so a container that is filled and cleared every
/// step settles at its high-water mark and stops allocating.
#[derive(Debug, Clone)]
pub struct SlotPool<T> {
    slots: Vec<T>,
    occupied: Vec<bool>,
    free: Vec<usize>,
    allocations: usize,
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotPool<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            occupied: Vec::new(),
            free: Vec::new(),
            allocations: 0,
        }
    }

    /// Constructs a pool with `count` slots already created and waiting on the free stack
    pub fn with_slots(count: usize) -> Self
    where
        T: Default,
    {
        let mut pool = Self::new();
        pool.reserve_slots(count);
        pool
    }

    /// Create `count` additional free slots up front
    pub fn reserve_slots(&mut self, count: usize)
    where
        T: Default,
    {
        self.slots.reserve(count);
        self.occupied.reserve(count);
        self.free.reserve(count);
        for _ in 0..count {
            self.free.push(self.slots.len());
            self.slots.push(T::default());
            self.occupied.push(false);
            self.allocations += 1;
        }
    }

    /// Store `value` in a free slot, creating a new one only if the free stack is empty
    ///
    /// **Returns** the slot id
    pub fn acquire(&mut self, value: T) -> usize {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = value;
                self.occupied[id] = true;
                id
            }
            None => {
                self.slots.push(value);
                self.occupied.push(true);
                self.allocations += 1;
                self.slots.len() - 1
            }
        }
    }

    /// Return a slot to the free stack. The stored value stays in place until the slot is reused.
    ///
    /// **Panics** if the slot is not currently handed out
    pub fn release(&mut self, id: usize) {
        assert!(
            self.occupied.get(id).copied().unwrap_or(false),
            "Slot {id} is not in use"
        );
        self.occupied[id] = false;
        self.free.push(id);
    }

    /// Return every slot in `ids` to the free stack
    pub fn release_all(&mut self, ids: impl IntoIterator<Item = usize>) {
        for id in ids {
            self.release(id);
        }
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.slots.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.slots.get_mut(id)
    }

    /// Number of slots currently handed out
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Number of slots created so far, in use or free
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total number of slots ever created, including ones dropped by [`clear_and_delete`](SlotPool::clear_and_delete)
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Drop every slot and release the backing memory
    pub fn clear_and_delete(&mut self) {
        self.slots = Vec::new();
        self.occupied = Vec::new();
        self.free = Vec::new();
    }
}

impl<T> Index<usize> for SlotPool<T> {
    type Output = T;

    fn index(&self, id: usize) -> &Self::Output {
        &self.slots[id]
    }
}

impl<T> IndexMut<usize> for SlotPool<T> {
    fn index_mut(&mut self, id: usize) -> &mut Self::Output {
        &mut self.slots[id]
    }
}
