use bytemuck::{Pod, Zeroable};

/// Untyped generational handle. This is the value that crosses the dispatch
/// boundary: `#[repr(C)]`, plain old data, and all-zeroes means null, so a
/// zero-initialized return slot is already a valid "no object" answer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct RawHandle {
    pub slot: u16,
    pub generation: u16,
}

impl RawHandle {
    pub const NULL: RawHandle = RawHandle {
        slot: 0,
        generation: 0,
    };

    pub fn is_null(&self) -> bool {
        self.slot == 0
    }
}

impl Default for RawHandle {
    fn default() -> Self {
        Self::NULL
    }
}

/// Slot pool behind [`RawHandle`]. Slots are reused once released; the
/// generation counter is bumped on release so stale handles stop resolving.
///
/// Slot 0 is never handed out, it is the null handle.
pub struct Pool<T> {
    items: Vec<Option<T>>,
    empty: Vec<usize>,
    generation: Vec<u16>,
}

const INITIAL_SIZE: usize = 64;

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new(INITIAL_SIZE)
    }
}

impl<T> Pool<T> {
    pub fn new(initial_size: usize) -> Self {
        let mut p = Pool {
            items: Vec::with_capacity(initial_size),
            empty: Vec::with_capacity(initial_size),
            generation: vec![0; initial_size],
        };

        p.empty = (0..initial_size).rev().collect();
        p.items.resize_with(initial_size, || None);
        p
    }

    /// Store an item and return its handle. Returns `None` once the 16-bit
    /// slot space is exhausted; the pool grows on demand before that.
    pub fn insert(&mut self, item: T) -> Option<RawHandle> {
        let index = match self.empty.pop() {
            Some(index) => index,
            None => {
                // Slot u16::MAX would collide with index-to-slot offsetting.
                if self.items.len() >= usize::from(u16::MAX) - 1 {
                    return None;
                }
                self.items.push(None);
                self.generation.push(0);
                self.items.len() - 1
            }
        };

        self.items[index] = Some(item);

        Some(RawHandle {
            slot: (index + 1) as u16,
            generation: self.generation[index],
        })
    }

    pub fn release(&mut self, handle: RawHandle) -> Option<T> {
        let index = self.index_of(handle)?;
        let item = self.items[index].take()?;
        self.generation[index] = self.generation[index].wrapping_add(1);
        self.empty.push(index);
        Some(item)
    }

    pub fn get(&self, handle: RawHandle) -> Option<&T> {
        let index = self.index_of(handle)?;
        self.items[index].as_ref()
    }

    pub fn get_mut(&mut self, handle: RawHandle) -> Option<&mut T> {
        let index = self.index_of(handle)?;
        self.items[index].as_mut()
    }

    fn index_of(&self, handle: RawHandle) -> Option<usize> {
        if handle.is_null() {
            return None;
        }
        let index = usize::from(handle.slot) - 1;
        if index >= self.items.len() || self.generation[index] != handle.generation {
            return None;
        }
        Some(index)
    }
}
