use crate::dispatch::types::BackendKey;
use crate::schema::TypeId;
use crate::utils::{Pool, RawHandle};

/// Consumption state of a live object.
///
/// Non-builder objects sit in `Available` for their whole life. Builders
/// start `Unconsumed` and move to `Consumed` exactly once, when their
/// finalizing method completes; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Available,
    Unconsumed,
    Consumed,
}

/// Per-instance record kept by the dispatch layer: concrete type,
/// consumption state, and the backend's key for the object.
#[derive(Debug, Clone, Copy)]
pub struct ObjectRecord {
    pub ty: TypeId,
    pub lifecycle: Lifecycle,
    pub backend: BackendKey,
}

impl ObjectRecord {
    pub fn was_consumed(&self) -> bool {
        self.lifecycle == Lifecycle::Consumed
    }

    pub(crate) fn mark_consumed(&mut self) {
        self.lifecycle = Lifecycle::Consumed;
    }
}

/// Maps handles to object records. Pure bookkeeping; reference counting and
/// deallocation of the backing objects belong to the backend.
#[derive(Default)]
pub struct InstanceRegistry {
    pool: Pool<ObjectRecord>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly created object. Builders start unconsumed.
    pub fn register(
        &mut self,
        ty: TypeId,
        is_builder: bool,
        backend: BackendKey,
    ) -> Option<RawHandle> {
        let lifecycle = if is_builder {
            Lifecycle::Unconsumed
        } else {
            Lifecycle::Available
        };
        self.pool.insert(ObjectRecord {
            ty,
            lifecycle,
            backend,
        })
    }

    pub fn get(&self, handle: RawHandle) -> Option<&ObjectRecord> {
        self.pool.get(handle)
    }

    pub fn get_mut(&mut self, handle: RawHandle) -> Option<&mut ObjectRecord> {
        self.pool.get_mut(handle)
    }

    /// Stop tracking an object (host teardown); the handle goes stale.
    pub fn remove(&mut self, handle: RawHandle) -> Option<ObjectRecord> {
        self.pool.release(handle)
    }
}
