//! Handle-addressed storage for GPU resources.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Type-safe resource handle
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Handle<T> {
    id: u64,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Allocate a fresh, never reused handle.
    pub fn next() -> Self {
        Self {
            id: HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            _phantom: PhantomData,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

/// Registry mapping handles to wgpu resources, one map per resource type.
#[derive(Default)]
pub struct ResourceRegistry {
    maps: HashMap<TypeId, Box<dyn Any>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map<T: 'static>(&self) -> Option<&HashMap<u64, T>> {
        self.maps
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref())
    }

    fn map_mut<T: 'static>(&mut self) -> &mut HashMap<u64, T> {
        let slot = self
            .maps
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(HashMap::<u64, T>::new()));
        match slot.downcast_mut() {
            Some(map) => map,
            // Every slot is created with the map type of its key.
            None => unreachable!("resource map stored under the wrong type id"),
        }
    }

    /// Store a resource and return its handle.
    pub fn insert<T: 'static>(&mut self, resource: T) -> Handle<T> {
        let handle = Handle::next();
        self.map_mut::<T>().insert(handle.id, resource);
        handle
    }

    pub fn get<T: 'static>(&self, handle: Handle<T>) -> Option<&T> {
        self.map::<T>()?.get(&handle.id)
    }

    /// Remove a resource, handing it back so the caller can destroy it.
    pub fn remove<T: 'static>(&mut self, handle: Handle<T>) -> Option<T> {
        self.map_mut::<T>().remove(&handle.id)
    }

    pub fn contains<T: 'static>(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live resources of type `T`.
    pub fn len<T: 'static>(&self) -> usize {
        self.map::<T>().map_or(0, HashMap::len)
    }
}
