//! Change notification for blob store events.
//!
//! Observers are invoked inline on the task that performed the change, in
//! registration order. A panicking observer is not contained.

use std::sync::{Arc, PoisonError, RwLock};

use tile_common::TileObject;

/// Observer of blob store changes.
///
/// Every event has an empty default so observers implement only what they
/// track.
pub trait BlobStoreListener: Send + Sync {
    /// A tile was written where no object existed before.
    fn tile_stored(&self, _tile: &TileObject) {}

    /// A tile replaced an existing object of `old_size` bytes.
    fn tile_updated(&self, _tile: &TileObject, _old_size: u64) {}

    /// A tile was removed; `tile.blob_size` holds the freed size.
    fn tile_deleted(&self, _tile: &TileObject) {}

    fn layer_deleted(&self, _layer_name: &str) {}

    fn grid_subset_deleted(&self, _layer_name: &str, _gridset_id: &str) {}
}

/// Ordered registry of listeners owned by one store instance.
#[derive(Default)]
pub struct ListenerList {
    listeners: RwLock<Vec<Arc<dyn BlobStoreListener>>>,
}

impl ListenerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn BlobStoreListener>) {
        self.write().push(listener);
    }

    /// Remove a previously added listener, compared by identity.
    ///
    /// Returns `false` if it was never registered.
    pub fn remove_listener(&self, listener: &Arc<dyn BlobStoreListener>) -> bool {
        let mut listeners = self.write();
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drop every listener, returning how many were registered.
    pub fn clear(&self) -> usize {
        let mut listeners = self.write();
        let count = listeners.len();
        listeners.clear();
        count
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn send_tile_stored(&self, tile: &TileObject) {
        self.dispatch(|l| l.tile_stored(tile));
    }

    pub fn send_tile_updated(&self, tile: &TileObject, old_size: u64) {
        self.dispatch(|l| l.tile_updated(tile, old_size));
    }

    pub fn send_tile_deleted(&self, tile: &TileObject) {
        self.dispatch(|l| l.tile_deleted(tile));
    }

    pub fn send_layer_deleted(&self, layer_name: &str) {
        self.dispatch(|l| l.layer_deleted(layer_name));
    }

    pub fn send_grid_subset_deleted(&self, layer_name: &str, gridset_id: &str) {
        self.dispatch(|l| l.grid_subset_deleted(layer_name, gridset_id));
    }

    fn dispatch(&self, event: impl Fn(&dyn BlobStoreListener)) {
        // Snapshot so callbacks may add or remove listeners without deadlocking
        let snapshot = {
            let listeners = self.read();
            if listeners.is_empty() {
                return;
            }
            listeners.clone()
        };
        for listener in &snapshot {
            event(listener.as_ref());
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<dyn BlobStoreListener>>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn BlobStoreListener>>> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerList").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tile_common::TileCoord;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl BlobStoreListener for Recorder {
        fn tile_stored(&self, tile: &TileObject) {
            self.log.lock().unwrap().push(format!("{}:stored:{}", self.name, tile.coord));
        }

        fn tile_updated(&self, _tile: &TileObject, old_size: u64) {
            self.log.lock().unwrap().push(format!("{}:updated:{}", self.name, old_size));
        }

        fn layer_deleted(&self, layer_name: &str) {
            self.log.lock().unwrap().push(format!("{}:layer:{}", self.name, layer_name));
        }
    }

    fn tile() -> TileObject {
        TileObject::new("roads", "g", TileCoord::new(1, 2, 3), "image/png")
    }

    #[test]
    fn test_empty_list_is_noop() {
        let list = ListenerList::new();
        assert!(list.is_empty());
        list.send_tile_stored(&tile());
        list.send_grid_subset_deleted("roads", "g");
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let list = ListenerList::new();
        list.add_listener(Arc::new(Recorder { name: "first", log: log.clone() }));
        list.add_listener(Arc::new(Recorder { name: "second", log: log.clone() }));

        list.send_tile_stored(&tile());
        list.send_tile_updated(&tile(), 42);
        // Events without an override fall through to the default no-op
        list.send_tile_deleted(&tile());

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:stored:1/2/3",
                "second:stored:1/2/3",
                "first:updated:42",
                "second:updated:42",
            ]
        );
    }

    #[test]
    fn test_remove_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let list = ListenerList::new();
        let listener: Arc<dyn BlobStoreListener> = Arc::new(Recorder { name: "only", log: log.clone() });
        let stranger: Arc<dyn BlobStoreListener> = Arc::new(Recorder { name: "stranger", log: log.clone() });

        list.add_listener(listener.clone());
        assert!(!list.remove_listener(&stranger));
        assert!(list.remove_listener(&listener));
        assert!(!list.remove_listener(&listener));
        assert!(list.is_empty());

        list.send_layer_deleted("roads");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_clear() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let list = ListenerList::new();
        list.add_listener(Arc::new(Recorder { name: "a", log: log.clone() }));
        list.add_listener(Arc::new(Recorder { name: "b", log: log.clone() }));

        assert_eq!(list.clear(), 2);
        assert_eq!(list.clear(), 0);
        list.send_tile_stored(&tile());
        assert!(log.lock().unwrap().is_empty());
    }

    struct SelfRemoving {
        list: Arc<ListenerList>,
        me: Mutex<Option<Arc<dyn BlobStoreListener>>>,
    }

    impl BlobStoreListener for SelfRemoving {
        fn layer_deleted(&self, _layer_name: &str) {
            if let Some(me) = self.me.lock().unwrap().take() {
                assert!(self.list.remove_listener(&me));
            }
        }
    }

    #[test]
    fn test_listener_can_unregister_during_dispatch() {
        let list = Arc::new(ListenerList::new());
        let listener = Arc::new(SelfRemoving { list: list.clone(), me: Mutex::new(None) });
        let handle: Arc<dyn BlobStoreListener> = listener.clone();
        *listener.me.lock().unwrap() = Some(handle.clone());
        list.add_listener(handle);

        list.send_layer_deleted("roads");
        assert!(list.is_empty());
    }
}
