use std::sync::{Arc, Mutex};

/// Stores an Arc<T>, hands it out to any number of readers for any
/// length of time, and allows the Arc<T> to be replaced at any
/// time. Reminiscent of the `arc_swap` crate, or of RCU
/// (read-copy-update), although MiniArcSwap is comparatively slow,
/// both for the Arc usage and for the Mutex around it.
pub struct MiniArcSwap<T> {
    payload: Mutex<Arc<T>>
}

impl<T> MiniArcSwap<T> {
    /// Wrap the payload with the MiniArcSwap.
    pub fn new(payload: Arc<T>) -> MiniArcSwap<T> {
        MiniArcSwap { payload: Mutex::new(payload) }
    }
    /// Get the payload. Use it however long you want. This call
    /// finishes almost immediately.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&(*self.payload.lock().expect("never poisoned")))
    }
    /// Set the payload. This call finishes almost immediately and
    /// does not block any readers. From this instant on, `get`
    /// returns the new payload.
    pub fn set(&self, val: Arc<T>) {
        *self.payload.lock().expect("never poisoned") = val;
    }
}
