//! Opaque, backend-owned handles.
//!
//! A [`Handle`] never lets the harness dereference the value the backend
//! returned for an engine, a descriptor, a benchmark, or any pipeline-stage
//! data — it only stores it, passes it back across the bridge, and destroys
//! it exactly once. Each `Handle` has a single owner and a single destructor
//! call site, and panics on drop if that destructor was never called, so a
//! forgotten cleanup path is a loud bug rather than a silent leak.

use crate::bridge::{BackendProxy, RawHandle};
use crate::error::HarnessError;

/// An opaque value returned by the backend, tied to the [`BackendProxy`] that
/// can destroy it.
///
/// `Handle` is intentionally not `Clone` or `Copy`: ownership of a backend
/// resource is unique, and every handle must be destroyed exactly once.
pub struct Handle<'p> {
    raw: RawHandle,
    label: &'static str,
    proxy: &'p BackendProxy,
    destroyed: bool,
}

impl<'p> Handle<'p> {
    /// Wraps a raw backend handle. Only [`BackendProxy`] constructs these —
    /// nothing else in the harness is allowed to invent a handle.
    pub(crate) fn new(raw: RawHandle, label: &'static str, proxy: &'p BackendProxy) -> Self {
        Self {
            raw,
            label,
            proxy,
            destroyed: false,
        }
    }

    /// The raw value, for passing back into another bridge call.
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// A short label identifying what this handle denotes, for logging.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// The proxy this handle was created from, so code holding only a
    /// `Handle` (the Runner's pipeline stages) can make further bridge calls
    /// against the same backend without threading a separate reference
    /// through every function signature.
    pub(crate) fn proxy(&self) -> &'p BackendProxy {
        self.proxy
    }

    /// Destroys the backend resource this handle refers to.
    ///
    /// Consumes `self` so it cannot be destroyed twice at the type level.
    /// Callers that need LIFO cleanup over several handles (the Runner's
    /// pipeline-cleanup step) should call this in reverse acquisition order.
    pub fn destroy(mut self) -> Result<(), HarnessError> {
        let result = self.proxy.destroy_handle(self.raw);
        self.destroyed = true;
        result
    }
}

impl Drop for Handle<'_> {
    fn drop(&mut self) {
        if !self.destroyed {
            // A real panic, not a log line: a handle leak means the Runner's
            // LIFO cleanup path has a bug, and that should fail loudly in
            // development and in tests rather than quietly leaking backend
            // resources in production.
            panic!(
                "handle '{}' (raw={}) was dropped without being destroyed",
                self.label, self.raw
            );
        }
    }
}

impl std::fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("raw", &self.raw)
            .field("label", &self.label)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::MockBridge;

    #[test]
    fn destroy_satisfies_the_drop_guard() {
        let proxy = BackendProxy::new(Box::new(MockBridge::new()));
        let handle = proxy.init_engine().expect("init should succeed");
        handle.destroy().expect("destroy should succeed");
    }

    #[test]
    #[should_panic(expected = "was dropped without being destroyed")]
    fn dropping_without_destroy_panics() {
        let proxy = BackendProxy::new(Box::new(MockBridge::new()));
        let _handle = proxy.init_engine().expect("init should succeed");
        // Falls out of scope here without `.destroy()` being called.
    }
}
