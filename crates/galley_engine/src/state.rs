use std::sync::Arc;

use parking_lot::RwLock;

/// A thread-safe handle to the most recently rendered document.
///
/// RenderStateHandle provides cheap cloning (via Arc) and interior mutability
/// (via RwLock), so the HTTP service, the file watcher and the startup code
/// can all share one view of the document.
///
/// The document starts out empty and stays empty until the first successful
/// render. A failed render never replaces the stored document, callers only
/// invoke [`RenderStateHandle::set`] with successfully rendered output.
#[derive(Clone, Debug, Default)]
pub struct RenderStateHandle(Arc<RwLock<String>>);

impl RenderStateHandle {
    /// Create a new handle holding the empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current document. Empty before the first successful render.
    pub fn get(&self) -> String {
        self.0.read().clone()
    }

    /// Replace the current document.
    pub fn set(&self, document: String) {
        *self.0.write() = document;
    }
}
