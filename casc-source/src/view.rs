//! Two-phase pending → active source swap.
//!
//! A new source is staged as `pending` while it enumerates and loads;
//! only once `load_build` succeeds does the caller promote it to
//! `active`. At most one source is active, and staging is refused while
//! one is; the consumer must unload first. Readers take an `Arc`
//! snapshot, so an in-flight request keeps a consistent source even
//! across an unload.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::source::StorageSource;

/// Shared handle to a storage source. The inner lock serializes
/// `load_build` against readers.
pub type SharedSource = Arc<tokio::sync::RwLock<StorageSource>>;

#[derive(Default)]
struct ViewInner {
    active: Option<SharedSource>,
    pending: Option<SharedSource>,
}

/// Holder for the service's storage sources.
#[derive(Default)]
pub struct CoreView {
    inner: RwLock<ViewInner>,
}

impl CoreView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a new source. Fails while another source is active.
    pub fn set_pending(&self, source: StorageSource) -> Result<SharedSource> {
        let mut inner = self.inner.write();
        if inner.active.is_some() {
            return Err(Error::ActiveAlreadyLoaded);
        }
        let shared: SharedSource = Arc::new(tokio::sync::RwLock::new(source));
        inner.pending = Some(Arc::clone(&shared));
        Ok(shared)
    }

    /// The staged source, if any.
    pub fn pending(&self) -> Option<SharedSource> {
        self.inner.read().pending.as_ref().map(Arc::clone)
    }

    /// Atomically promote the pending source to active.
    pub fn promote_pending(&self) -> Result<SharedSource> {
        let mut inner = self.inner.write();
        if inner.active.is_some() {
            return Err(Error::ActiveAlreadyLoaded);
        }
        let source = inner.pending.take().ok_or(Error::NoPendingSource)?;
        inner.active = Some(Arc::clone(&source));
        Ok(source)
    }

    /// Snapshot of the active source.
    pub fn active(&self) -> Option<SharedSource> {
        self.inner.read().active.as_ref().map(Arc::clone)
    }

    /// Snapshot of the active source, or the error collaborators map to
    /// `ERR_NO_CASC`.
    pub fn require_active(&self) -> Result<SharedSource> {
        self.active().ok_or(Error::NotLoaded)
    }

    /// Drop the active source. In-flight requests holding a snapshot
    /// finish against it; new requests see no active source.
    pub fn unload(&self) -> Option<SharedSource> {
        self.inner.write().active.take()
    }

    /// Drop a staged source that will not be promoted.
    pub fn discard_pending(&self) -> Option<SharedSource> {
        self.inner.write().pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalSource;
    use casc_cache::CascDirs;

    fn test_source() -> StorageSource {
        let dirs = CascDirs::new("/tmp/casc-extract-test");
        StorageSource::Local(LocalSource::new("/tmp/wow", dirs).unwrap())
    }

    #[test]
    fn pending_promotes_to_active() {
        let view = CoreView::new();
        assert!(view.active().is_none());
        assert!(view.pending().is_none());

        view.set_pending(test_source()).unwrap();
        assert!(view.pending().is_some());
        assert!(view.active().is_none());

        view.promote_pending().unwrap();
        assert!(view.pending().is_none());
        assert!(view.active().is_some());
    }

    #[test]
    fn staging_fails_while_active() {
        let view = CoreView::new();
        view.set_pending(test_source()).unwrap();
        view.promote_pending().unwrap();

        let err = view.set_pending(test_source()).unwrap_err();
        assert!(matches!(err, Error::ActiveAlreadyLoaded));
        assert_eq!(err.response_code(), "ERR_CASC_ACTIVE");
    }

    #[test]
    fn promote_without_pending_fails() {
        let view = CoreView::new();
        let err = view.promote_pending().unwrap_err();
        assert!(matches!(err, Error::NoPendingSource));
        assert_eq!(err.response_code(), "ERR_NO_CASC_SETUP");
    }

    #[test]
    fn unload_allows_restaging() {
        let view = CoreView::new();
        view.set_pending(test_source()).unwrap();
        view.promote_pending().unwrap();

        let snapshot = view.require_active().unwrap();
        assert!(view.unload().is_some());
        assert!(view.active().is_none());
        // The snapshot taken before the unload stays usable.
        assert!(Arc::strong_count(&snapshot) >= 1);

        view.set_pending(test_source()).unwrap();
        view.promote_pending().unwrap();
        assert!(view.active().is_some());
    }

    #[test]
    fn require_active_maps_to_no_casc() {
        let view = CoreView::new();
        let err = view.require_active().unwrap_err();
        assert_eq!(err.response_code(), "ERR_NO_CASC");
    }

    #[test]
    fn discard_pending_clears_stage() {
        let view = CoreView::new();
        view.set_pending(test_source()).unwrap();
        assert!(view.discard_pending().is_some());
        assert!(view.pending().is_none());
        assert!(view.promote_pending().is_err());
    }
}
