//! Scoped backend lifetime.

use super::traits::TagBackend;
use crate::Result;
use std::ops::Deref;
use tracing::{debug, warn};

/// Opens a backend on creation and closes it when dropped.
///
/// Dropping the session, including during a panic unwind, closes the
/// backend; close failures on that path are logged. Call [`close`] to observe
/// the close result instead.
///
/// [`close`]: BackendSession::close
pub struct BackendSession<'a, B: TagBackend + ?Sized> {
    backend: &'a B,
    closed: bool,
}

impl<'a, B: TagBackend + ?Sized> BackendSession<'a, B> {
    pub fn open(backend: &'a B) -> Result<Self> {
        backend.open()?;
        debug!("Opened {} backend", backend.name());
        Ok(Self {
            backend,
            closed: false,
        })
    }

    /// Close the backend, returning any close error.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.backend.close()
    }
}

impl<B: TagBackend + ?Sized> Deref for BackendSession<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.backend
    }
}

impl<B: TagBackend + ?Sized> Drop for BackendSession<'_, B> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match self.backend.close() {
            Ok(()) => debug!("Closed {} backend", self.backend.name()),
            Err(e) => warn!("Failed to close {} backend: {}", self.backend.name(), e),
        }
    }
}
