//! Update-ready signal
//!
//! Set by the decoder when the batch marker field arrives, taken by the
//! renderer once per refresh cycle.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Edge flag: "a refresh batch has completed since you last asked"
///
/// Raising and taking both run inside a critical section, which orders them
/// against the field stores around them. A renderer that takes the flag sees
/// every field written before it was raised.
pub struct UpdateReady {
    inner: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for UpdateReady {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateReady {
    pub const fn new() -> Self {
        Self {
            inner: Signal::new(),
        }
    }

    /// Raise the flag. Raising an already raised flag is a no-op.
    pub fn signal_ready(&self) {
        self.inner.signal(());
    }

    /// Read and clear the flag in one step
    pub fn take_ready(&self) -> bool {
        self.inner.try_take().is_some()
    }

    /// Read the flag without clearing it
    pub fn is_ready(&self) -> bool {
        self.inner.signaled()
    }

    /// Wait until the flag is raised, then clear it
    pub async fn wait(&self) {
        self.inner.wait().await
    }
}
