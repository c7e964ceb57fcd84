// src/schedule/stop.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared, set-once stop signal.
///
/// Clones observe the same flag. Setting it more than once has no further
/// effect, and reading it never blocks.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    inner: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}
