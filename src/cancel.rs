// Cooperative cancellation (SPEC_FULL.md §5), grounded on the reference
// crate's job subsystem cancel-flag pattern: a shared `Arc<AtomicBool>`
// checked between tables and between sources rather than a hard interrupt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{MergeError, Result};

#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Convenience check the orchestrator calls between tables/sources.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(MergeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
