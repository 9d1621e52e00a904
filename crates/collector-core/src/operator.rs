//! Stop control shared between the draw loop and the interrupt handler.
//!
//! The draw loop runs on a blocking thread; the interrupt handler is an
//! async task. They share a single [`StopSignal`], an atomic flag the
//! loop polls once per draw, after the draw has been fully applied to
//! the run state. No lock is ever taken on the hot path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Reason the draw loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every population member has been retained at least once.
    Completed,
    /// A stop was requested before completion.
    Interrupted,
}

impl EndReason {
    /// Human-readable run status used in reports.
    pub const fn status(self) -> &'static str {
        match self {
            Self::Completed => "complete",
            Self::Interrupted => "incomplete",
        }
    }
}

/// Cloneable handle to a shared stop flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a signal with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a clean stop at the next safe point.
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
