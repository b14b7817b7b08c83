use std::time::{Duration, Instant};

/// Guards the receiving side of a hop while it applies an inbound update.
///
/// The flag is raised with [`begin`](Self::begin) before the update is pushed
/// and cleared `settle` after [`settle`](Self::settle) is called, so change
/// notifications the push produces asynchronously still land inside it.
#[derive(Debug, Clone)]
pub struct SuppressionWindow {
    settle: Duration,
    active: bool,
    clear_at: Option<Instant>,
}

impl SuppressionWindow {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            active: false,
            clear_at: None,
        }
    }

    pub fn settle_window(&self) -> Duration {
        self.settle
    }

    /// Raises the flag with no deadline. A pending deadline is cancelled.
    pub fn begin(&mut self) {
        self.active = true;
        self.clear_at = None;
    }

    /// Schedules the deferred clear.
    pub fn settle(&mut self, now: Instant) {
        if self.active {
            self.clear_at = Some(now + self.settle);
        }
    }

    /// Clears immediately; used when the apply failed and nothing will echo.
    pub fn release(&mut self) {
        self.active = false;
        self.clear_at = None;
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.active && self.clear_at.is_none_or(|clear_at| now < clear_at)
    }

    /// Performs the deferred clear once due. Returns true if it cleared.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.active && self.clear_at.is_some_and(|clear_at| now >= clear_at) {
            self.release();
            true
        } else {
            false
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        if self.active { self.clear_at } else { None }
    }
}
