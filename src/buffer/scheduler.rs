/// Ticks to accumulate before flushing buffered updates
pub const DEFAULT_WINDOW_TICKS: u32 = 15;

/// Decides when the buffered update cache is due for a flush.
#[derive(Debug, Clone)]
pub struct FlushScheduler {
    window: u32,
    last_flush_tick: u32,
}

impl FlushScheduler {
    pub fn new(window: u32) -> Self {
        Self {
            window,
            last_flush_tick: 0,
        }
    }

    /// True once more than `window` ticks have passed since the last flush,
    /// or when the tick counter went backwards (wraparound or restart).
    pub fn is_due(&self, tick: u32) -> bool {
        if self.last_flush_tick > tick {
            return true;
        }
        tick - self.last_flush_tick > self.window
    }

    /// Records a flush at `tick`.
    pub fn mark_flushed(&mut self, tick: u32) {
        self.last_flush_tick = tick;
    }

    /// Checks and, when due, records the flush in one step.
    pub fn poll(&mut self, tick: u32) -> bool {
        if self.is_due(tick) {
            self.mark_flushed(tick);
            true
        } else {
            false
        }
    }

    pub fn last_flush_tick(&self) -> u32 {
        self.last_flush_tick
    }

    pub fn window(&self) -> u32 {
        self.window
    }
}

impl Default for FlushScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_TICKS)
    }
}
