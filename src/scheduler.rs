//! Two-cadence cycle scheduler.
//!
//! The control loop polls the scheduler with the current uptime; the
//! scheduler answers which of the two jobs are due.  Channel servicing runs
//! on a short cadence so inbound commands are never starved by the slower
//! sampling cycle.
//!
//! ```text
//!   time ─────┬──────┬──────┬──────┬── … ──┬──────┬──▶
//!   service   ▲      ▲      ▲      ▲       ▲      ▲        every 100 ms
//!   sample    ▲                            ▲               every 2000 ms
//! ```
//!
//! A late poll fires each due job once; missed slots are not replayed.

use log::debug;

use crate::config::ControllerConfig;

/// Which jobs the caller should run on this iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    /// Service both channels (connect attempts + inbound messages).
    pub service: bool,
    /// Sample, decide, apply and broadcast.
    pub sample: bool,
}

impl Due {
    pub fn any(&self) -> bool {
        self.service || self.sample
    }
}

/// One recurring job.
#[derive(Debug, Clone, Copy)]
struct Cadence {
    label: &'static str,
    interval_ms: u64,
    last_ms: Option<u64>,
    slipped: u32,
}

impl Cadence {
    const fn new(label: &'static str, interval_ms: u32) -> Self {
        Self {
            label,
            interval_ms: interval_ms as u64,
            last_ms: None,
            slipped: 0,
        }
    }

    /// Fires on the first poll, then whenever a full interval has passed.
    fn poll(&mut self, now_ms: u64) -> bool {
        let due = match self.last_ms {
            None => true,
            Some(last) => {
                let elapsed = now_ms.saturating_sub(last);
                if self.interval_ms > 0 && elapsed >= 2 * self.interval_ms {
                    self.slipped = self.slipped.saturating_add(1);
                    debug!("Scheduler: {} cadence slipped ({} ms late)", self.label, elapsed - self.interval_ms);
                }
                elapsed >= self.interval_ms
            }
        };
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }

    fn next_due_ms(&self) -> u64 {
        self.last_ms.map_or(0, |last| last.saturating_add(self.interval_ms))
    }
}

/// The scheduler engine.
#[derive(Debug, Clone)]
pub struct CycleScheduler {
    sample: Cadence,
    service: Cadence,
}

impl CycleScheduler {
    pub fn new(sample_interval_ms: u32, service_interval_ms: u32) -> Self {
        Self {
            sample: Cadence::new("sample", sample_interval_ms),
            service: Cadence::new("service", service_interval_ms),
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.sample_interval_ms, config.service_interval_ms)
    }

    /// Decide what runs now.  Call once per loop iteration.
    pub fn poll(&mut self, now_ms: u64) -> Due {
        Due {
            service: self.service.poll(now_ms),
            sample: self.sample.poll(now_ms),
        }
    }

    /// Milliseconds until the next job becomes due (0 if one already is).
    pub fn idle_ms(&self, now_ms: u64) -> u64 {
        self.sample
            .next_due_ms()
            .min(self.service.next_due_ms())
            .saturating_sub(now_ms)
    }

    /// Times a cadence was found more than one full interval late.
    pub fn slipped(&self) -> (u32, u32) {
        (self.sample.slipped, self.service.slipped)
    }
}
