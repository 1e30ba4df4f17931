//! Per-channel connection state machine.
//!
//! ```text
//! Disconnected ──attempt──▶ Connecting ──ok──▶ Connected
//!      ▲                        │                  │
//!      └────── failed ──────────┘◀──── lost ───────┘
//! ```
//!
//! Nothing here blocks.  The owning channel asks [`Link::attempt_due`] once
//! per service pass and makes at most one transport call when it says yes.
//! A transport whose handshake completes later leaves the link in
//! `Connecting` until the owner promotes it or [`Link::attempt_expired`]
//! says to give up.

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// How long to wait after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Same delay every time.
    Fixed { delay_ms: u32 },
    /// Double after every failure, up to `max_ms`.
    Exponential { initial_ms: u32, max_ms: u32 },
}

/// Retry timer.  A fresh backoff allows an attempt immediately.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    policy: BackoffPolicy,
    delay_ms: u32,
    next_attempt_ms: u64,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            delay_ms: Self::initial(policy),
            next_attempt_ms: 0,
        }
    }

    fn initial(policy: BackoffPolicy) -> u32 {
        match policy {
            BackoffPolicy::Fixed { delay_ms } => delay_ms,
            BackoffPolicy::Exponential { initial_ms, .. } => initial_ms,
        }
    }

    pub fn ready(&self, now_ms: u64) -> bool {
        now_ms >= self.next_attempt_ms
    }

    /// Schedule the next attempt and grow the delay.  Returns the delay
    /// that was scheduled.
    pub fn failed(&mut self, now_ms: u64) -> u32 {
        let scheduled = self.delay_ms;
        self.next_attempt_ms = now_ms + u64::from(scheduled);
        if let BackoffPolicy::Exponential { max_ms, .. } = self.policy {
            self.delay_ms = self.delay_ms.saturating_mul(2).min(max_ms);
        }
        scheduled
    }

    pub fn reset(&mut self) {
        self.delay_ms = Self::initial(self.policy);
        self.next_attempt_ms = 0;
    }

    pub fn current_delay_ms(&self) -> u32 {
        self.delay_ms
    }
}

/// State plus backoff for one channel.
#[derive(Debug, Clone, Copy)]
pub struct Link {
    label: &'static str,
    state: LinkState,
    backoff: Backoff,
    attempts: u32,
    attempt_started_ms: u64,
}

impl Link {
    /// `label` prefixes every log line (`"hub"`, `"broker"`, `"wifi"`).
    pub fn new(label: &'static str, policy: BackoffPolicy) -> Self {
        Self {
            label,
            state: LinkState::Disconnected,
            backoff: Backoff::new(policy),
            attempts: 0,
            attempt_started_ms: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// True if the channel is down and its backoff has elapsed.
    pub fn attempt_due(&self, now_ms: u64) -> bool {
        self.state == LinkState::Disconnected && self.backoff.ready(now_ms)
    }

    pub fn begin_attempt(&mut self, now_ms: u64) {
        self.attempts += 1;
        info!("{}: connecting (attempt {})", self.label, self.attempts);
        self.state = LinkState::Connecting;
        self.attempt_started_ms = now_ms;
    }

    /// True once an attempt has been `Connecting` for `timeout_ms` or more.
    pub fn attempt_expired(&self, now_ms: u64, timeout_ms: u32) -> bool {
        self.state == LinkState::Connecting
            && now_ms.saturating_sub(self.attempt_started_ms) >= u64::from(timeout_ms)
    }

    pub fn connected(&mut self) {
        info!("{}: connected", self.label);
        self.state = LinkState::Connected;
        self.attempts = 0;
        self.backoff.reset();
    }

    /// A connect attempt failed.
    pub fn failed(&mut self, now_ms: u64) {
        let delay = self.backoff.failed(now_ms);
        warn!("{}: connect failed, retry in {} ms", self.label, delay);
        self.state = LinkState::Disconnected;
    }

    /// An established link dropped.  The first retry is immediate.
    pub fn lost(&mut self) {
        warn!("{}: link lost", self.label);
        self.state = LinkState::Disconnected;
        self.backoff.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_to_cap() {
        let mut b = Backoff::new(BackoffPolicy::Exponential {
            initial_ms: 2_000,
            max_ms: 60_000,
        });
        let delays: Vec<u32> = (0..7).map(|_| b.failed(0)).collect();
        assert_eq!(delays, [2_000, 4_000, 8_000, 16_000, 32_000, 60_000, 60_000]);
        b.reset();
        assert_eq!(b.current_delay_ms(), 2_000);
    }

    #[test]
    fn fixed_never_grows() {
        let mut b = Backoff::new(BackoffPolicy::Fixed { delay_ms: 5_000 });
        assert_eq!(b.failed(100), 5_000);
        assert_eq!(b.failed(5_100), 5_000);
        assert!(!b.ready(10_099));
        assert!(b.ready(10_100));
    }

    #[test]
    fn link_cycle() {
        let mut link = Link::new("broker", BackoffPolicy::Fixed { delay_ms: 5_000 });
        assert!(link.attempt_due(0));
        link.begin_attempt(0);
        assert_eq!(link.state(), LinkState::Connecting);
        assert!(!link.attempt_due(0));
        link.failed(0);
        assert!(!link.attempt_due(4_999));
        assert!(link.attempt_due(5_000));
        link.begin_attempt(5_000);
        link.connected();
        assert!(link.is_connected());
        link.lost();
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(link.attempt_due(5_001));
    }

    #[test]
    fn attempt_expires_only_while_connecting() {
        let mut link = Link::new("broker", BackoffPolicy::Fixed { delay_ms: 5_000 });
        assert!(!link.attempt_expired(10_000, 3_000));
        link.begin_attempt(1_000);
        assert!(!link.attempt_expired(3_999, 3_000));
        assert!(link.attempt_expired(4_000, 3_000));
        link.connected();
        assert!(!link.attempt_expired(9_000, 3_000));
    }
}
