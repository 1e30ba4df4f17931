//! Station-mode WiFi uplink.
//!
//! [`WifiSupervisor`] keeps the station associated: it starts the first
//! association, notices a drop on the service cadence and retries on an
//! exponential backoff (2 s → 4 s → 8 s … capped at 60 s).  Nothing here
//! waits on the radio.  An association still pending after
//! `wifi_connect_timeout_ms` counts as a failed attempt.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`EspStation`] drives `EspWifi`.
//! - **all other targets**: [`SimStation`], scripted from tests.

use log::{info, warn};

use crate::channels::link::{BackoffPolicy, Link, LinkState};
use crate::config::ControllerConfig;
use crate::error::ChannelError;

/// The radio underneath the supervisor.
pub trait StationPort {
    /// Ask the station to associate.  Returns as soon as the request is
    /// queued.
    fn begin_connect(&mut self) -> Result<(), ChannelError>;

    /// True while associated with an address on the interface.
    fn is_up(&self) -> bool;

    /// Drop the association or cancel a pending one.
    fn abort(&mut self);
}

pub struct WifiSupervisor<S: StationPort> {
    station: S,
    link: Link,
    connect_timeout_ms: u32,
}

impl<S: StationPort> WifiSupervisor<S> {
    pub fn new(station: S, config: &ControllerConfig) -> Self {
        Self {
            station,
            link: Link::new(
                "wifi",
                BackoffPolicy::Exponential {
                    initial_ms: config.wifi_retry_initial_ms,
                    max_ms: config.wifi_retry_max_ms,
                },
            ),
            connect_timeout_ms: config.wifi_connect_timeout_ms,
        }
    }

    pub fn state(&self) -> LinkState {
        self.link.state()
    }

    pub fn is_up(&self) -> bool {
        self.link.is_connected()
    }

    pub fn station(&self) -> &S {
        &self.station
    }

    pub fn station_mut(&mut self) -> &mut S {
        &mut self.station
    }

    /// One supervision pass.  Call on the channel service cadence.
    pub fn service(&mut self, now_ms: u64) {
        match self.link.state() {
            LinkState::Connected if !self.station.is_up() => {
                self.link.lost();
                self.station.abort();
            }
            LinkState::Connecting => self.await_association(now_ms),
            _ => {}
        }
        if self.link.attempt_due(now_ms) {
            self.link.begin_attempt(now_ms);
            match self.station.begin_connect() {
                Ok(()) => self.await_association(now_ms),
                Err(e) => self.abandon_attempt(now_ms, e),
            }
        }
    }

    fn await_association(&mut self, now_ms: u64) {
        if self.station.is_up() {
            self.link.connected();
            info!("wifi: station up");
        } else if self.link.attempt_expired(now_ms, self.connect_timeout_ms) {
            self.abandon_attempt(now_ms, ChannelError::Timeout);
        }
    }

    fn abandon_attempt(&mut self, now_ms: u64, reason: ChannelError) {
        warn!("wifi: {}", reason);
        self.station.abort();
        self.link.failed(now_ms);
    }
}

// ───────────────────────────────────────────────────────────────
// Device station
// ───────────────────────────────────────────────────────────────

/// `EspWifi` in station mode, already configured and started.
#[cfg(target_os = "espidf")]
pub struct EspStation {
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
}

#[cfg(target_os = "espidf")]
impl EspStation {
    pub fn new(wifi: esp_idf_svc::wifi::EspWifi<'static>) -> Self {
        Self { wifi }
    }
}

#[cfg(target_os = "espidf")]
impl StationPort for EspStation {
    fn begin_connect(&mut self) -> Result<(), ChannelError> {
        self.wifi.connect().map_err(|e| {
            warn!("wifi: connect request failed: {}", e);
            ChannelError::ConnectFailed
        })
    }

    fn is_up(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false)
    }

    fn abort(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("wifi: disconnect failed: {}", e);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated station
// ───────────────────────────────────────────────────────────────

/// Host stand-in.  Associates on the first request unless told to refuse
/// or to hold the association pending.
#[derive(Debug, Default)]
pub struct SimStation {
    up: bool,
    pending: bool,
    hold: bool,
    refusals: u32,
    requests: u32,
}

impl SimStation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` connect requests fail outright.
    pub fn refuse_next(&mut self, n: u32) {
        self.refusals = n;
    }

    /// While set, requests stay pending until [`SimStation::associate`].
    pub fn hold(&mut self, hold: bool) {
        self.hold = hold;
    }

    /// Complete a pending association.
    pub fn associate(&mut self) {
        if self.pending {
            self.pending = false;
            self.up = true;
        }
    }

    /// The access point went away.
    pub fn drop_association(&mut self) {
        self.up = false;
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }
}

impl StationPort for SimStation {
    fn begin_connect(&mut self) -> Result<(), ChannelError> {
        self.requests += 1;
        if self.refusals > 0 {
            self.refusals -= 1;
            return Err(ChannelError::ConnectFailed);
        }
        if self.hold {
            self.pending = true;
        } else {
            self.up = true;
        }
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.up
    }

    fn abort(&mut self) {
        self.up = false;
        self.pending = false;
    }
}
