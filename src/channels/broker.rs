//! Channel B: the remote publish/subscribe broker.
//!
//! Connects with the configured credentials, subscribes one topic per
//! control field and publishes every cycle's snapshot to a single data
//! topic.  Reconnects on a fixed backoff, forever.
//!
//! The session handshake runs in the background: `connect` only starts
//! it, the link sits in `Connecting` across service passes, and the
//! subscriptions go out on the first pass that sees the transport up.  A
//! handshake that outlives `broker_connect_timeout_ms` counts as a failed
//! attempt.

use log::{debug, info, warn};

use crate::app::commands::ChannelId;
use crate::app::ports::CommandDelegate;
use crate::config::{BrokerSettings, ControllerConfig};
use crate::error::ChannelError;

use super::link::{BackoffPolicy, Link, LinkState};
use super::wire::{self, CONTROL_FIELDS};
use super::CommandChannel;

/// One inbound broker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Transport underneath the broker channel (MQTT client on the device).
pub trait BrokerTransport {
    /// Start an authenticated session.  Must not wait for the broker's
    /// acknowledgement; [`BrokerTransport::is_connected`] reports it.
    fn connect(&mut self, settings: &BrokerSettings) -> Result<(), ChannelError>;

    /// True once the current session's handshake has completed and the
    /// session is still up.
    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), ChannelError>;

    /// Next pending message, if any.  Never blocks.
    fn poll(&mut self) -> Option<BrokerMessage>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ChannelError>;

    /// Tear the session down and discard anything it had queued.
    fn disconnect(&mut self);
}

pub struct BrokerChannel<T: BrokerTransport> {
    transport: T,
    link: Link,
    settings: BrokerSettings,
    data_topic: String,
    budget: usize,
    connect_timeout_ms: u32,
}

impl<T: BrokerTransport> BrokerChannel<T> {
    pub fn new(transport: T, config: &ControllerConfig) -> Self {
        Self {
            transport,
            link: Link::new(
                ChannelId::Broker.name(),
                BackoffPolicy::Fixed {
                    delay_ms: config.broker_retry_ms,
                },
            ),
            data_topic: wire::data_topic(&config.broker.topic_prefix),
            settings: config.broker.clone(),
            budget: config.messages_per_pass.max(1),
            connect_timeout_ms: config.broker_connect_timeout_ms,
        }
    }

    pub fn data_topic(&self) -> &str {
        &self.data_topic
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn subscribe_controls(&mut self) -> Result<(), ChannelError> {
        for field in CONTROL_FIELDS {
            let topic = wire::control_topic(&self.settings.topic_prefix, field);
            self.transport.subscribe(&topic)?;
        }
        Ok(())
    }

    fn maintain_link(&mut self, now_ms: u64, delegate: &mut impl CommandDelegate) {
        match self.link.state() {
            LinkState::Connected if !self.transport.is_connected() => {
                self.link.lost();
                self.transport.disconnect();
                delegate.link_changed(ChannelId::Broker, false);
            }
            LinkState::Connecting => self.await_session(now_ms, delegate),
            _ => {}
        }
        if self.link.attempt_due(now_ms) {
            self.link.begin_attempt(now_ms);
            match self.transport.connect(&self.settings) {
                Ok(()) => self.await_session(now_ms, delegate),
                Err(e) => self.abandon_attempt(now_ms, e),
            }
        }
    }

    /// Promote a pending session once the transport reports it up, or
    /// give up on it after the handshake timeout.
    fn await_session(&mut self, now_ms: u64, delegate: &mut impl CommandDelegate) {
        if self.transport.is_connected() {
            match self.subscribe_controls() {
                Ok(()) => {
                    self.link.connected();
                    info!(
                        "broker: session open at {}:{} as {}",
                        self.settings.host, self.settings.port, self.settings.client_id
                    );
                    delegate.link_changed(ChannelId::Broker, true);
                }
                Err(e) => self.abandon_attempt(now_ms, e),
            }
        } else if self.link.attempt_expired(now_ms, self.connect_timeout_ms) {
            self.abandon_attempt(now_ms, ChannelError::Timeout);
        }
    }

    fn abandon_attempt(&mut self, now_ms: u64, reason: ChannelError) {
        warn!("broker: {}", reason);
        self.transport.disconnect();
        self.link.failed(now_ms);
    }
}

impl<T: BrokerTransport> CommandChannel for BrokerChannel<T> {
    fn id(&self) -> ChannelId {
        ChannelId::Broker
    }

    fn service(&mut self, now_ms: u64, delegate: &mut impl CommandDelegate) {
        self.maintain_link(now_ms, delegate);
        if !self.link.is_connected() {
            return;
        }

        for _ in 0..self.budget {
            let Some(msg) = self.transport.poll() else {
                break;
            };
            debug!("broker: {} ({} bytes)", msg.topic, msg.payload.len());
            match wire::parse_broker_message(&self.settings.topic_prefix, &msg.topic, &msg.payload) {
                Ok(command) => {
                    // Rejections are reported by the delegate.
                    let _ = delegate.apply(ChannelId::Broker, command);
                }
                Err(reason) => delegate.reject(ChannelId::Broker, reason),
            }
        }
    }

    fn broadcast(&mut self, payload: &str) {
        if !self.link.is_connected() {
            return;
        }
        if let Err(e) = self.transport.publish(&self.data_topic, payload.as_bytes()) {
            warn!("broker: publish failed: {}", e);
        }
    }

    fn link_state(&self) -> LinkState {
        self.link.state()
    }
}
