//! Channel A: the local observer hub.
//!
//! A push-based text hub (WebSocket server on the device, port 81).  The
//! hub link is up while the listener is up; individual observers come and
//! go without affecting it.  A new observer is greeted with the current
//! snapshot straight away instead of waiting for the next cycle.

use log::{debug, info, warn};

use crate::app::commands::ChannelId;
use crate::app::ports::CommandDelegate;
use crate::config::ControllerConfig;
use crate::error::ChannelError;

use super::link::{BackoffPolicy, Link, LinkState};
use super::wire;
use super::CommandChannel;

/// Most observers tracked at once.
pub const MAX_OBSERVERS: usize = 8;

pub type ObserverId = u8;

/// What the hub transport reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    Connected(ObserverId),
    Disconnected(ObserverId),
    Text(ObserverId, String),
}

/// Transport underneath the hub.
pub trait HubTransport {
    /// Start accepting observers.
    fn listen(&mut self, port: u16) -> Result<(), ChannelError>;

    /// False once the listener has died.
    fn is_listening(&self) -> bool;

    /// Next pending event, if any.  Never blocks.
    fn poll(&mut self) -> Option<HubEvent>;

    fn send_to(&mut self, observer: ObserverId, text: &str) -> Result<(), ChannelError>;

    fn broadcast(&mut self, text: &str) -> Result<(), ChannelError>;
}

pub struct ObserverHub<T: HubTransport> {
    transport: T,
    link: Link,
    port: u16,
    budget: usize,
    observers: heapless::Vec<ObserverId, MAX_OBSERVERS>,
}

impl<T: HubTransport> ObserverHub<T> {
    pub fn new(transport: T, config: &ControllerConfig) -> Self {
        Self {
            transport,
            link: Link::new(
                ChannelId::Hub.name(),
                BackoffPolicy::Exponential {
                    initial_ms: config.hub_retry_initial_ms,
                    max_ms: config.hub_retry_max_ms,
                },
            ),
            port: config.hub_port,
            budget: config.messages_per_pass.max(1),
            observers: heapless::Vec::new(),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn maintain_link(&mut self, now_ms: u64, delegate: &mut impl CommandDelegate) {
        if self.link.is_connected() && !self.transport.is_listening() {
            self.link.lost();
            self.observers.clear();
            delegate.link_changed(ChannelId::Hub, false);
        }
        if self.link.attempt_due(now_ms) {
            self.link.begin_attempt(now_ms);
            match self.transport.listen(self.port) {
                Ok(()) => {
                    self.link.connected();
                    info!("hub: listening on port {}", self.port);
                    delegate.link_changed(ChannelId::Hub, true);
                }
                Err(e) => {
                    warn!("hub: {}", e);
                    self.link.failed(now_ms);
                }
            }
        }
    }

    fn greet(&mut self, observer: ObserverId, delegate: &impl CommandDelegate) {
        if self.observers.contains(&observer) {
            return;
        }
        if self.observers.push(observer).is_err() {
            warn!("hub: observer {} not tracked, {} already connected", observer, MAX_OBSERVERS);
        }
        info!("hub: observer {} connected", observer);
        match wire::encode_snapshot(&delegate.snapshot()) {
            Ok(json) => {
                if let Err(e) = self.transport.send_to(observer, &json) {
                    warn!("hub: greeting observer {} failed: {}", observer, e);
                }
            }
            Err(e) => warn!("hub: snapshot encode failed: {}", e),
        }
    }
}

impl<T: HubTransport> CommandChannel for ObserverHub<T> {
    fn id(&self) -> ChannelId {
        ChannelId::Hub
    }

    fn service(&mut self, now_ms: u64, delegate: &mut impl CommandDelegate) {
        self.maintain_link(now_ms, delegate);
        if !self.link.is_connected() {
            return;
        }

        for _ in 0..self.budget {
            let Some(event) = self.transport.poll() else {
                break;
            };
            match event {
                HubEvent::Connected(id) => self.greet(id, &*delegate),
                HubEvent::Disconnected(id) => {
                    self.observers.retain(|&o| o != id);
                    info!("hub: observer {} disconnected", id);
                }
                HubEvent::Text(id, text) => {
                    debug!("hub: observer {} sent {}", id, text);
                    match wire::parse_hub_message(&text) {
                        Ok(command) => {
                            // Rejections are reported by the delegate.
                            let _ = delegate.apply(ChannelId::Hub, command);
                        }
                        Err(reason) => delegate.reject(ChannelId::Hub, reason),
                    }
                }
            }
        }
    }

    fn broadcast(&mut self, payload: &str) {
        if !self.link.is_connected() {
            return;
        }
        if let Err(e) = self.transport.broadcast(payload) {
            warn!("hub: broadcast failed: {}", e);
        }
    }

    fn link_state(&self) -> LinkState {
        self.link.state()
    }
}
