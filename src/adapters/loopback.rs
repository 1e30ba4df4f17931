//! In-memory transports for both command channels.
//!
//! Inbound traffic is queued on bounded `embassy-sync` channels, the same
//! primitive the device build uses between its network callbacks and the
//! control loop.  Outbound traffic is kept in short history buffers for
//! inspection.  Both transports can be told to fail, which drives the
//! reconnect paths in tests and in the host simulation.
//!
//! ```text
//!  test / simulator ──inject──▶ [queue] ──poll──▶ channel ──▶ AppService
//!  test / simulator ◀──history── [ring] ◀──send── channel
//! ```

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use heapless::HistoryBuffer;

use crate::channels::broker::{BrokerMessage, BrokerTransport};
use crate::channels::hub::{HubEvent, HubTransport, ObserverId};
use crate::config::BrokerSettings;
use crate::error::ChannelError;

/// Inbound queue depth per transport.
pub const QUEUE_DEPTH: usize = 16;
/// Outbound messages retained for inspection.
pub const HISTORY: usize = 32;

// ───────────────────────────────────────────────────────────────
// Hub
// ───────────────────────────────────────────────────────────────

pub struct LoopbackHub {
    inbound: Channel<NoopRawMutex, HubEvent, QUEUE_DEPTH>,
    listening: bool,
    listen_failures: u32,
    listen_calls: u32,
    direct: HistoryBuffer<(ObserverId, String), HISTORY>,
    broadcasts: HistoryBuffer<String, HISTORY>,
    broadcast_count: usize,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self {
            inbound: Channel::new(),
            listening: false,
            listen_failures: 0,
            listen_calls: 0,
            direct: HistoryBuffer::new(),
            broadcasts: HistoryBuffer::new(),
            broadcast_count: 0,
        }
    }

    /// Queue an inbound event.  `false` if the queue is full.
    pub fn inject(&self, event: HubEvent) -> bool {
        self.inbound.try_send(event).is_ok()
    }

    pub fn connect_observer(&self, id: ObserverId) -> bool {
        self.inject(HubEvent::Connected(id))
    }

    pub fn disconnect_observer(&self, id: ObserverId) -> bool {
        self.inject(HubEvent::Disconnected(id))
    }

    pub fn send_text(&self, id: ObserverId, text: &str) -> bool {
        self.inject(HubEvent::Text(id, text.to_owned()))
    }

    /// Make the next `n` listen attempts fail.
    pub fn fail_next_listens(&mut self, n: u32) {
        self.listen_failures = n;
    }

    /// Kill the listener as if the network went away.
    pub fn drop_listener(&mut self) {
        self.listening = false;
    }

    pub fn listen_calls(&self) -> u32 {
        self.listen_calls
    }

    /// Messages sent to one observer, oldest first.
    pub fn sent_to(&self, id: ObserverId) -> impl Iterator<Item = &str> {
        self.direct
            .oldest_ordered()
            .filter(move |(o, _)| *o == id)
            .map(|(_, text)| text.as_str())
    }

    pub fn last_broadcast(&self) -> Option<&str> {
        self.broadcasts.recent().map(String::as_str)
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcast_count
    }
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

impl HubTransport for LoopbackHub {
    fn listen(&mut self, _port: u16) -> Result<(), ChannelError> {
        self.listen_calls += 1;
        if self.listen_failures > 0 {
            self.listen_failures -= 1;
            return Err(ChannelError::ListenFailed);
        }
        self.listening = true;
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.listening
    }

    fn poll(&mut self) -> Option<HubEvent> {
        self.inbound.try_receive().ok()
    }

    fn send_to(&mut self, observer: ObserverId, text: &str) -> Result<(), ChannelError> {
        if !self.listening {
            return Err(ChannelError::Disconnected);
        }
        self.direct.write((observer, text.to_owned()));
        Ok(())
    }

    fn broadcast(&mut self, text: &str) -> Result<(), ChannelError> {
        if !self.listening {
            return Err(ChannelError::Disconnected);
        }
        self.broadcasts.write(text.to_owned());
        self.broadcast_count += 1;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Broker
// ───────────────────────────────────────────────────────────────

pub struct LoopbackBroker {
    inbound: Channel<NoopRawMutex, BrokerMessage, QUEUE_DEPTH>,
    connected: bool,
    hold_handshake: bool,
    handshake_pending: bool,
    connect_failures: u32,
    connect_calls: u32,
    last_client_id: Option<String>,
    subscriptions: Vec<String>,
    published: HistoryBuffer<(String, String), HISTORY>,
    publish_count: usize,
}

impl LoopbackBroker {
    pub fn new() -> Self {
        Self {
            inbound: Channel::new(),
            connected: false,
            hold_handshake: false,
            handshake_pending: false,
            connect_failures: 0,
            connect_calls: 0,
            last_client_id: None,
            subscriptions: Vec::new(),
            published: HistoryBuffer::new(),
            publish_count: 0,
        }
    }

    /// Deliver a message as the broker would: only on a live session and
    /// only for subscribed topics.  `false` if it was dropped.
    pub fn inject(&self, topic: &str, payload: &[u8]) -> bool {
        if !self.connected || !self.subscriptions.iter().any(|s| s == topic) {
            return false;
        }
        self.inbound
            .try_send(BrokerMessage {
                topic: topic.to_owned(),
                payload: payload.to_vec(),
            })
            .is_ok()
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next_connects(&mut self, n: u32) {
        self.connect_failures = n;
    }

    /// While set, `connect` leaves the session pending until
    /// [`LoopbackBroker::complete_handshake`].
    pub fn hold_handshake(&mut self, hold: bool) {
        self.hold_handshake = hold;
    }

    /// Acknowledge a pending session.  `false` if none was pending.
    pub fn complete_handshake(&mut self) -> bool {
        if !self.handshake_pending {
            return false;
        }
        self.handshake_pending = false;
        self.connected = true;
        true
    }

    /// Number of messages still queued for the channel.
    pub fn queued(&self) -> usize {
        self.inbound.len()
    }

    /// Drop the session as if the broker went away.  Queued messages stay
    /// until the channel calls `disconnect`.
    pub fn drop_connection(&mut self) {
        self.connected = false;
        self.subscriptions.clear();
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls
    }

    pub fn last_client_id(&self) -> Option<&str> {
        self.last_client_id.as_deref()
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Most recent `(topic, payload)`.
    pub fn last_published(&self) -> Option<(&str, &str)> {
        self.published
            .recent()
            .map(|(t, p)| (t.as_str(), p.as_str()))
    }

    pub fn publish_count(&self) -> usize {
        self.publish_count
    }
}

impl Default for LoopbackBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerTransport for LoopbackBroker {
    fn connect(&mut self, settings: &BrokerSettings) -> Result<(), ChannelError> {
        self.connect_calls += 1;
        self.last_client_id = Some(settings.client_id.as_str().to_owned());
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(ChannelError::ConnectFailed);
        }
        if self.hold_handshake {
            self.handshake_pending = true;
        } else {
            self.connected = true;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(ChannelError::SubscribeFailed);
        }
        if !self.subscriptions.iter().any(|s| s == topic) {
            self.subscriptions.push(topic.to_owned());
        }
        Ok(())
    }

    fn poll(&mut self) -> Option<BrokerMessage> {
        self.inbound.try_receive().ok()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(ChannelError::Disconnected);
        }
        let text = String::from_utf8_lossy(payload).into_owned();
        self.published.write((topic.to_owned(), text));
        self.publish_count += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.handshake_pending = false;
        self.subscriptions.clear();
        while self.inbound.try_receive().is_ok() {}
    }
}
