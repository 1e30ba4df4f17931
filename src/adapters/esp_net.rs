//! Device network transports (ESP-IDF only).
//!
//! - [`EspWsHub`] serves the observer hub as a WebSocket endpoint on the
//!   ESP-IDF HTTP server (needs `CONFIG_HTTPD_WS_SUPPORT=y`).
//! - [`EspMqttTransport`] wraps the ESP-IDF MQTT client.
//!
//! Both network stacks deliver on their own tasks.  Inbound traffic is
//! pushed into bounded channels and drained by the control loop through
//! the transport `poll` methods, so nothing outside the control loop ever
//! touches the state.  Each MQTT session owns its own inbox and up flag;
//! a receiver thread that outlives its client writes only into a session
//! the transport has already dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_svc::mqtt::client::{Details, EventPayload, QoS};
use embedded_svc::ws::FrameType;
use esp_idf_svc::http::server::ws::{EspHttpWsConnection, EspHttpWsDetachedSender};
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};
use esp_idf_svc::mqtt::client::{EspMqttClient, EspMqttConnection, MqttClientConfiguration};
use esp_idf_svc::sys::EspError;
use log::{debug, info, warn};

use crate::channels::broker::{BrokerMessage, BrokerTransport};
use crate::channels::hub::{HubEvent, HubTransport, ObserverId, MAX_OBSERVERS};
use crate::config::BrokerSettings;
use crate::error::ChannelError;

const INBOX_DEPTH: usize = 16;
/// Longest inbound WebSocket text frame accepted.
const MAX_FRAME_LEN: usize = 256;
/// Longest inbound MQTT payload accepted.
const MAX_PAYLOAD_LEN: usize = 64;

static HUB_INBOX: Channel<CriticalSectionRawMutex, HubEvent, INBOX_DEPTH> = Channel::new();

fn queue_hub(event: HubEvent) {
    if HUB_INBOX.try_send(event).is_err() {
        warn!("hub: inbox full, event dropped");
    }
}

// ───────────────────────────────────────────────────────────────
// WebSocket hub
// ───────────────────────────────────────────────────────────────

type Senders = Arc<Mutex<Vec<(ObserverId, EspHttpWsDetachedSender)>>>;

pub struct EspWsHub {
    server: Option<EspHttpServer<'static>>,
    senders: Senders,
}

impl EspWsHub {
    pub fn new() -> Self {
        Self {
            server: None,
            senders: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on_frame(ws: &mut EspHttpWsConnection, senders: &Senders) -> Result<(), EspError> {
        let id = ws.session() as ObserverId;

        if ws.is_new() {
            let sender = ws.create_detached_sender()?;
            if let Ok(mut list) = senders.lock() {
                list.retain(|(o, _)| *o != id);
                if list.len() < MAX_OBSERVERS {
                    list.push((id, sender));
                }
            }
            queue_hub(HubEvent::Connected(id));
            return Ok(());
        }

        if ws.is_closed() {
            if let Ok(mut list) = senders.lock() {
                list.retain(|(o, _)| *o != id);
            }
            queue_hub(HubEvent::Disconnected(id));
            return Ok(());
        }

        let mut buf = [0u8; MAX_FRAME_LEN];
        let (frame, len) = ws.recv(&mut buf)?;
        if !matches!(frame, FrameType::Text(false)) {
            debug!("hub: observer {} sent non-text frame", id);
            return Ok(());
        }
        match core::str::from_utf8(&buf[..len.min(MAX_FRAME_LEN)]) {
            Ok(text) => queue_hub(HubEvent::Text(id, text.trim_end_matches('\0').to_owned())),
            Err(_) => warn!("hub: observer {} sent invalid UTF-8", id),
        }
        Ok(())
    }
}

impl Default for EspWsHub {
    fn default() -> Self {
        Self::new()
    }
}

impl HubTransport for EspWsHub {
    fn listen(&mut self, port: u16) -> Result<(), ChannelError> {
        let mut server = EspHttpServer::new(&HttpConfiguration {
            http_port: port,
            ..Default::default()
        })
        .map_err(|e| {
            warn!("hub: http server start failed: {}", e);
            ChannelError::ListenFailed
        })?;

        let senders = Arc::clone(&self.senders);
        server
            .ws_handler("/", move |ws: &mut EspHttpWsConnection| Self::on_frame(ws, &senders))
            .map_err(|e| {
                warn!("hub: ws handler registration failed: {}", e);
                ChannelError::ListenFailed
            })?;

        self.server = Some(server);
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.server.is_some()
    }

    fn poll(&mut self) -> Option<HubEvent> {
        HUB_INBOX.try_receive().ok()
    }

    fn send_to(&mut self, observer: ObserverId, text: &str) -> Result<(), ChannelError> {
        let mut list = self.senders.lock().map_err(|_| ChannelError::SendFailed)?;
        let (_, sender) = list
            .iter_mut()
            .find(|(o, _)| *o == observer)
            .ok_or(ChannelError::SendFailed)?;
        sender
            .send(FrameType::Text(false), text.as_bytes())
            .map_err(|_| ChannelError::SendFailed)
    }

    fn broadcast(&mut self, text: &str) -> Result<(), ChannelError> {
        let mut list = self.senders.lock().map_err(|_| ChannelError::SendFailed)?;
        // Senders whose session has gone away are pruned here.
        list.retain_mut(|(_, sender)| sender.send(FrameType::Text(false), text.as_bytes()).is_ok());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// MQTT broker
// ───────────────────────────────────────────────────────────────

/// One MQTT client's view of the broker, shared with its receiver thread.
struct Session {
    up: AtomicBool,
    /// Set on the first disconnect.  The client's own reconnect would come
    /// back without subscriptions, so the session never counts as up again.
    ended: AtomicBool,
    inbox: Channel<CriticalSectionRawMutex, BrokerMessage, INBOX_DEPTH>,
}

impl Session {
    fn new() -> Self {
        Self {
            up: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            inbox: Channel::new(),
        }
    }

    fn on_connected(&self) {
        if !self.ended.load(Ordering::Acquire) {
            self.up.store(true, Ordering::Release);
        }
    }

    fn on_disconnected(&self) {
        self.ended.store(true, Ordering::Release);
        self.up.store(false, Ordering::Release);
    }
}

pub struct EspMqttTransport {
    client: Option<EspMqttClient<'static>>,
    session: Option<Arc<Session>>,
}

impl EspMqttTransport {
    pub fn new() -> Self {
        Self {
            client: None,
            session: None,
        }
    }

    fn spawn_receiver(mut conn: EspMqttConnection, session: Arc<Session>) -> Result<(), ChannelError> {
        std::thread::Builder::new()
            .name("mqtt-rx".into())
            .stack_size(6 * 1024)
            .spawn(move || {
                while let Ok(event) = conn.next() {
                    match event.payload() {
                        EventPayload::Connected(_) => session.on_connected(),
                        EventPayload::Disconnected => session.on_disconnected(),
                        EventPayload::Received {
                            topic: Some(topic),
                            data,
                            details: Details::Complete,
                            ..
                        } => {
                            if data.len() > MAX_PAYLOAD_LEN {
                                warn!("broker: dropping {} byte payload on {}", data.len(), topic);
                                continue;
                            }
                            let msg = BrokerMessage {
                                topic: topic.to_owned(),
                                payload: data.to_vec(),
                            };
                            if session.inbox.try_send(msg).is_err() {
                                warn!("broker: inbox full, message dropped");
                            }
                        }
                        _ => {}
                    }
                }
                session.on_disconnected();
                info!("broker: receiver exited");
            })
            .map(|_| ())
            .map_err(|_| ChannelError::ConnectFailed)
    }
}

impl Default for EspMqttTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerTransport for EspMqttTransport {
    /// Starts the client and returns at once; the receiver thread flips the
    /// session up when the broker acknowledges.
    fn connect(&mut self, settings: &BrokerSettings) -> Result<(), ChannelError> {
        self.disconnect();

        let url = format!("mqtt://{}:{}", settings.host, settings.port);
        let conf = MqttClientConfiguration {
            client_id: Some(settings.client_id.as_str()),
            username: (!settings.username.is_empty()).then_some(settings.username.as_str()),
            password: (!settings.password.is_empty()).then_some(settings.password.as_str()),
            ..Default::default()
        };

        let (client, conn) = EspMqttClient::new(&url, &conf).map_err(|e| {
            warn!("broker: client create failed: {}", e);
            ChannelError::ConnectFailed
        })?;
        let session = Arc::new(Session::new());
        Self::spawn_receiver(conn, Arc::clone(&session))?;
        self.client = Some(client);
        self.session = Some(session);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
            && self
                .session
                .as_ref()
                .is_some_and(|s| s.up.load(Ordering::Acquire))
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ChannelError> {
        let client = self.client.as_mut().ok_or(ChannelError::SubscribeFailed)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| ChannelError::SubscribeFailed)
    }

    fn poll(&mut self) -> Option<BrokerMessage> {
        self.session.as_ref()?.inbox.try_receive().ok()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ChannelError> {
        let client = self.client.as_mut().ok_or(ChannelError::Disconnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|_| ChannelError::SendFailed)
    }

    fn disconnect(&mut self) {
        // Dropping the client stops it and ends its receiver; dropping the
        // session discards whatever that receiver had queued.
        self.client = None;
        if let Some(session) = self.session.take() {
            session.on_disconnected();
        }
    }
}
