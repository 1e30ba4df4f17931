//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements                    | Connects to              |
//! |----------------|-------------------------------|--------------------------|
//! | `hardware`     | SensorPort, ActuatorPort      | ADC, valve GPIO, fan PWM |
//! | `log_sink`     | EventSink                     | Serial log output        |
//! | `nvs`          | StoragePort                   | NVS / in-memory store    |
//! | `time`         | -                             | ESP32 system timer       |
//! | `loopback`     | HubTransport, BrokerTransport | In-memory queues         |
//! | `esp_net`      | HubTransport, BrokerTransport | WebSocket server, MQTT   |
//! | `wifi`         | StationPort                   | WiFi station (STA)       |

#[cfg(target_os = "espidf")]
pub mod esp_net;
pub mod hardware;
pub mod log_sink;
pub mod loopback;
pub mod nvs;
pub mod time;
pub mod wifi;
