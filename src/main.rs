//! Greenhouse controller firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   ConfigStore<Nvs>  Esp32Time  │
//! │  (Sensor+Actuator) (EventSink)    (ConfigPort)      (uptime)   │
//! │  ObserverHub<WS>   BrokerChannel<MQTT>   WifiSupervisor<STA>   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  SystemState · control policy                          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Controller (CycleScheduler: sample 2 s · channels 100 ms)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On host builds the same controller runs against simulated peripherals
//! and loopback transports.

use anyhow::Result;
use log::{info, warn};

use greenhouse::adapters::hardware::HardwareAdapter;
use greenhouse::adapters::log_sink::LogEventSink;
use greenhouse::adapters::nvs::NvsAdapter;
use greenhouse::adapters::time::Esp32TimeAdapter;
use greenhouse::adapters::wifi::WifiSupervisor;
use greenhouse::config::ControllerConfig;
use greenhouse::config_store::ConfigStore;
use greenhouse::drivers::fan::FanPwm;
use greenhouse::drivers::hw_init;
use greenhouse::drivers::valve::ValvePin;
use greenhouse::pins;
use greenhouse::runtime::Controller;
#[cfg(not(target_os = "espidf"))]
use greenhouse::sensors::climate::{ClimateSensor, ManualClimate};
use greenhouse::sensors::noise::{Jitter, NoNoise, NoisePolicy};
use greenhouse::sensors::SensorHub;

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }
    #[cfg(not(target_os = "espidf"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Greenhouse controller v{}", env!("CARGO_PKG_VERSION"));

    // Unusable timings or budgets are reset to their defaults (logged).
    let config = load_controller_config()?.sanitized();

    if let Err(e) = hw_init::init_peripherals() {
        // Outputs and inputs that failed to configure report errors on
        // every access; the state substitutes defaults.
        warn!("Peripheral init failed: {}, continuing", e);
    }

    // ── 2. Network ────────────────────────────────────────────
    // The station is only started here; the supervisor associates it on
    // the first service pass and keeps it associated.
    #[cfg(target_os = "espidf")]
    let peripherals = esp_idf_hal::peripherals::Peripherals::take()?;
    #[cfg(target_os = "espidf")]
    let mut wifi = match device::start_station(peripherals.modem) {
        Ok(station) => Some(WifiSupervisor::new(station, &config)),
        Err(e) => {
            warn!("WiFi start failed ({:#}), running offline", e);
            None
        }
    };
    #[cfg(not(target_os = "espidf"))]
    let mut wifi = Some(WifiSupervisor::new(
        greenhouse::adapters::wifi::SimStation::new(),
        &config,
    ));

    // ── 3. Adapters ───────────────────────────────────────────
    let nvs = NvsAdapter::new().unwrap_or_else(|e| {
        warn!("NVS init failed ({}), running without persistence", e);
        NvsAdapter::default()
    });
    let store = ConfigStore::new(nvs);

    #[cfg(target_os = "espidf")]
    let climate = device::climate_sensor(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
    );
    #[cfg(not(target_os = "espidf"))]
    let climate = simulated_climate();

    let noise: Box<dyn NoisePolicy> = if config.sensor_noise {
        Box::new(Jitter::new())
    } else {
        Box::new(NoNoise)
    };
    let hw = HardwareAdapter::new(
        SensorHub::new(climate, noise),
        ValvePin::new(pins::VALVE1_GPIO),
        ValvePin::new(pins::VALVE2_GPIO),
        FanPwm::new(hw_init::LEDC_CH_FAN),
    );

    #[cfg(target_os = "espidf")]
    let (hub_transport, broker_transport) = (
        greenhouse::adapters::esp_net::EspWsHub::new(),
        greenhouse::adapters::esp_net::EspMqttTransport::new(),
    );
    #[cfg(not(target_os = "espidf"))]
    let (hub_transport, broker_transport) = (
        greenhouse::adapters::loopback::LoopbackHub::new(),
        greenhouse::adapters::loopback::LoopbackBroker::new(),
    );

    // ── 4. Controller ─────────────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let mut controller = Controller::start(
        &config,
        hw,
        store,
        hub_transport,
        broker_transport,
        LogEventSink::new(),
    );

    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        let now = clock.uptime_ms();
        let due = controller.step(now);
        if due.service {
            if let Some(wifi) = wifi.as_mut() {
                wifi.service(now);
            }
        }

        let idle = controller.idle_ms(clock.uptime_ms()).max(1);
        std::thread::sleep(std::time::Duration::from_millis(idle));
    }
}

/// Runtime tuning.  Host builds read an optional JSON override from the
/// file named by `GREENHOUSE_CONFIG`; missing fields keep their defaults.
fn load_controller_config() -> Result<ControllerConfig> {
    #[cfg(not(target_os = "espidf"))]
    if let Ok(path) = std::env::var("GREENHOUSE_CONFIG") {
        let text = std::fs::read_to_string(&path)?;
        let config: ControllerConfig = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("{}: {}", path, e))?;
        info!("Controller config loaded from {}", path);
        return Ok(config);
    }
    Ok(ControllerConfig::default())
}

/// Host simulation: a fixed mild climate plus seeded analog inputs.
#[cfg(not(target_os = "espidf"))]
fn simulated_climate() -> Box<dyn ClimateSensor> {
    seed_simulated_inputs();
    Box::new(ManualClimate::new(26.5, 101_325.0))
}

/// Mid-scale ADC counts so the simulated greenhouse starts in a plausible
/// state: soil 40 %, wind 5 km/h, light 60 %, CO2 420 ppm, outside 18 °C.
#[cfg(not(target_os = "espidf"))]
fn seed_simulated_inputs() {
    use hw_init::AdcUnit;

    let counts = |fraction: f32| Some((fraction * f32::from(pins::ADC_MAX)).round() as u16);
    hw_init::sim_set_adc(AdcUnit::Adc1, hw_init::ADC1_CH_SOIL, counts(0.40));
    hw_init::sim_set_adc(AdcUnit::Adc1, hw_init::ADC1_CH_WIND, counts(0.10));
    hw_init::sim_set_adc(AdcUnit::Adc1, hw_init::ADC1_CH_LIGHT, counts(0.60));
    hw_init::sim_set_adc(AdcUnit::Adc1, hw_init::ADC1_CH_CO2, counts(0.40));
    hw_init::sim_set_adc(AdcUnit::Adc2, hw_init::ADC2_CH_EXTERNAL_TEMP, counts(38.0 / 70.0));
}

#[cfg(target_os = "espidf")]
mod device {
    use anyhow::{anyhow, Result};
    use esp_idf_hal::gpio::{Gpio21, Gpio22};
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver, I2C0};
    use esp_idf_hal::modem::Modem;
    use esp_idf_hal::units::Hertz;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
    use log::{info, warn};

    use greenhouse::adapters::wifi::EspStation;
    use greenhouse::pins;
    use greenhouse::sensors::bmp280::Bmp280;
    use greenhouse::sensors::climate::{ClimateSensor, ManualClimate};

    const WIFI_SSID: &str = match option_env!("GREENHOUSE_WIFI_SSID") {
        Some(s) => s,
        None => "greenhouse",
    };
    const WIFI_PASS: &str = match option_env!("GREENHOUSE_WIFI_PASS") {
        Some(s) => s,
        None => "",
    };

    /// Configure and start station mode with the build-time credentials.
    /// Does not associate.
    pub fn start_station(modem: Modem) -> Result<EspStation> {
        let sys_loop = EspSystemEventLoop::take()?;
        let mut wifi = EspWifi::new(modem, sys_loop, None)?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: WIFI_SSID.try_into().map_err(|_| anyhow!("wifi ssid too long"))?,
            password: WIFI_PASS
                .try_into()
                .map_err(|_| anyhow!("wifi password too long"))?,
            auth_method: if WIFI_PASS.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPAWPA2Personal
            },
            ..Default::default()
        }))?;
        wifi.start()?;
        info!("wifi: station started for `{}`", WIFI_SSID);
        Ok(EspStation::new(wifi))
    }

    /// BMP280 on I2C0.  A missing or silent part leaves both climate
    /// quantities unavailable.
    pub fn climate_sensor(i2c: I2C0, sda: Gpio21, scl: Gpio22) -> Box<dyn ClimateSensor> {
        let config = I2cConfig::new().baudrate(Hertz(pins::I2C_BAUD_HZ));
        match I2cDriver::new(i2c, sda, scl, &config) {
            Ok(bus) => match Bmp280::new(bus, pins::BMP280_I2C_ADDR) {
                Ok(sensor) => return Box::new(sensor),
                Err(e) => warn!("BMP280 init failed ({}), climate readings unavailable", e),
            },
            Err(e) => warn!("I2C init failed ({}), climate readings unavailable", e),
        }
        Box::new(ManualClimate::absent())
    }
}
