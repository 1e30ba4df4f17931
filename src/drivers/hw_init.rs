//! One-shot hardware peripheral initialization and raw I/O helpers.
//!
//! Configures ADC channels, valve GPIO outputs and the fan LEDC
//! timer/channel using raw ESP-IDF sys calls.  Called once from `main()`
//! before the control loop starts.
//!
//! On host builds every primitive is backed by atomics so the simulation
//! and the tests can inject ADC counts and observe output levels.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
        }
    }
}

/// ADC converter unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcUnit {
    Adc1,
    Adc2,
}

// Channel numbers on the classic ESP32.
pub const ADC1_CH_LIGHT: u32 = 4; // GPIO32
pub const ADC1_CH_CO2: u32 = 5; // GPIO33
pub const ADC1_CH_SOIL: u32 = 6; // GPIO34
pub const ADC1_CH_WIND: u32 = 7; // GPIO35
pub const ADC2_CH_EXTERNAL_TEMP: u32 = 9; // GPIO26

pub const LEDC_CH_FAN: u32 = crate::pins::FAN_LEDC_CHANNEL;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio_outputs()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut ADC2_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.  `init_adc()` completes before the loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc_handle(unit: AdcUnit) -> adc_oneshot_unit_handle_t {
    match unit {
        AdcUnit::Adc1 => unsafe { ADC1_HANDLE },
        AdcUnit::Adc2 => unsafe { ADC2_HANDLE },
    }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    let unit1 = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: the handles are only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&unit1, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }
    for ch in [ADC1_CH_LIGHT, ADC1_CH_CO2, ADC1_CH_SOIL, ADC1_CH_WIND] {
        let ret = unsafe { adc_oneshot_config_channel(adc_handle(AdcUnit::Adc1), ch, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    let unit2 = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_2,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    let ret = unsafe { adc_oneshot_new_unit(&unit2, &raw mut ADC2_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }
    let ret = unsafe {
        adc_oneshot_config_channel(adc_handle(AdcUnit::Adc2), ADC2_CH_EXTERNAL_TEMP, &chan_cfg)
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!("hw_init: ADC configured (ADC1 CH4-7, ADC2 CH9)");
    Ok(())
}

/// Raw 12-bit count, or `None` if the conversion failed (ADC2 is busy
/// whenever the radio is transmitting).
#[cfg(target_os = "espidf")]
pub fn adc_read(unit: AdcUnit, channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc_handle() contract: single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc_handle(unit), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return None;
    }
    Some(raw.clamp(0, i32::from(pins::ADC_MAX)) as u16)
}

#[cfg(not(target_os = "espidf"))]
const SIM_ADC_SLOTS: usize = 20;

#[cfg(not(target_os = "espidf"))]
static SIM_ADC: [AtomicI32; SIM_ADC_SLOTS] = [const { AtomicI32::new(-1) }; SIM_ADC_SLOTS];

#[cfg(not(target_os = "espidf"))]
fn sim_adc_slot(unit: AdcUnit, channel: u32) -> Option<&'static AtomicI32> {
    let base = match unit {
        AdcUnit::Adc1 => 0,
        AdcUnit::Adc2 => 10,
    };
    SIM_ADC.get(base + channel as usize)
}

#[cfg(not(target_os = "espidf"))]
pub fn adc_read(unit: AdcUnit, channel: u32) -> Option<u16> {
    let raw = sim_adc_slot(unit, channel)?.load(Ordering::Relaxed);
    u16::try_from(raw).ok()
}

/// Simulation: set the count a channel reports (`None` = conversion fails).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(unit: AdcUnit, channel: u32, raw: Option<u16>) {
    if let Some(slot) = sim_adc_slot(unit, channel) {
        slot.store(raw.map_or(-1, i32::from), Ordering::Relaxed);
    }
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for pin in [pins::VALVE1_GPIO, pins::VALVE2_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        // Valves closed at boot.
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: valve outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), i32> {
    // SAFETY: gpio_set_level writes to an output configured in
    // init_gpio_outputs(). Main-loop only.
    let ret = unsafe { gpio_set_level(pin, u32::from(high)) };
    if ret == ESP_OK as i32 { Ok(()) } else { Err(ret) }
}

#[cfg(not(target_os = "espidf"))]
static SIM_GPIO: AtomicU64 = AtomicU64::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), i32> {
    let bit = sim_gpio_bit(pin).ok_or(-1)?;
    if high {
        SIM_GPIO.fetch_or(bit, Ordering::Relaxed);
    } else {
        SIM_GPIO.fetch_and(!bit, Ordering::Relaxed);
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn sim_gpio_bit(pin: i32) -> Option<u64> {
    u32::try_from(pin).ok().and_then(|p| 1u64.checked_shl(p))
}

/// Simulation: current output level of `pin`.  Pins outside the
/// simulated bank always read low.
#[cfg(not(target_os = "espidf"))]
pub fn sim_gpio_level(pin: i32) -> bool {
    sim_gpio_bit(pin).is_some_and(|bit| SIM_GPIO.load(Ordering::Relaxed) & bit != 0)
}

// ── LEDC PWM ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    // Timer 0: fan (5 kHz, 8-bit)
    let timer0 = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::FAN_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer0) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: LEDC_CH_FAN,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: pins::FAN_PWM_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    info!("hw_init: LEDC configured (fan=CH0)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u32) -> Result<(), i32> {
    // SAFETY: the LEDC channel was configured in init_ledc(); only the
    // main loop writes duty registers.
    let ret = unsafe { ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty) };
    if ret != ESP_OK as i32 {
        return Err(ret);
    }
    let ret = unsafe { ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel) };
    if ret != ESP_OK as i32 {
        return Err(ret);
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
static SIM_LEDC: [AtomicU32; 8] = [const { AtomicU32::new(0) }; 8];

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(channel: u32, duty: u32) -> Result<(), i32> {
    let slot = SIM_LEDC.get(channel as usize).ok_or(-1)?;
    slot.store(duty, Ordering::Relaxed);
    Ok(())
}

/// Simulation: last duty written to `channel`.
#[cfg(not(target_os = "espidf"))]
pub fn sim_ledc_duty(channel: u32) -> u32 {
    SIM_LEDC
        .get(channel as usize)
        .map_or(0, |slot| slot.load(Ordering::Relaxed))
}
