//! One-shot hardware peripheral initialization.
//!
//! Configures the two ADC1 channels and the front-panel inputs using raw
//! ESP-IDF sys calls.  Called once from `main()` before the control loop
//! starts.  Valve outputs are owned by `esp-idf-hal` pin drivers instead.
//!
//! On non-espidf targets the ADC reads come from injectable atomics so
//! the adapters above can be exercised on the host.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::error::SensorError;
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

impl core::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio_inputs()?;
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

/// Full-scale count of the 12-bit converter.
pub const ADC_MAX_COUNTS: u16 = 4095;

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    for channel in [pins::PRESSURE_ADC_CHANNEL, pins::FLOW_ADC_CHANNEL] {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!(
        "hw_init: ADC1 configured (CH{}=pressure, CH{}=flow)",
        pins::PRESSURE_ADC_CHANNEL,
        pins::FLOW_ADC_CHANNEL
    );
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Result<u16, SensorError> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return Err(SensorError::AdcReadFailed);
    }
    u16::try_from(raw)
        .ok()
        .filter(|v| *v <= ADC_MAX_COUNTS)
        .ok_or(SensorError::OutOfRange)
}

// ── Host simulation ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

    pub static PRESSURE: AtomicU16 = AtomicU16::new(0);
    pub static FLOW: AtomicU16 = AtomicU16::new(0);
    pub static FAIL: AtomicBool = AtomicBool::new(false);

    pub fn load(channel: u32) -> Option<u16> {
        match channel {
            c if c == crate::pins::PRESSURE_ADC_CHANNEL => Some(PRESSURE.load(Ordering::Relaxed)),
            c if c == crate::pins::FLOW_ADC_CHANNEL => Some(FLOW.load(Ordering::Relaxed)),
            _ => None,
        }
    }
}

/// Inject raw counts for the host build.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: u32, raw: u16) {
    use core::sync::atomic::Ordering;
    if channel == pins::PRESSURE_ADC_CHANNEL {
        sim::PRESSURE.store(raw, Ordering::Relaxed);
    } else if channel == pins::FLOW_ADC_CHANNEL {
        sim::FLOW.store(raw, Ordering::Relaxed);
    }
}

/// Make every simulated ADC read fail.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc_failure(fail: bool) {
    sim::FAIL.store(fail, core::sync::atomic::Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(channel: u32) -> Result<u16, SensorError> {
    if sim::FAIL.load(core::sync::atomic::Ordering::Relaxed) {
        return Err(SensorError::AdcReadFailed);
    }
    let raw = sim::load(channel).ok_or(SensorError::AdcReadFailed)?;
    if raw > ADC_MAX_COUNTS {
        return Err(SensorError::OutOfRange);
    }
    Ok(raw)
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    for pin in [pins::ENABLE_SWITCH_GPIO, pins::SET_KEY_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    info!("hw_init: GPIO inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Inputs idle high (pull-ups) on the host.
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}
