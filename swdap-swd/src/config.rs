// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Probe configuration
//!
//! Identity strings reported by DAP_Info, packet negotiation values and the
//! platform timing used by clock selection.  Every field has a default, so a
//! configuration file need only contain the fields it changes:
//!
//! ```json
//! { "serial": "30AEA4C0FFEE", "default_clock": 4000000 }
//! ```

use alloc::string::{String, ToString};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

use swdap_cmd::{
    DEFAULT_PACKET_COUNT, DEFAULT_PACKET_SIZE, Port, packet_count_valid, packet_size_valid,
};

use crate::SwdError;

/// The probe configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Probe vendor name (DAP_Info 0x01)
    pub vendor: String,

    /// Probe product name (DAP_Info 0x02)
    pub product: String,

    /// Probe serial number (DAP_Info 0x03).  Typically derived from a MAC
    /// address or chip ID by the platform.
    pub serial: String,

    /// CMSIS-DAP protocol version implemented (DAP_Info 0x04)
    pub fw_version: String,

    /// Target device vendor (DAP_Info 0x05)
    pub device_vendor: String,

    /// Target device name (DAP_Info 0x06)
    pub device_name: String,

    /// Target board vendor (DAP_Info 0x07)
    pub board_vendor: String,

    /// Target board name (DAP_Info 0x08)
    pub board_name: String,

    /// Product firmware version (DAP_Info 0x09)
    pub product_fw_version: String,

    /// Maximum command and response packet size, 64-32768 bytes
    pub packet_size: u16,

    /// Maximum outstanding packets, 1-255
    pub packet_count: u8,

    /// Frequency of [`crate::SwdPins::timestamp()`] in Hz.  0 disables
    /// timestamp support.
    pub timestamp_clock: u32,

    /// CPU clock, in Hz, that the delay loop runs at
    pub bus_clock: u32,

    /// CPU cycles taken by one GPIO write
    pub io_port_write_cycles: u32,

    /// CPU cycles per [`crate::DelayCycles::delay_cycles()`] unit
    pub delay_slow_cycles: u32,

    /// SWD clock used until the host sends DAP_SWJ_Clock, in Hz
    pub default_clock: u32,

    /// Clocks at or above this use the shift register, in Hz
    pub spi_threshold: u32,

    /// Clocks at or above this use GPIO with no delay, in Hz
    pub gpio_fast_threshold: u32,

    /// Port used when DAP_Connect asks for autodetect
    pub default_port: Port,

    /// Also request a reset through the Cortex-M AIRCR on DAP_ResetTarget
    pub reset_via_aircr: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            vendor: "windowsair".to_string(),
            product: "CMSIS-DAP v2".to_string(),
            serial: String::new(),
            fw_version: "0.1.0".to_string(),
            device_vendor: String::new(),
            device_name: String::new(),
            board_vendor: "windowsair".to_string(),
            board_name: "ESP wireless DAP".to_string(),
            product_fw_version: String::new(),
            packet_size: DEFAULT_PACKET_SIZE,
            packet_count: DEFAULT_PACKET_COUNT,
            timestamp_clock: 5_000_000,
            bus_clock: 100_000_000,
            io_port_write_cycles: 2,
            delay_slow_cycles: 3,
            default_clock: 1_000_000,
            spi_threshold: 10_000_000,
            gpio_fast_threshold: 2_000_000,
            default_port: Port::Swd,
            reset_via_aircr: false,
        }
    }
}

impl ProbeConfig {
    /// Check the configuration is usable.
    ///
    /// Returns [`SwdError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), SwdError> {
        let invalid = |field: &str| -> Result<(), SwdError> {
            warn!("Error: Invalid probe configuration: {field}");
            Err(SwdError::InvalidConfig(field.to_string()))
        };

        if !packet_size_valid(self.packet_size) {
            return invalid("packet_size");
        }
        if !packet_count_valid(self.packet_count) {
            return invalid("packet_count");
        }
        if self.bus_clock == 0 {
            return invalid("bus_clock");
        }
        if self.delay_slow_cycles == 0 {
            return invalid("delay_slow_cycles");
        }
        if self.default_clock == 0 {
            return invalid("default_clock");
        }
        if self.gpio_fast_threshold >= self.spi_threshold {
            return invalid("gpio_fast_threshold");
        }
        if self.default_port == Port::Disabled {
            return invalid("default_port");
        }

        Ok(())
    }
}
