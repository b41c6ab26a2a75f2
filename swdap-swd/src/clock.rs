// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD clock selection
//!
//! Maps a DAP_SWJ_Clock frequency to the backend that will run the bus, and
//! for the slow GPIO mode, the number of delay-loop units per half cycle.

use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use swdap_cmd::Port;

use crate::SwdError;
use crate::config::ProbeConfig;

/// The wire backend chosen for a clock frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Hardware shift register
    Spi,

    /// GPIO bit-bang with no delay between clock edges
    GpioFast,

    /// GPIO bit-bang with `delay` delay-loop units per half cycle
    GpioNormal { delay: u32 },
}

impl Backend {
    pub fn fast_clock(&self) -> bool {
        !matches!(self, Backend::GpioNormal { .. })
    }

    pub fn clock_delay(&self) -> u32 {
        match self {
            Backend::GpioNormal { delay } => *delay,
            _ => 1,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Spi => write!(f, "SPI"),
            Backend::GpioFast => write!(f, "GPIO (fast)"),
            Backend::GpioNormal { delay } => write!(f, "GPIO (delay {delay})"),
        }
    }
}

/// Platform timing used to pick a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSelector {
    bus_clock: u32,
    io_port_write_cycles: u32,
    delay_slow_cycles: u32,
    spi_threshold: u32,
    gpio_fast_threshold: u32,
}

impl Default for ClockSelector {
    fn default() -> Self {
        Self::new(&ProbeConfig::default())
    }
}

impl ClockSelector {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            bus_clock: config.bus_clock,
            io_port_write_cycles: config.io_port_write_cycles,
            delay_slow_cycles: config.delay_slow_cycles,
            spi_threshold: config.spi_threshold,
            gpio_fast_threshold: config.gpio_fast_threshold,
        }
    }

    /// Choose the backend for `frequency` Hz.
    ///
    /// The shift register only speaks SWD, so a JTAG port gets the fast GPIO
    /// mode however high the frequency.
    pub fn select(&self, frequency: u32, port: Port) -> Result<Backend, SwdError> {
        if frequency == 0 {
            return Err(SwdError::ZeroClock);
        }

        let backend = if frequency >= self.spi_threshold {
            if port == Port::Jtag {
                Backend::GpioFast
            } else {
                Backend::Spi
            }
        } else if frequency >= self.gpio_fast_threshold {
            Backend::GpioFast
        } else {
            let mut delay = (self.bus_clock / 2).div_ceil(frequency);
            if delay > self.io_port_write_cycles {
                delay = (delay - self.io_port_write_cycles).div_ceil(self.delay_slow_cycles);
            } else {
                delay = 1;
            }
            Backend::GpioNormal { delay }
        };

        debug!("Value: {frequency}Hz -> {backend}");
        Ok(backend)
    }
}
