// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD port: both wire backends, and the one currently in use
//!
//! The GPIO and shift register backends share the SWCLK and SWDIO pins.
//! While the shift register is attached, GPIO level operations on those pins
//! (DAP_SWJ_Pins) must release it first.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::clock::Backend;
use crate::gpio::GpioTransport;
use crate::hal::{ShiftRegister, SwdPins};
use crate::protocol::{Transport, WireConfig};
use crate::spi::SpiTransport;

/// Holds both backends and routes [`Transport`] calls to the active one
#[derive(Debug)]
pub struct SwdPort<P: SwdPins, S: ShiftRegister> {
    gpio: GpioTransport<P>,
    spi: SpiTransport<S>,
    backend: Backend,
    spi_attached: bool,
}

impl<P: SwdPins, S: ShiftRegister> SwdPort<P, S> {
    /// Create the port.  Starts on the GPIO backend in fast mode, and the
    /// pins are left alone until [`Self::setup()`].
    pub fn new(pins: P, shift: S) -> Self {
        Self {
            gpio: GpioTransport::new(pins),
            spi: SpiTransport::new(shift),
            backend: Backend::GpioFast,
            spi_attached: false,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Switch backend.  The shift register is attached or detached to suit,
    /// and the GPIO timing is updated either way so it is right if the
    /// shift register is later released.
    pub fn set_backend(&mut self, backend: Backend) {
        self.gpio
            .set_clock(backend.fast_clock(), backend.clock_delay());

        match backend {
            Backend::Spi if !self.spi_attached => {
                self.spi.attach();
                self.spi_attached = true;
            }
            Backend::GpioFast | Backend::GpioNormal { .. } if self.spi_attached => {
                self.spi.detach();
                self.spi_attached = false;
            }
            _ => {}
        }

        if self.backend != backend {
            debug!("Exec:  Switch SWD backend {} -> {backend}", self.backend);
        }
        self.backend = backend;
    }

    /// Configure the pins for SWD on the active backend
    pub fn setup(&mut self) {
        if self.backend == Backend::Spi {
            if !self.spi_attached {
                self.spi.attach();
                self.spi_attached = true;
            }
        } else {
            self.gpio.pins().setup();
        }
    }

    /// Release all pins
    pub fn off(&mut self) {
        if self.spi_attached {
            self.spi.detach();
            self.spi_attached = false;
        }
        self.gpio.pins().off();
    }

    pub fn pins(&mut self) -> &mut P {
        self.gpio.pins()
    }

    pub fn shift_register(&mut self) -> &mut S {
        self.spi.shift_register()
    }

    pub fn is_spi_attached(&self) -> bool {
        self.spi_attached
    }

    /// Run `f` with the pins under GPIO control, restoring the shift
    /// register afterwards if it was attached.
    pub fn with_spi_released<R>(&mut self, f: impl FnOnce(&mut P) -> R) -> R {
        let reattach = self.spi_attached;
        if reattach {
            self.spi.detach();
            self.spi_attached = false;
            self.gpio.pins().setup();
        }

        let result = f(self.gpio.pins());

        if reattach {
            self.spi.attach();
            self.spi_attached = true;
        }
        result
    }

    fn active(&mut self) -> &mut dyn Transport {
        match self.backend {
            Backend::Spi => &mut self.spi,
            _ => &mut self.gpio,
        }
    }
}

impl<P: SwdPins, S: ShiftRegister> Transport for SwdPort<P, S> {
    fn send_request_header(&mut self, request: u8, wire: &WireConfig) -> u8 {
        self.active().send_request_header(request, wire)
    }

    fn transfer(&mut self, request: u8, data: &mut u32, wire: &WireConfig) -> u8 {
        self.active().transfer(request, data, wire)
    }

    fn write_bits(&mut self, count: u32, bits: u64) {
        self.active().write_bits(count, bits)
    }

    fn read_bits(&mut self, count: u32) -> u64 {
        self.active().read_bits(count)
    }

    fn idle_cycles(&mut self, count: u32) {
        self.active().idle_cycles(count)
    }

    fn drive_swdio(&mut self) {
        self.active().drive_swdio()
    }

    fn timestamp(&mut self) -> u32 {
        self.gpio.pins().timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{PinTarget, ShiftTarget, TargetModel, shared_target};
    use pretty_assertions::assert_eq;
    use swdap_cmd::DAP_TRANSFER_OK;
    use swdap_core::Cortex;

    fn port() -> SwdPort<PinTarget, ShiftTarget> {
        let (pins, shift, _model) = shared_target(TargetModel::new());
        SwdPort::new(pins, shift)
    }

    #[test]
    fn both_backends_reach_target() {
        let mut port = port();
        let wire = WireConfig::default();

        port.set_backend(Backend::GpioNormal { delay: 16 });
        let mut data = 0;
        assert_eq!(port.transfer(0x02, &mut data, &wire), DAP_TRANSFER_OK);
        assert_eq!(data, Cortex::IDCODE_M4.data());
        assert!(port.shift_register().shifts().is_empty());
        assert!(port.pins().delay_calls() > 0);

        port.set_backend(Backend::Spi);
        assert!(port.is_spi_attached());
        let mut data = 0;
        assert_eq!(port.transfer(0x02, &mut data, &wire), DAP_TRANSFER_OK);
        assert_eq!(data, Cortex::IDCODE_M4.data());
        assert_eq!(port.shift_register().shifts().len(), 2);
    }

    #[test]
    fn switching_attaches_once() {
        let mut port = port();
        port.set_backend(Backend::Spi);
        port.set_backend(Backend::Spi);
        assert_eq!(port.shift_register().attaches(), 1);

        port.set_backend(Backend::GpioFast);
        assert!(!port.is_spi_attached());
        assert!(!port.shift_register().is_attached());
    }

    #[test]
    fn pins_released_and_restored() {
        let mut port = port();
        port.set_backend(Backend::Spi);

        let nreset = port.with_spi_released(|pins| {
            pins.nreset_set(false);
            pins.nreset_get()
        });
        assert!(!nreset);
        assert!(port.is_spi_attached());
        assert_eq!(port.shift_register().attaches(), 2);
    }

    #[test]
    fn off_detaches() {
        let mut port = port();
        port.set_backend(Backend::Spi);
        port.setup();
        port.off();
        assert!(!port.is_spi_attached());
        assert_eq!(port.pins().offs(), 1);
        assert_eq!(port.pins().setups(), 0);
    }
}
