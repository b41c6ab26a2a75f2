// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Hardware abstraction injected into the probe engine
//!
//! The engine never touches a peripheral directly.  A board support layer
//! implements [`SwdPins`] over its `embedded-hal` GPIO and delay drivers and,
//! if the chip has a suitable peripheral, [`ShiftRegister`] for the high
//! speed path.
//!
//! All methods are synchronous.  The bit-bang backend relies on
//! [`DelayCycles::delay_cycles()`] returning after a fixed, short time to
//! hit its target clock frequency, so it must be a busy-wait, not a yield.
//!
//! GPIO writes and reads on the supported chips cannot fail, so the pins are
//! required to be infallible.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState, StatefulOutputPin};

/// SWDIO, which the host and target take turns to drive
pub trait SwdioPin: InputPin + OutputPin {
    /// Host drives the line, at the level last set.
    fn set_as_output(&mut self);

    /// Target drives the line.
    fn set_as_input(&mut self);
}

/// A busy-wait delay with a platform specific short unit, used between
/// SWCLK edges.
pub trait DelayCycles: DelayNs {
    /// Busy-wait for `count` delay-loop units.  The length of one unit is
    /// described by [`crate::ProbeConfig::delay_slow_cycles`].
    fn delay_cycles(&mut self, count: u32);
}

/// The SWD lines, plus the timing primitives the backends need.
///
/// A board provides the pins and delay; the level helpers are provided.
pub trait SwdPins {
    type Swclk: StatefulOutputPin<Error = Infallible>;
    type Swdio: SwdioPin<Error = Infallible>;
    /// Open drain, read back to see a target holding reset.
    type Nreset: StatefulOutputPin<Error = Infallible> + InputPin;
    type Delay: DelayCycles;

    fn swclk(&mut self) -> &mut Self::Swclk;

    fn swdio(&mut self) -> &mut Self::Swdio;

    fn nreset(&mut self) -> &mut Self::Nreset;

    fn delay(&mut self) -> &mut Self::Delay;

    /// Free running counter at [`crate::ProbeConfig::timestamp_clock`] Hz.
    fn timestamp(&mut self) -> u32;

    /// Configure the pins for SWD: SWCLK and SWDIO outputs, driven high,
    /// nRESET released.
    fn setup(&mut self);

    /// Release all pins to high impedance.
    fn off(&mut self);

    /// Debugger connected status LED.
    fn led_connected(&mut self, _on: bool) {}

    /// Target running status LED.
    fn led_running(&mut self, _on: bool) {}

    fn swclk_set(&mut self, high: bool) {
        let Ok(()) = self.swclk().set_state(PinState::from(high));
    }

    /// The level SWCLK is driven to
    fn swclk_get(&mut self) -> bool {
        let Ok(high) = self.swclk().is_set_high();
        high
    }

    /// Set the level SWDIO drives when it is an output.
    fn swdio_set(&mut self, high: bool) {
        let Ok(()) = self.swdio().set_state(PinState::from(high));
    }

    fn swdio_get(&mut self) -> bool {
        let Ok(high) = self.swdio().is_high();
        high
    }

    /// Enable (host drives) or disable (target drives) the SWDIO output.
    fn swdio_output(&mut self, enable: bool) {
        if enable {
            self.swdio().set_as_output();
        } else {
            self.swdio().set_as_input();
        }
    }

    /// Drive the target reset line.  `high` releases reset.
    fn nreset_set(&mut self, high: bool) {
        let Ok(()) = self.nreset().set_state(PinState::from(high));
    }

    /// The level on the reset line, which the target may hold low
    fn nreset_get(&mut self) -> bool {
        let Ok(high) = self.nreset().is_high();
        high
    }

    fn delay_cycles(&mut self, count: u32) {
        self.delay().delay_cycles(count);
    }

    fn delay_us(&mut self, us: u32) {
        self.delay().delay_us(us);
    }
}

/// A hardware shift register (typically an SPI peripheral in 3-wire mode)
/// sharing the SWCLK and SWDIO pins with [`SwdPins`].
///
/// The peripheral shifts LSB first.  Each [`ShiftRegister::shift()`] is one
/// fixed-length transaction: `out_bits` driven from `out`, then SWDIO
/// switches to input and `in_bits` are sampled.  There is no separate
/// turnaround step; the direction change happens between the two phases.
pub trait ShiftRegister {
    /// Route SWCLK and SWDIO to the peripheral.
    fn attach(&mut self);

    /// Return SWCLK and SWDIO to GPIO control.
    fn detach(&mut self);

    /// Perform a single transaction.  Both bit counts are at most 64.
    /// Returns the sampled bits, LSB first, in the low `in_bits` bits.
    fn shift(&mut self, out: u64, out_bits: u8, in_bits: u8) -> u64;
}
