// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! GPIO bit-bang SWD backend
//!
//! Each bit is one SWCLK cycle: clock low, delay, clock high, delay.  The
//! host changes SWDIO while the clock is low and the target samples on the
//! rising edge.  The host samples target data while the clock is low, before
//! the rising edge that makes the target move on to its next bit.
//!
//! In fast mode the inter-edge delay is omitted entirely and the clock rate
//! is whatever the pin writes manage.  Otherwise each half cycle waits
//! `clock_delay` platform delay-loop units, computed by
//! [`crate::clock::ClockSelector`].

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use swdap_cmd::{DAP_TRANSFER_ERROR, DAP_TRANSFER_FAULT, DAP_TRANSFER_OK, DAP_TRANSFER_WAIT};

use crate::hal::SwdPins;
use crate::parity::parity32;
use crate::protocol::{
    ACK_BITS, DATA_PARITY_BITS, REQUEST_BITS, Transport, WireConfig, request_byte,
    word_with_parity,
};

/// Bit-bang SWD backend driving [`SwdPins`]
#[derive(Debug)]
pub struct GpioTransport<P: SwdPins> {
    pins: P,
    fast_clock: bool,
    clock_delay: u32,
}

impl<P: SwdPins> GpioTransport<P> {
    /// Create a new GPIO backend, in fast mode.
    ///
    /// The pins are not touched until the first operation.
    pub fn new(pins: P) -> Self {
        Self {
            pins,
            fast_clock: true,
            clock_delay: 1,
        }
    }

    /// Set the half-cycle timing.
    ///
    /// Arguments:
    /// - `fast_clock`: If true, no delay is inserted between clock edges.
    /// - `clock_delay`: Delay-loop units per half cycle when not fast.
    pub fn set_clock(&mut self, fast_clock: bool, clock_delay: u32) {
        self.fast_clock = fast_clock;
        self.clock_delay = clock_delay;
        trace!("Exec:  GPIO clock fast={fast_clock} delay={clock_delay}");
    }

    pub fn fast_clock(&self) -> bool {
        self.fast_clock
    }

    pub fn clock_delay(&self) -> u32 {
        self.clock_delay
    }

    pub fn pins(&mut self) -> &mut P {
        &mut self.pins
    }

    #[inline]
    fn half_cycle(&mut self) {
        if !self.fast_clock {
            self.pins.delay_cycles(self.clock_delay);
        }
    }

    #[inline]
    fn write_bit(&mut self, bit: bool) {
        self.pins.swdio_set(bit);
        self.pins.swclk_set(false);
        self.half_cycle();
        self.pins.swclk_set(true);
        self.half_cycle();
    }

    #[inline]
    fn read_bit(&mut self) -> bool {
        self.pins.swclk_set(false);
        self.half_cycle();
        let bit = self.pins.swdio_get();
        self.pins.swclk_set(true);
        self.half_cycle();
        bit
    }

    #[inline]
    fn clock(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.pins.swclk_set(false);
            self.half_cycle();
            self.pins.swclk_set(true);
            self.half_cycle();
        }
    }

    fn shift_out(&mut self, count: u32, bits: u64) {
        let mut bits = bits;
        for _ in 0..count {
            self.write_bit(bits & 1 == 1);
            bits >>= 1;
        }
    }

    fn shift_in(&mut self, count: u32) -> u64 {
        let mut bits = 0u64;
        for ii in 0..count {
            if self.read_bit() {
                bits |= 1 << ii;
            }
        }
        bits
    }

    fn read_data_parity(&mut self) -> (u32, bool) {
        let data = self.shift_in(32) as u32;
        let parity = self.read_bit();
        (data, parity)
    }
}

impl<P: SwdPins> Transport for GpioTransport<P> {
    fn send_request_header(&mut self, request: u8, wire: &WireConfig) -> u8 {
        self.shift_out(REQUEST_BITS as u32, request_byte(request) as u64);

        self.pins.swdio_output(false);
        self.clock(wire.turnaround as u32);

        self.shift_in(ACK_BITS as u32) as u8
    }

    fn transfer(&mut self, request: u8, data: &mut u32, wire: &WireConfig) -> u8 {
        let read = request & swdap_cmd::DAP_TRANSFER_RNW != 0;
        let mut ack = self.send_request_header(request, wire);

        match ack {
            DAP_TRANSFER_OK => {
                if read {
                    let (value, parity) = self.read_data_parity();
                    if parity32(value) != parity {
                        debug!("Error: Read parity error: data=0x{value:08X}, parity={parity}");
                        ack = DAP_TRANSFER_ERROR;
                    }
                    *data = value;
                    self.clock(wire.turnaround as u32);
                    self.pins.swdio_output(true);
                } else {
                    self.clock(wire.turnaround as u32);
                    self.pins.swdio_output(true);
                    self.shift_out(DATA_PARITY_BITS as u32, word_with_parity(*data));
                }

                if wire.idle_cycles > 0 {
                    self.pins.swdio_set(false);
                    self.clock(wire.idle_cycles as u32);
                }
                self.pins.swdio_set(true);
            }
            DAP_TRANSFER_WAIT | DAP_TRANSFER_FAULT => {
                if wire.data_phase && read {
                    self.clock(DATA_PARITY_BITS as u32);
                }
                self.clock(wire.turnaround as u32);
                self.pins.swdio_output(true);
                if wire.data_phase && !read {
                    self.pins.swdio_set(false);
                    self.clock(DATA_PARITY_BITS as u32);
                }
                self.pins.swdio_set(true);
            }
            _ => {
                // Clock out whatever the target might think is a data phase
                trace!("Error: Invalid ACK {ack:#03b}, resynchronising");
                self.clock(wire.turnaround as u32 + DATA_PARITY_BITS as u32);
                self.pins.swdio_output(true);
                self.pins.swdio_set(true);
            }
        }

        ack
    }

    fn write_bits(&mut self, count: u32, bits: u64) {
        self.pins.swdio_output(true);
        self.shift_out(count, bits);
    }

    fn read_bits(&mut self, count: u32) -> u64 {
        self.pins.swdio_output(false);
        self.shift_in(count)
    }

    fn idle_cycles(&mut self, count: u32) {
        self.pins.swdio_output(true);
        self.pins.swdio_set(false);
        self.clock(count);
    }

    fn drive_swdio(&mut self) {
        self.pins.swdio_output(true);
    }

    fn timestamp(&mut self) -> u32 {
        self.pins.timestamp()
    }
}
