// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Hardware shift register SWD backend
//!
//! Used for clocks of 10MHz and above, where bit-banging cannot keep up.  The
//! shift register has no notion of a turnaround, so turnaround cycles are
//! folded into the input phase of the shift before them, and the host simply
//! ignores the bits sampled there.
//!
//! Write data goes out as 34 bits, with an ignored low pad bit after the
//! parity bit, because not every shift engine can produce a 33 bit frame.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use swdap_cmd::{
    DAP_TRANSFER_ERROR, DAP_TRANSFER_FAULT, DAP_TRANSFER_OK, DAP_TRANSFER_RNW, DAP_TRANSFER_WAIT,
};

use crate::hal::ShiftRegister;
use crate::parity::parity32;
use crate::protocol::{
    ACK_BITS, DATA_PARITY_BITS, REQUEST_BITS, Transport, WireConfig, request_byte,
    word_with_parity,
};

/// Write data, parity and the pad bit
const WRITE_DATA_BITS: u8 = 34;

/// Longest single shift, in bits
const MAX_SHIFT_BITS: u32 = 64;

/// Shift register SWD backend
#[derive(Debug)]
pub struct SpiTransport<S: ShiftRegister> {
    shift: S,
}

impl<S: ShiftRegister> SpiTransport<S> {
    pub fn new(shift: S) -> Self {
        Self { shift }
    }

    /// Route the SWD pins to the shift register
    pub fn attach(&mut self) {
        trace!("Exec:  SPI attach");
        self.shift.attach();
    }

    /// Return the SWD pins to GPIO control
    pub fn detach(&mut self) {
        trace!("Exec:  SPI detach");
        self.shift.detach();
    }

    pub fn shift_register(&mut self) -> &mut S {
        &mut self.shift
    }
}

impl<S: ShiftRegister> Transport for SpiTransport<S> {
    fn send_request_header(&mut self, request: u8, wire: &WireConfig) -> u8 {
        let trn = wire.turnaround;
        let write = request & DAP_TRANSFER_RNW == 0;

        // Writes also take the turnaround after the ACK here, so the data
        // can follow as a pure output shift
        let in_bits = trn + ACK_BITS + if write { trn } else { 0 };
        let bits = self
            .shift
            .shift(request_byte(request) as u64, REQUEST_BITS, in_bits);

        ((bits >> trn) & 0b111) as u8
    }

    fn transfer(&mut self, request: u8, data: &mut u32, wire: &WireConfig) -> u8 {
        let read = request & DAP_TRANSFER_RNW != 0;
        let trn = wire.turnaround;
        let mut ack = self.send_request_header(request, wire);

        match ack {
            DAP_TRANSFER_OK => {
                if read {
                    let bits = self.shift.shift(0, 0, DATA_PARITY_BITS + trn);
                    let value = bits as u32;
                    let parity = bits & (1 << 32) != 0;
                    if parity32(value) != parity {
                        debug!("Error: Read parity error: data=0x{value:08X}, parity={parity}");
                        ack = DAP_TRANSFER_ERROR;
                    }
                    *data = value;
                } else {
                    self.shift.shift(word_with_parity(*data), WRITE_DATA_BITS, 0);
                }

                if wire.idle_cycles > 0 {
                    self.idle_cycles(wire.idle_cycles as u32);
                }
            }
            DAP_TRANSFER_WAIT | DAP_TRANSFER_FAULT => {
                if read {
                    let dummy = if wire.data_phase { DATA_PARITY_BITS } else { 0 };
                    self.shift.shift(0, 0, dummy + trn);
                } else if wire.data_phase {
                    self.shift.shift(0, WRITE_DATA_BITS, 0);
                }
            }
            _ => {
                trace!("Error: Invalid ACK {ack:#03b}, resynchronising");
                if read {
                    self.shift.shift(0, 0, trn + DATA_PARITY_BITS);
                } else {
                    self.shift.shift(0, 0, DATA_PARITY_BITS);
                }
            }
        }

        ack
    }

    fn write_bits(&mut self, count: u32, bits: u64) {
        self.shift.shift(bits, count.min(MAX_SHIFT_BITS) as u8, 0);
    }

    fn read_bits(&mut self, count: u32) -> u64 {
        self.shift.shift(0, 0, count.min(MAX_SHIFT_BITS) as u8)
    }

    fn idle_cycles(&mut self, count: u32) {
        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(MAX_SHIFT_BITS);
            self.shift.shift(0, chunk as u8, 0);
            remaining -= chunk;
        }
    }

    // Direction is set per shift
    fn drive_swdio(&mut self) {}
}
