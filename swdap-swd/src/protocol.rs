// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM SWD Wire Protocol
//!
//! This module holds what both wire backends share: the [`Transport`]
//! capability set, request packet encoding, the per-transaction wire
//! settings, and the well known SWJ bit sequences.
//!
//! A transaction on the wire looks like this, LSB first:
//!
//! ```text
//! host:   [start][APnDP][RnW][A2][A3][parity][stop][park]
//! trn:    SWDIO released for `turnaround` cycles
//! target: [ack0][ack1][ack2]
//! OK:     32 data bits + parity, driven by the target on a read (followed
//!         by a turnaround), by the host on a write (preceded by one)
//! idle:   SWDIO driven low for `idle_cycles` cycles, then left high
//! ```

use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use swdap_cmd::{DAP_TRANSFER_APNDP, DAP_TRANSFER_RNW, TransferRequest};
use swdap_core::arm::dp::{AbortRegister, IdCodeRegister, RdBuffRegister};
use swdap_core::arm::register::RegisterDescriptor;

use crate::parity::parity8;

// JTAG-to-SWD sequence as documented: 0111100111100111
const JTAG_TO_SWD_DOCUMENTED: u16 = 0b0111100111100111; // 0x79E7

/// JTAG-to-SWD sequence, reversed for LSB-first transmission
pub const JTAG_TO_SWD_SEQUENCE: u16 = JTAG_TO_SWD_DOCUMENTED.reverse_bits(); // 0xE79E

/// 50+ clock cycles with SWDIO high
pub const LINE_RESET_SWDIO_HIGH_CYCLES: u32 = 51;

/// Bits in a request packet
pub const REQUEST_BITS: u8 = 8;

/// Bits in an ACK
pub const ACK_BITS: u8 = 3;

/// Data bits plus parity
pub const DATA_PARITY_BITS: u8 = 33;

/// DP RDBUFF read request: returns the last posted AP read without starting
/// a new access.
pub const DP_RDBUFF_READ: u8 = RdBuffRegister::ADDRESS | DAP_TRANSFER_RNW;

/// DP ABORT write request
pub const DP_ABORT_WRITE: u8 = AbortRegister::ADDRESS;

/// DP IDCODE read request
pub const DP_IDCODE_READ: u8 = IdCodeRegister::ADDRESS | DAP_TRANSFER_RNW;

/// Wire settings applied to every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireConfig {
    /// Turnaround period in clock cycles, 1-4
    pub turnaround: u8,

    /// Clock a dummy data phase after WAIT and FAULT
    pub data_phase: bool,

    /// Idle cycles after each completed transaction
    pub idle_cycles: u8,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            turnaround: 1,
            data_phase: false,
            idle_cycles: 0,
        }
    }
}

/// The capability set implemented by each wire backend.
///
/// Backends are selected at runtime by [`crate::SwdPort`], which implements
/// this trait by delegating to whichever backend the last SWJ_Clock chose.
pub trait Transport {
    /// Send the 8-bit request packet for `request` (APnDP, RnW, A2, A3 in
    /// the low 4 bits), release SWDIO for the turnaround and sample the ACK.
    ///
    /// Returns the raw 3-bit ACK.  The caller must complete the transaction
    /// according to the ACK, so most callers want [`Self::transfer()`].
    fn send_request_header(&mut self, request: u8, wire: &WireConfig) -> u8;

    /// Perform one complete SWD transaction.
    ///
    /// On a read, `data` receives the value read.  On a write, `data` is the
    /// value written.
    ///
    /// Returns the ACK, or `DAP_TRANSFER_ERROR` if the read parity was bad.
    /// Bus recovery after WAIT, FAULT and invalid ACKs is handled here, so
    /// the link is always ready for the next request on return.
    fn transfer(&mut self, request: u8, data: &mut u32, wire: &WireConfig) -> u8;

    /// Drive `count` (at most 64) bits of `bits` onto SWDIO, LSB first.
    fn write_bits(&mut self, count: u32, bits: u64);

    /// Sample `count` (at most 64) bits from SWDIO, LSB first.  SWDIO is
    /// released first, and stays released until the next write or
    /// [`Self::drive_swdio()`].
    fn read_bits(&mut self, count: u32) -> u64;

    /// Clock `count` cycles with SWDIO driven low.
    fn idle_cycles(&mut self, count: u32);

    /// Take back control of SWDIO after a read.
    fn drive_swdio(&mut self);

    /// Timestamp clock value, captured after a data phase for transfers
    /// that request one.  Backends without a time base return 0.
    fn timestamp(&mut self) -> u32 {
        0
    }
}

/// Encode the 8-bit SWD request packet.
///
/// `request` carries APnDP, RnW, A2 and A3 in bits 0-3, as in a CMSIS-DAP
/// transfer request.  Higher bits are ignored.
///
/// The packet is `0x81 | parity << 5 | request << 1`: start, the four
/// request bits, even parity over them, stop and park.
pub fn request_byte(request: u8) -> u8 {
    let bits = request & 0x0F;
    0x81 | ((parity8(bits) as u8) << 5) | (bits << 1)
}

/// A single register operation, used for logging and the typed register
/// accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwdOp {
    DpRead(u8),
    DpWrite(u8),
    ApRead(u8),
    ApWrite(u8),
}

impl SwdOp {
    /// The CMSIS-DAP request bits for this operation
    pub fn request(&self) -> u8 {
        let (flags, addr) = match self {
            SwdOp::DpRead(a) => (DAP_TRANSFER_RNW, a),
            SwdOp::DpWrite(a) => (0, a),
            SwdOp::ApRead(a) => (DAP_TRANSFER_APNDP | DAP_TRANSFER_RNW, a),
            SwdOp::ApWrite(a) => (DAP_TRANSFER_APNDP, a),
        };
        flags | (addr & 0x0C)
    }

    /// The request packet put on the wire for this operation
    #[allow(clippy::wrong_self_convention)]
    pub fn to_cmd(&self) -> u8 {
        request_byte(self.request())
    }

    pub fn is_read(&self) -> bool {
        matches!(self, SwdOp::DpRead(_) | SwdOp::ApRead(_))
    }

    pub fn is_ap(&self) -> bool {
        matches!(self, SwdOp::ApRead(_) | SwdOp::ApWrite(_))
    }
}

impl From<TransferRequest> for SwdOp {
    fn from(req: TransferRequest) -> Self {
        let addr = req.addr();
        match (req.is_ap(), req.is_read()) {
            (false, true) => SwdOp::DpRead(addr),
            (false, false) => SwdOp::DpWrite(addr),
            (true, true) => SwdOp::ApRead(addr),
            (true, false) => SwdOp::ApWrite(addr),
        }
    }
}

impl fmt::Display for SwdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdOp::DpRead(a) => write!(f, "DP Read 0x{a:02X}"),
            SwdOp::DpWrite(a) => write!(f, "DP Write 0x{a:02X}"),
            SwdOp::ApRead(a) => write!(f, "AP Read 0x{a:02X}"),
            SwdOp::ApWrite(a) => write!(f, "AP Write 0x{a:02X}"),
        }
    }
}

/// Word with its parity bit in bit 32, as shifted onto the wire
#[inline]
pub(crate) fn word_with_parity(data: u32) -> u64 {
    (data as u64) | ((crate::parity::parity32(data) as u64) << 32)
}
