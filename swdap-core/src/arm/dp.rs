// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Debug Port Registers
//!
//! Only the registers a CMSIS-DAP probe touches on its own account, plus
//! the status bits needed to reason about the sticky error state after a
//! FAULT, are described here.

use crate::arm::register::{DpRegister, ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::{register_data_rw, register_data_w};
use core::fmt;

/// IDCODE (DPIDR) Register descriptor (read-only)
pub struct IdCodeRegister;

impl RegisterDescriptor for IdCodeRegister {
    const ADDRESS: u8 = 0x00;
    type Value = IdCode;
}

impl ReadableRegister for IdCodeRegister {}
impl DpRegister for IdCodeRegister {}

/// ARM Debug Port IDCODE register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdCode(u32);

impl IdCode {
    const ARM_DESIGNER: u16 = 0x23B;

    pub const fn new(value: u32) -> Self {
        IdCode(value)
    }

    pub const fn from_u32(value: u32) -> Self {
        IdCode(value)
    }

    pub fn data(&self) -> u32 {
        self.0
    }

    /// Get revision field (bits 31:28)
    pub fn revision(&self) -> u8 {
        ((self.0 >> 28) & 0xF) as u8
    }

    /// Get part number (bits 27:20)
    pub fn part_number(&self) -> u8 {
        ((self.0 >> 20) & 0xFF) as u8
    }

    /// Get version (bits 15:12)
    pub fn version(&self) -> u8 {
        ((self.0 >> 12) & 0xF) as u8
    }

    /// Get JEDEC designer ID (bits 11:1)
    pub fn designer_id(&self) -> u16 {
        ((self.0 >> 1) & 0x7FF) as u16
    }

    /// Bit 0 reads as one on every valid IDCODE
    pub fn is_valid(&self) -> bool {
        (self.0 & 1) == 1
    }

    pub fn is_arm(&self) -> bool {
        self.designer_id() == Self::ARM_DESIGNER
    }
}

impl From<u32> for IdCode {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl From<IdCode> for u32 {
    fn from(value: IdCode) -> u32 {
        value.0
    }
}

impl fmt::Display for IdCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() && !self.is_valid() {
            write!(f, "Invalid IDCODE: 0x{:08X} (LSB not set)", self.0)
        } else {
            write!(f, "0x{:08X}", self.0)
        }
    }
}

/// ABORT Register descriptor (write-only)
///
/// Shares address 0x00 with IDCODE; a write reaches ABORT, a read IDCODE.
pub struct AbortRegister;

impl RegisterDescriptor for AbortRegister {
    const ADDRESS: u8 = 0x00;
    type Value = Abort;
}

impl WritableRegister for AbortRegister {}
impl DpRegister for AbortRegister {}

/// ARM Debug Port ABORT register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Abort(u32);

register_data_w!(Abort);

impl Abort {
    pub const DAPABORT: u32 = 1 << 0;
    pub const STKCMPCLR: u32 = 1 << 1;
    pub const STKERRCLR: u32 = 1 << 2;
    pub const WDERRCLR: u32 = 1 << 3;
    pub const ORUNERRCLR: u32 = 1 << 4;

    /// All four sticky-flag clear bits
    pub const CLEAR_ALL: u32 =
        Self::STKCMPCLR | Self::STKERRCLR | Self::WDERRCLR | Self::ORUNERRCLR;

    pub const fn new(value: u32) -> Self {
        Abort(value)
    }

    pub fn dapabort(&self) -> bool {
        self.0 & Self::DAPABORT != 0
    }

    pub fn stkcmpclr(&self) -> bool {
        self.0 & Self::STKCMPCLR != 0
    }

    pub fn stkerrclr(&self) -> bool {
        self.0 & Self::STKERRCLR != 0
    }

    pub fn wderrclr(&self) -> bool {
        self.0 & Self::WDERRCLR != 0
    }

    pub fn orunerrclr(&self) -> bool {
        self.0 & Self::ORUNERRCLR != 0
    }
}

impl From<u32> for Abort {
    fn from(value: u32) -> Self {
        Abort(value)
    }
}

/// CTRL/STAT Register descriptor (read-write)
pub struct CtrlStatRegister;

impl RegisterDescriptor for CtrlStatRegister {
    const ADDRESS: u8 = 0x04;
    type Value = CtrlStat;
}

impl ReadableRegister for CtrlStatRegister {}
impl WritableRegister for CtrlStatRegister {}
impl DpRegister for CtrlStatRegister {}

/// ARM Debug Port CTRL/STAT register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CtrlStat(u32);

register_data_rw!(CtrlStat);

impl CtrlStat {
    pub const STICKYORUN: u32 = 1 << 1;
    pub const STICKYCMP: u32 = 1 << 4;
    pub const STICKYERR: u32 = 1 << 5;
    pub const READOK: u32 = 1 << 6;
    pub const WDATAERR: u32 = 1 << 7;
    pub const CDBGPWRUPREQ: u32 = 1 << 28;
    pub const CDBGPWRUPACK: u32 = 1 << 29;
    pub const CSYSPWRUPREQ: u32 = 1 << 30;
    pub const CSYSPWRUPACK: u32 = 1 << 31;

    const STICKY: u32 = Self::STICKYORUN | Self::STICKYCMP | Self::STICKYERR | Self::WDATAERR;

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn stickyorun(&self) -> bool {
        self.0 & Self::STICKYORUN != 0
    }

    pub fn stickycmp(&self) -> bool {
        self.0 & Self::STICKYCMP != 0
    }

    pub fn stickyerr(&self) -> bool {
        self.0 & Self::STICKYERR != 0
    }

    pub fn wdataerr(&self) -> bool {
        self.0 & Self::WDATAERR != 0
    }

    pub fn has_errors(&self) -> bool {
        self.0 & Self::STICKY != 0
    }

    pub fn set_stickyerr(&mut self, enable: bool) {
        if enable {
            self.0 |= Self::STICKYERR;
        } else {
            self.0 &= !Self::STICKYERR;
        }
    }

    pub fn set_wdataerr(&mut self, enable: bool) {
        if enable {
            self.0 |= Self::WDATAERR;
        } else {
            self.0 &= !Self::WDATAERR;
        }
    }

    /// Clear whichever sticky flags the given ABORT write asks to clear
    pub fn apply_abort(&mut self, abort: Abort) {
        if abort.stkcmpclr() {
            self.0 &= !Self::STICKYCMP;
        }
        if abort.stkerrclr() {
            self.0 &= !Self::STICKYERR;
        }
        if abort.wderrclr() {
            self.0 &= !Self::WDATAERR;
        }
        if abort.orunerrclr() {
            self.0 &= !Self::STICKYORUN;
        }
    }

    /// Writes to CTRL/STAT can only set the request bits; the power-up
    /// acknowledges follow the requests.
    pub fn write_requests(&mut self, value: u32) {
        let req = value & (Self::CDBGPWRUPREQ | Self::CSYSPWRUPREQ);
        let sticky = self.0 & Self::STICKY;
        self.0 = req | sticky | (req << 1);
    }
}

/// SELECT Register descriptor (write-only on SW-DP v1, read-write later)
pub struct SelectRegister;

impl RegisterDescriptor for SelectRegister {
    const ADDRESS: u8 = 0x08;
    type Value = Select;
}

impl ReadableRegister for SelectRegister {}
impl WritableRegister for SelectRegister {}
impl DpRegister for SelectRegister {}

/// ARM Debug Port SELECT register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Select(u32);

register_data_rw!(Select);

impl Select {
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// RDBUFF Register descriptor (read-only)
///
/// Returns the result of the last posted AP read without starting a new
/// AP access.
pub struct RdBuffRegister;

impl RegisterDescriptor for RdBuffRegister {
    const ADDRESS: u8 = 0x0C;
    type Value = u32;
}

impl ReadableRegister for RdBuffRegister {}
impl DpRegister for RdBuffRegister {}
