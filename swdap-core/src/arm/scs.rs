// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARMv7-M System Control Space registers used to reset a target from the
//! debug port.

use core::fmt;

/// Application Interrupt and Reset Control Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Aircr(u32);

crate::register_data_rw!(Aircr);

impl Aircr {
    /// Memory mapped address of AIRCR
    pub const ADDRESS: u32 = 0xE000_ED0C;

    /// Writes are ignored unless bits 31:16 hold this key
    pub const VECTKEY: u32 = 0x05FA << 16;

    pub const SYSRESETREQ: u32 = 1 << 2;

    /// The value that requests a system reset
    pub const fn system_reset() -> Self {
        Aircr(Self::VECTKEY | Self::SYSRESETREQ)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn sysresetreq(&self) -> bool {
        self.0 & Self::SYSRESETREQ != 0
    }
}
