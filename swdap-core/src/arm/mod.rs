// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM debug architecture definitions

pub mod dp;
pub mod map;
pub mod register;
pub mod scs;

use core::fmt;

use dp::IdCode;

/// Cortex-M cores recognised from their SW-DP IDCODE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cortex {
    M0,
    M3,
    M4,
    M33,
}

// IDCODE and display name of each recognised core
const CORES: [(Cortex, IdCode, &str); 4] = [
    (Cortex::M0, Cortex::IDCODE_M0, "Cortex-M0"),
    (Cortex::M3, Cortex::IDCODE_M3, "Cortex-M3"),
    (Cortex::M4, Cortex::IDCODE_M4, "Cortex-M4"),
    (Cortex::M33, Cortex::IDCODE_M33, "Cortex-M33"),
];

impl Cortex {
    /// SW-DP v1, as found on Cortex-M0 and M0+
    pub const IDCODE_M0: IdCode = IdCode::from_u32(0x0BC1_2477);
    pub const IDCODE_M3: IdCode = IdCode::from_u32(0x1BA0_1477);
    /// Also reported by Cortex-M7
    pub const IDCODE_M4: IdCode = IdCode::from_u32(0x2BA0_1477);
    /// SW-DP v2
    pub const IDCODE_M33: IdCode = IdCode::from_u32(0x4C01_3477);

    fn entry(&self) -> &'static (Cortex, IdCode, &'static str) {
        // Every variant has an entry
        &CORES[*self as usize]
    }

    pub fn idcode(&self) -> IdCode {
        self.entry().1
    }

    pub fn as_str(&self) -> &'static str {
        self.entry().2
    }

    /// The core reporting `idcode`, if it is one of those listed
    pub fn from_idcode(idcode: IdCode) -> Option<Cortex> {
        CORES
            .iter()
            .find(|(_, known, _)| *known == idcode)
            .map(|(core, _, _)| *core)
    }
}

impl fmt::Display for Cortex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARM {}", self.as_str())
    }
}
