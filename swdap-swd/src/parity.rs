// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD even parity
//!
//! Parity is computed from a 256 entry table built at compile time, so a
//! 32-bit word costs four lookups on cores without a population count
//! instruction.

/// Parity of every byte value, 1 for an odd number of set bits.
pub static PARITY_TABLE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut ii = 0;
    while ii < 256 {
        table[ii] = ((ii as u8).count_ones() & 1) as u8;
        ii += 1;
    }
    table
}

/// Parity of a byte
#[inline]
pub fn parity8(value: u8) -> bool {
    PARITY_TABLE[value as usize] != 0
}

/// SWD parity of a data word - true for an odd number of bits set to 1.
#[inline]
pub fn parity32(value: u32) -> bool {
    let folded = value.to_le_bytes().iter().fold(0u8, |acc, b| acc ^ b);
    parity8(folded)
}
