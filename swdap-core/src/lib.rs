// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! swdap-core - ARM debug concepts shared by the swdap CMSIS-DAP engine.
//!
//! This crate holds the ARM Debug Interface (ADIv5) register definitions the
//! SWD transfer engine needs by name: the Debug Port registers that the
//! engine reads and writes on its own account (RDBUFF, ABORT), the MEM-AP
//! registers used by the target reset sequence, and the System Control Block
//! AIRCR register.
//!
//! It is designed to be used with `swdap-swd`, which implements the
//! CMSIS-DAP transfer engine, but contains nothing SWD specific.
//!
//! This library is `no_std` compatible and does not require an allocator.

#![cfg_attr(not(test), no_std)]

pub mod arm;

#[doc(inline)]
pub use crate::arm::Cortex;
