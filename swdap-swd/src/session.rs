// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Per-probe session state
//!
//! Everything the host can configure lives here, owned by the [`crate::Dap`]
//! instance rather than in globals.  The abort flag is the only piece that
//! may be touched from another thread, via an [`AbortHandle`].

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use swdap_cmd::Port;

use crate::clock::Backend;
use crate::protocol::WireConfig;

/// SWD wire settings from DAP_SWD_Configure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwdConfig {
    /// Turnaround period, 1-4 clock cycles
    pub turnaround: u8,

    /// Generate a data phase on WAIT and FAULT
    pub data_phase: bool,
}

impl Default for SwdConfig {
    fn default() -> Self {
        Self {
            turnaround: 1,
            data_phase: false,
        }
    }
}

impl SwdConfig {
    /// Decode the DAP_SWD_Configure byte: bits 1:0 are turnaround - 1, bit 2
    /// is the data phase flag.
    pub fn from_byte(cfg: u8) -> Self {
        Self {
            turnaround: (cfg & 0x03) + 1,
            data_phase: cfg & 0x04 != 0,
        }
    }
}

/// Transfer settings from DAP_TransferConfigure, plus the match mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Idle cycles after each transfer
    pub idle_cycles: u8,

    /// Retries after a WAIT ACK
    pub retry_count: u16,

    /// Retries of a value-match read that does not match
    pub match_retry: u16,

    /// Mask applied to value-match reads, set by a match mask write
    pub match_mask: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            idle_cycles: 0,
            retry_count: 100,
            match_retry: 0,
            match_mask: 0,
        }
    }
}

/// The SWD clock most recently requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockState {
    /// Requested frequency in Hz
    pub frequency: u32,

    /// The backend, and its delay, chosen for that frequency
    pub backend: Backend,
}

impl Default for ClockState {
    fn default() -> Self {
        // 1MHz with the default platform timing
        Self {
            frequency: 1_000_000,
            backend: Backend::GpioNormal { delay: 16 },
        }
    }
}

/// Cancels an in-progress DAP_Transfer or DAP_TransferBlock.
///
/// Cloneable, and safe to use from another thread or an interrupt handler.
/// The engine checks the flag between register transfers and clears it when
/// the next transfer command starts.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Session state
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub debug_port: Port,
    pub clock: ClockState,
    pub swd: SwdConfig,
    pub transfer: TransferConfig,

    /// Last captured timestamp
    pub timestamp: u32,

    abort: AbortHandle,
}

impl Session {
    pub fn new(clock: ClockState) -> Self {
        Self {
            clock,
            ..Default::default()
        }
    }

    /// A handle that can abort transfers in this session
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    pub(crate) fn set_abort(&self) {
        self.abort.abort();
    }

    pub(crate) fn clear_abort(&self) {
        self.abort.clear();
    }

    /// The settings applied to each bus transaction
    pub fn wire(&self) -> WireConfig {
        WireConfig {
            turnaround: self.swd.turnaround,
            data_phase: self.swd.data_phase,
            idle_cycles: self.transfer.idle_cycles,
        }
    }

    pub fn is_swd(&self) -> bool {
        self.debug_port == Port::Swd
    }
}
