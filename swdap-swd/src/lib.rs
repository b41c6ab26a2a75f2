// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! swdap-swd library
//!
//! CMSIS-DAP probe engine for the ARM Serial Wire Debug (SWD) transport.
//!
//! This implements the probe side of the
//! [CMSIS-DAP](https://arm-software.github.io/CMSIS_5/DAP/html/index.html)
//! command protocol: a host tool such as probe-rs or OpenOCD sends command
//! packets, and this crate turns them into
//! [SWD](https://developer.arm.com/documentation/ihi0031/latest/) bus
//! transactions against a target microcontroller.
//!
//! It is `no_std` and platform agnostic.  It requires an `alloc`
//! implementation.  The hardware is injected through the traits in [`hal`].
//!
//! The following diagram shows the key `swdap-swd` concepts.
//!
//! ```text
//!   Host transport (USB/TCP) ==  command packet  ==   Host tool
//! ---------------------------                        -----------
//!      Dap (dispatcher)        \                     e.g. probe-rs
//! ---------------------------   \
//!     SwdEngine (transfers)      |--  Session, SwdError
//! ---------------------------   /
//!  SwdPort (backend selection) /
//! ---------------------------
//!  GpioTransport | SpiTransport                      e.g. STM32
//! ---------------------------                      -----------
//!    SwdPins | ShiftRegister  >==================<   SWD Target
//!                               SWDIO/SWCLK/nRESET
//! ```
//!
//! * [`Dap`] decodes command packets, including batched
//!   `DAP_ExecuteCommands`, and writes the response packet.
//! * [`SwdEngine`] sequences register transfers: WAIT retries, posted AP
//!   reads, value matching, block transfers and ABORT writes.
//! * [`SwdPort`] holds both wire backends and switches between them when the
//!   host changes the SWD clock.
//! * [`GpioTransport`] bit-bangs the wire protocol, [`SpiTransport`] uses a
//!   hardware shift register for clocks of 10MHz and above.
//!
//! `swdap-swd` uses [`swdap_cmd`] for the CMSIS-DAP wire constants and
//! [`swdap_core`] for the ARM debug register definitions.

#![cfg_attr(not(test), no_std)]

pub mod clock;
pub mod config;
pub mod dap;
pub mod gpio;
pub mod hal;
pub mod interface;
pub mod parity;
pub mod port;
pub mod protocol;
pub mod session;
pub mod spi;

#[cfg(test)]
mod sim;

#[doc(inline)]
pub use crate::config::ProbeConfig;
#[doc(inline)]
pub use crate::dap::{Dap, NoVendor, Processed, VendorCommands};
#[doc(inline)]
pub use crate::gpio::GpioTransport;
#[doc(inline)]
pub use crate::hal::{DelayCycles, ShiftRegister, SwdPins, SwdioPin};
#[doc(inline)]
pub use crate::interface::SwdEngine;
#[doc(inline)]
pub use crate::port::SwdPort;
#[doc(inline)]
pub use crate::protocol::Transport;
#[doc(inline)]
pub use crate::session::{AbortHandle, Session};
#[doc(inline)]
pub use crate::spi::SpiTransport;

extern crate alloc;
use alloc::format;
use alloc::string::String;
use core::fmt;
use serde::Serialize;

use swdap_cmd::{
    DAP_TRANSFER_ERROR, DAP_TRANSFER_FAULT, DAP_TRANSFER_MISMATCH, DAP_TRANSFER_OK,
    DAP_TRANSFER_WAIT, ProtocolError,
};

/// Core error type used by all swdap-swd objects
///
/// Bus failures during CMSIS-DAP command processing are reported to the host
/// as data in the response packet, so this type only appears on the Rust
/// API: the typed register accessors on [`SwdEngine`], configuration
/// validation and clock selection.
///
/// Methods are provided to make it easier to handle errors, by checking if
/// either a retry or reset is required:
///
/// - [`SwdError::requires_retry()`]
/// - [`SwdError::requires_reset()`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwdError {
    /// The target kept answering WAIT until the retry count ran out.
    WaitAck,

    /// The target answered FAULT.  The sticky error flags need clearing via
    /// a DP ABORT write before the target will accept further AP accesses.
    FaultAck,

    /// The ACK was none of OK, WAIT or FAULT.  The value received is
    /// included; 7 means SWDIO was high throughout the ACK phase, which
    /// usually means nothing is connected or the target is not in SWD mode.
    NoAck(u8),

    /// A parity error was detected while reading from the target.
    ReadParity,

    /// A value-match read never matched within the match retry count.
    Mismatch,

    /// A command ended before its arguments did.
    Truncated,

    /// A clock frequency of zero was requested.
    ZeroClock,

    /// The probe configuration is invalid.  The detail says which field.
    InvalidConfig(String),

    /// The debug port is not connected in SWD mode.
    NotConnected,

    /// The API was called incorrectly.
    Api,

    /// The requested operation is not supported by `swdap-swd`.
    Unsupported,
}

impl SwdError {
    /// Converts a CMSIS-DAP transfer response value into a result.
    pub fn from_ack(ack: u8) -> Result<(), SwdError> {
        if ack & DAP_TRANSFER_MISMATCH != 0 {
            return Err(SwdError::Mismatch);
        }
        match ack {
            DAP_TRANSFER_OK => Ok(()),
            DAP_TRANSFER_WAIT => Err(SwdError::WaitAck),
            DAP_TRANSFER_FAULT => Err(SwdError::FaultAck),
            DAP_TRANSFER_ERROR => Err(SwdError::ReadParity),
            _ => Err(SwdError::NoAck(ack)),
        }
    }

    /// Returns true if the error requires the link to be reset to recover.
    /// In this case re-issue DAP_Connect and a line reset.  If the error
    /// persists, the target may require a hard reset.
    pub fn requires_reset(&self) -> bool {
        matches!(
            self,
            SwdError::NoAck(_) | SwdError::FaultAck | SwdError::ReadParity
        )
    }

    /// Returns true if the error is a transient error that can be retried.
    pub fn requires_retry(&self) -> bool {
        matches!(self, SwdError::WaitAck | SwdError::Mismatch)
    }

    /// Returns true if the error requires neither a reset nor retry to
    /// recover.  Normally this means the API has been used incorrectly.
    pub fn requires_other(&self) -> bool {
        !self.requires_reset() && !self.requires_retry()
    }

    /// Returns a string representation of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            SwdError::WaitAck => "Wait ACK",
            SwdError::FaultAck => "Fault ACK",
            SwdError::NoAck(_) => "No ACK",
            SwdError::ReadParity => "Read Parity Error",
            SwdError::Mismatch => "Value Mismatch",
            SwdError::Truncated => "Truncated Request",
            SwdError::ZeroClock => "Zero Clock",
            SwdError::InvalidConfig(_) => "Invalid Configuration",
            SwdError::NotConnected => "Not Connected",
            SwdError::Api => "API Error",
            SwdError::Unsupported => "Unsupported Operation",
        }
    }
}

impl Serialize for SwdError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SwdError", 2)?;

        let kind = match self {
            SwdError::WaitAck => "wait ack",
            SwdError::FaultAck => "fault ack",
            SwdError::NoAck(_) => "no ack",
            SwdError::ReadParity => "read parity",
            SwdError::Mismatch => "mismatch",
            SwdError::Truncated => "truncated",
            SwdError::ZeroClock => "zero clock",
            SwdError::InvalidConfig(_) => "invalid config",
            SwdError::NotConnected => "not connected",
            SwdError::Api => "api error",
            SwdError::Unsupported => "unsupported",
        };

        state.serialize_field("kind", kind)?;

        let detail = match self {
            SwdError::InvalidConfig(msg) => msg.as_str(),
            SwdError::NoAck(code) => &format!("{code}"),
            _ => "",
        };
        state.serialize_field("detail", detail)?;
        state.end()
    }
}

impl fmt::Display for SwdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdError::NoAck(ack) => write!(f, "{}: {ack}", self.as_str()),
            SwdError::InvalidConfig(str) => write!(f, "{}: {str}", self.as_str()),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

impl From<ProtocolError> for SwdError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Truncated => SwdError::Truncated,
            ProtocolError::Arg => SwdError::Api,
            ProtocolError::Command(_) => SwdError::Unsupported,
        }
    }
}
