// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! swdap-cmd - CMSIS-DAP wire constants and types for the swdap engine
//!
//! This crate holds everything needed to decode a CMSIS-DAP v2 command
//! packet without touching hardware:
//! - command IDs, and the [`Command`] enum used to dispatch them
//! - DAP_Info IDs and capability bits
//! - status codes, port IDs and pin bits
//! - transfer request bits and ACK values
//! - the negotiated packet size and count bounds
//! - [`RequestReader`], a bounds-checked little-endian request cursor
//!
//! It is used by `swdap-swd`, which implements the command handlers.
//!
//! This crate is `no_std` and platform agnostic.

#![cfg_attr(not(test), no_std)]

use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_assertions::const_assert;

/// CMSIS-DAP command IDs
pub const ID_DAP_INFO: u8 = 0x00;
pub const ID_DAP_HOST_STATUS: u8 = 0x01;
pub const ID_DAP_CONNECT: u8 = 0x02;
pub const ID_DAP_DISCONNECT: u8 = 0x03;
pub const ID_DAP_TRANSFER_CONFIGURE: u8 = 0x04;
pub const ID_DAP_TRANSFER: u8 = 0x05;
pub const ID_DAP_TRANSFER_BLOCK: u8 = 0x06;
pub const ID_DAP_TRANSFER_ABORT: u8 = 0x07;
pub const ID_DAP_WRITE_ABORT: u8 = 0x08;
pub const ID_DAP_DELAY: u8 = 0x09;
pub const ID_DAP_RESET_TARGET: u8 = 0x0A;
pub const ID_DAP_SWJ_PINS: u8 = 0x10;
pub const ID_DAP_SWJ_CLOCK: u8 = 0x11;
pub const ID_DAP_SWJ_SEQUENCE: u8 = 0x12;
pub const ID_DAP_SWD_CONFIGURE: u8 = 0x13;
pub const ID_DAP_JTAG_SEQUENCE: u8 = 0x14;
pub const ID_DAP_JTAG_CONFIGURE: u8 = 0x15;
pub const ID_DAP_JTAG_IDCODE: u8 = 0x16;
pub const ID_DAP_SWO_TRANSPORT: u8 = 0x17;
pub const ID_DAP_SWO_MODE: u8 = 0x18;
pub const ID_DAP_SWO_BAUDRATE: u8 = 0x19;
pub const ID_DAP_SWO_CONTROL: u8 = 0x1A;
pub const ID_DAP_SWO_STATUS: u8 = 0x1B;
pub const ID_DAP_SWO_DATA: u8 = 0x1C;
pub const ID_DAP_SWD_SEQUENCE: u8 = 0x1D;
pub const ID_DAP_SWO_EXTENDED_STATUS: u8 = 0x1E;
pub const ID_DAP_QUEUE_COMMANDS: u8 = 0x7E;
pub const ID_DAP_EXECUTE_COMMANDS: u8 = 0x7F;
pub const ID_DAP_VENDOR0: u8 = 0x80;
pub const ID_DAP_VENDOR31: u8 = 0x9F;
pub const ID_DAP_INVALID: u8 = 0xFF;

/// Number of vendor command slots
pub const VENDOR_SLOTS: usize = (ID_DAP_VENDOR31 - ID_DAP_VENDOR0) as usize + 1;
const_assert!(VENDOR_SLOTS == 32);

/// DAP status codes
pub const DAP_OK: u8 = 0x00;
pub const DAP_ERROR: u8 = 0xFF;

/// DAP_Info IDs
pub const DAP_ID_VENDOR: u8 = 0x01;
pub const DAP_ID_PRODUCT: u8 = 0x02;
pub const DAP_ID_SER_NUM: u8 = 0x03;
pub const DAP_ID_DAP_FW_VER: u8 = 0x04;
pub const DAP_ID_DEVICE_VENDOR: u8 = 0x05;
pub const DAP_ID_DEVICE_NAME: u8 = 0x06;
pub const DAP_ID_BOARD_VENDOR: u8 = 0x07;
pub const DAP_ID_BOARD_NAME: u8 = 0x08;
pub const DAP_ID_PRODUCT_FW_VER: u8 = 0x09;
pub const DAP_ID_CAPABILITIES: u8 = 0xF0;
pub const DAP_ID_TIMESTAMP_CLOCK: u8 = 0xF1;
pub const DAP_ID_SWO_BUFFER_SIZE: u8 = 0xFD;
pub const DAP_ID_PACKET_COUNT: u8 = 0xFE;
pub const DAP_ID_PACKET_SIZE: u8 = 0xFF;

/// DAP_Info capability bits (first byte)
pub const CAP_SWD: u8 = 1 << 0;
pub const CAP_TIMESTAMP: u8 = 1 << 5;

/// DAP_HostStatus types
pub const DAP_DEBUGGER_CONNECTED: u8 = 0;
pub const DAP_TARGET_RUNNING: u8 = 1;

/// DAP port IDs, as used by DAP_Connect
pub const DAP_PORT_AUTODETECT: u8 = 0;
pub const DAP_PORT_DISABLED: u8 = 0;
pub const DAP_PORT_SWD: u8 = 1;
pub const DAP_PORT_JTAG: u8 = 2;

/// DAP_SWJ_Pins pin bits
pub const DAP_SWJ_SWCLK_TCK: u8 = 1 << 0;
pub const DAP_SWJ_SWDIO_TMS: u8 = 1 << 1;
pub const DAP_SWJ_NRESET: u8 = 1 << 7;

/// DAP transfer request bits
pub const DAP_TRANSFER_APNDP: u8 = 1 << 0;
pub const DAP_TRANSFER_RNW: u8 = 1 << 1;
pub const DAP_TRANSFER_A2: u8 = 1 << 2;
pub const DAP_TRANSFER_A3: u8 = 1 << 3;
pub const DAP_TRANSFER_MATCH_VALUE: u8 = 1 << 4;
pub const DAP_TRANSFER_MATCH_MASK: u8 = 1 << 5;
pub const DAP_TRANSFER_TIMESTAMP: u8 = 1 << 7;

/// DAP transfer response bits, the SWD ACK values plus the logical mismatch
pub const DAP_TRANSFER_OK: u8 = 1 << 0;
pub const DAP_TRANSFER_WAIT: u8 = 1 << 1;
pub const DAP_TRANSFER_FAULT: u8 = 1 << 2;
pub const DAP_TRANSFER_ERROR: u8 = 1 << 3;
pub const DAP_TRANSFER_MISMATCH: u8 = 1 << 4;

/// DAP_SWD_Sequence info byte fields
pub const SWD_SEQUENCE_CLK: u8 = 0x3F;
pub const SWD_SEQUENCE_DIN: u8 = 1 << 7;

/// Packet size bounds, in bytes
pub const MIN_PACKET_SIZE: u16 = 64;
pub const MAX_PACKET_SIZE: u16 = 32768;

/// Fewest outstanding packets a probe may advertise
pub const MIN_PACKET_COUNT: u8 = 1;

/// Default negotiated packet size and count
pub const DEFAULT_PACKET_SIZE: u16 = 64;
pub const DEFAULT_PACKET_COUNT: u8 = 255;

const_assert!(DEFAULT_PACKET_SIZE >= MIN_PACKET_SIZE && DEFAULT_PACKET_SIZE <= MAX_PACKET_SIZE);
const_assert!(DEFAULT_PACKET_COUNT >= MIN_PACKET_COUNT);

/// Returns true if the packet size lies within the CMSIS-DAP bounds
pub const fn packet_size_valid(size: u16) -> bool {
    size >= MIN_PACKET_SIZE && size <= MAX_PACKET_SIZE
}

/// Returns true if the outstanding packet count lies within the CMSIS-DAP
/// bounds
pub const fn packet_count_valid(count: u8) -> bool {
    count >= MIN_PACKET_COUNT
}

/// Returns true if the command byte lies in the vendor range
pub const fn is_vendor(cmd: u8) -> bool {
    cmd >= ID_DAP_VENDOR0 && cmd <= ID_DAP_VENDOR31
}

/// CMSIS-DAP commands understood by the dispatcher
///
/// Vendor commands (0x80-0x9F) are not represented here, as they are routed
/// by range before decoding.  See [`is_vendor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Info = ID_DAP_INFO,
    HostStatus = ID_DAP_HOST_STATUS,
    Connect = ID_DAP_CONNECT,
    Disconnect = ID_DAP_DISCONNECT,
    TransferConfigure = ID_DAP_TRANSFER_CONFIGURE,
    Transfer = ID_DAP_TRANSFER,
    TransferBlock = ID_DAP_TRANSFER_BLOCK,
    TransferAbort = ID_DAP_TRANSFER_ABORT,
    WriteAbort = ID_DAP_WRITE_ABORT,
    Delay = ID_DAP_DELAY,
    ResetTarget = ID_DAP_RESET_TARGET,
    SwjPins = ID_DAP_SWJ_PINS,
    SwjClock = ID_DAP_SWJ_CLOCK,
    SwjSequence = ID_DAP_SWJ_SEQUENCE,
    SwdConfigure = ID_DAP_SWD_CONFIGURE,
    JtagSequence = ID_DAP_JTAG_SEQUENCE,
    JtagConfigure = ID_DAP_JTAG_CONFIGURE,
    JtagIdcode = ID_DAP_JTAG_IDCODE,
    SwoTransport = ID_DAP_SWO_TRANSPORT,
    SwoMode = ID_DAP_SWO_MODE,
    SwoBaudrate = ID_DAP_SWO_BAUDRATE,
    SwoControl = ID_DAP_SWO_CONTROL,
    SwoStatus = ID_DAP_SWO_STATUS,
    SwoData = ID_DAP_SWO_DATA,
    SwdSequence = ID_DAP_SWD_SEQUENCE,
    SwoExtendedStatus = ID_DAP_SWO_EXTENDED_STATUS,
    QueueCommands = ID_DAP_QUEUE_COMMANDS,
    ExecuteCommands = ID_DAP_EXECUTE_COMMANDS,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::Info => "DAP_Info",
            Command::HostStatus => "DAP_HostStatus",
            Command::Connect => "DAP_Connect",
            Command::Disconnect => "DAP_Disconnect",
            Command::TransferConfigure => "DAP_TransferConfigure",
            Command::Transfer => "DAP_Transfer",
            Command::TransferBlock => "DAP_TransferBlock",
            Command::TransferAbort => "DAP_TransferAbort",
            Command::WriteAbort => "DAP_WriteABORT",
            Command::Delay => "DAP_Delay",
            Command::ResetTarget => "DAP_ResetTarget",
            Command::SwjPins => "DAP_SWJ_Pins",
            Command::SwjClock => "DAP_SWJ_Clock",
            Command::SwjSequence => "DAP_SWJ_Sequence",
            Command::SwdConfigure => "DAP_SWD_Configure",
            Command::JtagSequence => "DAP_JTAG_Sequence",
            Command::JtagConfigure => "DAP_JTAG_Configure",
            Command::JtagIdcode => "DAP_JTAG_IDCODE",
            Command::SwoTransport => "DAP_SWO_Transport",
            Command::SwoMode => "DAP_SWO_Mode",
            Command::SwoBaudrate => "DAP_SWO_Baudrate",
            Command::SwoControl => "DAP_SWO_Control",
            Command::SwoStatus => "DAP_SWO_Status",
            Command::SwoData => "DAP_SWO_Data",
            Command::SwdSequence => "DAP_SWD_Sequence",
            Command::SwoExtendedStatus => "DAP_SWO_ExtendedStatus",
            Command::QueueCommands => "DAP_QueueCommands",
            Command::ExecuteCommands => "DAP_ExecuteCommands",
        };
        write!(f, "{s}")
    }
}

impl Command {
    /// Converts a Command to its byte representation
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Convert a command byte to a `Command` enum variant
    ///
    /// Arguments:
    /// - `cmd`: The command byte to convert.
    ///
    /// Returns:
    /// - `Ok(Command)`: If the command byte is recognized.
    /// - `Err(ProtocolError::Command)`: If the command byte is not
    ///   recognized, including vendor commands.
    pub fn from_byte(cmd: u8) -> Result<Self, ProtocolError> {
        match cmd {
            ID_DAP_INFO => Ok(Self::Info),
            ID_DAP_HOST_STATUS => Ok(Self::HostStatus),
            ID_DAP_CONNECT => Ok(Self::Connect),
            ID_DAP_DISCONNECT => Ok(Self::Disconnect),
            ID_DAP_TRANSFER_CONFIGURE => Ok(Self::TransferConfigure),
            ID_DAP_TRANSFER => Ok(Self::Transfer),
            ID_DAP_TRANSFER_BLOCK => Ok(Self::TransferBlock),
            ID_DAP_TRANSFER_ABORT => Ok(Self::TransferAbort),
            ID_DAP_WRITE_ABORT => Ok(Self::WriteAbort),
            ID_DAP_DELAY => Ok(Self::Delay),
            ID_DAP_RESET_TARGET => Ok(Self::ResetTarget),
            ID_DAP_SWJ_PINS => Ok(Self::SwjPins),
            ID_DAP_SWJ_CLOCK => Ok(Self::SwjClock),
            ID_DAP_SWJ_SEQUENCE => Ok(Self::SwjSequence),
            ID_DAP_SWD_CONFIGURE => Ok(Self::SwdConfigure),
            ID_DAP_JTAG_SEQUENCE => Ok(Self::JtagSequence),
            ID_DAP_JTAG_CONFIGURE => Ok(Self::JtagConfigure),
            ID_DAP_JTAG_IDCODE => Ok(Self::JtagIdcode),
            ID_DAP_SWO_TRANSPORT => Ok(Self::SwoTransport),
            ID_DAP_SWO_MODE => Ok(Self::SwoMode),
            ID_DAP_SWO_BAUDRATE => Ok(Self::SwoBaudrate),
            ID_DAP_SWO_CONTROL => Ok(Self::SwoControl),
            ID_DAP_SWO_STATUS => Ok(Self::SwoStatus),
            ID_DAP_SWO_DATA => Ok(Self::SwoData),
            ID_DAP_SWD_SEQUENCE => Ok(Self::SwdSequence),
            ID_DAP_SWO_EXTENDED_STATUS => Ok(Self::SwoExtendedStatus),
            ID_DAP_QUEUE_COMMANDS => Ok(Self::QueueCommands),
            ID_DAP_EXECUTE_COMMANDS => Ok(Self::ExecuteCommands),
            _ => Err(ProtocolError::Command(cmd)),
        }
    }

    /// Whether this command may appear inside DAP_ExecuteCommands
    pub fn batchable(&self) -> bool {
        !matches!(self, Self::ExecuteCommands | Self::QueueCommands)
    }
}

/// Debug port selected by DAP_Connect
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Port {
    #[default]
    Disabled,
    Swd,
    Jtag,
}

impl Port {
    /// Returns the DAP_Connect port ID for this port
    pub fn to_byte(self) -> u8 {
        match self {
            Port::Disabled => DAP_PORT_DISABLED,
            Port::Swd => DAP_PORT_SWD,
            Port::Jtag => DAP_PORT_JTAG,
        }
    }

    /// Decode a DAP_Connect port ID.  Autodetect (0) is not resolved here.
    pub fn from_byte(port: u8) -> Result<Self, ProtocolError> {
        match port {
            DAP_PORT_SWD => Ok(Port::Swd),
            DAP_PORT_JTAG => Ok(Port::Jtag),
            _ => Err(ProtocolError::Arg),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Disabled => write!(f, "Disabled"),
            Port::Swd => write!(f, "SWD"),
            Port::Jtag => write!(f, "JTAG"),
        }
    }
}

/// A single DAP_Transfer request byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest(u8);

impl TransferRequest {
    pub const fn new(request: u8) -> Self {
        TransferRequest(request)
    }

    pub fn byte(&self) -> u8 {
        self.0
    }

    /// The four bits that go on the wire: APnDP, RnW, A2 and A3
    pub fn bus_bits(&self) -> u8 {
        self.0 & 0x0F
    }

    /// The A[3:2] register address
    pub fn addr(&self) -> u8 {
        self.0 & (DAP_TRANSFER_A2 | DAP_TRANSFER_A3)
    }

    pub fn is_ap(&self) -> bool {
        self.0 & DAP_TRANSFER_APNDP != 0
    }

    pub fn is_read(&self) -> bool {
        self.0 & DAP_TRANSFER_RNW != 0
    }

    pub fn match_value(&self) -> bool {
        self.0 & DAP_TRANSFER_MATCH_VALUE != 0
    }

    pub fn match_mask(&self) -> bool {
        self.0 & DAP_TRANSFER_MATCH_MASK != 0
    }

    pub fn timestamp(&self) -> bool {
        self.0 & DAP_TRANSFER_TIMESTAMP != 0
    }

    /// Number of payload bytes following this request byte in a
    /// DAP_Transfer command
    pub fn payload_len(&self) -> usize {
        if !self.is_read() || self.match_value() {
            4
        } else {
            0
        }
    }
}

impl From<u8> for TransferRequest {
    fn from(value: u8) -> Self {
        TransferRequest(value)
    }
}

impl fmt::Display for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = if self.is_ap() { "AP" } else { "DP" };
        let dir = if self.is_read() { "Read" } else { "Write" };
        write!(f, "{port} {dir} 0x{:02X}", self.addr())?;
        if self.match_value() {
            write!(f, " (match value)")?;
        }
        if self.match_mask() {
            write!(f, " (match mask)")?;
        }
        if self.timestamp() {
            write!(f, " (timestamp)")?;
        }
        Ok(())
    }
}

/// Type used to represent errors in decoding received commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Invalid command byte received
    Command(u8),

    /// Invalid argument provided
    Arg,

    /// The request ended before the command's arguments did
    Truncated,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Command(cmd) => write!(f, "Invalid command 0x{cmd:02X}"),
            ProtocolError::Arg => write!(f, "Invalid argument"),
            ProtocolError::Truncated => write!(f, "Truncated request"),
        }
    }
}

/// Bounds-checked cursor over a received command packet.  All multi-byte
/// fields are little-endian.
#[derive(Debug, Clone)]
pub struct RequestReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RequestReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The unconsumed tail of the request
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Consume everything left in the request
    pub fn skip_rest(&mut self) {
        self.pos = self.buf.len();
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            debug!(
                "Request truncated: wanted {len} bytes, {} left",
                self.remaining()
            );
            return Err(ProtocolError::Truncated);
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        self.bytes(len).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, ProtocolError> {
        let bytes = self.bytes(1)?;
        Ok(bytes[0])
    }

    pub fn u16(&mut self) -> Result<u16, ProtocolError> {
        let bytes = self.bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, ProtocolError> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
