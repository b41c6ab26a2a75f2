// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD Transfer Engine
//!
//! This module sequences register transfers on behalf of DAP_Transfer,
//! DAP_TransferBlock and DAP_WriteABORT.  [`SwdEngine`] borrows the active
//! [`Transport`] and the [`Session`] for the duration of one command.
//!
//! AP reads on SWD are posted: the data returned by an AP read is the result
//! of the previous AP read, and the last result is collected from DP RDBUFF.
//! The engine tracks whether a read is outstanding, and resolves it before
//! any access that would otherwise lose it, and before the command ends.
//!
//! Each bus transaction is retried while the target answers WAIT, up to the
//! session's retry count, or until the transfer is aborted.

use alloc::vec::Vec;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use swdap_cmd::{
    DAP_ERROR, DAP_OK, DAP_TRANSFER_MISMATCH, DAP_TRANSFER_OK, DAP_TRANSFER_TIMESTAMP,
    DAP_TRANSFER_WAIT, ProtocolError, RequestReader, TransferRequest,
};
use swdap_core::Cortex;
use swdap_core::arm::dp::IdCode;
use swdap_core::arm::register::{
    ApRegister, DpRegister, ReadableRegister, RegisterDescriptor, WritableRegister,
};

use crate::SwdError;
use crate::protocol::{DP_ABORT_WRITE, DP_IDCODE_READ, DP_RDBUFF_READ, SwdOp, Transport};
use crate::session::Session;

/// One DAP_Transfer request and its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferItem {
    pub request: TransferRequest,

    /// Write data, or the value to match for a value-match read.  0 for
    /// plain reads.
    pub data: u32,
}

/// A decoded DAP_Transfer command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBatch {
    /// DAP index.  Ignored for SWD.
    pub index: u8,
    pub items: Vec<TransferItem>,
}

impl TransferBatch {
    /// Decode the command arguments following the command ID.
    ///
    /// The whole command is decoded before any bus activity, so a truncated
    /// command never gets partially executed.
    pub fn parse(reader: &mut RequestReader<'_>) -> Result<Self, ProtocolError> {
        let index = reader.u8()?;
        let count = reader.u8()?;

        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let request = TransferRequest::new(reader.u8()?);
            let data = if request.payload_len() == 4 {
                reader.u32()?
            } else {
                0
            };
            items.push(TransferItem { request, data });
        }

        Ok(Self { index, items })
    }
}

/// A decoded DAP_TransferBlock command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    /// DAP index.  Ignored for SWD.
    pub index: u8,
    pub count: u16,
    pub request: TransferRequest,

    /// Write data, `count` words for a write block, otherwise empty
    pub data: Vec<u32>,
}

impl BlockRequest {
    pub fn parse(reader: &mut RequestReader<'_>) -> Result<Self, ProtocolError> {
        let index = reader.u8()?;
        let count = reader.u16()?;
        let request = TransferRequest::new(reader.u8()?);

        let mut data = Vec::new();
        if !request.is_read() {
            data.reserve(count as usize);
            for _ in 0..count {
                data.push(reader.u32()?);
            }
        }

        Ok(Self {
            index,
            count,
            request,
            data,
        })
    }
}

// Name the target when the host reads its IDCODE
fn log_idcode(data: u32) {
    let idcode = IdCode::from(data);
    match Cortex::from_idcode(idcode) {
        Some(core) => debug!("Value: IDCODE {idcode:#}, {core}"),
        None => debug!(
            "Value: IDCODE {idcode:#}, designer 0x{:03X}{} part 0x{:02X} version {} revision {}",
            idcode.designer_id(),
            if idcode.is_arm() { " (ARM)" } else { "" },
            idcode.part_number(),
            idcode.version(),
            idcode.revision(),
        ),
    }
}

fn push_u32(response: &mut Vec<u8>, value: u32) {
    response.extend_from_slice(&value.to_le_bytes());
}

/// SWD transfer engine
///
/// Create one per command with [`SwdEngine::new()`]:
///
/// ```rust,ignore
/// let mut engine = SwdEngine::new(&mut port, &mut session);
/// let idcode = engine.read_register(SwdOp::DpRead(0x00))?;
/// ```
#[derive(Debug)]
pub struct SwdEngine<'a, T: Transport + ?Sized> {
    link: &'a mut T,
    session: &'a mut Session,
}

impl<'a, T: Transport + ?Sized> SwdEngine<'a, T> {
    pub fn new(link: &'a mut T, session: &'a mut Session) -> Self {
        Self { link, session }
    }

    /// Perform one transaction, retrying while the target answers WAIT.
    ///
    /// `request` is a full CMSIS-DAP request byte.  Only APnDP, RnW, A2 and
    /// A3 go on the wire; if the timestamp flag is set, the session
    /// timestamp is captured after a successful data phase.
    ///
    /// Makes at most `1 + retry_count` attempts.  Returns the last ACK.
    pub fn transfer_retry(&mut self, request: u8, data: &mut u32) -> u8 {
        let wire = self.session.wire();
        let mut retries = self.session.transfer.retry_count;

        trace!("Exec:  {}", TransferRequest::new(request));
        let ack = loop {
            let ack = self.link.transfer(request, data, &wire);
            if ack != DAP_TRANSFER_WAIT || retries == 0 || self.session.is_aborted() {
                break ack;
            }
            retries -= 1;
            trace!("Retry: {} {retries} left", TransferRequest::new(request));
        };

        if ack == DAP_TRANSFER_OK {
            if request & DAP_TRANSFER_TIMESTAMP != 0 {
                self.session.timestamp = self.link.timestamp();
            }
            trace!("OK:    {} 0x{:08X}", TransferRequest::new(request), *data);
        } else {
            trace!("Error: {} ACK {ack}", TransferRequest::new(request));
        }
        ack
    }

    fn push_timestamp(&self, response: &mut Vec<u8>) {
        push_u32(response, self.session.timestamp);
    }

    /// Execute a DAP_Transfer batch, appending `[count, ack, data...]` to
    /// `response`.
    ///
    /// Bus activity stops at the first failed transfer or on abort; `count`
    /// is the number of transfers completed.  If the port is not connected
    /// for SWD nothing is executed and the header is `[0, 0]`.
    pub fn transfer(&mut self, batch: &TransferBatch, response: &mut Vec<u8>) {
        let header = response.len();
        response.extend_from_slice(&[0, 0]);

        if !self.session.is_swd() {
            debug!("Error: DAP_Transfer with port {}", self.session.debug_port);
            return;
        }
        self.session.clear_abort();

        let mut count: u8 = 0;
        let mut ack: u8 = 0;
        let mut post_read = false;
        let mut check_write = false;

        for item in batch.items.iter() {
            let request = item.request;
            let byte = request.byte();
            let mut data = 0u32;

            if request.is_read() {
                if post_read {
                    if request.is_ap() && !request.match_value() {
                        // Collect the previous AP read and post this one
                        ack = self.transfer_retry(byte, &mut data);
                    } else {
                        ack = self.transfer_retry(DP_RDBUFF_READ, &mut data);
                        post_read = false;
                    }
                    if ack != DAP_TRANSFER_OK {
                        break;
                    }
                    push_u32(response, data);
                    if post_read && request.timestamp() {
                        self.push_timestamp(response);
                    }
                }

                if request.match_value() {
                    let mask = self.session.transfer.match_mask;
                    let mut match_retry = self.session.transfer.match_retry;

                    if request.is_ap() {
                        ack = self.transfer_retry(byte, &mut data);
                        if ack != DAP_TRANSFER_OK {
                            break;
                        }
                    }

                    let matched = loop {
                        ack = self.transfer_retry(byte, &mut data);
                        if ack != DAP_TRANSFER_OK {
                            break false;
                        }
                        if data & mask == item.data {
                            break true;
                        }
                        if match_retry == 0 || self.session.is_aborted() {
                            break false;
                        }
                        match_retry -= 1;
                    };

                    if ack == DAP_TRANSFER_OK && !matched {
                        debug!("Value: 0x{data:08X} & 0x{mask:08X} != 0x{:08X}", item.data);
                        ack |= DAP_TRANSFER_MISMATCH;
                    }
                    if ack != DAP_TRANSFER_OK {
                        break;
                    }
                } else if request.is_ap() {
                    if !post_read {
                        ack = self.transfer_retry(byte, &mut data);
                        if ack != DAP_TRANSFER_OK {
                            break;
                        }
                        if request.timestamp() {
                            self.push_timestamp(response);
                        }
                        post_read = true;
                    }
                } else {
                    ack = self.transfer_retry(byte, &mut data);
                    if ack != DAP_TRANSFER_OK {
                        break;
                    }
                    if request.timestamp() {
                        self.push_timestamp(response);
                    }
                    push_u32(response, data);
                    if request.bus_bits() == DP_IDCODE_READ {
                        log_idcode(data);
                    }
                }
                check_write = false;
            } else {
                if post_read {
                    ack = self.transfer_retry(DP_RDBUFF_READ, &mut data);
                    if ack != DAP_TRANSFER_OK {
                        break;
                    }
                    push_u32(response, data);
                    post_read = false;
                }

                if request.match_mask() {
                    self.session.transfer.match_mask = item.data;
                    trace!("Value: Match mask 0x{:08X}", item.data);
                    ack = DAP_TRANSFER_OK;
                } else {
                    let mut data = item.data;
                    ack = self.transfer_retry(byte, &mut data);
                    if ack != DAP_TRANSFER_OK {
                        break;
                    }
                    if request.timestamp() {
                        self.push_timestamp(response);
                    }
                    check_write = true;
                }
            }

            count += 1;
            if self.session.is_aborted() {
                debug!("Exec:  DAP_Transfer aborted after {count}");
                break;
            }
        }

        if ack == DAP_TRANSFER_OK {
            let mut data = 0;
            if post_read {
                ack = self.transfer_retry(DP_RDBUFF_READ, &mut data);
                if ack == DAP_TRANSFER_OK {
                    push_u32(response, data);
                }
            } else if check_write {
                ack = self.transfer_retry(DP_RDBUFF_READ, &mut data);
            }
        }

        response[header] = count;
        response[header + 1] = ack;
        debug!("OK:    DAP_Transfer {count}/{} ack {ack}", batch.items.len());
    }

    /// Execute a DAP_TransferBlock, appending `[count lo, count hi, ack,
    /// data...]` to `response`.
    pub fn transfer_block(&mut self, block: &BlockRequest, response: &mut Vec<u8>) {
        let header = response.len();
        response.extend_from_slice(&[0, 0, 0]);

        if !self.session.is_swd() {
            debug!("Error: DAP_TransferBlock with port {}", self.session.debug_port);
            return;
        }
        self.session.clear_abort();

        let mut count: u16 = 0;
        let ack = if block.count == 0 {
            0
        } else if block.request.is_read() {
            self.read_block(block, &mut count, response)
        } else {
            self.write_block(block, &mut count)
        };

        response[header..header + 2].copy_from_slice(&count.to_le_bytes());
        response[header + 2] = ack;
        debug!("OK:    DAP_TransferBlock {count}/{} ack {ack}", block.count);
    }

    fn read_block(&mut self, block: &BlockRequest, count: &mut u16, response: &mut Vec<u8>) -> u8 {
        let mut request = block.request.bus_bits();
        let is_ap = block.request.is_ap();
        let mut data = 0;

        if is_ap {
            let ack = self.transfer_retry(request, &mut data);
            if ack != DAP_TRANSFER_OK {
                return ack;
            }
        }

        let mut ack = DAP_TRANSFER_OK;
        let mut posted = is_ap;
        for remaining in (0..block.count).rev() {
            if remaining == 0 && is_ap {
                request = DP_RDBUFF_READ;
                posted = false;
            }
            ack = self.transfer_retry(request, &mut data);
            if ack != DAP_TRANSFER_OK {
                break;
            }
            push_u32(response, data);
            *count += 1;
            if self.session.is_aborted() {
                debug!("Exec:  DAP_TransferBlock aborted after {count}");
                break;
            }
        }

        // An abort leaves the last AP read posted
        if ack == DAP_TRANSFER_OK && posted {
            ack = self.transfer_retry(DP_RDBUFF_READ, &mut data);
            if ack == DAP_TRANSFER_OK {
                push_u32(response, data);
                *count += 1;
            }
        }
        ack
    }

    fn write_block(&mut self, block: &BlockRequest, count: &mut u16) -> u8 {
        let request = block.request.bus_bits();

        for word in block.data.iter() {
            let mut data = *word;
            let ack = self.transfer_retry(request, &mut data);
            if ack != DAP_TRANSFER_OK {
                return ack;
            }
            *count += 1;
            if self.session.is_aborted() {
                debug!("Exec:  DAP_TransferBlock aborted after {count}");
                break;
            }
        }

        // Catch a fault on the last write
        let mut data = 0;
        self.transfer_retry(DP_RDBUFF_READ, &mut data)
    }

    /// Write the DP ABORT register, once, with no WAIT retries.
    ///
    /// Returns `DAP_OK` if the target accepted the write, otherwise
    /// `DAP_ERROR`, including when the port is not connected for SWD.
    pub fn write_abort(&mut self, data: u32) -> u8 {
        if !self.session.is_swd() {
            debug!("Error: DAP_WriteABORT with port {}", self.session.debug_port);
            return DAP_ERROR;
        }

        let wire = self.session.wire();
        let mut value = data;
        let ack = self.link.transfer(DP_ABORT_WRITE, &mut value, &wire);
        if ack == DAP_TRANSFER_OK {
            debug!("OK:    DP ABORT 0x{data:08X}");
            DAP_OK
        } else {
            debug!("Error: DP ABORT 0x{data:08X} ACK {ack}");
            DAP_ERROR
        }
    }

    /// Read a register.  AP reads are posted and then collected from RDBUFF,
    /// so the value returned is the register's.
    pub fn read_register(&mut self, op: SwdOp) -> Result<u32, SwdError> {
        if !op.is_read() {
            return Err(SwdError::Api);
        }
        if !self.session.is_swd() {
            return Err(SwdError::NotConnected);
        }

        let mut data = 0;
        SwdError::from_ack(self.transfer_retry(op.request(), &mut data))?;
        if op.is_ap() {
            SwdError::from_ack(self.transfer_retry(DP_RDBUFF_READ, &mut data))?;
        }
        trace!("Value: {op} 0x{data:08X}");
        Ok(data)
    }

    /// Write a register
    pub fn write_register(&mut self, op: SwdOp, data: u32) -> Result<(), SwdError> {
        if op.is_read() {
            return Err(SwdError::Api);
        }
        if !self.session.is_swd() {
            return Err(SwdError::NotConnected);
        }

        let mut value = data;
        SwdError::from_ack(self.transfer_retry(op.request(), &mut value))
    }

    /// Read a Debug Port register
    ///
    /// ```rust,ignore
    /// use swdap_core::arm::dp::IdCodeRegister;
    /// let idcode = engine.read_dp_register(IdCodeRegister)?;
    /// ```
    pub fn read_dp_register<R>(&mut self, _reg: R) -> Result<R::Value, SwdError>
    where
        R: ReadableRegister + DpRegister,
        R::Value: From<u32>,
    {
        let raw = self.read_register(SwdOp::DpRead(R::ADDRESS))?;
        Ok(R::from_raw(raw))
    }

    /// Write an Access Port register in the currently selected bank
    pub fn write_ap_register<R>(&mut self, _reg: R, value: R::Value) -> Result<(), SwdError>
    where
        R: WritableRegister + ApRegister,
        u32: From<R::Value>,
    {
        self.write_register(SwdOp::ApWrite(R::ADDRESS), R::to_raw(value))
    }

    pub fn session(&self) -> &Session {
        self.session
    }
}
