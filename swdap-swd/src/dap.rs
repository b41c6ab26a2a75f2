// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! CMSIS-DAP command dispatcher
//!
//! [`Dap`] owns the SWD port, the session and the probe configuration.  The
//! host transport hands it one request packet at a time through
//! [`Dap::process_command()`], and sends back whatever it appends to the
//! response buffer.
//!
//! Each command handler reports how many request bytes it consumed and how
//! many response bytes it produced, both including the command ID.  This is
//! what keeps the sub-commands of a DAP_ExecuteCommands batch aligned.

use alloc::vec::Vec;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use swdap_cmd::{
    CAP_SWD, CAP_TIMESTAMP, Command, DAP_DEBUGGER_CONNECTED, DAP_ERROR, DAP_ID_BOARD_NAME,
    DAP_ID_BOARD_VENDOR, DAP_ID_CAPABILITIES, DAP_ID_DAP_FW_VER, DAP_ID_DEVICE_NAME,
    DAP_ID_DEVICE_VENDOR, DAP_ID_PACKET_COUNT, DAP_ID_PACKET_SIZE, DAP_ID_PRODUCT,
    DAP_ID_PRODUCT_FW_VER, DAP_ID_SER_NUM, DAP_ID_SWO_BUFFER_SIZE, DAP_ID_TIMESTAMP_CLOCK,
    DAP_ID_VENDOR, DAP_OK, DAP_PORT_AUTODETECT, DAP_PORT_DISABLED, DAP_SWJ_NRESET,
    DAP_SWJ_SWCLK_TCK, DAP_SWJ_SWDIO_TMS, DAP_TARGET_RUNNING, ID_DAP_EXECUTE_COMMANDS,
    ID_DAP_INVALID, ID_DAP_VENDOR0, Port, ProtocolError, RequestReader, SWD_SEQUENCE_CLK,
    SWD_SEQUENCE_DIN, is_vendor,
};
use swdap_core::arm::map::{DrwRegister, TarRegister};
use swdap_core::arm::scs::Aircr;

use crate::SwdError;
use crate::clock::ClockSelector;
use crate::config::ProbeConfig;
use crate::hal::{ShiftRegister, SwdPins};
use crate::interface::{BlockRequest, SwdEngine, TransferBatch};
use crate::port::SwdPort;
use crate::protocol::Transport;
use crate::session::{AbortHandle, ClockState, Session, SwdConfig};

/// nRESET is held low, then given time to rise, for this long each
const RESET_PULSE_US: u32 = 2000;

/// Longest DAP_SWJ_Pins wait honoured
const MAX_PIN_WAIT_US: u32 = 3_000_000;

/// Bytes consumed from the request and produced in the response by one
/// command, both including the command ID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Processed {
    pub request: usize,
    pub response: usize,
}

impl Processed {
    const fn new(request: usize, response: usize) -> Self {
        Self { request, response }
    }

    /// The CMSIS-DAP firmware form: request count in the upper 16 bits,
    /// response count in the lower.
    ///
    /// Both counts are bounded by the packet size, at most
    /// [`swdap_cmd::MAX_PACKET_SIZE`], so each fits in 16 bits.  A count
    /// that does not is saturated.
    pub fn packed(&self) -> u32 {
        let request = u16::try_from(self.request).unwrap_or(u16::MAX);
        let response = u16::try_from(self.response).unwrap_or(u16::MAX);
        (u32::from(request) << 16) | u32::from(response)
    }
}

/// Handler for the vendor command range, 0x80-0x9F
///
/// The dispatcher echoes the command ID before calling
/// [`VendorCommands::execute()`].  The default implementation of every slot
/// does nothing more, so an unimplemented vendor command answers with just
/// its ID.
pub trait VendorCommands {
    /// Handle the vendor command in `slot` (0-31).  `request` is the packet
    /// following the command ID.  Anything appended to `response` follows
    /// the echoed ID.
    ///
    /// Returns the number of bytes of `request` consumed.
    fn execute(&mut self, slot: usize, request: &[u8], response: &mut Vec<u8>) -> usize {
        let _ = (slot, request, response);
        0
    }
}

/// No vendor commands
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVendor;

impl VendorCommands for NoVendor {}

/// A CMSIS-DAP probe
///
/// ```rust,ignore
/// let mut dap = Dap::new(ProbeConfig::default(), pins, spi)?;
/// let mut response = Vec::new();
/// let processed = dap.process_command(&packet, &mut response);
/// ```
#[derive(Debug)]
pub struct Dap<P: SwdPins, S: ShiftRegister, V: VendorCommands = NoVendor> {
    port: SwdPort<P, S>,
    session: Session,
    config: ProbeConfig,
    clock: ClockSelector,
    vendor: V,
}

impl<P: SwdPins, S: ShiftRegister> Dap<P, S, NoVendor> {
    /// Create a probe with no vendor commands.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: ProbeConfig, pins: P, shift: S) -> Result<Self, SwdError> {
        Self::with_vendor(config, pins, shift, NoVendor)
    }
}

impl<P: SwdPins, S: ShiftRegister, V: VendorCommands> Dap<P, S, V> {
    /// Create a probe with a vendor command handler.  The default SWD clock
    /// from `config` is applied straight away.
    pub fn with_vendor(
        config: ProbeConfig,
        pins: P,
        shift: S,
        vendor: V,
    ) -> Result<Self, SwdError> {
        config.validate()?;

        let clock = ClockSelector::new(&config);
        let backend = clock.select(config.default_clock, Port::Swd)?;
        let mut port = SwdPort::new(pins, shift);
        port.set_backend(backend);

        let session = Session::new(ClockState {
            frequency: config.default_clock,
            backend,
        });
        debug!("OK:    Probe ready, {}Hz on {backend}", config.default_clock);

        Ok(Self {
            port,
            session,
            config,
            clock,
            vendor,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// A handle that aborts the transfer in progress, usable from another
    /// thread.
    pub fn abort_handle(&self) -> AbortHandle {
        self.session.abort_handle()
    }

    pub fn port(&mut self) -> &mut SwdPort<P, S> {
        &mut self.port
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn vendor(&mut self) -> &mut V {
        &mut self.vendor
    }

    /// Process one request packet, appending the response packet to
    /// `response`.
    ///
    /// Never fails: malformed and unsupported commands are answered with
    /// 0xFF, and bus failures are reported in the command's own response.
    pub fn process_command(&mut self, request: &[u8], response: &mut Vec<u8>) -> Processed {
        let processed = if request.first() == Some(&ID_DAP_EXECUTE_COMMANDS) {
            self.execute_commands(request, response)
        } else {
            self.execute_command(request, response)
        };

        if processed.response > self.config.packet_size as usize {
            warn!(
                "Error: Response {} bytes exceeds packet size {}",
                processed.response, self.config.packet_size
            );
        }
        processed
    }

    // DAP_ExecuteCommands: [0x7F, count, sub-commands...]
    fn execute_commands(&mut self, request: &[u8], response: &mut Vec<u8>) -> Processed {
        let Some(&count) = request.get(1) else {
            warn!("Error: DAP_ExecuteCommands truncated");
            response.push(ID_DAP_INVALID);
            return Processed::new(request.len(), 1);
        };

        debug!("Exec:  DAP_ExecuteCommands {count}");
        response.extend_from_slice(&[ID_DAP_EXECUTE_COMMANDS, count]);
        let mut processed = Processed::new(2, 2);

        // A truncated sub-command consumes the rest of the request, which
        // ends the batch
        for index in 0..count {
            let Some(sub) = request
                .get(processed.request..)
                .filter(|sub| !sub.is_empty())
            else {
                warn!("Error: DAP_ExecuteCommands ended after {index} of {count}");
                break;
            };
            let done = self.execute_command(sub, response);
            processed.request += done.request;
            processed.response += done.response;
        }
        processed
    }

    fn execute_command(&mut self, request: &[u8], response: &mut Vec<u8>) -> Processed {
        let start = response.len();
        let mut reader = RequestReader::new(request);

        let Ok(id) = reader.u8() else {
            warn!("Error: Empty command");
            response.push(ID_DAP_INVALID);
            return Processed::new(0, 1);
        };

        if is_vendor(id) {
            response.push(id);
            let slot = (id - ID_DAP_VENDOR0) as usize;
            let consumed = self.vendor.execute(slot, reader.rest(), response);
            let consumed = consumed.min(reader.remaining());
            trace!("Exec:  Vendor command {slot} consumed {consumed}");
            return Processed::new(1 + consumed, response.len() - start);
        }

        let command = match Command::from_byte(id) {
            Ok(command) if command.batchable() => command,
            _ => {
                warn!("Error: Unsupported command 0x{id:02X}");
                response.push(ID_DAP_INVALID);
                return Processed::new(1, 1);
            }
        };

        response.push(id);
        match self.handle(command, &mut reader, response) {
            Ok(()) => Processed::new(reader.consumed(), response.len() - start),
            Err(e) => {
                warn!("Error: {command}: {e}");
                response.truncate(start);
                response.push(ID_DAP_INVALID);
                reader.skip_rest();
                Processed::new(reader.consumed(), 1)
            }
        }
    }

    fn handle(
        &mut self,
        command: Command,
        reader: &mut RequestReader<'_>,
        response: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        trace!("Exec:  {command}");
        match command {
            Command::Info => self.info(reader, response),
            Command::HostStatus => self.host_status(reader, response),
            Command::Connect => self.connect(reader, response),
            Command::Disconnect => {
                self.session.debug_port = Port::Disabled;
                self.port.off();
                info!("OK:    Disconnected");
                response.push(DAP_OK);
                Ok(())
            }
            Command::TransferConfigure => {
                let idle_cycles = reader.u8()?;
                let retry_count = reader.u16()?;
                let match_retry = reader.u16()?;
                let transfer = &mut self.session.transfer;
                transfer.idle_cycles = idle_cycles;
                transfer.retry_count = retry_count;
                transfer.match_retry = match_retry;
                debug!("Value: Idle {idle_cycles} retry {retry_count} match retry {match_retry}");
                response.push(DAP_OK);
                Ok(())
            }
            Command::Transfer => {
                let batch = TransferBatch::parse(reader)?;
                SwdEngine::new(&mut self.port, &mut self.session).transfer(&batch, response);
                Ok(())
            }
            Command::TransferBlock => {
                let block = BlockRequest::parse(reader)?;
                SwdEngine::new(&mut self.port, &mut self.session).transfer_block(&block, response);
                Ok(())
            }
            Command::TransferAbort => {
                debug!("Exec:  Abort transfer");
                self.session.set_abort();
                Ok(())
            }
            Command::WriteAbort => {
                let _index = reader.u8()?;
                let data = reader.u32()?;
                let status = SwdEngine::new(&mut self.port, &mut self.session).write_abort(data);
                response.push(status);
                Ok(())
            }
            Command::Delay => {
                let us = reader.u16()?;
                self.port.pins().delay_us(us as u32);
                response.push(DAP_OK);
                Ok(())
            }
            Command::ResetTarget => {
                self.reset_target();
                response.extend_from_slice(&[DAP_OK, 1]);
                Ok(())
            }
            Command::SwjPins => self.swj_pins(reader, response),
            Command::SwjClock => {
                let frequency = reader.u32()?;
                let status = match self.clock.select(frequency, self.session.debug_port) {
                    Ok(backend) => {
                        self.port.set_backend(backend);
                        self.session.clock = ClockState { frequency, backend };
                        DAP_OK
                    }
                    Err(e) => {
                        warn!("Error: SWJ clock {frequency}Hz: {e}");
                        DAP_ERROR
                    }
                };
                response.push(status);
                Ok(())
            }
            Command::SwjSequence => self.swj_sequence(reader, response),
            Command::SwdConfigure => {
                self.session.swd = SwdConfig::from_byte(reader.u8()?);
                debug!(
                    "Value: Turnaround {} data phase {}",
                    self.session.swd.turnaround, self.session.swd.data_phase
                );
                response.push(DAP_OK);
                Ok(())
            }
            Command::SwdSequence => self.swd_sequence(reader, response),
            Command::JtagSequence => {
                let count = reader.u8()?;
                for _ in 0..count {
                    let info = reader.u8()?;
                    reader.skip(sequence_bits(info).div_ceil(8) as usize)?;
                }
                self.unsupported(command, response)
            }
            Command::JtagConfigure => {
                let count = reader.u8()?;
                reader.skip(count as usize)?;
                self.unsupported(command, response)
            }
            Command::JtagIdcode
            | Command::SwoTransport
            | Command::SwoMode
            | Command::SwoControl
            | Command::SwoExtendedStatus => {
                reader.skip(1)?;
                self.unsupported(command, response)
            }
            Command::SwoData => {
                reader.skip(2)?;
                self.unsupported(command, response)
            }
            Command::SwoBaudrate => {
                reader.skip(4)?;
                self.unsupported(command, response)
            }
            Command::SwoStatus => self.unsupported(command, response),
            Command::QueueCommands | Command::ExecuteCommands => {
                Err(ProtocolError::Command(command.to_byte()))
            }
        }
    }

    fn unsupported(&self, command: Command, response: &mut Vec<u8>) -> Result<(), ProtocolError> {
        debug!("Error: {command} not supported");
        response.push(DAP_ERROR);
        Ok(())
    }

    // Response is [len, data...] after the echoed ID
    fn info(
        &mut self,
        reader: &mut RequestReader<'_>,
        response: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let id = reader.u8()?;
        let len_at = response.len();
        response.push(0);

        let config = &self.config;
        let string = match id {
            DAP_ID_VENDOR => Some(&config.vendor),
            DAP_ID_PRODUCT => Some(&config.product),
            DAP_ID_SER_NUM => Some(&config.serial),
            DAP_ID_DAP_FW_VER => Some(&config.fw_version),
            DAP_ID_DEVICE_VENDOR => Some(&config.device_vendor),
            DAP_ID_DEVICE_NAME => Some(&config.device_name),
            DAP_ID_BOARD_VENDOR => Some(&config.board_vendor),
            DAP_ID_BOARD_NAME => Some(&config.board_name),
            DAP_ID_PRODUCT_FW_VER => Some(&config.product_fw_version),
            _ => None,
        };

        match (string, id) {
            (Some(string), _) => {
                if !string.is_empty() {
                    response.extend_from_slice(string.as_bytes());
                    response.push(0);
                }
            }
            (None, DAP_ID_CAPABILITIES) => {
                let mut caps = CAP_SWD;
                if config.timestamp_clock != 0 {
                    caps |= CAP_TIMESTAMP;
                }
                response.extend_from_slice(&[caps, 0]);
            }
            (None, DAP_ID_TIMESTAMP_CLOCK) => {
                response.extend_from_slice(&config.timestamp_clock.to_le_bytes());
            }
            (None, DAP_ID_PACKET_COUNT) => response.push(config.packet_count),
            (None, DAP_ID_PACKET_SIZE) => {
                response.extend_from_slice(&config.packet_size.to_le_bytes());
            }
            // No SWO, so no SWO buffer
            (None, DAP_ID_SWO_BUFFER_SIZE) => {}
            _ => debug!("Value: DAP_Info 0x{id:02X} unknown"),
        }

        let len = response.len() - len_at - 1;
        response[len_at] = len as u8;
        Ok(())
    }

    fn host_status(
        &mut self,
        reader: &mut RequestReader<'_>,
        response: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let kind = reader.u8()?;
        let on = reader.u8()? != 0;

        let status = match kind {
            DAP_DEBUGGER_CONNECTED => {
                self.port.pins().led_connected(on);
                DAP_OK
            }
            DAP_TARGET_RUNNING => {
                self.port.pins().led_running(on);
                DAP_OK
            }
            _ => DAP_ERROR,
        };
        response.push(status);
        Ok(())
    }

    fn connect(
        &mut self,
        reader: &mut RequestReader<'_>,
        response: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let requested = reader.u8()?;
        let port = if requested == DAP_PORT_AUTODETECT {
            Ok(self.config.default_port)
        } else {
            Port::from_byte(requested)
        };

        match port {
            Ok(Port::Swd) => {
                self.session.debug_port = Port::Swd;
                self.port.setup();
                info!("OK:    Connected SWD, {}", self.port.backend());
                response.push(Port::Swd.to_byte());
            }
            _ => {
                warn!("Error: Cannot connect port {requested}");
                response.push(DAP_PORT_DISABLED);
            }
        }
        Ok(())
    }

    fn reset_target(&mut self) {
        if self.config.reset_via_aircr && self.session.is_swd() {
            if let Err(e) = self.request_system_reset() {
                warn!("Error: AIRCR reset request: {e}");
            }
        }

        let pins = self.port.pins();
        pins.nreset_set(false);
        pins.delay_us(RESET_PULSE_US);
        pins.nreset_set(true);
        pins.delay_us(RESET_PULSE_US);
        debug!("OK:    Target reset");
    }

    // SYSRESETREQ via the MEM-AP.  Assumes bank 0 is selected and CSW is set
    // for word accesses, as the host leaves it.
    fn request_system_reset(&mut self) -> Result<(), SwdError> {
        let mut engine = SwdEngine::new(&mut self.port, &mut self.session);
        engine.write_ap_register(TarRegister, Aircr::ADDRESS)?;
        engine.write_ap_register(DrwRegister, Aircr::system_reset().value())
    }

    fn swj_pins(
        &mut self,
        reader: &mut RequestReader<'_>,
        response: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let value = reader.u8()?;
        let select = reader.u8()?;
        let wait = reader.u32()?.min(MAX_PIN_WAIT_US);
        let timeout = (wait as u64 * self.config.timestamp_clock as u64 / 1_000_000)
            .min(u32::MAX as u64) as u32;

        let state = self.port.with_spi_released(|pins| {
            if select & DAP_SWJ_SWCLK_TCK != 0 {
                pins.swclk_set(value & DAP_SWJ_SWCLK_TCK != 0);
            }
            if select & DAP_SWJ_SWDIO_TMS != 0 {
                pins.swdio_set(value & DAP_SWJ_SWDIO_TMS != 0);
            }
            if select & DAP_SWJ_NRESET != 0 {
                pins.nreset_set(value & DAP_SWJ_NRESET != 0);
            }

            if wait != 0 {
                let start = pins.timestamp();
                while (pin_state(pins) ^ value) & select != 0 {
                    if pins.timestamp().wrapping_sub(start) >= timeout {
                        debug!("Error: SWJ pins timeout after {wait}us");
                        break;
                    }
                }
            }
            pin_state(pins)
        });

        trace!("Value: SWJ pins 0x{state:02X}");
        response.push(state);
        Ok(())
    }

    fn swj_sequence(
        &mut self,
        reader: &mut RequestReader<'_>,
        response: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let count = match reader.u8()? {
            0 => 256,
            count => count as u32,
        };
        let data = reader.bytes(count.div_ceil(8) as usize)?;

        trace!("Exec:  SWJ sequence {count} bits");
        let mut remaining = count;
        for chunk in data.chunks(8) {
            let bits = remaining.min(64);
            self.port.write_bits(bits, bits_from_le(chunk));
            remaining -= bits;
        }
        response.push(DAP_OK);
        Ok(())
    }

    fn swd_sequence(
        &mut self,
        reader: &mut RequestReader<'_>,
        response: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let count = reader.u8()?;

        // Decode everything first, so a truncated command does nothing
        let mut sequences = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let info = reader.u8()?;
            let bits = sequence_bits(info);
            let output = if info & SWD_SEQUENCE_DIN == 0 {
                Some(reader.bytes(bits.div_ceil(8) as usize)?)
            } else {
                None
            };
            sequences.push((bits, output));
        }

        response.push(DAP_OK);
        for (bits, output) in sequences {
            match output {
                Some(data) => self.port.write_bits(bits, bits_from_le(data)),
                None => {
                    let input = self.port.read_bits(bits);
                    let len = bits.div_ceil(8) as usize;
                    response.extend_from_slice(&input.to_le_bytes()[..len]);
                }
            }
        }
        self.port.drive_swdio();
        Ok(())
    }
}

// Cycle count from a sequence info byte, 0 meaning 64
fn sequence_bits(info: u8) -> u32 {
    match info & SWD_SEQUENCE_CLK {
        0 => 64,
        bits => bits as u32,
    }
}

// Up to 8 bytes, little endian, zero extended
fn bits_from_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .enumerate()
        .fold(0, |acc, (ii, byte)| acc | ((*byte as u64) << (ii * 8)))
}

fn pin_state<P: SwdPins>(pins: &mut P) -> u8 {
    let mut state = 0;
    if pins.swclk_get() {
        state |= DAP_SWJ_SWCLK_TCK;
    }
    if pins.swdio_get() {
        state |= DAP_SWJ_SWDIO_TMS;
    }
    if pins.nreset_get() {
        state |= DAP_SWJ_NRESET;
    }
    state
}
