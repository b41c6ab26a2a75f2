// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Simulated SWD target for tests
//!
//! [`TargetModel`] holds the register state of a Cortex-M4 SW-DP with one
//! MEM-AP.  It is reached through one of three front ends:
//!
//! - [`SimTarget`] answers whole transactions, for the transfer engine.
//! - [`PinTarget`] implements [`SwdPins`] over `embedded-hal` pin handles
//!   and decodes the wire protocol edge by edge, for the GPIO backend.
//! - [`ShiftTarget`] implements [`ShiftRegister`] on top of the same wire
//!   decoder, for the SPI backend.

use core::convert::Infallible;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};

use swdap_cmd::{
    DAP_TRANSFER_APNDP, DAP_TRANSFER_FAULT, DAP_TRANSFER_OK, DAP_TRANSFER_RNW, DAP_TRANSFER_WAIT,
};
use swdap_core::Cortex;
use swdap_core::arm::dp::{Abort, CtrlStat};
use swdap_core::arm::map::Csw;

use crate::hal::{DelayCycles, ShiftRegister, SwdPins, SwdioPin};
use crate::parity::{parity8, parity32};
use crate::protocol::{Transport, WireConfig};
use crate::session::AbortHandle;

/// Consecutive host driven ones that make up a line reset
const LINE_RESET_ONES: u32 = 50;

/// Timestamp ticks per call to `timestamp()`
const TICKS_PER_POLL: u32 = 100;

/// Timestamp ticks per microsecond, matching the default timestamp clock
const TICKS_PER_US: u32 = 5;

/// Register level target state
#[derive(Debug)]
pub struct TargetModel {
    idcode: u32,
    ctrl_stat: CtrlStat,
    select: u32,
    rdbuff: u32,
    waits: u32,
    always_wait: bool,
    fail_ap_write: bool,
    attempts: u32,
    ap_reads: VecDeque<u32>,
    ap_writes: Vec<(u8, u32)>,
    aborts: Vec<u32>,
    csw: Csw,
    tar: u32,
    memory: BTreeMap<u32, u32>,
}

impl TargetModel {
    pub fn new() -> Self {
        Self {
            idcode: Cortex::IDCODE_M4.data(),
            ctrl_stat: CtrlStat::default(),
            select: 0,
            rdbuff: 0,
            waits: 0,
            always_wait: false,
            fail_ap_write: false,
            attempts: 0,
            ap_reads: VecDeque::new(),
            ap_writes: Vec::new(),
            aborts: Vec::new(),
            csw: Csw::default(),
            tar: 0,
            memory: BTreeMap::new(),
        }
    }

    /// Answer WAIT to the next `count` requests
    pub fn inject_waits(&mut self, count: u32) {
        self.waits = count;
    }

    /// Answer WAIT to every request except ABORT writes
    pub fn always_wait(&mut self, enable: bool) {
        self.always_wait = enable;
    }

    /// Set STICKYERR, so accesses FAULT until it is cleared
    pub fn inject_fault(&mut self) {
        self.ctrl_stat.set_stickyerr(true);
    }

    /// Acknowledge the next AP write OK, then fail it on the bus.  The
    /// error shows up as STICKYERR, and a FAULT on the following access.
    pub fn fail_next_ap_write(&mut self) {
        self.fail_ap_write = true;
    }

    /// Values returned, in order, by AP reads of any register
    pub fn queue_ap_reads(&mut self, values: &[u32]) {
        self.ap_reads.extend(values.iter().copied());
    }

    pub fn set_memory(&mut self, addr: u32, value: u32) {
        self.memory.insert(addr, value);
    }

    pub fn memory(&self, addr: u32) -> Option<u32> {
        self.memory.get(&addr).copied()
    }

    /// Requests seen, including those answered WAIT or FAULT
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn select(&self) -> u32 {
        self.select
    }

    pub fn ctrl_stat(&self) -> CtrlStat {
        self.ctrl_stat
    }

    pub fn aborts(&self) -> &[u32] {
        &self.aborts
    }

    pub fn ap_writes(&self) -> &[(u8, u32)] {
        &self.ap_writes
    }

    /// The ACK for a request.  Must be followed by [`Self::read()`] or
    /// [`Self::write()`] if OK.
    pub fn begin(&mut self, request: u8) -> u8 {
        self.attempts += 1;
        let is_abort = request & 0x0F == 0;
        // IDCODE and CTRL/STAT reads, and ABORT writes
        let is_status = matches!(request & 0x0F, 0x00 | 0x02 | 0x06);

        if !is_abort && (self.always_wait || self.waits > 0) {
            self.waits = self.waits.saturating_sub(1);
            return DAP_TRANSFER_WAIT;
        }
        if !is_status && self.ctrl_stat.stickyerr() {
            return DAP_TRANSFER_FAULT;
        }
        DAP_TRANSFER_OK
    }

    pub fn read(&mut self, request: u8) -> u32 {
        let addr = request & 0x0C;
        if request & DAP_TRANSFER_APNDP != 0 {
            let previous = self.rdbuff;
            self.rdbuff = self.ap_read(addr);
            previous
        } else {
            match addr {
                0x00 => self.idcode,
                0x04 => self.ctrl_stat.value(),
                _ => self.rdbuff,
            }
        }
    }

    pub fn write(&mut self, request: u8, data: u32) {
        let addr = request & 0x0C;
        if request & DAP_TRANSFER_APNDP != 0 {
            self.ap_write(addr, data);
        } else {
            match addr {
                0x00 => {
                    self.aborts.push(data);
                    self.ctrl_stat.apply_abort(Abort::from(data));
                }
                0x04 => self.ctrl_stat.write_requests(data),
                0x08 => self.select = data,
                _ => {}
            }
        }
    }

    /// Record a write whose data phase had bad parity
    pub fn write_parity_error(&mut self) {
        self.ctrl_stat.set_wdataerr(true);
    }

    fn ap_addr(&self, addr: u8) -> u8 {
        (self.select & 0xF0) as u8 | addr
    }

    fn advance_tar(&mut self) {
        if self.csw.addrinc() == Csw::ADDRINC_SINGLE {
            self.tar = self.tar.wrapping_add(4);
        }
    }

    fn ap_read(&mut self, addr: u8) -> u32 {
        if let Some(value) = self.ap_reads.pop_front() {
            return value;
        }
        match self.ap_addr(addr) {
            0x00 => self.csw.value(),
            0x04 => self.tar,
            0x0C => {
                let value = self.memory.get(&self.tar).copied().unwrap_or(0);
                self.advance_tar();
                value
            }
            // IDR of an AHB-AP
            0xFC => 0x2477_0011,
            _ => 0,
        }
    }

    fn ap_write(&mut self, addr: u8, data: u32) {
        if self.fail_ap_write {
            self.fail_ap_write = false;
            self.ctrl_stat.set_stickyerr(true);
            return;
        }
        self.ap_writes.push((addr, data));
        match self.ap_addr(addr) {
            0x00 => self.csw = Csw::from(data),
            0x04 => self.tar = data,
            0x0C => {
                self.memory.insert(self.tar, data);
                self.advance_tar();
            }
            _ => {}
        }
    }
}

/// Transaction level front end
#[derive(Debug)]
pub struct SimTarget {
    model: TargetModel,
    ticks: u32,
    sequences: Vec<(u32, u64)>,
    idle: Vec<u32>,
    input: VecDeque<u64>,
    wires: Vec<WireConfig>,
    abort_after: Option<(u32, AbortHandle)>,
}

impl SimTarget {
    pub fn new(model: TargetModel) -> Self {
        Self {
            model,
            ticks: 1000,
            sequences: Vec::new(),
            idle: Vec::new(),
            input: VecDeque::new(),
            wires: Vec::new(),
            abort_after: None,
        }
    }

    pub fn model(&self) -> &TargetModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut TargetModel {
        &mut self.model
    }

    /// Bit sequences written with `write_bits`
    pub fn sequences(&self) -> &[(u32, u64)] {
        &self.sequences
    }

    /// Values returned by subsequent `read_bits` calls
    pub fn queue_input(&mut self, bits: u64) {
        self.input.push_back(bits);
    }

    /// Idle cycle runs requested with `idle_cycles`
    pub fn idle(&self) -> &[u32] {
        &self.idle
    }

    /// Raise an abort once `count` transfers have completed
    pub fn abort_after(&mut self, count: u32, handle: AbortHandle) {
        self.abort_after = Some((count, handle));
    }

    /// Wire settings each transfer was made with
    pub fn wires(&self) -> &[WireConfig] {
        &self.wires
    }
}

impl Transport for SimTarget {
    fn send_request_header(&mut self, request: u8, _wire: &WireConfig) -> u8 {
        self.model.begin(request)
    }

    fn transfer(&mut self, request: u8, data: &mut u32, wire: &WireConfig) -> u8 {
        self.wires.push(*wire);
        let ack = self.model.begin(request);
        if ack == DAP_TRANSFER_OK {
            if request & DAP_TRANSFER_RNW != 0 {
                *data = self.model.read(request);
            } else {
                self.model.write(request, *data);
            }
        }
        if let Some((count, handle)) = &self.abort_after {
            if self.model.attempts() >= *count {
                handle.abort();
            }
        }
        ack
    }

    fn write_bits(&mut self, count: u32, bits: u64) {
        self.sequences.push((count, bits));
    }

    fn read_bits(&mut self, count: u32) -> u64 {
        let bits = self.input.pop_front().unwrap_or(0);
        if count < 64 { bits & ((1 << count) - 1) } else { bits }
    }

    fn idle_cycles(&mut self, count: u32) {
        self.idle.push(count);
    }

    fn drive_swdio(&mut self) {}

    fn timestamp(&mut self) -> u32 {
        self.ticks += TICKS_PER_POLL;
        self.ticks
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Neither side drives, or the target ignores the host
    Released,
    /// Target drives this bit
    Drive(bool),
    /// Target samples write data bit `n`
    Sample(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collect {
    Idle,
    Request { bits: u8, count: u8 },
}

/// Wire decoder state, shared by the pin handles of a [`PinTarget`]
///
/// The target samples SWDIO on each rising SWCLK edge, and changes what it
/// drives just after it.  Each cycle of a transaction after the request is
/// queued as a [`Slot`].
#[derive(Debug)]
struct WireState {
    model: Rc<RefCell<TargetModel>>,
    connected: bool,
    swclk: bool,
    swdio: bool,
    output: bool,
    nreset: bool,
    nreset_stuck_low: bool,
    collect: Collect,
    slots: VecDeque<Slot>,
    write_request: u8,
    write_data: u64,
    ones: u32,
    locked: bool,
    turnaround: u8,
    data_phase: bool,
    corrupt_parity: bool,
}

impl WireState {
    fn new(model: Rc<RefCell<TargetModel>>) -> Self {
        Self {
            model,
            connected: true,
            swclk: true,
            swdio: true,
            output: true,
            nreset: true,
            nreset_stuck_low: false,
            collect: Collect::Idle,
            slots: VecDeque::new(),
            write_request: 0,
            write_data: 0,
            ones: 0,
            locked: false,
            turnaround: 1,
            data_phase: false,
            corrupt_parity: false,
        }
    }

    fn is_idle(&self) -> bool {
        self.slots.is_empty()
            && self.collect == Collect::Idle
            && !self.locked
            && self.output
            && self.swdio
    }

    fn drive(&mut self, line: Line, high: bool) {
        match line {
            Line::Swclk => {
                if high && !self.swclk {
                    self.rising_edge();
                }
                self.swclk = high;
            }
            Line::Swdio => self.swdio = high,
            Line::Nreset => self.nreset = high,
        }
    }

    fn driven(&self, line: Line) -> bool {
        match line {
            Line::Swclk => self.swclk,
            Line::Swdio => self.swdio,
            Line::Nreset => self.nreset,
        }
    }

    fn level(&self, line: Line) -> bool {
        match line {
            Line::Swclk => self.swclk,
            Line::Swdio => {
                if self.connected {
                    if let Some(Slot::Drive(bit)) = self.slots.front() {
                        return *bit;
                    }
                }
                // Pulled up when nobody drives
                if self.output { self.swdio } else { true }
            }
            Line::Nreset => self.nreset && !self.nreset_stuck_low,
        }
    }

    fn rising_edge(&mut self) {
        if !self.connected {
            return;
        }

        let host_bit = self.output && self.swdio;
        if host_bit {
            self.ones += 1;
        } else {
            self.ones = 0;
        }

        if let Some(slot) = self.slots.pop_front() {
            if let Slot::Sample(bit) = slot {
                if self.output && self.swdio {
                    self.write_data |= 1 << bit;
                }
                if bit == 32 {
                    self.complete_write();
                }
            }
            return;
        }

        if self.ones >= LINE_RESET_ONES {
            self.locked = false;
            self.collect = Collect::Idle;
            return;
        }
        if self.locked || !self.output {
            return;
        }

        match self.collect {
            Collect::Idle => {
                if host_bit {
                    self.collect = Collect::Request { bits: 1, count: 1 };
                }
            }
            Collect::Request { bits, count } => {
                let bits = bits | ((host_bit as u8) << count);
                if count == 7 {
                    self.collect = Collect::Idle;
                    self.request(bits);
                } else {
                    self.collect = Collect::Request {
                        bits,
                        count: count + 1,
                    };
                }
            }
        }
    }

    fn request(&mut self, packet: u8) {
        let request = (packet >> 1) & 0x0F;
        let parity = packet & (1 << 5) != 0;
        let stop = packet & (1 << 6) != 0;
        let park = packet & (1 << 7) != 0;
        if parity8(request) != parity || stop || !park {
            self.locked = true;
            return;
        }

        let ack = self.model.borrow_mut().begin(request);
        let trn = self.turnaround as usize;
        self.slots.extend(core::iter::repeat_n(Slot::Released, trn));
        for bit in 0..3 {
            self.slots.push_back(Slot::Drive(ack & (1 << bit) != 0));
        }

        if ack == DAP_TRANSFER_OK {
            if request & DAP_TRANSFER_RNW != 0 {
                let data = self.model.borrow_mut().read(request);
                let parity = parity32(data) ^ self.corrupt_parity;
                self.corrupt_parity = false;
                for bit in 0..32 {
                    self.slots.push_back(Slot::Drive(data & (1 << bit) != 0));
                }
                self.slots.push_back(Slot::Drive(parity));
                self.slots.extend(core::iter::repeat_n(Slot::Released, trn));
            } else {
                self.write_request = request;
                self.write_data = 0;
                self.slots.extend(core::iter::repeat_n(Slot::Released, trn));
                self.slots.extend((0..33).map(Slot::Sample));
            }
        } else {
            let dummy = if self.data_phase { 33 } else { 0 };
            self.slots
                .extend(core::iter::repeat_n(Slot::Released, trn + dummy));
        }
    }

    fn complete_write(&mut self) {
        let data = self.write_data as u32;
        let parity = self.write_data & (1 << 32) != 0;
        let mut model = self.model.borrow_mut();
        if parity32(data) == parity {
            model.write(self.write_request, data);
        } else {
            model.write_parity_error();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Swclk,
    Swdio,
    Nreset,
}

/// One SWD line of a [`PinTarget`]
#[derive(Debug)]
pub struct SimPin {
    wire: Rc<RefCell<WireState>>,
    line: Line,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.wire.borrow_mut().drive(self.line, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.wire.borrow_mut().drive(self.line, true);
        Ok(())
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.wire.borrow().driven(self.line))
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.wire.borrow().driven(self.line))
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.wire.borrow().level(self.line))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.wire.borrow().level(self.line))
    }
}

impl SwdioPin for SimPin {
    fn set_as_output(&mut self) {
        self.wire.borrow_mut().output = true;
    }

    fn set_as_input(&mut self) {
        self.wire.borrow_mut().output = false;
    }
}

/// Counts delays rather than waiting, and advances a fake timestamp clock
#[derive(Debug)]
pub struct SimDelay {
    calls: u32,
    cycles: u32,
    us: u32,
    ticks: u32,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_us(ns.div_ceil(1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.us += us;
        self.ticks = self.ticks.wrapping_add(us * TICKS_PER_US);
    }
}

impl DelayCycles for SimDelay {
    fn delay_cycles(&mut self, count: u32) {
        self.calls += 1;
        self.cycles += count;
    }
}

/// Pin level front end
///
/// Implements [`SwdPins`] with `embedded-hal` pin handles that all drive
/// one shared wire decoder.
#[derive(Debug)]
pub struct PinTarget {
    model: Rc<RefCell<TargetModel>>,
    wire: Rc<RefCell<WireState>>,
    swclk: SimPin,
    swdio: SimPin,
    nreset: SimPin,
    delay: SimDelay,
    setups: u32,
    offs: u32,
    leds: [bool; 2],
}

impl PinTarget {
    pub fn new(model: TargetModel) -> Self {
        Self::shared(Rc::new(RefCell::new(model)))
    }

    pub fn shared(model: Rc<RefCell<TargetModel>>) -> Self {
        let wire = Rc::new(RefCell::new(WireState::new(model.clone())));
        let pin = |line| SimPin {
            wire: wire.clone(),
            line,
        };
        Self {
            swclk: pin(Line::Swclk),
            swdio: pin(Line::Swdio),
            nreset: pin(Line::Nreset),
            model,
            wire,
            delay: SimDelay {
                calls: 0,
                cycles: 0,
                us: 0,
                ticks: 1000,
            },
            setups: 0,
            offs: 0,
            leds: [false; 2],
        }
    }

    pub fn model(&self) -> Ref<'_, TargetModel> {
        self.model.borrow()
    }

    pub fn model_mut(&self) -> RefMut<'_, TargetModel> {
        self.model.borrow_mut()
    }

    pub fn set_turnaround(&mut self, turnaround: u8) {
        self.wire.borrow_mut().turnaround = turnaround;
    }

    pub fn set_data_phase(&mut self, data_phase: bool) {
        self.wire.borrow_mut().data_phase = data_phase;
    }

    /// Flip the parity bit of the next read data phase
    pub fn corrupt_next_parity(&mut self) {
        self.wire.borrow_mut().corrupt_parity = true;
    }

    /// Remove the target.  SWDIO floats high.
    pub fn disconnect(&mut self) {
        self.wire.borrow_mut().connected = false;
    }

    /// Hold nRESET low whatever the probe drives
    pub fn hold_nreset_low(&mut self) {
        self.wire.borrow_mut().nreset_stuck_low = true;
    }

    /// The target is waiting for a request, having seen a line reset if it
    /// needed one, and the host is driving SWDIO high.
    pub fn is_idle(&self) -> bool {
        self.wire.borrow().is_idle()
    }

    /// The target has seen a protocol error and needs a line reset
    pub fn is_locked(&self) -> bool {
        self.wire.borrow().locked
    }

    pub fn delay_calls(&self) -> u32 {
        self.delay.calls
    }

    pub fn delay_total(&self) -> u32 {
        self.delay.cycles
    }

    pub fn delayed_us(&self) -> u32 {
        self.delay.us
    }

    pub fn setups(&self) -> u32 {
        self.setups
    }

    pub fn offs(&self) -> u32 {
        self.offs
    }

    pub fn led(&self, led: usize) -> bool {
        self.leds[led]
    }
}

impl SwdPins for PinTarget {
    type Swclk = SimPin;
    type Swdio = SimPin;
    type Nreset = SimPin;
    type Delay = SimDelay;

    fn swclk(&mut self) -> &mut SimPin {
        &mut self.swclk
    }

    fn swdio(&mut self) -> &mut SimPin {
        &mut self.swdio
    }

    fn nreset(&mut self) -> &mut SimPin {
        &mut self.nreset
    }

    fn delay(&mut self) -> &mut SimDelay {
        &mut self.delay
    }

    fn timestamp(&mut self) -> u32 {
        self.delay.ticks = self.delay.ticks.wrapping_add(TICKS_PER_POLL);
        self.delay.ticks
    }

    fn setup(&mut self) {
        self.setups += 1;
        let mut wire = self.wire.borrow_mut();
        wire.output = true;
        wire.swdio = true;
        wire.swclk = true;
        wire.nreset = true;
    }

    fn off(&mut self) {
        self.offs += 1;
        self.wire.borrow_mut().output = false;
    }

    fn led_connected(&mut self, on: bool) {
        self.leds[0] = on;
    }

    fn led_running(&mut self, on: bool) {
        self.leds[1] = on;
    }
}

/// Shift register front end, driving its own wire decoder
#[derive(Debug)]
pub struct ShiftTarget {
    wire: PinTarget,
    attached: bool,
    attaches: u32,
    shifts: Vec<(u8, u8)>,
}

impl ShiftTarget {
    pub fn new(model: TargetModel) -> Self {
        Self::shared(Rc::new(RefCell::new(model)))
    }

    pub fn shared(model: Rc<RefCell<TargetModel>>) -> Self {
        Self {
            wire: PinTarget::shared(model),
            attached: false,
            attaches: 0,
            shifts: Vec::new(),
        }
    }

    pub fn wire(&mut self) -> &mut PinTarget {
        &mut self.wire
    }

    pub fn model(&self) -> Ref<'_, TargetModel> {
        self.wire.model()
    }

    pub fn model_mut(&self) -> RefMut<'_, TargetModel> {
        self.wire.model_mut()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn attaches(&self) -> u32 {
        self.attaches
    }

    /// (out_bits, in_bits) of every shift
    pub fn shifts(&self) -> &[(u8, u8)] {
        &self.shifts
    }
}

impl ShiftRegister for ShiftTarget {
    fn attach(&mut self) {
        self.attached = true;
        self.attaches += 1;
    }

    fn detach(&mut self) {
        self.attached = false;
    }

    fn shift(&mut self, out: u64, out_bits: u8, in_bits: u8) -> u64 {
        self.shifts.push((out_bits, in_bits));
        if !self.attached {
            return u64::MAX;
        }

        self.wire.swdio_output(true);
        for bit in 0..out_bits {
            self.wire.swdio_set(out & (1 << bit) != 0);
            self.wire.swclk_set(false);
            self.wire.swclk_set(true);
        }

        let mut value = 0u64;
        if in_bits > 0 {
            self.wire.swdio_output(false);
            for bit in 0..in_bits {
                self.wire.swclk_set(false);
                if self.wire.swdio_get() {
                    value |= 1 << bit;
                }
                self.wire.swclk_set(true);
            }
        }
        value
    }
}

/// A pin level and a shift level front end sharing one target
pub fn shared_target(model: TargetModel) -> (PinTarget, ShiftTarget, Rc<RefCell<TargetModel>>) {
    let model = Rc::new(RefCell::new(model));
    (
        PinTarget::shared(model.clone()),
        ShiftTarget::shared(model.clone()),
        model,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn model_posts_ap_reads() {
        let mut model = TargetModel::new();
        model.queue_ap_reads(&[0x11, 0x22]);
        assert_eq!(model.begin(0x0F), DAP_TRANSFER_OK);
        assert_eq!(model.read(0x0F), 0);
        assert_eq!(model.read(0x0F), 0x11);
        assert_eq!(model.read(0x0E), 0x22);
    }

    #[test]
    fn model_fault_cleared_by_abort() {
        let mut model = TargetModel::new();
        model.inject_fault();
        assert_eq!(model.begin(0x0F), DAP_TRANSFER_FAULT);
        assert_eq!(model.begin(0x00), DAP_TRANSFER_OK);
        model.write(0x00, Abort::CLEAR_ALL);
        assert_eq!(model.begin(0x0F), DAP_TRANSFER_OK);
    }

    #[test]
    fn model_sticky_error_faults_rdbuff() {
        let mut model = TargetModel::new();
        model.fail_next_ap_write();
        assert_eq!(model.begin(0x0D), DAP_TRANSFER_OK);
        model.write(0x0D, 0x1234);
        assert!(model.ctrl_stat().stickyerr());
        assert!(model.ap_writes().is_empty());

        // RDBUFF and SELECT FAULT, IDCODE and CTRL/STAT still answer
        assert_eq!(model.begin(0x0E), DAP_TRANSFER_FAULT);
        assert_eq!(model.begin(0x08), DAP_TRANSFER_FAULT);
        assert_eq!(model.begin(0x02), DAP_TRANSFER_OK);
        assert_eq!(model.begin(0x06), DAP_TRANSFER_OK);
    }

    #[test]
    fn pin_handles_share_wire() {
        let mut pins = PinTarget::new(TargetModel::new());
        assert!(pins.is_idle());
        pins.swdio().set_as_input();
        assert!(!pins.is_idle());
        pins.swdio().set_as_output();

        pins.nreset().set_low().unwrap();
        assert_eq!(pins.nreset().is_set_high(), Ok(false));
        pins.nreset_set(true);
        assert!(pins.nreset_get());
        pins.hold_nreset_low();
        assert!(!pins.nreset_get());
        assert_eq!(pins.nreset().is_set_high(), Ok(true));

        pins.delay_us(10);
        pins.delay_cycles(4);
        assert_eq!(pins.delayed_us(), 10);
        assert_eq!((pins.delay_calls(), pins.delay_total()), (1, 4));
    }

    #[test]
    fn pin_line_reset_unlocks() {
        let mut pins = PinTarget::new(TargetModel::new());
        pins.wire.borrow_mut().locked = true;
        pins.swdio_output(true);
        pins.swdio_set(true);
        for _ in 0..LINE_RESET_ONES {
            pins.swclk_set(false);
            pins.swclk_set(true);
        }
        assert!(!pins.is_locked());
        assert!(pins.is_idle());
    }
}
