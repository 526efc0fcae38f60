/// Test doubles simulating the MCP2515 and the delay timer during
/// integration tests. The mock chip interprets the SPI instruction set at
/// the byte level against an in-memory register file and keeps a log of
/// every chip-select transaction for the tests to inspect.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use heliocan::driver::traits::{chip_timer::ChipTimer, spi_link::SpiLink};

/// Error type surfaced by the mock serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockLinkError;

struct ChipState {
    regs: [u8; 0x80],
    /// Completed chip-select windows, first byte = instruction.
    transactions: Vec<Vec<u8>>,
    current: Vec<u8>,
    selected: bool,
    /// Scripted responses for the quick-status instruction; once drained,
    /// `default_status` answers.
    status_script: VecDeque<u8>,
    default_status: u8,
    rx_status: u8,
    /// One-shot race injection: when a bit-modify clears the error
    /// interrupt flag, re-assert it (a second error arriving between
    /// check and acknowledge).
    reassert_error_on_clear: bool,
    /// Fail the serial primitive after this many more bytes.
    fail_after: Option<usize>,
}

impl ChipState {
    fn new() -> Self {
        let mut state = Self {
            regs: [0; 0x80],
            transactions: Vec::new(),
            current: Vec::new(),
            selected: false,
            status_script: VecDeque::new(),
            default_status: 0,
            rx_status: 0,
            reassert_error_on_clear: false,
            fail_after: None,
        };
        state.reset_registers();
        state
    }

    fn reset_registers(&mut self) {
        self.regs = [0; 0x80];
        // Reset leaves the chip in configuration mode.
        self.regs[0x0F] = 0x80;
    }

    fn shift_in(&mut self, byte: u8) -> Result<(), MockLinkError> {
        if let Some(remaining) = self.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(MockLinkError);
            }
            *remaining -= 1;
        }
        self.current.push(byte);
        Ok(())
    }

    /// Response shifted out while the latest byte was shifted in.
    fn shift_out(&mut self) -> u8 {
        let index = self.current.len() - 1;
        let command = self.current[0];
        match command {
            0x03 if index >= 2 => {
                let start = self.current[1] as usize;
                self.regs[(start + index - 2) & 0x7F]
            }
            0xA0 => self
                .status_script
                .pop_front()
                .unwrap_or(self.default_status),
            0xB0 => self.rx_status,
            _ if command & 0xF9 == 0x90 && index >= 1 => {
                let buffer = ((command >> 2) & 0x01) as usize;
                let data_only = ((command >> 1) & 0x01) as usize;
                let start = 0x61 + 0x10 * buffer + 5 * data_only;
                self.regs[(start + index - 1) & 0x7F]
            }
            _ => 0,
        }
    }

    /// Apply the committed transaction's side effects.
    fn commit(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let bytes = core::mem::take(&mut self.current);
        match bytes[0] {
            0xC0 => self.reset_registers(),
            0x02 => {
                let start = bytes[1] as usize;
                for (i, byte) in bytes[2..].iter().enumerate() {
                    self.regs[(start + i) & 0x7F] = *byte;
                }
            }
            0x05 if bytes.len() >= 4 => {
                let addr = bytes[1] as usize;
                let (mask, data) = (bytes[2], bytes[3]);
                self.regs[addr] = (self.regs[addr] & !mask) | (data & mask);
                if addr == 0x2C && self.reassert_error_on_clear && mask & 0x20 != 0 && data & 0x20 == 0
                {
                    self.regs[0x2C] |= 0x20;
                    self.reassert_error_on_clear = false;
                }
            }
            command if command & 0xF8 == 0x40 => {
                let selector = (command & 0x07) as usize;
                let start = 0x31 + 0x10 * (selector >> 1) + 5 * (selector & 0x01);
                for (i, byte) in bytes[1..].iter().enumerate() {
                    self.regs[(start + i) & 0x7F] = *byte;
                }
            }
            _ => {}
        }
        self.transactions.push(bytes);
    }
}

/// In-memory MCP2515 implementing [`SpiLink`]. Clones share the same chip.
#[derive(Clone)]
pub struct MockChip {
    state: Rc<RefCell<ChipState>>,
}

#[allow(dead_code)]
impl MockChip {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ChipState::new())),
        }
    }

    pub fn reg(&self, addr: u8) -> u8 {
        self.state.borrow().regs[addr as usize]
    }

    pub fn set_reg(&self, addr: u8, value: u8) {
        self.state.borrow_mut().regs[addr as usize] = value;
    }

    /// Stage a received frame in a hardware buffer and raise its interrupt
    /// flag: control byte, identifier pair, and the eight data bytes.
    pub fn load_rx_frame(&self, buffer: usize, ctrl: u8, sidh: u8, sidl: u8, data: [u8; 8]) {
        let base = if buffer == 0 { 0x60 } else { 0x70 };
        let mut state = self.state.borrow_mut();
        state.regs[base] = ctrl;
        state.regs[base + 1] = sidh;
        state.regs[base + 2] = sidl;
        state.regs[base + 5] = 0x08;
        state.regs[base + 6..base + 14].copy_from_slice(&data);
        state.regs[0x2C] |= if buffer == 0 { 0x01 } else { 0x02 };
    }

    /// Queue quick-status responses; drained in order, then
    /// [`MockChip::set_default_status`] answers.
    pub fn script_status(&self, values: &[u8]) {
        self.state
            .borrow_mut()
            .status_script
            .extend(values.iter().copied());
    }

    pub fn set_default_status(&self, value: u8) {
        self.state.borrow_mut().default_status = value;
    }

    pub fn set_rx_status(&self, value: u8) {
        self.state.borrow_mut().rx_status = value;
    }

    /// Arm the one-shot error race: the next bit-modify clearing the error
    /// interrupt flag immediately re-asserts it.
    pub fn arm_error_reassert(&self) {
        self.state.borrow_mut().reassert_error_on_clear = true;
    }

    /// Make the serial primitive fail after `bytes` more bytes.
    pub fn fail_after(&self, bytes: usize) {
        self.state.borrow_mut().fail_after = Some(bytes);
    }

    pub fn selected(&self) -> bool {
        self.state.borrow().selected
    }

    /// Completed chip-select transactions, oldest first.
    pub fn transactions(&self) -> Vec<Vec<u8>> {
        self.state.borrow().transactions.clone()
    }

    /// Transactions whose instruction byte matches `predicate`.
    pub fn transactions_where(&self, predicate: impl Fn(u8) -> bool) -> Vec<Vec<u8>> {
        self.transactions()
            .into_iter()
            .filter(|bytes| predicate(bytes[0]))
            .collect()
    }

    pub fn clear_transactions(&self) {
        self.state.borrow_mut().transactions.clear();
    }
}

impl SpiLink for MockChip {
    type Error = MockLinkError;

    fn select(&mut self) {
        let mut state = self.state.borrow_mut();
        state.selected = true;
        state.current.clear();
    }

    fn deselect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.selected = false;
        state.commit();
    }

    async fn transmit(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.state.borrow_mut().shift_in(byte)
    }

    async fn exchange(&mut self, byte: u8) -> Result<u8, Self::Error> {
        let mut state = self.state.borrow_mut();
        state.shift_in(byte)?;
        Ok(state.shift_out())
    }
}

/// Timer that records requested delays instead of sleeping.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct MockTimer {
    delays: Rc<RefCell<Vec<u32>>>,
}

#[allow(dead_code)]
impl MockTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<u32> {
        self.delays.borrow().clone()
    }
}

impl ChipTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        self.delays.borrow_mut().push(millis);
    }
}
