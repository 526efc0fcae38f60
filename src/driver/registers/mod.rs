//! MCP2515 register map, SPI instruction bytes, and the bit constants the
//! channel logic relies on. Values are fixed by the chip datasheet and must
//! stay bit-exact; the wire protocol built from them is in
//! [`port`](crate::driver::port).

use embedded_can::StandardId;

//==================================================================================Instructions

/// SPI instruction bytes understood by the chip. Buffer-addressed
/// instructions (`ReadRx`, `LoadTx`, `Rts`) carry the buffer selection in
/// their low bits; see [`RxBuffer`] and [`Mailbox`] for the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Instruction {
    /// Reset the chip into configuration mode and clear errors.
    Reset = 0xC0,
    /// Read registers starting at a given address.
    Read = 0x03,
    /// Read a receive buffer; base value, low bits select buffer and segment.
    ReadRx = 0x90,
    /// Write registers starting at a given address.
    Write = 0x02,
    /// Load a transmit buffer; base value, low bits select buffer and segment.
    LoadTx = 0x40,
    /// Request-to-send; base value, low bits select the mailbox.
    Rts = 0x80,
    /// Quick status poll (transmit pending and receive full bits).
    ReadStatus = 0xA0,
    /// Receive status poll (filter match and message type).
    ReadRxStatus = 0xB0,
    /// Chip-side read-modify-write of a single register.
    BitModify = 0x05,
}

//==================================================================================Registers

/// Register addresses touched by this driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    /// Acceptance filter 0, standard identifier high byte. Start of the
    /// first 12-byte filter block (filters 0, 1, 2).
    Rxf0Sidh = 0x00,
    /// Acceptance filter 3, standard identifier high byte. Start of the
    /// second 12-byte filter block (filters 3, 4, 5).
    Rxf3Sidh = 0x10,
    /// Acceptance mask 0, standard identifier high byte. Start of the
    /// 8-byte mask block (masks 0, 1).
    Rxm0Sidh = 0x20,
    /// RXnBF pin control and status.
    Bfpctrl = 0x0C,
    /// Control register (operating mode, clock output divider).
    Canctrl = 0x0F,
    /// Transmit error counter; the receive error counter follows at 0x1D.
    Tec = 0x1C,
    /// Bit timing register 3. Start of the contiguous CNF3/CNF2/CNF1/
    /// CANINTE/CANINTF/EFLG block written during initialisation.
    Cnf3 = 0x28,
    /// Interrupt enable register.
    Caninte = 0x2B,
    /// Interrupt flag register.
    Canintf = 0x2C,
    /// Error flag register.
    Eflg = 0x2D,
    /// Transmit mailbox 0 data length code.
    Txb0Dlc = 0x35,
    /// Transmit mailbox 1 data length code.
    Txb1Dlc = 0x45,
    /// Transmit mailbox 2 data length code.
    Txb2Dlc = 0x55,
    /// Receive buffer 0 control register. A 14-byte read from here covers
    /// the control byte, the address/DLC registers, and the 8 data bytes.
    Rxb0Ctrl = 0x60,
    /// Receive buffer 1 control register.
    Rxb1Ctrl = 0x70,
}

impl Register {
    /// Raw register address as sent on the wire.
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

//==================================================================================Bit constants

/// Interrupt flag / interrupt enable register bits.
pub mod irq {
    /// Message (multi-receive) error.
    pub const MERR: u8 = 0x80;
    /// Bus activity wake-up.
    pub const WAKE: u8 = 0x40;
    /// Error flag register condition change.
    pub const ERR: u8 = 0x20;
    /// Receive buffer 1 full.
    pub const RXB1: u8 = 0x02;
    /// Receive buffer 0 full.
    pub const RXB0: u8 = 0x01;
    /// The interrupt sources the channel enables and acknowledges as a
    /// group: MERR | ERR | RXB1 | RXB0.
    pub const ENABLED: u8 = 0xA3;
}

/// Quick-status byte bits (response to [`Instruction::ReadStatus`]).
pub mod status {
    /// Mailbox 0 transmit request pending.
    pub const TX0_PENDING: u8 = 0x04;
    /// Mailbox 1 transmit request pending.
    pub const TX1_PENDING: u8 = 0x10;
    /// Mailbox 2 transmit request pending.
    pub const TX2_PENDING: u8 = 0x40;
    /// All three mailboxes pending.
    pub const TX_ALL_PENDING: u8 = TX0_PENDING | TX1_PENDING | TX2_PENDING;
}

/// Data length code register bits.
pub mod dlc {
    /// Remote transmission request bit.
    pub const RTR: u8 = 0x40;
    /// Eight-byte data frame.
    pub const LEN_8: u8 = 0x08;
    /// RTR bit plus length field, the bits rewritten when switching a
    /// mailbox between remote-request and data framing.
    pub const RTR_AND_LEN: u8 = 0x4F;
}

/// Remote-request bit in the RXBnCTRL control byte of a received frame.
pub const RXB_CTRL_RTR: u8 = 0x08;

/// RXBnCTRL value enabling acceptance filters with buffer-0 rollover.
pub const RXB_CTRL_FILTERS_ROLLOVER: u8 = 0x04;

/// BFPCTRL value enabling both receive-buffer-full interrupt pins.
pub const BFP_RX_PINS_ENABLED: u8 = 0x0F;

//==================================================================================Bit timing

/// Bit-timing presets. Sampling geometry is fixed (PHSEG2 = 3Tq, triple
/// sample, PHSEG1 = 2Tq, PROP = 2Tq, SJW = 1Tq); the presets differ only in
/// the baud-rate prescaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bitrate {
    /// 125 kbps (BRP = 7).
    #[default]
    Kbps125,
    /// 250 kbps (BRP = 3).
    Kbps250,
    /// 1 Mbps (BRP = 0).
    Mbps1,
}

impl Bitrate {
    /// Register image in write order: `[CNF3, CNF2, CNF1]`.
    pub const fn cnf(self) -> [u8; 3] {
        let cnf1 = match self {
            Bitrate::Kbps125 => 0x07,
            Bitrate::Kbps250 => 0x03,
            Bitrate::Mbps1 => 0x00,
        };
        [0x02, 0xC9, cnf1]
    }
}

//==================================================================================Buffers

/// One of the three hardware transmit mailboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mailbox {
    Tx0,
    Tx1,
    Tx2,
}

impl Mailbox {
    /// All mailboxes in claim order.
    pub const ALL: [Mailbox; 3] = [Mailbox::Tx0, Mailbox::Tx1, Mailbox::Tx2];

    /// Slot index in the channel's address cache.
    pub const fn index(self) -> usize {
        match self {
            Mailbox::Tx0 => 0,
            Mailbox::Tx1 => 1,
            Mailbox::Tx2 => 2,
        }
    }

    /// Load-buffer selector for a full 13-byte frame write (address
    /// registers onward).
    pub const fn full_selector(self) -> u8 {
        (self.index() as u8) << 1
    }

    /// Load-buffer selector for an 8-byte data-only write.
    pub const fn data_selector(self) -> u8 {
        self.full_selector() | 0x01
    }

    /// This mailbox's transmit-pending bit in the quick-status byte.
    pub const fn pending_bit(self) -> u8 {
        match self {
            Mailbox::Tx0 => status::TX0_PENDING,
            Mailbox::Tx1 => status::TX1_PENDING,
            Mailbox::Tx2 => status::TX2_PENDING,
        }
    }

    /// This mailbox's data length code register.
    pub const fn dlc_register(self) -> Register {
        match self {
            Mailbox::Tx0 => Register::Txb0Dlc,
            Mailbox::Tx1 => Register::Txb1Dlc,
            Mailbox::Tx2 => Register::Txb2Dlc,
        }
    }
}

/// One of the two hardware receive buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxBuffer {
    Rx0,
    Rx1,
}

impl RxBuffer {
    /// Control register heading this buffer's 14-byte register window.
    pub const fn ctrl_register(self) -> Register {
        match self {
            RxBuffer::Rx0 => Register::Rxb0Ctrl,
            RxBuffer::Rx1 => Register::Rxb1Ctrl,
        }
    }

    /// This buffer's interrupt flag bit.
    pub const fn irq_bit(self) -> u8 {
        match self {
            RxBuffer::Rx0 => irq::RXB0,
            RxBuffer::Rx1 => irq::RXB1,
        }
    }

    /// Read-buffer selector addressing this buffer's identifier registers.
    pub const fn full_selector(self) -> u8 {
        match self {
            RxBuffer::Rx0 => 0x00,
            RxBuffer::Rx1 => 0x02,
        }
    }
}

/// Segment of a transmit or receive buffer addressed by the buffer
/// instructions: the full frame (identifier registers onward, 13 bytes) or
/// the data registers alone (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSegment {
    /// Identifier, DLC, and data registers: 13 bytes.
    Full,
    /// Data registers only: 8 bytes.
    Data,
}

impl BufferSegment {
    /// Number of bytes shifted for this segment.
    pub const fn len(self) -> usize {
        match self {
            BufferSegment::Full => 13,
            BufferSegment::Data => 8,
        }
    }
}

//==================================================================================Identifier packing

/// Pack an 11-bit identifier into the left-justified (SIDH, SIDL) register
/// pair.
pub fn sid_to_bytes(address: StandardId) -> (u8, u8) {
    let raw = address.as_raw();
    ((raw >> 3) as u8, ((raw << 5) & 0xE0) as u8)
}

/// Reconstruct an 11-bit identifier from the (SIDH, SIDL) register pair.
/// The result of `(sidh << 3) | (sidl >> 5)` never exceeds `0x7FF`.
pub fn sid_from_bytes(sidh: u8, sidl: u8) -> StandardId {
    let raw = ((sidh as u16) << 3) | ((sidl as u16) >> 5);
    StandardId::new(raw).unwrap_or(StandardId::ZERO)
}
