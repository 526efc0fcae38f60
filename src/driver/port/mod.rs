//! SPI register protocol: frames every chip command as the byte sequence
//! the MCP2515 expects and brackets it with an exclusive chip-select
//! acquisition. The select line is released on every exit path, including
//! when the serial primitive fails mid-command; nothing is retried here.

use crate::driver::registers::{BufferSegment, Instruction, Mailbox, Register, RxBuffer};
use crate::driver::traits::spi_link::SpiLink;

/// Command port for one chip. Owns the serial link for the lifetime of the
/// channel; commands never interleave because every operation holds the
/// select line from first to last byte.
pub struct RegisterPort<L: SpiLink> {
    link: L,
}

impl<L: SpiLink> RegisterPort<L> {
    /// Wrap an initialised serial link.
    pub fn new(link: L) -> Self {
        Self { link }
    }

    /// Reset the chip (switches to configuration mode, clears errors).
    pub async fn reset(&mut self) -> Result<(), L::Error> {
        self.link.select();
        let outcome = self.link.transmit(Instruction::Reset as u8).await;
        self.link.deselect();
        outcome
    }

    /// Read `out.len()` registers starting at `start`.
    pub async fn read(&mut self, start: Register, out: &mut [u8]) -> Result<(), L::Error> {
        self.link.select();
        let outcome = self.read_seq(start, out).await;
        self.link.deselect();
        outcome
    }

    async fn read_seq(&mut self, start: Register, out: &mut [u8]) -> Result<(), L::Error> {
        self.link.transmit(Instruction::Read as u8).await?;
        self.link.transmit(start.addr()).await?;
        for slot in out.iter_mut() {
            *slot = self.link.exchange(0x00).await?;
        }
        Ok(())
    }

    /// Read a receive buffer through the dedicated buffer instruction:
    /// 13 bytes from the identifier registers or 8 bytes from the data
    /// registers, per `segment`. `out` must hold at least `segment.len()`
    /// bytes.
    pub async fn read_rx(
        &mut self,
        buffer: RxBuffer,
        segment: BufferSegment,
        out: &mut [u8],
    ) -> Result<(), L::Error> {
        let selector = match segment {
            BufferSegment::Full => buffer.full_selector(),
            BufferSegment::Data => buffer.full_selector() | 0x01,
        };
        let command = Instruction::ReadRx as u8 | ((selector & 0x03) << 1);

        self.link.select();
        let outcome = self.read_rx_seq(command, &mut out[..segment.len()]).await;
        self.link.deselect();
        outcome
    }

    async fn read_rx_seq(&mut self, command: u8, out: &mut [u8]) -> Result<(), L::Error> {
        self.link.transmit(command).await?;
        for slot in out.iter_mut() {
            *slot = self.link.exchange(0x00).await?;
        }
        Ok(())
    }

    /// Write `bytes` to consecutive registers starting at `start`.
    pub async fn write(&mut self, start: Register, bytes: &[u8]) -> Result<(), L::Error> {
        self.link.select();
        let outcome = self.write_seq(start, bytes).await;
        self.link.deselect();
        outcome
    }

    async fn write_seq(&mut self, start: Register, bytes: &[u8]) -> Result<(), L::Error> {
        self.link.transmit(Instruction::Write as u8).await?;
        self.link.transmit(start.addr()).await?;
        for byte in bytes {
            self.link.transmit(*byte).await?;
        }
        Ok(())
    }

    /// Load a transmit mailbox through the dedicated buffer instruction:
    /// a full 13-byte frame (identifier registers onward) or the 8 data
    /// bytes alone, per `segment`. Exactly `segment.len()` bytes of `bytes`
    /// are shifted.
    pub async fn write_tx(
        &mut self,
        mailbox: Mailbox,
        segment: BufferSegment,
        bytes: &[u8],
    ) -> Result<(), L::Error> {
        let selector = match segment {
            BufferSegment::Full => mailbox.full_selector(),
            BufferSegment::Data => mailbox.data_selector(),
        };
        let command = Instruction::LoadTx as u8 | (selector & 0x07);

        self.link.select();
        let outcome = self.write_tx_seq(command, &bytes[..segment.len()]).await;
        self.link.deselect();
        outcome
    }

    async fn write_tx_seq(&mut self, command: u8, bytes: &[u8]) -> Result<(), L::Error> {
        self.link.transmit(command).await?;
        for byte in bytes {
            self.link.transmit(*byte).await?;
        }
        Ok(())
    }

    /// Initiate transmission of one mailbox.
    pub async fn request_to_send(&mut self, mailbox: Mailbox) -> Result<(), L::Error> {
        let command = Instruction::Rts as u8 | (1 << mailbox.index() as u8);
        self.link.select();
        let outcome = self.link.transmit(command).await;
        self.link.deselect();
        outcome
    }

    /// Quick status poll: transmit pending and receive full bits.
    pub async fn read_status(&mut self) -> Result<u8, L::Error> {
        self.read_poll(Instruction::ReadStatus).await
    }

    /// Receive status poll: filter match and message type of the latest
    /// received message.
    pub async fn read_filter_match(&mut self) -> Result<u8, L::Error> {
        self.read_poll(Instruction::ReadRxStatus).await
    }

    async fn read_poll(&mut self, instruction: Instruction) -> Result<u8, L::Error> {
        self.link.select();
        let outcome = self.read_poll_seq(instruction).await;
        self.link.deselect();
        outcome
    }

    async fn read_poll_seq(&mut self, instruction: Instruction) -> Result<u8, L::Error> {
        self.link.transmit(instruction as u8).await?;
        self.link.exchange(0x00).await
    }

    /// Chip-side read-modify-write: bits set in `mask` are replaced by the
    /// corresponding bits of `data`, bits clear in `mask` are untouched.
    pub async fn modify(&mut self, register: Register, mask: u8, data: u8) -> Result<(), L::Error> {
        self.link.select();
        let outcome = self.modify_seq(register, mask, data).await;
        self.link.deselect();
        outcome
    }

    async fn modify_seq(&mut self, register: Register, mask: u8, data: u8) -> Result<(), L::Error> {
        self.link.transmit(Instruction::BitModify as u8).await?;
        self.link.transmit(register.addr()).await?;
        self.link.transmit(mask).await?;
        self.link.transmit(data).await?;
        Ok(())
    }
}
