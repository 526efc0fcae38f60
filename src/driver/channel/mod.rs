//! Channel logic for one MCP2515: bring-up into normal operating mode,
//! per-interrupt receive event decoding, and mailbox transmission with an
//! address cache over the three hardware transmit mailboxes.
//!
//! Two identical channel instances may coexist; each owns its chip, its
//! serial link, and its own frame record, mailbox cache, and counters.

use embedded_can::StandardId;

use crate::core::{Frame, FrameStatus, PAYLOAD_LEN};
use crate::driver::port::RegisterPort;
use crate::driver::registers::{
    dlc, irq, sid_from_bytes, sid_to_bytes, status, Bitrate, BufferSegment, Mailbox, Register,
    RxBuffer, BFP_RX_PINS_ENABLED, RXB_CTRL_FILTERS_ROLLOVER, RXB_CTRL_RTR,
};
use crate::driver::traits::{chip_timer::ChipTimer, spi_link::SpiLink};
use crate::error::{ChannelError, ConfigError};

//==================================================================================Constants

/// Settle delay after a chip reset (ms).
pub const RESET_SETTLE_MS: u32 = 10;

/// Delay between mailbox-contention polls during a normal transmit (ms).
pub const TX_POLL_DELAY_MS: u32 = 1;

/// Number of contention polls a normal data transmit performs before the
/// frame is given up on. Remote requests wait without a cap instead.
const TX_POLL_LIMIT: u8 = 2;

/// Address marker carried by bus-error frames.
const BUS_ERROR_ADDRESS: StandardId = StandardId::ZERO;

/// Address marker carried by decoder-fallback frames.
const DECODE_ERROR_ADDRESS: StandardId = match StandardId::new(1) {
    Some(id) => id,
    None => StandardId::ZERO,
};

//==================================================================================Configuration

/// Static configuration of one channel: the two acceptance-filter addresses
/// and the bit-timing preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    data_address: StandardId,
    command_address: StandardId,
    bitrate: Bitrate,
}

impl ChannelConfig {
    /// Build a configuration from the base data address and the offset of
    /// the command (remote-request) address. The chip exact-matches the
    /// base address into receive buffer 0 and `base + command_offset` into
    /// receive buffer 1.
    pub fn new(
        base_address: StandardId,
        command_offset: u16,
        bitrate: Bitrate,
    ) -> Result<Self, ConfigError> {
        let command_address = base_address
            .as_raw()
            .checked_add(command_offset)
            .and_then(StandardId::new)
            .ok_or(ConfigError::FilterOutOfRange)?;

        Ok(Self {
            data_address: base_address,
            command_address,
            bitrate,
        })
    }

    /// Address exact-matched into receive buffer 0.
    pub fn data_address(&self) -> StandardId {
        self.data_address
    }

    /// Address exact-matched into receive buffer 1.
    pub fn command_address(&self) -> StandardId {
        self.command_address
    }
}

//==================================================================================Receive events

/// Event classes decoded from the interrupt flag register, one per
/// invocation of [`CanChannel::receive`]. The classification priority is a
/// contract: a hard error always preempts pending frames, buffer 0 beats
/// buffer 1, and the message-error source comes last before the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiveEvent {
    /// The error interrupt is pending.
    HardError,
    /// A frame is waiting in the given receive buffer.
    BufferReceived(RxBuffer),
    /// The message-error (multi-receive) interrupt is pending.
    MultiError,
    /// No recognised source; only good for a broad acknowledge.
    Unknown,
}

/// Classify the highest-priority pending event in an interrupt flag byte.
pub const fn classify_interrupt(flags: u8) -> ReceiveEvent {
    if flags & irq::ERR != 0 {
        ReceiveEvent::HardError
    } else if flags & irq::RXB0 != 0 {
        ReceiveEvent::BufferReceived(RxBuffer::Rx0)
    } else if flags & irq::RXB1 != 0 {
        ReceiveEvent::BufferReceived(RxBuffer::Rx1)
    } else if flags & irq::MERR != 0 {
        ReceiveEvent::MultiError
    } else {
        ReceiveEvent::Unknown
    }
}

/// Non-destructive snapshot of the chip's flag and error-counter registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelDiagnostics {
    /// Raw interrupt flag register.
    pub interrupt_flags: u8,
    /// Raw error flag register.
    pub error_flags: u8,
    /// Transmit error counter.
    pub tx_errors: u8,
    /// Receive error counter.
    pub rx_errors: u8,
}

//==================================================================================Channel

/// Driver state for one chip.
pub struct CanChannel<L: SpiLink, T: ChipTimer> {
    port: RegisterPort<L>,
    timer: T,
    config: ChannelConfig,
    /// Most-recent-value frame record: overwritten by every receive, filled
    /// in by the application before a transmit.
    pub frame: Frame,
    /// Last identifier configured into each hardware mailbox; `None` marks
    /// a mailbox whose identifier registers were never written.
    mailbox_addresses: [Option<StandardId>; 3],
    tx_count: u32,
    rx_count: u32,
}

impl<L: SpiLink, T: ChipTimer> CanChannel<L, T> {
    /// Assemble a channel over an initialised serial link. The chip itself
    /// is untouched until [`CanChannel::init`] runs.
    pub fn new(link: L, timer: T, config: ChannelConfig) -> Self {
        Self {
            port: RegisterPort::new(link),
            timer,
            config,
            frame: Frame::new(),
            mailbox_addresses: [None; 3],
            tx_count: 0,
            rx_count: 0,
        }
    }

    /// Number of transmit attempts so far. Advances even when a saturated
    /// chip forced a frame to be dropped, so a caller comparing expected
    /// against observed traffic can detect the drop.
    pub fn tx_count(&self) -> u32 {
        self.tx_count
    }

    /// Number of data frames and remote requests received so far.
    pub fn rx_count(&self) -> u32 {
        self.rx_count
    }

    /// Identifier currently cached for a hardware mailbox.
    pub fn mailbox_address(&self, mailbox: Mailbox) -> Option<StandardId> {
        self.mailbox_addresses[mailbox.index()]
    }

    /// Active configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    //==============================================================================Init

    /// Drive the chip from power-on into configured normal operating mode.
    ///
    /// The sequence is order-significant and fire-and-forget: no step reads
    /// its work back, and there is no recovery path if the chip does not
    /// come up.
    pub async fn init(&mut self) -> Result<(), ChannelError<L::Error>> {
        self.init_sequence().await.map_err(ChannelError::Link)
    }

    async fn init_sequence(&mut self) -> Result<(), L::Error> {
        self.port.reset().await?;
        self.timer.delay_ms(RESET_SETTLE_MS).await;

        // Clock output divider: CLKOUT = system clock / 4.
        self.port.modify(Register::Canctrl, 0x03, 0x02).await?;

        // One pass over the contiguous CNF3..EFLG block: bit timing,
        // interrupt enables, and a clear of any stale flag bits.
        let [cnf3, cnf2, cnf1] = self.config.bitrate.cnf();
        let timing = [cnf3, cnf2, cnf1, irq::ENABLED, 0x00, 0x00];
        self.port.write(Register::Cnf3, &timing).await?;

        // Filters 0..2: filter 0 exact-matches the data address into
        // buffer 0, filter 2 exact-matches the command address into
        // buffer 1, filter 1 stays unused.
        let (data_h, data_l) = sid_to_bytes(self.config.data_address);
        let (cmd_h, cmd_l) = sid_to_bytes(self.config.command_address);
        let filters = [
            data_h, data_l, 0x00, 0x00, // RXF0
            0x00, 0x00, 0x00, 0x00, // RXF1
            cmd_h, cmd_l, 0x00, 0x00, // RXF2
        ];
        self.port.write(Register::Rxf0Sidh, &filters).await?;

        // Filters 3..5 disabled.
        self.port.write(Register::Rxf3Sidh, &[0u8; 12]).await?;

        // Mask 0 requires the full 11-bit identifier to match; mask 1 only
        // the upper six bits (block-level match, lower five bits ignored).
        let masks = [
            0xFF, 0xE0, 0x00, 0x00, // RXM0
            0xFC, 0x00, 0x00, 0x00, // RXM1
        ];
        self.port.write(Register::Rxm0Sidh, &masks).await?;

        // Enable filters plus buffer-0 rollover, then both interrupt pins.
        self.port
            .write(Register::Rxb0Ctrl, &[RXB_CTRL_FILTERS_ROLLOVER])
            .await?;
        self.port
            .write(Register::Rxb1Ctrl, &[RXB_CTRL_FILTERS_ROLLOVER])
            .await?;
        self.port
            .write(Register::Bfpctrl, &[BFP_RX_PINS_ENABLED])
            .await?;

        // Clear the request-mode bits: leave configuration mode for normal
        // operating mode.
        self.port.modify(Register::Canctrl, 0xE0, 0x00).await?;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "CAN channel up: data filter {:#x}, command filter {:#x}",
            self.config.data_address.as_raw(),
            self.config.command_address.as_raw()
        );

        Ok(())
    }

    //==============================================================================Receive

    /// Decode and acknowledge the highest-priority pending interrupt
    /// source. Run once per interrupt signal.
    ///
    /// The decoded frame overwrites [`CanChannel::frame`] and is also
    /// returned so the interrupt handler can push it into the inbound
    /// queue. Lower-priority sources keep their flag bits set and produce
    /// the next invocation.
    pub async fn receive(&mut self) -> Result<Frame, ChannelError<L::Error>> {
        self.receive_sequence().await.map_err(ChannelError::Link)?;
        Ok(self.frame)
    }

    async fn receive_sequence(&mut self) -> Result<(), L::Error> {
        let mut flags = [0u8];
        self.port.read(Register::Canintf, &mut flags).await?;
        let flags = flags[0];

        match classify_interrupt(flags) {
            ReceiveEvent::HardError => {
                self.read_error_registers(flags, FrameStatus::Error).await?;
                self.port.modify(Register::Canintf, irq::ERR, 0x00).await?;
            }
            ReceiveEvent::BufferReceived(buffer) => {
                self.read_buffer(buffer).await?;
                self.port
                    .modify(Register::Canintf, buffer.irq_bit(), 0x00)
                    .await?;
            }
            ReceiveEvent::MultiError => {
                self.read_error_registers(flags, FrameStatus::MultiError)
                    .await?;
                self.port.modify(Register::Canintf, irq::MERR, 0x00).await?;
            }
            ReceiveEvent::Unknown => {
                let mut data = [0u8; PAYLOAD_LEN];
                data[0] = flags;
                self.frame = Frame {
                    status: FrameStatus::FrameError,
                    address: DECODE_ERROR_ADDRESS,
                    data,
                };
                // Nothing identifiable to acknowledge: clear everything.
                self.port.modify(Register::Canintf, 0xFF, 0x00).await?;
            }
        }

        // A second error can become pending between the first flag read and
        // its acknowledgment; re-check before leaving interrupt context.
        let mut flags = [0u8];
        self.port.read(Register::Canintf, &mut flags).await?;
        if flags[0] & (irq::ERR | irq::MERR) != 0 {
            let mut eflg = [0u8];
            self.port.read(Register::Eflg, &mut eflg).await?;
            let mut counters = [0u8; 2];
            self.port.read(Register::Tec, &mut counters).await?;
            self.port.modify(Register::Eflg, eflg[0], 0x00).await?;
            self.port
                .modify(Register::Canintf, irq::ENABLED, 0x00)
                .await?;
        }

        Ok(())
    }

    /// Error branch shared by the hard-error and multi-error events: read
    /// the error flags and both counters, clear every error bit that was
    /// set, and preserve the raw registers in the frame payload.
    async fn read_error_registers(
        &mut self,
        flags: u8,
        status: FrameStatus,
    ) -> Result<(), L::Error> {
        let mut eflg = [0u8];
        self.port.read(Register::Eflg, &mut eflg).await?;
        let mut counters = [0u8; 2];
        self.port.read(Register::Tec, &mut counters).await?;

        // Write every set error bit back as a clear.
        self.port.modify(Register::Eflg, eflg[0], 0x00).await?;

        let mut data = [0u8; PAYLOAD_LEN];
        data[0] = flags;
        data[1] = eflg[0];
        data[2] = counters[0];
        data[3] = counters[1];
        self.frame = Frame {
            status,
            address: BUS_ERROR_ADDRESS,
            data,
        };

        #[cfg(feature = "defmt")]
        defmt::warn!(
            "bus error: eflg={:#x} tec={} rec={}",
            eflg[0],
            counters[0],
            counters[1]
        );

        Ok(())
    }

    /// Pull one frame out of a hardware receive buffer: control byte,
    /// identifier registers, DLC, then the eight data bytes.
    async fn read_buffer(&mut self, buffer: RxBuffer) -> Result<(), L::Error> {
        let mut raw = [0u8; 14];
        self.port.read(buffer.ctrl_register(), &mut raw).await?;

        let mut data = [0u8; PAYLOAD_LEN];
        let status = if raw[0] & RXB_CTRL_RTR == 0 {
            data.copy_from_slice(&raw[6..14]);
            FrameStatus::Ok
        } else {
            // Remote frame request: the data registers are irrelevant.
            FrameStatus::RemoteRequest
        };

        self.rx_count = self.rx_count.wrapping_add(1);
        self.frame = Frame {
            status,
            address: sid_from_bytes(raw[1], raw[2]),
            data,
        };

        Ok(())
    }

    //==============================================================================Transmit

    /// Send the staged [`CanChannel::frame`] as a data frame.
    ///
    /// A mailbox already configured with the frame's address is refreshed
    /// with the eight data bytes only; otherwise a never-used mailbox is
    /// claimed with the full 13-byte frame. Under contention the channel
    /// polls the chip status at most twice and then either steals the first
    /// idle mailbox or drops the frame. The transmit counter advances in
    /// every case, including the drop.
    pub async fn transmit(&mut self) -> Result<(), ChannelError<L::Error>> {
        self.transmit_sequence().await.map_err(ChannelError::Link)
    }

    async fn transmit_sequence(&mut self) -> Result<(), L::Error> {
        let address = self.frame.address;
        let image = Self::frame_image(address, dlc::LEN_8, self.frame.data);

        if let Some(mailbox) = self.cached_mailbox(address) {
            // Identifier registers already match: refresh the data only.
            self.port
                .write_tx(mailbox, BufferSegment::Data, &image[5..])
                .await?;
            self.port.request_to_send(mailbox).await?;
        } else if let Some(mailbox) = self.free_mailbox() {
            self.claim_and_send(mailbox, address, &image).await?;
        } else {
            // Every mailbox carries another address. Bounded wait: at most
            // two polls, then take whatever cleared, or give up.
            let mut polls = 0;
            while (self.port.read_status().await? & status::TX_ALL_PENDING)
                == status::TX_ALL_PENDING
                && polls < TX_POLL_LIMIT
            {
                self.timer.delay_ms(TX_POLL_DELAY_MS).await;
                polls += 1;
            }
            match self.idle_mailbox().await? {
                Some(mailbox) => self.claim_and_send(mailbox, address, &image).await?,
                None => {
                    // Dropped; the counter below still advances.
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "all mailboxes pending, frame {:#x} dropped",
                        address.as_raw()
                    );
                }
            }
        }

        self.tx_count = self.tx_count.wrapping_add(1);
        Ok(())
    }

    /// Send a remote frame request for the staged frame's address.
    ///
    /// All three mailbox DLC registers are switched to zero-length RTR
    /// framing first and restored afterwards regardless of which mailbox
    /// carried the request. Unlike a data transmit, the contention wait has
    /// no iteration cap: a remote request is never dropped for a busy chip.
    pub async fn send_remote_request(&mut self) -> Result<(), ChannelError<L::Error>> {
        self.remote_request_sequence()
            .await
            .map_err(ChannelError::Link)
    }

    async fn remote_request_sequence(&mut self) -> Result<(), L::Error> {
        for mailbox in Mailbox::ALL {
            self.port
                .modify(mailbox.dlc_register(), dlc::RTR_AND_LEN, dlc::RTR)
                .await?;
        }

        let address = self.frame.address;
        let image = Self::frame_image(address, dlc::RTR, [0; PAYLOAD_LEN]);

        if let Some(mailbox) = self.cached_mailbox(address) {
            self.port
                .write_tx(mailbox, BufferSegment::Data, &image[5..])
                .await?;
            self.port.request_to_send(mailbox).await?;
        } else if let Some(mailbox) = self.free_mailbox() {
            self.claim_and_send(mailbox, address, &image).await?;
        } else {
            // No cap here: wait until the chip frees a mailbox.
            while (self.port.read_status().await? & status::TX_ALL_PENDING)
                == status::TX_ALL_PENDING
            {}
            if let Some(mailbox) = self.idle_mailbox().await? {
                self.claim_and_send(mailbox, address, &image).await?;
            }
        }

        self.tx_count = self.tx_count.wrapping_add(1);

        // Back to eight-byte data framing on all three mailboxes.
        for mailbox in Mailbox::ALL {
            self.port
                .modify(mailbox.dlc_register(), dlc::RTR, dlc::LEN_8)
                .await?;
        }

        Ok(())
    }

    /// Stage the 13-byte transmit image: identifier pair, zeroed extended
    /// identifier bytes, DLC, then the payload.
    fn frame_image(address: StandardId, dlc_byte: u8, data: [u8; PAYLOAD_LEN]) -> [u8; 13] {
        let (sidh, sidl) = sid_to_bytes(address);
        let mut image = [0u8; 13];
        image[0] = sidh;
        image[1] = sidl;
        image[4] = dlc_byte;
        image[5..].copy_from_slice(&data);
        image
    }

    fn cached_mailbox(&self, address: StandardId) -> Option<Mailbox> {
        Mailbox::ALL
            .into_iter()
            .find(|mailbox| self.mailbox_addresses[mailbox.index()] == Some(address))
    }

    fn free_mailbox(&self) -> Option<Mailbox> {
        Mailbox::ALL
            .into_iter()
            .find(|mailbox| self.mailbox_addresses[mailbox.index()].is_none())
    }

    /// First mailbox whose transmit-pending bit reads clear, probing the
    /// status register freshly for each candidate.
    async fn idle_mailbox(&mut self) -> Result<Option<Mailbox>, L::Error> {
        for mailbox in Mailbox::ALL {
            if self.port.read_status().await? & mailbox.pending_bit() == 0 {
                return Ok(Some(mailbox));
            }
        }
        Ok(None)
    }

    /// Load a full frame into a mailbox, request the send, and record the
    /// mailbox's new identifier in the cache.
    async fn claim_and_send(
        &mut self,
        mailbox: Mailbox,
        address: StandardId,
        image: &[u8; 13],
    ) -> Result<(), L::Error> {
        self.port
            .write_tx(mailbox, BufferSegment::Full, image)
            .await?;
        self.port.request_to_send(mailbox).await?;
        self.mailbox_addresses[mailbox.index()] = Some(address);
        Ok(())
    }

    //==============================================================================Diagnostics

    /// Snapshot the interrupt flags, error flags, and both error counters
    /// without clearing anything.
    pub async fn read_diagnostics(&mut self) -> Result<ChannelDiagnostics, ChannelError<L::Error>> {
        self.diagnostics_sequence()
            .await
            .map_err(ChannelError::Link)
    }

    async fn diagnostics_sequence(&mut self) -> Result<ChannelDiagnostics, L::Error> {
        let mut flags = [0u8];
        self.port.read(Register::Canintf, &mut flags).await?;
        let mut eflg = [0u8];
        self.port.read(Register::Eflg, &mut eflg).await?;
        let mut counters = [0u8; 2];
        self.port.read(Register::Tec, &mut counters).await?;

        Ok(ChannelDiagnostics {
            interrupt_flags: flags[0],
            error_flags: eflg[0],
            tx_errors: counters[0],
            rx_errors: counters[1],
        })
    }
}
