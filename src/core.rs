//! Core data types shared between the MCP2515 driver and the telemetry
//! dispatcher: the per-channel frame record and the inbound frame queue.

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embedded_can::StandardId;

/// Classic CAN payload length. The channel always transmits and receives
/// fixed eight-byte data frames.
pub const PAYLOAD_LEN: usize = 8;

/// Completion status attached to every decoded receive (and to frames staged
/// for transmission). Closed set; no other value is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameStatus {
    /// The channel has not completed a receive yet (chip not ready).
    #[default]
    NotReady,
    /// A standard data frame was received.
    Ok,
    /// A remote frame request was received; the payload is irrelevant.
    RemoteRequest,
    /// The chip reported a bus error. The payload carries the raw
    /// interrupt-flag, error-flag, and error-counter registers.
    Error,
    /// Same as [`FrameStatus::Error`] but raised by the message-error
    /// (multi-receive) interrupt source.
    MultiError,
    /// No recognised interrupt source matched; the payload carries the raw
    /// interrupt flags.
    FrameError,
}

/// Most-recent-value frame record. One instance lives in each channel and is
/// overwritten on every successful receive; the application fills it in
/// before requesting a transmit. Not a history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Outcome of the receive that produced this record.
    pub status: FrameStatus,
    /// 11-bit CAN identifier. Error records carry the reserved markers
    /// `0x000` (bus error) and `0x001` (decoder fallback).
    pub address: StandardId,
    /// Fixed eight-byte payload.
    pub data: [u8; PAYLOAD_LEN],
}

impl Frame {
    /// Empty record, as created at channel init.
    pub const fn new() -> Self {
        Self {
            status: FrameStatus::NotReady,
            address: StandardId::ZERO,
            data: [0; PAYLOAD_LEN],
        }
    }

    /// Stage an outbound data frame.
    pub const fn outbound(address: StandardId, data: [u8; PAYLOAD_LEN]) -> Self {
        Self {
            status: FrameStatus::Ok,
            address,
            data,
        }
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded FIFO carrying decoded frames from the receive interrupt context to
/// the background dispatch task. The interrupt side pushes with `try_send`
/// (an overrun drops the frame), the dispatcher pops with `try_receive`.
pub type FrameQueue<const N: usize> = Channel<CriticalSectionRawMutex, Frame, N>;
