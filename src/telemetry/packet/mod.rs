//! Packet text buffers: fixed-width message slots guarded by a `filled`
//! bitmask.
//!
//! Each slot holds one preformatted telemetry line; the dispatcher renders
//! a payload into a slot only while its `filled` bit is clear, and the
//! external consumer clears the bit again once it has copied the text out.
//! That bit is the whole backpressure mechanism between the two.

use crate::core::PAYLOAD_LEN;
use crate::infra::hex;

/// Width of one message line.
pub const MESSAGE_LEN: usize = 30;

/// Width of the name field heading each message line.
pub const NAME_LEN: usize = 6;

/// Message line template. The name field is overwritten at construction,
/// the `H` runs at the two payload offsets on every fill.
const MESSAGE_TEMPLATE: &[u8; MESSAGE_LEN] = b"XXXXXX,0xHHHHHHHH,0xHHHHHHHH\r\n";

/// Byte offset of the digits for payload bytes 0..4.
const HIGH_WORD_OFFSET: usize = 9;

/// Byte offset of the digits for payload bytes 4..8.
const LOW_WORD_OFFSET: usize = 20;

/// Packet framing lines surrounding the message slots on the telemetry
/// link. Placeholders; the consumer stamps the time line before sending.
const PREAMBLE_TEMPLATE: &[u8; 8] = b"ABCDEF\r\n";
const TIME_TEMPLATE: &[u8; 17] = b"TL_TIM,HH:MM:SS\r\n";
const TRAILER_TEMPLATE: &[u8; 9] = b"UVWXYZ\r\n\0";

/// One preformatted telemetry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSlot {
    bytes: [u8; MESSAGE_LEN],
}

impl MessageSlot {
    /// Instantiate the template with a slot name. Names longer than the
    /// name field are truncated; shorter ones leave template padding.
    pub fn new(name: &str) -> Self {
        let mut bytes = *MESSAGE_TEMPLATE;
        let name = name.as_bytes();
        let len = name.len().min(NAME_LEN);
        bytes[..len].copy_from_slice(&name[..len]);
        Self { bytes }
    }

    /// Full line, including the trailing line terminator.
    pub fn as_bytes(&self) -> &[u8; MESSAGE_LEN] {
        &self.bytes
    }

    /// Render a payload into the two fixed hex fields: bytes 0..4 at the
    /// first offset pair, bytes 4..8 at the second.
    fn render_payload(&mut self, data: &[u8; PAYLOAD_LEN]) {
        hex::render_into(
            &data[..4],
            &mut self.bytes[HIGH_WORD_OFFSET..HIGH_WORD_OFFSET + 8],
        );
        hex::render_into(
            &data[4..],
            &mut self.bytes[LOW_WORD_OFFSET..LOW_WORD_OFFSET + 8],
        );
    }
}

/// A packet-class buffer: `SLOTS` message lines plus the framing text and
/// the `filled` bitmask (one bit per slot, assigned by the lookup table's
/// `position` masks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryPacket<const SLOTS: usize> {
    slots: [MessageSlot; SLOTS],
    filled: u32,
    /// Packet preamble line.
    pub preamble: [u8; 8],
    /// Time line, stamped by the consumer before transmission.
    pub time_message: [u8; 17],
    /// Packet trailer line.
    pub trailer: [u8; 9],
}

impl<const SLOTS: usize> TelemetryPacket<SLOTS> {
    /// Build the packet with one name per slot.
    pub fn new(names: [&str; SLOTS]) -> Self {
        Self {
            slots: core::array::from_fn(|i| MessageSlot::new(names[i])),
            filled: 0,
            preamble: *PREAMBLE_TEMPLATE,
            time_message: *TIME_TEMPLATE,
            trailer: *TRAILER_TEMPLATE,
        }
    }

    /// Whether the slot guarded by `position` holds unconsumed data.
    pub fn is_filled(&self, position: u32) -> bool {
        self.filled & position != 0
    }

    /// Current `filled` bitmask.
    pub fn filled_mask(&self) -> u32 {
        self.filled
    }

    /// Render a payload into the slot at `offset` and mark `position`
    /// filled. Returns `false` without touching the text when the slot
    /// still holds unconsumed data (or `offset` is out of range).
    pub fn try_fill(&mut self, offset: usize, position: u32, data: &[u8; PAYLOAD_LEN]) -> bool {
        if self.filled & position != 0 {
            return false;
        }
        let Some(slot) = self.slots.get_mut(offset) else {
            return false;
        };
        slot.render_payload(data);
        self.filled |= position;
        true
    }

    /// Consumer acknowledgment: release the slot guarded by `position` for
    /// the next fill. Without this call the dispatcher stops updating the
    /// slot permanently.
    pub fn clear(&mut self, position: u32) {
        self.filled &= !position;
    }

    /// Message line at `offset`.
    pub fn message(&self, offset: usize) -> Option<&[u8; MESSAGE_LEN]> {
        self.slots.get(offset).map(MessageSlot::as_bytes)
    }
}
