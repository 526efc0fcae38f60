//! Static address lookup table: one row per known CAN address, searched
//! linearly on every dispatched frame.

use embedded_can::StandardId;

/// Destination packet class for a routed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketClass {
    /// High-frequency measurement packet.
    HighFrequency,
    /// Low-frequency measurement packet.
    LowFrequency,
    /// Status packet.
    Status,
}

/// One routing entry. Tables are supplied by the integrator as static data;
/// each address must appear at most once, the first match wins and the row
/// order is meaningless otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupRow {
    /// Inbound 11-bit CAN address.
    pub address: StandardId,
    /// Slot index inside the destination packet's message array.
    pub offset: usize,
    /// Single-bit mask into the destination packet's `filled` bitmask.
    pub position: u32,
    /// Destination packet class.
    pub class: PacketClass,
    /// Ordinal used by table maintainers to keep rows in scan priority;
    /// carried as data, not interpreted by the dispatcher.
    pub priority: u8,
}

impl LookupRow {
    /// Build a row.
    pub const fn new(
        address: StandardId,
        offset: usize,
        position: u32,
        class: PacketClass,
        priority: u8,
    ) -> Self {
        Self {
            address,
            offset,
            position,
            class,
            priority,
        }
    }
}

/// Linear first-match search over the table. `None` means the address is
/// unknown and the frame is to be dropped silently.
pub fn find(table: &[LookupRow], address: StandardId) -> Option<&LookupRow> {
    table.iter().find(|row| row.address == address)
}
