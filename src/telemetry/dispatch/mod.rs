//! Dispatcher draining the inbound frame queue: looks each frame's address
//! up in the static table and renders its payload into the matching packet
//! slot, honouring the `filled`-bit backpressure.

use crate::core::{Frame, FrameQueue};
use crate::telemetry::lookup::{self, LookupRow, PacketClass};
use crate::telemetry::packet::TelemetryPacket;

/// The three packet-class buffers one channel feeds. Slot counts are fixed
/// per deployment by the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryStore<const HF: usize, const LF: usize, const ST: usize> {
    pub high_frequency: TelemetryPacket<HF>,
    pub low_frequency: TelemetryPacket<LF>,
    pub status: TelemetryPacket<ST>,
}

impl<const HF: usize, const LF: usize, const ST: usize> TelemetryStore<HF, LF, ST> {
    /// Build the three packets with their slot names.
    pub fn new(
        high_frequency_names: [&str; HF],
        low_frequency_names: [&str; LF],
        status_names: [&str; ST],
    ) -> Self {
        Self {
            high_frequency: TelemetryPacket::new(high_frequency_names),
            low_frequency: TelemetryPacket::new(low_frequency_names),
            status: TelemetryPacket::new(status_names),
        }
    }
}

/// What happened to one dispatched frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchOutcome {
    /// Rendered into the recorded class and slot.
    Routed { class: PacketClass, offset: usize },
    /// Address absent from the table; frame dropped.
    UnknownAddress,
    /// Destination slot still holds unconsumed data; frame dropped, text
    /// untouched.
    SlotBusy,
}

/// Routes frames against a static lookup table.
pub struct Dispatcher<'a> {
    table: &'a [LookupRow],
}

impl<'a> Dispatcher<'a> {
    /// Wrap a routing table. Each address must appear at most once.
    pub const fn new(table: &'a [LookupRow]) -> Self {
        Self { table }
    }

    /// Route one frame. Frame status is not consulted: error records carry
    /// the reserved marker addresses, which a routing table does not
    /// contain, so they fall out as [`DispatchOutcome::UnknownAddress`].
    pub fn dispatch<const HF: usize, const LF: usize, const ST: usize>(
        &self,
        store: &mut TelemetryStore<HF, LF, ST>,
        frame: &Frame,
    ) -> DispatchOutcome {
        let Some(row) = lookup::find(self.table, frame.address) else {
            return DispatchOutcome::UnknownAddress;
        };

        let filled = match row.class {
            PacketClass::HighFrequency => {
                store
                    .high_frequency
                    .try_fill(row.offset, row.position, &frame.data)
            }
            PacketClass::LowFrequency => {
                store
                    .low_frequency
                    .try_fill(row.offset, row.position, &frame.data)
            }
            PacketClass::Status => store.status.try_fill(row.offset, row.position, &frame.data),
        };

        if filled {
            DispatchOutcome::Routed {
                class: row.class,
                offset: row.offset,
            }
        } else {
            #[cfg(feature = "defmt")]
            defmt::trace!("slot busy, frame {:#x} dropped", frame.address.as_raw());
            DispatchOutcome::SlotBusy
        }
    }

    /// Drain the inbound queue without blocking: pop until empty, dispatch
    /// each frame, and report how many were routed.
    pub fn drain<const N: usize, const HF: usize, const LF: usize, const ST: usize>(
        &self,
        queue: &FrameQueue<N>,
        store: &mut TelemetryStore<HF, LF, ST>,
    ) -> usize {
        let mut routed = 0;
        while let Ok(frame) = queue.try_receive() {
            if matches!(
                self.dispatch(store, &frame),
                DispatchOutcome::Routed { .. }
            ) {
                routed += 1;
            }
        }
        routed
    }
}
