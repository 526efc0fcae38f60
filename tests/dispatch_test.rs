//! End-to-end path: decoded frames travel through the inbound queue and
//! land as hex text in the packet buffers.
mod helpers;

use embedded_can::StandardId;
use helpers::{MockChip, MockTimer};
use heliocan::core::{Frame, FrameQueue};
use heliocan::driver::channel::{CanChannel, ChannelConfig};
use heliocan::driver::registers::Bitrate;
use heliocan::telemetry::dispatch::{DispatchOutcome, Dispatcher, TelemetryStore};
use heliocan::telemetry::lookup::{LookupRow, PacketClass};
use static_cell::StaticCell;

fn id(raw: u16) -> StandardId {
    StandardId::new(raw).unwrap()
}

fn table() -> [LookupRow; 2] {
    [
        LookupRow::new(id(0x403), 0, 0x01, PacketClass::HighFrequency, 0),
        LookupRow::new(id(0x410), 0, 0x01, PacketClass::Status, 1),
    ]
}

fn store() -> TelemetryStore<2, 1, 1> {
    TelemetryStore::new(["MC_VEL", "MC_CUR"], ["BC_VLT"], ["MP_STA"])
}

static QUEUE: StaticCell<FrameQueue<8>> = StaticCell::new();

#[tokio::test]
async fn received_frame_renders_into_packet_text() {
    let queue = QUEUE.init(FrameQueue::new());
    let chip = MockChip::new();
    let config = ChannelConfig::new(id(0x400), 0x10, Bitrate::Kbps125).unwrap();
    let mut channel = CanChannel::new(chip.clone(), MockTimer::new(), config);

    // Address 0x403 with a recognisable payload arrives in buffer 0.
    chip.load_rx_frame(
        0,
        0x00,
        0x80,
        0x60,
        [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF],
    );
    let frame = channel.receive().await.unwrap();
    queue.try_send(frame).unwrap();

    let table = table();
    let dispatcher = Dispatcher::new(&table);
    let mut store = store();
    assert_eq!(dispatcher.drain(queue, &mut store), 1);

    let line = store.high_frequency.message(0).unwrap();
    assert_eq!(&line[..], b"MC_VEL,0x01234567,0x89ABCDEF\r\n");
    assert!(store.high_frequency.is_filled(0x01));
}

#[tokio::test]
async fn slot_backpressure_survives_queue_draining() {
    let queue: FrameQueue<4> = FrameQueue::new();
    let table = table();
    let dispatcher = Dispatcher::new(&table);
    let mut store = store();

    queue.try_send(Frame::outbound(id(0x403), [0x11; 8])).unwrap();
    queue.try_send(Frame::outbound(id(0x403), [0x22; 8])).unwrap();
    assert_eq!(dispatcher.drain(&queue, &mut store), 1);

    // The second frame found the slot busy and was dropped.
    assert_eq!(&store.high_frequency.message(0).unwrap()[9..17], b"11111111");

    // After the consumer clears the bit, the next drain fills again.
    store.high_frequency.clear(0x01);
    queue.try_send(Frame::outbound(id(0x403), [0x33; 8])).unwrap();
    assert_eq!(dispatcher.drain(&queue, &mut store), 1);
    assert_eq!(&store.high_frequency.message(0).unwrap()[9..17], b"33333333");
}

#[tokio::test]
async fn unrecognised_addresses_fall_through() {
    let queue: FrameQueue<4> = FrameQueue::new();
    let table = table();
    let dispatcher = Dispatcher::new(&table);
    let mut store = store();
    let untouched = store;

    queue.try_send(Frame::outbound(id(0x123), [0xFF; 8])).unwrap();
    assert_eq!(dispatcher.drain(&queue, &mut store), 0);
    assert_eq!(store, untouched);
}

#[tokio::test]
async fn command_address_routes_to_status_packet() {
    let table = table();
    let dispatcher = Dispatcher::new(&table);
    let mut store = store();

    let outcome = dispatcher.dispatch(&mut store, &Frame::outbound(id(0x410), [0xC0; 8]));
    assert_eq!(
        outcome,
        DispatchOutcome::Routed {
            class: PacketClass::Status,
            offset: 0
        }
    );
    assert_eq!(&store.status.message(0).unwrap()[..6], b"MP_STA");
}
