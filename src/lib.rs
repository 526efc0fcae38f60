//! `heliocan` library: driver and dispatch logic for the MCP2515 CAN
//! transceiver in a `no_std` environment. The crate exposes the chip driver
//! (SPI register protocol, channel bring-up, receive event decoding, mailbox
//! transmission) and the telemetry layer that routes inbound frames into
//! preformatted text buffers.
#![no_std]
//==================================================================================
/// Core data types shared by the driver and the telemetry dispatcher.
pub mod core;
/// MCP2515 driver: register protocol, channel initialisation, receive event
/// decoding, and mailbox transmission.
pub mod driver;
/// Domain and low-level errors (serial link failures, channel configuration).
pub mod error;
/// Low-level helpers: hexadecimal ASCII rendering of payload bytes.
pub mod infra;
/// Telemetry layer: address lookup table, packet text buffers, and the
/// dispatcher draining the inbound frame queue.
pub mod telemetry;
//==================================================================================
