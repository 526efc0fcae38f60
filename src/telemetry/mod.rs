//! Telemetry layer: maps inbound CAN addresses to packet text slots and
//! renders payloads as fixed-offset hexadecimal fields.
pub mod dispatch;
pub mod lookup;
pub mod packet;
