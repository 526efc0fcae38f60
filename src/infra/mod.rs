//! Low-level infrastructure components shared by the telemetry layer.
pub mod hex;
