//! Error definitions shared across library modules.
//! The driver surfaces exactly two failure domains: serial link transfers
//! and channel configuration. Chip-reported bus errors are not errors at
//! this level; they travel as [`FrameStatus`](crate::core::FrameStatus)
//! values with the raw registers preserved for the caller.
use thiserror_no_std::Error;

#[derive(Error, Debug)]
/// Errors raised while driving the chip over the serial link.
pub enum ChannelError<E: core::fmt::Debug> {
    /// The byte-exchange primitive failed mid-command. The chip select was
    /// released before this error was returned.
    #[error("serial link transfer failed: {0:?}")]
    Link(E),
}

#[derive(Error, Debug)]
/// Errors detected while validating a channel configuration.
pub enum ConfigError {
    /// The base address plus the command offset does not fit in the 11-bit
    /// identifier range, so the second acceptance filter cannot be built.
    #[error("filter address exceeds the 11-bit identifier range")]
    FilterOutOfRange,
}
