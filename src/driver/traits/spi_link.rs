//! Minimal abstraction for the byte-oriented serial link to the chip.
//! Allows the driver to plug into various implementations (embedded HAL SPI
//! peripherals, bit-banged ports, test doubles).
use futures_util::Future;

/// Contract for shifting bytes to and from one chip over its dedicated
/// select line. Implementations own the select pin; the driver brackets
/// every chip command with `select`/`deselect` and never interleaves two
/// commands on the same link.
pub trait SpiLink {
    type Error: core::fmt::Debug;

    /// Assert the chip select line.
    fn select(&mut self);

    /// Release the chip select line.
    fn deselect(&mut self);

    /// Shift one byte out, discarding whatever the chip shifts back.
    fn transmit(&mut self, byte: u8) -> impl Future<Output = Result<(), Self::Error>>;

    /// Shift one byte out and return the byte shifted back in.
    fn exchange(&mut self, byte: u8) -> impl Future<Output = Result<u8, Self::Error>>;
}
