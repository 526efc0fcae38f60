//! MCP2515 driver. Leaf-first: the register map and command constants, the
//! serial-link/timer traits, the SPI register protocol, and the channel
//! logic built on top of it (initialisation, receive event decoding, and
//! mailbox transmission).
pub mod channel;
pub mod port;
pub mod registers;
pub mod traits;
