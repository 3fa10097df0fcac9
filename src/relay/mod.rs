//! Delayed echo relay.
//!
//! Connects to a single peer and echoes each newline-terminated line back
//! after a random pause, simulating network jitter:
//!
//! ```text
//! Peer sends:   hello\n
//! Relay logs:   Delaying for 42.17 ms
//! Relay sends:  hello\n
//! ```
//!
//! Trailing whitespace is stripped before echoing and lines that are blank
//! after stripping get no reply. Any connection failure ends the relay; there
//! is no reconnect.

pub mod handler;
pub mod jitter;
pub mod parser;

pub use handler::{connect, Relay};
pub use jitter::UniformJitter;
