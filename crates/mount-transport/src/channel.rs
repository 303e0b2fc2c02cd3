//! The uniform channel contract
//!
//! The mount protocol is a one-shot request/response exchange of short ASCII
//! strings, so both backends expose the same small surface: open once, write
//! a command, poll [`Channel::read_existing`] for whatever response has been
//! buffered so far. The physical serial backend drains the OS receive buffer;
//! the UDP backend returns the payload of the most recently completed
//! datagram exchange.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// Bidirectional command channel to a mount
///
/// Payloads are 8-bit-clean ASCII: one byte per character in both
/// directions, never general text.
#[async_trait]
pub trait Channel: Send {
    /// Establish the channel
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Whether the channel has been opened
    fn is_open(&self) -> bool;

    /// Send a command
    async fn write(&mut self, data: &str) -> Result<(), TransportError>;

    /// Return whatever has been buffered since the last read, without blocking
    fn read_existing(&mut self) -> String;

    /// Drop pending inbound data
    fn discard_in_buffer(&mut self);

    /// Cancel the pending outbound operation
    fn discard_out_buffer(&mut self);

    /// Nominal duration a pending exchange is allowed before the caller
    /// should give up polling
    fn read_timeout(&self) -> Duration;
}

/// Encode a command string as raw bytes, one byte per character
pub(crate) fn encode_payload(data: &str) -> Vec<u8> {
    data.chars().map(|c| (c as u32 & 0xFF) as u8).collect()
}

/// Decode received bytes back to one character per byte
pub(crate) fn decode_payload(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
