//! Framed text channel over a blocking byte stream.

use std::io::{Read, Write};

use dhkex_proto::Field;
use num_bigint::BigUint;

use crate::error::{Error, Result};

/// A bidirectional stream that carries one [`dhkex_proto`] frame per value.
///
/// Every I/O failure, including malformed framing, surfaces as
/// [`Error::Transport`]. Values that frame correctly but do not parse
/// surface as [`Error::Protocol`].
#[derive(Debug)]
pub struct Channel<S> {
    /// The underlying stream.
    stream: S,
}

impl<S: Read + Write> Channel<S> {
    /// Wraps `stream`.
    pub const fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Sends `text` as one frame.
    pub fn send(&mut self, text: &str) -> Result<()> {
        Ok(dhkex_proto::send(&mut self.stream, text)?)
    }

    /// Blocks until one complete frame arrives and returns its text.
    pub fn recv(&mut self) -> Result<String> {
        Ok(dhkex_proto::recv(&mut self.stream)?)
    }

    /// Sends `value` as a decimal frame.
    pub fn send_int(&mut self, value: &BigUint) -> Result<()> {
        self.send(&value.to_str_radix(10))
    }

    /// Receives a decimal frame and parses it as `field`.
    pub fn recv_int(&mut self, field: Field) -> Result<BigUint> {
        let text = self.recv()?;
        parse_decimal(field, &text)
    }

    /// Returns a reference to the underlying stream.
    pub const fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwraps the channel, returning the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Parses a plain decimal string: ASCII digits only, no sign, no
/// separators, no whitespace.
pub(crate) fn parse_decimal(field: Field, text: &str) -> Result<BigUint> {
    if text.is_empty() {
        return Err(Error::protocol(field, "empty value"));
    }
    if let Some(c) = text.chars().find(|c| !c.is_ascii_digit()) {
        return Err(Error::protocol(field, format!("unexpected character {c:?}")));
    }
    BigUint::parse_bytes(text.as_bytes(), 10)
        .ok_or_else(|| Error::protocol(field, "not a decimal integer"))
}
