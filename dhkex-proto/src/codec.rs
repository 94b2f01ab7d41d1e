//! Length-prefixed text frame codec over any `Read`/`Write` stream.
//!
//! Each frame is: `[u32 big-endian length][UTF-8 payload]`.

use std::io::{self, Read, Write};

/// Maximum allowed frame payload (1 MiB).
///
/// Payloads are decimal integers of a few hundred digits, so anything
/// near this limit is a corrupted or hostile stream.
pub const MAX_FRAME: u32 = 1024 * 1024;

/// Size of the length header in bytes.
const HEADER_LEN: usize = 4;

/// Writes `text` as a single length-prefixed frame to `w` and flushes.
///
/// Header and payload go out in one `write_all`, which retries short
/// writes until the whole frame is accepted or the stream fails.
pub fn send<W: Write>(w: &mut W, text: &str) -> io::Result<()> {
    let len = u32::try_from(text.len())
        .ok()
        .filter(|&n| n <= MAX_FRAME)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "frame exceeds 1 MiB limit"))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + text.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(text.as_bytes());
    w.write_all(&frame)?;
    w.flush()
}

/// Reads one length-prefixed frame from `r` and returns its text.
///
/// Fails with [`io::ErrorKind::UnexpectedEof`] if the stream ends inside the
/// header or payload, and with [`io::ErrorKind::InvalidData`] for an
/// oversized length or a payload that is not UTF-8.
pub fn recv(r: &mut impl Read) -> io::Result<String> {
    let mut buf = [0u8; HEADER_LEN];
    r.read_exact(&mut buf)?;
    let len = u32::from_be_bytes(buf);
    if len > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("declared frame length {len} exceeds 1 MiB limit"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    String::from_utf8(payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
