//! Wire protocol for the dhkex key exchange.
//!
//! Every value travels as decimal text framed with a 4-byte big-endian
//! length prefix, suitable for any reliable byte stream (TCP, Unix
//! socket, in-memory pipe).

mod codec;
mod message;

pub use codec::{MAX_FRAME, recv, send};
pub use message::{DEFAULT_BIND, DEFAULT_PORT, Field, Role};
