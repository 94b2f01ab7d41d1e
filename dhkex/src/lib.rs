//! Unauthenticated finite-field Diffie-Hellman key exchange over TCP.
//!
//! The listening peer generates a prime modulus `p` and base `g`, sends
//! them to each connecting peer, and both sides swap public keys to
//! derive the same secret `g^(ab) mod p`. Values travel as decimal text in
//! length-prefixed frames (see [`dhkex_proto`]).
//!
//! There is no authentication: an active attacker on the wire can run a
//! separate exchange with each side.
//!
//! # Listening
//!
//! ```no_run
//! use dhkex::{Config, Listener};
//!
//! let config = Config::builder().port(11037).prime_bits(512).build()?;
//! Listener::bind(config)?.serve(|report| {
//!     println!("Shared secret: {}", report.shared_secret);
//! });
//! # Ok::<(), dhkex::Error>(())
//! ```
//!
//! # Connecting
//!
//! ```no_run
//! let config = dhkex::Config::default();
//! let report = dhkex::run_as_connector(&config, "127.0.0.1", 11037)?;
//! println!("Shared secret: {}", report.shared_secret);
//! # Ok::<(), dhkex::Error>(())
//! ```

mod channel;
mod client;
mod config;
mod error;
pub mod math;
mod server;
mod session;

pub use channel::Channel;
pub use client::run_as_connector;
pub use config::{Config, ConfigBuilder, Policy};
pub use dhkex_proto::{DEFAULT_BIND, DEFAULT_PORT, Field, Role};
pub use error::{Error, Result};
pub use server::{Listener, run_as_listener};
pub use session::{KeyPair, Params, Session, SessionReport, SessionState, exchange};
