//! The connecting peer: one [`Role::Receiver`] session per call.

use std::net::TcpStream;

use dhkex_proto::Role;

use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::session::{Session, SessionReport};

/// Connects to `address:port` and runs a single session.
///
/// Address problems (port 0, unresolvable host) are reported as
/// [`Error::Config`] before any connection attempt. Everything after that
/// is a transport or protocol error from the session.
pub fn run_as_connector(config: &Config, address: &str, port: u16) -> Result<SessionReport> {
    if port == 0 {
        return Err(Error::Config("cannot connect to port 0".into()));
    }
    let addr = config::resolve(address, port)?;

    tracing::info!(%addr, "connecting");
    let stream = match config.connect_timeout() {
        Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
        None => TcpStream::connect(addr)?,
    };
    config.prepare(&stream)?;

    let report = Session::new(stream, Role::Receiver, config.policy())
        .with_peer(addr)
        .run()?;
    tracing::info!(secret_bits = report.shared_secret.bits(), "shared secret derived");
    Ok(report)
}
