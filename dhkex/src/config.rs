//! Listener/connector configuration and the modulus policy.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use dhkex_proto::{DEFAULT_BIND, DEFAULT_PORT};

use crate::error::{Error, Result};
use crate::math::DEFAULT_ROUNDS;

/// How the generating peer picks its modulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Policy {
    /// Exact bit length of the generated modulus.
    pub prime_bits: u64,
    /// Miller-Rabin witnesses per candidate.
    pub rounds: u32,
}

impl Policy {
    /// Smallest accepted modulus size.
    pub const MIN_PRIME_BITS: u64 = 16;

    /// Default modulus size.
    pub const DEFAULT_PRIME_BITS: u64 = 512;

    /// Validates and creates a policy.
    pub fn new(prime_bits: u64, rounds: u32) -> Result<Self> {
        if prime_bits < Self::MIN_PRIME_BITS {
            return Err(Error::Config(format!(
                "modulus must be at least {} bits, got {prime_bits}",
                Self::MIN_PRIME_BITS
            )));
        }
        if rounds == 0 {
            return Err(Error::Config(
                "primality test needs at least one round".into(),
            ));
        }
        Ok(Self { prime_bits, rounds })
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            prime_bits: Self::DEFAULT_PRIME_BITS,
            rounds: DEFAULT_ROUNDS,
        }
    }
}

/// Settings shared by the listener and the connector.
///
/// Defaults: bind `127.0.0.1:11037`, 512-bit modulus, 40 rounds, no
/// timeouts (reads block until the peer sends or hangs up).
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the listener binds to.
    bind: String,
    /// Port to listen on.
    port: u16,
    /// Modulus policy for generated parameters.
    policy: Policy,
    /// Per-read timeout on session streams.
    read_timeout: Option<Duration>,
    /// Per-write timeout on session streams.
    write_timeout: Option<Duration>,
    /// Timeout for establishing an outgoing connection.
    connect_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_owned(),
            port: DEFAULT_PORT,
            policy: Policy::default(),
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

impl Config {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Listener bind address.
    pub fn bind(&self) -> &str {
        &self.bind
    }

    /// Listener port.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Modulus policy.
    pub const fn policy(&self) -> Policy {
        self.policy
    }

    /// Per-read timeout, if any.
    pub const fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Per-write timeout, if any.
    pub const fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    /// Connect timeout, if any.
    pub const fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Resolves the listener's bind address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        resolve(&self.bind, self.port)
    }

    /// Applies stream options to a freshly accepted or connected socket.
    pub(crate) fn prepare(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.write_timeout)?;
        stream.set_nodelay(true)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
#[must_use = "a ConfigBuilder does nothing until .build() is called"]
pub struct ConfigBuilder {
    /// Configuration under construction.
    config: Config,
    /// Bits requested via [`ConfigBuilder::prime_bits`].
    prime_bits: Option<u64>,
    /// Rounds requested via [`ConfigBuilder::rounds`].
    rounds: Option<u32>,
}

impl ConfigBuilder {
    /// Sets the listener bind address (default: `127.0.0.1`).
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.bind = addr.into();
        self
    }

    /// Sets the listener port (default: 11037). Port 0 picks an ephemeral port.
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the modulus bit length (default: 512).
    pub const fn prime_bits(mut self, bits: u64) -> Self {
        self.prime_bits = Some(bits);
        self
    }

    /// Sets the Miller-Rabin round count (default: 40).
    pub const fn rounds(mut self, rounds: u32) -> Self {
        self.rounds = Some(rounds);
        self
    }

    /// Sets the read, write and connect timeouts at once.
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self.config.write_timeout = Some(timeout);
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Sets the per-read timeout.
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Sets the per-write timeout.
    pub const fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Validates the settings and builds the [`Config`].
    pub fn build(self) -> Result<Config> {
        let mut config = self.config;
        if config.bind.trim().is_empty() {
            return Err(Error::Config("bind address is empty".into()));
        }
        config.policy = Policy::new(
            self.prime_bits.unwrap_or(config.policy.prime_bits),
            self.rounds.unwrap_or(config.policy.rounds),
        )?;
        for (name, t) in [
            ("read", config.read_timeout),
            ("write", config.write_timeout),
            ("connect", config.connect_timeout),
        ] {
            if t.is_some_and(|d| d.is_zero()) {
                return Err(Error::Config(format!("{name} timeout must be non-zero")));
            }
        }
        Ok(config)
    }
}

/// Resolves `host:port` to the first matching socket address.
pub(crate) fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::Config(format!("cannot resolve {host}:{port}: {e}")))?;
    addrs
        .next()
        .ok_or_else(|| Error::Config(format!("{host}:{port} resolved to no addresses")))
}
