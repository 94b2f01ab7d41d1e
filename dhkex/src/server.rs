//! TCP listener and per-connection session dispatch.

use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dhkex_proto::Role;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{Session, SessionReport};

/// Pause after a failed `accept` so a persistent error (e.g. `EMFILE`)
/// does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The parameter-generating peer: accepts connections and runs one
/// [`Role::Generator`] session per connection, each on its own thread.
#[derive(Debug)]
pub struct Listener {
    /// Bound socket.
    inner: TcpListener,
    /// Settings applied to every session.
    config: Arc<Config>,
}

impl Listener {
    /// Binds to `config.bind():config.port()`.
    pub fn bind(config: Config) -> Result<Self> {
        let addr = config.listen_addr()?;
        let inner = TcpListener::bind(addr)?;
        Ok(Self {
            inner,
            config: Arc::new(config),
        })
    }

    /// The bound address; useful when the port was 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accepts connections forever.
    ///
    /// `report` is called from the session's thread for every session that
    /// derives a secret. Failed sessions are logged and dropped; they never
    /// stop the loop.
    pub fn serve<F>(self, report: F) -> !
    where
        F: Fn(SessionReport) + Send + Sync + 'static,
    {
        let report = Arc::new(report);
        match self.inner.local_addr() {
            Ok(addr) => tracing::info!(%addr, bits = self.config.policy().prime_bits, "listening"),
            Err(e) => tracing::warn!(error = %e, "listening on unknown address"),
        }

        let mut next_id: u64 = 0;
        loop {
            let (stream, peer) = match self.inner.accept() {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    thread::sleep(ACCEPT_BACKOFF);
                    continue;
                }
            };
            next_id += 1;
            let config = Arc::clone(&self.config);
            let report = Arc::clone(&report);
            let spawned = thread::Builder::new()
                .name(format!("dhkex-session-{next_id}"))
                .spawn(move || {
                    let span = tracing::info_span!("session", id = next_id, %peer);
                    let _guard = span.enter();
                    handle(stream, peer, &config, &*report);
                });
            if let Err(e) = spawned {
                tracing::error!(%peer, error = %e, "cannot spawn session thread");
            }
        }
    }
}

/// Runs one generator session and reports or logs its outcome. The stream
/// is closed when this returns.
fn handle(stream: TcpStream, peer: SocketAddr, config: &Config, report: &dyn Fn(SessionReport)) {
    tracing::info!("connection accepted");
    let result = config
        .prepare(&stream)
        .map_err(Error::from)
        .and_then(|()| {
            Session::new(stream, Role::Generator, config.policy())
                .with_peer(peer)
                .run()
        });
    match result {
        Ok(r) => {
            tracing::info!(secret_bits = r.shared_secret.bits(), "shared secret derived");
            report(r);
        }
        Err(e) => tracing::warn!(error = %e, "session failed"),
    }
}

/// Binds a listener for `config` and serves until the process exits.
///
/// Only returns if binding fails.
pub fn run_as_listener<F>(config: Config, report: F) -> Result<Infallible>
where
    F: Fn(SessionReport) + Send + Sync + 'static,
{
    Listener::bind(config)?.serve(report)
}
