//! The key exchange itself: one state machine for both roles.
//!
//! ```text
//! generator: Idle → ParamsExchanged → KeysExchanged → SecretDerived
//! receiver:  Idle → ParamsReceived  → KeysExchanged → SecretDerived
//! ```
//!
//! Any error moves the session to [`SessionState::Failed`]. Nothing is
//! retried; the caller drops the session and its stream.

use std::fmt;
use std::io::{Read, Write};
use std::net::SocketAddr;

use dhkex_proto::{Field, Role};
use num_bigint::BigUint;
use num_traits::One;
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};
use serde::{Serialize, Serializer};

use crate::channel::Channel;
use crate::config::Policy;
use crate::error::{Error, Result};
use crate::math;

/// Progress of a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionState {
    /// Nothing exchanged yet.
    Idle,
    /// Generator: modulus and base sent.
    ParamsExchanged,
    /// Receiver: modulus and base received.
    ParamsReceived,
    /// Public keys swapped.
    KeysExchanged,
    /// Shared secret computed.
    SecretDerived,
    /// A transport, protocol or generation error ended the session.
    Failed,
}

/// Group parameters: a prime modulus `p` and a base `g` in `[2, p - 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Params {
    /// The prime modulus `p`.
    pub modulus: BigUint,
    /// The base `g`.
    pub base: BigUint,
}

impl Params {
    /// Generates fresh parameters under `policy`.
    pub fn generate(policy: Policy) -> Result<Self> {
        Self::generate_with(&mut OsRng, policy)
    }

    /// [`Params::generate`] with an explicit generator.
    pub fn generate_with<R: Rng + CryptoRng + ?Sized>(rng: &mut R, policy: Policy) -> Result<Self> {
        let modulus = math::generate_prime_with(rng, policy.prime_bits, policy.rounds)?;
        let base = math::random_in_with(rng, &BigUint::from(2u32), &modulus)?;
        Ok(Self { modulus, base })
    }

    /// Checks received parameters: `p ≥ 3` and `2 ≤ g < p`.
    ///
    /// Primality of `p` is not rechecked; the peer is trusted to be honest.
    pub fn new(modulus: BigUint, base: BigUint) -> Result<Self> {
        if modulus < BigUint::from(3u32) {
            return Err(Error::protocol(Field::Modulus, format!("{modulus} is below 3")));
        }
        if base < BigUint::from(2u32) || base >= modulus {
            return Err(Error::protocol(Field::Base, "outside [2, p - 1]"));
        }
        Ok(Self { modulus, base })
    }
}

/// A private exponent and its public key `g^x mod p`.
///
/// `Debug` never prints the private exponent.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Private exponent in `[1, p - 1]`.
    private: BigUint,
    /// `base^private mod modulus`.
    public: BigUint,
}

impl KeyPair {
    /// Draws a private exponent for `params` and derives its public key.
    pub fn generate(params: &Params) -> Result<Self> {
        Self::generate_with(&mut OsRng, params)
    }

    /// [`KeyPair::generate`] with an explicit generator.
    pub fn generate_with<R: Rng + CryptoRng + ?Sized>(rng: &mut R, params: &Params) -> Result<Self> {
        let private = math::random_in_with(rng, &BigUint::one(), &params.modulus)?;
        Ok(Self::from_private(params, private))
    }

    /// Derives the key pair for a known private exponent.
    pub fn from_private(params: &Params, private: BigUint) -> Self {
        let public = math::mod_exp(&params.base, &private, &params.modulus);
        Self { private, public }
    }

    /// The public key to send to the peer.
    pub const fn public_key(&self) -> &BigUint {
        &self.public
    }

    /// Computes `peer_public^private mod p`.
    pub fn shared_secret(&self, params: &Params, peer_public: &BigUint) -> BigUint {
        math::mod_exp(peer_public, &self.private, &params.modulus)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private", &"<redacted>")
            .field("public", &self.public)
            .finish()
    }
}

/// Result of a successful session, handed to the reporting callback.
///
/// Integers serialise as decimal strings. The private key is not included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct SessionReport {
    /// Role this side played.
    pub role: Role,
    /// Remote address, when the stream is a socket.
    pub peer: Option<SocketAddr>,
    /// The prime modulus `p`.
    #[serde(serialize_with = "decimal")]
    pub modulus: BigUint,
    /// The base `g`.
    #[serde(serialize_with = "decimal")]
    pub base: BigUint,
    /// This side's public key.
    #[serde(serialize_with = "decimal")]
    pub public_key: BigUint,
    /// The peer's public key.
    #[serde(serialize_with = "decimal")]
    pub peer_public_key: BigUint,
    /// The derived shared secret.
    #[serde(serialize_with = "decimal")]
    pub shared_secret: BigUint,
}

/// Serialises a [`BigUint`] as a decimal string.
fn decimal<S: Serializer>(value: &BigUint, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(value)
}

/// One connection's run of the exchange.
///
/// Fields fill in as steps complete and are dropped with the session.
#[derive(Debug)]
pub struct Session<S> {
    /// Framed transport.
    channel: Channel<S>,
    /// Which side this is.
    role: Role,
    /// Modulus policy (generator only).
    policy: Policy,
    /// Remote address for reporting.
    peer: Option<SocketAddr>,
    /// Current state.
    state: SessionState,
    /// Agreed group parameters.
    params: Option<Params>,
    /// This side's key pair.
    keys: Option<KeyPair>,
    /// The peer's public key.
    peer_public: Option<BigUint>,
    /// The derived secret.
    secret: Option<BigUint>,
}

impl<S: Read + Write> Session<S> {
    /// Creates an idle session over `stream`.
    pub const fn new(stream: S, role: Role, policy: Policy) -> Self {
        Self {
            channel: Channel::new(stream),
            role,
            policy,
            peer: None,
            state: SessionState::Idle,
            params: None,
            keys: None,
            peer_public: None,
            secret: None,
        }
    }

    /// Records the remote address for the report.
    #[must_use]
    pub const fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Current state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Role of this side.
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Runs every step to completion or failure.
    ///
    /// Calling it again after it returned is an error; a session runs once.
    pub fn run(&mut self) -> Result<SessionReport> {
        if self.state != SessionState::Idle {
            return Err(Error::Transport(std::io::Error::other(format!(
                "session already ran (state {:?})",
                self.state
            ))));
        }
        let result = self.drive();
        if let Err(e) = &result {
            tracing::debug!(role = %self.role, from = ?self.state, error = %e, "session failed");
            self.state = SessionState::Failed;
        }
        result
    }

    /// The step sequence. Both roles share everything after the parameters.
    fn drive(&mut self) -> Result<SessionReport> {
        let params = if self.role.sends_params() {
            self.send_params()?
        } else {
            self.receive_params()?
        };

        let keys = KeyPair::generate(&params)?;
        let peer_public = self.swap_public_keys(&params, keys.public_key())?;

        let secret = keys.shared_secret(&params, &peer_public);
        let report = SessionReport {
            role: self.role,
            peer: self.peer,
            modulus: params.modulus.clone(),
            base: params.base.clone(),
            public_key: keys.public_key().clone(),
            peer_public_key: peer_public.clone(),
            shared_secret: secret.clone(),
        };
        self.keys = Some(keys);
        self.peer_public = Some(peer_public);
        self.secret = Some(secret);
        self.advance(SessionState::SecretDerived);
        Ok(report)
    }

    /// Generator: pick `p` and `g`, send modulus then base.
    fn send_params(&mut self) -> Result<Params> {
        let params = Params::generate(self.policy)?;
        tracing::debug!(bits = params.modulus.bits(), "generated parameters");
        self.channel.send_int(&params.modulus)?;
        self.channel.send_int(&params.base)?;
        self.params = Some(params.clone());
        self.advance(SessionState::ParamsExchanged);
        Ok(params)
    }

    /// Receiver: read modulus then base and validate them.
    fn receive_params(&mut self) -> Result<Params> {
        let modulus = self.channel.recv_int(Field::Modulus)?;
        let base = self.channel.recv_int(Field::Base)?;
        let params = Params::new(modulus, base)?;
        tracing::debug!(bits = params.modulus.bits(), "received parameters");
        self.params = Some(params.clone());
        self.advance(SessionState::ParamsReceived);
        Ok(params)
    }

    /// Sends our public key, then reads the peer's. Both sides send first,
    /// so neither blocks waiting on the other.
    fn swap_public_keys(&mut self, params: &Params, own: &BigUint) -> Result<BigUint> {
        self.channel.send_int(own)?;
        let peer = self.channel.recv_int(Field::PublicKey)?;
        if peer < BigUint::one() || peer >= params.modulus {
            return Err(Error::protocol(Field::PublicKey, "outside [1, p - 1]"));
        }
        self.advance(SessionState::KeysExchanged);
        Ok(peer)
    }

    /// Moves to `next`, logging the transition.
    fn advance(&mut self, next: SessionState) {
        tracing::debug!(role = %self.role, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// The agreed parameters, once exchanged.
    pub const fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }

    /// The derived secret, once computed.
    pub const fn shared_secret(&self) -> Option<&BigUint> {
        self.secret.as_ref()
    }

    /// Unwraps the session, returning the underlying stream.
    pub fn into_inner(self) -> S {
        self.channel.into_inner()
    }
}

/// Runs one complete session over `stream`.
pub fn exchange<S: Read + Write>(stream: S, role: Role, policy: Policy) -> Result<SessionReport> {
    Session::new(stream, role, policy).run()
}

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn policy() -> Policy {
        Policy::new(64, 20).unwrap()
    }

    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    #[test]
    fn both_roles_derive_the_same_secret() {
        let (server, client) = tcp_pair();
        let generator = thread::spawn(move || exchange(server, Role::Generator, policy()));
        let receiver = exchange(client, Role::Receiver, policy()).unwrap();
        let generator = generator.join().unwrap().unwrap();

        assert_eq!(generator.shared_secret, receiver.shared_secret);
        assert_eq!(generator.modulus, receiver.modulus);
        assert_eq!(generator.base, receiver.base);
        assert_eq!(generator.public_key, receiver.peer_public_key);
        assert_eq!(receiver.public_key, generator.peer_public_key);
        assert_eq!(generator.modulus.bits(), 64);
        assert_eq!(generator.role, Role::Generator);
        assert_eq!(receiver.role, Role::Receiver);
    }

    #[test]
    fn states_advance_to_secret_derived() {
        let (server, client) = tcp_pair();
        let generator = thread::spawn(move || {
            let mut s = Session::new(server, Role::Generator, policy());
            assert_eq!(s.state(), SessionState::Idle);
            s.run().unwrap();
            (s.state(), s.shared_secret().cloned())
        });
        let mut s = Session::new(client, Role::Receiver, policy());
        s.run().unwrap();
        assert_eq!(s.state(), SessionState::SecretDerived);

        let (state, secret) = generator.join().unwrap();
        assert_eq!(state, SessionState::SecretDerived);
        assert_eq!(secret.as_ref(), s.shared_secret());
        assert!(s.run().is_err());
    }

    #[test]
    fn keypairs_commute() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = Params::generate_with(&mut rng, policy()).unwrap();
        let a = KeyPair::generate_with(&mut rng, &params).unwrap();
        let b = KeyPair::generate_with(&mut rng, &params).unwrap();
        assert_eq!(
            a.shared_secret(&params, b.public_key()),
            b.shared_secret(&params, a.public_key())
        );
    }

    #[test]
    fn textbook_exchange() {
        // p = 23, g = 5, a = 6, b = 15 → A = 8, B = 19, s = 2.
        let params = Params::new(BigUint::from(23u32), BigUint::from(5u32)).unwrap();
        let a = KeyPair::from_private(&params, BigUint::from(6u32));
        let b = KeyPair::from_private(&params, BigUint::from(15u32));
        assert_eq!(a.public_key(), &BigUint::from(8u32));
        assert_eq!(b.public_key(), &BigUint::from(19u32));
        assert_eq!(a.shared_secret(&params, b.public_key()), BigUint::from(2u32));
        assert_eq!(b.shared_secret(&params, a.public_key()), BigUint::from(2u32));
    }

    #[test]
    fn debug_redacts_private_key() {
        let params = Params::new(BigUint::from(23u32), BigUint::from(5u32)).unwrap();
        let kp = KeyPair::from_private(&params, BigUint::from(6u32));
        let dbg = format!("{kp:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("private: 6"));
    }

    #[test]
    fn params_validation() {
        let p = || BigUint::from(23u32);
        assert!(matches!(
            Params::new(BigUint::from(2u32), BigUint::from(2u32)),
            Err(Error::Protocol { field: Field::Modulus, .. })
        ));
        assert!(matches!(
            Params::new(p(), BigUint::from(1u32)),
            Err(Error::Protocol { field: Field::Base, .. })
        ));
        assert!(matches!(
            Params::new(p(), p()),
            Err(Error::Protocol { field: Field::Base, .. })
        ));
        assert!(Params::new(p(), BigUint::from(22u32)).is_ok());
    }

    #[test]
    fn non_numeric_modulus_fails_receiver() {
        let (mut server, client) = tcp_pair();
        dhkex_proto::send(&mut server, "not a number").unwrap();
        dhkex_proto::send(&mut server, "5").unwrap();

        let mut s = Session::new(client, Role::Receiver, policy());
        let err = s.run().unwrap_err();
        assert!(matches!(err, Error::Protocol { field: Field::Modulus, .. }), "{err}");
        assert_eq!(s.state(), SessionState::Failed);
    }

    #[test]
    fn out_of_range_public_key_is_rejected() {
        let (mut server, client) = tcp_pair();
        let fake = thread::spawn(move || {
            dhkex_proto::send(&mut server, "23").unwrap();
            dhkex_proto::send(&mut server, "5").unwrap();
            dhkex_proto::send(&mut server, "23").unwrap();
            // Hold the stream open until the receiver has sent its key.
            let _own = dhkex_proto::recv(&mut server).unwrap();
        });
        let mut s = Session::new(client, Role::Receiver, policy());
        let err = s.run().unwrap_err();
        assert!(matches!(err, Error::Protocol { field: Field::PublicKey, .. }), "{err}");
        fake.join().unwrap();
    }

    #[test]
    fn peer_hangup_after_params_fails_generator() {
        let (server, mut client) = tcp_pair();
        let fake = thread::spawn(move || {
            dhkex_proto::recv(&mut client).unwrap();
            dhkex_proto::recv(&mut client).unwrap();
            drop(client);
        });
        let mut s = Session::new(server, Role::Generator, policy());
        let err = s.run().unwrap_err();
        assert!(err.is_transport(), "{err}");
        assert_eq!(s.state(), SessionState::Failed);
        assert!(s.params().is_some());
        assert!(s.shared_secret().is_none());
        fake.join().unwrap();
    }

    #[test]
    fn generator_hangup_after_params_fails_receiver() {
        let (mut server, client) = tcp_pair();
        dhkex_proto::send(&mut server, "23").unwrap();
        dhkex_proto::send(&mut server, "5").unwrap();
        drop(server);

        let mut s = Session::new(client, Role::Receiver, policy());
        let err = s.run().unwrap_err();
        assert!(err.is_transport(), "{err}");
        assert_eq!(s.state(), SessionState::Failed);
    }

    #[test]
    fn report_serialises_integers_as_decimal() {
        let report = SessionReport {
            role: Role::Receiver,
            peer: None,
            modulus: BigUint::from(23u32),
            base: BigUint::from(5u32),
            public_key: BigUint::from(19u32),
            peer_public_key: BigUint::from(8u32),
            shared_secret: BigUint::from(2u32),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["role"], "receiver");
        assert_eq!(json["modulus"], "23");
        assert_eq!(json["shared_secret"], "2");
        assert!(json["peer"].is_null());
        assert!(json.get("private_key").is_none());
    }
}
