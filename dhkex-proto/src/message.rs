//! Protocol roles and the values carried by each frame.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default TCP port for the listening peer.
pub const DEFAULT_PORT: u16 = 11037;

/// Default bind address for the listening peer.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Which side of the exchange a peer plays.
///
/// The [`Role::Generator`] picks the modulus and base and sends them first;
/// the [`Role::Receiver`] waits for them. Both then swap public keys, each
/// sending before receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Role {
    /// Generates and sends the group parameters (listening peer).
    Generator,
    /// Receives the group parameters (connecting peer).
    Receiver,
}

impl Role {
    /// Returns `true` if this role owns parameter generation.
    pub const fn sends_params(self) -> bool {
        matches!(self, Self::Generator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generator => "generator",
            Self::Receiver => "receiver",
        })
    }
}

/// A value carried in a single frame, as a decimal string.
///
/// Frames are exchanged in this order:
///
/// 1. generator → receiver: [`Field::Modulus`]
/// 2. generator → receiver: [`Field::Base`]
/// 3. generator → receiver: [`Field::PublicKey`]
/// 4. receiver → generator: [`Field::PublicKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Field {
    /// The prime modulus `p`.
    Modulus,
    /// The base `g`.
    Base,
    /// A peer's public key `g^x mod p`.
    PublicKey,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Modulus => "modulus",
            Self::Base => "base",
            Self::PublicKey => "public key",
        })
    }
}
