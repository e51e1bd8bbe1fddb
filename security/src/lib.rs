//! Derive PDCP keystreams and integrity codes from a bearer's security context.
//!
//! # Overview
//!
//! Every protected PDU is bound to the tuple `(COUNT, BEARER, DIRECTION)`. A [SecurityContext]
//! holds the key material for one bearer and derives, for a given COUNT:
//!
//! - a keystream (the _ciphering_ role), XORed with the payload, and
//! - a 32-bit MAC-I (the _integrity_ role), computed over the ciphertext.
//!
//! # Warning
//!
//! The primitives are illustrative. The keystream is SHA-256 in counter mode and the MAC-I is a
//! truncated HMAC-SHA-256; neither is a 3GPP NEA/NIA algorithm.

use rand::{CryptoRng, RngCore};
use std::fmt;
use thiserror::Error;

mod context;
pub use context::SecurityContext;

/// Length (in bytes) of integrity and ciphering keys.
pub const KEY_LENGTH: usize = 16;

/// Length (in bytes) of a MAC-I.
pub const MAC_LENGTH: usize = 4;

/// Largest bearer identity (bearers are 5-bit values).
pub const MAX_BEARER: u8 = 0b1_1111;

/// A 32-bit message authentication code.
pub type MacI = [u8; MAC_LENGTH];

/// Errors that can occur when building a [SecurityContext].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid {role} key length: {length} (expected {KEY_LENGTH})")]
    InvalidKeyLength { role: Role, length: usize },
    #[error("invalid bearer: {0} (max {MAX_BEARER})")]
    InvalidBearer(u8),
}

/// Direction of the bearer a context protects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Uplink,
    Downlink,
}

impl Direction {
    /// The DIRECTION bit bound into every derivation.
    pub fn bit(self) -> u8 {
        match self {
            Self::Uplink => 0,
            Self::Downlink => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uplink => write!(f, "uplink"),
            Self::Downlink => write!(f, "downlink"),
        }
    }
}

/// The purpose a key is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Integrity,
    Ciphering,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integrity => write!(f, "integrity"),
            Self::Ciphering => write!(f, "ciphering"),
        }
    }
}

/// Generate fresh key material.
pub fn generate_key<R: RngCore + CryptoRng>(rng: &mut R) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    rng.fill_bytes(&mut key);
    key
}
