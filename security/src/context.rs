use crate::{Direction, Error, MacI, Role, KEY_LENGTH, MAC_LENGTH, MAX_BEARER};
use hkdf::hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A constant prefix hashed into every keystream block.
const KEYSTREAM_PREFIX: &[u8] = b"pdcp-security/KEYSTREAM/v1/";

/// Length of the derivation input: COUNT (4 bytes), BEARER (1 byte) and DIRECTION (1 byte).
pub const INPUT_LENGTH: usize = 6;

/// Bytes of keystream produced per SHA-256 invocation.
const BLOCK_LENGTH: usize = 32;

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct Key([u8; KEY_LENGTH]);

impl Key {
    fn parse(role: Role, raw: &[u8]) -> Result<Self, Error> {
        let key: [u8; KEY_LENGTH] = raw.try_into().map_err(|_| Error::InvalidKeyLength {
            role,
            length: raw.len(),
        })?;
        Ok(Self(key))
    }
}

/// Key material and bearer identity shared by both ends of a PDCP entity.
///
/// Immutable once created. Key bytes are zeroized on drop.
#[derive(Clone)]
pub struct SecurityContext {
    integrity: Key,
    ciphering: Key,
    bearer: u8,
    direction: Direction,
}

impl SecurityContext {
    /// Create a new context, validating the length of both keys and the bearer identity.
    pub fn new(
        integrity_key: &[u8],
        ciphering_key: &[u8],
        bearer: u8,
        direction: Direction,
    ) -> Result<Self, Error> {
        let integrity = Key::parse(Role::Integrity, integrity_key)?;
        let ciphering = Key::parse(Role::Ciphering, ciphering_key)?;
        if bearer > MAX_BEARER {
            return Err(Error::InvalidBearer(bearer));
        }
        Ok(Self {
            integrity,
            ciphering,
            bearer,
            direction,
        })
    }

    pub fn bearer(&self) -> u8 {
        self.bearer
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The bytes bound into every derivation for `count`.
    pub fn input(&self, count: u32) -> [u8; INPUT_LENGTH] {
        let mut input = [0u8; INPUT_LENGTH];
        input[..4].copy_from_slice(&count.to_be_bytes());
        input[4] = self.bearer;
        input[5] = self.direction.bit();
        input
    }

    /// Derive `len` bytes of keystream for `count` (ciphering role).
    pub fn keystream(&self, count: u32, len: usize) -> Vec<u8> {
        let input = self.input(count);
        let mut stream = Vec::with_capacity(len);
        let mut block: u32 = 0;
        while stream.len() < len {
            let mut hasher = Sha256::new();
            hasher.update(KEYSTREAM_PREFIX);
            hasher.update(self.ciphering.0);
            hasher.update(input);
            hasher.update(block.to_be_bytes());
            let digest = hasher.finalize();

            let take = (len - stream.len()).min(BLOCK_LENGTH);
            stream.extend_from_slice(&digest[..take]);
            block += 1;
        }
        stream
    }

    /// Compute the MAC-I of `message` for `count` (integrity role).
    pub fn mac(&self, count: u32, message: &[u8]) -> MacI {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&self.integrity.0)
            .expect("HMAC can take a key of any size");
        mac.update(&self.input(count));
        mac.update(message);
        let tag = mac.finalize().into_bytes();

        let mut result = [0u8; MAC_LENGTH];
        result.copy_from_slice(&tag[..MAC_LENGTH]);
        result
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("bearer", &self.bearer)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}
