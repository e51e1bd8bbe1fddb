//! Ciphering and integrity protection of individual PDUs.
//!
//! The MAC-I is computed over the ciphertext, so a receiver can reject a tampered PDU without
//! deciphering it first (it deciphers anyway, to report what would have been delivered).

use crate::{Count, Pdu, SnLength};
use bytes::Bytes;
use pdcp_security::{MacI, SecurityContext};

/// The result of verifying a [Pdu].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    /// The deciphered payload (meaningless unless `pass`).
    pub payload: Bytes,
    pub pass: bool,
    /// The MAC-I carried by the PDU.
    pub received: MacI,
    /// The MAC-I recomputed by the receiver (X-MAC).
    pub calculated: MacI,
}

fn xor(payload: &[u8], keystream: &[u8]) -> Bytes {
    payload
        .iter()
        .zip(keystream)
        .map(|(p, k)| p ^ k)
        .collect::<Vec<_>>()
        .into()
}

/// Cipher `payload` and compute its MAC-I under `count`.
pub fn protect(
    context: &SecurityContext,
    sn_length: SnLength,
    count: Count,
    payload: &[u8],
) -> Pdu {
    let keystream = context.keystream(count, payload.len());
    let ciphertext = xor(payload, &keystream);
    let mac_i = context.mac(count, &ciphertext);
    Pdu {
        sn: sn_length.sn(count),
        count,
        ciphertext,
        mac_i,
    }
}

/// Decipher `pdu` and check its MAC-I against the one recomputed for `pdu.count`.
///
/// A mismatch is reported through [Verification::pass], never as an error.
pub fn verify(context: &SecurityContext, pdu: &Pdu) -> Verification {
    let calculated = context.mac(pdu.count, &pdu.ciphertext);
    let keystream = context.keystream(pdu.count, pdu.ciphertext.len());
    Verification {
        payload: xor(&pdu.ciphertext, &keystream),
        pass: calculated == pdu.mac_i,
        received: pdu.mac_i,
        calculated,
    }
}
