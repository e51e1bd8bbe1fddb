//! Number, protect, and reorder PDUs at both ends of a PDCP bearer.
//!
//! # Overview
//!
//! A PDCP entity is split into a [Transmitter] and a [Receiver] that share a
//! [pdcp_security::SecurityContext]:
//!
//! - The [Transmitter] assigns each SDU the next COUNT, ciphers it, and appends a MAC-I.
//! - The [Receiver] reconstructs the COUNT of each arriving frame from its sequence number,
//!   filters duplicates and out-of-window frames, verifies integrity, and releases SDUs to the
//!   upper layer in COUNT order (waiting at most `t-Reordering` slots for a missing COUNT).
//!
//! Only the sequence number travels on the wire (see [pdu]). Both ends keep the full 32-bit
//! COUNT (`HFN << sn_bits | SN`) locally.

use thiserror::Error;

pub mod count;
pub mod engine;
pub mod pdu;
pub mod receiver;
pub mod transmitter;

pub use count::{Count, SnLength};
pub use pdu::{Frame, Pdu, Sdu};
pub use receiver::Receiver;
pub use transmitter::Transmitter;

/// Errors that can occur when configuring an entity or decoding a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid SN length: {0} bits (must be 12 or 18)")]
    InvalidSnLength(u8),
    #[error("invalid reordering window: {window} (must be in [1, {max}])")]
    InvalidWindow { window: u32, max: u32 },
    #[error("frame truncated: {length} bytes (minimum {minimum})")]
    Truncated { length: usize, minimum: usize },
    #[error("control PDU on a data bearer")]
    ControlPdu,
}
