//! SDUs, PDUs, and the data PDU wire format.
//!
//! A data PDU on the wire (TS 38.323 6.2.2) is a header, the ciphertext, and a trailing MAC-I:
//!
//! ```text
//! 12-bit SN: | D/C | R | R | R | SN[11:8] | SN[7:0] | ciphertext ... | MAC-I (4) |
//! 18-bit SN: | D/C | R | R | R | R | R | SN[17:16] | SN[15:8] | SN[7:0] | ciphertext ... | MAC-I (4) |
//! ```
//!
//! The D/C bit is set for data PDUs. Reserved bits are written as zero and ignored on decode.

use crate::{Count, Error, SnLength};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use pdcp_security::{MacI, MAC_LENGTH};

/// Set in the first header byte of every data PDU.
const DATA_FLAG: u8 = 0x80;

/// An upper-layer payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sdu {
    /// Identifier assigned by whoever submitted the SDU (monotonic within a run).
    pub id: u64,
    pub payload: Bytes,
}

impl Sdu {
    pub fn new(id: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }
}

/// A protected data PDU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pdu {
    pub sn: u32,
    /// The full COUNT the PDU was (or, at the receiver, is assumed to have been) protected with.
    ///
    /// Never transmitted.
    pub count: Count,
    pub ciphertext: Bytes,
    pub mac_i: MacI,
}

impl Pdu {
    /// Encoded length of this PDU.
    pub fn len_encoded(&self, sn_length: SnLength) -> usize {
        sn_length.header_len() + self.ciphertext.len() + MAC_LENGTH
    }

    /// Serialize the PDU into a data frame.
    pub fn encode(&self, sn_length: SnLength) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len_encoded(sn_length));
        let sn = sn_length.sn(self.sn);
        match sn_length {
            SnLength::Short => {
                buf.put_u8(DATA_FLAG | (sn >> 8) as u8);
                buf.put_u8(sn as u8);
            }
            SnLength::Long => {
                buf.put_u8(DATA_FLAG | (sn >> 16) as u8);
                buf.put_u16(sn as u16);
            }
        }
        buf.put_slice(&self.ciphertext);
        buf.put_slice(&self.mac_i);
        buf.freeze()
    }
}

/// A data PDU as read off the wire (before its COUNT is known).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub sn: u32,
    pub ciphertext: Bytes,
    pub mac_i: MacI,
}

impl Frame {
    /// Parse a data frame.
    pub fn decode(frame: Bytes, sn_length: SnLength) -> Result<Self, Error> {
        let header_len = sn_length.header_len();
        let minimum = header_len + MAC_LENGTH;
        if frame.len() < minimum {
            return Err(Error::Truncated {
                length: frame.len(),
                minimum,
            });
        }

        let mut header = &frame[..header_len];
        let first = header.get_u8();
        if first & DATA_FLAG == 0 {
            return Err(Error::ControlPdu);
        }
        let sn = match sn_length {
            SnLength::Short => (u32::from(first & 0x0F) << 8) | u32::from(header.get_u8()),
            SnLength::Long => (u32::from(first & 0x03) << 16) | u32::from(header.get_u16()),
        };

        let mac_at = frame.len() - MAC_LENGTH;
        let mut mac_i = [0u8; MAC_LENGTH];
        mac_i.copy_from_slice(&frame[mac_at..]);
        Ok(Self {
            sn,
            ciphertext: frame.slice(header_len..mac_at),
            mac_i,
        })
    }

    /// Attach the COUNT the receiver reconstructed for this frame.
    pub fn into_pdu(self, count: Count) -> Pdu {
        Pdu {
            sn: self.sn,
            count,
            ciphertext: self.ciphertext,
            mac_i: self.mac_i,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdu(count: Count, sn_length: SnLength, ciphertext: &'static [u8]) -> Pdu {
        Pdu {
            sn: sn_length.sn(count),
            count,
            ciphertext: Bytes::from_static(ciphertext),
            mac_i: [0xDE, 0xAD, 0xBE, 0xEF],
        }
    }

    #[test]
    fn test_encode_short_header() {
        let encoded = pdu(0x0ABC, SnLength::Short, b"xy").encode(SnLength::Short);
        assert_eq!(
            encoded.as_ref(),
            &[0x8A, 0xBC, b'x', b'y', 0xDE, 0xAD, 0xBE, 0xEF]
        );
    }

    #[test]
    fn test_encode_long_header() {
        let encoded = pdu(0x2_1234, SnLength::Long, b"z").encode(SnLength::Long);
        assert_eq!(
            encoded.as_ref(),
            &[0x82, 0x12, 0x34, b'z', 0xDE, 0xAD, 0xBE, 0xEF]
        );
    }

    #[test]
    fn test_count_not_transmitted() {
        // Two COUNTs with the same SN produce identical frames
        let a = pdu(5, SnLength::Short, b"same").encode(SnLength::Short);
        let b = pdu(4096 + 5, SnLength::Short, b"same").encode(SnLength::Short);
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode() {
        for sn_length in [SnLength::Short, SnLength::Long] {
            let original = pdu(sn_length.modulus() - 1, sn_length, b"payload");
            let encoded = original.encode(sn_length);
            assert_eq!(encoded.len(), original.len_encoded(sn_length));

            let frame = Frame::decode(encoded, sn_length).unwrap();
            assert_eq!(frame.sn, sn_length.modulus() - 1);
            assert_eq!(frame.into_pdu(original.count), original);
        }
    }

    #[test]
    fn test_decode_empty_ciphertext() {
        let original = pdu(9, SnLength::Short, b"");
        let frame = Frame::decode(original.encode(SnLength::Short), SnLength::Short).unwrap();
        assert!(frame.ciphertext.is_empty());
        assert_eq!(frame.mac_i, original.mac_i);
    }

    #[test]
    fn test_decode_ignores_reserved_bits() {
        let frame = Bytes::from_static(&[0xF0 | 0x01, 0x02, 1, 2, 3, 4]);
        let frame = Frame::decode(frame, SnLength::Short).unwrap();
        assert_eq!(frame.sn, 0x102);
    }

    #[test]
    fn test_decode_truncated() {
        let frame = Bytes::from_static(&[0x80, 0x01, 0xAA, 0xBB, 0xCC]);
        assert_eq!(
            Frame::decode(frame, SnLength::Short),
            Err(Error::Truncated {
                length: 5,
                minimum: 6
            })
        );
        assert_eq!(
            Frame::decode(Bytes::new(), SnLength::Long),
            Err(Error::Truncated {
                length: 0,
                minimum: 7
            })
        );
    }

    #[test]
    fn test_decode_control_pdu() {
        let encoded = pdu(3, SnLength::Short, b"ab").encode(SnLength::Short);
        let mut encoded = BytesMut::from(&encoded[..]);
        encoded[0] &= !DATA_FLAG;
        assert_eq!(
            Frame::decode(encoded.freeze(), SnLength::Short),
            Err(Error::ControlPdu)
        );
    }
}
