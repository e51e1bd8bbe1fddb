//! COUNT arithmetic.
//!
//! A COUNT is the 32-bit concatenation of a hyper-frame number (HFN) and a sequence number (SN):
//!
//! ```text
//! | HFN (32 - sn_bits) | SN (sn_bits) |
//! ```
//!
//! Only the SN is transmitted. The receiver reconstructs the HFN from its own `RX_DELIV` by
//! assuming the received SN lies within half the SN space of `RX_DELIV` (TS 38.323 5.2.2.1).

use crate::Error;

/// A 32-bit COUNT value.
pub type Count = u32;

/// Width of the sequence number carried in each data PDU header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SnLength {
    /// 12-bit sequence numbers (2-byte header).
    #[default]
    Short,
    /// 18-bit sequence numbers (3-byte header).
    Long,
}

impl SnLength {
    pub fn bits(self) -> u32 {
        match self {
            Self::Short => 12,
            Self::Long => 18,
        }
    }

    /// Number of distinct sequence numbers.
    pub fn modulus(self) -> u32 {
        1 << self.bits()
    }

    /// Half the SN space (`Window_Size` in TS 38.323).
    ///
    /// This is also the largest reordering window that keeps COUNT reconstruction unambiguous.
    pub fn window(self) -> u32 {
        1 << (self.bits() - 1)
    }

    /// Length of the data PDU header (D/C bit, reserved bits, and SN).
    pub fn header_len(self) -> usize {
        match self {
            Self::Short => 2,
            Self::Long => 3,
        }
    }

    /// Bits of the first header byte that carry no information and are ignored on decode.
    pub fn reserved_mask(self) -> u8 {
        match self {
            Self::Short => 0x70,
            Self::Long => 0x7C,
        }
    }

    pub fn sn(self, count: Count) -> u32 {
        count & (self.modulus() - 1)
    }

    pub fn hfn(self, count: Count) -> u32 {
        count >> self.bits()
    }

    /// Combine an HFN and an SN, returning `None` if the result does not fit in 32 bits.
    pub fn count(self, hfn: u64, sn: u32) -> Option<Count> {
        let sn = u64::from(sn & (self.modulus() - 1));
        Count::try_from((hfn << self.bits()) | sn).ok()
    }

    /// Reconstruct the COUNT of a received SN relative to `rx_deliv`.
    ///
    /// Returns `None` if the implied COUNT falls before the first HFN or past the last.
    pub fn reconstruct(self, rx_deliv: u64, sn: u32) -> Option<Count> {
        let bits = self.bits();
        let window = i64::from(self.window());
        let hfn = rx_deliv >> bits;
        let deliv_sn = (rx_deliv & u64::from(self.modulus() - 1)) as i64;
        let received = i64::from(sn);

        let hfn = if received < deliv_sn - window {
            hfn + 1
        } else if received >= deliv_sn + window {
            hfn.checked_sub(1)?
        } else {
            hfn
        };
        self.count(hfn, sn)
    }
}

impl TryFrom<u8> for SnLength {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            12 => Ok(Self::Short),
            18 => Ok(Self::Long),
            other => Err(Error::InvalidSnLength(other)),
        }
    }
}
