//! Transmitting side of a PDCP entity.

use crate::{engine, Count, Pdu, Sdu, SnLength};
use pdcp_security::SecurityContext;
use tracing::debug;

/// Assigns COUNTs to SDUs and protects them.
pub struct Transmitter {
    context: SecurityContext,
    sn_length: SnLength,
    tx_next: Count,
}

impl Transmitter {
    pub fn new(context: SecurityContext, sn_length: SnLength) -> Self {
        Self {
            context,
            sn_length,
            tx_next: 0,
        }
    }

    /// The COUNT the next SDU will be sent with.
    pub fn tx_next(&self) -> Count {
        self.tx_next
    }

    pub fn sn_length(&self) -> SnLength {
        self.sn_length
    }

    /// Protect `sdu` with the next COUNT.
    ///
    /// The SN wraps (incrementing the HFN) when it overflows its width; the COUNT itself wraps
    /// at 2^32.
    pub fn send(&mut self, sdu: &Sdu) -> Pdu {
        let count = self.tx_next;
        let pdu = engine::protect(&self.context, self.sn_length, count, &sdu.payload);
        self.tx_next = self.tx_next.wrapping_add(1);
        debug!(
            sdu = sdu.id,
            count,
            sn = pdu.sn,
            hfn = self.sn_length.hfn(count),
            "protected sdu"
        );
        pdu
    }
}
