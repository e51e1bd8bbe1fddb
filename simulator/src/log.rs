//! Chronological record of a run.

use pdcp_channel::Event;
use pdcp_entity::{receiver::Discard, Count};
use pdcp_security::MacI;
use serde::{Serialize, Serializer};
use std::fmt;

/// Outcome of an integrity check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Passed,
    Failed,
}

/// One entry of the event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(
    tag = "event",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Entry {
    TxProtect {
        sdu_id: u64,
        count: Count,
        sn: u32,
        hfn: u32,
        #[serde(serialize_with = "hex")]
        mac_i: MacI,
    },
    ChannelOk {
        sdu_id: u64,
    },
    ChannelTamper {
        sdu_id: u64,
        detail: String,
    },
    ChannelLost {
        sdu_id: u64,
    },
    ChannelDuplicate {
        sdu_id: u64,
    },
    ChannelReorder {
        sdu_id: u64,
        delay: u64,
    },
    ChannelCorrupt {
        sdu_id: u64,
        detail: String,
    },
    RxVerifyPass {
        sdu_id: u64,
        count: Count,
        #[serde(serialize_with = "hex")]
        received_mac: MacI,
        #[serde(serialize_with = "hex")]
        calculated_mac: MacI,
        status: Status,
    },
    RxVerifyFail {
        sdu_id: u64,
        count: Count,
        #[serde(serialize_with = "hex")]
        received_mac: MacI,
        #[serde(serialize_with = "hex")]
        calculated_mac: MacI,
        status: Status,
    },
    RxDiscard {
        sdu_id: u64,
        count: Option<Count>,
        #[serde(serialize_with = "display")]
        reason: Discard,
    },
    RxBuffer {
        sdu_id: u64,
        count: Count,
    },
    RxDeliver {
        sdu_id: u64,
        count: Count,
        skipped: u64,
    },
    RxReorderingExpired {
        rx_reord: u64,
        rx_deliv: u64,
        rx_next: u64,
        skipped: u64,
    },
}

impl Entry {
    /// Convert a channel event for `sdu_id`.
    pub fn channel(sdu_id: u64, event: Event) -> Self {
        match event {
            Event::Ok => Self::ChannelOk { sdu_id },
            Event::Tampered { detail } => Self::ChannelTamper { sdu_id, detail },
            Event::Lost => Self::ChannelLost { sdu_id },
            Event::Corrupted { detail } => Self::ChannelCorrupt { sdu_id, detail },
            Event::Duplicated => Self::ChannelDuplicate { sdu_id },
            Event::Reordered { delay } => Self::ChannelReorder { sdu_id, delay },
        }
    }

    /// The SDU this entry concerns (if any).
    pub fn sdu_id(&self) -> Option<u64> {
        match self {
            Self::TxProtect { sdu_id, .. }
            | Self::ChannelOk { sdu_id }
            | Self::ChannelTamper { sdu_id, .. }
            | Self::ChannelLost { sdu_id }
            | Self::ChannelDuplicate { sdu_id }
            | Self::ChannelReorder { sdu_id, .. }
            | Self::ChannelCorrupt { sdu_id, .. }
            | Self::RxVerifyPass { sdu_id, .. }
            | Self::RxVerifyFail { sdu_id, .. }
            | Self::RxDiscard { sdu_id, .. }
            | Self::RxBuffer { sdu_id, .. }
            | Self::RxDeliver { sdu_id, .. } => Some(*sdu_id),
            Self::RxReorderingExpired { .. } => None,
        }
    }
}

fn hex<S: Serializer>(mac: &MacI, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&commonware_utils::hex(mac))
}

fn display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
