//! Aggregate results of a run.

use pdcp_channel::Stats as ChannelStats;
use pdcp_entity::{Receiver, Transmitter};
use serde::Serialize;
use std::time::Duration;

/// Final counters of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_sdu_sent: u64,
    pub tx_next_final: u64,
    pub delivered_sdu_count: u64,
    pub rx_deliv_final: u64,
    pub rx_next_final: u64,
    pub buffered_final: u64,
    pub discarded_duplicates: u64,
    pub discarded_old: u64,
    pub discarded_corrupted: u64,
    pub out_of_order_deliveries: u64,
    pub skipped_counts: u64,
    pub channel_lost: u64,
    pub channel_duplicated: u64,
    pub channel_corrupted: u64,
    pub channel_reorder_events: u64,
    pub channel_tampered: u64,
    /// Wall-clock time of the run, in seconds.
    pub simulation_duration: f64,
}

impl Metrics {
    pub fn collect(
        sent: u64,
        tx: &Transmitter,
        rx: &Receiver,
        channel: ChannelStats,
        duration: Duration,
    ) -> Self {
        let stats = rx.stats();
        Self {
            total_sdu_sent: sent,
            tx_next_final: u64::from(tx.tx_next()),
            delivered_sdu_count: stats.delivered,
            rx_deliv_final: rx.rx_deliv(),
            rx_next_final: rx.rx_next(),
            buffered_final: rx.buffered() as u64,
            discarded_duplicates: stats.discarded_duplicates,
            discarded_old: stats.discarded_old,
            discarded_corrupted: stats.discarded_corrupted,
            out_of_order_deliveries: stats.out_of_order_deliveries,
            skipped_counts: stats.skipped,
            channel_lost: channel.lost,
            channel_duplicated: channel.duplicated,
            channel_corrupted: channel.corrupted,
            channel_reorder_events: channel.reordered,
            channel_tampered: channel.tampered,
            simulation_duration: duration.as_secs_f64(),
        }
    }

    /// Frames that reached the receiver, each of which was delivered, buffered, or discarded.
    pub fn arrived(&self) -> u64 {
        self.total_sdu_sent + self.channel_duplicated - self.channel_lost
    }

    /// Sum of every receiver outcome.
    pub fn accounted(&self) -> u64 {
        self.delivered_sdu_count
            + self.buffered_final
            + self.discarded_duplicates
            + self.discarded_old
            + self.discarded_corrupted
    }
}

/// Snapshot of the state variables at one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub step: u64,
    pub tx_next: u64,
    pub rx_deliv: u64,
    pub rx_next: u64,
    pub buffered: u64,
}

impl Sample {
    pub fn capture(step: u64, tx: &Transmitter, rx: &Receiver) -> Self {
        Self {
            step,
            tx_next: u64::from(tx.tx_next()),
            rx_deliv: rx.rx_deliv(),
            rx_next: rx.rx_next(),
            buffered: rx.buffered() as u64,
        }
    }
}
