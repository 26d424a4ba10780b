//! Device state: position, radio parameters, energy, counters, and the
//! bounded link-quality history driving node-side ADR.

use std::collections::VecDeque;

use crate::channel::Channel;

/// Capacity of the per-node ADR history ring.
const ADR_RING_CAPACITY: usize = 20;
/// Packet-error-rate threshold above which an ADR request is raised.
const PER_THRESHOLD: f64 = 0.1;
/// Installation margin subtracted from the best observed SNR when judging headroom.
const ADR_MARGIN_DB: f64 = 10.0;
/// dB step applied per ADR adjustment.
const ADR_STEP_DB: f64 = 3.0;

pub const MIN_TX_POWER_DBM: f64 = 2.0;
pub const MAX_TX_POWER_DBM: f64 = 14.0;
pub const MIN_SF: u8 = 7;
pub const MAX_SF: u8 = 12;

/// One entry in a node's bounded ADR history.
#[derive(Debug, Clone, Copy)]
pub struct AdrEntry {
    /// Estimated SNR for a delivered packet; `None` for a lost packet.
    pub snr: Option<f64>,
    pub delivered: bool,
}

/// Simulated end device.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,

    pub x: f64,
    pub y: f64,
    pub sf: u8,
    pub tx_power: f64,

    pub initial_x: f64,
    pub initial_y: f64,
    pub initial_sf: u8,
    pub initial_tx_power: f64,

    pub energy_consumed_j: f64,
    pub sent: u64,
    pub success: u64,
    /// Any non-delivered transmission, whether lost to a collision or to
    /// lack of coverage — see [`crate::metrics::EventOutcome`] for the
    /// finer-grained, crate-wide split.
    pub collision: u64,

    /// Mobility velocity components, carried for data-model fidelity with the
    /// non-authoritative bounce-and-drift variant; the random-teleport model
    /// this core implements never reads them.
    pub vx: f64,
    pub vy: f64,
    pub last_move_time: f64,

    pub adr_history: VecDeque<AdrEntry>,

    pub in_transmission: bool,
    pub current_end_time: Option<f64>,
    pub last_rssi: Option<f64>,
}

impl Node {
    pub fn new(id: usize, x: f64, y: f64, sf: u8, tx_power: f64) -> Self {
        Node {
            id,
            x,
            y,
            sf,
            tx_power,
            initial_x: x,
            initial_y: y,
            initial_sf: sf,
            initial_tx_power: tx_power,
            energy_consumed_j: 0.0,
            sent: 0,
            success: 0,
            collision: 0,
            vx: 0.0,
            vy: 0.0,
            last_move_time: 0.0,
            adr_history: VecDeque::with_capacity(ADR_RING_CAPACITY),
            in_transmission: false,
            current_end_time: None,
            last_rssi: None,
        }
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }

    pub fn add_energy(&mut self, energy_j: f64) {
        self.energy_consumed_j += energy_j;
    }

    fn clamp_sf_tx_power(&mut self) {
        self.sf = self.sf.clamp(MIN_SF, MAX_SF);
        self.tx_power = self.tx_power.clamp(MIN_TX_POWER_DBM, MAX_TX_POWER_DBM);
    }

    /// Run the node-side ADR policy (spec §4.5.1) after a transmission has been
    /// resolved. Appends the observed link quality to the ring, and — only when
    /// `adr_server_enabled` — applies the resulting SF/TX-power adjustment.
    pub fn adr_update(&mut self, delivered: bool, channel: &Channel, adr_server_enabled: bool) {
        let snr = if delivered {
            self.last_rssi
                .map(|rssi| rssi - channel.sensitivity_dbm(self.sf) + channel.required_snr_db(self.sf))
        } else {
            None
        };

        if self.adr_history.len() >= ADR_RING_CAPACITY {
            self.adr_history.pop_front();
        }
        self.adr_history.push_back(AdrEntry { snr, delivered });

        let total = self.adr_history.len() as f64;
        let delivered_count = self.adr_history.iter().filter(|e| e.delivered).count() as f64;
        let per = (total - delivered_count) / total;

        let max_snr = self.adr_history.iter().filter_map(|e| e.snr).fold(None, |acc: Option<f64>, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        });
        let margin = max_snr.map(|m| m - channel.required_snr_db(self.sf) - ADR_MARGIN_DB);

        let requested = margin.is_some_and(|m| m > 0.0) || per > PER_THRESHOLD;
        if !requested {
            return;
        }

        if !adr_server_enabled {
            log::debug!("node {}: ADR request raised but ADR-server disabled, ignoring", self.id);
            return;
        }

        if per > PER_THRESHOLD {
            if self.sf < MAX_SF {
                self.sf += 1;
            } else if self.tx_power < MAX_TX_POWER_DBM {
                self.tx_power = (self.tx_power + ADR_STEP_DB).min(MAX_TX_POWER_DBM);
            }
        } else if let Some(margin) = margin.filter(|m| *m > 0.0) {
            let mut steps = (margin / ADR_STEP_DB).floor() as i64;
            while steps > 0 {
                if self.sf > MIN_SF {
                    self.sf -= 1;
                    if self.tx_power > MIN_TX_POWER_DBM {
                        self.tx_power = (self.tx_power - ADR_STEP_DB).max(MIN_TX_POWER_DBM);
                    }
                } else if self.tx_power > MIN_TX_POWER_DBM {
                    self.tx_power = (self.tx_power - ADR_STEP_DB).max(MIN_TX_POWER_DBM);
                } else {
                    break;
                }
                steps -= 1;
            }
        }

        self.clamp_sf_tx_power();
        self.adr_history.clear();
        log::debug!("node {}: ADR adjusted sf={} tx_power={:.1}", self.id, self.sf, self.tx_power);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_history(sf: u8, tx_power: f64, entries: Vec<AdrEntry>) -> Node {
        let mut n = Node::new(0, 0.0, 0.0, sf, tx_power);
        n.adr_history = entries.into();
        n
    }

    #[test]
    fn bad_per_increases_sf_before_power() {
        let channel = Channel::default();
        let mut n = node_with_history(7, 14.0, vec![AdrEntry { snr: None, delivered: false }; 19]);
        n.last_rssi = None;
        n.adr_update(false, &channel, true);
        assert_eq!(n.sf, 8);
    }

    #[test]
    fn good_margin_reduces_sf_and_power() {
        let channel = Channel::default();
        // Excellent link: all delivered with high SNR at SF12.
        let entries = vec![AdrEntry { snr: Some(20.0), delivered: true }; 19];
        let mut n = node_with_history(12, 14.0, entries);
        n.last_rssi = Some(-80.0);
        n.adr_update(true, &channel, true);
        assert!(n.sf < 12);
        assert!(n.tx_power <= 14.0);
    }

    #[test]
    fn adr_request_ignored_without_server() {
        let channel = Channel::default();
        let entries = vec![AdrEntry { snr: Some(20.0), delivered: true }; 19];
        let mut n = node_with_history(12, 14.0, entries);
        n.last_rssi = Some(-80.0);
        n.adr_update(true, &channel, false);
        assert_eq!(n.sf, 12);
        assert_eq!(n.tx_power, 14.0);
    }

    #[test]
    fn sf_and_tx_power_stay_within_clamps() {
        let channel = Channel::default();
        let mut n = Node::new(0, 0.0, 0.0, 7, 2.0);
        n.last_rssi = Some(-50.0);
        for _ in 0..25 {
            n.adr_update(false, &channel, true);
        }
        assert!((MIN_SF..=MAX_SF).contains(&n.sf));
        assert!(n.tx_power >= MIN_TX_POWER_DBM && n.tx_power <= MAX_TX_POWER_DBM);
    }
}
