//! Per-node duty-cycle enforcement.
//!
//! Tracks the earliest time each node is allowed to start its next
//! transmission, so that the fraction of time spent transmitting never
//! exceeds the configured duty cycle.

use std::collections::HashMap;

use crate::config::ConfigurationError;

/// Tracks, per node, the earliest time a new transmission may begin.
#[derive(Debug, Clone)]
pub struct DutyCycleManager {
    duty_cycle: f64,
    next_allowed: HashMap<usize, f64>,
}

impl DutyCycleManager {
    /// Builds a manager enforcing `duty_cycle` (a fraction in `(0, 1]`).
    pub fn new(duty_cycle: f64) -> Result<Self, ConfigurationError> {
        if duty_cycle <= 0.0 || duty_cycle > 1.0 {
            return Err(ConfigurationError::InvalidDutyCycle);
        }
        Ok(DutyCycleManager {
            duty_cycle,
            next_allowed: HashMap::new(),
        })
    }

    /// Whether `node_id` may start a transmission at `time`.
    pub fn can_transmit(&self, node_id: usize, time: f64) -> bool {
        match self.next_allowed.get(&node_id) {
            Some(&next) => time >= next,
            None => true,
        }
    }

    /// Returns the earliest time `node_id` may transmit, clamping a requested
    /// `time` forward if the duty cycle has not yet elapsed.
    pub fn enforce(&self, node_id: usize, time: f64) -> f64 {
        match self.next_allowed.get(&node_id) {
            Some(&next) if next > time => next,
            _ => time,
        }
    }

    /// Records that `node_id` transmitted for `airtime` seconds starting at
    /// `start_time`, pushing its next allowed transmission out accordingly.
    pub fn update_after_tx(&mut self, node_id: usize, start_time: f64, airtime: f64) {
        let off_air_time = airtime * (1.0 / self.duty_cycle - 1.0);
        let next = start_time + airtime + off_air_time;
        self.next_allowed.insert(node_id, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_duty_cycle() {
        assert!(DutyCycleManager::new(0.0).is_err());
        assert!(DutyCycleManager::new(1.5).is_err());
        assert!(DutyCycleManager::new(0.01).is_ok());
    }

    #[test]
    fn unseen_node_can_always_transmit() {
        let mgr = DutyCycleManager::new(0.01).unwrap();
        assert!(mgr.can_transmit(0, 0.0));
    }

    #[test]
    fn one_percent_duty_cycle_blocks_immediate_retransmission() {
        let mut mgr = DutyCycleManager::new(0.01).unwrap();
        mgr.update_after_tx(0, 0.0, 1.0);
        // 1s airtime at 1% duty cycle => 99s of enforced silence => next allowed at t=100.
        assert!(!mgr.can_transmit(0, 50.0));
        assert!(mgr.can_transmit(0, 100.0));
        assert_eq!(mgr.enforce(0, 50.0), 100.0);
    }

    #[test]
    fn sf12_airtime_at_one_percent_duty_cycle_forces_wide_gaps() {
        use crate::channel::{Channel, DEFAULT_PAYLOAD_BYTES};
        let channel = Channel::default();
        let airtime = channel.airtime(12, DEFAULT_PAYLOAD_BYTES);
        let min_gap = airtime / 0.01;

        // The node asks to retransmit immediately after each previous
        // transmission ends; duty cycle must push every start out by at
        // least `airtime / duty_cycle` from the one before it.
        let mut mgr = DutyCycleManager::new(0.01).unwrap();
        let mut requested_start = 0.0;
        let mut previous_start = None;
        for _ in 0..5 {
            let start = mgr.enforce(0, requested_start);
            if let Some(previous) = previous_start {
                assert!(start - previous >= min_gap - 1e-9);
            }
            mgr.update_after_tx(0, start, airtime);
            previous_start = Some(start);
            requested_start = start + airtime;
        }
    }

    #[test]
    fn full_duty_cycle_allows_back_to_back_transmission() {
        let mut mgr = DutyCycleManager::new(1.0).unwrap();
        mgr.update_after_tx(0, 0.0, 1.0);
        assert!(mgr.can_transmit(0, 1.0));
    }
}
