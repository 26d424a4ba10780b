//! Network server: cross-gateway uplink dedup and coarse RSSI-threshold ADR.
//!
//! The teacher has no equivalent — its `control` module talks to an external
//! telemetry hub rather than modelling a LoRaWAN network server — so this
//! module is grounded directly on `original_source/server.py`, adapted to the
//! non-cyclic entity style the rest of this core uses: the server holds no
//! reference to the node/gateway tables, they are passed in per call.

use std::collections::HashSet;

use crate::channel::Channel;
use crate::node::{Node, MAX_SF, MIN_SF};

/// RSSI headroom (dB) above sensitivity above which the server asks a node to
/// step its spreading factor down.
const COARSE_ADR_HIGH_MARGIN_DB: f64 = 15.0;
/// RSSI headroom (dB) above sensitivity below which the server asks a node to
/// step its spreading factor up.
const COARSE_ADR_LOW_MARGIN_DB: f64 = 5.0;

/// Central uplink receiver. Distinct physical receptions of the same uplink
/// at multiple gateways are deduplicated here: only the first gateway to
/// deliver a given `event_id` counts as a new delivery, but every delivery
/// still feeds the coarse ADR decision since a later gateway may report a
/// stronger RSSI.
#[derive(Debug, Default)]
pub struct NetworkServer {
    adr_enabled: bool,
    delivered_events: HashSet<u64>,
}

impl NetworkServer {
    pub fn new(adr_enabled: bool) -> Self {
        NetworkServer { adr_enabled, delivered_events: HashSet::new() }
    }

    /// Records a successful gateway delivery of `event_id` from `node_id` at
    /// `rssi`, applying the coarse ADR policy if enabled. `rssi` is `None`
    /// for a failed reception (collision or below sensitivity), which never
    /// counts as a delivery and never feeds ADR.
    ///
    /// Returns `true` if this call is the first delivery seen for
    /// `event_id` (a new, countable uplink); `false` for a duplicate
    /// delivery from another gateway or a failed reception.
    pub fn receive(
        &mut self,
        event_id: u64,
        node_id: usize,
        rssi: Option<f64>,
        nodes: &mut [Node],
        channel: &Channel,
    ) -> bool {
        let Some(rssi) = rssi else {
            return false;
        };

        let is_new = self.delivered_events.insert(event_id);
        if !is_new {
            log::debug!("event {event_id}: duplicate delivery at another gateway, applying ADR only");
        }

        if self.adr_enabled {
            if let Some(node) = nodes.iter_mut().find(|n| n.id == node_id) {
                Self::coarse_adr(node, rssi, channel);
            }
        }

        is_new
    }

    fn coarse_adr(node: &mut Node, rssi: f64, channel: &Channel) {
        let headroom = rssi - channel.sensitivity_dbm(node.sf);
        if headroom > COARSE_ADR_HIGH_MARGIN_DB && node.sf > MIN_SF {
            node.sf -= 1;
            log::debug!("node {}: coarse ADR stepped sf down to {}", node.id, node.sf);
        } else if headroom < COARSE_ADR_LOW_MARGIN_DB && node.sf < MAX_SF {
            node.sf += 1;
            log::debug!("node {}: coarse ADR stepped sf up to {}", node.id, node.sf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_reception_is_not_a_delivery() {
        let mut server = NetworkServer::new(false);
        let mut nodes = vec![Node::new(0, 0.0, 0.0, 7, 14.0)];
        assert!(!server.receive(0, 0, None, &mut nodes, &Channel::default()));
    }

    #[test]
    fn first_delivery_is_new_second_is_duplicate() {
        let mut server = NetworkServer::new(false);
        let mut nodes = vec![Node::new(0, 0.0, 0.0, 7, 14.0)];
        let channel = Channel::default();
        assert!(server.receive(0, 0, Some(-100.0), &mut nodes, &channel));
        assert!(!server.receive(0, 0, Some(-90.0), &mut nodes, &channel));
    }

    #[test]
    fn strong_rssi_steps_sf_down_when_adr_enabled() {
        let mut server = NetworkServer::new(true);
        let mut nodes = vec![Node::new(0, 0.0, 0.0, 10, 14.0)];
        let channel = Channel::default();
        server.receive(0, 0, Some(-80.0), &mut nodes, &channel);
        assert_eq!(nodes[0].sf, 9);
    }

    #[test]
    fn weak_rssi_steps_sf_up_when_adr_enabled() {
        let mut server = NetworkServer::new(true);
        let mut nodes = vec![Node::new(0, 0.0, 0.0, 7, 14.0)];
        let channel = Channel::default();
        let sensitivity = channel.sensitivity_dbm(7);
        server.receive(0, 0, Some(sensitivity + 1.0), &mut nodes, &channel);
        assert_eq!(nodes[0].sf, 8);
    }

    #[test]
    fn adr_disabled_never_touches_sf() {
        let mut server = NetworkServer::new(false);
        let mut nodes = vec![Node::new(0, 0.0, 0.0, 10, 14.0)];
        let channel = Channel::default();
        server.receive(0, 0, Some(-80.0), &mut nodes, &channel);
        assert_eq!(nodes[0].sf, 10);
    }
}
