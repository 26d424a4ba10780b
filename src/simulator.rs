//! Simulation kernel: owns every entity by value and drives them through a
//! single-threaded event loop.
//!
//! Nodes and gateways are referenced only by their stable integer id, never
//! through a shared pointer — the kernel is the sole owner of both `Vec`s,
//! so borrow-checked disjoint access (`self.channel`, `self.rng`,
//! `self.nodes`) replaces the `Rc<RefCell<_>>` graph the teacher's async
//! node tasks use to share state across `embassy` executors.

use std::collections::HashMap;

use crate::channel::{Channel, DEFAULT_PAYLOAD_BYTES};
use crate::config::{ConfigurationError, SimulatorConfig, TransmissionMode};
use crate::duty_cycle::DutyCycleManager;
use crate::event::{EventKind, EventQueue};
use crate::gateway::Gateway;
use crate::metrics::{EventLogEntry, EventOutcome, EventRecord, Metrics, MetricsSummary};
use crate::network_server::NetworkServer;
use crate::node::Node;
use crate::rng::Rng;

/// Mobility is re-rolled on this period (seconds) for every mobile node.
const MOBILITY_PERIOD_S: f64 = 10.0;
/// Fixed transmit power (dBm) every node starts at.
const INITIAL_TX_POWER_DBM: f64 = 14.0;

/// Bookkeeping for a transmission in flight, kept between its `Start` and
/// `End` events since the event log entry can only be finalized once the
/// outcome (capture, collision, or no coverage) is known.
struct PendingTx {
    start_time: f64,
    energy_j: f64,
    heard_by_any: bool,
}

/// Owns the full simulated network and advances it event by event.
pub struct Simulator {
    config: SimulatorConfig,
    channel: Channel,
    duty_cycle: Option<DutyCycleManager>,
    nodes: Vec<Node>,
    gateways: Vec<Gateway>,
    server: NetworkServer,
    queue: EventQueue,
    rng: Rng,
    metrics: Metrics,
    time: f64,
    packets_sent: u64,
    stopped: bool,
    /// Logical transmission id in progress for each node.
    active_tx: HashMap<usize, u64>,
    /// Per-transmission data needed to finalize its event log entry at `End`.
    pending: HashMap<u64, PendingTx>,
    /// Event-queue id of each node's next pending `Start`, kept so the
    /// packet cap can purge it without waiting for it to fire.
    pending_start_id: HashMap<usize, u64>,
    /// Event-queue id of each node's next pending `Mobility` tick, same purpose.
    pending_mobility_id: HashMap<usize, u64>,
    next_event_id: u64,
}

impl Simulator {
    /// Builds a simulator from `config`, placing nodes and gateways and
    /// scheduling each node's first transmission and, if mobility is
    /// enabled, its first mobility tick.
    pub fn new(config: SimulatorConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let duty_cycle = config.duty_cycle.map(DutyCycleManager::new).transpose()?;

        let mut rng = Rng::new(config.seed);
        let channel = Channel::default();

        let nodes: Vec<Node> = (0..config.num_nodes)
            .map(|id| {
                let x = rng.uniform(0.0, config.area_size);
                let y = rng.uniform(0.0, config.area_size);
                let sf = rng.uniform_u8(7, 12);
                Node::new(id, x, y, sf, INITIAL_TX_POWER_DBM)
            })
            .collect();

        let gateways: Vec<Gateway> = if config.num_gateways == 1 {
            vec![Gateway::new(0, config.area_size / 2.0, config.area_size / 2.0)]
        } else {
            (0..config.num_gateways)
                .map(|id| {
                    let x = rng.uniform(0.0, config.area_size);
                    let y = rng.uniform(0.0, config.area_size);
                    Gateway::new(id, x, y)
                })
                .collect()
        };

        let mut sim = Simulator {
            server: NetworkServer::new(config.adr_server),
            queue: EventQueue::new(),
            metrics: Metrics::new(),
            time: 0.0,
            packets_sent: 0,
            stopped: false,
            active_tx: HashMap::new(),
            pending: HashMap::new(),
            pending_start_id: HashMap::new(),
            pending_mobility_id: HashMap::new(),
            next_event_id: 0,
            duty_cycle,
            nodes,
            gateways,
            rng,
            channel,
            config,
        };

        let node_count = sim.nodes.len();
        for node_id in 0..node_count {
            sim.schedule_first_start(node_id);
            if sim.config.mobility {
                let id = sim.queue.schedule(MOBILITY_PERIOD_S, EventKind::Mobility { node_id });
                sim.pending_mobility_id.insert(node_id, id);
            }
        }

        Ok(sim)
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn gateways(&self) -> &[Gateway] {
        &self.gateways
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of events still pending in the queue (cancellations excluded).
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// The `get_metrics()` summary: PDR, collision count, total energy,
    /// average delay over delivered packets, and the current SF distribution.
    pub fn summary(&self) -> MetricsSummary {
        self.metrics.summary(self.packets_sent, &self.nodes)
    }

    /// The published event log, one [`EventRecord`] per resolved transmission
    /// or mobility tick, in resolution order. `final_*` fields are joined
    /// against each node's *current* state at call time, matching the
    /// reference implementation's lazy dataframe construction — call this
    /// again after further steps to see updated final state.
    pub fn events(&self) -> Vec<EventRecord> {
        self.metrics
            .log()
            .iter()
            .map(|entry| {
                let node = &self.nodes[entry.node_id];
                EventRecord {
                    event_id: entry.event_id,
                    node_id: entry.node_id,
                    initial_x: node.initial_x,
                    initial_y: node.initial_y,
                    final_x: node.x,
                    final_y: node.y,
                    initial_sf: node.initial_sf,
                    final_sf: node.sf,
                    initial_tx_power: node.initial_tx_power,
                    final_tx_power: node.tx_power,
                    start_time: entry.start_time,
                    end_time: entry.end_time,
                    energy_j: entry.energy_j,
                    result: entry.outcome,
                    gateway_id: entry.gateway_id,
                }
            })
            .collect()
    }

    /// Requests that the run loop halt after the event currently being
    /// processed; already-scheduled events are discarded, not drained.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    fn schedule_first_start(&mut self, node_id: usize) {
        let offset = match self.config.transmission_mode {
            TransmissionMode::Periodic => self.rng.uniform(0.0, self.config.packet_interval),
            TransmissionMode::Random => self.rng.exponential(self.config.packet_interval),
        };
        self.schedule_start_at(node_id, self.time + offset);
    }

    /// Schedules `node_id`'s next transmission `interval` seconds after
    /// `from_time` (the just-finished transmission's end time), unless the
    /// global packet cap has already been reached (in which case
    /// [`Simulator::purge_future_events`] handles cancelling anything still
    /// pending).
    fn schedule_next_start(&mut self, node_id: usize, from_time: f64) {
        let interval = match self.config.transmission_mode {
            TransmissionMode::Periodic => self.config.packet_interval,
            TransmissionMode::Random => self.rng.exponential(self.config.packet_interval),
        };
        self.schedule_start_at(node_id, from_time + interval);
    }

    fn schedule_start_at(&mut self, node_id: usize, time: f64) {
        let time = match self.duty_cycle.as_ref() {
            Some(dc) => dc.enforce(node_id, time),
            None => time,
        };
        let id = self.queue.schedule(time, EventKind::Start { node_id });
        self.pending_start_id.insert(node_id, id);
    }

    /// Cancels every node's still-pending `Start` and `Mobility` events once
    /// the packet cap is reached, leaving already-scheduled `End` events to
    /// drain normally. Without this, nodes whose first transmission was
    /// scheduled before the cap was hit would keep firing indefinitely.
    fn purge_future_events(&mut self) {
        for (_, id) in self.pending_start_id.drain() {
            self.queue.cancel(id);
        }
        for (_, id) in self.pending_mobility_id.drain() {
            self.queue.cancel(id);
        }
    }

    fn cap_reached(&self) -> bool {
        self.config.packets_to_send > 0 && self.packets_sent >= self.config.packets_to_send
    }

    /// Advances the simulation by exactly one event. Returns `false` if the
    /// queue is exhausted or [`Simulator::stop`] was called (in which case
    /// nothing happens), `true` if an event was processed.
    pub fn step(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        let Some(event) = self.queue.pop() else {
            return false;
        };
        self.time = event.time;
        match event.kind {
            EventKind::Start { node_id } => self.handle_start(node_id),
            EventKind::End { node_id } => self.handle_end(node_id),
            EventKind::Mobility { node_id } => self.handle_mobility(node_id),
        }
        true
    }

    /// Runs until the queue empties, [`Simulator::stop`] is called, or
    /// `until` (if given) is reached.
    pub fn run(&mut self, until: Option<f64>) {
        loop {
            if let Some(limit) = until {
                if self.time >= limit {
                    break;
                }
            }
            if !self.step() {
                break;
            }
        }
    }

    fn handle_start(&mut self, node_id: usize) {
        self.transmit(node_id);
        let end_time = self.nodes[node_id].current_end_time.expect("transmit just set this");
        if self.cap_reached() {
            self.purge_future_events();
        } else {
            self.schedule_next_start(node_id, end_time);
        }
    }

    fn transmit(&mut self, node_id: usize) {
        let (sf, tx_power, x, y) = {
            let node = &self.nodes[node_id];
            (node.sf, node.tx_power, node.x, node.y)
        };
        let airtime = self.channel.airtime(sf, DEFAULT_PAYLOAD_BYTES);
        let end_time = self.time + airtime;

        let power_w = 10f64.powf(tx_power / 10.0) / 1000.0;
        let energy_j = power_w * airtime;

        self.packets_sent += 1;
        if let Some(dc) = self.duty_cycle.as_mut() {
            dc.update_after_tx(node_id, self.time, airtime);
        }

        let event_id = self.next_event_id;
        self.next_event_id += 1;

        let mut heard_by_any = false;
        let mut best_rssi: Option<f64> = None;
        for gw in &mut self.gateways {
            let distance = gw.distance_to(x, y);
            let rssi = self.channel.compute_rssi(tx_power, distance, &mut self.rng);
            if rssi < self.channel.sensitivity_dbm(sf) {
                continue;
            }
            heard_by_any = true;
            if best_rssi.is_none_or(|best| rssi > best) {
                best_rssi = Some(rssi);
            }
            gw.start_reception(event_id, node_id, sf, rssi, end_time, self.channel.capture_threshold_db, self.time);
        }

        let node = &mut self.nodes[node_id];
        node.sent += 1;
        node.in_transmission = true;
        node.current_end_time = Some(end_time);
        node.last_rssi = if heard_by_any { best_rssi } else { None };
        node.add_energy(energy_j);
        self.metrics.add_energy(energy_j);

        self.active_tx.insert(node_id, event_id);
        self.pending.insert(event_id, PendingTx { start_time: self.time, energy_j, heard_by_any });

        self.queue.schedule(end_time, EventKind::End { node_id });
    }

    fn handle_end(&mut self, node_id: usize) {
        let Some(tx_id) = self.active_tx.remove(&node_id) else {
            log::debug!("node {node_id}: End event with no in-flight transmission, ignoring");
            return;
        };
        let pending = self.pending.remove(&tx_id).expect("tx tracked at transmit time");

        let mut delivered_rssi: Option<f64> = None;
        let mut delivered_gateway: Option<usize> = None;
        for gw in &mut self.gateways {
            if let Some(rssi) = gw.end_reception(tx_id) {
                if delivered_rssi.is_none_or(|best| rssi > best) {
                    delivered_rssi = Some(rssi);
                    delivered_gateway = Some(gw.id);
                }
            }
        }

        let delivered = self.server.receive(tx_id, node_id, delivered_rssi, &mut self.nodes, &self.channel);

        let node = &mut self.nodes[node_id];
        node.in_transmission = false;
        node.current_end_time = None;

        let outcome = if delivered {
            node.success += 1;
            EventOutcome::Success
        } else {
            node.collision += 1;
            if pending.heard_by_any {
                EventOutcome::CollisionLoss
            } else {
                EventOutcome::NoCoverage
            }
        };

        self.metrics.record_event(EventLogEntry {
            event_id: tx_id,
            node_id,
            start_time: pending.start_time,
            end_time: self.time,
            energy_j: pending.energy_j,
            outcome,
            gateway_id: delivered_gateway,
        });

        if self.config.adr_node {
            self.nodes[node_id].adr_update(delivered, &self.channel, self.config.adr_server);
        }
    }

    fn handle_mobility(&mut self, node_id: usize) {
        if !self.config.mobility {
            return;
        }
        if self.nodes[node_id].in_transmission {
            let resume_at = self.nodes[node_id].current_end_time.unwrap_or(self.time);
            let id = self.queue.schedule(resume_at, EventKind::Mobility { node_id });
            self.pending_mobility_id.insert(node_id, id);
            return;
        }

        let new_x = self.rng.uniform(0.0, self.config.area_size);
        let new_y = self.rng.uniform(0.0, self.config.area_size);
        let node = &mut self.nodes[node_id];
        node.x = new_x;
        node.y = new_y;
        node.last_move_time = self.time;

        let event_id = self.next_event_id;
        self.next_event_id += 1;
        self.metrics.record_event(EventLogEntry {
            event_id,
            node_id,
            start_time: self.time,
            end_time: self.time,
            energy_j: 0.0,
            outcome: EventOutcome::Mobility,
            gateway_id: None,
        });

        if !self.cap_reached() {
            let id = self.queue.schedule(self.time + MOBILITY_PERIOD_S, EventKind::Mobility { node_id });
            self.pending_mobility_id.insert(node_id, id);
        }
    }
}
