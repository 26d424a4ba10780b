//! Gateway reception handling: concurrent receptions on the shared channel
//! and capture-effect collision resolution between same-SF overlaps.
//!
//! Resolution is eager: the outcome of an overlap is decided the moment the
//! later frame arrives (`start_reception`), not when either frame ends. This
//! is what lets `end_reception` be a plain lookup — by the time a frame ends,
//! its fate was already sealed by whichever later arrivals it raced against.

/// A reception in progress at a gateway. Sensitivity gating happens before a
/// frame ever reaches the gateway (the simulator only calls
/// [`Gateway::start_reception`] for frames at or above the node's SF
/// sensitivity threshold), so every entry here is a candidate for capture.
#[derive(Debug, Clone, Copy)]
pub struct ActiveReception {
    pub event_id: u64,
    pub node_id: usize,
    pub sf: u8,
    pub rssi: f64,
    pub end_time: f64,
    /// Always `false` for an entry actually kept in the active set — a
    /// reception marked lost during capture resolution is removed in the
    /// same step, never left dangling with the flag set. Kept as an
    /// explicit field (rather than inferring loss from absence) to mirror
    /// the reference gateway's state machine.
    lost: bool,
}

/// Fixed receiver in the network.
#[derive(Debug, Clone)]
pub struct Gateway {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    active: Vec<ActiveReception>,
}

impl Gateway {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Gateway { id, x, y, active: Vec::new() }
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }

    /// Registers an incoming transmission ending at `end_time`, resolving
    /// any capture/collision against same-SF frames still in flight at
    /// `now` (i.e. with `end_time > now`). Different spreading factors are
    /// orthogonal at the PHY layer, so only same-SF overlaps interact.
    pub fn start_reception(
        &mut self,
        event_id: u64,
        node_id: usize,
        sf: u8,
        rssi: f64,
        end_time: f64,
        capture_threshold_db: f64,
        now: f64,
    ) {
        let concurrent: Vec<usize> = self
            .active
            .iter()
            .enumerate()
            .filter(|(_, r)| r.sf == sf && r.end_time > now)
            .map(|(i, _)| i)
            .collect();

        if concurrent.is_empty() {
            self.active.push(ActiveReception { event_id, node_id, sf, rssi, end_time, lost: false });
            return;
        }

        // Index, within `concurrent`, of the strongest pre-existing collider;
        // `None` means the new arrival is itself the strongest.
        let mut strongest_pos = None;
        let mut strongest_rssi = rssi;
        for (pos, &idx) in concurrent.iter().enumerate() {
            if self.active[idx].rssi > strongest_rssi {
                strongest_rssi = self.active[idx].rssi;
                strongest_pos = Some(pos);
            }
        }

        let second_strongest_rssi = {
            let mut rssis: Vec<f64> = concurrent.iter().map(|&idx| self.active[idx].rssi).collect();
            rssis.push(rssi);
            rssis.sort_by(f64::total_cmp);
            rssis[rssis.len() - 2]
        };
        let capture = strongest_rssi - second_strongest_rssi >= capture_threshold_db;

        if capture {
            for (pos, &idx) in concurrent.iter().enumerate() {
                if Some(pos) != strongest_pos {
                    self.active[idx].lost = true;
                }
            }
            let mut losers: Vec<usize> =
                concurrent.iter().copied().filter(|&idx| self.active[idx].lost).collect();
            losers.sort_unstable_by(|a, b| b.cmp(a));
            for idx in losers {
                self.active.remove(idx);
            }
            if strongest_pos.is_none() {
                self.active.push(ActiveReception { event_id, node_id, sf, rssi, end_time, lost: false });
            }
            log::debug!("gateway {}: capture resolved concurrent sf={} overlap", self.id, sf);
        } else {
            // Total collision: every collider is lost. Existing concurrent
            // entries are dropped; the new frame is never stored at all —
            // the channel is treated as free for it, a deliberate
            // simplification carried from the reference model.
            let mut idxs = concurrent;
            idxs.sort_unstable_by(|a, b| b.cmp(a));
            for idx in idxs {
                self.active.remove(idx);
            }
            log::debug!("gateway {}: total collision on sf={}, channel freed", self.id, sf);
        }
    }

    /// Resolves the reception identified by `event_id`, which is ending now.
    /// Returns `Some(rssi)` if it is still present and undecided-lost (i.e.
    /// it won or never collided); `None` if a capture/collision already
    /// evicted it in `start_reception`.
    pub fn end_reception(&mut self, event_id: u64) -> Option<f64> {
        let idx = self.active.iter().position(|r| r.event_id == event_id)?;
        let entry = self.active.remove(idx);
        (!entry.lost).then_some(entry.rssi)
    }
}
