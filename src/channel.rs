//! Radio channel model: path loss, RSSI, airtime and the sensitivity table.
//!
//! Formulas follow the log-distance path loss model with log-normal
//! shadowing, as in the teacher's `signal_calculations` module, specialised
//! to the fixed LoRa physical-layer parameters this core targets (BW 125 kHz,
//! CR 4/5, 8-symbol preamble). Unlike the teacher, `Channel` has no LoRa
//! struct of its own to deserialize — the PHY parameters are fixed constants,
//! only the propagation parameters vary per deployment.

use crate::rng::Rng;

/// SF at or above which the Low Data Rate Optimization flag is set.
const LOW_DATA_RATE_SF_THRESHOLD: u8 = 11;

/// Default payload size (bytes) used for airtime calculations.
pub const DEFAULT_PAYLOAD_BYTES: usize = 20;

/// Immutable radio channel configuration.
#[derive(Debug, Clone)]
pub struct Channel {
    pub frequency_hz: f64,
    pub path_loss_exponent: f64,
    pub shadowing_std_db: f64,
    pub bandwidth_hz: f64,
    /// CR denominator offset; with `coding_rate = 1` the LoRa CR is 4/5, i.e. `coding_rate + 4 == 5`.
    pub coding_rate: u32,
    pub preamble_symbols: f64,
    pub capture_threshold_db: f64,
}

impl Default for Channel {
    fn default() -> Self {
        Channel {
            frequency_hz: 868e6,
            path_loss_exponent: 2.7,
            shadowing_std_db: 6.0,
            bandwidth_hz: 125_000.0,
            coding_rate: 1,
            preamble_symbols: 8.0,
            capture_threshold_db: 6.0,
        }
    }
}

impl Channel {
    /// Receiver sensitivity (dBm) at BW 125 kHz, CR 4/5, for the given spreading factor.
    pub fn sensitivity_dbm(&self, sf: u8) -> f64 {
        match sf {
            7 => -123.0,
            8 => -126.0,
            9 => -129.0,
            10 => -132.0,
            11 => -134.5,
            12 => -137.0,
            _ => f64::NEG_INFINITY,
        }
    }

    /// Required SNR (dB) for reliable demodulation at the given spreading factor.
    pub fn required_snr_db(&self, sf: u8) -> f64 {
        match sf {
            7 => -7.5,
            8 => -10.0,
            9 => -12.5,
            10 => -15.0,
            11 => -17.5,
            12 => -20.0,
            _ => -20.0,
        }
    }

    /// Log-distance path loss (dB) at `distance` metres, `d0 = 1 m`. Returns
    /// 0 for non-positive distances (collocated transmitter and receiver).
    fn path_loss(&self, distance: f64) -> f64 {
        if distance <= 0.0 {
            return 0.0;
        }
        let freq_mhz = self.frequency_hz / 1e6;
        let pl_d0 = 32.45 + 20.0 * freq_mhz.log10() - 60.0;
        pl_d0 + 10.0 * self.path_loss_exponent * distance.max(1.0).log10()
    }

    /// Received signal strength (dBm) at `distance` for a transmitter at `tx_power_dbm`,
    /// including a freshly-sampled log-normal shadowing term.
    pub fn compute_rssi(&self, tx_power_dbm: f64, distance: f64, rng: &mut Rng) -> f64 {
        let loss = self.path_loss(distance) + rng.normal(0.0, self.shadowing_std_db);
        tx_power_dbm - loss
    }

    /// On-air time (seconds) for a packet at the given spreading factor and payload size,
    /// including the preamble (the authoritative formula per the channel's two source revisions).
    pub fn airtime(&self, sf: u8, payload_bytes: usize) -> f64 {
        let symbol_rate = self.bandwidth_hz / 2f64.powi(sf as i32);
        let symbol_time = 1.0 / symbol_rate;
        let de = if sf >= LOW_DATA_RATE_SF_THRESHOLD { 1.0 } else { 0.0 };
        let cr_denom = self.coding_rate as f64 + 4.0;

        let sf_f = sf as f64;
        let payload_f = payload_bytes as f64;
        let numerator = 8.0 * payload_f - 4.0 * sf_f + 28.0 + 16.0;
        let denominator = 4.0 * (sf_f - 2.0 * de);
        let payload_symbols = (numerator / denominator).ceil().max(0.0) * cr_denom + 8.0;

        let preamble_time = (self.preamble_symbols + 4.25) * symbol_time;
        preamble_time + payload_symbols * symbol_time
    }
}
