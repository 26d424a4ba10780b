//! Simulator configuration and construction-time error taxonomy.
//!
//! Mirrors the teacher's `Scene` config in spirit (a `serde`-deserializable
//! struct an external driver can load from a file) but the core never parses
//! that file itself — loading JSON/TOML is left to the external CLI.

use serde::{Deserialize, Serialize};

/// How a node decides when to start its next transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransmissionMode {
    /// Inter-transmission gaps drawn from `Exp(mean = packet_interval)`.
    Random,
    /// Fixed `packet_interval` between transmissions.
    Periodic,
}

/// Construction-time configuration for a [`crate::Simulator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub num_nodes: usize,
    pub num_gateways: usize,
    /// Side length (metres) of the square deployment area.
    pub area_size: f64,
    pub transmission_mode: TransmissionMode,
    /// Mean (Random) or fixed (Periodic) inter-transmission interval, seconds.
    pub packet_interval: f64,
    /// Total packets to send before no further transmissions are scheduled. 0 = unbounded.
    pub packets_to_send: u64,
    /// Enable the node-side ADR policy (§4.5.1).
    pub adr_node: bool,
    /// Enable the network-server-side ADR policy (§4.4) and the server-side
    /// application of node-side ADR requests.
    pub adr_server: bool,
    /// Duty cycle fraction in (0,1]; `None` disables duty-cycle enforcement.
    pub duty_cycle: Option<f64>,
    /// Enable random-teleport mobility every 10 simulated seconds.
    pub mobility: bool,
    /// Seed for the single PRNG shared by placement, interval and shadowing draws.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            num_nodes: 10,
            num_gateways: 1,
            area_size: 1000.0,
            transmission_mode: TransmissionMode::Random,
            packet_interval: 60.0,
            packets_to_send: 0,
            adr_node: false,
            adr_server: false,
            duty_cycle: None,
            mobility: true,
            seed: 0,
        }
    }
}

/// Construction-time configuration errors. All failures are deterministic
/// functions of the supplied configuration; nothing here depends on runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("num_nodes must be positive")]
    InvalidNodeCount,
    #[error("num_gateways must be positive")]
    InvalidGatewayCount,
    #[error("area_size must be positive")]
    InvalidAreaSize,
    #[error("packet_interval must be positive")]
    InvalidPacketInterval,
    #[error("duty_cycle must be in (0,1]")]
    InvalidDutyCycle,
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.num_nodes == 0 {
            return Err(ConfigurationError::InvalidNodeCount);
        }
        if self.num_gateways == 0 {
            return Err(ConfigurationError::InvalidGatewayCount);
        }
        if self.area_size <= 0.0 {
            return Err(ConfigurationError::InvalidAreaSize);
        }
        if self.packet_interval <= 0.0 {
            return Err(ConfigurationError::InvalidPacketInterval);
        }
        if let Some(dc) = self.duty_cycle {
            if dc <= 0.0 || dc > 1.0 {
                return Err(ConfigurationError::InvalidDutyCycle);
            }
        }
        Ok(())
    }
}
