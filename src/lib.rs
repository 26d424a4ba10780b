//! Discrete-event simulator core for a LoRa/LoRaWAN-style wireless network.
//!
//! This crate models the physical and MAC-layer behaviour of a network of
//! battery-powered nodes reporting to one or more gateways: path loss and
//! shadowing, LoRa airtime and capture-effect collisions, duty-cycle
//! enforcement, and both node- and server-side adaptive data rate. It is a
//! pure, synchronous, single-threaded simulation kernel — driving it from a
//! CLI, rendering a dashboard, or exporting results to CSV are the job of an
//! external binary built on top of [`Simulator`].
//!
//! Every run is reproducible from its [`config::SimulatorConfig::seed`]: all
//! randomness is drawn from one seeded generator threaded through the
//! kernel, never from a thread-local or process-global source.

pub mod channel;
pub mod config;
pub mod duty_cycle;
pub mod event;
pub mod gateway;
pub mod metrics;
pub mod network_server;
pub mod node;
mod rng;
pub mod simulator;

pub use config::{ConfigurationError, SimulatorConfig, TransmissionMode};
pub use event::{EventKind, ScheduledEvent};
pub use gateway::Gateway;
pub use metrics::{EventLogEntry, EventOutcome, EventRecord, Metrics, MetricsSummary};
pub use network_server::NetworkServer;
pub use node::Node;
pub use simulator::Simulator;
