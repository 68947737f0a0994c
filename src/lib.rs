//! Single-federate driver for a time-stepped PV inverter co-simulation.
//!
//! One federate's control loop: read the freshest inputs from the
//! federation bus, advance the inverter model one step, publish outputs,
//! record a row, advance logical time, and export the recorded rows when
//! the horizon is reached.

/// Federation bus seam and the deterministic scripted implementation.
pub mod bus;
pub mod config;
pub mod driver;
pub mod io;
/// Inverter model seam, LCL filter parameters, and the reference model.
pub mod model;
pub mod record;
pub mod signals;
