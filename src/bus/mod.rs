//! Federation bus seam: the surface of the external co-simulation runtime.
//!
//! The real runtime coordinates logical time across federates; this crate
//! only drives one federate through that surface. [`ScriptedBus`] is the
//! deterministic in-process implementation used for offline replay runs
//! and tests.

pub mod scripted;

pub use scripted::ScriptedBus;

use num_complex::Complex64;
use thiserror::Error;

/// Handle to one registered publication, valid only for the bus that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubHandle(pub(crate) usize);

/// Handle to one subscription, valid only for the bus that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubHandle(pub(crate) usize);

/// A value carried on the bus: scalar double or complex pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BusValue {
    /// Scalar double.
    Double(f64),
    /// Complex pair.
    Complex(Complex64),
}

/// Bus communication failure. Any of these is fatal to the run.
#[derive(Debug, Error)]
pub enum BusError {
    /// Publication handle does not belong to this bus.
    #[error("invalid publication handle {0}")]
    InvalidPublication(usize),
    /// Subscription handle does not belong to this bus.
    #[error("invalid subscription handle {0}")]
    InvalidSubscription(usize),
    /// Operation requires executing mode but the rendezvous never happened.
    #[error("federate has not entered executing mode")]
    NotExecuting,
    /// Operation on a federate that was already finalized.
    #[error("federate already finalized")]
    Finalized,
    /// Stored value kind does not match the requested read.
    #[error("subscription \"{target}\" holds a {held} value, not a {requested}")]
    WrongKind {
        /// Subscription target name.
        target: String,
        /// Kind actually held.
        held: &'static str,
        /// Kind requested by the caller.
        requested: &'static str,
    },
}

/// One federate's view of the co-simulation runtime.
///
/// `request_time` is the only place cross-federate ordering is enforced;
/// its return value is authoritative and may be earlier than the requested
/// horizon. Freshness flags reset when a value is read.
pub trait FederateBus {
    /// Name this federate registered under.
    fn federate_name(&self) -> &str;

    /// Time granted per step (seconds).
    fn period(&self) -> f64;

    /// Advertised publication names, in registration order.
    fn publication_names(&self) -> &[String];

    /// Subscription target names, in registration order.
    fn subscription_targets(&self) -> &[String];

    /// Blocking rendezvous with the rest of the federation.
    ///
    /// # Errors
    ///
    /// Returns a `BusError` if the federate was already finalized.
    fn enter_executing_mode(&mut self) -> Result<(), BusError>;

    /// Whether a fresh value arrived on `sub` since it was last read.
    ///
    /// # Errors
    ///
    /// Returns a `BusError` if the handle is invalid.
    fn is_updated(&self, sub: SubHandle) -> Result<bool, BusError>;

    /// Reads the latest double on `sub`, clearing its freshness flag.
    ///
    /// # Errors
    ///
    /// Returns a `BusError` if the handle is invalid or holds a complex.
    fn read_double(&mut self, sub: SubHandle) -> Result<f64, BusError>;

    /// Reads the latest complex pair on `sub`, clearing its freshness flag.
    ///
    /// # Errors
    ///
    /// Returns a `BusError` if the handle is invalid or holds a double.
    fn read_complex(&mut self, sub: SubHandle) -> Result<Complex64, BusError>;

    /// Publishes a double on `handle`.
    ///
    /// # Errors
    ///
    /// Returns a `BusError` if the handle is invalid or the federate is not
    /// executing.
    fn publish_double(&mut self, handle: PubHandle, value: f64) -> Result<(), BusError>;

    /// Publishes a complex value on `handle`.
    ///
    /// # Errors
    ///
    /// Returns a `BusError` if the handle is invalid or the federate is not
    /// executing.
    fn publish_complex(&mut self, handle: PubHandle, value: Complex64) -> Result<(), BusError>;

    /// Requests an advance toward `requested` and returns the granted time.
    ///
    /// The granted value is what the loop must adopt, not `requested`.
    ///
    /// # Errors
    ///
    /// Returns a `BusError` if the federate is not executing.
    fn request_time(&mut self, requested: f64) -> Result<f64, BusError>;

    /// Releases the federate. Must be called exactly once per run.
    ///
    /// # Errors
    ///
    /// Returns a `BusError` if the federate was already finalized.
    fn finalize(&mut self) -> Result<(), BusError>;
}
