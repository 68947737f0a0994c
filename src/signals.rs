//! Logical signal vocabulary and one-shot endpoint resolution.
//!
//! Each advertised endpoint name is matched exactly on its trailing
//! `/`-separated segment against the declared signal key. Resolution is
//! best-effort: an unmatched name is logged and never used, and a signal
//! with no endpoint stays absent for the whole run.

use tracing::warn;

use crate::bus::{FederateBus, PubHandle, SubHandle};

/// Value kind carried by a signal on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Scalar double.
    Double,
    /// Complex pair.
    Complex,
}

/// Output signals this federate publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSignal {
    /// DC-link voltage (double).
    Vdc,
    /// DC-link current (double).
    Idc,
    /// Inverter terminal voltage phasor (complex).
    Vs,
    /// Inverter terminal current phasor (complex).
    Is,
    /// Control current phasor built from the RMS magnitude (complex).
    Ic,
}

impl OutputSignal {
    /// Every output signal, in publish order.
    pub const ALL: [OutputSignal; 5] = [
        OutputSignal::Idc,
        OutputSignal::Vdc,
        OutputSignal::Ic,
        OutputSignal::Is,
        OutputSignal::Vs,
    ];

    /// Declared wire key for this signal.
    pub fn key(self) -> &'static str {
        match self {
            OutputSignal::Vdc => "vdc",
            OutputSignal::Idc => "idc",
            OutputSignal::Vs => "Vs",
            OutputSignal::Is => "Is",
            OutputSignal::Ic => "Ic",
        }
    }

    /// Wire kind for this signal.
    pub fn kind(self) -> SignalKind {
        match self {
            OutputSignal::Vdc | OutputSignal::Idc => SignalKind::Double,
            OutputSignal::Vs | OutputSignal::Is | OutputSignal::Ic => SignalKind::Complex,
        }
    }
}

/// Input signals this federate subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSignal {
    /// Grid voltage phasor (complex).
    Vrms,
    /// Solar irradiance (double).
    G,
    /// Panel temperature (double).
    T,
    /// Control voltage (double).
    Ud,
    /// Control frequency (double).
    Fc,
    /// Control mode (double).
    Ctl,
}

impl InputSignal {
    /// Every input signal, in read order.
    pub const ALL: [InputSignal; 6] = [
        InputSignal::Ctl,
        InputSignal::T,
        InputSignal::Ud,
        InputSignal::Fc,
        InputSignal::Vrms,
        InputSignal::G,
    ];

    /// Declared wire key for this signal.
    pub fn key(self) -> &'static str {
        match self {
            InputSignal::Vrms => "Vrms",
            InputSignal::G => "G",
            InputSignal::T => "T",
            InputSignal::Ud => "Ud",
            InputSignal::Fc => "Fc",
            InputSignal::Ctl => "ctl",
        }
    }

    /// Wire kind for this signal.
    pub fn kind(self) -> SignalKind {
        match self {
            InputSignal::Vrms => SignalKind::Complex,
            _ => SignalKind::Double,
        }
    }
}

/// Trailing `/`-separated segment of an endpoint name.
fn leaf(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Resolved endpoint handles, one optional slot per logical signal.
///
/// Built once before the stepping loop; an absent slot means the federation
/// never advertised that signal and it is skipped for the entire run.
#[derive(Debug, Default)]
pub struct EndpointTable {
    vdc: Option<PubHandle>,
    idc: Option<PubHandle>,
    vs: Option<PubHandle>,
    is: Option<PubHandle>,
    ic: Option<PubHandle>,
    vrms: Option<SubHandle>,
    g: Option<SubHandle>,
    t: Option<SubHandle>,
    ud: Option<SubHandle>,
    fc: Option<SubHandle>,
    ctl: Option<SubHandle>,
}

impl EndpointTable {
    /// Resolves the bus's advertised endpoints against the declared schema.
    pub fn resolve(bus: &impl FederateBus) -> Self {
        let mut table = Self::default();

        for (i, name) in bus.publication_names().iter().enumerate() {
            let handle = Some(PubHandle(i));
            match leaf(name) {
                "vdc" => table.vdc = handle,
                "idc" => table.idc = handle,
                "Vs" => table.vs = handle,
                "Is" => table.is = handle,
                "Ic" => table.ic = handle,
                _ => warn!(endpoint = %name, "publication matched no output signal"),
            }
        }

        for (i, target) in bus.subscription_targets().iter().enumerate() {
            let handle = Some(SubHandle(i));
            match leaf(target) {
                "Vrms" => table.vrms = handle,
                "G" => table.g = handle,
                "T" => table.t = handle,
                "Ud" => table.ud = handle,
                "Fc" => table.fc = handle,
                "ctl" => table.ctl = handle,
                _ => warn!(endpoint = %target, "subscription matched no input signal"),
            }
        }

        table
    }

    /// Handle for an output signal, if the federation advertised it.
    pub fn publication(&self, signal: OutputSignal) -> Option<PubHandle> {
        match signal {
            OutputSignal::Vdc => self.vdc,
            OutputSignal::Idc => self.idc,
            OutputSignal::Vs => self.vs,
            OutputSignal::Is => self.is,
            OutputSignal::Ic => self.ic,
        }
    }

    /// Handle for an input signal, if the federation advertised it.
    pub fn subscription(&self, signal: InputSignal) -> Option<SubHandle> {
        match signal {
            InputSignal::Vrms => self.vrms,
            InputSignal::G => self.g,
            InputSignal::T => self.t,
            InputSignal::Ud => self.ud,
            InputSignal::Fc => self.fc,
            InputSignal::Ctl => self.ctl,
        }
    }

    /// Number of resolved publications.
    pub fn resolved_publications(&self) -> usize {
        OutputSignal::ALL
            .iter()
            .filter(|s| self.publication(**s).is_some())
            .count()
    }

    /// Number of resolved subscriptions.
    pub fn resolved_subscriptions(&self) -> usize {
        InputSignal::ALL
            .iter()
            .filter(|s| self.subscription(**s).is_some())
            .count()
    }
}
