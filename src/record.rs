//! Per-step output rows accumulated over the run.

use std::fmt;

use num_complex::Complex64;

/// Complete record of one simulation step: logical time plus every tracked
/// input, derived, and output quantity. Appended once per step, never
/// mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    /// Logical time at the start of the step (seconds).
    pub time: f64,
    /// Solar irradiance input (W/m^2).
    pub g: f64,
    /// Panel temperature input (degrees C).
    pub t: f64,
    /// Control voltage input.
    pub ud: f64,
    /// Control frequency input (Hz).
    pub fc: f64,
    /// Control mode input.
    pub ctl: f64,
    /// Grid voltage phasor input (V).
    pub vc: Complex64,
    /// Derived RMS magnitude of `vc` (V).
    pub vrms: f64,
    /// Derived scaled irradiance-voltage product.
    pub g_vrms: f64,
    /// Terminal voltage phasor output (V).
    pub vs: Complex64,
    /// Control current phasor output (A).
    pub ic: Complex64,
    /// Terminal current phasor output (A).
    pub is: Complex64,
    /// DC-link voltage output (V).
    pub vdc: f64,
    /// DC-link current output (A).
    pub idc: f64,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:6.3} | Vrms={:.3}  G={:.1}  GVrms={:.3}  T={:.3}  Ud={:.3}  \
             Fc={:.3}  ctl={:.1} | vdc={:.3}  idc={:.3}  |Is|={:.3}",
            self.time,
            self.vrms,
            self.g,
            self.g_vrms,
            self.t,
            self.ud,
            self.fc,
            self.ctl,
            self.vdc,
            self.idc,
            self.is.norm(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_time_and_key_quantities() {
        let r = StepRecord {
            time: 2.0,
            g: 950.0,
            t: 25.0,
            ud: 1.0,
            fc: 60.0,
            ctl: 1.0,
            vc: Complex64::new(3.0, 4.0),
            vrms: 5.0,
            g_vrms: 4.75,
            vs: Complex64::new(5.0, 0.0),
            ic: Complex64::new(1.2, 0.0),
            is: Complex64::new(1.2, -0.1),
            vdc: 399.0,
            idc: 11.9,
        };
        let s = format!("{r}");
        assert!(s.contains("Vrms=5.000"));
        assert!(s.contains("G=950.0"));
        assert!(s.contains("vdc=399.000"));
    }
}
