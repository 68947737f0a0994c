//! Inverter model seam: configuration, LCL filter parameters, and the
//! per-step advance contract.
//!
//! The physical model is an external collaborator. [`InverterModel`] is its
//! surface; [`ReferenceInverter`] is a deterministic algebraic stand-in so
//! the crate runs and tests without the real model.

use num_complex::Complex64;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ApplicationConfig;

/// LCL filter parameters in base SI units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LclFilter {
    /// Filter-side inductance (H).
    pub lf: f64,
    /// Filter capacitance (F).
    pub cf: f64,
    /// Converter-side inductance (H).
    pub lc: f64,
}

impl LclFilter {
    /// Builds filter parameters from milli/micro-unit values.
    pub fn from_milli_micro(lf_mh: f64, cf_uf: f64, lc_mh: f64) -> Self {
        Self {
            lf: lf_mh * 1.0e-3,
            cf: cf_uf * 1.0e-6,
            lc: lc_mh * 1.0e-3,
        }
    }

    /// Builds filter parameters from the `application` config section.
    pub fn from_config(app: &ApplicationConfig) -> Self {
        Self::from_milli_micro(app.lf_mh, app.cf_uf, app.lc_mh)
    }
}

impl Default for LclFilter {
    fn default() -> Self {
        Self::from_milli_micro(2.0, 20.0, 0.4)
    }
}

/// Input snapshot handed to the model each step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepInputs {
    /// Solar irradiance (W/m^2).
    pub g: f64,
    /// Panel temperature (degrees C).
    pub t: f64,
    /// Control voltage.
    pub ud: f64,
    /// Control frequency (Hz).
    pub fc: f64,
    /// Grid RMS voltage magnitude (V).
    pub vrms: f64,
    /// Control mode.
    pub mode: f64,
    /// Scaled irradiance-voltage product, `0.001 * g * vrms`.
    pub g_vrms: f64,
}

/// Fixed output tuple of one model step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutputs {
    /// DC-link voltage (V).
    pub vdc: f64,
    /// DC-link current (A).
    pub idc: f64,
    /// AC RMS current magnitude (A).
    pub irms: f64,
    /// Terminal voltage phasor (V).
    pub vs: Complex64,
    /// Terminal current phasor (A).
    pub is: Complex64,
}

/// Model failure. Fatal to the run; there is no retry.
#[derive(Debug, Error)]
pub enum ModelError {
    /// `step` was called before `start`.
    #[error("model stepped before start()")]
    NotStarted,
    /// A step produced a non-finite quantity.
    #[error("model produced a non-finite {quantity}")]
    NonFinite {
        /// Name of the offending output.
        quantity: &'static str,
    },
}

/// The physical inverter model collaborator.
///
/// Lifecycle: `configure` once, `set_lcl_filter` once, `start` once, then
/// `step` per timestep with the current input snapshot.
pub trait InverterModel {
    /// Applies model-specific parameters from the `application` section.
    fn configure(&mut self, params: &Map<String, Value>);

    /// Sets the LCL output filter parameters.
    fn set_lcl_filter(&mut self, filter: LclFilter);

    /// One-time startup before the first step.
    ///
    /// # Errors
    ///
    /// Returns a `ModelError` if the model cannot start.
    fn start(&mut self) -> Result<(), ModelError>;

    /// Advances the model one step.
    ///
    /// # Errors
    ///
    /// Returns a `ModelError` if the model was never started or produced a
    /// non-finite quantity.
    fn step(&mut self, inputs: &StepInputs) -> Result<StepOutputs, ModelError>;
}

/// Deterministic algebraic inverter used when no real model is wired in.
///
/// DC power follows the irradiance-voltage product, AC injection is gated
/// by the control mode, and the current phasor picks up a capacitive
/// component from the LCL filter at the control frequency. Identical
/// inputs always produce identical outputs.
#[derive(Debug, Clone)]
pub struct ReferenceInverter {
    filter: LclFilter,
    /// Nominal DC-link voltage (V).
    vdc_nominal: f64,
    /// DC-to-AC conversion efficiency.
    eta: f64,
    started: bool,
}

impl ReferenceInverter {
    /// Creates the reference model with nominal parameters.
    pub fn new() -> Self {
        Self {
            filter: LclFilter::default(),
            vdc_nominal: 380.0,
            eta: 0.97,
            started: false,
        }
    }
}

impl Default for ReferenceInverter {
    fn default() -> Self {
        Self::new()
    }
}

fn finite(value: f64, quantity: &'static str) -> Result<f64, ModelError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::NonFinite { quantity })
    }
}

impl InverterModel for ReferenceInverter {
    fn configure(&mut self, params: &Map<String, Value>) {
        if let Some(vdc) = params.get("vdc_nominal").and_then(Value::as_f64) {
            self.vdc_nominal = vdc;
        }
        if let Some(eta) = params.get("eta").and_then(Value::as_f64) {
            self.eta = eta;
        }
    }

    fn set_lcl_filter(&mut self, filter: LclFilter) {
        self.filter = filter;
    }

    fn start(&mut self) -> Result<(), ModelError> {
        self.started = true;
        Ok(())
    }

    fn step(&mut self, inputs: &StepInputs) -> Result<StepOutputs, ModelError> {
        if !self.started {
            return Err(ModelError::NotStarted);
        }

        // DC side: g_vrms is the 0.001-scaled irradiance-voltage product.
        let p_dc = 1000.0 * inputs.g_vrms;
        let vdc = self.vdc_nominal * (1.0 + 0.05 * inputs.ud);
        let idc = if vdc > 0.0 { p_dc / vdc } else { 0.0 };

        // AC side: active injection only in grid-following mode.
        let grid_following = inputs.mode >= 0.5;
        let i_active = if grid_following && inputs.vrms > 0.0 {
            self.eta * p_dc / inputs.vrms
        } else {
            0.0
        };
        let i_cap = 2.0 * std::f64::consts::PI * inputs.fc * self.filter.cf * inputs.vrms;

        let vs = Complex64::new(inputs.vrms, 0.0);
        let is = Complex64::new(i_active, -i_cap);
        let irms = is.norm();

        Ok(StepOutputs {
            vdc: finite(vdc, "vdc")?,
            idc: finite(idc, "idc")?,
            irms: finite(irms, "irms")?,
            vs,
            is,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> ReferenceInverter {
        let mut model = ReferenceInverter::new();
        model.start().ok();
        model
    }

    fn inputs(g: f64, vrms: f64, mode: f64) -> StepInputs {
        StepInputs {
            g,
            vrms,
            mode,
            fc: 60.0,
            g_vrms: 0.001 * g * vrms,
            ..StepInputs::default()
        }
    }

    #[test]
    fn step_before_start_is_an_error() {
        let mut model = ReferenceInverter::new();
        let result = model.step(&StepInputs::default());
        assert!(matches!(result, Err(ModelError::NotStarted)));
    }

    #[test]
    fn zero_inputs_produce_zero_currents() {
        let mut model = started();
        let out = model.step(&StepInputs::default()).ok();
        assert_eq!(out.map(|o| o.idc), Some(0.0));
        assert_eq!(out.map(|o| o.irms), Some(0.0));
        assert_eq!(out.map(|o| o.vdc), Some(380.0));
    }

    #[test]
    fn irradiance_drives_dc_current() {
        let mut model = started();
        let low = model.step(&inputs(200.0, 240.0, 1.0)).ok();
        let high = model.step(&inputs(900.0, 240.0, 1.0)).ok();
        let (low_idc, high_idc) = (low.map(|o| o.idc), high.map(|o| o.idc));
        assert!(low_idc < high_idc, "idc should rise with irradiance");
        assert!(low_idc > Some(0.0));
    }

    #[test]
    fn standby_mode_gates_active_injection() {
        let mut model = started();
        let standby = model.step(&inputs(800.0, 240.0, 0.0)).ok();
        let following = model.step(&inputs(800.0, 240.0, 1.0)).ok();
        assert_eq!(standby.map(|o| o.is.re), Some(0.0));
        assert!(following.map(|o| o.is.re) > Some(0.0));
    }

    #[test]
    fn filter_capacitance_adds_reactive_current() {
        let mut model = started();
        let out = model.step(&inputs(0.0, 240.0, 0.0)).ok();
        // 2*pi * 60 Hz * 20 uF * 240 V
        let expected = 2.0 * std::f64::consts::PI * 60.0 * 20.0e-6 * 240.0;
        let im = out.map(|o| o.is.im).unwrap_or(f64::NAN);
        assert!((im + expected).abs() < 1e-9, "got {im}, expected {}", -expected);
    }

    #[test]
    fn identical_inputs_are_deterministic() {
        let mut a = started();
        let mut b = started();
        let snapshot = inputs(650.0, 239.5, 1.0);
        assert_eq!(a.step(&snapshot).ok(), b.step(&snapshot).ok());
    }

    #[test]
    fn configure_overrides_nominal_voltage() {
        let mut model = ReferenceInverter::new();
        let params: Map<String, Value> =
            serde_json::from_str(r#"{"vdc_nominal": 420.0, "eta": 0.95}"#).unwrap_or_default();
        model.configure(&params);
        model.start().ok();
        let out = model.step(&StepInputs::default()).ok();
        assert_eq!(out.map(|o| o.vdc), Some(420.0));
    }

    #[test]
    fn lcl_unit_conversion() {
        let filter = LclFilter::from_milli_micro(2.0, 20.0, 0.4);
        assert_eq!(filter.lf, 2.0e-3);
        assert_eq!(filter.cf, 20.0e-6);
        assert_eq!(filter.lc, 0.4e-3);
    }
}
