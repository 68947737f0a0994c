//! Federate loop driver: read freshest inputs, step the model, publish
//! outputs, record a row, advance logical time until the horizon.

use num_complex::Complex64;
use thiserror::Error;
use tracing::{debug, info};

use crate::bus::{BusError, FederateBus};
use crate::model::{InverterModel, ModelError, StepInputs};
use crate::record::StepRecord;
use crate::signals::{EndpointTable, InputSignal, OutputSignal};

/// Scale applied to the irradiance-voltage product fed to the model.
const GVRMS_SCALE: f64 = 0.001;

/// Fatal run failure. Whatever rows were recorded before it are still
/// available for salvage export.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Runtime communication failure.
    #[error(transparent)]
    Bus(#[from] BusError),
    /// Model step failure.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// The runtime granted a time earlier than the current time.
    #[error("granted time {granted} regressed below current time {current}")]
    TimeRegression {
        /// Time returned by the runtime.
        granted: f64,
        /// Loop time before the request.
        current: f64,
    },
}

/// Latest known value of each input signal.
///
/// Zero until the federation first publishes, then holds the last value
/// between updates indefinitely.
#[derive(Debug, Clone, Copy, Default)]
struct HeldInputs {
    vc: Complex64,
    t: f64,
    g: f64,
    ud: f64,
    fc: f64,
    ctl: f64,
}

/// One federate's control loop around the bus and the inverter model.
///
/// Owns the endpoint table, the held-input state, and the output rows for
/// the duration of the run. The bus is finalized exactly once on every
/// exit path, success or failure.
pub struct FederateDriver<B: FederateBus, M: InverterModel> {
    bus: B,
    model: M,
    endpoints: EndpointTable,
    inputs: HeldInputs,
    tmax: f64,
    time: f64,
    rows: Vec<StepRecord>,
    finalized: bool,
}

impl<B: FederateBus, M: InverterModel> FederateDriver<B, M> {
    /// Creates the driver and resolves endpoints against the bus.
    ///
    /// The model must already be configured and started. Resolution runs
    /// exactly once here; a signal left unresolved stays absent for the
    /// whole run.
    pub fn new(bus: B, model: M, tmax: f64) -> Self {
        let endpoints = EndpointTable::resolve(&bus);
        info!(
            federate = bus.federate_name(),
            publications = bus.publication_names().len(),
            subscriptions = bus.subscription_targets().len(),
            period = bus.period(),
            resolved_publications = endpoints.resolved_publications(),
            resolved_subscriptions = endpoints.resolved_subscriptions(),
            "federate registered"
        );
        Self {
            bus,
            model,
            endpoints,
            inputs: HeldInputs::default(),
            tmax,
            time: 0.0,
            rows: Vec::new(),
            finalized: false,
        }
    }

    /// Runs the loop to the horizon, then finalizes the bus.
    ///
    /// On failure the bus is still finalized and the rows recorded so far
    /// remain accessible through [`FederateDriver::rows`].
    ///
    /// # Errors
    ///
    /// Returns a `DriverError` on any bus or model failure; there is no
    /// retry.
    pub fn run(&mut self) -> Result<(), DriverError> {
        let outcome = self.execute();
        let released = self.finalize_bus();
        outcome.and(released)
    }

    fn execute(&mut self) -> Result<(), DriverError> {
        self.bus.enter_executing_mode()?;
        while self.time < self.tmax {
            self.step_once()?;
            let granted = self.bus.request_time(self.tmax)?;
            if granted < self.time {
                return Err(DriverError::TimeRegression {
                    granted,
                    current: self.time,
                });
            }
            // The granted value is authoritative, not the requested horizon.
            self.time = granted;
        }
        Ok(())
    }

    /// Overwrites held inputs for which the bus reports a fresh value.
    fn refresh_inputs(&mut self) -> Result<(), BusError> {
        for signal in InputSignal::ALL {
            let Some(sub) = self.endpoints.subscription(signal) else {
                continue;
            };
            if !self.bus.is_updated(sub)? {
                continue;
            }
            match signal {
                InputSignal::Vrms => self.inputs.vc = self.bus.read_complex(sub)?,
                InputSignal::G => self.inputs.g = self.bus.read_double(sub)?,
                InputSignal::T => self.inputs.t = self.bus.read_double(sub)?,
                InputSignal::Ud => self.inputs.ud = self.bus.read_double(sub)?,
                InputSignal::Fc => self.inputs.fc = self.bus.read_double(sub)?,
                InputSignal::Ctl => self.inputs.ctl = self.bus.read_double(sub)?,
            }
        }
        Ok(())
    }

    fn step_once(&mut self) -> Result<(), DriverError> {
        self.refresh_inputs()?;

        let vrms = self.inputs.vc.norm();
        let g_vrms = GVRMS_SCALE * self.inputs.g * vrms;
        let snapshot = StepInputs {
            g: self.inputs.g,
            t: self.inputs.t,
            ud: self.inputs.ud,
            fc: self.inputs.fc,
            vrms,
            mode: self.inputs.ctl,
            g_vrms,
        };
        debug!(
            time = self.time,
            vrms,
            g = snapshot.g,
            g_vrms,
            t = snapshot.t,
            ud = snapshot.ud,
            fc = snapshot.fc,
            "stepping model"
        );

        let out = self.model.step(&snapshot)?;
        let ic = Complex64::new(out.irms, 0.0);

        // Each output publishes only under its own resolved handle.
        if let Some(h) = self.endpoints.publication(OutputSignal::Idc) {
            self.bus.publish_double(h, out.idc)?;
        }
        if let Some(h) = self.endpoints.publication(OutputSignal::Vdc) {
            self.bus.publish_double(h, out.vdc)?;
        }
        if let Some(h) = self.endpoints.publication(OutputSignal::Ic) {
            self.bus.publish_complex(h, ic)?;
        }
        if let Some(h) = self.endpoints.publication(OutputSignal::Is) {
            self.bus.publish_complex(h, out.is)?;
        }
        if let Some(h) = self.endpoints.publication(OutputSignal::Vs) {
            self.bus.publish_complex(h, out.vs)?;
        }

        self.rows.push(StepRecord {
            time: self.time,
            g: self.inputs.g,
            t: self.inputs.t,
            ud: self.inputs.ud,
            fc: self.inputs.fc,
            ctl: self.inputs.ctl,
            vc: self.inputs.vc,
            vrms,
            g_vrms,
            vs: out.vs,
            ic,
            is: out.is,
            vdc: out.vdc,
            idc: out.idc,
        });
        Ok(())
    }

    fn finalize_bus(&mut self) -> Result<(), DriverError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.bus.finalize()?;
        Ok(())
    }

    /// Rows recorded so far, in step order.
    pub fn rows(&self) -> &[StepRecord] {
        &self.rows
    }

    /// Consumes the driver and returns the recorded rows.
    pub fn into_rows(self) -> Vec<StepRecord> {
        self.rows
    }

    /// Current logical time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Configured horizon.
    pub fn tmax(&self) -> f64 {
        self.tmax
    }

    /// The underlying bus, for post-run inspection.
    pub fn bus(&self) -> &B {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusValue, ScriptedBus};
    use crate::model::{ReferenceInverter, StepOutputs};

    fn full_bus(period: f64) -> ScriptedBus {
        ScriptedBus::new(
            "pv1",
            period,
            vec![
                "pv1/vdc".to_string(),
                "pv1/idc".to_string(),
                "pv1/Vs".to_string(),
                "pv1/Is".to_string(),
                "pv1/Ic".to_string(),
            ],
            vec![
                "grid/Vrms".to_string(),
                "grid/G".to_string(),
                "grid/T".to_string(),
                "grid/Ud".to_string(),
                "grid/Fc".to_string(),
                "grid/ctl".to_string(),
            ],
        )
    }

    fn started_model() -> ReferenceInverter {
        let mut model = ReferenceInverter::new();
        model.start().ok();
        model
    }

    #[test]
    fn row_count_matches_loop_iterations() {
        let mut driver = FederateDriver::new(full_bus(1.0), started_model(), 4.0);
        assert!(driver.run().is_ok());
        // Rows at t = 0, 1, 2, 3; the grant to 4.0 ends the loop.
        assert_eq!(driver.rows().len(), 4);
        assert_eq!(driver.time(), 4.0);
    }

    #[test]
    fn fractional_final_grant_is_adopted_verbatim() {
        let mut driver = FederateDriver::new(full_bus(1.5), started_model(), 4.0);
        assert!(driver.run().is_ok());
        // Grants: 1.5, 3.0, 4.0 (capped); rows at 0, 1.5, 3.0.
        assert_eq!(driver.rows().len(), 3);
        assert_eq!(driver.time(), 4.0);
        let times: Vec<f64> = driver.rows().iter().map(|r| r.time).collect();
        assert_eq!(times, vec![0.0, 1.5, 3.0]);
    }

    #[test]
    fn time_is_monotonic_and_bounded() {
        let mut driver = FederateDriver::new(full_bus(0.7), started_model(), 5.0);
        assert!(driver.run().is_ok());
        let mut previous = -1.0;
        for row in driver.rows() {
            assert!(row.time > previous);
            assert!(row.time < 5.0);
            previous = row.time;
        }
        assert!(driver.time() <= 5.0);
    }

    #[test]
    fn bus_is_finalized_after_a_successful_run() {
        let mut driver = FederateDriver::new(full_bus(1.0), started_model(), 2.0);
        assert!(driver.run().is_ok());
        assert!(driver.bus().is_finalized());
    }

    #[test]
    fn model_failure_still_finalizes_and_keeps_rows() {
        /// Model that fails on its third step.
        struct FailsOnThird {
            steps: usize,
        }
        impl InverterModel for FailsOnThird {
            fn configure(&mut self, _: &serde_json::Map<String, serde_json::Value>) {}
            fn set_lcl_filter(&mut self, _: crate::model::LclFilter) {}
            fn start(&mut self) -> Result<(), ModelError> {
                Ok(())
            }
            fn step(&mut self, _: &StepInputs) -> Result<StepOutputs, ModelError> {
                self.steps += 1;
                if self.steps >= 3 {
                    return Err(ModelError::NonFinite { quantity: "vdc" });
                }
                Ok(StepOutputs {
                    vdc: 380.0,
                    idc: 0.0,
                    irms: 0.0,
                    vs: Complex64::new(0.0, 0.0),
                    is: Complex64::new(0.0, 0.0),
                })
            }
        }

        let mut driver = FederateDriver::new(full_bus(1.0), FailsOnThird { steps: 0 }, 10.0);
        let result = driver.run();
        assert!(matches!(result, Err(DriverError::Model(_))));
        assert_eq!(driver.rows().len(), 2, "rows before the failure survive");
        assert!(driver.bus().is_finalized(), "bus released on the abort path");
    }

    #[test]
    fn scripted_update_changes_published_output() {
        let mut bus = full_bus(1.0);
        bus.push_event("grid/Vrms", 0.0, BusValue::Complex(Complex64::new(240.0, 0.0)));
        bus.push_event("grid/G", 0.0, BusValue::Double(900.0));
        bus.push_event("grid/ctl", 0.0, BusValue::Double(1.0));

        let mut driver = FederateDriver::new(bus, started_model(), 3.0);
        assert!(driver.run().is_ok());
        assert_eq!(driver.bus().publish_count("pv1/idc"), 3);

        let row = driver.rows().first().copied();
        assert_eq!(row.map(|r| r.vrms), Some(240.0));
        assert_eq!(row.map(|r| r.g_vrms), Some(0.001 * 900.0 * 240.0));
        assert!(row.map(|r| r.idc) > Some(0.0));
    }

    #[test]
    fn absent_output_signal_is_never_published() {
        // Only vdc is advertised; the other four outputs must stay silent.
        let bus = ScriptedBus::new("pv1", 1.0, vec!["pv1/vdc".to_string()], Vec::new());
        let mut driver = FederateDriver::new(bus, started_model(), 3.0);
        assert!(driver.run().is_ok());
        assert_eq!(driver.bus().publish_count("pv1/vdc"), 3);
        assert_eq!(driver.bus().published().len(), 3);
    }

    #[test]
    fn zero_horizon_records_nothing_but_finalizes() {
        let mut driver = FederateDriver::new(full_bus(1.0), started_model(), 0.0);
        assert!(driver.run().is_ok());
        assert!(driver.rows().is_empty());
        assert!(driver.bus().is_finalized());
    }
}
