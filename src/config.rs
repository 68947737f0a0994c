//! JSON federate configuration shared with the co-simulation runtime.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Top-level federate configuration parsed from JSON.
///
/// The same document is handed to the federation runtime, so unknown keys
/// are tolerated everywhere. Load with [`FederateConfig::from_json_file`].
#[derive(Debug, Clone, Deserialize)]
pub struct FederateConfig {
    /// Simulation horizon, timing, and model parameters.
    pub application: ApplicationConfig,
    /// Offline federation description for the scripted bus.
    #[serde(default)]
    pub federation: FederationConfig,
}

/// `application` section: horizon, timing, and model parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    /// Federate name announced to the federation.
    #[serde(default = "default_name")]
    pub name: String,
    /// Simulation horizon in seconds. Required; the loop cannot run without it.
    #[serde(rename = "Tmax")]
    pub tmax: f64,
    /// Time granted per step by the runtime (seconds).
    #[serde(default = "default_period")]
    pub period: f64,
    /// Filter-side inductance (mH).
    #[serde(rename = "Lf_mH", default = "default_lf_mh")]
    pub lf_mh: f64,
    /// Filter capacitance (uF).
    #[serde(rename = "Cf_uF", default = "default_cf_uf")]
    pub cf_uf: f64,
    /// Converter-side inductance (mH).
    #[serde(rename = "Lc_mH", default = "default_lc_mh")]
    pub lc_mh: f64,
    /// Remaining model-specific keys, handed to the model collaborator as-is.
    #[serde(flatten)]
    pub model_params: Map<String, Value>,
}

fn default_name() -> String {
    "pv1".to_string()
}

fn default_period() -> f64 {
    1.0
}

fn default_lf_mh() -> f64 {
    2.0
}

fn default_cf_uf() -> f64 {
    20.0
}

fn default_lc_mh() -> f64 {
    0.4
}

/// `federation` section: advertised endpoints and the input script used by
/// the offline scripted bus.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FederationConfig {
    /// Advertised publication names (e.g. `"pv1/vdc"`).
    #[serde(default)]
    pub publications: Vec<String>,
    /// Subscription target names (e.g. `"grid/Vrms"`).
    #[serde(default)]
    pub subscriptions: Vec<String>,
    /// Time-ordered scripted input events.
    #[serde(default)]
    pub script: Vec<ScriptEvent>,
}

/// One scripted input arrival: the named target receives `value` at `time`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEvent {
    /// Subscription target the value arrives on.
    pub target: String,
    /// Logical arrival time (seconds).
    pub time: f64,
    /// The delivered value.
    #[serde(flatten)]
    pub value: ScriptValue,
}

/// A scripted value: scalar double or complex pair.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    /// Complex pair, written as `{"re": .., "im": ..}`.
    Complex {
        /// Real part.
        re: f64,
        /// Imaginary part.
        im: f64,
    },
    /// Scalar, written as `{"value": ..}`.
    Double {
        /// Scalar value.
        value: f64,
    },
}

/// Configuration error: unreadable file, malformed JSON, or a field
/// violating a constraint.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("config error: cannot read \"{path}\": {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Document is not valid JSON or is missing a required key.
    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),
    /// A parsed field violates a constraint.
    #[error("config error: {field}: {message}")]
    Invalid {
        /// Dotted field path (e.g. `"application.Tmax"`).
        field: String,
        /// Constraint description.
        message: String,
    },
}

impl FederateConfig {
    /// Parses a federate configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read, the JSON is
    /// malformed, or `application.Tmax` is missing.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    /// Parses a federate configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the JSON is malformed or
    /// `application.Tmax` is missing.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let app = &self.application;

        if !(app.tmax > 0.0) {
            errors.push(ConfigError::Invalid {
                field: "application.Tmax".into(),
                message: "must be > 0".into(),
            });
        }
        if !(app.period > 0.0) {
            errors.push(ConfigError::Invalid {
                field: "application.period".into(),
                message: "must be > 0".into(),
            });
        }
        for (field, value) in [
            ("application.Lf_mH", app.lf_mh),
            ("application.Cf_uF", app.cf_uf),
            ("application.Lc_mH", app.lc_mh),
        ] {
            if !(value > 0.0) {
                errors.push(ConfigError::Invalid {
                    field: field.into(),
                    message: "must be > 0".into(),
                });
            }
        }

        let fed = &self.federation;
        for event in &fed.script {
            if !fed.subscriptions.iter().any(|s| s == &event.target) {
                errors.push(ConfigError::Invalid {
                    field: "federation.script".into(),
                    message: format!(
                        "target \"{}\" is not a declared subscription",
                        event.target
                    ),
                });
            }
            if event.time < 0.0 {
                errors.push(ConfigError::Invalid {
                    field: "federation.script".into(),
                    message: format!("event time {} must be >= 0", event.time),
                });
            }
        }

        errors
    }
}
