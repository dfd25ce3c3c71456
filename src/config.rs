//! Configuration management for the proctoring signal engine

use crate::{
    constants::{DEFAULT_GAZE_DEADZONE, DEFAULT_MAX_FACES, DEFAULT_MAX_NO_FACE_SECONDS},
    fraud_rules::FraudRuleEngine,
    gaze::GazeClassifier,
    session::ProctorSession,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gaze classifier configuration
    pub gaze: GazeConfig,

    /// Fraud rule configuration
    pub fraud: FraudConfig,
}

/// Gaze classifier parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Deadzone around the eye center, as a fraction of image width/height
    pub deadzone: f64,
}

/// Fraud rule parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudConfig {
    /// Seconds without a face before `NO_FACE_TIMEOUT` fires
    pub max_no_face_seconds: f64,

    /// Faces allowed in frame before `MULTIPLE_FACES` fires
    pub max_faces: usize,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            deadzone: DEFAULT_GAZE_DEADZONE,
        }
    }
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            max_no_face_seconds: DEFAULT_MAX_NO_FACE_SECONDS,
            max_faces: DEFAULT_MAX_FACES,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and
    /// `Error::ConfigError` if it does not parse or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the text does not parse or fails validation.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if !self.gaze.deadzone.is_finite() || self.gaze.deadzone < 0.0 {
            return Err(Error::ConfigError(
                "Gaze deadzone must be a finite non-negative number".to_string(),
            ));
        }

        if !self.fraud.max_no_face_seconds.is_finite() || self.fraud.max_no_face_seconds < 0.0 {
            return Err(Error::ConfigError(
                "max_no_face_seconds must be a finite non-negative number".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a gaze classifier from configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for an invalid deadzone.
    pub fn create_gaze_classifier(&self) -> Result<GazeClassifier> {
        GazeClassifier::new(self.gaze.deadzone)
    }

    /// Create a fraud rule engine from configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for an invalid absence timeout.
    pub fn create_fraud_engine(&self) -> Result<FraudRuleEngine> {
        FraudRuleEngine::new(self.fraud.max_no_face_seconds, self.fraud.max_faces)
    }

    /// Create a session with all three components
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if any component rejects its parameters.
    pub fn create_session(&self) -> Result<ProctorSession> {
        self.validate()?;
        ProctorSession::from_config(self)
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Proctoring Signal Engine Configuration

# Gaze classification
gaze:
  deadzone: 0.012

# Fraud rules
fraud:
  max_no_face_seconds: 5.0
  max_faces: 1
"#;
