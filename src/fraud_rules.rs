//! Rule-based fraud alerts driven by face presence over time.
//!
//! Two rules are evaluated on every frame:
//! - absence: no face for longer than `max_no_face_seconds`
//! - multiplicity: more than `max_faces` faces in frame

use crate::{
    constants::{DEFAULT_MAX_FACES, DEFAULT_MAX_NO_FACE_SECONDS},
    Error, Result,
};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::{Duration, Instant};

/// Advisory alert raised by the rule engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FraudAlert {
    /// No face has been seen for longer than the configured timeout
    NoFaceTimeout,
    /// More faces than allowed are in frame
    MultipleFaces,
}

impl FraudAlert {
    /// Stable tag for downstream consumers
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::NoFaceTimeout => "NO_FACE_TIMEOUT",
            Self::MultipleFaces => "MULTIPLE_FACES",
        }
    }
}

impl fmt::Display for FraudAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Serialize for FraudAlert {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

/// Face-presence rule engine.
///
/// Holds a single piece of state: when the current run of zero-face frames
/// started, if one is in progress.
#[derive(Debug, Clone)]
pub struct FraudRuleEngine {
    max_no_face: Duration,
    max_faces: usize,
    no_face_start: Option<Instant>,
}

impl FraudRuleEngine {
    /// Create a rule engine.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `max_no_face_seconds` is negative or not
    /// finite.
    pub fn new(max_no_face_seconds: f64, max_faces: usize) -> Result<Self> {
        let max_no_face = Duration::try_from_secs_f64(max_no_face_seconds).map_err(|_| {
            Error::ConfigError(format!(
                "max_no_face_seconds must be a finite non-negative number, got {max_no_face_seconds}"
            ))
        })?;

        log::info!("Initializing FraudRuleEngine: max_no_face={max_no_face:?}, max_faces={max_faces}");
        Ok(Self {
            max_no_face,
            max_faces,
            no_face_start: None,
        })
    }

    #[must_use]
    pub fn max_no_face(&self) -> Duration {
        self.max_no_face
    }

    #[must_use]
    pub fn max_faces(&self) -> usize {
        self.max_faces
    }

    /// Start of the current absence streak, if any
    #[must_use]
    pub fn no_face_since(&self) -> Option<Instant> {
        self.no_face_start
    }

    /// Evaluate both rules for one frame.
    ///
    /// The absence alert comes first when both fire. The absence timer is not
    /// reset by alerting, so the alert repeats until a face reappears.
    pub fn evaluate(&mut self, face_count: usize, now: Instant) -> Vec<FraudAlert> {
        let mut alerts = Vec::new();

        if face_count == 0 {
            match self.no_face_start {
                None => {
                    log::debug!("Face absence started");
                    self.no_face_start = Some(now);
                }
                Some(start) => {
                    // A clock reading before the start counts as no time elapsed
                    let elapsed = now.saturating_duration_since(start);
                    if elapsed > self.max_no_face {
                        alerts.push(FraudAlert::NoFaceTimeout);
                    }
                }
            }
        } else {
            self.no_face_start = None;
        }

        if face_count > self.max_faces {
            alerts.push(FraudAlert::MultipleFaces);
        }

        if !alerts.is_empty() {
            log::debug!("Fraud alerts for face_count={face_count}: {alerts:?}");
        }
        alerts
    }
}

impl Default for FraudRuleEngine {
    fn default() -> Self {
        Self {
            max_no_face: Duration::from_secs_f64(DEFAULT_MAX_NO_FACE_SECONDS),
            max_faces: DEFAULT_MAX_FACES,
            no_face_start: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absence_timeout() {
        let mut engine = FraudRuleEngine::default();
        let t0 = Instant::now();

        for second in 0..=10u64 {
            let alerts = engine.evaluate(0, t0 + Duration::from_secs(second));
            if second <= 5 {
                assert!(alerts.is_empty(), "unexpected alert at t={second}");
            } else {
                assert_eq!(alerts, vec![FraudAlert::NoFaceTimeout], "missing alert at t={second}");
            }
        }
    }

    #[test]
    fn test_face_resets_timer() {
        let mut engine = FraudRuleEngine::default();
        let t0 = Instant::now();

        engine.evaluate(0, t0);
        assert_eq!(engine.evaluate(0, t0 + Duration::from_secs(6)), vec![FraudAlert::NoFaceTimeout]);
        assert!(engine.evaluate(1, t0 + Duration::from_secs(7)).is_empty());
        assert!(engine.no_face_since().is_none());

        // New streak starts at t=8, so t=12 is only 4s in
        assert!(engine.evaluate(0, t0 + Duration::from_secs(8)).is_empty());
        assert!(engine.evaluate(0, t0 + Duration::from_secs(12)).is_empty());
        assert_eq!(engine.evaluate(0, t0 + Duration::from_secs(14)), vec![FraudAlert::NoFaceTimeout]);
    }

    #[test]
    fn test_multiple_faces() {
        let mut engine = FraudRuleEngine::default();
        let t0 = Instant::now();
        assert!(engine.evaluate(1, t0).is_empty());
        assert_eq!(engine.evaluate(3, t0), vec![FraudAlert::MultipleFaces]);
        assert_eq!(engine.evaluate(2, t0 + Duration::from_secs(100)), vec![FraudAlert::MultipleFaces]);
    }

    #[test]
    fn test_both_rules_with_zero_max_faces() {
        // max_faces = 0 cannot make a zero count fire, so only the absence alert appears
        let mut engine = FraudRuleEngine::new(0.0, 0).unwrap();
        let t0 = Instant::now();
        assert!(engine.evaluate(0, t0).is_empty());
        assert_eq!(
            engine.evaluate(0, t0 + Duration::from_millis(1)),
            vec![FraudAlert::NoFaceTimeout]
        );
        assert_eq!(engine.evaluate(1, t0), vec![FraudAlert::MultipleFaces]);
    }

    #[test]
    fn test_clock_going_backwards() {
        let mut engine = FraudRuleEngine::default();
        let t0 = Instant::now() + Duration::from_secs(60);
        engine.evaluate(0, t0);
        assert!(engine.evaluate(0, t0 - Duration::from_secs(30)).is_empty());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(FraudRuleEngine::new(-1.0, 1), Err(Error::ConfigError(_))));
        assert!(matches!(FraudRuleEngine::new(f64::NAN, 1), Err(Error::ConfigError(_))));
        assert!(matches!(FraudRuleEngine::new(f64::INFINITY, 1), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_alert_tags() {
        assert_eq!(FraudAlert::NoFaceTimeout.to_string(), "NO_FACE_TIMEOUT");
        assert_eq!(FraudAlert::MultipleFaces.tag(), "MULTIPLE_FACES");
    }
}
