//! Gaze direction classification and gaze-movement counting.
//!
//! The iris center (mean of both irises' boundary points) is compared with the
//! eye center (mean of both eyes' horizontal corners). The offset is bucketed
//! into one of five directions using a small deadzone around zero.

use crate::{
    constants::{DEFAULT_GAZE_DEADZONE, LEFT_EYE_CORNERS, LEFT_IRIS, RIGHT_EYE_CORNERS, RIGHT_IRIS},
    landmarks::LandmarkSet,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete gaze direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GazeDirection {
    #[default]
    Center,
    Left,
    Right,
    Up,
    Down,
}

impl GazeDirection {
    /// Upper-case tag used in reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Center => "CENTER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GazeReading {
    pub direction: GazeDirection,
    /// Horizontal iris offset from the eye center, positive to the right
    pub dx: f64,
    /// Vertical iris offset from the eye center, positive downward
    pub dy: f64,
}

/// Stateful gaze classifier.
///
/// `classify` is pure; only `record` touches the transition state.
#[derive(Debug, Clone)]
pub struct GazeClassifier {
    deadzone: f64,
    last_direction: GazeDirection,
    total_movements: u64,
}

impl GazeClassifier {
    /// Create a classifier with the given deadzone.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the deadzone is negative or not finite.
    pub fn new(deadzone: f64) -> Result<Self> {
        if !deadzone.is_finite() || deadzone < 0.0 {
            return Err(Error::ConfigError(format!(
                "Gaze deadzone must be a finite non-negative number, got {deadzone}"
            )));
        }

        log::info!("Initializing GazeClassifier with deadzone {deadzone}");
        Ok(Self {
            deadzone,
            last_direction: GazeDirection::Center,
            total_movements: 0,
        })
    }

    #[must_use]
    pub fn deadzone(&self) -> f64 {
        self.deadzone
    }

    /// Classify the gaze direction for one landmark set
    #[must_use]
    pub fn classify(&self, landmarks: &LandmarkSet) -> GazeReading {
        let eye_ids = LEFT_EYE_CORNERS.into_iter().chain(RIGHT_EYE_CORNERS);
        let iris_ids = LEFT_IRIS.into_iter().chain(RIGHT_IRIS);

        let (eye_x, eye_y) = landmarks.mean_xy(eye_ids);
        let (iris_x, iris_y) = landmarks.mean_xy(iris_ids);

        let dx = iris_x - eye_x;
        let dy = iris_y - eye_y;

        GazeReading {
            direction: self.classify_offset(dx, dy),
            dx,
            dy,
        }
    }

    /// Bucket an iris offset into a direction.
    ///
    /// The deadzone test is strict, so an offset of exactly `deadzone` is a
    /// movement. When both magnitudes are equal the vertical axis wins.
    #[must_use]
    pub fn classify_offset(&self, dx: f64, dy: f64) -> GazeDirection {
        if dx.abs() < self.deadzone && dy.abs() < self.deadzone {
            return GazeDirection::Center;
        }

        if dx.abs() > dy.abs() {
            if dx > 0.0 {
                GazeDirection::Right
            } else {
                GazeDirection::Left
            }
        } else if dy > 0.0 {
            GazeDirection::Down
        } else {
            GazeDirection::Up
        }
    }

    /// Record a classified direction and return the running movement count.
    ///
    /// Only a change into a non-center direction counts as a movement.
    pub fn record(&mut self, direction: GazeDirection) -> u64 {
        if direction != self.last_direction {
            if direction != GazeDirection::Center {
                self.total_movements += 1;
                log::debug!(
                    "Gaze moved {} -> {} (total {})",
                    self.last_direction,
                    direction,
                    self.total_movements
                );
            }
            self.last_direction = direction;
        }

        self.total_movements
    }

    /// Classify and record in one step
    pub fn update(&mut self, landmarks: &LandmarkSet) -> (GazeReading, u64) {
        let reading = self.classify(landmarks);
        let total = self.record(reading.direction);
        (reading, total)
    }

    #[must_use]
    pub fn total_movements(&self) -> u64 {
        self.total_movements
    }

    #[must_use]
    pub fn last_direction(&self) -> GazeDirection {
        self.last_direction
    }
}

impl Default for GazeClassifier {
    fn default() -> Self {
        Self {
            deadzone: DEFAULT_GAZE_DEADZONE,
            last_direction: GazeDirection::Center,
            total_movements: 0,
        }
    }
}
