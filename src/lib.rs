//! Proctoring signal engine for webcam-based exam monitoring.
//!
//! Given the facial landmarks of one tracked face (from an external face mesh
//! model) and a face count (from an external face detector), this library
//! derives per frame:
//! - a discrete gaze direction and a running count of gaze movements
//! - head pitch and yaw from `PnP` (Perspective-n-Point) pose solving
//! - rule-based fraud alerts driven by face presence over time
//!
//! The three components are independent and each owns its state. A
//! [`session::ProctorSession`] composes them into one [`session::FrameReport`]
//! per frame.
//!
//! # Examples
//!
//! ## Single components
//!
//! ```no_run
//! use proctor_signals::{
//!     fraud_rules::FraudRuleEngine, gaze::GazeClassifier, landmarks::LandmarkSet,
//!     pose_estimation::PoseEstimator,
//! };
//! use std::time::Instant;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let coords = vec![(0.5, 0.5); 478];
//! // Landmarks from the face mesh model, normalized to [0, 1]
//! let landmarks = LandmarkSet::from_xy(&coords)?;
//!
//! let mut gaze = GazeClassifier::new(0.012)?;
//! let reading = gaze.classify(&landmarks);
//! let total = gaze.record(reading.direction);
//! println!("Gaze {} (dx={:.3}, dy={:.3}), {} movements", reading.direction, reading.dx, reading.dy, total);
//!
//! let pose = PoseEstimator::new();
//! match pose.estimate(&landmarks, 640, 480) {
//!     Some(angles) => println!("Pitch: {:.2}°, Yaw: {:.2}°", angles.pitch, angles.yaw),
//!     None => println!("Head pose unavailable"),
//! }
//!
//! let mut rules = FraudRuleEngine::new(5.0, 1)?;
//! for alert in rules.evaluate(0, Instant::now()) {
//!     println!("ALERT: {alert}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Session from configuration
//!
//! ```no_run
//! use proctor_signals::config::Config;
//! use std::time::Instant;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file("proctor.yaml")?;
//! let mut session = config.create_session()?;
//!
//! // No landmarks this frame, detector saw two faces
//! let report = session.process_frame(None, 2, 640, 480, Instant::now());
//! assert!(report.head_pose.is_none());
//! println!("{:?}", report.alerts);
//! # Ok(())
//! # }
//! ```

/// Facial landmark containers
pub mod landmarks;

/// Gaze direction classification and movement counting
pub mod gaze;

/// Perspective-n-Point solver
pub mod pnp;

/// Head pose estimation from face mesh landmarks
pub mod pose_estimation;

/// Face-presence fraud rules
pub mod fraud_rules;

/// Per-frame composition and the frame loop
pub mod session;

/// Recorded trace replay
pub mod replay;

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
