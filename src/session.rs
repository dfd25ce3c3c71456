//! Per-frame composition of the gaze, head pose and fraud components.
//!
//! The collaborators that produce frames, landmarks and face counts, and the
//! layer that renders results, are modelled as traits so the frame loop can
//! run against a camera, a recording or test doubles alike.

use crate::{
    config::Config,
    error::Result,
    fraud_rules::{FraudAlert, FraudRuleEngine},
    gaze::{GazeClassifier, GazeDirection},
    landmarks::LandmarkSet,
    pose_estimation::{HeadPoseAngles, PoseEstimator},
};
use image::RgbImage;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Instant;

/// Supplies successive frames
pub trait FrameSource {
    /// Next frame, or `None` when the source is exhausted
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Release the underlying device or file
    fn shutdown(&mut self) -> Result<()>;
}

/// External face mesh model
pub trait LandmarkProvider {
    /// Landmarks of the tracked face in normalized coordinates, if one was found
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>>;
}

/// External face detector, run independently of the landmark provider
pub trait FaceDetector {
    fn count_faces(&mut self, frame: &RgbImage) -> Result<usize>;
}

/// Whether the frame loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

/// Presentation layer receiving each frame's report
pub trait ReportSink {
    fn present(&mut self, frame: &RgbImage, report: &FrameReport) -> Result<LoopControl>;
}

/// Wall-clock source for the fraud rules
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Monotonic system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Iris offset from the eye center, kept for on-screen debugging
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GazeDebug {
    pub dx: f64,
    pub dy: f64,
}

/// Everything the presentation layer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame_index: u64,
    pub face_count: usize,
    /// Whether the landmark provider returned a face. May disagree with
    /// `face_count`, which comes from a separate detector.
    pub landmarks_present: bool,
    /// `CENTER` when no landmarks were available
    pub gaze_direction: GazeDirection,
    pub total_movements: u64,
    pub gaze_debug: Option<GazeDebug>,
    /// `None` when landmarks were missing or the pose could not be solved
    pub head_pose: Option<HeadPoseAngles>,
    pub alerts: Vec<FraudAlert>,
}

/// Totals for a completed frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub total_movements: u64,
    /// Frames that raised at least one alert
    pub alert_frames: u64,
}

/// One proctoring session: a gaze classifier, a pose estimator and a fraud
/// rule engine, each owning its own state
pub struct ProctorSession {
    gaze: GazeClassifier,
    pose: PoseEstimator,
    fraud: FraudRuleEngine,
    frames_processed: u64,
}

impl ProctorSession {
    #[must_use]
    pub fn new(gaze: GazeClassifier, pose: PoseEstimator, fraud: FraudRuleEngine) -> Self {
        Self {
            gaze,
            pose,
            fraud,
            frames_processed: 0,
        }
    }

    pub(crate) fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.create_gaze_classifier()?,
            PoseEstimator::new(),
            config.create_fraud_engine()?,
        ))
    }

    #[must_use]
    pub fn gaze(&self) -> &GazeClassifier {
        &self.gaze
    }

    #[must_use]
    pub fn fraud(&self) -> &FraudRuleEngine {
        &self.fraud
    }

    #[must_use]
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Run all three components for one frame.
    ///
    /// Gaze and pose only run when landmarks are present; the fraud rules run
    /// on every frame from the detector's face count.
    pub fn process_frame(
        &mut self,
        landmarks: Option<&LandmarkSet>,
        face_count: usize,
        image_width: u32,
        image_height: u32,
        now: Instant,
    ) -> FrameReport {
        let frame_index = self.frames_processed;
        self.frames_processed += 1;

        let (gaze_direction, gaze_debug, head_pose) = match landmarks {
            Some(landmarks) => {
                let (reading, _) = self.gaze.update(landmarks);
                let head_pose = self.pose.estimate(landmarks, image_width, image_height);
                (
                    reading.direction,
                    Some(GazeDebug {
                        dx: reading.dx,
                        dy: reading.dy,
                    }),
                    head_pose,
                )
            }
            None => (GazeDirection::Center, None, None),
        };

        if landmarks.is_some() != (face_count > 0) {
            debug!(
                "Frame {frame_index}: detector saw {face_count} face(s), landmarks present: {}",
                landmarks.is_some()
            );
        }

        let alerts = self.fraud.evaluate(face_count, now);

        FrameReport {
            frame_index,
            face_count,
            landmarks_present: landmarks.is_some(),
            gaze_direction,
            total_movements: self.gaze.total_movements(),
            gaze_debug,
            head_pose,
            alerts,
        }
    }

    /// Drive the frame loop until the source runs dry or the sink asks to
    /// stop. The source is shut down exactly once on every exit path.
    ///
    /// # Errors
    ///
    /// Propagates the first collaborator error; the source is still shut down.
    pub fn run<S, L, D, R, C>(
        &mut self,
        source: &mut S,
        provider: &mut L,
        detector: &mut D,
        sink: &mut R,
        clock: &C,
    ) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        L: LandmarkProvider + ?Sized,
        D: FaceDetector + ?Sized,
        R: ReportSink + ?Sized,
        C: Clock + ?Sized,
    {
        info!("Entering frame loop");
        let outcome = self.drive(source, provider, detector, sink, clock);

        if let Err(e) = source.shutdown() {
            if outcome.is_ok() {
                return Err(e);
            }
            warn!("Frame source shutdown failed: {e}");
        }

        if let Ok(summary) = &outcome {
            info!(
                "Frame loop finished after {} frames, {} gaze movements, {} alert frames",
                summary.frames, summary.total_movements, summary.alert_frames
            );
        }
        outcome
    }

    fn drive<S, L, D, R, C>(
        &mut self,
        source: &mut S,
        provider: &mut L,
        detector: &mut D,
        sink: &mut R,
        clock: &C,
    ) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        L: LandmarkProvider + ?Sized,
        D: FaceDetector + ?Sized,
        R: ReportSink + ?Sized,
        C: Clock + ?Sized,
    {
        let mut summary = RunSummary::default();

        while let Some(frame) = source.next_frame()? {
            let face_count = detector.count_faces(&frame)?;
            let landmarks = provider.detect(&frame)?;

            let report = self.process_frame(
                landmarks.as_ref(),
                face_count,
                frame.width(),
                frame.height(),
                clock.now(),
            );

            summary.frames += 1;
            summary.total_movements = report.total_movements;
            if !report.alerts.is_empty() {
                summary.alert_frames += 1;
            }

            if sink.present(&frame, &report)? == LoopControl::Stop {
                info!("Exit requested by presentation layer");
                break;
            }
        }

        Ok(summary)
    }
}

impl Default for ProctorSession {
    fn default() -> Self {
        Self::new(GazeClassifier::default(), PoseEstimator::new(), FraudRuleEngine::default())
    }
}
