//! Helper functions and test doubles shared by the integration tests

#![allow(dead_code)]

use image::RgbImage;
use nalgebra::{Rotation3, Vector3};
use proctor_signals::{
    constants::{
        FACE_MESH_REFINED_LANDMARKS, FACE_MODEL_POINTS, LEFT_EYE_CORNERS, LEFT_IRIS, POSE_LANDMARK_IDS,
        RIGHT_EYE_CORNERS, RIGHT_IRIS,
    },
    landmarks::LandmarkSet,
    pnp::CameraIntrinsics,
    session::{Clock, FaceDetector, FrameReport, FrameSource, LandmarkProvider, LoopControl, ReportSink},
    Error, Result,
};
use std::cell::Cell;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rotation `Rz(roll) · Ry(yaw) · Rx(pitch)` from angles in degrees
pub fn rotation_from_degrees(pitch: f64, yaw: f64, roll: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), roll.to_radians())
        * Rotation3::from_axis_angle(&Vector3::y_axis(), yaw.to_radians())
        * Rotation3::from_axis_angle(&Vector3::x_axis(), pitch.to_radians())
}

/// Face mesh whose pose landmarks are the reference face projected under the
/// given pose. All other points sit at the image center.
pub fn projected_face(
    pitch: f64,
    yaw: f64,
    roll: f64,
    translation: Vector3<f64>,
    image_width: u32,
    image_height: u32,
) -> LandmarkSet {
    let rotation = rotation_from_degrees(pitch, yaw, roll);
    let camera = CameraIntrinsics::from_image_size(image_width, image_height).unwrap();

    let mut coords = vec![(0.5, 0.5); FACE_MESH_REFINED_LANDMARKS];
    for (&id, [x, y, z]) in POSE_LANDMARK_IDS.iter().zip(FACE_MODEL_POINTS) {
        let pixel = camera
            .project(&(rotation * Vector3::new(x, y, z) + translation))
            .expect("test pose must keep the face in front of the camera");
        coords[id] = (pixel.x / f64::from(image_width), pixel.y / f64::from(image_height));
    }

    LandmarkSet::from_xy(&coords).unwrap()
}

/// Typical face-mesh positions of the pose landmarks for a person facing a
/// 4:3 webcam: nose tip, chin, outer eye corners, mouth corners
pub const FRONTAL_FACE: [(f64, f64); 6] = [
    (0.50, 0.55),
    (0.50, 0.76),
    (0.41, 0.44),
    (0.59, 0.44),
    (0.45, 0.66),
    (0.55, 0.66),
];

/// Face mesh whose pose landmarks sit at the given normalized positions, in
/// nose, chin, eye corners, mouth corners order. All other points sit at the
/// image center.
pub fn mesh_face(pose_points: &[(f64, f64); 6]) -> LandmarkSet {
    let mut coords = vec![(0.5, 0.5); FACE_MESH_REFINED_LANDMARKS];
    for (&id, &point) in POSE_LANDMARK_IDS.iter().zip(pose_points) {
        coords[id] = point;
    }
    LandmarkSet::from_xy(&coords).unwrap()
}

/// Mirror normalized positions about the vertical center line, swapping the
/// left/right pairs so each landmark keeps its anatomical side
pub fn mirrored(pose_points: &[(f64, f64); 6]) -> [(f64, f64); 6] {
    let flip = |i: usize| (1.0 - pose_points[i].0, pose_points[i].1);
    [flip(0), flip(1), flip(3), flip(2), flip(5), flip(4)]
}

/// Face mesh with eye corners centered on (0.5, 0.5) and every iris point
/// offset by (dx, dy)
pub fn gaze_face(dx: f64, dy: f64) -> LandmarkSet {
    let mut coords = vec![(0.5, 0.5); FACE_MESH_REFINED_LANDMARKS];
    for (id, x) in LEFT_EYE_CORNERS.into_iter().chain(RIGHT_EYE_CORNERS).zip([0.38, 0.46, 0.54, 0.62]) {
        coords[id] = (x, 0.5);
    }
    for id in LEFT_IRIS.into_iter().chain(RIGHT_IRIS) {
        coords[id] = (0.5 + dx, 0.5 + dy);
    }
    LandmarkSet::from_xy(&coords).unwrap()
}

/// Frame source that plays a fixed number of blank frames
pub struct BlankFrames {
    remaining: usize,
    width: u32,
    height: u32,
    pub shutdowns: usize,
    pub fail_at: Option<usize>,
    served: usize,
}

impl BlankFrames {
    pub fn new(count: usize, width: u32, height: u32) -> Self {
        Self {
            remaining: count,
            width,
            height,
            shutdowns: 0,
            fail_at: None,
            served: 0,
        }
    }
}

impl FrameSource for BlankFrames {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.fail_at == Some(self.served) {
            return Err(Error::Collaborator("camera unplugged".to_string()));
        }
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.served += 1;
        Ok(Some(RgbImage::new(self.width, self.height)))
    }

    fn shutdown(&mut self) -> Result<()> {
        self.shutdowns += 1;
        Ok(())
    }
}

/// Landmark provider returning a scripted sequence, then nothing
pub struct ScriptedLandmarks(pub VecDeque<Option<LandmarkSet>>);

impl LandmarkProvider for ScriptedLandmarks {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Option<LandmarkSet>> {
        Ok(self.0.pop_front().flatten())
    }
}

/// Face detector returning a scripted sequence of counts, then zero
pub struct ScriptedFaces(pub VecDeque<usize>);

impl FaceDetector for ScriptedFaces {
    fn count_faces(&mut self, _frame: &RgbImage) -> Result<usize> {
        Ok(self.0.pop_front().unwrap_or(0))
    }
}

/// Sink that records every report and optionally stops after `stop_after` frames
#[derive(Default)]
pub struct RecordingSink {
    pub reports: Vec<FrameReport>,
    pub stop_after: Option<usize>,
}

impl ReportSink for RecordingSink {
    fn present(&mut self, _frame: &RgbImage, report: &FrameReport) -> Result<LoopControl> {
        self.reports.push(report.clone());
        if self.stop_after == Some(self.reports.len()) {
            return Ok(LoopControl::Stop);
        }
        Ok(LoopControl::Continue)
    }
}

/// Clock advancing by a fixed step on every reading
pub struct SteppingClock {
    start: Instant,
    step: Duration,
    ticks: Cell<u32>,
}

impl SteppingClock {
    pub fn new(step: Duration) -> Self {
        Self {
            start: Instant::now(),
            step,
            ticks: Cell::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Instant {
        let tick = self.ticks.get();
        self.ticks.set(tick + 1);
        self.start + self.step * tick
    }
}
