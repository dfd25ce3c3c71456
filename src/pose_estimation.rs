use crate::{
    constants::{FACE_MODEL_POINTS, POSE_LANDMARK_IDS},
    landmarks::LandmarkSet,
    pnp::{solve_pnp, CameraIntrinsics},
    Result,
};
use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::Serialize;

/// Head orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeadPoseAngles {
    pub pitch: f64,
    pub yaw: f64,
}

/// Full output of one pose solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSolution {
    /// Rodrigues rotation vector
    pub rotation_vector: Vector3<f64>,
    /// Model origin (nose tip) in camera coordinates, millimetres
    pub translation: Vector3<f64>,
    pub rotation_matrix: Matrix3<f64>,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    /// RMS reprojection error in pixels
    pub reprojection_error: f64,
}

impl PoseSolution {
    #[must_use]
    pub fn angles(&self) -> HeadPoseAngles {
        HeadPoseAngles {
            pitch: self.pitch,
            yaw: self.yaw,
        }
    }
}

/// Head pose estimator using `PnP` against a six-point reference face
pub struct PoseEstimator {
    model_points: [Point3<f64>; 6],
}

impl PoseEstimator {
    /// Create a pose estimator with the built-in reference face
    #[must_use]
    pub fn new() -> Self {
        log::info!("Initializing PoseEstimator with {} model points", FACE_MODEL_POINTS.len());
        Self {
            model_points: FACE_MODEL_POINTS.map(|[x, y, z]| Point3::new(x, y, z)),
        }
    }

    #[must_use]
    pub fn model_points(&self) -> &[Point3<f64>; 6] {
        &self.model_points
    }

    /// Pixel positions of the landmarks matching the reference face points
    #[must_use]
    pub fn image_points(landmarks: &LandmarkSet, image_width: u32, image_height: u32) -> [Point2<f64>; 6] {
        POSE_LANDMARK_IDS.map(|id| {
            let (x, y) = landmarks[id].to_pixels(image_width, image_height);
            Point2::new(x, y)
        })
    }

    /// Solve the head pose and return every intermediate quantity
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The image dimensions are zero
    /// - The landmarks are degenerate (coincident, collinear)
    /// - No starting pose refines to an acceptable reprojection error
    pub fn solve(&self, landmarks: &LandmarkSet, image_width: u32, image_height: u32) -> Result<PoseSolution> {
        let camera = CameraIntrinsics::from_image_size(image_width, image_height)?;
        let image_points = Self::image_points(landmarks, image_width, image_height);

        let solution = solve_pnp(&self.model_points, &image_points, &camera)?;
        log::debug!(
            "PnP solved in {} iterations (converged: {}), reprojection error {:.2}px",
            solution.iterations,
            solution.converged,
            solution.reprojection_error
        );
        let rotation_matrix = *solution.rotation.matrix();
        let euler = Self::rotation_matrix_to_euler(&rotation_matrix);

        Ok(PoseSolution {
            rotation_vector: solution.rotation_vector(),
            translation: solution.translation,
            rotation_matrix,
            pitch: euler[0],
            yaw: euler[1],
            roll: euler[2],
            reprojection_error: solution.reprojection_error,
        })
    }

    /// Estimate pitch and yaw, or `None` when the pose cannot be solved for
    /// this frame
    #[must_use]
    pub fn estimate(&self, landmarks: &LandmarkSet, image_width: u32, image_height: u32) -> Option<HeadPoseAngles> {
        match self.solve(landmarks, image_width, image_height) {
            Ok(solution) => Some(solution.angles()),
            Err(e) => {
                log::debug!("Head pose unavailable: {e}");
                None
            }
        }
    }

    /// Convert a rotation matrix to `[pitch, yaw, roll]` in degrees, for
    /// `R = Rz(roll) · Ry(yaw) · Rx(pitch)`
    #[must_use]
    pub fn rotation_matrix_to_euler(rotation_matrix: &Matrix3<f64>) -> Vector3<f64> {
        let r11 = rotation_matrix[(0, 0)];
        let r21 = rotation_matrix[(1, 0)];
        let r31 = rotation_matrix[(2, 0)];
        let r32 = rotation_matrix[(2, 1)];
        let r33 = rotation_matrix[(2, 2)];

        let pitch = r32.atan2(r33);
        let yaw = (-r31).atan2(r32.hypot(r33));
        let roll = r21.atan2(r11);

        Vector3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
    }
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self::new()
    }
}
