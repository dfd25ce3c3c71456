//! Perspective-n-Point solver for a pinhole camera without lens distortion.
//!
//! The pose is initialised with a direct linear transform on normalized image
//! coordinates and, independently, with a face-on pose scaled to the spread of
//! the image points. Both starts are refined with Levenberg-Marquardt on the
//! reprojection error and the lower-error result wins. Rotation updates are
//! applied as left-multiplied increments, so the refinement has no singularity
//! near 180° rotations.

use crate::{
    constants::{
        CAMERA_CENTER_FACTOR, EPSILON, PNP_COST_TOLERANCE, PNP_MAX_ITERATIONS, PNP_MAX_REPROJECTION_ERROR,
        PNP_STEP_TOLERANCE,
    },
    Error, Result,
};
use log::debug;
use nalgebra::{
    DMatrix, Matrix2x3, Matrix2x6, Matrix3x4, Matrix6, Point2, Point3, Rotation3, Vector2, Vector3, Vector6,
    SVD,
};

/// Minimum number of correspondences the linear initialisation needs
pub const MIN_CORRESPONDENCES: usize = 6;

/// Ratio of singular values below which the linear system is treated as rank deficient
const RANK_TOLERANCE: f64 = 1e-9;

const SVD_MAX_ITERATIONS: usize = 500;

/// Pinhole camera intrinsics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Idealized camera for an image: focal length equal to the image width on
    /// both axes and the principal point at the image center.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a zero-sized image.
    pub fn from_image_size(image_width: u32, image_height: u32) -> Result<Self> {
        if image_width == 0 || image_height == 0 {
            return Err(Error::InvalidInput(format!(
                "Image dimensions must be positive, got {image_width}x{image_height}"
            )));
        }

        let focal_length = f64::from(image_width);
        Ok(Self {
            fx: focal_length,
            fy: focal_length,
            cx: f64::from(image_width) / CAMERA_CENTER_FACTOR,
            cy: f64::from(image_height) / CAMERA_CENTER_FACTOR,
        })
    }

    /// Project a point given in camera coordinates. `None` if the point is not
    /// in front of the camera.
    #[must_use]
    pub fn project(&self, point: &Vector3<f64>) -> Option<Point2<f64>> {
        if point.z <= EPSILON {
            return None;
        }
        Some(Point2::new(
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        ))
    }

    fn normalize(&self, pixel: &Point2<f64>) -> Point2<f64> {
        Point2::new((pixel.x - self.cx) / self.fx, (pixel.y - self.cy) / self.fy)
    }
}

/// Rigid transform mapping model coordinates into camera coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnpSolution {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    /// Root-mean-square reprojection error in pixels
    pub reprojection_error: f64,
    /// Levenberg-Marquardt iterations used
    pub iterations: usize,
    /// Whether the refinement met its stopping test before the iteration cap
    pub converged: bool,
}

impl PnpSolution {
    /// Rodrigues rotation vector (axis scaled by angle in radians)
    #[must_use]
    pub fn rotation_vector(&self) -> Vector3<f64> {
        self.rotation.scaled_axis()
    }
}

/// Find the camera pose that maps `object_points` onto `image_points`.
///
/// # Errors
///
/// Returns `Error::InvalidInput` for mismatched or too few correspondences or
/// non-finite coordinates, and `Error::PoseSolveError` when the geometry is
/// degenerate or no starting pose refines to an acceptable reprojection error.
/// Hitting the iteration cap is not an error: the best pose found is returned.
pub fn solve_pnp(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &CameraIntrinsics,
) -> Result<PnpSolution> {
    if object_points.len() != image_points.len() {
        return Err(Error::InvalidInput(format!(
            "Got {} object points but {} image points",
            object_points.len(),
            image_points.len()
        )));
    }
    if object_points.len() < MIN_CORRESPONDENCES {
        return Err(Error::InvalidInput(format!(
            "Expected at least {} correspondences, got {}",
            MIN_CORRESPONDENCES,
            object_points.len()
        )));
    }
    let all_finite = object_points.iter().all(|p| p.coords.iter().all(|v| v.is_finite()))
        && image_points.iter().all(|p| p.coords.iter().all(|v| v.is_finite()));
    if !all_finite {
        return Err(Error::InvalidInput("Correspondences contain non-finite values".to_string()));
    }

    let linear = linear_initial_pose(object_points, image_points, camera)?;
    if linear.is_none() {
        debug!("Linear pose estimate rejected, refining from a face-on pose only");
    }
    let frontal = frontal_initial_pose(object_points, image_points, camera);

    let mut best: Option<PnpSolution> = None;
    let mut last_error = None;
    for (rotation, translation) in linear.into_iter().chain(frontal) {
        match refine(object_points, image_points, camera, rotation, translation) {
            Ok(solution) => {
                if best
                    .as_ref()
                    .map_or(true, |b| solution.reprojection_error < b.reprojection_error)
                {
                    best = Some(solution);
                }
            }
            Err(e) => last_error = Some(e),
        }
    }

    best.ok_or_else(|| {
        last_error.unwrap_or_else(|| Error::PoseSolveError("No usable initial pose".to_string()))
    })
}

/// Direct linear transform estimate of `[R | t]`. `Ok(None)` when the system
/// is well posed but the estimate is unusable (singular, not orthonormalizable
/// or behind the camera).
fn linear_initial_pose(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &CameraIntrinsics,
) -> Result<Option<(Rotation3<f64>, Vector3<f64>)>> {
    // Condition the model points: zero centroid, mean distance sqrt(3)
    #[allow(clippy::cast_precision_loss)]
    let n = object_points.len() as f64;
    let centroid = object_points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
    let mean_distance = object_points.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
    if mean_distance <= EPSILON {
        return Err(Error::PoseSolveError("Model points are coincident".to_string()));
    }
    let scale = 3.0_f64.sqrt() / mean_distance;

    let mut a = DMatrix::<f64>::zeros(2 * object_points.len(), 12);
    for (i, (object, pixel)) in object_points.iter().zip(image_points).enumerate() {
        let x = (object.coords - centroid) * scale;
        let uv = camera.normalize(pixel);
        let homogeneous = [x.x, x.y, x.z, 1.0];
        for (k, &value) in homogeneous.iter().enumerate() {
            a[(2 * i, k)] = value;
            a[(2 * i, 8 + k)] = -uv.x * value;
            a[(2 * i + 1, 4 + k)] = value;
            a[(2 * i + 1, 8 + k)] = -uv.y * value;
        }
    }

    let svd = SVD::try_new(a, false, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or_else(|| Error::PoseSolveError("SVD of the linear system did not converge".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| Error::PoseSolveError("SVD did not produce right singular vectors".to_string()))?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&i, &j| svd.singular_values[i].total_cmp(&svd.singular_values[j]));
    let largest = svd.singular_values[order[order.len() - 1]];
    let second_smallest = svd.singular_values[order[1]];
    if largest <= EPSILON || second_smallest / largest < RANK_TOLERANCE {
        return Err(Error::PoseSolveError("Correspondences are degenerate".to_string()));
    }

    let null_vector = v_t.row(order[0]);
    let conditioned = Matrix3x4::from_fn(|r, c| null_vector[4 * r + c]);

    // Undo the conditioning: P = P' * T with T = [s·I, -s·c; 0, 1]
    let m = conditioned.fixed_view::<3, 3>(0, 0) * scale;
    let p4 = conditioned.column(3) - m * centroid;

    // For m = λR the determinant is λ³ and ‖m‖ = |λ|·√3
    let det = m.determinant();
    let reference = (m.norm() / 3.0_f64.sqrt()).powi(3);
    if !det.is_finite() || reference <= 0.0 || det.abs() <= RANK_TOLERANCE * reference {
        return Ok(None);
    }
    let lambda = det.cbrt();

    let Some(m_svd) = SVD::try_new(m / lambda, true, true, f64::EPSILON, SVD_MAX_ITERATIONS) else {
        return Ok(None);
    };
    let (Some(u), Some(v_t)) = (m_svd.u, m_svd.v_t) else {
        return Ok(None);
    };
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        r = -r;
    }
    let rotation = Rotation3::from_matrix_unchecked(r);
    let translation = p4 / lambda;

    let in_front = object_points
        .iter()
        .all(|p| (rotation * p.coords + translation).z > EPSILON);
    if !in_front {
        return Ok(None);
    }

    Ok(Some((rotation, translation)))
}

/// Face-on starting pose: model y up and z toward the camera (a half turn
/// about x), centered on the image points at the depth where the model's
/// spread matches theirs. `None` if either spread vanishes.
fn frontal_initial_pose(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &CameraIntrinsics,
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    #[allow(clippy::cast_precision_loss)]
    let n = object_points.len() as f64;
    let rotation = Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI);

    let rotated: Vec<Vector3<f64>> = object_points.iter().map(|p| rotation * p.coords).collect();
    let model_centroid = rotated.iter().fold(Vector3::zeros(), |acc, p| acc + p) / n;
    let model_spread = rotated.iter().map(|p| (p - model_centroid).xy().norm()).sum::<f64>() / n;

    let normalized: Vec<Vector2<f64>> = image_points.iter().map(|p| camera.normalize(p).coords).collect();
    let image_centroid = normalized.iter().fold(Vector2::zeros(), |acc, p| acc + p) / n;
    let image_spread = normalized.iter().map(|p| (p - image_centroid).norm()).sum::<f64>() / n;

    if model_spread <= EPSILON || image_spread <= EPSILON {
        return None;
    }

    let depth = model_spread / image_spread;
    let translation = Vector3::new(image_centroid.x * depth, image_centroid.y * depth, depth) - model_centroid;
    Some((rotation, translation))
}

/// Sum of squared reprojection residuals, `None` if any point falls behind the camera
fn reprojection_cost(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &CameraIntrinsics,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Option<f64> {
    let mut cost = 0.0;
    for (object, pixel) in object_points.iter().zip(image_points) {
        let projected = camera.project(&(rotation * object.coords + translation))?;
        cost += (projected - pixel).norm_squared();
    }
    Some(cost)
}

/// Gauss-Newton normal equations `JᵀJ` and `Jᵀr` for a left-multiplied
/// rotation increment and an additive translation increment
fn normal_equations(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &CameraIntrinsics,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Option<(Matrix6<f64>, Vector6<f64>)> {
    let mut jtj = Matrix6::zeros();
    let mut jtr = Vector6::zeros();

    for (object, pixel) in object_points.iter().zip(image_points) {
        let rotated = rotation * object.coords;
        let p = rotated + translation;
        let projected = camera.project(&p)?;
        let residual: Vector2<f64> = projected - pixel;

        let inv_z = 1.0 / p.z;
        let d_projection = Matrix2x3::new(
            camera.fx * inv_z,
            0.0,
            -camera.fx * p.x * inv_z * inv_z,
            0.0,
            camera.fy * inv_z,
            -camera.fy * p.y * inv_z * inv_z,
        );

        let mut jacobian = Matrix2x6::zeros();
        jacobian
            .fixed_view_mut::<2, 3>(0, 0)
            .copy_from(&(d_projection * -rotated.cross_matrix()));
        jacobian.fixed_view_mut::<2, 3>(0, 3).copy_from(&d_projection);

        jtj += jacobian.transpose() * jacobian;
        jtr += jacobian.transpose() * residual;
    }

    Some((jtj, jtr))
}

fn refine(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &CameraIntrinsics,
    mut rotation: Rotation3<f64>,
    mut translation: Vector3<f64>,
) -> Result<PnpSolution> {
    let mut cost = reprojection_cost(object_points, image_points, camera, &rotation, &translation)
        .ok_or_else(|| Error::PoseSolveError("Initial pose places points behind the camera".to_string()))?;
    let mut damping = 1e-3;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < PNP_MAX_ITERATIONS {
        iterations += 1;

        let (jtj, jtr) = normal_equations(object_points, image_points, camera, &rotation, &translation)
            .ok_or_else(|| Error::PoseSolveError("Pose left the camera frustum".to_string()))?;
        if jtr.amax() <= EPSILON * (1.0 + cost) {
            converged = true;
            break;
        }

        let augmented = jtj + Matrix6::from_diagonal(&jtj.diagonal().map(|d| damping * d.max(EPSILON)));
        let Some(step) = augmented.cholesky().map(|c| c.solve(&-jtr)) else {
            damping *= 10.0;
            continue;
        };

        let delta_rotation = Vector3::new(step[0], step[1], step[2]);
        let delta_translation = Vector3::new(step[3], step[4], step[5]);
        let candidate_rotation = Rotation3::from_scaled_axis(delta_rotation) * rotation;
        let candidate_translation = translation + delta_translation;

        match reprojection_cost(object_points, image_points, camera, &candidate_rotation, &candidate_translation) {
            Some(candidate_cost) if candidate_cost <= cost => {
                let decrease = cost - candidate_cost;
                rotation = candidate_rotation;
                translation = candidate_translation;
                cost = candidate_cost;
                damping = (damping / 10.0).max(1e-12);

                let step_small = delta_rotation.norm() <= PNP_STEP_TOLERANCE
                    && delta_translation.norm() <= PNP_STEP_TOLERANCE * (1.0 + translation.norm());
                if step_small || decrease <= PNP_COST_TOLERANCE * cost {
                    converged = true;
                    break;
                }
            }
            _ => {
                damping *= 10.0;
                if damping > 1e12 {
                    // No downhill step left at any damping: at a minimum
                    converged = true;
                    break;
                }
            }
        }
    }

    if !converged {
        debug!("PnP refinement stopped at the {PNP_MAX_ITERATIONS}-iteration cap with cost {cost:.3e}");
    }

    #[allow(clippy::cast_precision_loss)]
    let reprojection_error = (cost / object_points.len() as f64).sqrt();
    if !reprojection_error.is_finite() || reprojection_error > PNP_MAX_REPROJECTION_ERROR {
        return Err(Error::PoseSolveError(format!(
            "Reprojection error {reprojection_error:.2}px is out of range"
        )));
    }

    Ok(PnpSolution {
        rotation,
        translation,
        reprojection_error,
        iterations,
        converged,
    })
}
