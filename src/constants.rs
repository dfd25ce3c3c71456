//! Constants used throughout the library

/// Number of points in the face mesh with iris refinement (468 + 2 × 5 iris points)
pub const FACE_MESH_REFINED_LANDMARKS: usize = 478;

/// Horizontal corners of the left eye
pub const LEFT_EYE_CORNERS: [usize; 2] = [33, 133];

/// Horizontal corners of the right eye
pub const RIGHT_EYE_CORNERS: [usize; 2] = [362, 263];

/// Iris boundary points of the left iris
pub const LEFT_IRIS: [usize; 4] = [474, 475, 476, 477];

/// Iris boundary points of the right iris
pub const RIGHT_IRIS: [usize; 4] = [469, 470, 471, 472];

/// Face mesh indices matching `FACE_MODEL_POINTS`, in the same order
pub const POSE_LANDMARK_IDS: [usize; 6] = [1, 152, 33, 263, 61, 291];

/// Reference 3D face model in millimetres: nose tip, chin, left eye corner,
/// right eye corner, left mouth corner, right mouth corner
pub const FACE_MODEL_POINTS: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [0.0, -330.0, -65.0],
    [-225.0, 170.0, -135.0],
    [225.0, 170.0, -135.0],
    [-150.0, -150.0, -125.0],
    [150.0, -150.0, -125.0],
];

/// Default gaze deadzone, as a fraction of image width/height
pub const DEFAULT_GAZE_DEADZONE: f64 = 0.012;

/// Default tolerated face absence before alerting
pub const DEFAULT_MAX_NO_FACE_SECONDS: f64 = 5.0;

/// Default number of faces allowed in frame
pub const DEFAULT_MAX_FACES: usize = 1;

/// Camera matrix center factor
pub const CAMERA_CENTER_FACTOR: f64 = 2.0;

/// Levenberg-Marquardt iteration cap for the PnP refinement. Reaching it
/// returns the best pose found so far.
pub const PNP_MAX_ITERATIONS: usize = 100;

/// Relative step size below which the PnP refinement is considered converged
pub const PNP_STEP_TOLERANCE: f64 = 1e-10;

/// Relative cost decrease below which the PnP refinement is considered converged
pub const PNP_COST_TOLERANCE: f64 = 1e-9;

/// Mean reprojection error (pixels) above which a pose is rejected
pub const PNP_MAX_REPROJECTION_ERROR: f64 = 1e3;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
