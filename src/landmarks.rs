//! Facial landmark containers in normalized image-fraction coordinates.

use crate::{constants::FACE_MESH_REFINED_LANDMARKS, Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// A single facial landmark. `x` and `y` are fractions of the image width and
/// height with the origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Convert to pixel coordinates for an image of the given size
    #[must_use]
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> (f64, f64) {
        (self.x * f64::from(image_width), self.y * f64::from(image_height))
    }
}

/// One frame's worth of face mesh landmarks, indexed by canonical mesh id.
///
/// Every index the engine reads is guaranteed to be in range, so lookups on a
/// constructed set never fail.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    /// Wrap a landmark vector.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the set has fewer points than the
    /// iris-refined face mesh or contains non-finite coordinates.
    pub fn new(points: Vec<Landmark>) -> Result<Self> {
        if points.len() < FACE_MESH_REFINED_LANDMARKS {
            return Err(Error::InvalidInput(format!(
                "Expected at least {} landmarks, got {}",
                FACE_MESH_REFINED_LANDMARKS,
                points.len()
            )));
        }

        if let Some(idx) = points
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
        {
            return Err(Error::InvalidInput(format!("Landmark {idx} has non-finite coordinates")));
        }

        Ok(Self { points })
    }

    /// Build a set from `(x, y)` pairs
    ///
    /// # Errors
    ///
    /// Same conditions as [`LandmarkSet::new`].
    pub fn from_xy(coords: &[(f64, f64)]) -> Result<Self> {
        Self::new(coords.iter().map(|&(x, y)| Landmark::new(x, y)).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&Landmark> {
        self.points.get(id)
    }

    #[must_use]
    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Arithmetic mean of the `(x, y)` coordinates at the given ids
    pub(crate) fn mean_xy(&self, ids: impl IntoIterator<Item = usize>) -> (f64, f64) {
        let (mut sum_x, mut sum_y, mut n) = (0.0, 0.0, 0usize);
        for id in ids {
            let p = &self.points[id];
            sum_x += p.x;
            sum_y += p.y;
            n += 1;
        }
        if n == 0 {
            return (0.0, 0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let n = n as f64;
        (sum_x / n, sum_y / n)
    }
}

impl Index<usize> for LandmarkSet {
    type Output = Landmark;

    fn index(&self, id: usize) -> &Self::Output {
        &self.points[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_mesh() {
        let points = vec![Landmark::new(0.5, 0.5); 468];
        let result = LandmarkSet::new(points);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut points = vec![Landmark::new(0.5, 0.5); FACE_MESH_REFINED_LANDMARKS];
        points[10].y = f64::NAN;
        match LandmarkSet::new(points) {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("10")),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_mean_xy() {
        let mut points = vec![Landmark::default(); FACE_MESH_REFINED_LANDMARKS];
        points[0] = Landmark::new(0.2, 0.4);
        points[1] = Landmark::new(0.4, 0.8);
        let set = LandmarkSet::new(points).unwrap();
        let (x, y) = set.mean_xy([0, 1]);
        assert!((x - 0.3).abs() < 1e-12);
        assert!((y - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_to_pixels() {
        let p = Landmark::new(0.5, 0.25);
        assert_eq!(p.to_pixels(640, 480), (320.0, 120.0));
    }
}
