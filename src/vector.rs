// src/vector.rs

use nalgebra::Vector3;

pub type Vec3 = Vector3<f64>;

/// Lower bound returned by [`VectorExt::safe_norm`].
pub const SAFE_NORM_FLOOR: f64 = 1e-6;

/// Extra vector operations used by the force model.
///
/// `norm()` from nalgebra is the raw magnitude and is what boundary tests use.
/// Force and potential terms go through `safe_norm_with`, which never returns
/// less than the floor so that near-coincident bodies do not produce unbounded
/// accelerations.
pub trait VectorExt {
    /// True when the raw magnitude is below `floor`.
    fn is_zero_with(&self, floor: f64) -> bool;

    /// Magnitude, or `floor` when the vector is (near) zero.
    fn safe_norm_with(&self, floor: f64) -> f64;

    /// Cross product stored in `self`.
    fn cross_assign(&mut self, other: &Vec3);

    /// Equality as a zero-test of the difference.
    fn approx_eq(&self, other: &Vec3) -> bool;

    fn is_zero(&self) -> bool {
        self.is_zero_with(SAFE_NORM_FLOOR)
    }

    fn safe_norm(&self) -> f64 {
        self.safe_norm_with(SAFE_NORM_FLOOR)
    }
}

impl VectorExt for Vec3 {
    #[inline(always)]
    fn is_zero_with(&self, floor: f64) -> bool {
        self.norm() < floor
    }

    #[inline(always)]
    fn safe_norm_with(&self, floor: f64) -> f64 {
        let r = self.norm();
        if r < floor {
            floor
        } else {
            r
        }
    }

    fn cross_assign(&mut self, other: &Vec3) {
        *self = self.cross(other);
    }

    fn approx_eq(&self, other: &Vec3) -> bool {
        (self - other).is_zero()
    }
}
