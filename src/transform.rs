//! Mutable 2D affine transforms.
//!
//! A [`Transform2D`] maps a point `(x, y)` to
//! `(m00 * x + m10 * y + tx, m01 * x + m11 * y + ty)`, i.e. `(m00, m01)` is the image of the
//! x axis and `(m10, m11)` the image of the y axis. Composition follows function composition:
//! `a.concatenate(&b)` produces a transform that applies `b` first, then `a`.

use std::ops::{Add, Sub};

/// Determinant magnitude below which a transform is treated as non-invertible.
const DET_EPSILON: f32 = 1e-10;

/// A point (or vector) in 2D space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A 2D affine transform: a 2x2 linear part plus a translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2D {
    pub m00: f32,
    pub m01: f32,
    pub m10: f32,
    pub m11: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Transform2D {
    /// Identity transform (no transformation)
    pub const IDENTITY: Self = Self {
        m00: 1.0,
        m01: 0.0,
        m10: 0.0,
        m11: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub const fn new(m00: f32, m01: f32, m10: f32, m11: f32, tx: f32, ty: f32) -> Self {
        Self {
            m00,
            m01,
            m10,
            m11,
            tx,
            ty,
        }
    }

    /// Create a pure translation.
    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Build a transform from scale, rotation (radians) and translation.
    ///
    /// Scale is applied first, then rotation, then translation.
    ///
    /// # Panics
    ///
    /// Panics if either scale component is zero.
    pub fn from_parts(scale_x: f32, scale_y: f32, rotation: f32, tx: f32, ty: f32) -> Self {
        let mut xf = Self::translation(tx, ty);
        xf.set_linear(scale_x, scale_y, rotation);
        xf
    }

    /// Replace the linear part with `scale` and `rotation`, keeping the translation.
    ///
    /// # Panics
    ///
    /// Panics if either scale component is zero.
    pub fn set_linear(&mut self, scale_x: f32, scale_y: f32, rotation: f32) -> &mut Self {
        check_scale(scale_x, scale_y);
        let (sin, cos) = rotation.sin_cos();
        self.m00 = cos * scale_x;
        self.m01 = sin * scale_x;
        self.m10 = -sin * scale_y;
        self.m11 = cos * scale_y;
        self
    }

    /// Set the scale, preserving the current rotation and translation.
    ///
    /// # Panics
    ///
    /// Panics if `sx` or `sy` is zero, since the result would not be invertible.
    pub fn set_scale(&mut self, sx: f32, sy: f32) -> &mut Self {
        let rotation = self.rotation();
        self.set_linear(sx, sy, rotation)
    }

    /// Set the rotation, rebuilding the linear part from the current scale magnitudes.
    ///
    /// Any shear and the sign of the scale are discarded.
    pub fn set_rotation(&mut self, angle: f32) -> &mut Self {
        let (sx, sy) = (self.scale_x(), self.scale_y());
        if sx == 0.0 || sy == 0.0 {
            // a degenerate linear part carries no usable scale; rotate a unit basis instead
            return self.set_linear(1.0, 1.0, angle);
        }
        self.set_linear(sx, sy, angle)
    }

    pub fn set_translation(&mut self, tx: f32, ty: f32) -> &mut Self {
        self.tx = tx;
        self.ty = ty;
        self
    }

    /// Magnitude of the transformed x axis.
    pub fn scale_x(&self) -> f32 {
        (self.m00 * self.m00 + self.m01 * self.m01).sqrt()
    }

    /// Magnitude of the transformed y axis.
    pub fn scale_y(&self) -> f32 {
        (self.m10 * self.m10 + self.m11 * self.m11).sqrt()
    }

    /// Rotation of the transformed x axis, in radians.
    pub fn rotation(&self) -> f32 {
        self.m01.atan2(self.m00)
    }

    pub fn determinant(&self) -> f32 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    /// Compose in place: `self = self ∘ other` (apply `other` first, then `self`).
    pub fn concatenate(&mut self, other: &Transform2D) -> &mut Self {
        *self = self.then(other);
        self
    }

    /// Compose in place: `self = other ∘ self` (apply `self` first, then `other`).
    pub fn pre_concatenate(&mut self, other: &Transform2D) -> &mut Self {
        *self = other.then(self);
        self
    }

    /// Returns `self ∘ other` without modifying either operand.
    pub fn then(&self, other: &Transform2D) -> Transform2D {
        let a = self;
        let b = other;
        Transform2D {
            m00: a.m00 * b.m00 + a.m10 * b.m01,
            m01: a.m01 * b.m00 + a.m11 * b.m01,
            m10: a.m00 * b.m10 + a.m10 * b.m11,
            m11: a.m01 * b.m10 + a.m11 * b.m11,
            tx: a.m00 * b.tx + a.m10 * b.ty + a.tx,
            ty: a.m01 * b.tx + a.m11 * b.ty + a.ty,
        }
    }

    /// Translate in local space (`self ∘ translation(dx, dy)`).
    pub fn translate(&mut self, dx: f32, dy: f32) -> &mut Self {
        self.tx += self.m00 * dx + self.m10 * dy;
        self.ty += self.m01 * dx + self.m11 * dy;
        self
    }

    /// Scale in local space (`self ∘ scale(sx, sy)`).
    ///
    /// # Panics
    ///
    /// Panics if either scale component is zero.
    pub fn scale(&mut self, sx: f32, sy: f32) -> &mut Self {
        check_scale(sx, sy);
        self.m00 *= sx;
        self.m01 *= sx;
        self.m10 *= sy;
        self.m11 *= sy;
        self
    }

    /// Rotate in local space (`self ∘ rotation(angle)`).
    pub fn rotate(&mut self, angle: f32) -> &mut Self {
        let (sin, cos) = angle.sin_cos();
        let rot = Transform2D::new(cos, sin, -sin, cos, 0.0, 0.0);
        self.concatenate(&rot)
    }

    /// Apply the forward mapping to a point.
    pub fn transform(&self, p: Point) -> Point {
        let (x, y) = self.transform_point(p.x, p.y);
        Point::new(x, y)
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.m00 * x + self.m10 * y + self.tx,
            self.m01 * x + self.m11 * y + self.ty,
        )
    }

    /// Map a point through the inverse of this transform.
    ///
    /// Returns `None` when the transform is not invertible (determinant ≈ 0).
    pub fn inverse_transform(&self, p: Point) -> Option<Point> {
        let det = self.determinant();
        if det.abs() < DET_EPSILON {
            return None;
        }
        let x = p.x - self.tx;
        let y = p.y - self.ty;
        Some(Point::new(
            (x * self.m11 - y * self.m10) / det,
            (y * self.m00 - x * self.m01) / det,
        ))
    }

    /// Compute the inverse transform, or `None` if it does not exist.
    pub fn inverse(&self) -> Option<Transform2D> {
        let det = self.determinant();
        if det.abs() < DET_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        Some(Transform2D {
            m00: self.m11 * inv_det,
            m01: -self.m01 * inv_det,
            m10: -self.m10 * inv_det,
            m11: self.m00 * inv_det,
            tx: (self.m10 * self.ty - self.m11 * self.tx) * inv_det,
            ty: (self.m01 * self.tx - self.m00 * self.ty) * inv_det,
        })
    }

    /// Check if this is the identity transform
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn check_scale(sx: f32, sy: f32) {
    assert!(
        sx != 0.0 && sy != 0.0,
        "scale must be non-zero on both axes (got {sx}, {sy})"
    );
}
