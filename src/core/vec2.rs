//! 2D Vector
//!
//! Planar vector math for positions, goals and separation pushes.
//! World units are map pixels; the map center sits at `(radius, radius)`.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use serde::{Serialize, Deserialize};

/// 2D vector with `f32` components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
}

impl Vec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector at `angle` radians (0 = +X, counter-clockwise).
    #[inline]
    pub fn from_angle(angle: f32) -> Self {
        Self { x: angle.cos(), y: angle.sin() }
    }

    /// Point at `distance` from `self` along `angle`.
    #[inline]
    pub fn polar_offset(self, angle: f32, distance: f32) -> Self {
        self + Self::from_angle(angle) * distance
    }

    /// Squared length (prefer this for comparisons).
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Length (magnitude).
    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Bearing from `self` to `other` in radians, as `atan2(dy, dx)`.
    #[inline]
    pub fn angle_to(self, other: Self) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Normalize to unit length.
    /// Returns ZERO if length is zero.
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            return Self::ZERO;
        }
        Self { x: self.x / len, y: self.y / len }
    }

    /// Move toward `target` by at most `max_step`, landing exactly on it
    /// when it is closer than one step.
    pub fn step_toward(self, target: Self, max_step: f32) -> Self {
        let delta = target - self;
        let dist = delta.length();
        if dist <= max_step || dist == 0.0 {
            return target;
        }
        self + delta * (max_step / dist)
    }

    /// Point on the segment from `anchor` toward `self` at `distance` from
    /// `anchor`. Returns `anchor` when the two coincide.
    pub fn at_distance_from(self, anchor: Self, distance: f32) -> Self {
        let dir = (self - anchor).normalize();
        anchor + dir * distance
    }

    /// Check whether both components are finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self { x: self.x + other.x, y: self.y + other.y }
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Self { x: self.x * scalar, y: self.y * scalar }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y }
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({:.2}, {:.2})", self.x, self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!(approx(a.distance(b), 5.0));
        assert!(approx(b.distance(a), 5.0));
    }

    #[test]
    fn test_normalize_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
        let n = Vec2::new(10.0, 0.0).normalize();
        assert!(approx(n.x, 1.0));
        assert!(approx(n.y, 0.0));
    }

    #[test]
    fn test_step_toward_snaps_when_close() {
        let from = Vec2::new(0.0, 0.0);
        let to = Vec2::new(5.0, 0.0);
        assert_eq!(from.step_toward(to, 7.5), to);

        let partial = from.step_toward(Vec2::new(100.0, 0.0), 7.5);
        assert!(approx(partial.x, 7.5));
        assert!(approx(partial.y, 0.0));
    }

    #[test]
    fn test_polar_offset() {
        let center = Vec2::new(2000.0, 2000.0);
        let up = center.polar_offset(-PI / 2.0, 100.0);
        assert!(approx(up.x, 2000.0));
        assert!(approx(up.y, 1900.0));
    }

    #[test]
    fn test_at_distance_from() {
        let anchor = Vec2::new(0.0, 0.0);
        let p = Vec2::new(0.0, 50.0).at_distance_from(anchor, 20.0);
        assert!(approx(p.y, 20.0));
        // Coincident points collapse onto the anchor
        assert_eq!(anchor.at_distance_from(anchor, 20.0), anchor);
    }

    #[test]
    fn test_angle_to() {
        let a = Vec2::new(0.0, 0.0);
        assert!(approx(a.angle_to(Vec2::new(0.0, 1.0)), PI / 2.0));
        assert!(approx(a.angle_to(Vec2::new(-1.0, 0.0)), PI));
    }
}
