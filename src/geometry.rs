//! Field coordinates.
//!
//! Positions are used exactly as the server reports them; no unit conversion happens here.

use std::ops::{Add, Mul, Sub};

/// Length of the pitch along x.
pub const PITCH_LENGTH: f64 = 105.0;
/// Width of the pitch along y.
pub const PITCH_WIDTH: f64 = 68.0;

/// A point or displacement on the field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
    /// Towards the attacked goal
    pub x: f64,
    /// Across the pitch
    pub y: f64,
}

impl Vector2 {
    /// Creates a vector
    pub const fn new(x: f64, y: f64) -> Self {
        Vector2 { x, y }
    }

    /// Euclidean distance to `other`
    pub fn distance(self, other: Vector2) -> f64 {
        (self - other).norm()
    }

    /// Euclidean norm
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl Add for Vector2 {
    type Output = Vector2;
    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;
    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;
    fn mul(self, rhs: f64) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
}

impl Range {
    /// Creates a range
    pub const fn new(min: f64, max: f64) -> Self {
        Range { min, max }
    }

    /// Affine transform of both bounds: `scale * bound + shift`
    pub fn scaled(self, scale: f64, shift: f64) -> Range {
        Range::new(self.min * scale + shift, self.max * scale + shift)
    }

    /// Value at fraction `t` of the interval
    pub fn lerp(self, t: f64) -> f64 {
        t * (self.max - self.min) + self.min
    }

    /// Clamps `v` into the interval
    pub fn clamp(self, v: f64) -> f64 {
        v.max(self.min).min(self.max)
    }

    /// True when `v` lies outside the interval
    pub fn excludes(self, v: f64) -> bool {
        v < self.min || v > self.max
    }
}

/// The rectangle in which the ball may travel during a trial.
///
/// It is an inset of the real pitch: the half attacked by the offense.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayableArea {
    /// Allowed x interval; `x.max` is the attacked goal line
    pub x: Range,
    /// Allowed y interval
    pub y: Range,
}

impl PlayableArea {
    /// Attacking half of the pitch
    pub const HALF_FIELD: PlayableArea = PlayableArea {
        x: Range::new(-0.1, 0.5 * PITCH_LENGTH),
        y: Range::new(-0.5 * PITCH_WIDTH, 0.5 * PITCH_WIDTH),
    };

    /// True when `p` is outside the rectangle
    pub fn excludes(&self, p: Vector2) -> bool {
        self.x.excludes(p.x) || self.y.excludes(p.y)
    }

    /// Nearest point of the rectangle
    pub fn clamp(&self, p: Vector2) -> Vector2 {
        Vector2::new(self.x.clamp(p.x), self.y.clamp(p.y))
    }
}

impl Default for PlayableArea {
    fn default() -> Self {
        Self::HALF_FIELD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(Vector2::new(0.0, 0.0).distance(Vector2::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn half_field_bounds() {
        let area = PlayableArea::HALF_FIELD;
        assert!(!area.excludes(Vector2::new(0.0, 0.0)));
        assert!(area.excludes(Vector2::new(-0.2, 0.0)));
        assert!(area.excludes(Vector2::new(52.6, 0.0)));
        assert!(area.excludes(Vector2::new(10.0, 34.5)));
        assert_eq!(
            area.clamp(Vector2::new(60.0, -40.0)),
            Vector2::new(52.5, -34.0)
        );
    }
}
