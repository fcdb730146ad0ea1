use std::fmt;
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3d {
    pub const ZERO: Point3d = Point3d {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Point3d {
        Point3d { x, y, z }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Length of the projection on the XY plane.
    pub fn length_xy(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Same direction, length 1. The zero vector stays zero.
    pub fn unit(&self) -> Point3d {
        let len = self.length();
        if len == 0.0 {
            return Point3d::ZERO;
        }
        *self * (1.0 / len)
    }

    /// Angle of the XY projection, in `[0, 2π)`.
    pub fn angle(&self) -> f64 {
        let a = self.y.atan2(self.x);
        if a < 0.0 {
            a + 2.0 * std::f64::consts::PI
        } else {
            a
        }
    }

    /// Counter-clockwise XY angle from `self` to `other`, in `(-2π, 2π)`.
    pub fn angle_between(&self, other: &Point3d) -> f64 {
        other.angle() - self.angle()
    }

    pub fn rotated_z(&self, theta: f64) -> Point3d {
        let (sin, cos) = theta.sin_cos();
        Point3d::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos, self.z)
    }

    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn set(&mut self, axis: Axis, v: f64) {
        match axis {
            Axis::X => self.x = v,
            Axis::Y => self.y = v,
            Axis::Z => self.z = v,
        }
    }
}

impl Add for Point3d {
    type Output = Point3d;
    fn add(self, o: Point3d) -> Point3d {
        Point3d::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Point3d {
    type Output = Point3d;
    fn sub(self, o: Point3d) -> Point3d {
        Point3d::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<f64> for Point3d {
    type Output = Point3d;
    fn mul(self, k: f64) -> Point3d {
        Point3d::new(self.x * k, self.y * k, self.z * k)
    }
}

impl fmt::Display for Point3d {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }
}
