//! Machine coordinates to motor coordinates.
use crate::point::Point3d;

pub trait Transformer {
    /// Maps a machine position (mm) to the motor axes (mm of travel).
    fn transform(&self, p: Point3d) -> Point3d;
}

/// Cartesian machine, every motor drives one coordinate axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cartesian;

impl Transformer for Cartesian {
    fn transform(&self, p: Point3d) -> Point3d {
        p
    }
}

/// Wall plotter: the pen hangs from two cords wound up by motor A in the
/// upper left and motor B in the upper right corner of a `width` x `height`
/// plane. X and Y become cord lengths relative to the origin, Z is kept.
///
/// ```text
///   A            B
///    \          /
///     \        /
///      \      /
///       \    /
///        \  /
///         p
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PlotterTransformer {
    motor_a: Point3d,
    motor_b: Point3d,
    /// Cord length at the origin.
    zero: f64,
    scale: f64,
}

impl PlotterTransformer {
    pub fn new(width: f64, height: f64, scale: f64) -> PlotterTransformer {
        let (w, h) = (width / 2.0, height / 2.0);
        PlotterTransformer {
            motor_a: Point3d::new(-w, -h, 0.0),
            motor_b: Point3d::new(w, -h, 0.0),
            zero: w.hypot(h),
            scale,
        }
    }

    pub fn motor_a(&self) -> Point3d {
        self.motor_a
    }

    pub fn motor_b(&self) -> Point3d {
        self.motor_b
    }
}

impl Transformer for PlotterTransformer {
    fn transform(&self, p: Point3d) -> Point3d {
        let a = self.zero - (self.motor_a - p).length_xy();
        let b = self.zero - (self.motor_b - p).length_xy();
        Point3d::new(a * self.scale, b * self.scale, p.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn cartesian_passes_through() {
        let p = Point3d::new(1.0, -2.0, 3.0);
        assert_eq!(Cartesian.transform(p), p);
    }

    #[test]
    fn plotter_origin_is_zero() {
        let t = PlotterTransformer::new(1000.0, 500.0, 20.0);
        let o = t.transform(Point3d::ZERO);
        assert!(close(o.x, 0.0) && close(o.y, 0.0) && close(o.z, 0.0));
    }

    #[test]
    fn plotter_cords() {
        let t = PlotterTransformer::new(1000.0, 500.0, 1.0);
        let zero = 500f64.hypot(250.0);
        // pen at motor A: cord A fully wound
        let at_a = t.transform(t.motor_a());
        assert!(close(at_a.x, zero));
        assert!(close(at_a.y, zero - 1000.0));

        // moving right shortens B and lengthens A, mirrored around X=0
        let right = t.transform(Point3d::new(10.0, 0.0, 7.0));
        let left = t.transform(Point3d::new(-10.0, 0.0, 7.0));
        assert!(right.x < 0.0 && right.y > 0.0);
        assert!(close(right.x, left.y) && close(right.y, left.x));
        assert!(close(right.z, 7.0));
        assert!(close(right.x, zero - 510f64.hypot(250.0)));
    }

    #[test]
    fn plotter_scale() {
        let p = Point3d::new(3.0, 4.0, 1.0);
        let one = PlotterTransformer::new(100.0, 80.0, 1.0).transform(p);
        let ten = PlotterTransformer::new(100.0, 80.0, 10.0).transform(p);
        assert!(close(ten.x, one.x * 10.0) && close(ten.y, one.y * 10.0));
        assert!(close(ten.z, 1.0));
    }
}
