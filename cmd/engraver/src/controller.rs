//! Executes parsed G-code blocks on up to three axis motors and a spindle.
use crate::error::*;
use crate::motor::Motor;
use crate::parser::{Block, Code, Params, Setting};
use crate::point::{Axis, Point3d};
use crate::spindle::{Rotation, Spindle};
use crate::transform::{Cartesian, Transformer};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Millimeter,
    Inch,
}

impl Unit {
    fn to_mm(self) -> f64 {
        match self {
            Unit::Millimeter => 1.0,
            Unit::Inch => 25.4,
        }
    }
}

pub struct Controller {
    /// Motor steps per millimeter.
    resolution: f64,
    default_speed: f64,
    speed: f64,
    spindle_speed: Option<f64>,
    position: Point3d,
    absolute: bool,
    unit: Unit,
    angle_step: f64,
    motors: BTreeMap<Axis, Box<dyn Motor>>,
    spindle: Option<Box<dyn Spindle>>,
    transformer: Box<dyn Transformer>,
}

impl Controller {
    pub fn new(resolution: f64, default_speed: f64) -> Controller {
        Controller {
            resolution,
            default_speed,
            speed: default_speed,
            spindle_speed: None,
            position: Point3d::ZERO,
            absolute: true,
            unit: Unit::Millimeter,
            angle_step: PI / 180.0,
            motors: BTreeMap::new(),
            spindle: None,
            transformer: Box::new(Cartesian),
        }
    }

    pub fn add_motor(&mut self, axis: Axis, motor: Box<dyn Motor>) {
        self.motors.insert(axis, motor);
    }

    /// Replace the default cartesian mapping from machine to motor axes.
    pub fn set_transformer(&mut self, transformer: Box<dyn Transformer>) {
        self.transformer = transformer;
    }

    pub fn set_spindle(&mut self, spindle: Box<dyn Spindle>) {
        self.spindle = Some(spindle);
    }

    pub fn position(&self) -> Point3d {
        self.position
    }

    pub fn motor_position(&self, axis: Axis) -> Option<i64> {
        self.motors.get(&axis).map(|m| m.position())
    }

    pub fn spindle(&self) -> Option<&dyn Spindle> {
        self.spindle.as_ref().map(|s| s.as_ref())
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn exec(&mut self, block: &Block) -> Result<Flow> {
        for setting in &block.settings {
            match *setting {
                Setting::Feed(f) => self.speed = f,
                Setting::Speed(s) => self.spindle_speed = Some(s),
                Setting::Tool(t) => info!("tool {} selected", t),
            }
        }
        if block.codes.is_empty() && !block.params.is_empty() {
            warn!("no code to apply parameters to");
        }
        for code in &block.codes {
            debug!("exec {} at {}", code, self.position);
            if let Flow::End = self.exec_code(code, &block.params)? {
                return Ok(Flow::End);
            }
        }
        Ok(Flow::Continue)
    }

    fn exec_code(&mut self, code: &Code, params: &Params) -> Result<Flow> {
        match code {
            Code::G(0) => {
                self.speed = self.default_speed;
                let target = self.target(params);
                self.goto(target)?;
            }
            Code::G(1) => {
                let target = self.target(params);
                self.goto(target)?;
            }
            Code::G(2) => self.arc(params, Rotation::Cw)?,
            Code::G(3) => self.arc(params, Rotation::Ccw)?,
            Code::G(4) => {
                let secs = params.get('P').unwrap_or(0.0).max(0.0);
                info!("dwell {}s", secs);
                thread::sleep(Duration::from_millis((secs * 1000.0) as u64));
            }
            Code::G(17) | Code::G(18) | Code::G(19) => info!("plane select {}", code),
            Code::G(20) => self.unit = Unit::Inch,
            Code::G(21) => self.unit = Unit::Millimeter,
            Code::G(54) | Code::G(94) => info!("{} accepted", code),
            Code::G(90) => self.absolute = true,
            Code::G(91) => self.absolute = false,
            Code::M(2) | Code::M(30) => {
                self.finish()?;
                return Ok(Flow::End);
            }
            Code::M(3) => self.rotate(Rotation::Cw)?,
            Code::M(4) => self.rotate(Rotation::Ccw)?,
            Code::M(5) => {
                if let Some(s) = self.spindle.as_mut() {
                    s.unhold()?;
                }
            }
            Code::M(6) => info!("tool change"),
            Code::M(7) | Code::M(8) | Code::M(9) => info!("coolant {} ignored", code),
            _ => info!("unknown code {}, ignored", code),
        }
        Ok(Flow::Continue)
    }

    fn rotate(&mut self, rotation: Rotation) -> Result<()> {
        match self.spindle.as_mut() {
            Some(s) => {
                s.rotate(rotation, self.spindle_speed)?;
                debug!("spindle {}", s.state());
                Ok(())
            }
            None => {
                warn!("no spindle attached");
                Ok(())
            }
        }
    }

    /// Home every axis and release all power.
    fn finish(&mut self) -> Result<()> {
        info!("end of program, returning to origin");
        self.goto(Point3d::ZERO)?;
        self.unhold()
    }

    pub fn unhold(&mut self) -> Result<()> {
        for motor in self.motors.values_mut() {
            motor.unhold()?;
        }
        if let Some(s) = self.spindle.as_mut() {
            s.unhold()?;
        }
        Ok(())
    }

    fn target(&self, params: &Params) -> Point3d {
        let k = self.unit.to_mm();
        let mut target = self.position;
        for &axis in Axis::ALL.iter() {
            if let Some(v) = params.get(axis.letter()) {
                if self.absolute {
                    target.set(axis, v * k);
                } else {
                    target.set(axis, self.position.get(axis) + v * k);
                }
            }
        }
        target
    }

    /// Center offset from the current position for an arc given by radius.
    /// A negative radius selects the arc longer than half a circle.
    fn center_offset(&self, target: Point3d, radius: f64, rotation: Rotation) -> Result<Point3d> {
        let d = target - self.position;
        let disc = 4.0 * radius * radius - d.x * d.x - d.y * d.y;
        if disc < 0.0 {
            bail!(ErrorKind::InvalidArc(format!("radius {} too small", radius)));
        }
        let chord = (d.x * d.x + d.y * d.y).sqrt();
        if chord == 0.0 {
            bail!(ErrorKind::InvalidArc("radius arc ends where it starts".to_string()));
        }
        let mut h = -disc.sqrt() / chord;
        if rotation == Rotation::Ccw {
            h = -h;
        }
        if radius < 0.0 {
            h = -h;
        }
        Ok(Point3d::new(0.5 * (d.x - d.y * h), 0.5 * (d.y + d.x * h), 0.0))
    }

    /// Helical arc in the XY plane, split into segments of one degree.
    fn arc(&mut self, params: &Params, rotation: Rotation) -> Result<()> {
        let k = self.unit.to_mm();
        let target = self.target(params);
        let offset = match params.get('R') {
            Some(r) => self.center_offset(target, r * k, rotation)?,
            None => Point3d::new(
                params.get('I').unwrap_or(0.0) * k,
                params.get('J').unwrap_or(0.0) * k,
                0.0,
            ),
        };
        let center = self.position + offset;
        let start = self.position - center;
        let end = target - center;
        let radius = start.length_xy();
        if radius == 0.0 {
            bail!(ErrorKind::InvalidArc("zero radius".to_string()));
        }

        let mut sweep = start.angle_between(&end);
        match rotation {
            Rotation::Cw if sweep >= 0.0 => sweep -= 2.0 * PI,
            Rotation::Ccw if sweep <= 0.0 => sweep += 2.0 * PI,
            _ => {}
        }
        if sweep.abs() <= self.angle_step {
            return self.goto(target);
        }

        let segments = (sweep.abs() / self.angle_step).ceil() as u32;
        let z0 = self.position.z;
        let dz = target.z - z0;
        for i in 1..segments {
            let t = f64::from(i) / f64::from(segments);
            let mut p = center + start.rotated_z(sweep * t);
            p.z = z0 + dz * t;
            self.goto(p)?;
        }
        // land exactly on the target, whatever rounding did on the way
        self.goto(target)
    }

    /// Motor position in steps for a machine position.
    fn motor_target(&self, p: Point3d) -> Point3d {
        self.transformer.transform(p) * self.resolution
    }

    /// Straight move. The line is cut into pieces of at most one step, each
    /// piece mapped to motor space and driven as unit step vectors.
    fn goto(&mut self, target: Point3d) -> Result<()> {
        let mv = target - self.position;
        let len = mv.length();
        if len == 0.0 {
            return Ok(());
        }
        let pieces = (len * self.resolution).ceil().max(1.0) as u32;
        let mut from = self.motor_target(self.position);
        for i in 1..=pieces {
            let p = if i == pieces {
                target
            } else {
                self.position + mv * (f64::from(i) / f64::from(pieces))
            };
            let to = self.motor_target(p);
            self.drive(to - from)?;
            from = to;
        }
        self.position = target;
        self.check_drift();
        Ok(())
    }

    fn drive(&mut self, mut steps: Point3d) -> Result<()> {
        let unit = steps.unit();
        while steps.length() > 1.0 {
            self.step(unit)?;
            steps = steps - unit;
        }
        self.step(steps)
    }

    fn step(&mut self, v: Point3d) -> Result<()> {
        for &axis in Axis::ALL.iter() {
            let s = v.get(axis);
            if s == 0.0 {
                continue;
            }
            let motor = self
                .motors
                .get_mut(&axis)
                .ok_or_else(|| ErrorKind::MissingMotor(axis.letter()))?;
            motor.move_float(if s > 0.0 { 1 } else { -1 }, s.abs())?;
        }
        Ok(())
    }

    fn check_drift(&self) {
        let expected = self.motor_target(self.position);
        let mut drift = Point3d::ZERO;
        for (&axis, motor) in &self.motors {
            trace!(
                "motor {} at {} ({:.3})",
                axis.letter(),
                motor.position(),
                motor.float_position()
            );
            drift.set(axis, expected.get(axis) - motor.position() as f64);
        }
        if drift.length() >= Point3d::new(1.0, 1.0, 1.0).length() {
            warn!("motor drift {} at {}", drift, self.position);
        }
    }
}
