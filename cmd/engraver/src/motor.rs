//! Axis motors driven through GPIO-like lines.
//!
//! The controller moves motors in fractions of a step. Each motor keeps an
//! exact float position next to its integer step position and issues a real
//! step once the two drift a full step apart, so the gap between them always
//! stays below one step.
use crate::error::*;
use fakegpio::{Direction, Level, OutputLine};
use std::thread;
use std::time::{Duration, Instant};

pub trait Motor {
    /// `direction` is -1 or 1, `fraction` of a step in `0.0..=1.0`.
    fn move_float(&mut self, direction: i32, fraction: f64) -> Result<()>;
    /// Release power.
    fn unhold(&mut self) -> Result<()>;
    fn position(&self) -> i64;
    fn float_position(&self) -> f64;
}

/// Position bookkeeping shared by every motor kind.
#[derive(Debug)]
pub struct Stepper {
    pub min_position: i64,
    pub max_position: i64,
    pub delay: Duration,
    /// Error out at a boundary instead of logging and staying put.
    pub sos_exception: bool,
    position: i64,
    float_position: f64,
    last_step: Option<Instant>,
}

impl Stepper {
    pub fn new(min_position: i64, max_position: i64, delay: Duration) -> Stepper {
        Stepper {
            min_position,
            max_position,
            delay,
            sos_exception: true,
            position: 0,
            float_position: 0.0,
            last_step: None,
        }
    }

    /// Advance the float position. Returns the new integer position if a
    /// full step has to be taken.
    fn advance(&mut self, direction: i32, fraction: f64) -> Result<Option<i64>> {
        if direction != 1 && direction != -1 {
            bail!(ErrorKind::InvalidMove(format!("direction {}", direction)));
        }
        // unit vectors may overshoot 1.0 by rounding
        if !(0.0..=1.0 + 1e-9).contains(&fraction) {
            bail!(ErrorKind::InvalidMove(format!("fraction {}", fraction)));
        }
        let fraction = fraction.min(1.0);
        let float_position = self.float_position + fraction * f64::from(direction);
        let step = (float_position - self.position as f64).abs() >= 1.0;
        let next = self.position + i64::from(direction);
        if step && !(self.min_position..=self.max_position).contains(&next) {
            if self.sos_exception {
                bail!(ErrorKind::Boundary(next, self.min_position, self.max_position));
            }
            error!(
                "boundary reached: {} <= {} <= {} not true",
                self.min_position, next, self.max_position
            );
            return Ok(None);
        }

        if let Some(last) = self.last_step {
            let since = last.elapsed();
            if since < self.delay {
                thread::sleep(self.delay - since);
            }
        }
        self.float_position = float_position;
        self.last_step = Some(Instant::now());
        if step {
            self.position = next;
            Ok(Some(next))
        } else {
            Ok(None)
        }
    }
}

pub const SEQUENCE_LOW: &[[u8; 4]] = &[[1, 0, 0, 0], [0, 0, 1, 0], [0, 1, 0, 0], [0, 0, 0, 1]];
pub const SEQUENCE_HIGH: &[[u8; 4]] = &[[1, 0, 1, 0], [0, 1, 1, 0], [0, 1, 0, 1], [1, 0, 0, 1]];
pub const SEQUENCE_MIXED: &[[u8; 4]] = &[
    [1, 0, 0, 0],
    [1, 0, 1, 0],
    [0, 0, 1, 0],
    [0, 1, 1, 0],
    [0, 1, 0, 0],
    [0, 1, 0, 1],
    [0, 0, 0, 1],
    [1, 0, 0, 1],
];

/// Coil sequence of a bipolar stepper, coils ordered (a1, a2, b1, b2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Torque {
    /// One coil at a time, low power.
    Low,
    /// Full step, two coils.
    High,
    /// Half step, alternating one and two coils.
    Mixed,
}

impl Torque {
    pub fn sequence(self) -> &'static [[u8; 4]] {
        match self {
            Torque::Low => SEQUENCE_LOW,
            Torque::High => SEQUENCE_HIGH,
            Torque::Mixed => SEQUENCE_MIXED,
        }
    }
}

pub struct BipolarStepperMotor {
    stepper: Stepper,
    coils: Vec<Box<dyn OutputLine>>,
    sequence: &'static [[u8; 4]],
}

impl BipolarStepperMotor {
    pub fn new(
        mut coils: Vec<Box<dyn OutputLine>>,
        stepper: Stepper,
        torque: Torque,
    ) -> Result<BipolarStepperMotor> {
        if coils.len() != 4 {
            bail!(ErrorKind::InvalidMove(format!("{} coils, need 4", coils.len())));
        }
        for coil in coils.iter_mut() {
            coil.setup(Direction::Out)?;
        }
        let mut m = BipolarStepperMotor {
            stepper,
            coils,
            sequence: torque.sequence(),
        };
        m.unhold()?;
        Ok(m)
    }

    fn energize(&mut self, position: i64) -> Result<()> {
        let phase = self.sequence[position.rem_euclid(self.sequence.len() as i64) as usize];
        for (coil, bit) in self.coils.iter_mut().zip(phase.iter()) {
            coil.output(Level::from(*bit == 1))?;
        }
        Ok(())
    }
}

impl Motor for BipolarStepperMotor {
    fn move_float(&mut self, direction: i32, fraction: f64) -> Result<()> {
        if let Some(position) = self.stepper.advance(direction, fraction)? {
            self.energize(position)?;
        }
        Ok(())
    }

    fn unhold(&mut self) -> Result<()> {
        for coil in self.coils.iter_mut() {
            coil.output(Level::Low)?;
        }
        Ok(())
    }

    fn position(&self) -> i64 {
        self.stepper.position
    }

    fn float_position(&self) -> f64 {
        self.stepper.float_position
    }
}

/// Pseudo motor for the Z axis: the laser fires while Z is below zero.
pub struct LaserMotor {
    stepper: Stepper,
    laser: Box<dyn OutputLine>,
}

impl LaserMotor {
    pub fn new(mut laser: Box<dyn OutputLine>, stepper: Stepper) -> Result<LaserMotor> {
        laser.setup(Direction::Out)?;
        let mut m = LaserMotor { stepper, laser };
        m.unhold()?;
        Ok(m)
    }
}

impl Motor for LaserMotor {
    fn move_float(&mut self, direction: i32, fraction: f64) -> Result<()> {
        if let Some(position) = self.stepper.advance(direction, fraction)? {
            self.laser.output(Level::from(position < 0))?;
        }
        Ok(())
    }

    fn unhold(&mut self) -> Result<()> {
        info!("power off laser");
        self.laser.output(Level::Low)?;
        Ok(())
    }

    fn position(&self) -> i64 {
        self.stepper.position
    }

    fn float_position(&self) -> f64 {
        self.stepper.float_position
    }
}

/// Stepper behind an A4988 driver: DIR selects direction, each STEP pulse
/// moves one (micro)step.
pub struct A4988Motor {
    stepper: Stepper,
    step: Box<dyn OutputLine>,
    dir: Box<dyn OutputLine>,
}

impl A4988Motor {
    pub fn new(
        mut step: Box<dyn OutputLine>,
        mut dir: Box<dyn OutputLine>,
        stepper: Stepper,
    ) -> Result<A4988Motor> {
        step.setup(Direction::Out)?;
        dir.setup(Direction::Out)?;
        let mut m = A4988Motor { stepper, step, dir };
        m.unhold()?;
        Ok(m)
    }
}

impl Motor for A4988Motor {
    fn move_float(&mut self, direction: i32, fraction: f64) -> Result<()> {
        if self.stepper.advance(direction, fraction)?.is_some() {
            self.dir.output(Level::from(direction > 0))?;
            self.step.output(Level::High)?;
            self.step.output(Level::Low)?;
        }
        Ok(())
    }

    fn unhold(&mut self) -> Result<()> {
        self.step.output(Level::Low)?;
        self.dir.output(Level::Low)?;
        Ok(())
    }

    fn position(&self) -> i64 {
        self.stepper.position
    }

    fn float_position(&self) -> f64 {
        self.stepper.float_position
    }
}
