use crate::error::*;
use fakegpio::{Direction, Level, OutputLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Cw,
    Ccw,
}

pub trait Spindle {
    /// Start turning; `speed` None keeps the configured speed.
    fn rotate(&mut self, rotation: Rotation, speed: Option<f64>) -> Result<()>;
    fn unhold(&mut self) -> Result<()>;
    fn is_running(&self) -> bool;

    fn state(&self) -> String;
}

/// Spindle without hardware attached, only tracks state.
#[derive(Debug)]
pub struct BaseSpindle {
    speed: f64,
    running: bool,
}

impl BaseSpindle {
    pub fn new(speed: f64) -> BaseSpindle {
        BaseSpindle {
            speed,
            running: false,
        }
    }
}

impl Spindle for BaseSpindle {
    fn rotate(&mut self, rotation: Rotation, speed: Option<f64>) -> Result<()> {
        if let Some(s) = speed {
            self.speed = s;
        }
        self.running = true;
        info!("turn spindle {:?} with speed {}", rotation, self.speed);
        Ok(())
    }

    fn unhold(&mut self) -> Result<()> {
        info!("power off spindle");
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn state(&self) -> String {
        if self.running {
            format!("running@{}", self.speed)
        } else {
            "not running".to_string()
        }
    }
}

/// Laser used as spindle: on while "rotating", direction and speed ignored.
pub struct LaserSpindle {
    power: Box<dyn OutputLine>,
    running: bool,
}

impl LaserSpindle {
    pub fn new(mut power: Box<dyn OutputLine>) -> Result<LaserSpindle> {
        power.setup(Direction::Out)?;
        power.output(Level::Low)?;
        Ok(LaserSpindle {
            power,
            running: false,
        })
    }
}

impl Spindle for LaserSpindle {
    fn rotate(&mut self, _: Rotation, _: Option<f64>) -> Result<()> {
        info!("turn laser on");
        self.power.output(Level::High)?;
        self.running = true;
        Ok(())
    }

    fn unhold(&mut self) -> Result<()> {
        info!("turn laser off");
        self.power.output(Level::Low)?;
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn state(&self) -> String {
        if self.running {
            "laser on".to_string()
        } else {
            "laser off".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fakegpio::mock::MockLine;

    #[test]
    fn base_spindle_state() {
        let mut s = BaseSpindle::new(1.0);
        assert_eq!(s.state(), "not running");
        s.rotate(Rotation::Cw, None).unwrap();
        assert_eq!(s.state(), "running@1");
        s.rotate(Rotation::Ccw, Some(2.5)).unwrap();
        assert_eq!(s.state(), "running@2.5");
        s.unhold().unwrap();
        assert!(!s.is_running());
    }

    #[test]
    fn laser_spindle_power_line() {
        let (line, log) = MockLine::new("power");
        let mut s = LaserSpindle::new(Box::new(line)).unwrap();
        assert_eq!(log.last(), Some(("power", Level::Low)));
        s.rotate(Rotation::Cw, Some(1000.0)).unwrap();
        assert_eq!(log.last(), Some(("power", Level::High)));
        assert_eq!(s.state(), "laser on");
        s.unhold().unwrap();
        assert_eq!(log.last(), Some(("power", Level::Low)));
        assert!(!s.is_running());
    }
}
