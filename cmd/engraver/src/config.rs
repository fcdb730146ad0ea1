//! Machine description: which pins drive which axis.
//!
//! Defaults describe the laser engraver the tool was written for: two bipolar
//! steppers from old DVD drives on X and Y (512 steps over 36mm) and the
//! laser diode switched by the Z axis.
use crate::controller::Controller;
use crate::error::*;
use crate::motor::{A4988Motor, BipolarStepperMotor, LaserMotor, Motor, Stepper, Torque};
use crate::point::Axis;
use crate::spindle::{BaseSpindle, LaserSpindle, Spindle};
use crate::transform::{Cartesian, PlotterTransformer, Transformer};
use fakegpio::{Line, NumberingMode, OutputLine, SharedGpio, ShiftPin, ShiftRegister};
use serde::Deserialize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Numbering {
    Bcm,
    Board,
}

impl From<Numbering> for NumberingMode {
    fn from(n: Numbering) -> NumberingMode {
        match n {
            Numbering::Bcm => NumberingMode::Bcm,
            Numbering::Board => NumberingMode::Board,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorqueConfig {
    Low,
    High,
    Mixed,
}

impl Default for TorqueConfig {
    fn default() -> Self {
        TorqueConfig::Mixed
    }
}

impl From<TorqueConfig> for Torque {
    fn from(t: TorqueConfig) -> Torque {
        match t {
            TorqueConfig::Low => Torque::Low,
            TorqueConfig::High => Torque::High,
            TorqueConfig::Mixed => Torque::Mixed,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Where an output line lives: a GPIO pin number, or `{ bit = n }` for an
/// output of the shift register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LineRef {
    Pin(u32),
    Bit { bit: u32 },
}

impl LineRef {
    fn pin(self) -> Option<u32> {
        match self {
            LineRef::Pin(p) => Some(p),
            LineRef::Bit { .. } => None,
        }
    }
}

fn default_bits() -> u32 {
    16
}

/// 74HC595 chain whose outputs can stand in for pins.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShiftRegisterConfig {
    pub ser: u32,
    pub rclk: u32,
    pub srclk: u32,
    #[serde(default = "default_bits")]
    pub bits: u32,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransformConfig {
    Cartesian,
    /// Two motors in the upper corners pulling the pen on cords.
    Plotter {
        width: f64,
        height: f64,
        #[serde(default = "default_scale")]
        scale: f64,
    },
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig::Cartesian
    }
}

impl TransformConfig {
    pub fn build(&self) -> Box<dyn Transformer> {
        match *self {
            TransformConfig::Cartesian => Box::new(Cartesian),
            TransformConfig::Plotter {
                width,
                height,
                scale,
            } => {
                let t = PlotterTransformer::new(width, height, scale);
                info!("plotter motors at {} and {}", t.motor_a(), t.motor_b());
                Box::new(t)
            }
        }
    }
}

/// Hands out output lines, from the controller or the shift register.
pub struct Lines {
    gpio: SharedGpio,
    register: Option<Rc<RefCell<ShiftRegister>>>,
}

impl Lines {
    pub fn new(gpio: &SharedGpio, register: Option<&ShiftRegisterConfig>) -> Result<Lines> {
        let register = match register {
            Some(c) => {
                let line = |pin| Box::new(Line::new(gpio.clone(), pin)) as Box<dyn OutputLine>;
                let r =
                    ShiftRegister::new(line(c.ser), line(c.rclk), line(c.srclk), c.bits, true)?;
                info!("shift register with {} bits", c.bits);
                Some(Rc::new(RefCell::new(r)))
            }
            None => None,
        };
        Ok(Lines {
            gpio: gpio.clone(),
            register,
        })
    }

    pub fn get(&self, r: LineRef) -> Result<Box<dyn OutputLine>> {
        match r {
            LineRef::Pin(pin) => Ok(Box::new(Line::new(self.gpio.clone(), pin))),
            LineRef::Bit { bit } => match &self.register {
                Some(register) => Ok(Box::new(ShiftPin::new(register.clone(), bit)?)),
                None => bail!(ErrorKind::Config(format!(
                    "bit {} used without a shift_register",
                    bit
                ))),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum MotorConfig {
    Bipolar {
        /// a1, a2, b1, b2
        coils: [LineRef; 4],
        #[serde(default)]
        torque: TorqueConfig,
        min_position: i64,
        max_position: i64,
        #[serde(default)]
        delay_ms: u64,
        #[serde(default = "default_true")]
        sos_exception: bool,
    },
    A4988 {
        step_pin: LineRef,
        dir_pin: LineRef,
        min_position: i64,
        max_position: i64,
        #[serde(default)]
        delay_ms: u64,
        #[serde(default = "default_true")]
        sos_exception: bool,
    },
    Laser {
        pin: LineRef,
        min_position: i64,
        max_position: i64,
        #[serde(default)]
        delay_ms: u64,
    },
}

impl MotorConfig {
    fn lines(&self) -> Vec<LineRef> {
        match self {
            MotorConfig::Bipolar { coils, .. } => coils.to_vec(),
            MotorConfig::A4988 {
                step_pin, dir_pin, ..
            } => vec![*step_pin, *dir_pin],
            MotorConfig::Laser { pin, .. } => vec![*pin],
        }
    }

    pub fn build(&self, lines: &Lines) -> Result<Box<dyn Motor>> {
        let motor: Box<dyn Motor> = match *self {
            MotorConfig::Bipolar {
                coils,
                torque,
                min_position,
                max_position,
                delay_ms,
                sos_exception,
            } => {
                let mut stepper = Stepper::new(min_position, max_position, Duration::from_millis(delay_ms));
                stepper.sos_exception = sos_exception;
                let coils = coils
                    .iter()
                    .map(|&r| lines.get(r))
                    .collect::<Result<Vec<_>>>()?;
                Box::new(BipolarStepperMotor::new(coils, stepper, torque.into())?)
            }
            MotorConfig::A4988 {
                step_pin,
                dir_pin,
                min_position,
                max_position,
                delay_ms,
                sos_exception,
            } => {
                let mut stepper = Stepper::new(min_position, max_position, Duration::from_millis(delay_ms));
                stepper.sos_exception = sos_exception;
                Box::new(A4988Motor::new(lines.get(step_pin)?, lines.get(dir_pin)?, stepper)?)
            }
            MotorConfig::Laser {
                pin,
                min_position,
                max_position,
                delay_ms,
            } => {
                let stepper = Stepper::new(min_position, max_position, Duration::from_millis(delay_ms));
                Box::new(LaserMotor::new(lines.get(pin)?, stepper)?)
            }
        };
        Ok(motor)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SpindleConfig {
    Base { speed: f64 },
    Laser { pin: LineRef },
}

impl SpindleConfig {
    pub fn build(&self, lines: &Lines) -> Result<Box<dyn Spindle>> {
        Ok(match *self {
            SpindleConfig::Base { speed } => Box::new(BaseSpindle::new(speed)),
            SpindleConfig::Laser { pin } => Box::new(LaserSpindle::new(lines.get(pin)?)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub numbering: Numbering,
    pub sysfs_root: PathBuf,
    /// Motor steps per millimeter.
    pub resolution: f64,
    pub default_speed: f64,
    pub x: Option<MotorConfig>,
    pub y: Option<MotorConfig>,
    pub z: Option<MotorConfig>,
    pub spindle: SpindleConfig,
    pub shift_register: Option<ShiftRegisterConfig>,
    pub transform: TransformConfig,
}

fn pins(p: [u32; 4]) -> [LineRef; 4] {
    [LineRef::Pin(p[0]), LineRef::Pin(p[1]), LineRef::Pin(p[2]), LineRef::Pin(p[3])]
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            numbering: Numbering::Bcm,
            sysfs_root: PathBuf::from(fakegpio::sysfs::DEFAULT_ROOT),
            resolution: 512.0 / 36.0,
            default_speed: 1.0,
            x: Some(MotorConfig::Bipolar {
                coils: pins([4, 2, 27, 22]),
                torque: TorqueConfig::Mixed,
                min_position: 0,
                max_position: 512,
                delay_ms: 0,
                sos_exception: true,
            }),
            y: Some(MotorConfig::Bipolar {
                coils: pins([24, 25, 7, 8]),
                torque: TorqueConfig::Mixed,
                min_position: 0,
                max_position: 512,
                delay_ms: 0,
                sos_exception: true,
            }),
            z: Some(MotorConfig::Laser {
                pin: LineRef::Pin(14),
                min_position: -10000,
                max_position: 10000,
                delay_ms: 0,
            }),
            spindle: SpindleConfig::Base { speed: 1.0 },
            shift_register: None,
            transform: TransformConfig::Cartesian,
        }
    }
}

impl MachineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MachineConfig> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .chain_err(|| format!("read config {}", path.display()))?;
        MachineConfig::parse(&s)
    }

    pub fn parse(s: &str) -> Result<MachineConfig> {
        let config: MachineConfig = toml::from_str(s)?;
        if !(config.resolution > 0.0) {
            bail!(ErrorKind::Config(format!("resolution {} must be positive", config.resolution)));
        }
        Ok(config)
    }

    fn axes(&self) -> Vec<(Axis, &MotorConfig)> {
        vec![
            (Axis::X, self.x.as_ref()),
            (Axis::Y, self.y.as_ref()),
            (Axis::Z, self.z.as_ref()),
        ]
        .into_iter()
        .filter_map(|(axis, m)| m.map(|m| (axis, m)))
        .collect()
    }

    /// Every GPIO pin the machine drives, shift register lines included.
    pub fn pins(&self) -> Vec<u32> {
        let mut lines: Vec<LineRef> = self.axes().iter().flat_map(|(_, m)| m.lines()).collect();
        if let SpindleConfig::Laser { pin } = self.spindle {
            lines.push(pin);
        }
        let mut pins: Vec<u32> = lines.into_iter().filter_map(LineRef::pin).collect();
        if let Some(r) = &self.shift_register {
            pins.extend_from_slice(&[r.ser, r.rclk, r.srclk]);
        }
        pins
    }

    pub fn build(&self, gpio: &SharedGpio) -> Result<Controller> {
        let lines = Lines::new(gpio, self.shift_register.as_ref())?;
        let mut controller = Controller::new(self.resolution, self.default_speed);
        for (axis, m) in self.axes() {
            controller.add_motor(axis, m.build(&lines)?);
        }
        controller.set_spindle(self.spindle.build(&lines)?);
        controller.set_transformer(self.transform.build());
        Ok(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::SEQUENCE_MIXED;
    use crate::parser::Parser;
    use fakegpio::mock::MockGpio;
    use fakegpio::{Backend, Level};

    #[test]
    fn defaults() {
        let c = MachineConfig::parse("").unwrap();
        assert_eq!(c, MachineConfig::default());
        assert_eq!(c.pins(), vec![4, 2, 27, 22, 24, 25, 7, 8, 14]);
        assert!((c.resolution - 14.222).abs() < 1e-3);
    }

    #[test]
    fn custom_machine() {
        let c = MachineConfig::parse(
            r#"
            numbering = "board"
            resolution = 80.0

            [x]
            driver = "a4988"
            step_pin = 16
            dir_pin = 18
            min_position = 0
            max_position = 16000

            [y]
            driver = "bipolar"
            coils = [7, 11, 13, 15]
            torque = "high"
            min_position = -100
            max_position = 100
            delay_ms = 2
            sos_exception = false

            [spindle]
            kind = "laser"
            pin = 8
            "#,
        )
        .unwrap();
        assert_eq!(c.numbering, Numbering::Board);
        assert_eq!(c.resolution, 80.0);
        assert_eq!(
            c.y,
            Some(MotorConfig::Bipolar {
                coils: pins([7, 11, 13, 15]),
                torque: TorqueConfig::High,
                min_position: -100,
                max_position: 100,
                delay_ms: 2,
                sos_exception: false,
            })
        );
        // z keeps its default
        assert_eq!(c.pins(), vec![16, 18, 7, 11, 13, 15, 14, 8]);
    }

    #[test]
    fn shift_register_drives_motor() {
        let c = MachineConfig::parse(
            r#"
            resolution = 1.0

            [shift_register]
            ser = 17
            rclk = 27
            srclk = 22
            bits = 8

            [x]
            driver = "bipolar"
            coils = [{ bit = 0 }, { bit = 1 }, { bit = 2 }, { bit = 3 }]
            min_position = -100
            max_position = 100

            [spindle]
            kind = "laser"
            pin = { bit = 7 }
            "#,
        )
        .unwrap();
        assert_eq!(c.pins(), vec![24, 25, 7, 8, 14, 17, 27, 22]);

        let mock = MockGpio::new();
        let writes = mock.writes();
        let gpio: SharedGpio = Rc::new(RefCell::new(mock));
        let mut controller = c.build(&gpio).unwrap();
        writes.borrow_mut().clear();

        Parser::new().run("G1 X1\n".as_bytes(), &mut controller).unwrap();
        assert_eq!(controller.motor_position(Axis::X), Some(1));

        // last 8 bits on SER, MSB first, hold the register after the step
        let ser: Vec<u8> = writes
            .borrow()
            .iter()
            .filter(|(pin, _)| *pin == 17)
            .map(|(_, l)| l.raw() as u8)
            .collect();
        assert!(ser.len() >= 8);
        let mut bits = ser[ser.len() - 8..].to_vec();
        bits.reverse();
        assert_eq!(&bits[..4], &SEQUENCE_MIXED[1][..]);
        assert_eq!(bits[7], 0, "laser bit stays off");
        assert_eq!(writes.borrow().last(), Some(&(27, Level::High)));
    }

    #[test]
    fn bit_without_shift_register() {
        let c = MachineConfig::parse(
            r#"
            [z]
            driver = "laser"
            pin = { bit = 3 }
            min_position = -10
            max_position = 10
            "#,
        )
        .unwrap();
        let gpio = Backend::Fake.open().unwrap();
        let e = c.build(&gpio).err().unwrap();
        assert_eq!(
            e.to_string(),
            "invalid machine config: bit 3 used without a shift_register"
        );
    }

    #[test]
    fn plotter_transform() {
        let c = MachineConfig::parse(
            r#"
            [transform]
            kind = "plotter"
            width = 1000.0
            height = 500.0
            "#,
        )
        .unwrap();
        assert_eq!(
            c.transform,
            TransformConfig::Plotter {
                width: 1000.0,
                height: 500.0,
                scale: 1.0,
            }
        );
        assert_eq!(MachineConfig::default().transform, TransformConfig::Cartesian);
        assert!(MachineConfig::parse("[transform]\nkind = \"polar\"").is_err());
    }

    #[test]
    fn invalid() {
        assert!(MachineConfig::parse("resolution = 0.0").is_err());
        assert!(MachineConfig::parse("[x]\ndriver = \"servo\"").is_err());
        assert!(MachineConfig::parse("resolution = \"fast\"").is_err());
    }

    #[test]
    fn build_on_fake_gpio() {
        let gpio = Backend::Fake.open().unwrap();
        let c = MachineConfig::default().build(&gpio).unwrap();
        assert_eq!(c.motor_position(Axis::X), Some(0));
        assert_eq!(c.motor_position(Axis::Z), Some(0));
        assert!(!c.spindle().unwrap().is_running());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.toml");
        std::fs::write(&path, "default_speed = 3.0\n").unwrap();
        assert_eq!(MachineConfig::load(&path).unwrap().default_speed, 3.0);
        assert!(MachineConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
