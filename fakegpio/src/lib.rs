#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
extern crate fakegpio_sys;

use std::cell::RefCell;
use std::convert::TryFrom;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use fakegpio_sys as sys;

pub mod fake;
pub mod mock;
pub mod pins;
pub mod shift;
pub mod sysfs;

pub use self::fake::FakeGpio;
pub use self::shift::{ShiftPin, ShiftRegister};
pub use self::sysfs::SysfsGpio;

pub mod error {
    error_chain! {
        foreign_links {
            IoError(::std::io::Error);
            NumParse(::std::num::ParseIntError);
        }

        errors {
            ModuleInitialization(reason: String) {
                description("gpio module initialization failed")
                display("gpio module initialization failed: {}", reason)
            }
            Status(rc: i32) {
                description("gpio call failed")
                display("fakegpio err={}", rc)
            }
            InvalidPin(pin: u32) {
                description("invalid pin")
                display("invalid pin {}", pin)
            }
            InvalidValue(raw: i32) {
                description("invalid constant value")
                display("invalid constant value {}", raw)
            }
            NotAnOutput(pin: u32) {
                description("pin is not an output")
                display("pin {} is not configured as output", pin)
            }
        }
    }
}
pub use self::error::*;

pub use fakegpio_sys::consts::{BCM, BOARD, HIGH, IN, LOW, OUT};

pub fn check(rc: c_int) -> Result<u32> {
    if rc < 0 {
        Err(ErrorKind::Status(rc).into())
    } else {
        Ok(rc as u32)
    }
}

#[cfg(not(feature = "legacy-host"))]
fn init_entry() -> c_int {
    unsafe { sys::fakegpio_init() }
}

#[cfg(feature = "legacy-host")]
fn init_entry() -> c_int {
    unsafe {
        sys::initfakegpio();
        sys::fakegpio_status()
    }
}

/// Bring the fake GPIO module online. Calling it again is a no-op.
pub fn init() -> Result<()> {
    let rc = init_entry();
    if rc < 0 {
        bail!(ErrorKind::ModuleInitialization(format!("status {}", rc)));
    }
    Ok(())
}

pub fn is_initialized() -> bool {
    unsafe { sys::fakegpio_status() == sys::FAKEGPIO_OK }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberingMode {
    Bcm,
    Board,
}

impl NumberingMode {
    pub fn raw(self) -> c_int {
        match self {
            NumberingMode::Bcm => BCM,
            NumberingMode::Board => BOARD,
        }
    }
}

impl TryFrom<c_int> for NumberingMode {
    type Error = Error;

    fn try_from(raw: c_int) -> Result<Self> {
        if raw == BCM {
            Ok(NumberingMode::Bcm)
        } else if raw == BOARD {
            Ok(NumberingMode::Board)
        } else {
            Err(ErrorKind::InvalidValue(raw).into())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
}

impl Direction {
    pub fn raw(self) -> c_int {
        match self {
            Direction::Out => OUT,
            Direction::In => IN,
        }
    }

    /// Name used by the sysfs `direction` file.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Out => "out",
            Direction::In => "in",
        }
    }
}

impl TryFrom<c_int> for Direction {
    type Error = Error;

    fn try_from(raw: c_int) -> Result<Self> {
        if raw == OUT {
            Ok(Direction::Out)
        } else if raw == IN {
            Ok(Direction::In)
        } else {
            Err(ErrorKind::InvalidValue(raw).into())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn raw(self) -> c_int {
        match self {
            Level::Low => LOW,
            Level::High => HIGH,
        }
    }

    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl TryFrom<c_int> for Level {
    type Error = Error;

    fn try_from(raw: c_int) -> Result<Self> {
        if raw == HIGH {
            Ok(Level::High)
        } else if raw == LOW {
            Ok(Level::Low)
        } else {
            Err(ErrorKind::InvalidValue(raw).into())
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Level {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Pin-addressed GPIO controller, the shape of the RPi.GPIO module.
pub trait Gpio {
    fn setmode(&mut self, mode: NumberingMode) -> Result<()>;
    fn setup(&mut self, pin: u32, direction: Direction) -> Result<()>;
    fn output(&mut self, pin: u32, level: Level) -> Result<()>;
    fn input(&self, pin: u32) -> Result<Level>;
    fn cleanup(&mut self) -> Result<()>;
}

pub type SharedGpio = Rc<RefCell<dyn Gpio>>;

/// A single GPIO-like object: one pin, or one bit of a shift register.
pub trait OutputLine {
    fn setup(&mut self, direction: Direction) -> Result<()>;
    fn output(&mut self, level: Level) -> Result<()>;
    fn input(&self) -> Result<Level>;
}

/// One pin of a shared controller.
pub struct Line {
    gpio: SharedGpio,
    pin: u32,
}

impl Line {
    pub fn new(gpio: SharedGpio, pin: u32) -> Line {
        Line { gpio, pin }
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }
}

impl OutputLine for Line {
    fn setup(&mut self, direction: Direction) -> Result<()> {
        self.gpio.borrow_mut().setup(self.pin, direction)
    }

    fn output(&mut self, level: Level) -> Result<()> {
        self.gpio.borrow_mut().output(self.pin, level)
    }

    fn input(&self) -> Result<Level> {
        self.gpio.borrow().input(self.pin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Fake,
    Sysfs(PathBuf),
}

impl Backend {
    /// Real pins when the kernel exposes sysfs GPIO, the fake module otherwise.
    pub fn detect() -> Backend {
        let root = Path::new(sysfs::DEFAULT_ROOT);
        if root.join("export").exists() {
            Backend::Sysfs(root.to_path_buf())
        } else {
            Backend::Fake
        }
    }

    pub fn open(&self) -> Result<SharedGpio> {
        match self {
            Backend::Fake => {
                info!("no gpio hardware, using fake gpio");
                Ok(Rc::new(RefCell::new(FakeGpio::new()?)))
            }
            Backend::Sysfs(root) => {
                info!("using sysfs gpio at {}", root.display());
                Ok(Rc::new(RefCell::new(SysfsGpio::open(root)?)))
            }
        }
    }
}
