//! Fake GPIO for hosts without pins. Calls are accepted and ignored.
use crate::error::*;
use crate::{check, Direction, Gpio, Level, NumberingMode};
use fakegpio_sys::*;
use std::convert::TryFrom;
use std::os::raw::c_int;

fn raw_pin(pin: u32) -> Result<c_int> {
    c_int::try_from(pin).map_err(|_| ErrorKind::InvalidPin(pin).into())
}

#[derive(Debug)]
pub struct FakeGpio {
    mode: Option<NumberingMode>,
}

impl FakeGpio {
    pub fn new() -> Result<FakeGpio> {
        crate::init()?;
        Ok(FakeGpio { mode: None })
    }

    pub fn mode(&self) -> Option<NumberingMode> {
        self.mode
    }
}

impl Gpio for FakeGpio {
    fn setmode(&mut self, mode: NumberingMode) -> Result<()> {
        debug!("fake setmode({:?})", mode);
        check(unsafe { fakegpio_setmode(mode.raw()) })?;
        self.mode = Some(mode);
        Ok(())
    }

    fn setup(&mut self, pin: u32, direction: Direction) -> Result<()> {
        debug!("fake setup({}, {:?})", pin, direction);
        check(unsafe { fakegpio_setup(raw_pin(pin)?, direction.raw()) })?;
        Ok(())
    }

    fn output(&mut self, pin: u32, level: Level) -> Result<()> {
        trace!("fake output({}, {:?})", pin, level);
        check(unsafe { fakegpio_output(raw_pin(pin)?, level.raw()) })?;
        Ok(())
    }

    fn input(&self, pin: u32) -> Result<Level> {
        let rc = check(unsafe { fakegpio_input(raw_pin(pin)?) })?;
        Level::try_from(rc as c_int)
    }

    fn cleanup(&mut self) -> Result<()> {
        debug!("fake cleanup");
        check(unsafe { fakegpio_cleanup() })?;
        Ok(())
    }
}
