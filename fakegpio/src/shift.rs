//! 74HC595 shift register chain.
//!
//! Three lines drive the chain: SER carries the bit value, SRCLK shifts it in
//! on the rising edge and RCLK latches the register to the outputs. Every
//! chip adds 8 bits, so two chained chips give 16 outputs.
use crate::error::*;
use crate::{Direction, Level, OutputLine};
use std::cell::RefCell;
use std::rc::Rc;

pub const MAX_BITS: u32 = 64;

pub struct ShiftRegister {
    ser: Box<dyn OutputLine>,
    rclk: Box<dyn OutputLine>,
    srclk: Box<dyn OutputLine>,
    bits: u32,
    autocommit: bool,
    binary: u64,
}

impl ShiftRegister {
    /// With `autocommit` every bit change is pushed to the chips at once,
    /// otherwise changes are collected until `write()`.
    pub fn new(
        mut ser: Box<dyn OutputLine>,
        mut rclk: Box<dyn OutputLine>,
        mut srclk: Box<dyn OutputLine>,
        bits: u32,
        autocommit: bool,
    ) -> Result<ShiftRegister> {
        if bits == 0 || bits > MAX_BITS {
            bail!(ErrorKind::InvalidValue(bits as i32));
        }
        ser.setup(Direction::Out)?;
        rclk.setup(Direction::Out)?;
        srclk.setup(Direction::Out)?;
        rclk.output(Level::High)?;
        srclk.output(Level::High)?;
        Ok(ShiftRegister {
            ser,
            rclk,
            srclk,
            bits,
            autocommit,
            binary: 0,
        })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    fn check_pos(&self, pos: u32) -> Result<()> {
        if pos >= self.bits {
            bail!(ErrorKind::InvalidPin(pos));
        }
        Ok(())
    }

    pub fn set_value(&mut self, pos: u32, level: Level) -> Result<()> {
        self.check_pos(pos)?;
        let mask = 1u64 << pos;
        match level {
            Level::High => self.binary |= mask,
            Level::Low => self.binary &= !mask,
        }
        if self.autocommit {
            self.write()?;
        }
        Ok(())
    }

    pub fn get_bit(&self, pos: u32) -> Result<Level> {
        self.check_pos(pos)?;
        Ok(Level::from(self.binary & (1u64 << pos) != 0))
    }

    /// Shift the register out, most significant bit first, then latch.
    pub fn write(&mut self) -> Result<()> {
        self.rclk.output(Level::Low)?;
        for bit in (0..self.bits).rev() {
            self.srclk.output(Level::Low)?;
            let level = Level::from(self.binary & (1u64 << bit) != 0);
            self.ser.output(level)?;
            self.srclk.output(Level::High)?;
        }
        self.rclk.output(Level::High)?;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.binary = 0;
        if self.autocommit {
            self.write()?;
        }
        Ok(())
    }

    /// Drive all three lines low so the chain draws no power.
    pub fn unhold(&mut self) -> Result<()> {
        self.rclk.output(Level::Low)?;
        self.srclk.output(Level::Low)?;
        self.ser.output(Level::Low)?;
        Ok(())
    }

    pub fn dump(&self) -> String {
        (0..self.bits)
            .rev()
            .map(|bit| if self.binary & (1u64 << bit) != 0 { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One register bit used like a GPIO pin. Output only.
pub struct ShiftPin {
    register: Rc<RefCell<ShiftRegister>>,
    bit: u32,
    value: Level,
}

impl ShiftPin {
    pub fn new(register: Rc<RefCell<ShiftRegister>>, bit: u32) -> Result<ShiftPin> {
        register.borrow().check_pos(bit)?;
        Ok(ShiftPin {
            register,
            bit,
            value: Level::Low,
        })
    }
}

impl OutputLine for ShiftPin {
    fn setup(&mut self, direction: Direction) -> Result<()> {
        if direction != Direction::Out {
            bail!(ErrorKind::NotAnOutput(self.bit));
        }
        Ok(())
    }

    fn output(&mut self, level: Level) -> Result<()> {
        self.value = level;
        self.register.borrow_mut().set_value(self.bit, level)
    }

    /// Last value written, the chips cannot be read back.
    fn input(&self) -> Result<Level> {
        Ok(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::mock::{MockLine, MockLog};

    fn register(bits: u32, autocommit: bool) -> (ShiftRegister, MockLog) {
        let log = MockLog::default();
        let line = |name| Box::new(MockLine::with_log(name, &log)) as Box<dyn OutputLine>;
        let r = ShiftRegister::new(line("ser"), line("rclk"), line("srclk"), bits, autocommit)
            .unwrap();
        log.clear();
        (r, log)
    }

    #[test]
    fn set_get_clear() {
        let (mut r, log) = register(16, false);
        r.set_value(0, Level::High).unwrap();
        r.set_value(15, Level::High).unwrap();
        assert_eq!(r.get_bit(0).unwrap(), Level::High);
        assert_eq!(r.get_bit(1).unwrap(), Level::Low);
        assert_eq!(r.dump(), "1 0 0 0 0 0 0 0 0 0 0 0 0 0 0 1");
        r.set_value(15, Level::Low).unwrap();
        assert_eq!(r.get_bit(15).unwrap(), Level::Low);
        r.clear().unwrap();
        assert_eq!(r.dump(), "0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0");
        // nothing pushed without autocommit
        assert!(log.is_empty());
    }

    #[test]
    fn write_msb_first_and_latch() {
        let (mut r, log) = register(4, false);
        r.set_value(0, Level::High).unwrap();
        r.set_value(2, Level::High).unwrap();
        r.write().unwrap();
        assert_eq!(
            log.levels_of("ser"),
            vec![Level::Low, Level::High, Level::Low, Level::High]
        );
        assert_eq!(log.first(), Some(("rclk", Level::Low)));
        assert_eq!(log.last(), Some(("rclk", Level::High)));
        // SRCLK low, SER, SRCLK high per bit
        assert_eq!(log.len(), 2 + 3 * 4);
    }

    #[test]
    fn autocommit_writes_every_change() {
        let (mut r, log) = register(8, true);
        r.set_value(3, Level::High).unwrap();
        assert_eq!(log.levels_of("ser").len(), 8);
        r.clear().unwrap();
        assert_eq!(log.levels_of("ser").len(), 16);
    }

    #[test]
    fn out_of_range() {
        let (mut r, _) = register(8, false);
        assert_eq!(
            r.set_value(8, Level::High).err().unwrap().to_string(),
            "invalid pin 8"
        );
        assert!(r.get_bit(9).is_err());
    }

    #[test]
    fn shift_pin() {
        let (r, _) = register(8, false);
        let r = Rc::new(RefCell::new(r));
        let mut pin = ShiftPin::new(r.clone(), 5).unwrap();
        assert!(pin.setup(Direction::In).is_err());
        pin.setup(Direction::Out).unwrap();
        pin.output(Level::High).unwrap();
        assert_eq!(pin.input().unwrap(), Level::High);
        assert_eq!(r.borrow().get_bit(5).unwrap(), Level::High);
        assert!(ShiftPin::new(r, 8).is_err());
    }

    #[test]
    fn unhold_drives_low() {
        let (mut r, log) = register(8, false);
        r.unhold().unwrap();
        assert!(log.entries().iter().all(|(_, l)| *l == Level::Low));
        assert_eq!(log.len(), 3);
    }
}
