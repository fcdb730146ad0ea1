//! Recording stand-ins for lines and controllers, for tests without pins.
use crate::error::*;
use crate::{Direction, Gpio, Level, NumberingMode, OutputLine};
use std::cell::RefCell;
use std::rc::Rc;

/// Output calls seen by a group of mock lines, in call order.
#[derive(Clone, Default)]
pub struct MockLog(Rc<RefCell<Vec<(&'static str, Level)>>>);

impl MockLog {
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn entries(&self) -> Vec<(&'static str, Level)> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn first(&self) -> Option<(&'static str, Level)> {
        self.0.borrow().first().cloned()
    }

    pub fn last(&self) -> Option<(&'static str, Level)> {
        self.0.borrow().last().cloned()
    }

    /// Every written level as 0/1, handy to compare coil patterns.
    pub fn levels(&self) -> Vec<u8> {
        self.0.borrow().iter().map(|(_, l)| l.raw() as u8).collect()
    }

    /// Levels written to one line.
    pub fn levels_of(&self, name: &str) -> Vec<Level> {
        self.0
            .borrow()
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, l)| *l)
            .collect()
    }

    pub fn last_of(&self, name: &str) -> Option<Level> {
        self.levels_of(name).last().cloned()
    }

    fn push(&self, name: &'static str, level: Level) {
        self.0.borrow_mut().push((name, level));
    }
}

pub struct MockLine {
    name: &'static str,
    log: MockLog,
}

impl MockLine {
    pub fn new(name: &'static str) -> (MockLine, MockLog) {
        let log = MockLog::default();
        (MockLine::with_log(name, &log), log)
    }

    pub fn with_log(name: &'static str, log: &MockLog) -> MockLine {
        MockLine {
            name,
            log: log.clone(),
        }
    }
}

impl OutputLine for MockLine {
    fn setup(&mut self, _: Direction) -> Result<()> {
        Ok(())
    }

    fn output(&mut self, level: Level) -> Result<()> {
        self.log.push(self.name, level);
        Ok(())
    }

    fn input(&self) -> Result<Level> {
        Ok(self.log.last_of(self.name).unwrap_or(Level::Low))
    }
}

/// Controller recording every pin write, `(pin, level)` in call order.
#[derive(Default)]
pub struct MockGpio {
    writes: Rc<RefCell<Vec<(u32, Level)>>>,
}

impl MockGpio {
    pub fn new() -> MockGpio {
        MockGpio::default()
    }

    /// Shared view of the writes, still readable after the mock moved into
    /// a `SharedGpio`.
    pub fn writes(&self) -> Rc<RefCell<Vec<(u32, Level)>>> {
        self.writes.clone()
    }
}

impl Gpio for MockGpio {
    fn setmode(&mut self, _: NumberingMode) -> Result<()> {
        Ok(())
    }

    fn setup(&mut self, _: u32, _: Direction) -> Result<()> {
        Ok(())
    }

    fn output(&mut self, pin: u32, level: Level) -> Result<()> {
        self.writes.borrow_mut().push((pin, level));
        Ok(())
    }

    fn input(&self, pin: u32) -> Result<Level> {
        Ok(self
            .writes
            .borrow()
            .iter()
            .rev()
            .find(|(p, _)| *p == pin)
            .map_or(Level::Low, |(_, l)| *l))
    }

    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_share_log() {
        let (mut a, log) = MockLine::new("a");
        let mut b = MockLine::with_log("b", &log);
        a.output(Level::High).unwrap();
        b.output(Level::Low).unwrap();
        assert_eq!(log.entries(), vec![("a", Level::High), ("b", Level::Low)]);
        assert_eq!(a.input().unwrap(), Level::High);
        assert_eq!(log.levels_of("b"), vec![Level::Low]);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn gpio_reads_back_last_write() {
        let mut g = MockGpio::new();
        let writes = g.writes();
        g.output(4, Level::High).unwrap();
        assert_eq!(g.input(4).unwrap(), Level::High);
        assert_eq!(g.input(5).unwrap(), Level::Low);
        assert_eq!(*writes.borrow(), vec![(4, Level::High)]);
    }
}
