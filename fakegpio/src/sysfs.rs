//! Linux sysfs GPIO (`/sys/class/gpio`).
use crate::error::*;
use crate::pins::PinMapper;
use crate::{Direction, Gpio, Level, NumberingMode};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ROOT: &str = "/sys/class/gpio";
/// BCM pins reachable on the 26-pin header.
pub const MAX_PIN: u32 = 28;

pub struct SysfsGpio {
    root: PathBuf,
    mapper: PinMapper,
    exported: BTreeMap<u32, Direction>,
}

impl SysfsGpio {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<SysfsGpio> {
        let root = root.as_ref();
        if !root.join("export").exists() {
            bail!(ErrorKind::ModuleInitialization(format!(
                "{} has no export file",
                root.display()
            )));
        }
        Ok(SysfsGpio {
            root: root.to_path_buf(),
            mapper: PinMapper::new(NumberingMode::Bcm),
            exported: BTreeMap::new(),
        })
    }

    fn pin(&self, pin: u32) -> Result<u32> {
        let bcm = self.mapper.to_bcm(pin)?;
        if bcm >= MAX_PIN {
            bail!(ErrorKind::InvalidPin(pin));
        }
        Ok(bcm)
    }

    fn value_path(&self, bcm: u32) -> PathBuf {
        self.root.join(format!("gpio{}", bcm)).join("value")
    }

    pub fn exported(&self) -> Vec<u32> {
        self.exported.keys().cloned().collect()
    }
}

impl Gpio for SysfsGpio {
    fn setmode(&mut self, mode: NumberingMode) -> Result<()> {
        debug!("sysfs setmode({:?})", mode);
        self.mapper = PinMapper::new(mode);
        Ok(())
    }

    fn setup(&mut self, pin: u32, direction: Direction) -> Result<()> {
        let bcm = self.pin(pin)?;
        debug!("sysfs setup pin={} bcm={} {:?}", pin, bcm, direction);
        if self.exported.contains_key(&bcm) {
            warn!("pin {} already enabled", bcm);
        } else {
            fs::write(self.root.join("export"), bcm.to_string())?;
            // kernel default; cleanup must unexport even if direction fails
            self.exported.insert(bcm, Direction::In);
        }
        let path = self.root.join(format!("gpio{}", bcm)).join("direction");
        fs::write(path, direction.as_str())?;
        self.exported.insert(bcm, direction);
        Ok(())
    }

    fn output(&mut self, pin: u32, level: Level) -> Result<()> {
        let bcm = self.pin(pin)?;
        if self.exported.get(&bcm) != Some(&Direction::Out) {
            bail!(ErrorKind::NotAnOutput(pin));
        }
        let v = if level.is_high() { "1" } else { "0" };
        fs::write(self.value_path(bcm), v)?;
        Ok(())
    }

    fn input(&self, pin: u32) -> Result<Level> {
        use std::convert::TryFrom;

        let bcm = self.pin(pin)?;
        let s = fs::read_to_string(self.value_path(bcm))?;
        let raw: i32 = s.trim().parse()?;
        Level::try_from(raw)
    }

    fn cleanup(&mut self) -> Result<()> {
        for bcm in self.exported.keys() {
            debug!("sysfs unexport {}", bcm);
            fs::write(self.root.join("unexport"), bcm.to_string())?;
        }
        self.exported.clear();
        Ok(())
    }
}
