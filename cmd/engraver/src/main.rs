#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
extern crate fakegpio;
extern crate stderrlog;

mod config;
mod controller;
mod motor;
mod parser;
mod point;
mod spindle;
mod transform;

mod error {
    error_chain! {
        links {
            Gpio(fakegpio::Error, fakegpio::ErrorKind);
        }

        foreign_links {
            IoError(::std::io::Error);
            ParseFloat(::std::num::ParseFloatError);
            Toml(toml::de::Error);
        }

        errors {
            Config(s: String) {
                description("invalid machine config")
                display("invalid machine config: {}", s)
            }
            InvalidMove(s: String) {
                description("invalid motor move")
                display("invalid motor move: {}", s)
            }
            Boundary(pos: i64, min: i64, max: i64) {
                description("motor boundary reached")
                display("boundary reached: {} <= {} <= {} not true", min, pos, max)
            }
            MissingMotor(axis: char) {
                description("no motor on axis")
                display("no motor on axis {}", axis)
            }
            InvalidArc(s: String) {
                description("invalid arc")
                display("invalid arc: {}", s)
            }
            Parse(s: String) {
                description("G-code parse error")
                display("parse error: {}", s)
            }
            Line(n: usize) {
                description("G-code line failed")
                display("line {}", n)
            }
        }
    }
}
use self::error::*;

use crate::config::MachineConfig;
use crate::parser::Parser;
use crate::point::Axis;
use clap::{ArgAction, ValueEnum};
use fakegpio::{Backend, Direction, Level, SharedGpio};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    /// sysfs when the kernel exposes it, fake otherwise
    Auto,
    Fake,
    Sysfs,
}

/// Run a G-code file on a stepper-motor laser engraver.
#[derive(Debug, clap::Parser)]
#[command(name = "engraver", version)]
struct Cli {
    /// G-code program
    file: PathBuf,

    /// Machine description, TOML
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = BackendArg::Auto)]
    backend: BackendArg,

    /// More logging, repeat for debug and trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Errors only
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = <Cli as clap::Parser>::parse();
    stderrlog::new()
        .quiet(cli.quiet)
        .verbosity(2 + cli.verbose as usize)
        .modules(vec![module_path!(), "fakegpio"])
        .init()
        .unwrap();

    if let Err(ref e) = run(&cli) {
        error!("error: {}", e);
        for e in e.iter().skip(1) {
            error!("caused by: {}", e);
        }
        ::std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => MachineConfig::load(path)?,
        None => MachineConfig::default(),
    };
    let backend = match cli.backend {
        BackendArg::Auto if config.sysfs_root.join("export").exists() => {
            Backend::Sysfs(config.sysfs_root.clone())
        }
        BackendArg::Auto => Backend::detect(),
        BackendArg::Fake => Backend::Fake,
        BackendArg::Sysfs => Backend::Sysfs(config.sysfs_root.clone()),
    };
    let file = File::open(&cli.file).chain_err(|| format!("open {}", cli.file.display()))?;
    let gpio = backend.open()?;
    engrave(&config, &gpio, BufReader::new(file))
}

/// Runs the program, then leaves every pin low and released, also on error.
fn engrave<R: BufRead>(config: &MachineConfig, gpio: &SharedGpio, reader: R) -> Result<()> {
    let result = execute(config, gpio, reader);
    let restored = safe_position(config, gpio);
    if let Err(ref e) = restored {
        warn!("restore pins: {}", e);
    }
    result.and(restored)
}

fn execute<R: BufRead>(config: &MachineConfig, gpio: &SharedGpio, reader: R) -> Result<()> {
    {
        let mut g = gpio.borrow_mut();
        g.cleanup()?;
        g.setmode(config.numbering.into())?;
    }
    let mut controller = config.build(gpio)?;
    let result = Parser::new().run(reader, &mut controller);
    if controller.spindle().map_or(false, |s| s.is_running()) {
        warn!("program stopped with the spindle running");
    }
    for &axis in Axis::ALL.iter() {
        if let Some(step) = controller.motor_position(axis) {
            debug!("motor {} at step {}", axis.letter(), step);
        }
    }
    info!(
        "finished at {} ({:?}, feed {})",
        controller.position(),
        controller.unit(),
        controller.speed()
    );
    if let Some(s) = controller.spindle() {
        info!("spindle {}", s.state());
    }
    let unheld = controller.unhold();
    result.and(unheld)
}

fn safe_position(config: &MachineConfig, gpio: &SharedGpio) -> Result<()> {
    let mut g = gpio.borrow_mut();
    g.setmode(config.numbering.into())?;
    for pin in config.pins() {
        g.setup(pin, Direction::Out)?;
        g.output(pin, Level::Low)?;
    }
    g.cleanup()?;
    Ok(())
}
