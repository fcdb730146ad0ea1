//! C ABI surface of the fake GPIO module.
//!
//! Exposes the six numbering/direction/level constants, the module entry
//! point and the raw GPIO calls. Every raw call is accepted and ignored,
//! `fakegpio_input` always reads `LOW`.
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]

use std::os::raw::c_int;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Once;

pub mod consts {
    use std::os::raw::c_int;

    pub const BCM: c_int = 11;
    pub const BOARD: c_int = 10;
    pub const OUT: c_int = 21;
    pub const IN: c_int = 20;
    pub const HIGH: c_int = 1;
    pub const LOW: c_int = 0;
}

#[no_mangle]
pub static BCM: c_int = consts::BCM;
#[no_mangle]
pub static BOARD: c_int = consts::BOARD;
#[no_mangle]
pub static OUT: c_int = consts::OUT;
#[no_mangle]
pub static IN: c_int = consts::IN;
#[no_mangle]
pub static HIGH: c_int = consts::HIGH;
#[no_mangle]
pub static LOW: c_int = consts::LOW;

pub const FAKEGPIO_OK: c_int = 0;
pub const FAKEGPIO_ERR_NOT_INIT: c_int = -1;
pub const FAKEGPIO_ERR_BAD_ARG: c_int = -2;

static STATUS: AtomicI32 = AtomicI32::new(FAKEGPIO_ERR_NOT_INIT);
static INIT: Once = Once::new();

fn initialise_module() -> c_int {
    INIT.call_once(|| STATUS.store(FAKEGPIO_OK, Ordering::SeqCst));
    STATUS.load(Ordering::SeqCst)
}

fn ready() -> bool {
    STATUS.load(Ordering::SeqCst) == FAKEGPIO_OK
}

/// Module entry point for hosts that expect a status return.
#[cfg(not(feature = "legacy-host"))]
#[no_mangle]
pub unsafe extern "C" fn fakegpio_init() -> c_int {
    initialise_module()
}

/// Module entry point for legacy hosts. Returns nothing, the outcome is
/// left in the status slot for `fakegpio_status`.
#[cfg(feature = "legacy-host")]
#[no_mangle]
pub unsafe extern "C" fn initfakegpio() {
    initialise_module();
}

#[no_mangle]
pub unsafe extern "C" fn fakegpio_status() -> c_int {
    STATUS.load(Ordering::SeqCst)
}

#[no_mangle]
pub unsafe extern "C" fn fakegpio_setmode(mode: c_int) -> c_int {
    if !ready() {
        return FAKEGPIO_ERR_NOT_INIT;
    }
    if mode != BCM && mode != BOARD {
        return FAKEGPIO_ERR_BAD_ARG;
    }
    FAKEGPIO_OK
}

#[no_mangle]
pub unsafe extern "C" fn fakegpio_setup(pin: c_int, direction: c_int) -> c_int {
    if !ready() {
        return FAKEGPIO_ERR_NOT_INIT;
    }
    if pin < 0 || (direction != OUT && direction != IN) {
        return FAKEGPIO_ERR_BAD_ARG;
    }
    FAKEGPIO_OK
}

#[no_mangle]
pub unsafe extern "C" fn fakegpio_output(pin: c_int, level: c_int) -> c_int {
    if !ready() {
        return FAKEGPIO_ERR_NOT_INIT;
    }
    if pin < 0 || (level != HIGH && level != LOW) {
        return FAKEGPIO_ERR_BAD_ARG;
    }
    FAKEGPIO_OK
}

#[no_mangle]
pub unsafe extern "C" fn fakegpio_input(pin: c_int) -> c_int {
    if !ready() {
        return FAKEGPIO_ERR_NOT_INIT;
    }
    if pin < 0 {
        return FAKEGPIO_ERR_BAD_ARG;
    }
    LOW
}

#[no_mangle]
pub unsafe extern "C" fn fakegpio_cleanup() -> c_int {
    if !ready() {
        return FAKEGPIO_ERR_NOT_INIT;
    }
    FAKEGPIO_OK
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() -> c_int {
        #[cfg(not(feature = "legacy-host"))]
        let rc = unsafe { fakegpio_init() };
        #[cfg(feature = "legacy-host")]
        let rc = unsafe {
            initfakegpio();
            fakegpio_status()
        };
        rc
    }

    #[test]
    fn constants_distinct() {
        let all = [BCM, BOARD, OUT, IN, HIGH, LOW];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_ne!(BCM, BOARD);
        assert_ne!(OUT, IN);
        assert_ne!(HIGH, LOW);
    }

    #[test]
    fn init_idempotent() {
        let (out, inp) = (OUT, IN);
        assert_eq!(init(), FAKEGPIO_OK);
        assert_eq!(init(), FAKEGPIO_OK);
        assert_eq!(unsafe { fakegpio_status() }, FAKEGPIO_OK);
        assert_eq!((out, inp), (OUT, IN));
    }

    #[test]
    fn calls_ignored_after_init() {
        assert_eq!(init(), FAKEGPIO_OK);
        unsafe {
            assert_eq!(fakegpio_setmode(BCM), FAKEGPIO_OK);
            assert_eq!(fakegpio_setup(17, OUT), FAKEGPIO_OK);
            assert_eq!(fakegpio_output(17, HIGH), FAKEGPIO_OK);
            assert_eq!(fakegpio_input(17), LOW);
            assert_eq!(fakegpio_cleanup(), FAKEGPIO_OK);
        }
    }

    #[test]
    fn bad_args() {
        assert_eq!(init(), FAKEGPIO_OK);
        unsafe {
            assert_eq!(fakegpio_setmode(HIGH), FAKEGPIO_ERR_BAD_ARG);
            assert_eq!(fakegpio_setup(4, HIGH), FAKEGPIO_ERR_BAD_ARG);
            assert_eq!(fakegpio_setup(-1, OUT), FAKEGPIO_ERR_BAD_ARG);
            assert_eq!(fakegpio_output(4, 7), FAKEGPIO_ERR_BAD_ARG);
            assert_eq!(fakegpio_input(-3), FAKEGPIO_ERR_BAD_ARG);
        }
    }
}
