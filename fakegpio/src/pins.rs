//! Raspberry Pi header maps between BOARD and BCM numbering.
use crate::error::*;
use crate::NumberingMode;

/// Header position to function, 26-pin P1 plus the P5 add-on header.
const BOARD_TO_HEADER: &[(&str, &str)] = &[
    ("P1-01", "VCC 3.3V"),
    ("P1-02", "VCC 5V"),
    ("P1-03", "GPIO2"),
    ("P1-04", "VCC 5V"),
    ("P1-05", "GPIO3"),
    ("P1-06", "GND"),
    ("P1-07", "GPIO4"),
    ("P1-08", "GPIO14"),
    ("P1-09", "GND"),
    ("P1-10", "GPIO15"),
    ("P1-11", "GPIO17"),
    ("P1-12", "GPIO18"),
    ("P1-13", "GPIO27"),
    ("P1-14", "GND"),
    ("P1-15", "GPIO22"),
    ("P1-16", "GPIO23"),
    ("P1-17", "VCC 3.3V"),
    ("P1-18", "GPIO24"),
    ("P1-19", "GPIO10"),
    ("P1-20", "GND"),
    ("P1-21", "GPIO9"),
    ("P1-22", "GPIO25"),
    ("P1-23", "GPIO11"),
    ("P1-24", "GPIO8"),
    ("P1-25", "GND"),
    ("P1-26", "GPIO7"),
    ("P5-01", "VCC 5V"),
    ("P5-02", "VCC 3.3V"),
    ("P5-03", "GPIO28"),
    ("P5-04", "GPIO29"),
    ("P5-05", "GPIO30"),
    ("P5-06", "GPIO31"),
    ("P5-07", "GND"),
    ("P5-08", "GND"),
];

/// (BCM, BOARD) for every GPIO on P1.
const BCM_TO_BOARD: &[(u32, u32)] = &[
    (2, 3),
    (3, 5),
    (4, 7),
    (7, 26),
    (8, 24),
    (9, 21),
    (10, 19),
    (11, 23),
    (14, 8),
    (15, 10),
    (17, 11),
    (18, 12),
    (22, 15),
    (23, 16),
    (24, 18),
    (25, 22),
    (27, 13),
];

pub fn header_label(position: &str) -> Option<&'static str> {
    BOARD_TO_HEADER
        .iter()
        .find(|(p, _)| *p == position)
        .map(|(_, label)| *label)
}

pub fn bcm_to_board(bcm: u32) -> Option<u32> {
    BCM_TO_BOARD
        .iter()
        .find(|(b, _)| *b == bcm)
        .map(|(_, board)| *board)
}

pub fn board_to_bcm(board: u32) -> Option<u32> {
    BCM_TO_BOARD
        .iter()
        .find(|(_, p)| *p == board)
        .map(|(bcm, _)| *bcm)
}

/// Normalises pin numbers given in either numbering to BCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMapper {
    mode: NumberingMode,
}

impl PinMapper {
    pub fn new(mode: NumberingMode) -> PinMapper {
        PinMapper { mode }
    }

    pub fn mode(&self) -> NumberingMode {
        self.mode
    }

    pub fn to_bcm(&self, pin: u32) -> Result<u32> {
        match self.mode {
            NumberingMode::Bcm => Ok(pin),
            NumberingMode::Board => board_to_bcm(pin).ok_or_else(|| ErrorKind::InvalidPin(pin).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_labels() {
        assert_eq!(header_label("P1-07"), Some("GPIO4"));
        assert_eq!(header_label("P1-06"), Some("GND"));
        assert_eq!(header_label("P5-04"), Some("GPIO29"));
        assert_eq!(header_label("P1-27"), None);
    }

    #[test]
    fn board_and_bcm_agree_with_header() {
        for &(bcm, board) in BCM_TO_BOARD {
            let position = format!("P1-{:02}", board);
            assert_eq!(header_label(&position), Some(format!("GPIO{}", bcm).as_str()));
            assert_eq!(board_to_bcm(bcm_to_board(bcm).unwrap()), Some(bcm));
        }
    }

    #[test]
    fn mapper() {
        let board = PinMapper::new(NumberingMode::Board);
        assert_eq!(board.to_bcm(7).unwrap(), 4);
        assert_eq!(board.to_bcm(1).err().unwrap().to_string(), "invalid pin 1");
        let bcm = PinMapper::new(NumberingMode::Bcm);
        assert_eq!(bcm.to_bcm(4).unwrap(), 4);
    }
}
