//! G-code line parser.
use crate::controller::{Controller, Flow};
use crate::error::*;
use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;

/// Words carrying coordinates and arguments of a G or M code.
pub const PARAM_LETTERS: &str = "XYZIJKPRUVWABC";

#[derive(Debug, Clone, PartialEq)]
pub enum Code {
    G(u16),
    M(u16),
    /// Recognised letter with a number we do not dispatch on, like `G38.2`.
    Other(String),
}

impl Code {
    fn parse(letter: char, number: &str) -> Code {
        match (letter, number.parse::<u16>()) {
            ('G', Ok(n)) => Code::G(n),
            ('M', Ok(n)) => Code::M(n),
            _ => Code::Other(format!("{}{}", letter, number)),
        }
    }

    /// Modal motion codes, repeated by lines that only carry coordinates.
    pub fn is_motion(&self) -> bool {
        match self {
            Code::G(n) => *n <= 3,
            _ => false,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Code::G(n) => write!(f, "G{}", n),
            Code::M(n) => write!(f, "M{}", n),
            Code::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setting {
    Feed(f64),
    Speed(f64),
    Tool(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<char, f64>);

impl Params {
    pub fn get(&self, letter: char) -> Option<f64> {
        self.0.get(&letter).cloned()
    }

    pub fn insert(&mut self, letter: char, value: f64) {
        self.0.insert(letter, value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One parsed line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub settings: Vec<Setting>,
    pub codes: Vec<Code>,
    pub params: Params,
}

impl Block {
    fn is_empty(&self) -> bool {
        self.settings.is_empty() && self.codes.is_empty() && self.params.is_empty()
    }
}

/// Drop `( .. )` and `; ..` comments.
fn strip_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut depth = 0;
    for c in line.chars() {
        match c {
            ';' if depth == 0 => break,
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

#[derive(Default)]
pub struct Parser {
    last_motion: Option<Code>,
}

impl Parser {
    pub fn new() -> Parser {
        Parser::default()
    }

    /// Returns None for lines without any command: blanks, `%` markers and
    /// comments.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<Block>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') {
            return Ok(None);
        }
        if line.starts_with('(') {
            info!("{}", line);
        }
        let line = strip_comments(line).to_uppercase();

        let mut block = Block::default();
        let mut chars = line.chars().peekable();
        while let Some(letter) = chars.next() {
            if letter.is_whitespace() {
                continue;
            }
            if !letter.is_ascii_alphabetic() {
                bail!(ErrorKind::Parse(format!("unexpected {:?}", letter)));
            }
            while chars.peek().map_or(false, |c| c.is_whitespace()) {
                chars.next();
            }
            let mut number = String::new();
            if let Some(&sign) = chars.peek() {
                if sign == '+' || sign == '-' {
                    number.push(sign);
                    chars.next();
                }
            }
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() || c == '.' {
                    number.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            if number.is_empty() || number == "+" || number == "-" {
                bail!(ErrorKind::Parse(format!("{} without value", letter)));
            }

            match letter {
                'G' | 'M' => block.codes.push(Code::parse(letter, &number)),
                'F' => block.settings.push(Setting::Feed(number.parse()?)),
                'S' => block.settings.push(Setting::Speed(number.parse()?)),
                'T' => block.settings.push(Setting::Tool(number.parse::<f64>()? as u32)),
                'N' => {}
                l if PARAM_LETTERS.contains(l) => {
                    if block.params.get(l).is_some() {
                        warn!("duplicate {}, keeping first value", l);
                    } else {
                        block.params.insert(l, number.parse()?);
                    }
                }
                l => warn!("ignoring word {}{}", l, number),
            }
        }

        // only a bare parameter line continues the modal motion
        if !block.params.is_empty() && block.codes.is_empty() {
            match &self.last_motion {
                Some(code) => block.codes.push(code.clone()),
                None => warn!("parameters without code: {}", line),
            }
        }
        if let Some(code) = block.codes.iter().rev().find(|c| c.is_motion()) {
            self.last_motion = Some(code.clone());
        }
        if block.is_empty() {
            return Ok(None);
        }
        Ok(Some(block))
    }

    /// Feed every line to the controller until the program ends.
    pub fn run<R: BufRead>(&mut self, reader: R, controller: &mut Controller) -> Result<()> {
        for (i, line) in reader.lines().enumerate() {
            let n = i + 1;
            let line = line?;
            let block = match self.parse_line(&line).chain_err(|| ErrorKind::Line(n))? {
                Some(b) => b,
                None => continue,
            };
            debug!("line {}: {}", n, line.trim());
            if let Flow::End = controller.exec(&block).chain_err(|| ErrorKind::Line(n))? {
                info!("program end at line {}", n);
                return Ok(());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(p: &mut Parser, line: &str) -> Block {
        p.parse_line(line).unwrap().unwrap()
    }

    #[test]
    fn skip_blank_percent_comment() {
        let mut p = Parser::new();
        assert_eq!(p.parse_line("").unwrap(), None);
        assert_eq!(p.parse_line("   ").unwrap(), None);
        assert_eq!(p.parse_line("%").unwrap(), None);
        assert_eq!(p.parse_line("(Coaster)").unwrap(), None);
        assert_eq!(p.parse_line("; only a comment").unwrap(), None);
        assert_eq!(p.parse_line("N10").unwrap(), None);
    }

    #[test]
    fn motion_line() {
        let mut p = Parser::new();
        let b = parse(&mut p, "g01 x10.5 Y-3 z+1 f200 (cut)");
        assert_eq!(b.codes, vec![Code::G(1)]);
        assert_eq!(b.settings, vec![Setting::Feed(200.0)]);
        assert_eq!(b.params.get('X'), Some(10.5));
        assert_eq!(b.params.get('Y'), Some(-3.0));
        assert_eq!(b.params.get('Z'), Some(1.0));
        assert_eq!(b.params.get('I'), None);
    }

    #[test]
    fn modal_repeat() {
        let mut p = Parser::new();
        parse(&mut p, "G02 X1 Y1 I1 J0");
        let b = parse(&mut p, "X2 Y2 I0 J1");
        assert_eq!(b.codes, vec![Code::G(2)]);
        // non-motion codes do not replace the modal motion
        parse(&mut p, "G90");
        let b = parse(&mut p, "X3");
        assert_eq!(b.codes, vec![Code::G(2)]);
    }

    #[test]
    fn other_codes_keep_their_params() {
        let mut p = Parser::new();
        parse(&mut p, "G1 X10");
        let b = parse(&mut p, "G92 X0");
        assert_eq!(b.codes, vec![Code::G(92)]);
        let b = parse(&mut p, "G38.2 Z-5");
        assert_eq!(b.codes, vec![Code::Other("G38.2".to_string())]);
        let b = parse(&mut p, "M3 S200");
        assert_eq!(b.codes, vec![Code::M(3)]);
        // G1 is still the modal motion afterwards
        let b = parse(&mut p, "X4");
        assert_eq!(b.codes, vec![Code::G(1)]);
    }

    #[test]
    fn params_without_code() {
        let mut p = Parser::new();
        let b = parse(&mut p, "X3");
        assert!(b.codes.is_empty());
        assert_eq!(b.params.get('X'), Some(3.0));
    }

    #[test]
    fn codes_and_settings() {
        let mut p = Parser::new();
        let b = parse(&mut p, "M3 S1000 T2");
        assert_eq!(b.codes, vec![Code::M(3)]);
        assert_eq!(b.settings, vec![Setting::Speed(1000.0), Setting::Tool(2)]);
        let b = parse(&mut p, "G38.2 Z-5");
        assert_eq!(b.codes, vec![Code::Other("G38.2".to_string())]);
        assert_eq!(format!("{}", b.codes[0]), "G38.2");
    }

    #[test]
    fn bad_words() {
        let mut p = Parser::new();
        assert!(p.parse_line("G").is_err());
        assert!(p.parse_line("X-").is_err());
        assert!(p.parse_line("X1.2.3").is_err());
        assert!(p.parse_line("#1=2").is_err());
    }

    #[test]
    fn strip() {
        assert_eq!(strip_comments("G1 (a (b)) X1 ; tail"), "G1  X1 ");
    }
}
