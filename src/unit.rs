use std::fmt;

use crate::Error;

// ======================================================================
// CONST - PRIVATE

/// Base unit symbols, in the fixed exponent-vector order.
const BASE_SYMBOLS: [&str; 7] = ["m", "kg", "s", "A", "K", "mol", "cd"];

/// SI decimal prefixes with their powers of ten.
const PREFIXES: [(&str, i32); 16] = [
    ("Y", 24),
    ("Z", 21),
    ("E", 18),
    ("P", 15),
    ("T", 12),
    ("G", 9),
    ("M", 6),
    ("k", 3),
    ("m", -3),
    ("µ", -6),
    ("u", -6),
    ("n", -9),
    ("p", -12),
    ("f", -15),
    ("a", -18),
    ("z", -21),
];

// ======================================================================
// SiUnit - PUBLIC

/// SI unit as an integer-exponent vector over the base units plus a
/// decimal-prefix power of ten.
///
/// Two units are equal when their exponent vectors and powers of ten are
/// equal.
///
/// # Examples
///
/// ```rust
/// use scanprobe::SiUnit;
///
/// let speed = SiUnit::parse("m/s")?;
/// let distance = SiUnit::parse("m")?;
/// let time = SiUnit::parse("s")?;
/// assert_eq!(distance.divide(&time), speed);
/// # Ok::<(), scanprobe::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SiUnit {
    exponents: [i8; 7],
    power10: i32,
}

impl SiUnit {
    /// Creates the dimensionless unit.
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates plain metres.
    pub fn meter() -> Self {
        let mut unit = Self::default();
        unit.exponents[0] = 1;
        unit
    }

    /// Creates plain seconds.
    pub fn second() -> Self {
        let mut unit = Self::default();
        unit.exponents[2] = 1;
        unit
    }

    /// Parses a unit string such as `""`, `"m"`, `"um"`, `"m^2"`, `"m/s"`,
    /// `"1/m"` or `"A s"`.
    ///
    /// Factors are separated by spaces, a single `/` starts the
    /// denominator, and `^` introduces an integer power.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        let mut unit = Self::default();
        if s.is_empty() {
            return Ok(unit);
        }

        let (num, den) = match s.split_once('/') {
            Some((num, den)) => (num, Some(den)),
            None => (s, None),
        };

        for token in num.split_whitespace() {
            unit.apply_token(token, 1)?;
        }
        if let Some(den) = den {
            for token in den.split_whitespace() {
                unit.apply_token(token, -1)?;
            }
        }
        Ok(unit)
    }

    /// Returns the decimal-prefix power of ten.
    pub fn power10(&self) -> i32 {
        self.power10
    }

    /// Returns the product of two units.
    pub fn multiply(&self, other: &SiUnit) -> SiUnit {
        let mut result = self.clone();
        for (e, o) in result.exponents.iter_mut().zip(other.exponents.iter()) {
            *e += o;
        }
        result.power10 += other.power10;
        result
    }

    /// Returns the quotient of two units.
    pub fn divide(&self, other: &SiUnit) -> SiUnit {
        let mut result = self.clone();
        for (e, o) in result.exponents.iter_mut().zip(other.exponents.iter()) {
            *e -= o;
        }
        result.power10 -= other.power10;
        result
    }

    /// Returns the unit raised to an integer power.
    pub fn power(&self, power: i32) -> SiUnit {
        let mut result = self.clone();
        for e in result.exponents.iter_mut() {
            *e = (*e as i32 * power) as i8;
        }
        result.power10 *= power;
        result
    }

    /// Returns `true` for the dimensionless unit with no prefix.
    pub fn is_none(&self) -> bool {
        self.power10 == 0 && self.exponents.iter().all(|&e| e == 0)
    }
}

// ======================================================================
// SiUnit - PRIVATE

impl SiUnit {
    fn apply_token(&mut self, token: &str, sign: i32) -> Result<(), Error> {
        // Bare "1" is allowed so that "1/m" parses.
        if token == "1" {
            return Ok(());
        }

        let (symbol, power) = match token.split_once('^') {
            Some((symbol, power)) => {
                let power: i32 = power.parse().map_err(|_| Error::Parse {
                    reason: format!("bad unit power in {:?}", token),
                })?;
                (symbol, power)
            }
            None => (token, 1),
        };

        let (power10, base) = Self::split_prefix(symbol).ok_or_else(|| Error::Parse {
            reason: format!("unknown unit {:?}", token),
        })?;

        let index = BASE_SYMBOLS.iter().position(|&b| b == base).unwrap();
        self.exponents[index] += (sign * power) as i8;
        self.power10 += sign * power * power10;
        Ok(())
    }

    fn split_prefix(symbol: &str) -> Option<(i32, &str)> {
        if BASE_SYMBOLS.contains(&symbol) {
            return Some((0, symbol));
        }
        for &(prefix, power10) in PREFIXES.iter() {
            if let Some(base) = symbol.strip_prefix(prefix) {
                if BASE_SYMBOLS.contains(&base) {
                    return Some((power10, base));
                }
            }
        }
        None
    }
}

// ======================================================================
// SiUnit - IMPL DISPLAY

impl fmt::Display for SiUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.power10 != 0 {
            match PREFIXES.iter().find(|&&(p, e)| e == self.power10 && p != "u") {
                Some(&(prefix, _)) => write!(f, "{}", prefix)?,
                None => write!(f, "10^{} ", self.power10)?,
            }
        }

        let mut first = true;
        for (e, symbol) in self.exponents.iter().zip(BASE_SYMBOLS.iter()) {
            if *e == 0 {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            first = false;
            if *e == 1 {
                write!(f, "{}", symbol)?;
            } else {
                write!(f, "{}^{}", symbol, e)?;
            }
        }
        Ok(())
    }
}

// ======================================================================
// TESTS
