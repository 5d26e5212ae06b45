use crate::error::Error;

use std::fmt;
use std::ops::{Mul, Sub};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

/// Exact fraction used for frame rates and display aspect ratios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    numerator: u32,
    denominator: u32,
}

impl Rational {
    /// Largest distance at which a measured ratio is replaced by a standard one.
    pub const SNAP_TOLERANCE: f64 = 0.01;

    pub const WIDESCREEN: Rational = Rational { numerator: 16, denominator: 9 };

    const STANDARD_RATIOS: &'static [Rational] = &[
        Rational { numerator: 1, denominator: 1 },
        Rational { numerator: 5, denominator: 4 },
        Rational { numerator: 4, denominator: 3 },
        Rational { numerator: 3, denominator: 2 },
        Rational { numerator: 16, denominator: 10 },
        Rational { numerator: 5, denominator: 3 },
        Rational { numerator: 16, denominator: 9 },
        Rational { numerator: 185, denominator: 100 },
        Rational { numerator: 2, denominator: 1 },
        Rational { numerator: 220, denominator: 100 },
        Rational { numerator: 235, denominator: 100 },
        Rational { numerator: 239, denominator: 100 },
        Rational { numerator: 276, denominator: 100 },
        Rational { numerator: 4, denominator: 1 },
    ];

    pub fn new(numerator: u32, denominator: u32) -> Result<Self, Error> {
        if denominator == 0 {
            return Err(Error::Format(format!(
                "{}:{} has a zero denominator",
                numerator, denominator
            )));
        }
        Ok(Self { numerator, denominator })
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^(?P<num>\d+)[:/](?P<den>\d+)$").expect("rational pattern is valid")
        });

        let captures = pattern
            .captures(text.trim())
            .ok_or_else(|| Error::Format(text.to_string()))?;
        let numerator = captures["num"]
            .parse::<u32>()
            .map_err(|_| Error::Format(text.to_string()))?;
        let denominator = captures["den"]
            .parse::<u32>()
            .map_err(|_| Error::Format(text.to_string()))?;
        Self::new(numerator, denominator)
    }

    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    pub fn to_string_with(&self, separator: char) -> String {
        format!("{}{}{}", self.numerator, separator, self.denominator)
    }

    /// Replaces `measured` with the closest standard cinema ratio when it lies
    /// within [`Self::SNAP_TOLERANCE`]; otherwise returns it unchanged.
    pub fn snap_aspect_ratio(measured: Rational) -> Rational {
        Self::STANDARD_RATIOS
            .iter()
            .map(|standard| (*standard, (measured - *standard).abs()))
            .filter(|(_, distance)| *distance < Self::SNAP_TOLERANCE)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(standard, _)| standard)
            .unwrap_or(measured)
    }
}

impl FromStr for Rational {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl Sub for Rational {
    type Output = f64;

    fn sub(self, other: Rational) -> f64 {
        self.to_f64() - other.to_f64()
    }
}

impl Mul<f64> for Rational {
    type Output = f64;

    fn mul(self, other: f64) -> f64 {
        other * self.to_f64()
    }
}

impl Mul<Rational> for f64 {
    type Output = f64;

    fn mul(self, other: Rational) -> f64 {
        self * other.to_f64()
    }
}

impl Mul<u32> for Rational {
    type Output = f64;

    fn mul(self, other: u32) -> f64 {
        other as f64 * self.to_f64()
    }
}

impl Mul<Rational> for u32 {
    type Output = f64;

    fn mul(self, other: Rational) -> f64 {
        self as f64 * other.to_f64()
    }
}
