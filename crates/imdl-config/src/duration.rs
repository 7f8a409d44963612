//! Human-friendly durations: `"2h"`, `"10m"`, `"1.5d"`, `7200000`, `-1`.
//!
//! A bare number is milliseconds. Units are matched case-sensitively: `s`,
//! `m`, `h`, `d`, `w`, `M` (30 days) and `Y` (365 days). Any other suffix,
//! including `D`, `W` and `y`, leaves the value in milliseconds. `-1` means
//! "never"; zero and unparsable input count as unset so callers fall back to
//! their default.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::ConfigError;

static NUMBER_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)([a-zA-Z]?)").unwrap());

const SECOND: f64 = 1_000.0;
const MINUTE: f64 = 60.0 * SECOND;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;

/// A duration that may be infinite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifetime {
    /// Expires after the given duration.
    Finite(Duration),
    /// Never expires.
    Forever,
}

impl Lifetime {
    /// The finite duration, or `None` for [`Lifetime::Forever`].
    #[must_use]
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Finite(d) => Some(d),
            Self::Forever => None,
        }
    }

    /// Lenient parse. Returns `None` for zero or unparsable input.
    #[must_use]
    pub fn parse_lenient(input: &str) -> Option<Self> {
        let input = input.trim();
        if input == "-1" {
            return Some(Self::Forever);
        }

        let caps = NUMBER_UNIT.captures(input)?;
        let whole = caps.get(0)?;
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        if value <= 0.0 {
            return None;
        }

        // The unit must be the only thing left once the number is removed.
        let rest = format!(
            "{}{}{}",
            &input[..whole.start()],
            caps.get(2).map_or("", |m| m.as_str()),
            &input[whole.end()..]
        );
        let factor = match rest.as_str() {
            "s" => SECOND,
            "m" => MINUTE,
            "h" => HOUR,
            "d" => DAY,
            "w" => 7.0 * DAY,
            "M" => 30.0 * DAY,
            "Y" => 365.0 * DAY,
            _ => 1.0,
        };

        Some(Self::from_millis_f64(value * factor))
    }

    /// Interpret a plain integer as milliseconds.
    #[must_use]
    pub fn from_millis(ms: i64) -> Option<Self> {
        match ms {
            -1 => Some(Self::Forever),
            ms if ms <= 0 => None,
            #[allow(clippy::cast_sign_loss)]
            ms => Some(Self::Finite(Duration::from_millis(ms as u64))),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_millis_f64(ms: f64) -> Self {
        Self::Finite(Duration::from_millis(ms.round() as u64))
    }
}

impl FromStr for Lifetime {
    type Err = ConfigError;

    /// Strict parse for places where a duration is mandatory (CLI flags).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_lenient(s).ok_or_else(|| ConfigError::Duration(s.to_owned()))
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(d) => write!(f, "{}ms", d.as_millis()),
            Self::Forever => f.write_str("forever"),
        }
    }
}

/// Duration as written in TOML: an integer (milliseconds) or a string.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum DurationValue {
    Millis(i64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn resolve(&self, default: Lifetime) -> Lifetime {
        let parsed = match self {
            Self::Millis(ms) => Lifetime::from_millis(*ms),
            Self::Text(text) => Lifetime::parse_lenient(text),
        };
        parsed.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Option<Lifetime> {
        Some(Lifetime::Finite(Duration::from_millis(n)))
    }

    #[test]
    fn test_units() {
        assert_eq!(Lifetime::parse_lenient("30s"), ms(30_000));
        assert_eq!(Lifetime::parse_lenient("10m"), ms(600_000));
        assert_eq!(Lifetime::parse_lenient("2h"), ms(7_200_000));
        assert_eq!(Lifetime::parse_lenient("1d"), ms(86_400_000));
        assert_eq!(Lifetime::parse_lenient("1w"), ms(604_800_000));
        assert_eq!(Lifetime::parse_lenient("1M"), ms(2_592_000_000));
        assert_eq!(Lifetime::parse_lenient("1Y"), ms(31_536_000_000));
    }

    #[test]
    fn test_bare_number_is_millis() {
        assert_eq!(Lifetime::parse_lenient("250"), ms(250));
    }

    #[test]
    fn test_fractional() {
        assert_eq!(Lifetime::parse_lenient("1.5h"), ms(5_400_000));
    }

    #[test]
    fn test_alternate_case_units_are_millis() {
        assert_eq!(Lifetime::parse_lenient("5D"), ms(5));
        assert_eq!(Lifetime::parse_lenient("5W"), ms(5));
        assert_eq!(Lifetime::parse_lenient("5y"), ms(5));
    }

    #[test]
    fn test_trailing_text_is_millis() {
        assert_eq!(Lifetime::parse_lenient("5 hours"), ms(5));
    }

    #[test]
    fn test_forever() {
        assert_eq!(Lifetime::parse_lenient("-1"), Some(Lifetime::Forever));
        assert_eq!(Lifetime::from_millis(-1), Some(Lifetime::Forever));
    }

    #[test]
    fn test_zero_and_garbage_are_unset() {
        assert_eq!(Lifetime::parse_lenient("0"), None);
        assert_eq!(Lifetime::parse_lenient("0h"), None);
        assert_eq!(Lifetime::parse_lenient("soon"), None);
        assert_eq!(Lifetime::parse_lenient(""), None);
        assert_eq!(Lifetime::from_millis(0), None);
        assert_eq!(Lifetime::from_millis(-5), None);
    }

    #[test]
    fn test_from_str_strict() {
        assert_eq!("2h".parse::<Lifetime>().unwrap(), Lifetime::Finite(Duration::from_secs(7200)));

        let err = "later".parse::<Lifetime>().unwrap_err();
        assert!(matches!(err, ConfigError::Duration(ref s) if s == "later"));
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let default = Lifetime::Finite(Duration::from_secs(1));

        assert_eq!(DurationValue::Text("nope".to_owned()).resolve(default), default);
        assert_eq!(DurationValue::Millis(0).resolve(default), default);
        assert_eq!(DurationValue::Millis(-1).resolve(default), Lifetime::Forever);
        assert_eq!(
            DurationValue::Millis(50).resolve(default),
            Lifetime::Finite(Duration::from_millis(50))
        );
    }

    #[test]
    fn test_as_duration() {
        assert_eq!(Lifetime::Forever.as_duration(), None);
        assert_eq!(
            Lifetime::Finite(Duration::from_secs(3)).as_duration(),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Lifetime::Finite(Duration::from_secs(2)).to_string(), "2000ms");
        assert_eq!(Lifetime::Forever.to_string(), "forever");
    }
}
