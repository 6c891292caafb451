use std::fmt;

use serde::{Deserialize, Deserializer};

/// Fixed-point decimal as the market data api encodes it: whole `units` plus
/// a `nano` fractional part in billionths. The gateway serializes int64 as a
/// JSON string and omits either field entirely when it is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Quotation {
    #[serde(default, deserialize_with = "units_from_json")]
    pub units: i64,
    #[serde(default)]
    pub nano: i32,
}

impl Quotation {
    pub fn new(units: i64, nano: i32) -> Self {
        Self { units, nano }
    }
}

/// Renders with the fraction truncated to hundredths. 100.509 prints as
/// "100.50" — no rounding.
impl fmt::Display for Quotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.units < 0 || self.nano < 0 {
            write!(f, "-")?;
        }
        let hundredths = self.nano.unsigned_abs() / 10_000_000;
        write!(f, "{}.{:02}", self.units.unsigned_abs(), hundredths)
    }
}

fn units_from_json<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Units {
        Text(String),
        Number(i64),
    }

    match Units::deserialize(deserializer)? {
        Units::Text(s) => s.parse().map_err(serde::de::Error::custom),
        Units::Number(n) => Ok(n),
    }
}
