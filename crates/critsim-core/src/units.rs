//! SI-suffixed value handling for configuration files.
//!
//! Perturbation magnitudes are usually tiny (injected charge in femtocoulombs,
//! pulse widths in picoseconds), so configuration accepts SPICE-style strings
//! like `"10f"` or `"1.5MEG"` wherever a number is expected.

use serde::de::{self, Deserializer, Visitor};

/// Parse a SPICE-style value with optional SI suffix.
///
/// Suffixes are case-insensitive: T, G, MEG, K, M (milli), MIL, U, N, P, F, A.
/// Trailing unit letters after the suffix (`"10fC"`, `"2ns"`) are ignored the
/// way SPICE ignores them.
pub fn parse_value(s: &str) -> Option<f64> {
    let s = s.trim().to_uppercase();
    if s.is_empty() {
        return None;
    }

    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }

    let num_end = numeric_prefix_len(&s);
    if num_end == 0 {
        return None;
    }

    let (num_str, rest) = s.split_at(num_end);
    let value: f64 = num_str.parse().ok()?;

    let multiplier = if rest.starts_with("MEG") {
        1e6
    } else if rest.starts_with("MIL") {
        25.4e-6
    } else {
        match rest.chars().next()? {
            'T' => 1e12,
            'G' => 1e9,
            'K' => 1e3,
            'M' => 1e-3,
            'U' => 1e-6,
            'N' => 1e-9,
            'P' => 1e-12,
            'F' => 1e-15,
            'A' => 1e-18,
            _ => return None,
        }
    };

    Some(value * multiplier)
}

/// Length of the leading numeric part, treating `E` as an exponent only when
/// it is followed by a digit or sign (so `"1MEG"` stops before `M`).
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut end = 0;
    while end < bytes.len() {
        let c = bytes[end];
        let is_exponent = c == b'E'
            && end > 0
            && bytes
                .get(end + 1)
                .is_some_and(|n| n.is_ascii_digit() || *n == b'-' || *n == b'+');
        let is_sign = (c == b'-' || c == b'+') && (end == 0 || bytes[end - 1] == b'E');
        if c.is_ascii_digit() || c == b'.' || is_exponent || is_sign {
            end += 1;
        } else {
            break;
        }
    }
    end
}

/// Format a value with an SI prefix, for log lines and summaries.
pub fn format_value(value: f64) -> String {
    let abs_value = value.abs();

    let (scaled, suffix) = if abs_value == 0.0 {
        (0.0, "")
    } else if abs_value >= 1e9 {
        (value / 1e9, "G")
    } else if abs_value >= 1e6 {
        (value / 1e6, "M")
    } else if abs_value >= 1e3 {
        (value / 1e3, "k")
    } else if abs_value >= 1.0 {
        (value, "")
    } else if abs_value >= 1e-3 {
        (value * 1e3, "m")
    } else if abs_value >= 1e-6 {
        (value * 1e6, "u")
    } else if abs_value >= 1e-9 {
        (value * 1e9, "n")
    } else if abs_value >= 1e-12 {
        (value * 1e12, "p")
    } else if abs_value >= 1e-15 {
        (value * 1e15, "f")
    } else if abs_value >= 1e-18 {
        (value * 1e18, "a")
    } else {
        (value, "")
    };

    format!("{:.4}{}", scaled, suffix)
}

/// Serde helper: accept either a JSON number or an SI-suffixed string.
///
/// ```ignore
/// #[serde(deserialize_with = "critsim_core::units::deserialize_si")]
/// pub min: f64,
/// ```
pub fn deserialize_si<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(SiValueVisitor)
}

/// Serde helper for optional SI values.
pub fn deserialize_si_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OptVisitor;

    impl<'de> Visitor<'de> for OptVisitor {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("null, a number or an SI-suffixed string")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            deserialize_si(d).map(Some)
        }
    }

    deserializer.deserialize_option(OptVisitor)
}

struct SiValueVisitor;

impl Visitor<'_> for SiValueVisitor {
    type Value = f64;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("a number or an SI-suffixed string such as \"10f\"")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        parse_value(v).ok_or_else(|| E::custom(format!("invalid value: {v:?}")))
    }
}
